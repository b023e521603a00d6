// Sample sync adapters - HTTP push and log-only
use crate::application::sample_sync::{SampleSync, SyncError};
use crate::domain::metric::MetricKind;
use crate::domain::sample::{DeletedSample, Sample};
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Body posted for each update batch.
#[derive(Debug, Serialize)]
pub struct SyncPayload<'a> {
    pub metric: &'a str,
    pub added: &'a [Sample],
    pub deleted: &'a [DeletedSample],
}

#[derive(Debug, Clone)]
pub struct HttpSampleSync {
    client: reqwest::Client,
    endpoint: String,
    token: Option<String>,
}

impl HttpSampleSync {
    pub fn new(endpoint: impl Into<String>, token: Option<String>) -> Result<Self, SyncError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| SyncError::Request(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
            token,
        })
    }
}

#[async_trait]
impl SampleSync for HttpSampleSync {
    async fn push(
        &self,
        metric: MetricKind,
        added: &[Sample],
        deleted: &[DeletedSample],
    ) -> Result<(), SyncError> {
        let payload = SyncPayload {
            metric: metric.identifier(),
            added,
            deleted,
        };

        let mut request = self.client.post(&self.endpoint).json(&payload);
        if let Some(token) = &self.token {
            request = request.header("Authorization", format!("Bearer {}", token));
        }

        let response = request
            .send()
            .await
            .map_err(|e| SyncError::Request(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(SyncError::Rejected { status, body });
        }

        tracing::debug!(
            "Pushed {} added / {} deleted {} samples",
            added.len(),
            deleted.len(),
            metric
        );
        Ok(())
    }
}

/// Used when no sync endpoint is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingSampleSync;

#[async_trait]
impl SampleSync for LoggingSampleSync {
    async fn push(
        &self,
        metric: MetricKind,
        added: &[Sample],
        deleted: &[DeletedSample],
    ) -> Result<(), SyncError> {
        tracing::info!(
            "No sync endpoint; observed {} added / {} deleted {} samples",
            added.len(),
            deleted.len(),
            metric
        );
        Ok(())
    }
}
