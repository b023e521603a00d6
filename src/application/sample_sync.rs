// Sync port - Forwards observed sample changes to a remote endpoint
use crate::domain::metric::MetricKind;
use crate::domain::sample::{DeletedSample, Sample};
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("sync request failed: {0}")]
    Request(String),

    #[error("sync endpoint returned {status}: {body}")]
    Rejected { status: u16, body: String },
}

#[async_trait]
pub trait SampleSync: Send + Sync {
    async fn push(
        &self,
        metric: MetricKind,
        added: &[Sample],
        deleted: &[DeletedSample],
    ) -> Result<(), SyncError>;
}
