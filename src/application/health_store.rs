// Health store port - Authorization, windowed statistics and anchored updates
use crate::domain::metric::MetricKind;
use crate::domain::sample::{Anchor, AnchoredBatch, SamplePredicate};
use crate::domain::statistics::{StatisticsCollection, StatisticsRequest};
use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not authorized to read {0}")]
    Unauthorized(String),

    #[error("query failed: {0}")]
    Query(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("failed to parse store response: {0}")]
    Parse(String),
}

/// Long-running anchored query parameters.
#[derive(Debug, Clone)]
pub struct AnchoredQuery {
    pub metric: MetricKind,
    pub predicate: SamplePredicate,
    /// `None` delivers everything matching the predicate in the first batch.
    pub anchor: Option<Anchor>,
}

/// Stream of anchored batches; the first item is the initial result set.
pub type BatchReceiver = mpsc::Receiver<Result<AnchoredBatch, StoreError>>;

#[async_trait]
pub trait HealthStore: Send + Sync {
    /// Ask for read access to `metrics`; `Ok(false)` means the user declined.
    async fn request_authorization(&self, metrics: &[MetricKind]) -> Result<bool, StoreError>;

    /// Run a windowed aggregation query.
    async fn statistics_collection(
        &self,
        request: &StatisticsRequest,
    ) -> Result<StatisticsCollection, StoreError>;

    /// Start an anchored query that keeps delivering batches until the
    /// receiver is dropped.
    async fn subscribe(&self, query: AnchoredQuery) -> Result<BatchReceiver, StoreError>;
}
