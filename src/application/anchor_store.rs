// Anchor persistence port
use crate::domain::metric::MetricKind;
use crate::domain::sample::Anchor;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AnchorStoreError {
    #[error("anchor file i/o: {0}")]
    Io(#[from] std::io::Error),

    #[error("anchor file is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
}

#[async_trait]
pub trait AnchorStore: Send + Sync {
    async fn load(&self, metric: MetricKind) -> Result<Option<Anchor>, AnchorStoreError>;

    async fn save(&self, metric: MetricKind, anchor: Anchor) -> Result<(), AnchorStoreError>;
}
