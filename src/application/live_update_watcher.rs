// Live update watcher - Anchored subscriptions forwarding sample changes to sync
use crate::application::anchor_store::AnchorStore;
use crate::application::health_store::{AnchoredQuery, HealthStore};
use crate::application::sample_sync::SampleSync;
use crate::domain::metric::MetricKind;
use crate::domain::sample::{Anchor, AnchoredBatch, SamplePredicate};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WatcherState {
    Idle,
    Subscribed,
    /// The store ended the stream.
    Closed,
}

/// Summary handed to the UI loop after a batch has been persisted and synced.
#[derive(Debug, Clone, PartialEq)]
pub struct SamplesObserved {
    pub metric: MetricKind,
    pub added: usize,
    pub deleted: usize,
    pub anchor: Anchor,
}

#[derive(Clone)]
pub struct LiveUpdateWatcher {
    store: Arc<dyn HealthStore>,
    anchors: Arc<dyn AnchorStore>,
    sync: Arc<dyn SampleSync>,
    handoff: Option<mpsc::Sender<SamplesObserved>>,
}

/// A running subscription for one metric. Dropping it stops the subscription.
pub struct WatchHandle {
    metric: MetricKind,
    state: watch::Receiver<WatcherState>,
    task: JoinHandle<()>,
}

impl WatchHandle {
    pub fn metric(&self) -> MetricKind {
        self.metric
    }

    pub fn state(&self) -> WatcherState {
        *self.state.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<WatcherState> {
        self.state.clone()
    }

    pub fn stop(&self) {
        self.task.abort();
    }
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

impl LiveUpdateWatcher {
    pub fn new(
        store: Arc<dyn HealthStore>,
        anchors: Arc<dyn AnchorStore>,
        sync: Arc<dyn SampleSync>,
    ) -> Self {
        Self {
            store,
            anchors,
            sync,
            handoff: None,
        }
    }

    /// Notify the UI loop through `tx` after every batch.
    pub fn with_handoff(mut self, tx: mpsc::Sender<SamplesObserved>) -> Self {
        self.handoff = Some(tx);
        self
    }

    /// Subscribe to `metric` on a background task.
    pub fn watch(&self, metric: MetricKind, predicate: SamplePredicate) -> WatchHandle {
        let (state_tx, state_rx) = watch::channel(WatcherState::Idle);
        let watcher = self.clone();
        let task = tokio::spawn(async move { watcher.run(metric, predicate, state_tx).await });

        WatchHandle {
            metric,
            state: state_rx,
            task,
        }
    }

    async fn run(
        self,
        metric: MetricKind,
        predicate: SamplePredicate,
        state: watch::Sender<WatcherState>,
    ) {
        let anchor = match self.anchors.load(metric).await {
            Ok(anchor) => anchor,
            Err(e) => {
                tracing::warn!("Could not load anchor for {}, starting from scratch: {}", metric, e);
                None
            }
        };

        let query = AnchoredQuery {
            metric,
            predicate,
            anchor,
        };
        let mut batches = match self.store.subscribe(query).await {
            Ok(rx) => rx,
            Err(e) => {
                tracing::error!("Anchored query for {} could not start: {}", metric, e);
                return;
            }
        };

        state.send_replace(WatcherState::Subscribed);
        tracing::info!("Watching {} from anchor {:?}", metric, anchor);

        while let Some(next) = batches.recv().await {
            match next {
                Ok(batch) => self.handle_batch(batch).await,
                Err(e) => tracing::warn!("Dropping update batch for {}: {}", metric, e),
            }
        }

        tracing::info!("Anchored query for {} ended", metric);
        state.send_replace(WatcherState::Closed);
    }

    /// Persist the batch anchor, push the changes, then notify the UI loop.
    pub async fn handle_batch(&self, batch: AnchoredBatch) {
        tracing::debug!(
            "Batch for {}: {} added, {} deleted, anchor {}",
            batch.metric,
            batch.added.len(),
            batch.deleted.len(),
            batch.anchor
        );

        if let Err(e) = self.anchors.save(batch.metric, batch.anchor).await {
            tracing::error!("Failed to persist anchor for {}: {}", batch.metric, e);
        }

        if let Err(e) = self
            .sync
            .push(batch.metric, &batch.added, &batch.deleted)
            .await
        {
            tracing::warn!("Sync push for {} failed: {}", batch.metric, e);
        }

        if let Some(tx) = &self.handoff {
            let observed = SamplesObserved {
                metric: batch.metric,
                added: batch.added.len(),
                deleted: batch.deleted.len(),
                anchor: batch.anchor,
            };
            // A full channel already has a refresh pending
            if tx.try_send(observed).is_err() {
                tracing::debug!("UI hand-off for {} skipped", batch.metric);
            }
        }
    }
}
