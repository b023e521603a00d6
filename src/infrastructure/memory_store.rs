// In-process health store with a change log and live anchored subscriptions
use crate::application::health_store::{AnchoredQuery, BatchReceiver, HealthStore, StoreError};
use crate::domain::metric::{MetricKind, Quantity, StatisticsOption};
use crate::domain::sample::{Anchor, AnchoredBatch, DeletedSample, SamplePredicate, Sample};
use crate::domain::statistics::{Statistics, StatisticsCollection, StatisticsRequest};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc;
use uuid::Uuid;

const SUBSCRIBER_BUFFER: usize = 64;

#[derive(Debug, Clone)]
enum Change {
    Added(Sample),
    Deleted(MetricKind, DeletedSample),
}

struct Subscriber {
    metric: MetricKind,
    predicate: SamplePredicate,
    tx: mpsc::Sender<Result<AnchoredBatch, StoreError>>,
    /// Sequence number of the last change this subscriber has seen.
    delivered: u64,
}

type Delivery = (mpsc::Sender<Result<AnchoredBatch, StoreError>>, AnchoredBatch);

#[derive(Default)]
struct Inner {
    samples: Vec<Sample>,
    /// Change `i` has sequence number `i + 1`.
    changes: Vec<Change>,
    denied: HashSet<MetricKind>,
    subscribers: Vec<Subscriber>,
}

impl Inner {
    fn current_anchor(&self) -> Anchor {
        Anchor(self.changes.len() as u64)
    }

    fn check_access(&self, metric: MetricKind) -> Result<(), StoreError> {
        if self.denied.contains(&metric) {
            return Err(StoreError::Unauthorized(metric.identifier().to_string()));
        }
        Ok(())
    }

    /// Changes to `metric` after sequence number `seq`, minus samples removed since.
    fn changes_since(
        &self,
        seq: u64,
        metric: MetricKind,
        predicate: &SamplePredicate,
    ) -> (Vec<Sample>, Vec<DeletedSample>) {
        let live: HashSet<Uuid> = self.samples.iter().map(|s| s.id).collect();
        let mut added = Vec::new();
        let mut deleted = Vec::new();
        for change in self.changes.iter().skip(seq as usize) {
            match change {
                Change::Added(s) if s.metric == metric && predicate.matches(s) && live.contains(&s.id) => {
                    added.push(s.clone())
                }
                Change::Deleted(m, d) if *m == metric => deleted.push(*d),
                _ => {}
            }
        }
        (added, deleted)
    }

    fn initial_batch(&self, query: &AnchoredQuery) -> AnchoredBatch {
        let (added, deleted) = match query.anchor {
            None => (
                self.samples
                    .iter()
                    .filter(|s| s.metric == query.metric && query.predicate.matches(s))
                    .cloned()
                    .collect(),
                Vec::new(),
            ),
            Some(Anchor(seq)) => self.changes_since(seq, query.metric, &query.predicate),
        };

        AnchoredBatch {
            metric: query.metric,
            added,
            deleted,
            anchor: self.current_anchor(),
        }
    }

    /// Batches for every subscriber behind the change log. Denied subscribers keep their cursor.
    fn pending_deliveries(&mut self) -> Vec<Delivery> {
        self.subscribers.retain(|s| !s.tx.is_closed());
        let anchor = self.current_anchor();

        let mut deliveries = Vec::new();
        for i in 0..self.subscribers.len() {
            let (metric, predicate, delivered) = {
                let sub = &self.subscribers[i];
                (sub.metric, sub.predicate, sub.delivered)
            };
            if delivered >= anchor.0 || self.denied.contains(&metric) {
                continue;
            }

            let (added, deleted) = self.changes_since(delivered, metric, &predicate);
            self.subscribers[i].delivered = anchor.0;
            if added.is_empty() && deleted.is_empty() {
                continue;
            }

            let batch = AnchoredBatch {
                metric,
                added,
                deleted,
                anchor,
            };
            deliveries.push((self.subscribers[i].tx.clone(), batch));
        }
        deliveries
    }
}

/// Health store kept entirely in memory.
#[derive(Clone, Default)]
pub struct MemoryHealthStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryHealthStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Decline read access to `metric` from now on.
    pub fn deny(&self, metric: MetricKind) {
        self.lock().denied.insert(metric);
    }

    /// Revoke access while subscriptions are live; each one receives an error batch.
    pub async fn revoke(&self, metric: MetricKind) {
        let targets: Vec<_> = {
            let mut inner = self.lock();
            inner.denied.insert(metric);
            inner
                .subscribers
                .iter()
                .filter(|s| s.metric == metric)
                .map(|s| s.tx.clone())
                .collect()
        };
        for tx in targets {
            let _ = tx
                .send(Err(StoreError::Unauthorized(metric.identifier().to_string())))
                .await;
        }
    }

    /// Restore access and deliver whatever changed while it was denied.
    pub async fn grant(&self, metric: MetricKind) {
        let deliveries = {
            let mut inner = self.lock();
            inner.denied.remove(&metric);
            inner.pending_deliveries()
        };
        deliver(deliveries).await;
    }

    pub fn anchor(&self) -> Anchor {
        self.lock().current_anchor()
    }

    /// Save samples and notify matching subscribers.
    pub async fn insert(&self, samples: Vec<Sample>) -> Anchor {
        let (anchor, deliveries) = {
            let mut inner = self.lock();
            for sample in samples {
                inner.changes.push(Change::Added(sample.clone()));
                inner.samples.push(sample);
            }
            (inner.current_anchor(), inner.pending_deliveries())
        };

        deliver(deliveries).await;
        anchor
    }

    /// Remove samples by id and notify subscribers of their metrics.
    pub async fn delete(&self, ids: &[Uuid]) -> Anchor {
        let (anchor, deliveries) = {
            let mut inner = self.lock();
            let (removed, kept): (Vec<Sample>, Vec<Sample>) = std::mem::take(&mut inner.samples)
                .into_iter()
                .partition(|s| ids.contains(&s.id));
            inner.samples = kept;

            for sample in &removed {
                inner
                    .changes
                    .push(Change::Deleted(sample.metric, DeletedSample { id: sample.id }));
            }
            (inner.current_anchor(), inner.pending_deliveries())
        };

        deliver(deliveries).await;
        anchor
    }
}

async fn deliver(deliveries: Vec<Delivery>) {
    for (tx, batch) in deliveries {
        if tx.send(Ok(batch)).await.is_err() {
            tracing::debug!("Subscriber went away before delivery");
        }
    }
}

fn summarize(samples: &[&Sample], metric: MetricKind, option: StatisticsOption) -> Option<Quantity> {
    let unit = metric.preferred_unit();
    let values: Vec<f64> = samples
        .iter()
        .filter_map(|s| s.quantity.value_in(unit))
        .collect();
    if values.is_empty() {
        return None;
    }

    let total: f64 = values.iter().sum();
    let value = match option {
        StatisticsOption::CumulativeSum => total,
        StatisticsOption::DiscreteAverage => total / values.len() as f64,
    };
    Some(Quantity::new(value, unit))
}

#[async_trait]
impl HealthStore for MemoryHealthStore {
    async fn request_authorization(&self, metrics: &[MetricKind]) -> Result<bool, StoreError> {
        let inner = self.lock();
        Ok(metrics.iter().all(|m| !inner.denied.contains(m)))
    }

    async fn statistics_collection(
        &self,
        request: &StatisticsRequest,
    ) -> Result<StatisticsCollection, StoreError> {
        let inner = self.lock();
        inner.check_access(request.metric)?;

        let end = request.predicate.end.with_timezone(&request.anchor_date.timezone());
        let mut buckets = Vec::new();
        let mut bucket_start = request.anchor_date;

        while bucket_start <= end {
            let bucket_end = request.interval.advance(&bucket_start);
            let (from, to) = (bucket_start.with_timezone(&Utc), bucket_end.with_timezone(&Utc));

            let in_bucket: Vec<&Sample> = inner
                .samples
                .iter()
                .filter(|s| s.metric == request.metric && request.predicate.matches(s))
                .filter(|s| s.start >= from && s.start < to)
                .collect();

            let mut stats = Statistics::empty(from, to);
            let summary = summarize(&in_bucket, request.metric, request.option);
            match request.option {
                StatisticsOption::CumulativeSum => stats.sum = summary,
                StatisticsOption::DiscreteAverage => stats.average = summary,
            }
            buckets.push(stats);
            bucket_start = bucket_end;
        }

        Ok(StatisticsCollection::new(buckets))
    }

    async fn subscribe(&self, query: AnchoredQuery) -> Result<BatchReceiver, StoreError> {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_BUFFER);
        let mut inner = self.lock();
        inner.check_access(query.metric)?;

        let initial = inner.initial_batch(&query);
        let delivered = initial.anchor.0;
        tx.try_send(Ok(initial))
            .map_err(|e| StoreError::Query(format!("initial batch not delivered: {}", e)))?;

        inner.subscribers.push(Subscriber {
            metric: query.metric,
            predicate: query.predicate,
            tx,
            delivered,
        });
        Ok(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::time_range_resolver::TimeWindow;
    use crate::domain::metric::Unit;
    use crate::domain::time_range::TimeRange;
    use chrono::{DateTime, TimeZone};
    use chrono_tz::Tz;

    fn now() -> DateTime<Tz> {
        Tz::UTC.with_ymd_and_hms(2020, 6, 10, 14, 30, 0).unwrap()
    }

    fn steps_at(day: u32, hour: u32, count: f64) -> Sample {
        let time = Utc.with_ymd_and_hms(2020, 6, day, hour, 0, 0).unwrap();
        Sample::at(MetricKind::StepCount, time, Quantity::new(count, Unit::Count))
    }

    fn week_request(metric: MetricKind) -> StatisticsRequest {
        let window = TimeWindow::resolve(TimeRange::Week, now());
        StatisticsRequest {
            metric,
            predicate: window.predicate(),
            option: metric.statistics_option(),
            anchor_date: window.start,
            interval: window.interval,
        }
    }

    #[tokio::test]
    async fn test_statistics_buckets_by_day() {
        let store = MemoryHealthStore::new();
        store
            .insert(vec![steps_at(4, 9, 100.0), steps_at(4, 18, 50.0), steps_at(6, 7, 30.0)])
            .await;

        let collection = store
            .statistics_collection(&week_request(MetricKind::StepCount))
            .await
            .unwrap();

        assert_eq!(collection.len(), 7);
        let sums: Vec<Option<f64>> = collection
            .enumerate(Utc.with_ymd_and_hms(2020, 6, 4, 0, 0, 0).unwrap(), now().with_timezone(&Utc))
            .map(|b| b.sum.map(|q| q.value))
            .collect();
        assert_eq!(sums, vec![Some(150.0), None, Some(30.0), None, None, None, None]);
    }

    #[tokio::test]
    async fn test_average_converts_to_preferred_unit() {
        let store = MemoryHealthStore::new();
        let time = Utc.with_ymd_and_hms(2020, 6, 9, 10, 0, 0).unwrap();
        store
            .insert(vec![
                Sample::at(MetricKind::WalkingSpeed, time, Quantity::new(3.6, Unit::KilometerPerHour)),
                Sample::at(MetricKind::WalkingSpeed, time, Quantity::new(2.0, Unit::MeterPerSecond)),
            ])
            .await;

        let collection = store
            .statistics_collection(&week_request(MetricKind::WalkingSpeed))
            .await
            .unwrap();
        let averages: Vec<f64> = collection
            .enumerate(Utc.with_ymd_and_hms(2020, 6, 1, 0, 0, 0).unwrap(), now().with_timezone(&Utc))
            .filter_map(|b| b.average.map(|q| q.value))
            .collect();

        assert_eq!(averages.len(), 1);
        assert!((averages[0] - 1.5).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_denied_metric_is_unauthorized() {
        let store = MemoryHealthStore::new();
        store.deny(MetricKind::StepCount);

        assert!(!store.request_authorization(&[MetricKind::StepCount]).await.unwrap());
        assert!(store.request_authorization(&[MetricKind::WalkingSpeed]).await.unwrap());
        let result = store.statistics_collection(&week_request(MetricKind::StepCount)).await;
        assert!(matches!(result, Err(StoreError::Unauthorized(_))));
    }

    #[tokio::test]
    async fn test_subscribe_delivers_initial_then_incremental_batches() {
        let store = MemoryHealthStore::new();
        store.insert(vec![steps_at(5, 8, 10.0)]).await;

        let predicate = TimeWindow::resolve(TimeRange::Week, now()).predicate();
        let mut rx = store
            .subscribe(AnchoredQuery {
                metric: MetricKind::StepCount,
                predicate,
                anchor: None,
            })
            .await
            .unwrap();

        let initial = rx.recv().await.unwrap().unwrap();
        assert_eq!(initial.added.len(), 1);
        assert_eq!(initial.anchor, Anchor(1));

        let late = steps_at(9, 12, 20.0);
        let late_id = late.id;
        store.insert(vec![late]).await;
        let update = rx.recv().await.unwrap().unwrap();
        assert_eq!(update.added.len(), 1);
        assert_eq!(update.anchor, Anchor(2));

        store.delete(&[late_id]).await;
        let removal = rx.recv().await.unwrap().unwrap();
        assert_eq!(removal.deleted, vec![DeletedSample { id: late_id }]);
        assert_eq!(removal.anchor, Anchor(3));
    }

    #[tokio::test]
    async fn test_subscribe_resumes_from_anchor() {
        let store = MemoryHealthStore::new();
        let first = store.insert(vec![steps_at(5, 8, 10.0)]).await;
        store.insert(vec![steps_at(6, 8, 20.0)]).await;

        let predicate = TimeWindow::resolve(TimeRange::Week, now()).predicate();
        let mut rx = store
            .subscribe(AnchoredQuery {
                metric: MetricKind::StepCount,
                predicate,
                anchor: Some(first),
            })
            .await
            .unwrap();

        let initial = rx.recv().await.unwrap().unwrap();
        assert_eq!(initial.added.len(), 1);
        assert_eq!(initial.added[0].quantity.value, 20.0);
        assert_eq!(initial.anchor, Anchor(2));
    }

    #[tokio::test]
    async fn test_changes_while_revoked_are_delivered_after_grant() {
        let store = MemoryHealthStore::new();
        let predicate = TimeWindow::resolve(TimeRange::Week, now()).predicate();
        let mut rx = store
            .subscribe(AnchoredQuery {
                metric: MetricKind::StepCount,
                predicate,
                anchor: None,
            })
            .await
            .unwrap();
        assert!(rx.recv().await.unwrap().unwrap().is_empty());

        store.revoke(MetricKind::StepCount).await;
        assert!(matches!(rx.recv().await.unwrap(), Err(StoreError::Unauthorized(_))));

        let hidden = steps_at(8, 10, 40.0);
        let hidden_id = hidden.id;
        let hidden_anchor = store.insert(vec![hidden]).await;
        assert!(rx.try_recv().is_err());

        store.grant(MetricKind::StepCount).await;
        let catch_up = rx.recv().await.unwrap().unwrap();
        assert_eq!(catch_up.added.len(), 1);
        assert_eq!(catch_up.added[0].id, hidden_id);
        assert_eq!(catch_up.anchor, hidden_anchor);

        let next = store.insert(vec![steps_at(9, 10, 5.0)]).await;
        let update = rx.recv().await.unwrap().unwrap();
        assert_eq!(update.added.len(), 1);
        assert_eq!(update.added[0].quantity.value, 5.0);
        assert_eq!(update.anchor, next);
    }
}
