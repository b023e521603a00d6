// Statistics aggregator - One windowed query per metric, one value per bucket
use crate::application::health_store::{HealthStore, StoreError};
use crate::application::time_range_resolver::TimeWindow;
use crate::domain::chart::MetricSeries;
use crate::domain::metric::MetricKind;
use crate::domain::statistics::{StatisticsCollection, StatisticsRequest};
use crate::domain::time_range::TimeRange;
use chrono::Utc;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::sync::Arc;
use std::time::Instant;

/// Outcome of one metric query, tagged with the generation it was issued for.
#[derive(Debug)]
pub struct QueryCompletion {
    pub metric: MetricKind,
    pub range: TimeRange,
    pub generation: u64,
    pub result: Result<MetricSeries, StoreError>,
}

#[derive(Clone)]
pub struct StatisticsAggregator {
    store: Arc<dyn HealthStore>,
}

impl StatisticsAggregator {
    pub fn new(store: Arc<dyn HealthStore>) -> Self {
        Self { store }
    }

    pub fn request_for(metric: MetricKind, window: &TimeWindow) -> StatisticsRequest {
        StatisticsRequest {
            metric,
            predicate: window.predicate(),
            option: metric.statistics_option(),
            anchor_date: window.start,
            interval: window.interval,
        }
    }

    /// Fetch bucketed values for `metric` over `window`.
    pub async fn aggregate(
        &self,
        metric: MetricKind,
        window: &TimeWindow,
    ) -> Result<MetricSeries, StoreError> {
        let started = Instant::now();
        let request = Self::request_for(metric, window);

        let collection = self
            .store
            .statistics_collection(&request)
            .await
            .inspect_err(|e| tracing::error!("Statistics query for {} failed: {}", metric, e))?;

        let values = bucket_values(&collection, metric, window);
        tracing::debug!(
            "Aggregated {} of {} buckets for {} ({}) in {:?}",
            values.len(),
            window.bucket_count(),
            metric,
            window.range,
            started.elapsed()
        );

        Ok(MetricSeries::new(metric.identifier(), values))
    }

    /// Owned query future; dropping or aborting its task cancels the query.
    pub fn query(
        &self,
        metric: MetricKind,
        window: TimeWindow,
        generation: u64,
    ) -> BoxFuture<'static, QueryCompletion> {
        let aggregator = self.clone();
        async move {
            let result = aggregator.aggregate(metric, &window).await;
            QueryCompletion {
                metric,
                range: window.range,
                generation,
                result,
            }
        }
        .boxed()
    }
}

/// Scalar per bucket in the metric's preferred unit; empty buckets are skipped.
pub fn bucket_values(
    collection: &StatisticsCollection,
    metric: MetricKind,
    window: &TimeWindow,
) -> Vec<f64> {
    let option = metric.statistics_option();
    let unit = metric.preferred_unit();

    collection
        .enumerate(window.start.with_timezone(&Utc), window.end.with_timezone(&Utc))
        .filter_map(|bucket| bucket.quantity(option).and_then(|q| q.value_in(unit)))
        .collect()
}
