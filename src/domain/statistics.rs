// Windowed statistics domain models
use super::metric::{MetricKind, Quantity, StatisticsOption};
use super::sample::SamplePredicate;
use super::time_range::BucketInterval;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;

/// A windowed-aggregation request: one summary value per bucket.
#[derive(Debug, Clone)]
pub struct StatisticsRequest {
    pub metric: MetricKind,
    pub predicate: SamplePredicate,
    pub option: StatisticsOption,
    /// First bucket boundary; later boundaries step by `interval`.
    pub anchor_date: DateTime<Tz>,
    pub interval: BucketInterval,
}

/// Summary of the samples in one bucket.
#[derive(Debug, Clone, PartialEq)]
pub struct Statistics {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub sum: Option<Quantity>,
    pub average: Option<Quantity>,
}

impl Statistics {
    pub fn empty(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            start,
            end,
            sum: None,
            average: None,
        }
    }

    pub fn quantity(&self, option: StatisticsOption) -> Option<Quantity> {
        match option {
            StatisticsOption::CumulativeSum => self.sum,
            StatisticsOption::DiscreteAverage => self.average,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatisticsCollection {
    buckets: Vec<Statistics>,
}

impl StatisticsCollection {
    pub fn new(mut buckets: Vec<Statistics>) -> Self {
        buckets.sort_by_key(|b| b.start);
        Self { buckets }
    }

    /// Buckets starting in `[from, to]`, in chronological order.
    pub fn enumerate(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> impl Iterator<Item = &Statistics> {
        self.buckets
            .iter()
            .filter(move |b| b.start >= from && b.start <= to)
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}
