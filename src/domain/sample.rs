// Health sample and change-stream domain models
use super::metric::{MetricKind, Quantity};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// A single recorded quantity sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub id: Uuid,
    pub metric: MetricKind,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub quantity: Quantity,
}

impl Sample {
    pub fn new(metric: MetricKind, start: DateTime<Utc>, end: DateTime<Utc>, quantity: Quantity) -> Self {
        Self {
            id: Uuid::new_v4(),
            metric,
            start,
            end,
            quantity,
        }
    }

    /// Point-in-time sample (start == end).
    pub fn at(metric: MetricKind, time: DateTime<Utc>, quantity: Quantity) -> Self {
        Self::new(metric, time, time, quantity)
    }
}

/// Reference to a sample removed from the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeletedSample {
    pub id: Uuid,
}

/// Opaque cursor into a metric's change stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Anchor(pub u64);

impl fmt::Display for Anchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Samples whose start timestamp lies in `[start, end]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SamplePredicate {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl SamplePredicate {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    pub fn matches(&self, sample: &Sample) -> bool {
        sample.start >= self.start && sample.start <= self.end
    }
}

/// One delivery from an anchored query.
#[derive(Debug, Clone, PartialEq)]
pub struct AnchoredBatch {
    pub metric: MetricKind,
    pub added: Vec<Sample>,
    pub deleted: Vec<DeletedSample>,
    pub anchor: Anchor,
}

impl AnchoredBatch {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.deleted.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::metric::Unit;
    use chrono::TimeZone;

    #[test]
    fn test_predicate_bounds_are_inclusive() {
        let start = Utc.with_ymd_and_hms(2020, 6, 10, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2020, 6, 10, 12, 0, 0).unwrap();
        let predicate = SamplePredicate::new(start, end);
        let steps = Quantity::new(10.0, Unit::Count);

        assert!(predicate.matches(&Sample::at(MetricKind::StepCount, start, steps)));
        assert!(predicate.matches(&Sample::at(MetricKind::StepCount, end, steps)));
        let later = end + chrono::Duration::seconds(1);
        assert!(!predicate.matches(&Sample::at(MetricKind::StepCount, later, steps)));
    }
}
