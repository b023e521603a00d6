// Time range resolver - Maps a selected range to concrete query parameters
use crate::application::calendar::{days_before, months_before, start_of_day};
use crate::application::date_range_formatter::{
    date_range_label, horizontal_axis_markers, last_updated_label,
};
use crate::domain::chart::AxisLabelSet;
use crate::domain::sample::SamplePredicate;
use crate::domain::time_range::{BucketInterval, TimeRange};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;

/// A resolved query window for one range at one instant.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeWindow {
    pub range: TimeRange,
    pub start: DateTime<Tz>,
    pub end: DateTime<Tz>,
    pub interval: BucketInterval,
}

impl TimeWindow {
    pub fn resolve(range: TimeRange, now: DateTime<Tz>) -> Self {
        Self {
            range,
            start: start_date(range, &now),
            end: now,
            interval: range.interval(),
        }
    }

    pub fn predicate(&self) -> SamplePredicate {
        SamplePredicate::new(self.start.with_timezone(&Utc), self.end.with_timezone(&Utc))
    }

    pub fn axis_markers(&self) -> AxisLabelSet {
        horizontal_axis_markers(self.range, &self.end)
    }

    pub fn date_range_label(&self) -> String {
        date_range_label(self.range, &self.end)
    }

    pub fn last_updated_label(&self) -> String {
        last_updated_label(&self.end)
    }

    /// Number of buckets between `start` and `end`, counting a partial last one.
    pub fn bucket_count(&self) -> usize {
        let mut count = 0;
        let mut boundary = self.start;
        while boundary <= self.end {
            count += 1;
            boundary = self.interval.advance(&boundary);
        }
        count
    }
}

pub fn start_date(range: TimeRange, now: &DateTime<Tz>) -> DateTime<Tz> {
    match range {
        TimeRange::Day => start_of_day(now),
        TimeRange::Week => start_of_day(&days_before(now, 6)),
        TimeRange::Month => start_of_day(&months_before(now, 1)),
    }
}
