// Time range domain model
use chrono::{DateTime, Days, Duration};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The display window granularity selected by the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeRange {
    Day,
    Week,
    Month,
}

/// Width of one aggregation bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BucketInterval {
    Hour,
    Day,
}

/// Per-range parameters for bucketing and axis labelling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeParams {
    pub interval: BucketInterval,
    /// Keep every n-th axis marker.
    pub axis_stride: usize,
    pub axis_format: AxisFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AxisFormat {
    Hour,
    Weekday,
    MonthDay,
}

impl TimeRange {
    pub const ALL: [TimeRange; 3] = [TimeRange::Day, TimeRange::Week, TimeRange::Month];

    pub fn params(self) -> RangeParams {
        match self {
            TimeRange::Day => RangeParams {
                interval: BucketInterval::Hour,
                axis_stride: 3,
                axis_format: AxisFormat::Hour,
            },
            TimeRange::Week => RangeParams {
                interval: BucketInterval::Day,
                axis_stride: 1,
                axis_format: AxisFormat::Weekday,
            },
            TimeRange::Month => RangeParams {
                interval: BucketInterval::Day,
                axis_stride: 7,
                axis_format: AxisFormat::MonthDay,
            },
        }
    }

    pub fn interval(self) -> BucketInterval {
        self.params().interval
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TimeRange::Day => "day",
            TimeRange::Week => "week",
            TimeRange::Month => "month",
        }
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimeRange {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "day" => Ok(TimeRange::Day),
            "week" => Ok(TimeRange::Week),
            "month" => Ok(TimeRange::Month),
            other => Err(format!("unknown time range '{}'", other)),
        }
    }
}

impl BucketInterval {
    /// Step a bucket boundary forward by one interval.
    ///
    /// Days are added on the local calendar so buckets stay midnight-aligned
    /// across DST changes.
    pub fn advance(self, from: &DateTime<Tz>) -> DateTime<Tz> {
        match self {
            BucketInterval::Hour => from.clone() + Duration::hours(1),
            BucketInterval::Day => from
                .clone()
                .checked_add_days(Days::new(1))
                .unwrap_or_else(|| from.clone() + Duration::days(1)),
        }
    }

    /// InfluxQL duration literal for `GROUP BY time(..)`.
    pub fn influx_duration(self) -> &'static str {
        match self {
            BucketInterval::Hour => "1h",
            BucketInterval::Day => "1d",
        }
    }
}
