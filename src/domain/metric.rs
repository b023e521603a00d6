// Health metric domain model
use serde::{Deserialize, Serialize};
use std::fmt;

/// Health quantity types tracked by the mobility charts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MetricKind {
    StepCount,
    DistanceWalkingRunning,
    WalkingSpeed,
    WalkingStepLength,
}

/// How samples inside one bucket are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StatisticsOption {
    CumulativeSum,
    DiscreteAverage,
}

impl StatisticsOption {
    pub fn influx_function(self) -> &'static str {
        match self {
            StatisticsOption::CumulativeSum => "sum",
            StatisticsOption::DiscreteAverage => "mean",
        }
    }
}

impl MetricKind {
    pub const ALL: [MetricKind; 4] = [
        MetricKind::StepCount,
        MetricKind::DistanceWalkingRunning,
        MetricKind::WalkingSpeed,
        MetricKind::WalkingStepLength,
    ];

    /// Health store type identifier.
    pub fn identifier(self) -> &'static str {
        match self {
            MetricKind::StepCount => "HKQuantityTypeIdentifierStepCount",
            MetricKind::DistanceWalkingRunning => "HKQuantityTypeIdentifierDistanceWalkingRunning",
            MetricKind::WalkingSpeed => "HKQuantityTypeIdentifierWalkingSpeed",
            MetricKind::WalkingStepLength => "HKQuantityTypeIdentifierWalkingStepLength",
        }
    }

    pub fn from_identifier(identifier: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.identifier() == identifier)
    }

    pub fn display_name(self) -> &'static str {
        match self {
            MetricKind::StepCount => "Step Count",
            MetricKind::DistanceWalkingRunning => "Distance Walking + Running",
            MetricKind::WalkingSpeed => "Walking Speed",
            MetricKind::WalkingStepLength => "Walking Step Length",
        }
    }

    /// Counts and distances are summed; rates and lengths are averaged.
    pub fn statistics_option(self) -> StatisticsOption {
        match self {
            MetricKind::StepCount | MetricKind::DistanceWalkingRunning => {
                StatisticsOption::CumulativeSum
            }
            MetricKind::WalkingSpeed | MetricKind::WalkingStepLength => {
                StatisticsOption::DiscreteAverage
            }
        }
    }

    pub fn preferred_unit(self) -> Unit {
        match self {
            MetricKind::StepCount => Unit::Count,
            MetricKind::DistanceWalkingRunning => Unit::Meter,
            MetricKind::WalkingSpeed => Unit::MeterPerSecond,
            MetricKind::WalkingStepLength => Unit::Centimeter,
        }
    }

    /// Measurement name used by time-series backends.
    pub fn measurement(self) -> &'static str {
        match self {
            MetricKind::StepCount => "step_count",
            MetricKind::DistanceWalkingRunning => "distance_walking_running",
            MetricKind::WalkingSpeed => "walking_speed",
            MetricKind::WalkingStepLength => "walking_step_length",
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.identifier())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Unit {
    Count,
    Meter,
    Kilometer,
    Centimeter,
    MeterPerSecond,
    KilometerPerHour,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Dimension {
    Scalar,
    Length,
    Speed,
}

impl Unit {
    fn dimension(self) -> Dimension {
        match self {
            Unit::Count => Dimension::Scalar,
            Unit::Meter | Unit::Kilometer | Unit::Centimeter => Dimension::Length,
            Unit::MeterPerSecond | Unit::KilometerPerHour => Dimension::Speed,
        }
    }

    /// Factor to the dimension's base unit (count, meter, meter/second).
    fn base_factor(self) -> f64 {
        match self {
            Unit::Count | Unit::Meter | Unit::MeterPerSecond => 1.0,
            Unit::Kilometer => 1000.0,
            Unit::Centimeter => 0.01,
            Unit::KilometerPerHour => 1000.0 / 3600.0,
        }
    }

    /// Legend text shown next to a chart series.
    pub fn description(self) -> &'static str {
        match self {
            Unit::Count => "steps",
            Unit::Meter => "meters",
            Unit::Kilometer => "kilometers",
            Unit::Centimeter => "centimeters",
            Unit::MeterPerSecond => "meters / second",
            Unit::KilometerPerHour => "kilometers / hour",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quantity {
    pub value: f64,
    pub unit: Unit,
}

impl Quantity {
    pub fn new(value: f64, unit: Unit) -> Self {
        Self { value, unit }
    }

    /// Value expressed in `unit`, or `None` when the dimensions differ.
    pub fn value_in(&self, unit: Unit) -> Option<f64> {
        if self.unit.dimension() != unit.dimension() {
            return None;
        }
        Some(self.value * self.unit.base_factor() / unit.base_factor())
    }
}
