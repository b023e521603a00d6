// Chart domain models
use super::time_range::TimeRange;
use serde::Serialize;

/// Aggregated values for one tracked metric, in bucket order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricSeries {
    pub identifier: String,
    pub values: Vec<f64>,
}

impl MetricSeries {
    pub fn new(identifier: impl Into<String>, values: Vec<f64>) -> Self {
        Self {
            identifier: identifier.into(),
            values,
        }
    }

    pub fn empty(identifier: impl Into<String>) -> Self {
        Self::new(identifier, Vec::new())
    }
}

pub type AxisLabelSet = Vec<String>;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataSeries {
    pub values: Vec<f64>,
    pub legend: String,
}

/// What the chart widget renders.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartDisplayModel {
    pub identifier: String,
    pub title: String,
    pub subtitle: String,
    pub axis_markers: AxisLabelSet,
    pub series: Vec<DataSeries>,
    /// Footer such as "last updated on Jun 10, 2020"; absent until data has loaded.
    pub last_updated: Option<String>,
}

/// Consistent snapshot of every chart on the screen.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dashboard {
    pub range: TimeRange,
    pub charts: Vec<ChartDisplayModel>,
    /// Bumped every time the snapshot changes.
    pub revision: u64,
    /// Metric queries still in flight.
    pub pending: usize,
}

impl Dashboard {
    pub fn new(range: TimeRange, charts: Vec<ChartDisplayModel>, revision: u64, pending: usize) -> Self {
        Self {
            range,
            charts,
            revision,
            pending,
        }
    }

    pub fn is_settled(&self) -> bool {
        self.pending == 0
    }

    pub fn chart(&self, identifier: &str) -> Option<&ChartDisplayModel> {
        self.charts.iter().find(|c| c.identifier == identifier)
    }
}
