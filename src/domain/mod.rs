// Domain layer - Health metrics, samples and chart models
pub mod chart;
pub mod metric;
pub mod sample;
pub mod statistics;
pub mod time_range;
