// SmoothWalker charts - Time-range aggregation and charting for mobility metrics
pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod presentation;
