// Application layer - Use cases and ports
pub mod anchor_store;
pub mod calendar;
pub mod chart_presenter;
pub mod clock;
pub mod date_range_formatter;
pub mod health_store;
pub mod live_update_watcher;
pub mod mobility_screen;
pub mod sample_sync;
pub mod statistics_aggregator;
pub mod time_range_resolver;
