// Infrastructure layer - External dependencies and adapters
pub mod anchor_file;
pub mod config;
pub mod http_response;
pub mod http_sync;
pub mod influx_store;
pub mod memory_store;
pub mod snapshot_events;
