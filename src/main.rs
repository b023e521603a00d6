// Main entry point - Dependency injection and server setup
use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use smoothwalker_charts::application::anchor_store::AnchorStore;
use smoothwalker_charts::application::clock::SystemClock;
use smoothwalker_charts::application::health_store::HealthStore;
use smoothwalker_charts::application::mobility_screen::{MobilityScreen, ScreenContext};
use smoothwalker_charts::application::sample_sync::SampleSync;
use smoothwalker_charts::infrastructure::anchor_file::FileAnchorStore;
use smoothwalker_charts::infrastructure::config::{load_app_config, load_influx_config, StoreBackend};
use smoothwalker_charts::infrastructure::http_sync::{HttpSampleSync, LoggingSampleSync};
use smoothwalker_charts::infrastructure::influx_store::InfluxHealthStore;
use smoothwalker_charts::infrastructure::memory_store::MemoryHealthStore;
use smoothwalker_charts::presentation::{app_state::AppState, router};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Load configuration
    let config = load_app_config()?;
    let tz = config.app.time_zone()?;
    let metrics = config.app.metric_kinds();

    // Create adapters (infrastructure layer)
    let store: Arc<dyn HealthStore> = match config.store.backend {
        StoreBackend::Memory => {
            tracing::warn!("Using the in-memory store; charts stay empty until samples are inserted");
            Arc::new(MemoryHealthStore::new())
        }
        StoreBackend::Influx => Arc::new(InfluxHealthStore::new(load_influx_config()?.influx)),
    };
    let anchors: Arc<dyn AnchorStore> = Arc::new(FileAnchorStore::new(config.app.anchor_path.clone()));
    let sync: Arc<dyn SampleSync> = match &config.sync.endpoint {
        Some(endpoint) => Arc::new(HttpSampleSync::new(endpoint.clone(), config.sync.token.clone())?),
        None => Arc::new(LoggingSampleSync),
    };

    // Start the screen loop (application layer)
    let context = ScreenContext {
        store,
        anchors,
        sync,
        clock: Arc::new(SystemClock::new(tz)),
    };
    let screen = MobilityScreen::spawn(context, metrics, config.app.initial_range);
    screen.appear().await?;

    let state = Arc::new(AppState::new(screen.clone()));

    // Start server
    let addr: SocketAddr = config
        .app
        .listen_addr
        .parse()
        .with_context(|| format!("invalid listen address '{}'", config.app.listen_addr))?;
    tracing::info!("Starting smoothwalker-charts on {} ({})", addr, tz);

    axum::serve(tokio::net::TcpListener::bind(addr).await?, router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    screen.shutdown().await.ok();
    Ok(())
}
