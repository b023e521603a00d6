// Server-sent events carrying settled dashboard snapshots
use crate::domain::chart::Dashboard;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::{Stream, StreamExt};
use std::time::Duration;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);

/// Settled snapshots, starting with the current one; each revision is yielded once.
pub fn settled_snapshots(rx: watch::Receiver<Dashboard>) -> impl Stream<Item = Dashboard> {
    async_stream::stream! {
        let mut updates = WatchStream::new(rx);
        let mut last_sent = None;
        while let Some(snapshot) = updates.next().await {
            if !snapshot.is_settled() || last_sent == Some(snapshot.revision) {
                continue;
            }
            last_sent = Some(snapshot.revision);
            yield snapshot;
        }
    }
}

/// One `dashboard` event per settled snapshot, keyed by revision.
pub fn dashboard_events(
    rx: watch::Receiver<Dashboard>,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    let events = settled_snapshots(rx).map(|snapshot| {
        tracing::debug!("Pushing dashboard revision {}", snapshot.revision);
        Event::default()
            .event("dashboard")
            .id(snapshot.revision.to_string())
            .json_data(&snapshot)
    });

    Sse::new(events).keep_alive(KeepAlive::new().interval(KEEP_ALIVE_INTERVAL))
}
