use chrono::{TimeZone, Utc};
use chrono_tz::Tz;
use smoothwalker_charts::application::clock::FixedClock;
use smoothwalker_charts::application::mobility_screen::{MobilityScreen, ScreenContext};
use smoothwalker_charts::domain::metric::{MetricKind, Quantity, Unit};
use smoothwalker_charts::domain::sample::Sample;
use smoothwalker_charts::domain::time_range::TimeRange;
use smoothwalker_charts::infrastructure::anchor_file::MemoryAnchorStore;
use smoothwalker_charts::infrastructure::http_sync::LoggingSampleSync;
use smoothwalker_charts::infrastructure::memory_store::MemoryHealthStore;
use smoothwalker_charts::presentation::{app_state::AppState, router};
use std::sync::Arc;

async fn serve() -> String {
    let store = MemoryHealthStore::new();
    let time = Utc.with_ymd_and_hms(2020, 6, 10, 9, 0, 0).unwrap();
    store
        .insert(vec![Sample::at(
            MetricKind::StepCount,
            time,
            Quantity::new(320.0, Unit::Count),
        )])
        .await;

    let context = ScreenContext {
        store: Arc::new(store),
        anchors: Arc::new(MemoryAnchorStore::new()),
        sync: Arc::new(LoggingSampleSync),
        clock: Arc::new(FixedClock::new(
            Tz::UTC.with_ymd_and_hms(2020, 6, 10, 14, 30, 0).unwrap(),
        )),
    };
    let screen = MobilityScreen::spawn(context, vec![MetricKind::StepCount], TimeRange::Week);
    screen.appear().await.unwrap();

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = router(Arc::new(AppState::new(screen)));
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

    format!("http://{}", addr)
}

#[tokio::test]
async fn test_healthz() {
    let base = serve().await;
    let body = reqwest::get(format!("{}/healthz", base))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert_eq!(body, "ok");
}

#[tokio::test]
async fn test_select_range_returns_settled_day_charts() {
    let base = serve().await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/charts/range/day", base))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["range"], "day");
    assert_eq!(body["pending"], 0);
    let chart = &body["charts"][0];
    assert_eq!(chart["subtitle"], "Jun 10, 2020");
    assert_eq!(chart["series"][0]["values"], serde_json::json!([320.0]));
    assert_eq!(chart["axis_markers"], serde_json::json!(["0", "3", "6", "9", "12"]));
}

#[tokio::test]
async fn test_invalid_range_is_rejected() {
    let base = serve().await;
    let response = reqwest::get(format!("{}/charts?range=year", base)).await.unwrap();
    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn test_brotli_when_accepted() {
    let base = serve().await;
    let response = reqwest::Client::new()
        .get(format!("{}/charts", base))
        .header("Accept-Encoding", "br")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(response.headers()["content-encoding"], "br");
}

#[tokio::test]
async fn test_watcher_states_listed() {
    let base = serve().await;
    let body: serde_json::Value = reqwest::get(format!("{}/charts/watchers", base))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body[0]["metric"], MetricKind::StepCount.identifier());
}

#[tokio::test]
async fn test_stream_pushes_settled_snapshot_events() {
    let base = serve().await;
    let mut response = reqwest::get(format!("{}/charts/stream", base)).await.unwrap();
    assert_eq!(response.status(), 200);
    assert!(response.headers()["content-type"]
        .to_str()
        .unwrap()
        .starts_with("text/event-stream"));

    let mut body = String::new();
    tokio::time::timeout(std::time::Duration::from_secs(3), async {
        while !body.contains("\n\n") {
            let chunk = response.chunk().await.unwrap().expect("stream ended");
            body.push_str(&String::from_utf8_lossy(&chunk));
        }
    })
    .await
    .expect("no event received");

    assert!(body.lines().any(|line| line.starts_with("event:") && line.ends_with("dashboard")));
    let data = body
        .lines()
        .find_map(|line| line.strip_prefix("data:"))
        .map(str::trim_start)
        .unwrap();
    let snapshot: serde_json::Value = serde_json::from_str(data).unwrap();
    assert_eq!(snapshot["pending"], 0);
}
