//! End-to-end runs: scheduled batches against a local site, alerts delivered
//! to a local webhook receiver, and the health server reporting the results.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use axum::{Json, Router, extract::State, http::StatusCode, routing::{get, post}};
use parking_lot::Mutex;
use tokio::net::TcpListener;
use url::Url;

use uptime_monitor::api::{AppState, HealthServer, HealthServerConfig};
use uptime_monitor::config::parse_cron_expression;
use uptime_monitor::monitor::{
    AlertDispatcher, RateLimiter, RateLimiterConfig, SiteChecker, SiteStatus, StatusStore,
};
use uptime_monitor::notification::{NotifyTarget, channel_for_target};
use uptime_monitor::scheduler::CheckScheduler;
use uptime_monitor::utils::http_client::build_notify_client;

#[derive(Clone, Default)]
struct Fixture {
    healthy: Arc<AtomicBool>,
    received: Arc<Mutex<Vec<serde_json::Value>>>,
}

async fn site(State(fixture): State<Fixture>) -> StatusCode {
    if fixture.healthy.load(Ordering::SeqCst) {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

async fn receive(State(fixture): State<Fixture>, Json(body): Json<serde_json::Value>) -> StatusCode {
    fixture.received.lock().push(body);
    StatusCode::NO_CONTENT
}

async fn receive_slowly(state: State<Fixture>, body: Json<serde_json::Value>) -> StatusCode {
    tokio::time::sleep(Duration::from_millis(500)).await;
    receive(state, body).await
}

async fn spawn_fixture() -> (Fixture, String) {
    let fixture = Fixture::default();
    fixture.healthy.store(true, Ordering::SeqCst);

    let router = Router::new()
        .route("/site", get(site))
        .route("/hook", post(receive))
        .route("/slow-hook", post(receive_slowly))
        .with_state(fixture.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    (fixture, format!("http://{}", addr))
}

fn build_scheduler(base: &str, burst: f64, store: Arc<StatusStore>) -> CheckScheduler {
    build_scheduler_for(base, "/hook", vec![format!("{base}/site")], burst, store)
}

fn build_scheduler_for(
    base: &str,
    hook: &str,
    sites: Vec<String>,
    burst: f64,
    store: Arc<StatusStore>,
) -> CheckScheduler {
    let target = Url::parse(&format!("{base}{hook}")).unwrap();
    let limiter = RateLimiter::new(RateLimiterConfig::new(burst, 3600.0)).unwrap();
    let dispatcher = Arc::new(AlertDispatcher::new(
        store,
        limiter,
        channel_for_target(&NotifyTarget::new(target)),
    ));
    CheckScheduler::new(
        sites,
        parse_cron_expression("*/1 * * * *").unwrap(),
        Arc::new(SiteChecker::new().unwrap()),
        dispatcher,
    )
}

#[tokio::test]
async fn test_transitions_are_alerted_once() {
    let (fixture, base) = spawn_fixture().await;
    let store = Arc::new(StatusStore::new());
    let scheduler = build_scheduler(&base, 5.0, store.clone());

    let results = scheduler.run_once().await;
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].status, SiteStatus::Up);
    assert!(fixture.received.lock().is_empty());

    fixture.healthy.store(false, Ordering::SeqCst);
    let results = scheduler.run_once().await;
    assert_eq!(results[0].code, Some(503));
    scheduler.run_once().await;

    {
        let received = fixture.received.lock();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0]["event_type"], "site_down");
        assert_eq!(received[0]["priority"], "critical");
        assert_eq!(received[0]["result"]["status"], "DOWN");
        assert_eq!(received[0]["result"]["error"], "HTTP 503");
        assert_eq!(received[0]["previous_status"], "UP");
    }

    fixture.healthy.store(true, Ordering::SeqCst);
    scheduler.run_once().await;

    let received = fixture.received.lock();
    assert_eq!(received.len(), 2);
    assert_eq!(received[1]["event_type"], "site_recovered");
    assert_eq!(
        store.get(&format!("{base}/site")).unwrap().status,
        SiteStatus::Up
    );
}

#[tokio::test]
async fn test_flapping_site_alerts_are_capped() {
    let (fixture, base) = spawn_fixture().await;
    let scheduler = build_scheduler(&base, 2.0, Arc::new(StatusStore::new()));

    scheduler.run_once().await;
    for _ in 0..3 {
        fixture.healthy.store(false, Ordering::SeqCst);
        scheduler.run_once().await;
        fixture.healthy.store(true, Ordering::SeqCst);
        scheduler.run_once().await;
    }

    assert_eq!(fixture.received.lock().len(), 2);
}

#[tokio::test]
async fn test_alerts_for_different_sites_are_delivered_concurrently() {
    let (fixture, base) = spawn_fixture().await;
    let sites = vec![
        format!("{base}/site?a"),
        format!("{base}/site?b"),
        format!("{base}/site?c"),
    ];
    let scheduler =
        build_scheduler_for(&base, "/slow-hook", sites, 5.0, Arc::new(StatusStore::new()));

    scheduler.run_once().await;
    fixture.healthy.store(false, Ordering::SeqCst);

    let started = Instant::now();
    scheduler.run_once().await;
    let elapsed = started.elapsed();

    assert_eq!(fixture.received.lock().len(), 3);
    // Three 500ms deliveries in sequence would take at least 1.5s.
    assert!(elapsed < Duration::from_millis(1200), "{elapsed:?}");
}

#[tokio::test]
async fn test_scheduler_stops_on_cancel() {
    let (_fixture, base) = spawn_fixture().await;
    let scheduler = build_scheduler(&base, 1.0, Arc::new(StatusStore::new()));
    let cancel_token = tokio_util::sync::CancellationToken::new();

    cancel_token.cancel();
    let stopped = tokio::time::timeout(Duration::from_secs(5), scheduler.run(cancel_token)).await;

    assert!(stopped.is_ok());
}

#[tokio::test]
async fn test_health_server_reports_results() {
    let (_fixture, base) = spawn_fixture().await;
    let store = Arc::new(StatusStore::new());
    let scheduler = build_scheduler(&base, 1.0, store.clone());
    scheduler.run_once().await;

    let server = Arc::new(HealthServer::new(
        HealthServerConfig::default(),
        AppState::new(store, scheduler.sites().len()),
    ));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn({
        let server = server.clone();
        async move { server.serve(listener).await }
    });

    let client = build_notify_client(Duration::from_secs(5));
    let body: serde_json::Value = client
        .get(format!("http://{addr}/healthz"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["status"], "ok");
    assert_eq!(body["sitesConfigured"], 1);
    assert_eq!(body["lastKnown"][0]["url"], format!("{base}/site"));
    assert_eq!(body["lastKnown"][0]["status"], "UP");

    let live = client
        .get(format!("http://{addr}/healthz/live"))
        .send()
        .await
        .unwrap();
    assert_eq!(live.status(), reqwest::StatusCode::OK);

    server.shutdown();
    let result = tokio::time::timeout(Duration::from_secs(5), handle).await;
    assert!(matches!(result, Ok(Ok(Ok(())))));
}
