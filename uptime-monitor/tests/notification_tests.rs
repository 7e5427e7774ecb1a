//! Channel delivery against local webhook receivers.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use axum::{
    Router,
    extract::State,
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::post,
};
use chrono::Utc;
use tokio::net::TcpListener;
use url::Url;

use uptime_monitor::Error;
use uptime_monitor::monitor::{CheckResult, SiteStatus};
use uptime_monitor::notification::{
    DiscordChannel, DiscordConfig, NotificationChannel, NotificationEvent, NotifyTarget,
    channel_for_target,
};

#[derive(Clone, Default)]
struct Receiver {
    hits: Arc<AtomicUsize>,
    /// Number of leading requests answered with 429.
    rate_limited: usize,
    retry_after: &'static str,
}

async fn hook(State(receiver): State<Receiver>, headers: HeaderMap) -> Response {
    let hit = receiver.hits.fetch_add(1, Ordering::SeqCst);
    if hit < receiver.rate_limited {
        return (
            StatusCode::TOO_MANY_REQUESTS,
            [(header::RETRY_AFTER, receiver.retry_after)],
        )
            .into_response();
    }

    let authorized = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .is_none_or(|v| v == "Bearer s3cret");
    if authorized {
        StatusCode::NO_CONTENT.into_response()
    } else {
        StatusCode::UNAUTHORIZED.into_response()
    }
}

async fn spawn_receiver(receiver: Receiver) -> String {
    let router = Router::new().route("/hook", post(hook)).with_state(receiver);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}/hook", addr)
}

fn discord(url: String) -> DiscordChannel {
    DiscordChannel::new(DiscordConfig {
        webhook_url: url,
        username: "Uptime Monitor".to_string(),
        timeout_secs: 5,
    })
}

fn down_event() -> NotificationEvent {
    NotificationEvent::status_changed(
        SiteStatus::Up,
        CheckResult {
            url: "https://example.com".to_string(),
            status: SiteStatus::Down,
            code: None,
            response_time: 10_000,
            checked_at: Utc::now(),
            error: Some("Request timeout (10s)".to_string()),
        },
    )
}

#[tokio::test]
async fn test_discord_retries_after_rate_limit() {
    let receiver = Receiver {
        rate_limited: 1,
        retry_after: "0.01",
        ..Default::default()
    };
    let hits = receiver.hits.clone();
    let channel = discord(spawn_receiver(receiver).await);

    channel.send(&down_event()).await.unwrap();

    assert_eq!(hits.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_discord_gives_up_after_three_attempts() {
    let receiver = Receiver {
        rate_limited: usize::MAX,
        retry_after: "0.01",
        ..Default::default()
    };
    let hits = receiver.hits.clone();
    let channel = discord(spawn_receiver(receiver).await);

    let err = channel.send(&down_event()).await.unwrap_err();

    assert!(matches!(err, Error::Notification(_)), "{err}");
    assert_eq!(hits.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_discord_huge_retry_after_does_not_panic() {
    let receiver = Receiver {
        rate_limited: usize::MAX,
        retry_after: "1e30",
        ..Default::default()
    };
    let channel = discord(spawn_receiver(receiver).await);

    // The first 429 parks the send in a capped wait instead of panicking.
    let outcome =
        tokio::time::timeout(Duration::from_millis(300), channel.send(&down_event())).await;

    assert!(outcome.is_err());
}

#[tokio::test]
async fn test_discord_test_message() {
    let receiver = Receiver::default();
    let hits = receiver.hits.clone();
    let channel = discord(spawn_receiver(receiver).await);

    channel.test().await.unwrap();

    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_webhook_sends_bearer_token() {
    let url = Url::parse(&spawn_receiver(Receiver::default()).await).unwrap();

    let mut target = NotifyTarget::new(url);
    target.bearer_token = Some("s3cret".to_string());
    channel_for_target(&target).send(&down_event()).await.unwrap();
    channel_for_target(&target).test().await.unwrap();

    target.bearer_token = Some("wrong".to_string());
    let err = channel_for_target(&target)
        .send(&down_event())
        .await
        .unwrap_err();
    assert!(err.to_string().contains("401"), "{err}");
}
