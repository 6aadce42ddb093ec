use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use futures_util::StreamExt;
use hubcast_core::{HubcastConfig, Payload};
use hubcast_gateway::app::{build_router, AppState};
use hubcast_hub::{Hub, HubHandle};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

fn app_with(config: HubcastConfig, hub: HubHandle) -> (Router, CancellationToken) {
    let shutdown = CancellationToken::new();
    let state = Arc::new(AppState::new(config, hub, shutdown.clone()).unwrap());
    (build_router(state), shutdown)
}

fn app() -> (Router, HubHandle) {
    let hub = Hub::spawn();
    let (router, _) = app_with(HubcastConfig::default(), hub.clone());
    (router, hub)
}

async fn json_body(resp: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(resp.into_body(), 10_000).await.unwrap();
    serde_json::from_slice(&body).unwrap()
}

async fn read_until<S>(body: &mut S, seen: &mut String, needle: &str)
where
    S: futures_util::Stream<Item = Result<axum::body::Bytes, axum::Error>> + Unpin,
{
    while !seen.contains(needle) {
        let chunk = tokio::time::timeout(Duration::from_secs(5), body.next())
            .await
            .expect("timed out reading event stream")
            .expect("stream ended early")
            .unwrap();
        seen.push_str(&String::from_utf8_lossy(&chunk));
    }
}

fn post_webhook(body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/webhooks")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn health_endpoint_returns_ok() {
    let (app, hub) = app();
    let _listener = hub.subscribe("listener", 8).unwrap();

    let req = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let parsed = json_body(resp).await;
    assert_eq!(parsed["status"], "ok");
    assert_eq!(parsed["clients"], 1);
    assert_eq!(parsed["hub"]["joins"], 1);
    assert!(parsed["hub"]["started_at"].is_string());
}

#[tokio::test]
async fn health_reports_unavailable_hub() {
    let (hub, handle) = Hub::new();
    drop(hub);
    let (app, _) = app_with(HubcastConfig::default(), handle);

    let req = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json_body(resp).await["code"], "HUB_UNAVAILABLE");
}

#[tokio::test]
async fn webhook_is_announced_to_members() {
    let (app, hub) = app();
    let mut listener = hub.subscribe("listener", 8).unwrap();

    let resp = app
        .oneshot(post_webhook(
            r#"{"event_type":"payment_succeeded","data":{"user_id":"u-42","amount":10}}"#,
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(json_body(resp).await["status"], "received");

    assert_eq!(
        listener.recv().await,
        Some(Payload::from("[system] New event: payment_succeeded for user u-42"))
    );
}

#[tokio::test]
async fn webhook_rejects_invalid_json() {
    let (app, hub) = app();
    let resp = app.oneshot(post_webhook("{not json")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(hub.stats().await.unwrap().broadcasts, 0);
}

#[tokio::test]
async fn webhook_disabled_returns_404() {
    let mut config = HubcastConfig::default();
    config.webhooks.enabled = false;
    let (app, _) = app_with(config, Hub::spawn());

    let resp = app
        .oneshot(post_webhook(r#"{"event_type":"x"}"#))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn cors_allows_any_origin_by_default() {
    let (app, _) = app();
    let req = Request::builder()
        .uri("/health")
        .header(header::ORIGIN, "http://example.test")
        .body(Body::empty())
        .unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(
        resp.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
        "*"
    );
}

#[tokio::test]
async fn unknown_route_returns_404() {
    let (app, _) = app();
    let req = Request::builder().uri("/nonexistent").body(Body::empty()).unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn event_stream_relays_hub_traffic_until_shutdown() {
    let hub = Hub::spawn();
    let (app, shutdown) = app_with(HubcastConfig::default(), hub.clone());

    let req = Request::builder()
        .uri("/events?name=viewer")
        .body(Body::empty())
        .unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        resp.headers().get(header::CONTENT_TYPE).unwrap(),
        "text/event-stream"
    );

    let members = hub.members().await.unwrap();
    assert_eq!(members.len(), 1);
    assert_eq!(members[0].name, "viewer");

    let mut body = resp.into_body().into_data_stream();
    let mut seen = String::new();

    hub.notify("hello").unwrap();
    read_until(&mut body, &mut seen, "data: [system] hello\n\n").await;

    shutdown.cancel();
    read_until(&mut body, &mut seen, "data: Stream ended\n").await;
    assert!(seen.contains("event: done\n"));

    drop(body);
    assert_eq!(hub.stats().await.unwrap().clients, 0);
}
