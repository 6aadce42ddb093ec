//! Server-Sent Events listener, GET /events?name=<display name>.
//!
//! The listener joins the hub as a receive-only member with the same bounded
//! queue as a WebSocket client, so a stalled reader is evicted the same way.
//! Dropping the response stream leaves the hub.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use futures_util::Stream;
use serde_json::{json, Value};
use std::convert::Infallible;
use std::sync::Arc;
use tracing::{info, warn};

use crate::app::AppState;
use crate::params::JoinParams;

pub async fn events_handler(
    Query(params): Query<JoinParams>,
    State(state): State<Arc<AppState>>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, (StatusCode, Json<Value>)> {
    let name = params.display_name();
    let mut subscription = state
        .hub
        .subscribe(name.clone(), state.client.outbound_capacity)
        .map_err(|e| {
            warn!(name = %name, error = %e, "could not attach SSE listener");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({"error": "hub unavailable", "code": e.code()})),
            )
        })?;
    info!(client = %subscription.id(), name = %name, "SSE listener attached");

    let shutdown = state.shutdown.clone();
    let stream = async_stream::stream! {
        loop {
            let next = tokio::select! {
                next = subscription.recv() => next,
                _ = shutdown.cancelled() => None,
            };
            let Some(payload) = next else { break };
            // SSE lines end at CR or LF; data is split on '\n' by the encoder
            let text = String::from_utf8_lossy(payload.as_bytes()).replace('\r', "");
            yield Ok(Event::default().data(text));
        }
        info!(client = %subscription.id(), "SSE listener detached");
        yield Ok(Event::default().event("done").data("Stream ended"));
    };

    Ok(Sse::new(stream).keep_alive(KeepAlive::new().interval(state.client.heartbeat.ping_interval())))
}
