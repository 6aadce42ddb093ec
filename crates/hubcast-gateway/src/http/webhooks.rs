//! Webhook ingress endpoint, POST /webhooks.
//!
//! Accepts `{"event_type": "...", "data": {...}}` from an upstream provider
//! and announces it to every hub member as a system notice.

use axum::{body::Bytes, extract::State, http::StatusCode, Json};
use hubcast_core::payload::single_line;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, warn};

use crate::app::AppState;

#[derive(Debug, Deserialize)]
pub struct WebhookEvent {
    pub event_type: String,
    #[serde(default)]
    pub data: Value,
}

impl WebhookEvent {
    /// `data.user_id` as plain text, `unknown` when absent.
    pub fn user(&self) -> String {
        match self.data.get("user_id") {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) | None => "unknown".to_string(),
            Some(other) => other.to_string(),
        }
    }

    pub fn notice(&self) -> String {
        single_line(&format!(
            "New event: {} for user {}",
            self.event_type,
            self.user()
        ))
    }
}

/// POST /webhooks
///
/// Returns 200 `{"status":"received"}` once the notice is queued, 400 on a
/// body that does not parse, 404 when webhooks are disabled.
pub async fn webhook_handler(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    if !state.config.webhooks.enabled {
        warn!("webhook received but subsystem is disabled");
        return Err((
            StatusCode::NOT_FOUND,
            Json(json!({"error": "webhook subsystem is disabled"})),
        ));
    }

    info!(bytes = body.len(), "webhook arrived");

    let event: WebhookEvent = serde_json::from_slice(&body).map_err(|e| {
        warn!(error = %e, "invalid JSON in webhook body");
        (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "invalid JSON body"})),
        )
    })?;

    state.hub.notify(event.notice()).map_err(|e| {
        warn!(error = %e, "failed to forward webhook to hub");
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({"error": "hub unavailable", "code": e.code()})),
        )
    })?;

    info!(event_type = %event.event_type, "webhook accepted");
    Ok(Json(json!({"status": "received"})))
}
