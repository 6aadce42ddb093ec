use axum::{
    routing::{get, post},
    Router,
};
use hubcast_core::{HubcastConfig, Result};
use hubcast_hub::{ClientSettings, HubHandle};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Central shared state, passed as Arc<AppState> to all Axum handlers.
pub struct AppState {
    pub config: HubcastConfig,
    pub hub: HubHandle,
    pub client: ClientSettings,
    /// Root token. Every connection runs under a child of it.
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(config: HubcastConfig, hub: HubHandle, shutdown: CancellationToken) -> Result<Self> {
        let client = ClientSettings::from_config(&config)?;
        Ok(Self {
            config,
            hub,
            client,
            shutdown,
        })
    }
}

/// Assemble the full Axum router.
pub fn build_router(state: Arc<AppState>) -> Router {
    let allow_any_origin = state.config.gateway.allow_any_origin;
    let router = Router::new()
        .route("/health", get(crate::http::health::health_handler))
        .route("/ws", get(crate::ws::connection::ws_handler))
        .route("/events", get(crate::http::events::events_handler))
        .route("/webhooks", post(crate::http::webhooks::webhook_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    if allow_any_origin {
        router.layer(CorsLayer::permissive())
    } else {
        router
    }
}
