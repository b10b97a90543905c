//! HTTP routes for event intake and administration.

use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use event_gateway_events::{ChannelInfo, Event, EventRegistry, EventService, GatewayError};
use http::StatusCode;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;

/// Shared state for all routes.
#[derive(Clone)]
pub struct AppState {
    pub service: EventService,
    pub registry: Arc<EventRegistry>,
}

impl AppState {
    /// Creates new route state.
    pub fn new(service: EventService, registry: Arc<EventRegistry>) -> Self {
        Self { service, registry }
    }
}

/// Creates the public router: `POST /event` and `GET /healthz`.
pub fn event_routes(state: AppState) -> Router {
    Router::new()
        .route("/event", post(event_handler))
        .route("/healthz", get(healthz_handler))
        .with_state(state)
}

/// Creates the admin router: `POST /admin/reload-channels` and
/// `GET /admin/channels`.
pub fn admin_routes(state: AppState) -> Router {
    Router::new()
        .route("/admin/reload-channels", post(reload_channels_handler))
        .route("/admin/channels", get(channels_handler))
        .with_state(state)
}

/// Wrapper for GatewayError that implements IntoResponse.
pub struct ErrorResponse(pub GatewayError);

impl IntoResponse for ErrorResponse {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.0.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = json!({
            "error": self.0.to_string(),
            "kind": self.0.kind().as_label(),
            "reasons": self.0.reasons(),
        });

        (status, axum::Json(body)).into_response()
    }
}

impl From<GatewayError> for ErrorResponse {
    fn from(err: GatewayError) -> Self {
        ErrorResponse(err)
    }
}

fn bad_request(message: String) -> Response {
    let body = json!({
        "error": message,
        "kind": "bad_request",
        "reasons": [],
    });
    (StatusCode::BAD_REQUEST, axum::Json(body)).into_response()
}

async fn event_handler(State(state): State<AppState>, body: Bytes) -> Response {
    let event: Event = match serde_json::from_slice(&body) {
        Ok(event) => event,
        Err(e) => {
            tracing::debug!(error = %e, "Rejected malformed event body");
            return bad_request(format!("invalid request body: {}", e));
        }
    };

    match state.service.process_event(&event).await {
        Ok(()) => axum::Json(json!({ "status": "ok", "id": event.id })).into_response(),
        Err(e) => ErrorResponse(e).into_response(),
    }
}

async fn healthz_handler() -> &'static str {
    "ok"
}

async fn reload_channels_handler(State(state): State<AppState>) -> Response {
    let registry = state.registry.clone();
    // Reload reads the source synchronously.
    let result = tokio::task::spawn_blocking(move || registry.reload())
        .await
        .unwrap_or_else(|e| Err(GatewayError::config(format!("reload task failed: {}", e))));

    match result {
        Ok(version) => {
            axum::Json(json!({ "status": "reloaded", "version": version })).into_response()
        }
        Err(e) => ErrorResponse(e).into_response(),
    }
}

async fn channels_handler(
    State(state): State<AppState>,
) -> axum::Json<HashMap<String, ChannelInfo>> {
    axum::Json(state.registry.snapshot())
}
