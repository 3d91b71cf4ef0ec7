//! HTTP API server: axum router and request handlers.
//!
//! The server runs on the tokio async runtime while the render thread
//! runs on a plain `std::thread`. Communication is via `std::sync::mpsc`.
//! Handlers never touch the strip; they validate input, send a command and
//! return.
//!
//! ## Rust concepts
//! - axum extractors: `State`, `Json`, `Bytes`
//! - Serde `Deserialize` for parsing JSON request bodies
//! - `tower-http` middleware for CORS and request tracing

use crate::Color;
use crate::power::PowerBudget;
use crate::render::{DisplayState, DisplayStatus, RenderCommand, lock_status};
use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use axum::routing::{get, post};
use serde::Deserialize;
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex};
use tower_http::cors::CorsLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

type HandlerResult = Result<StatusCode, (StatusCode, String)>;

// ── App State ────────────────────────────────────────────────────────

/// Shared application state, passed to every handler via axum's `State` extractor.
///
/// Rust concept: CLONE for Arc
/// axum clones the state for each request handler, so everything inside
/// must be cheap to clone. `Sender` and `Arc` both are.
#[derive(Clone)]
pub struct AppState {
    /// Channel to send commands to the render thread
    pub command_tx: Sender<RenderCommand>,
    /// Shared display status (render thread writes, handlers read)
    pub status: Arc<Mutex<DisplayStatus>>,
    /// Number of LEDs on the strip
    pub led_count: usize,
}

impl AppState {
    fn send(&self, cmd: RenderCommand) -> HandlerResult {
        self.command_tx.send(cmd).map_err(|_| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Render thread gone".to_string(),
            )
        })?;
        Ok(StatusCode::OK)
    }
}

// ── OpenAPI Documentation ────────────────────────────────────────────

#[derive(OpenApi)]
#[openapi(
    paths(
        get_status,
        post_display_color,
        post_display_frame,
        post_display_clear,
        post_power,
    ),
    components(schemas(DisplayStatus, DisplayState, ColorRequest, PowerRequest)),
    tags(
        (name = "display", description = "Display control endpoints"),
        (name = "system", description = "System status and power endpoints"),
    ),
    info(
        title = "DotStar API",
        version = env!("CARGO_PKG_VERSION"),
        description = "HTTP API for controlling an APA102 LED strip"
    )
)]
pub struct ApiDoc;

// ── Request types ────────────────────────────────────────────────────

#[derive(Deserialize, utoipa::ToSchema)]
pub struct ColorRequest {
    /// RGB color array [red, green, blue] where each value is 0-255
    #[schema(value_type = Vec<u8>, example = "[255, 120, 0]")]
    color: (u8, u8, u8),
}

#[derive(Deserialize, utoipa::ToSchema)]
pub struct PowerRequest {
    /// Strip-wide current ceiling in amperes. 0 disables limiting.
    #[schema(example = 9.0)]
    amp_budget: f32,
    /// Current of one channel at full duty, in amperes. Unchanged if omitted.
    #[schema(example = 0.02)]
    amp_per_led: Option<f32>,
}

// ── Router ───────────────────────────────────────────────────────────

/// Build the axum router with all API endpoints.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(
            SwaggerUi::new("/docs")
                .url("/api-docs/openapi.json", ApiDoc::openapi())
                .config(utoipa_swagger_ui::Config::new(["/api-docs/openapi.json"]).validator_url("none")),
        )
        .route("/api/v1/status", get(get_status))
        .route("/api/v1/display/color", post(post_display_color))
        .route("/api/v1/display/frame", post(post_display_frame))
        .route("/api/v1/display/stream", get(ws_display_stream))
        .route("/api/v1/display/clear", post(post_display_clear))
        .route("/api/v1/power", post(post_power))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ── Handlers ─────────────────────────────────────────────────────────

/// GET /api/v1/status : return current display state
#[utoipa::path(
    get,
    path = "/api/v1/status",
    tag = "system",
    responses(
        (status = 200, description = "Current display status", body = DisplayStatus)
    )
)]
async fn get_status(State(state): State<AppState>) -> Json<DisplayStatus> {
    let status = lock_status(&state.status).clone();
    Json(status)
}

/// POST /api/v1/display/color : light the whole strip with one color
#[utoipa::path(
    post,
    path = "/api/v1/display/color",
    tag = "display",
    request_body = ColorRequest,
    responses(
        (status = 200, description = "Color shown"),
    )
)]
async fn post_display_color(
    State(state): State<AppState>,
    Json(req): Json<ColorRequest>,
) -> HandlerResult {
    let (r, g, b) = req.color;
    state.send(RenderCommand::ShowColor(Color::new(r, g, b)))
}

/// POST /api/v1/display/frame : push a raw RGB frame
///
/// Expects `application/octet-stream` body with exactly led_count*3 bytes.
#[utoipa::path(
    post,
    path = "/api/v1/display/frame",
    tag = "display",
    request_body(content = Vec<u8>, content_type = "application/octet-stream"),
    responses(
        (status = 200, description = "Frame shown"),
        (status = 400, description = "Wrong frame size")
    )
)]
async fn post_display_frame(State(state): State<AppState>, body: Bytes) -> HandlerResult {
    check_frame_len(state.led_count, body.len())?;
    state.send(RenderCommand::ShowFrame(body.to_vec()))
}

/// POST /api/v1/display/clear : turn every LED off
#[utoipa::path(
    post,
    path = "/api/v1/display/clear",
    tag = "display",
    responses(
        (status = 200, description = "Strip cleared"),
    )
)]
async fn post_display_clear(State(state): State<AppState>) -> HandlerResult {
    state.send(RenderCommand::Clear)
}

/// POST /api/v1/power : change the power budget
#[utoipa::path(
    post,
    path = "/api/v1/power",
    tag = "system",
    request_body = PowerRequest,
    responses(
        (status = 200, description = "Power budget updated"),
        (status = 400, description = "Invalid budget")
    )
)]
async fn post_power(State(state): State<AppState>, Json(req): Json<PowerRequest>) -> HandlerResult {
    let current = lock_status(&state.status).power_budget();
    let budget = PowerBudget::new(req.amp_per_led.unwrap_or(current.amp_per_led), req.amp_budget);
    budget
        .validate()
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;
    state.send(RenderCommand::SetPowerBudget(budget))
}

/// Raw frames must carry exactly one RGB triple per LED.
fn check_frame_len(led_count: usize, len: usize) -> Result<(), (StatusCode, String)> {
    let expected = led_count * 3;
    if len != expected {
        return Err((
            StatusCode::BAD_REQUEST,
            format!("Expected {expected} bytes ({led_count} LEDs x 3 RGB), got {len} bytes"),
        ));
    }
    Ok(())
}

// ── WebSocket streaming ─────────────────────────────────────────────

/// GET /api/v1/display/stream : WebSocket endpoint for streaming raw RGB frames.
///
/// Send binary messages of exactly led_count*3 bytes (RGB24). Each message
/// is shown as one frame. Text messages are ignored. The status is set
/// back to `Idle` on disconnect.
async fn ws_display_stream(
    State(state): State<AppState>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_stream_socket(socket, state))
}

async fn handle_stream_socket(mut socket: WebSocket, state: AppState) {
    tracing::info!("WebSocket stream client connected");

    let mut frame_count: u64 = 0;

    while let Some(msg) = socket.recv().await {
        let msg = match msg {
            Ok(m) => m,
            Err(e) => {
                tracing::warn!("WebSocket receive error: {}", e);
                break;
            }
        };

        match msg {
            Message::Binary(data) => {
                if let Err((_, reason)) = check_frame_len(state.led_count, data.len()) {
                    tracing::warn!("WebSocket frame dropped: {}", reason);
                    continue;
                }

                if state.send(RenderCommand::ShowFrame(data.to_vec())).is_err() {
                    tracing::error!("Render thread gone, closing WebSocket");
                    break;
                }

                frame_count += 1;
            }
            Message::Close(_) => break,
            _ => {} // Ignore text, ping/pong handled by axum
        }
    }

    tracing::info!(
        "WebSocket stream client disconnected ({} frames received)",
        frame_count
    );
    if state.send(RenderCommand::Clear).is_err() {
        tracing::debug!("Render thread already gone");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use std::sync::mpsc;

    #[rstest]
    #[case(150, 450, true)]
    #[case(150, 449, false)]
    #[case(150, 451, false)]
    #[case(0, 0, true)]
    fn frame_length_check(#[case] leds: usize, #[case] len: usize, #[case] ok: bool) {
        assert_eq!(check_frame_len(leds, len).is_ok(), ok);
    }

    #[test]
    fn frame_length_error_is_bad_request() {
        let (code, msg) = check_frame_len(2, 5).unwrap_err();
        assert_eq!(code, StatusCode::BAD_REQUEST);
        assert!(msg.contains("Expected 6 bytes"));
    }

    #[test]
    fn send_reports_dead_render_thread() {
        let (tx, rx) = mpsc::channel();
        let state = AppState {
            command_tx: tx,
            status: Arc::new(Mutex::new(DisplayStatus::new(1, PowerBudget::disabled()))),
            led_count: 1,
        };
        assert_eq!(state.send(RenderCommand::Clear).unwrap(), StatusCode::OK);
        assert!(matches!(rx.recv().unwrap(), RenderCommand::Clear));

        drop(rx);
        let (code, _) = state.send(RenderCommand::Clear).unwrap_err();
        assert_eq!(code, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn openapi_lists_every_documented_route() {
        let doc = ApiDoc::openapi();
        let paths: Vec<&str> = doc.paths.paths.keys().map(String::as_str).collect();
        assert_eq!(
            paths,
            vec![
                "/api/v1/display/clear",
                "/api/v1/display/color",
                "/api/v1/display/frame",
                "/api/v1/power",
                "/api/v1/status",
            ]
        );
    }
}
