//! Real-time collaborative drawing relay.
//!
//! Clients join a canvas over a WebSocket, get the canvas's stroke history
//! replayed, and then see each other's strokes live. All canvas state lives
//! in a [`hub::Hub`] for the lifetime of the process.

pub mod canvas_id;
pub mod client;
pub mod config;
pub mod error;
pub mod handlers;
pub mod hub;
pub mod logging;
pub mod state;

use std::path::PathBuf;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::handlers::{
    canvas_info_handler, create_canvas_handler, health_handler, ws_handler,
};
use crate::state::AppState;

pub fn router(state: AppState, public_dir: Option<PathBuf>) -> Router {
    let mut app = Router::new()
        .route("/api/health", get(health_handler))
        .route("/api/canvas", post(create_canvas_handler))
        .route("/api/canvas/:id", get(canvas_info_handler))
        .route("/ws/:id", get(ws_handler));
    if let Some(public_dir) = public_dir {
        app = app.fallback_service(ServeDir::new(public_dir).append_index_html_on_directories(true));
    }
    app.layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
