use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::Value;
use sketchrelay_server::config::RelayMode;
use sketchrelay_server::hub::Hub;
use sketchrelay_server::router;
use sketchrelay_server::state::AppState;
use tower::ServiceExt;

fn app() -> (Router, AppState) {
    let state = AppState::new(Hub::default(), RelayMode::Stroke);
    (router(state.clone(), None), state)
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Option<Value>) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).ok())
}

#[tokio::test]
async fn health_reports_ok() {
    let (app, _) = app();
    let request = Request::get("/api/health").body(Body::empty()).unwrap();
    let (status, body) = send(app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.unwrap(), serde_json::json!({ "status": "OK" }));
}

#[tokio::test]
async fn create_canvas_returns_fresh_code() {
    let (app, state) = app();

    let request = Request::post("/api/canvas").body(Body::empty()).unwrap();
    let (status, body) = send(app.clone(), request).await;
    assert_eq!(status, StatusCode::OK);
    let first = body.unwrap()["canvasID"].as_str().unwrap().to_string();
    assert_eq!(first.len(), 6);
    assert!(state.hub.canvas_exists(&first).await);

    let request = Request::post("/api/canvas").body(Body::empty()).unwrap();
    let (_, body) = send(app, request).await;
    let second = body.unwrap()["canvasID"].as_str().unwrap().to_string();
    assert_ne!(first, second);
    assert_eq!(state.hub.canvas_count().await, 2);
}

#[tokio::test]
async fn canvas_info_reports_stats_or_not_found() {
    let (app, state) = app();
    state.hub.create_canvas("ROOM42").await.unwrap();

    let request = Request::get("/api/canvas/ROOM42").body(Body::empty()).unwrap();
    let (status, body) = send(app.clone(), request).await;
    assert_eq!(status, StatusCode::OK);
    let body = body.unwrap();
    assert_eq!(body["canvasID"], "ROOM42");
    assert_eq!(body["clients"], 0);
    assert_eq!(body["strokes"], 0);

    let request = Request::get("/api/canvas/MISSING").body(Body::empty()).unwrap();
    let (status, body) = send(app.clone(), request).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body.unwrap()["error"].is_string());

    let long = "X".repeat(21);
    let request = Request::get(format!("/api/canvas/{long}"))
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.unwrap()["error"]
        .as_str()
        .unwrap()
        .contains("character limit"));
}

#[tokio::test]
async fn websocket_with_long_id_redirects_home() {
    let (app, state) = app();
    let long = "X".repeat(21);
    let request = Request::get(format!("/ws/{long}"))
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert!(response.status().is_redirection());
    assert_eq!(response.headers()[header::LOCATION], "/");
    assert_eq!(state.hub.canvas_count().await, 0);
}

#[tokio::test]
async fn websocket_without_upgrade_is_rejected() {
    let (app, state) = app();
    let request = Request::get("/ws/ROOM42").body(Body::empty()).unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert!(response.status().is_client_error());
    assert!(!state.hub.canvas_exists("ROOM42").await);
}
