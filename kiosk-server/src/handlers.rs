//! HTTP handlers

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use tokio::sync::RwLock;

use kiosk_core::protocol::{CommandType, IssueCommandRequest, KioskCommand, KioskConfig, PollResponse, Token};

use crate::state::AppState;

pub type SharedState = Arc<RwLock<AppState>>;

/// Health check endpoint
pub async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "kiosk-server"
    }))
}

/// Kiosk configuration by device token
pub async fn config_handler(
    State(state): State<SharedState>,
    Path(token): Path<String>,
) -> Result<Json<KioskConfig>, StatusCode> {
    let s = state.read().await;
    s.config(&Token::new(token))
        .cloned()
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

#[derive(Debug, Deserialize)]
pub struct PollQuery {
    since: Option<i64>,
}

/// Commands newer than `since`
pub async fn poll_handler(
    State(state): State<SharedState>,
    Path(token): Path<String>,
    Query(query): Query<PollQuery>,
) -> Result<Json<PollResponse>, StatusCode> {
    let since = query.since.unwrap_or(0);
    let s = state.read().await;
    let commands = s
        .commands_since(&Token::new(token), since)
        .ok_or(StatusCode::NOT_FOUND)?;

    Ok(Json(PollResponse { commands }))
}

/// Admin endpoint: queue a command for a kiosk
pub async fn issue_handler(
    State(state): State<SharedState>,
    Path(token): Path<String>,
    headers: HeaderMap,
    Json(req): Json<IssueCommandRequest>,
) -> Result<(StatusCode, Json<KioskCommand>), StatusCode> {
    let presented = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .unwrap_or_default();

    let mut s = state.write().await;
    if !s.check_admin(presented) {
        tracing::warn!("Rejected command issuance without a valid admin token");
        return Err(StatusCode::UNAUTHORIZED);
    }
    if req.command_type == CommandType::Unknown {
        return Err(StatusCode::BAD_REQUEST);
    }

    let token = Token::new(token);
    let now_ms = chrono::Utc::now().timestamp_millis();
    let command = s.issue(&token, req, now_ms).ok_or(StatusCode::NOT_FOUND)?;

    tracing::info!(
        "Queued {:?} for kiosk {} at {}",
        command.command_type,
        token,
        command.timestamp
    );
    Ok((StatusCode::CREATED, Json(command)))
}

#[cfg(test)]
mod tests {
    use axum::{
        body::{to_bytes, Body},
        http::Request,
    };
    use tower::ServiceExt;

    use super::*;

    fn app() -> axum::Router {
        let mut config = KioskConfig::new(Token::new("k1"));
        config.name = "Hallway".into();
        let state = AppState::new(vec![config], "admin".into(), 100);
        crate::router(Arc::new(RwLock::new(state)))
    }

    async fn body_json<T: serde::de::DeserializeOwned>(resp: axum::response::Response) -> T {
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn issue(token: &str, admin: Option<&str>, body: &str) -> Request<Body> {
        let mut builder = Request::post(format!("/api/kiosk/{}/commands", token))
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(admin) = admin {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", admin));
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let resp = app()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_config_lookup() {
        let resp = app()
            .oneshot(Request::get("/api/kiosk/k1").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let config: KioskConfig = body_json(resp).await;
        assert_eq!(config.name, "Hallway");

        let resp = app()
            .oneshot(Request::get("/api/kiosk/unknown").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_issue_then_poll() {
        let app = app();

        let resp = app
            .clone()
            .oneshot(issue("k1", Some("admin"), r#"{"type":"navigate","payload":{"path":"photos"}}"#))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);
        let issued: KioskCommand = body_json(resp).await;
        assert_eq!(issued.command_type, CommandType::Navigate);

        let resp = app
            .clone()
            .oneshot(Request::get("/api/kiosk/k1/commands?since=0").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let polled: PollResponse = body_json(resp).await;
        assert_eq!(polled.commands, vec![issued.clone()]);

        let resp = app
            .oneshot(
                Request::get(format!("/api/kiosk/k1/commands?since={}", issued.timestamp))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let polled: PollResponse = body_json(resp).await;
        assert!(polled.commands.is_empty());
    }

    #[tokio::test]
    async fn test_issue_requires_admin() {
        let body = r#"{"type":"refresh"}"#;

        let resp = app().oneshot(issue("k1", None, body)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let resp = app().oneshot(issue("k1", Some("wrong"), body)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let resp = app().oneshot(issue("unknown", Some("admin"), body)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_issue_rejects_unknown_type() {
        let resp = app()
            .oneshot(issue("k1", Some("admin"), r#"{"type":"selfDestruct"}"#))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_poll_unknown_kiosk() {
        let resp = app()
            .oneshot(Request::get("/api/kiosk/nope/commands").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
