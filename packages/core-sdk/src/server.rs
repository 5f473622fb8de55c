use std::{path::Path, sync::Arc};

use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, State},
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    middleware::map_response,
    response::{IntoResponse, Response},
    routing::{any, get},
    Json, Router,
};
use serde_json::json;
use tower_http::services::ServeDir;

use crate::{
    config::{CredentialSource, EnvCredential, RelayConfig, ServerConfig},
    error::RelayError,
    relay::Relay,
    telemetry,
};

pub const CHAT_PATH: &str = "/api/groq-chat";
pub const HEALTH_PATH: &str = "/api/health";

const BODY_UNREADABLE: &str = "Request body is too large or could not be read";

/**
 * \brief Shared per-process handles. Nothing in here is mutated by requests.
 */
#[derive(Clone)]
pub struct AppState {
    relay: Arc<Relay>,
    credentials: Arc<dyn CredentialSource>,
}

impl AppState {
    pub fn new(relay: Relay, credentials: impl CredentialSource + 'static) -> Self {
        Self {
            relay: Arc::new(relay),
            credentials: Arc::new(credentials),
        }
    }
}

/**
 * \brief Relay routes plus the optional static app, all behind the CORS layer.
 */
pub fn router(state: AppState, static_dir: Option<&Path>) -> Router {
    let mut app = Router::new()
        .route(CHAT_PATH, any(chat_endpoint))
        .route(HEALTH_PATH, get(health_check));

    if let Some(dir) = static_dir {
        let static_handler = ServeDir::new(dir).append_index_html_on_directories(true);
        app = app.fallback_service(static_handler);
    }

    app.layer(map_response(apply_cors_headers))
        .with_state(state)
}

/**
 * \brief Starts the relay HTTP server.
 * \param server listen address and optional static directory
 * \param relay upstream settings; the credential is read from `relay.credential_env` per request
 */
pub async fn run(server: &ServerConfig, relay: RelayConfig) -> Result<()> {
    let credentials = EnvCredential::new(relay.credential_env.clone());
    let state = AppState::new(Relay::new(relay)?, credentials);
    let app = router(state, server.static_dir.as_deref());

    let listener = tokio::net::TcpListener::bind(&server.addr)
        .await
        .with_context(|| format!("bind {}", server.addr))?;
    telemetry::log_event("server", &format!("listening on http://{}", server.addr));
    axum::serve(listener, app).await?;
    Ok(())
}

async fn apply_cors_headers(mut response: Response) -> Response {
    let headers = response.headers_mut();
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
        HeaderValue::from_static("true"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("POST, OPTIONS"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type, Authorization"),
    );
    response
}

/**
 * \brief POST /api/groq-chat, with OPTIONS answered as a bare preflight.
 */
async fn chat_endpoint(
    State(state): State<AppState>,
    method: Method,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    if method == Method::OPTIONS {
        return StatusCode::OK.into_response();
    }
    if method != Method::POST {
        return RelayError::MethodNotAllowed(method.to_string()).into_response();
    }

    telemetry::log_event(
        "server.chat",
        &format!("request from ip={}", client_ip(&headers)),
    );

    let body = match body {
        Ok(body) => body,
        Err(rejection) => {
            telemetry::log_error(
                "server.chat",
                &format!("body rejected: {}", rejection.body_text()),
            );
            return RelayError::InvalidRequest(BODY_UNREADABLE).into_response();
        }
    };

    match state.relay.handle(state.credentials.load(), &body).await {
        Ok(reply) => ([(header::CONTENT_TYPE, "application/json")], reply.body).into_response(),
        Err(err) => {
            telemetry::log_error(
                "server.chat",
                &format!(
                    "status={} error={} detail={}",
                    err.status().as_u16(),
                    err.label(),
                    err
                ),
            );
            err.into_response()
        }
    }
}

/**
 * \brief Liveness plus whether a credential is present. Never returns the secret.
 */
async fn health_check(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "ok": true,
        "model": state.relay.config().default_model,
        "credential_configured": state.credentials.load().is_some(),
    }))
}

fn client_ip(headers: &HeaderMap) -> &str {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or("unknown")
}
