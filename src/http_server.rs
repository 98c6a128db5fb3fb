use crate::config::Config;
use crate::mcp::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, McpHandler};
use crate::openapi::OpenApiError;
use axum::{
    body::Bytes,
    extract::State,
    http::{header::AUTHORIZATION, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{debug, info, warn};

/// Session header returned by initialize
pub const SESSION_HEADER: &str = "mcp-session-id";

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    handler: Arc<McpHandler>,
}

/// MCP endpoint: a single JSON-RPC message or a batch
async fn mcp_endpoint(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    let authorization = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let message: Value = match serde_json::from_slice(&body) {
        Ok(value) => value,
        Err(e) => {
            warn!(error = %e, "Malformed JSON-RPC body");
            return Json(JsonRpcResponse::error(
                JsonRpcError::parse_error(format!("Parse error: {}", e)),
                None,
            ))
            .into_response();
        }
    };

    match message {
        Value::Array(items) => {
            if items.is_empty() {
                return Json(JsonRpcResponse::error(
                    JsonRpcError::invalid_request("Empty batch"),
                    None,
                ))
                .into_response();
            }

            debug!(size = items.len(), "Handling JSON-RPC batch");
            let mut responses = Vec::with_capacity(items.len());
            for item in items {
                if let Some(response) =
                    handle_message(&state, item, authorization.as_deref()).await
                {
                    responses.push(response);
                }
            }

            if responses.is_empty() {
                StatusCode::ACCEPTED.into_response()
            } else {
                Json(responses).into_response()
            }
        }
        single => {
            let is_initialize = single.get("method").and_then(Value::as_str) == Some("initialize");

            match handle_message(&state, single, authorization.as_deref()).await {
                Some(response) => {
                    let mut http_response = Json(response).into_response();
                    if is_initialize {
                        let session_id = uuid::Uuid::new_v4().to_string();
                        if let Ok(value) = HeaderValue::from_str(&session_id) {
                            http_response.headers_mut().insert(SESSION_HEADER, value);
                        }
                        info!(session_id = %session_id, "MCP session initialized");
                    }
                    http_response
                }
                None => StatusCode::ACCEPTED.into_response(),
            }
        }
    }
}

async fn handle_message(
    state: &AppState,
    message: Value,
    authorization: Option<&str>,
) -> Option<JsonRpcResponse> {
    let id = message.get("id").cloned().filter(|id| !id.is_null());

    match serde_json::from_value::<JsonRpcRequest>(message) {
        Ok(req) => state.handler.handle(&req, authorization).await,
        Err(e) => Some(JsonRpcResponse::error(
            JsonRpcError::invalid_request(format!("Invalid request: {}", e)),
            id,
        )),
    }
}

/// Health check endpoint
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let config = state.handler.config();
    Json(json!({
        "status": "ok",
        "server": config.server.name,
        "version": config.server.version,
        "environments": config.registry.environments(),
        "defaultEnvironment": config.registry.default_environment(),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

/// Build the HTTP application serving MCP on `/mcp`
pub fn create_app(config: Arc<Config>) -> Result<Router, OpenApiError> {
    let state = AppState {
        handler: Arc::new(McpHandler::new(config)?),
    };

    Ok(Router::new()
        .route("/health", get(health_check))
        .route("/mcp", post(mcp_endpoint))
        .layer(CorsLayer::permissive())
        .with_state(state))
}

/// Bind `port` on all interfaces and serve until Ctrl-C
pub async fn run_server(app: Router, port: u16, server_name: &str) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    let port = listener.local_addr()?.port();

    println!("{} listening on http://localhost:{}", server_name, port);
    println!("MCP endpoint: http://localhost:{}/mcp", port);
    info!(port = port, "HTTP server bound");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            info!("Shutting down HTTP server");
        })
        .await
}
