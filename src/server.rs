//! HTTP server.
//!
//! Exposes the search tool and the streaming assistant over a small JSON
//! API. The listener binds immediately; ingestion runs in the background
//! and endpoints that need the index answer `503` until it is ready. If
//! warm-up fails the server shuts down and [`run_server`] returns the error.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Status (`ok` or `warming_up`), version, indexed documents |
//! | `GET`  | `/tools/list` | Registered tools with parameter schemas |
//! | `POST` | `/tools/{name}` | Call a tool by name |
//! | `POST` | `/chat` | `{prompt, source?}` → streamed `text/plain` answer |
//!
//! `/chat` waits for the first delta before answering. A turn that fails
//! before producing text gets a `502 agent_error`; a turn that fails later
//! aborts the response body instead of ending it cleanly.
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "prompt must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404), `tool_error` (500),
//! `agent_error` (502), `search_unavailable` (503).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted.

use std::sync::{Arc, OnceLock};

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};

use crate::assistant::Assistant;
use crate::config::Config;
use crate::traits::{ToolError, ToolInfo};

#[derive(Clone)]
struct AppState {
    assistant: Arc<Assistant>,
}

/// Build the router around an assistant (ready or not).
pub fn router(assistant: Arc<Assistant>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/tools/list", get(handle_list_tools))
        .route("/tools/{name}", post(handle_tool_call))
        .route("/chat", post(handle_chat))
        .layer(cors)
        .with_state(AppState { assistant })
}

/// `faq serve`: bind, warm up in the background, serve until Ctrl-C or a
/// warm-up failure.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let assistant = Arc::new(Assistant::new(config.clone())?);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("listening on http://{}", bind_addr);
    for t in assistant.tools().tools() {
        tracing::info!("  POST /tools/{} ({})", t.name(), t.description());
    }

    let failure: Arc<OnceLock<anyhow::Error>> = Arc::new(OnceLock::new());
    let (failed_tx, failed_rx) = tokio::sync::oneshot::channel::<()>();

    let warm = assistant.clone();
    let warm_failure = failure.clone();
    tokio::spawn(async move {
        if let Err(err) = warm.warm_up().await {
            tracing::error!("warm-up failed: {:#}", err);
            let _ = warm_failure.set(err);
            let _ = failed_tx.send(());
        }
    });

    let shutdown = async move {
        let warm_up_failed = async {
            // A dropped sender means warm-up succeeded.
            if failed_rx.await.is_err() {
                std::future::pending::<()>().await;
            }
        };
        tokio::select! {
            _ = warm_up_failed => {}
            _ = tokio::signal::ctrl_c() => tracing::info!("shutting down"),
        }
    };

    axum::serve(listener, router(assistant))
        .with_graceful_shutdown(shutdown)
        .await?;

    match failure.get() {
        Some(err) => Err(anyhow::anyhow!("warm-up failed: {:#}", err)),
        None => Ok(()),
    }
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl AppError {
    fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "bad_request", message)
    }

    fn agent(err: anyhow::Error) -> Self {
        Self::new(StatusCode::BAD_GATEWAY, "agent_error", format!("{:#}", err))
    }

    fn unavailable() -> Self {
        Self::new(
            StatusCode::SERVICE_UNAVAILABLE,
            "search_unavailable",
            "search index is still warming up",
        )
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<ToolError> for AppError {
    fn from(err: ToolError) -> Self {
        let message = err.to_string();
        match err {
            ToolError::NotFound(_) => Self::new(StatusCode::NOT_FOUND, "not_found", message),
            ToolError::InvalidParams(_) => Self::bad_request(message),
            ToolError::Unavailable => Self::unavailable(),
            ToolError::Failed(_) => {
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, "tool_error", message)
            }
        }
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    documents: usize,
}

async fn handle_health(State(state): State<AppState>) -> Json<HealthResponse> {
    let documents = state.assistant.documents();
    Json(HealthResponse {
        status: if documents.is_some() { "ok" } else { "warming_up" },
        version: env!("CARGO_PKG_VERSION"),
        documents: documents.unwrap_or(0),
    })
}

// ============ GET /tools/list ============

#[derive(Serialize)]
struct ToolListResponse {
    tools: Vec<ToolInfo>,
}

async fn handle_list_tools(
    State(state): State<AppState>,
) -> Result<Json<ToolListResponse>, AppError> {
    if !state.assistant.is_ready() {
        return Err(AppError::unavailable());
    }
    Ok(Json(ToolListResponse {
        tools: state.assistant.tools().infos(),
    }))
}

// ============ POST /tools/{name} ============

async fn handle_tool_call(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(params): Json<serde_json::Value>,
) -> Result<Json<serde_json::Value>, AppError> {
    let result = state.assistant.tools().call(&name, params).await?;
    Ok(Json(serde_json::json!({ "result": result })))
}

// ============ POST /chat ============

#[derive(Deserialize)]
struct ChatRequest {
    prompt: String,
    #[serde(default)]
    source: Option<String>,
}

async fn handle_chat(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> Result<Response, AppError> {
    if req.prompt.trim().is_empty() {
        return Err(AppError::bad_request("prompt must not be empty"));
    }
    if !state.assistant.is_ready() {
        return Err(AppError::unavailable());
    }

    let mut turn = state.assistant.ask(req.prompt, req.source);
    let first = match turn.next().await {
        Some(Err(err)) => return Err(AppError::agent(err)),
        first => first,
    };
    let deltas = futures::stream::iter(first).chain(turn.into_stream());

    Ok((
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        Body::from_stream(deltas),
    )
        .into_response())
}
