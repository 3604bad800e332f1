use std::sync::{Arc, Mutex};

use anyhow::Context;
use axum::{
    Json, Router,
    extract::{Request, State},
    http::{HeaderValue, StatusCode, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tower_http::limit::RequestBodyLimitLayer;

use nutrilog_core::db::Database;
use nutrilog_core::remote::DOCUMENT_ID;

const BODY_LIMIT: usize = 10 * 1024 * 1024; // 10 MB

#[derive(Clone)]
struct AppState {
    db: Arc<Mutex<Database>>,
    api_key: Option<String>,
}

// --- Request / Response types ---

/// Both fields are kept as opaque JSON; only their presence is checked.
#[derive(Deserialize)]
struct PushSyncRequest {
    history: Option<Value>,
    targets: Option<Value>,
}

#[derive(Serialize)]
struct SyncDocument {
    history: Value,
    targets: Value,
}

#[derive(Serialize)]
struct PushSyncResponse {
    success: bool,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

// --- Error handling ---

enum ApiError {
    NotFound(String),
    BadRequest(String),
    Internal(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::Internal(err) => {
                log::error!("Internal server error: {err:#}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };
        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err)
    }
}

// --- Middleware ---

async fn require_auth(State(state): State<AppState>, request: Request, next: Next) -> Response {
    if let Some(ref expected_key) = state.api_key {
        let authorized = request
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .is_some_and(|token| token == expected_key);

        if !authorized {
            return (
                StatusCode::UNAUTHORIZED,
                Json(ErrorResponse {
                    error: "Invalid or missing API key".to_string(),
                }),
            )
                .into_response();
        }
    }
    next.run(request).await
}

async fn security_headers(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert(
        "x-content-type-options",
        HeaderValue::from_static("nosniff"),
    );
    headers.insert("x-frame-options", HeaderValue::from_static("DENY"));
    headers.insert(
        "content-security-policy",
        HeaderValue::from_static("default-src 'none'"),
    );
    response
}

// --- Handlers ---

async fn get_sync(State(state): State<AppState>) -> Result<Json<SyncDocument>, ApiError> {
    let doc = {
        let db = state
            .db
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        db.get_document(DOCUMENT_ID).context("database error")?
    };
    let doc = doc.ok_or_else(|| ApiError::NotFound("No data found".to_string()))?;

    let history: Value =
        serde_json::from_str(&doc.history).context("stored history is not valid JSON")?;
    let targets: Value =
        serde_json::from_str(&doc.targets).context("stored targets are not valid JSON")?;
    Ok(Json(SyncDocument { history, targets }))
}

async fn push_sync(
    State(state): State<AppState>,
    Json(req): Json<PushSyncRequest>,
) -> Result<Json<PushSyncResponse>, ApiError> {
    // A JSON null deserializes to None, so it is rejected the same as a missing field.
    let (Some(history), Some(targets)) = (req.history, req.targets) else {
        return Err(ApiError::BadRequest("Missing data".to_string()));
    };
    let history = serde_json::to_string(&history).context("failed to encode history")?;
    let targets = serde_json::to_string(&targets).context("failed to encode targets")?;

    let db = state
        .db
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner);
    db.upsert_document(DOCUMENT_ID, &history, &targets)
        .context("failed to store sync document")?;
    log::info!("Stored sync document ({} bytes of history)", history.len());
    Ok(Json(PushSyncResponse { success: true }))
}

// --- Router builder ---

fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/sync", get(get_sync).post(push_sync))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .layer(RequestBodyLimitLayer::new(BODY_LIMIT))
        .layer(middleware::from_fn(security_headers))
        .with_state(state)
}

// --- Server startup ---

pub(crate) fn router(db: Database, api_key: Option<String>) -> Router {
    build_router(AppState {
        db: Arc::new(Mutex::new(db)),
        api_key,
    })
}

pub async fn start_server(
    db: Database,
    port: u16,
    bind: &str,
    api_key: Option<String>,
) -> anyhow::Result<()> {
    let app = router(db, api_key.clone());

    if let Some(ref key) = api_key {
        let shown = match (key.get(..4), key.get(key.len().saturating_sub(4)..)) {
            (Some(head), Some(tail)) if key.len() >= 8 => format!("{head}...{tail}"),
            _ => "****".to_string(),
        };
        eprintln!("API key: {shown} (see api_key file in data directory)");
    } else {
        eprintln!("Warning: Authentication disabled (--no-auth). API is open to anyone.");
    }

    if bind != "127.0.0.1" && bind != "localhost" && api_key.is_none() {
        eprintln!(
            "Warning: Listening on {bind} with no authentication. Any device on your network can overwrite your log."
        );
    }

    let listener = tokio::net::TcpListener::bind(format!("{bind}:{port}"))
        .await
        .with_context(|| format!("failed to bind {bind}:{port}"))?;
    eprintln!("Listening on http://{bind}:{port}");
    axum::serve(listener, app).await?;

    Ok(())
}
