use crate::metadata::DaemonMetadata;
use crate::metadata::default_metadata_path;
use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::routing::get;
use axum::routing::post;
use base64::Engine as _;
use lore_engine::Engine;
use lore_protocol::DocType;
use lore_protocol::ErrorCode;
use lore_protocol::ErrorPayload;
use lore_protocol::PROTOCOL_VERSION;
use lore_protocol::QueryOutput;
use lore_protocol::SearchRequest;
use lore_protocol::StatusResponse;
use rand::RngCore;
use std::collections::BTreeSet;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

#[derive(Clone, Debug, Default)]
pub struct DaemonOptions {
    /// Where to write the discovery metadata; defaults to the platform
    /// data directory.
    pub metadata_path: Option<PathBuf>,
}

#[derive(Clone)]
struct AppState {
    engine: Arc<Engine>,
    secret: String,
}

pub async fn run_daemon(engine: Arc<Engine>, opts: DaemonOptions) -> anyhow::Result<()> {
    let secret = random_secret();
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr: SocketAddr = listener.local_addr()?;

    let metadata = DaemonMetadata::new(addr.port(), secret.clone(), std::process::id());
    let metadata_path = opts.metadata_path.unwrap_or_else(default_metadata_path);
    metadata.write_atomic(&metadata_path)?;
    info!("lore daemon listening on {addr}");

    let state = AppState { engine, secret };
    let app = Router::new()
        .route("/health", get(health_handler))
        .route("/v1/search", post(search_handler))
        .with_state(state);
    axum::serve(listener, app).await?;
    Ok(())
}

async fn health_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<StatusResponse>, AppError> {
    ensure_authorized(&state.secret, &headers)?;
    let status = state.engine.status().await;
    let notice = if status.collections.is_empty() {
        Some("no collections registered; serving guidance-only results".to_string())
    } else {
        None
    };
    Ok(Json(StatusResponse {
        state: status.state,
        collections: status.collections,
        vector_backend: status.vector_backend,
        schema_version: PROTOCOL_VERSION,
        notice,
    }))
}

async fn search_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<SearchRequest>,
) -> Result<Json<QueryOutput>, AppError> {
    ensure_authorized(&state.secret, &headers)?;
    ensure_protocol_version(request.schema_version)?;

    let filter: Option<BTreeSet<DocType>> = if request.doc_types.is_empty() {
        None
    } else {
        Some(request.doc_types.iter().copied().collect())
    };

    let output = state
        .engine
        .search_with_context(&request.query, request.limit, filter, request.context)
        .await;
    Ok(Json(output))
}

fn ensure_authorized(secret: &str, headers: &HeaderMap) -> Result<(), AppError> {
    let Some(header) = headers.get(axum::http::header::AUTHORIZATION) else {
        return Err(AppError::unauthorized());
    };
    let value = header.to_str().map_err(|_| AppError::unauthorized())?;
    if value != format!("Bearer {secret}") {
        return Err(AppError::unauthorized());
    }
    Ok(())
}

fn ensure_protocol_version(client_version: u32) -> Result<(), AppError> {
    if client_version != PROTOCOL_VERSION {
        return Err(AppError::version_mismatch(client_version));
    }
    Ok(())
}

fn random_secret() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut bytes);
    base64::engine::general_purpose::STANDARD_NO_PAD.encode(bytes)
}

#[derive(Debug)]
struct AppError {
    status: StatusCode,
    payload: ErrorPayload,
}

impl AppError {
    fn unauthorized() -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            payload: ErrorPayload {
                code: ErrorCode::Unknown,
                message: "missing or invalid token".to_string(),
            },
        }
    }

    fn version_mismatch(client_version: u32) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            payload: ErrorPayload {
                code: ErrorCode::VersionMismatch,
                message: format!(
                    "daemon requires protocol v{PROTOCOL_VERSION}, but client sent v{client_version}"
                ),
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({ "error": self.payload });
        (self.status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_authorization_checks_bearer_secret() {
        let mut headers = HeaderMap::new();
        assert!(ensure_authorized("s3cret", &headers).is_err());

        headers.insert(
            axum::http::header::AUTHORIZATION,
            "Bearer wrong".parse().expect("header"),
        );
        assert!(ensure_authorized("s3cret", &headers).is_err());

        headers.insert(
            axum::http::header::AUTHORIZATION,
            "Bearer s3cret".parse().expect("header"),
        );
        assert!(ensure_authorized("s3cret", &headers).is_ok());
    }

    #[test]
    fn test_protocol_version_enforced() {
        assert!(ensure_protocol_version(PROTOCOL_VERSION).is_ok());

        let err = ensure_protocol_version(PROTOCOL_VERSION + 1).expect_err("mismatch");
        assert_eq!(err.payload.code, ErrorCode::VersionMismatch);
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_random_secret_is_fresh() {
        let first = random_secret();
        let second = random_secret();
        assert_ne!(first, second);
        assert!(first.len() >= 40);
    }
}
