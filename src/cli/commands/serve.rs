//! HTTP ingestion server.
//!
//! Exposes the pipeline over REST for capture UIs and other clients.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::error::OpptakError;
use crate::pipeline::{IngestPipeline, UploadMeta};
use crate::store::Recording;
use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

/// Shared application state.
struct AppState {
    pipeline: IngestPipeline,
}

/// Run the HTTP ingestion server.
pub async fn run_serve(host: &str, port: u16, settings: Settings) -> anyhow::Result<()> {
    if let Err(e) = preflight::check(Operation::Serve, &settings) {
        Output::error(&format!("{}", e));
        Output::info("Run 'opptak doctor' for detailed diagnostics.");
        return Err(e.into());
    }

    let pipeline = IngestPipeline::new(&settings)?;

    // Multipart framing adds overhead on top of the payload; the exact
    // byte ceiling is enforced by the pipeline's validator.
    let body_limit = settings.ingest.max_upload_bytes as usize + 1024 * 1024;

    let state = Arc::new(AppState { pipeline });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/health", get(health))
        .route("/api/recordings", get(list_recordings).post(upload))
        .route(
            "/api/recordings/{id}",
            get(get_recording).delete(delete_recording),
        )
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .with_state(state);

    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    Output::header("Opptak Server");
    println!();
    Output::success(&format!("Listening on http://{}", addr));
    println!();
    println!("Endpoints:");
    Output::kv("Health", "GET    /health");
    Output::kv("Upload", "POST   /api/recordings");
    Output::kv("List", "GET    /api/recordings");
    Output::kv("Get", "GET    /api/recordings/:id");
    Output::kv("Delete", "DELETE /api/recordings/:id");
    println!();
    Output::info("Press Ctrl+C to stop the server.");

    axum::serve(listener, app).await?;

    Ok(())
}

// === Response Types ===

#[derive(Serialize)]
struct UploadResponse {
    id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    transcription: Option<String>,
}

#[derive(Serialize)]
struct RecordingListResponse {
    recordings: Vec<Recording>,
    total: usize,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

// === Handlers ===

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn upload(State(state): State<Arc<AppState>>, mut multipart: Multipart) -> Response {
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(ErrorResponse {
                        error: "missing 'video' form field".to_string(),
                    }),
                )
                    .into_response();
            }
            Err(e) => {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(ErrorResponse {
                        error: format!("invalid multipart body: {}", e),
                    }),
                )
                    .into_response();
            }
        };

        if field.name() != Some("video") {
            continue;
        }

        let original_name = field.file_name().unwrap_or("recording").to_string();
        let mime_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();

        let data = match field.bytes().await {
            Ok(data) => data,
            Err(e) => {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(ErrorResponse {
                        error: format!("failed to read upload: {}", e),
                    }),
                )
                    .into_response();
            }
        };

        let meta = UploadMeta {
            original_name,
            mime_type,
            size: data.len() as u64,
        };

        // A client disconnect drops this future. The run itself executes
        // on its own task inside `ingest`, so it still completes and still
        // cleans up; only the response is lost.
        return match state.pipeline.ingest(data.to_vec(), meta).await {
            Ok(receipt) => (
                StatusCode::CREATED,
                Json(UploadResponse {
                    id: receipt.id,
                    transcription: receipt.transcription,
                }),
            )
                .into_response(),
            Err(e) => error_response(e),
        };
    }
}

async fn list_recordings(State(state): State<Arc<AppState>>) -> Response {
    match state.pipeline.store().list_all().await {
        Ok(recordings) => Json(RecordingListResponse {
            total: recordings.len(),
            recordings,
        })
        .into_response(),
        Err(e) => error_response(e),
    }
}

async fn get_recording(
    State(state): State<Arc<AppState>>,
    axum::extract::Path(id): axum::extract::Path<String>,
) -> Response {
    match state.pipeline.store().get(&id).await {
        Ok(Some(rec)) => Json(rec).into_response(),
        Ok(None) => not_found(&id),
        Err(e) => error_response(e),
    }
}

async fn delete_recording(
    State(state): State<Arc<AppState>>,
    axum::extract::Path(id): axum::extract::Path<String>,
) -> Response {
    match state.pipeline.store().delete(&id).await {
        Ok(true) => StatusCode::NO_CONTENT.into_response(),
        Ok(false) => not_found(&id),
        Err(e) => error_response(e),
    }
}

fn not_found(id: &str) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse {
            error: format!("Recording not found: {}", id),
        }),
    )
        .into_response()
}

/// Map a pipeline error onto an HTTP response.
///
/// Clients learn the failure category; engine stderr and other internals
/// stay in the server log.
fn error_response(err: OpptakError) -> Response {
    let (status, message) = match &err {
        OpptakError::Validation(reason) => (StatusCode::BAD_REQUEST, reason.clone()),
        OpptakError::Extraction(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "media extraction failed".to_string(),
        ),
        OpptakError::Transcription(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "transcription failed".to_string(),
        ),
        _ => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal error".to_string(),
        ),
    };

    tracing::error!("Request failed: {}", err);
    (status, Json(ErrorResponse { error: message })).into_response()
}
