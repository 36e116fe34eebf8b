// Main entry point for the handwriting recognition demo server

use handwriting_demo::{
    core::{
        types::{RecognitionErrorResponse, RecognitionMode, RecognitionResponse},
        Config, RecognitionError,
    },
    dispatch::recognize_upload,
    services::{TesseractService, TrocrHandle},
};

use anyhow::Result;
use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    response::{Html, Json},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

/// The single demo page, embedded at compile time
const INDEX_HTML: &str = include_str!("../assets/index.html");

/// Application state shared across handlers
#[derive(Clone)]
struct AppState {
    classical: Arc<TesseractService>,
    neural: Arc<TrocrHandle>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = Arc::new(Config::new().expect("Failed to load configuration"));

    // Initialize logging
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::new(format!(
        "handwriting_demo={lvl},tower_http=warn,ort=off",
        lvl = match config.log_level() {
            tracing::Level::TRACE => "trace",
            tracing::Level::DEBUG => "debug",
            tracing::Level::INFO => "info",
            tracing::Level::WARN => "warn",
            tracing::Level::ERROR => "error",
        }
    ));

    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("=== QUIZ HANDWRITING RECOGNITION DEMO ===");
    info!(
        "Config: tesseract_lang={} trocr_model_dir={}",
        config.tesseract_language(),
        config.trocr_model_dir().display()
    );

    // Backends are constructed up front and injected into dispatch; the
    // neural handle defers the heavy model load to its first use.
    let classical = Arc::new(TesseractService::new(&config.tesseract));
    let neural = Arc::new(TrocrHandle::new(config.trocr.clone()));

    if neural.is_available() {
        info!("TrOCR artifacts found (model loads lazily on first neural request)");
    } else {
        info!(
            "TrOCR artifacts missing under {} - neural mode will report an error",
            config.trocr_model_dir().display()
        );
    }

    let state = AppState { classical, neural };

    // Setup CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Create router
    let app = Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/recognize", post(recognize))
        .with_state(state)
        .layer(DefaultBodyLimit::max(config.max_upload_bytes()))
        .layer(cors);

    let addr = format!("{}:{}", config.server_host(), config.server_port());
    info!("Server starting on http://{}", addr);
    info!("Endpoints:");
    info!("  GET  /          - Demo page");
    info!("  GET  /health    - Health check");
    info!("  POST /recognize - Recognize handwriting (multipart/form-data)");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "trocr_available": state.neural.is_available(),
        "trocr_loaded": state.neural.is_initialized(),
    }))
}

type RecognizeRejection = (StatusCode, Json<RecognitionErrorResponse>);

fn bad_request(message: impl Into<String>) -> RecognizeRejection {
    (
        StatusCode::BAD_REQUEST,
        Json(RecognitionErrorResponse {
            banner: "An error occurred while reading the image".to_string(),
            error: message.into(),
        }),
    )
}

/// Server-side faults that are not a recognition failure (e.g. the blocking
/// task panicked). Reported with a neutral banner, never a crash.
fn internal_error(message: impl Into<String>) -> RecognizeRejection {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(RecognitionErrorResponse {
            banner: "An unexpected server error occurred".to_string(),
            error: message.into(),
        }),
    )
}

/// Recognize handwriting endpoint
///
/// # Request Format:
/// - multipart/form-data
/// - Field "image": One image file (PNG/JPEG)
/// - Field "method": "tesseract" or "trocr"
///
/// # Response:
/// - 200 with { method, text, elapsed_ms } on success
/// - 4xx/5xx with { banner, error } carrying the underlying failure text
async fn recognize(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<RecognitionResponse>, RecognizeRejection> {
    let start_time = std::time::Instant::now();

    let mut image_bytes: Option<Vec<u8>> = None;
    let mut mode: Option<RecognitionMode> = None;

    // Parse multipart form
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request(format!("Multipart error: {}", e)))?
    {
        let name = field.name().unwrap_or("").to_string();

        match name.as_str() {
            "image" => {
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| bad_request(format!("Read error: {}", e)))?;
                image_bytes = Some(data.to_vec());
            }
            "method" => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| bad_request(format!("Method read error: {}", e)))?;
                mode = Some(value.parse().map_err(bad_request)?);
            }
            _ => {}
        }
    }

    let image_bytes = image_bytes.ok_or_else(|| bad_request("No image provided"))?;
    let mode = mode.ok_or_else(|| bad_request("No recognition method selected"))?;

    info!("Recognizing {} byte upload with {}", image_bytes.len(), mode);

    // Decoding and both backends are synchronous CPU work; keep the whole
    // ingest-then-dispatch sequence off the async runtime. A malformed
    // upload returns a DecodeError before any backend is invoked.
    let classical = state.classical.clone();
    let neural = state.neural.clone();
    let text = tokio::task::spawn_blocking(move || {
        recognize_upload(&image_bytes, mode, classical.as_ref(), neural.as_ref())
    })
    .await
    .map_err(|e| internal_error(format!("Recognition task failed: {}", e)))?
    .map_err(reject)?;

    let elapsed_ms = start_time.elapsed().as_secs_f64() * 1000.0;
    info!("{} finished in {:.1}ms ({} chars)", mode, elapsed_ms, text.len());

    Ok(Json(RecognitionResponse {
        method: mode,
        text,
        elapsed_ms,
    }))
}

/// Map a recognition failure to a rendered error response.
///
/// Decode failures are the client's fault; backend failures are server-side
/// but still reported with the underlying message rather than a crash.
fn reject(err: RecognitionError) -> RecognizeRejection {
    let status = match err {
        RecognitionError::Decode(_) => StatusCode::UNPROCESSABLE_ENTITY,
        RecognitionError::Engine(_) | RecognitionError::Inference(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };

    error!("Recognition failed: {}", err);

    (
        status,
        Json(RecognitionErrorResponse {
            banner: err.banner_prefix().to_string(),
            error: err.to_string(),
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use handwriting_demo::core::errors::{DecodeError, EngineError};

    #[test]
    fn test_task_fault_maps_to_500_with_neutral_banner() {
        let (status, Json(body)) = internal_error("Recognition task failed: panicked");
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.banner, "An unexpected server error occurred");
        assert!(body.error.contains("panicked"));
    }

    #[test]
    fn test_missing_fields_map_to_400() {
        let (status, _) = bad_request("No image provided");
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_decode_failure_maps_to_422() {
        let (status, Json(body)) = reject(RecognitionError::Decode(DecodeError::UnknownFormat));
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body.banner, "An error occurred while reading the image");
    }

    #[test]
    fn test_backend_failure_maps_to_500_with_backend_banner() {
        let (status, Json(body)) =
            reject(RecognitionError::Engine(EngineError::Invocation("boom".into())));
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.banner, "An error occurred during Tesseract OCR");
        assert!(body.error.contains("boom"));
    }
}
