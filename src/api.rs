use axum::{
    extract::{DefaultBodyLimit, State},
    http::{header, HeaderValue, StatusCode},
    response::Json,
    routing::{get, post},
    Router,
};
use serde::de::DeserializeOwned;
use std::time::Instant;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, set_header::SetResponseHeaderLayer};
use uuid::Uuid;

use crate::{
    errors::{classify_solve_error, ApiError, ErrorContext},
    models::*,
    ocr_client::OcrSpaceClient,
    question_numbers::count_question_patterns,
    solve_service::SolveService,
};

// Import logging macros
use crate::{log_api_error, log_api_start, log_api_success, log_api_warn};

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ErrorBody>)>;

// Phone photos as base64 data URLs easily pass axum's 2 MB default
const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

const IMAGE_HINT: &str = "Expected a data URL in the JSON body: { image: 'data:image/png;base64,...' }";

#[derive(Clone)]
pub struct AppState {
    pub ocr: OcrSpaceClient,
    pub solver: SolveService,
}

/// Bodies are parsed by hand so malformed JSON gets our error shape instead of axum's rejection.
/// An empty body counts as `{}`.
fn parse_body<T: DeserializeOwned + Default>(body: &str) -> Result<T, ApiError> {
    if body.trim().is_empty() {
        return Ok(T::default());
    }
    serde_json::from_str(body).map_err(|_| ApiError::BadRequest("Invalid JSON body".to_string()))
}

// OCR endpoint
pub async fn ocr(State(state): State<AppState>, body: String) -> ApiResult<OcrResponse> {
    let request_id = Uuid::new_v4();
    let context = || ErrorContext::new("ocr").with_request_id(request_id);

    if !state.ocr.has_api_key() {
        let error = ApiError::ConfigError("OCR_SPACE_API_KEY is not set on the server".to_string());
        return Err(error.to_response_with_context(context()));
    }

    let request: OcrRequest = parse_body(&body).map_err(|e| e.to_response_with_context(context()))?;
    let page = request.page();
    log_api_start!("ocr", request_id = request_id, page = page);

    let image = match request.image() {
        Some(image) if image.starts_with("data:image/") => image,
        Some(_) => {
            let error = ApiError::BadRequestWithHint {
                message: "Image must be a data:image/... URL".to_string(),
                hint: IMAGE_HINT.to_string(),
            };
            return Err(error.to_response_with_context(context()));
        }
        None => {
            let error = ApiError::BadRequestWithHint {
                message: "Missing image".to_string(),
                hint: IMAGE_HINT.to_string(),
            };
            return Err(error.to_response_with_context(context()));
        }
    };

    let started = Instant::now();
    match state.ocr.recognize(image).await {
        Ok(outcome) => {
            if outcome.from_backup {
                log_api_warn!("ocr", request_id = request_id, "primary endpoint exhausted, served from backup");
            }
            log_api_success!(
                "ocr",
                request_id = request_id,
                duration_ms = started.elapsed().as_millis() as u64,
                "text extracted"
            );

            Ok(Json(OcrResponse {
                ok: true,
                conf: outcome.meta.mean_confidence,
                hits: count_question_patterns(&outcome.text),
                page: page.clone(),
                endpoint: outcome.endpoint.clone(),
                from_backup: outcome.from_backup,
                debug: OcrDebug {
                    request_id,
                    page,
                    endpoint_used: outcome.endpoint,
                    attempts: outcome.attempts,
                },
                meta: outcome.meta,
                raw: outcome.raw,
                text: outcome.text,
            }))
        }
        Err(failure) => {
            log_api_error!("ocr", request_id = request_id, error = failure.detail, "all OCR attempts failed");
            Err(ApiError::from(failure).to_response_with_context(context()))
        }
    }
}

/// Parse a solve body and reject early when no LLM key is configured
fn solve_request(
    state: &AppState,
    body: &str,
    context: impl Fn() -> ErrorContext,
) -> Result<SolveRequest, (StatusCode, Json<ErrorBody>)> {
    if !state.solver.has_api_key() {
        let error = ApiError::ConfigError("OPENROUTER_API_KEY is not set on the server".to_string());
        return Err(error.to_response_with_context(context()));
    }
    parse_body(body).map_err(|e| e.to_response_with_context(context()))
}

// Solve endpoints
pub async fn solve(State(state): State<AppState>, body: String) -> ApiResult<SolveResponse> {
    let request_id = Uuid::new_v4();
    let context = || ErrorContext::new("solve").with_request_id(request_id);

    let request = solve_request(&state, &body, context)?;
    let page = request.page();
    log_api_start!("solve", request_id = request_id, page = page);

    let started = Instant::now();
    match state.solver.solve(request.text(), page.clone(), request_id).await {
        Ok(response) => {
            log_api_success!(
                "solve",
                request_id = request_id,
                duration_ms = started.elapsed().as_millis() as u64,
                "answer key built"
            );
            Ok(Json(response))
        }
        Err(e) => Err(classify_solve_error(e, &page).to_response_with_context(context())),
    }
}

pub async fn solve_debug(State(state): State<AppState>, body: String) -> ApiResult<SolveDebugResponse> {
    let request_id = Uuid::new_v4();
    let context = || ErrorContext::new("solve_debug").with_request_id(request_id);

    let request = solve_request(&state, &body, context)?;
    let page = request.page();
    log_api_start!("solve_debug", request_id = request_id, page = page);

    match state.solver.solve_debug(request.text(), page.clone(), request_id).await {
        Ok(response) => {
            log_api_success!("solve_debug", request_id = request_id, "raw completion returned");
            Ok(Json(response))
        }
        Err(e) => Err(classify_solve_error(e, &page).to_response_with_context(context())),
    }
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        ok: true,
        service: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now(),
    })
}

async fn method_not_allowed() -> (StatusCode, Json<ErrorBody>) {
    ApiError::MethodNotAllowed.to_response_with_context(ErrorContext::new("method_not_allowed"))
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        // OCR routes
        .route("/api/ocr", post(ocr).fallback(method_not_allowed))
        .route("/.netlify/functions/ocr", post(ocr).fallback(method_not_allowed))

        // Solve routes
        .route("/api/solve", post(solve).fallback(method_not_allowed))
        .route("/.netlify/functions/solve", post(solve).fallback(method_not_allowed))
        .route("/api/solve/debug", post(solve_debug).fallback(method_not_allowed))
        .route("/.netlify/functions/solve_debug", post(solve_debug).fallback(method_not_allowed))

        .route("/health", get(health))
        .with_state(state)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(
            ServiceBuilder::new()
                .layer(CorsLayer::permissive())
                .layer(SetResponseHeaderLayer::overriding(
                    header::CACHE_CONTROL,
                    HeaderValue::from_static("no-store"),
                )),
        )
}
