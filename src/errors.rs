use axum::{http::StatusCode, response::Json};
use serde_json::{json, Value};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::llm_providers::LlmError;
use crate::models::{truncate_chars, ErrorBody};
use crate::ocr_client::OcrFailure;
use crate::solve_service::SolveError;

const OCR_HINT: &str = "1) A PRO key needs the https://apipro1.ocr.space/parse/image endpoint (no hyphen). \
2) Check OCR_SPACE_API_KEY / OCR_SPACE_API_ENDPOINT on the server and restart.";

/// Centralized error types for consistent API error handling
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("POST only")]
    MethodNotAllowed,

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Bad request: {message}")]
    BadRequestWithHint { message: String, hint: String },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("No question numbers detected in text")]
    NoQuestionsFound { debug: Value },

    #[error("{upstream} returned HTTP {status}")]
    UpstreamHttp {
        upstream: &'static str,
        status: u16,
        detail: String,
    },

    #[error("OCR.Space upstream error: {detail}")]
    OcrUpstream {
        detail: String,
        raw: String,
        debug: Value,
    },

    #[error("Upstream response could not be parsed: {0}")]
    UpstreamParse(String),

    #[error("Network error: {0}")]
    Network(String),

    /// Every solver role failed; rendered as `last` with the per-role reports in `debug`
    #[error("All solver roles failed: {last}")]
    RolesFailed { last: Box<ApiError>, debug: Value },
}

/// Error context for structured logging
#[derive(Debug)]
pub struct ErrorContext {
    pub operation: String,
    pub request_id: Option<Uuid>,
}

impl ErrorContext {
    pub fn new(operation: &str) -> Self {
        Self {
            operation: operation.to_string(),
            request_id: None,
        }
    }

    pub fn with_request_id(mut self, request_id: Uuid) -> Self {
        self.request_id = Some(request_id);
        self
    }
}

impl ApiError {
    /// Convert API error to HTTP response with consistent structure and logging.
    /// The request id, when known, is added to the body's `debug` object.
    pub fn to_response_with_context(self, context: ErrorContext) -> (StatusCode, Json<ErrorBody>) {
        let (status, mut body) = self.render(&context);

        if let Some(request_id) = context.request_id {
            let id = Value::String(request_id.to_string());
            match body.debug.as_mut() {
                Some(Value::Object(debug)) => {
                    debug.insert("requestId".to_string(), id);
                }
                Some(_) => {}
                None => body.debug = Some(json!({ "requestId": id })),
            }
        }

        (status, Json(body))
    }

    fn render(self, context: &ErrorContext) -> (StatusCode, ErrorBody) {
        match self {
            ApiError::MethodNotAllowed => {
                warn!(
                    operation = %context.operation,
                    request_id = ?context.request_id,
                    "Method not allowed"
                );
                (StatusCode::METHOD_NOT_ALLOWED, ErrorBody::new("MethodNotAllowed", "POST only".to_string()))
            }
            ApiError::BadRequestWithHint { message, hint } => {
                warn!(
                    operation = %context.operation,
                    request_id = ?context.request_id,
                    error = %message,
                    "Bad request"
                );
                let mut body = ErrorBody::new("BadRequest", message);
                body.hint = Some(hint);
                (StatusCode::BAD_REQUEST, body)
            }
            ApiError::BadRequest(msg) => {
                warn!(
                    operation = %context.operation,
                    request_id = ?context.request_id,
                    error = %msg,
                    "Bad request"
                );
                (StatusCode::BAD_REQUEST, ErrorBody::new("BadRequest", msg))
            }
            ApiError::ConfigError(msg) => {
                error!(
                    operation = %context.operation,
                    request_id = ?context.request_id,
                    error = %msg,
                    "Server configuration error"
                );
                (StatusCode::INTERNAL_SERVER_ERROR, ErrorBody::new("ConfigError", msg))
            }
            ApiError::NoQuestionsFound { debug } => {
                info!(
                    operation = %context.operation,
                    request_id = ?context.request_id,
                    "No question numbers detected"
                );
                let mut body = ErrorBody::new("NoQuestionsFound", "No question numbers detected in text".to_string());
                body.debug = Some(debug);
                // The page was readable, just empty of questions; clients treat this as a soft failure.
                (StatusCode::OK, body)
            }
            ApiError::UpstreamHttp { upstream, status, detail } => {
                error!(
                    operation = %context.operation,
                    request_id = ?context.request_id,
                    upstream,
                    status,
                    error = %detail,
                    "Upstream HTTP error"
                );
                let mut body = ErrorBody::new(
                    if upstream == "OpenRouter" { "OpenRouterHTTPError" } else { "UpstreamHTTPError" },
                    format!("status={status}"),
                );
                body.detail = Some(detail);
                let code = StatusCode::from_u16(status)
                    .ok()
                    .filter(|c| c.is_client_error() || c.is_server_error())
                    .unwrap_or(StatusCode::BAD_GATEWAY);
                (code, body)
            }
            ApiError::OcrUpstream { detail, raw, debug } => {
                error!(
                    operation = %context.operation,
                    request_id = ?context.request_id,
                    error = %detail,
                    "OCR.Space upstream error"
                );
                let mut body = ErrorBody::new("UpstreamError", "OCR.Space upstream error".to_string());
                body.detail = Some(detail);
                body.raw = Some(raw);
                body.hint = Some(OCR_HINT.to_string());
                body.debug = Some(debug);
                (StatusCode::BAD_GATEWAY, body)
            }
            ApiError::UpstreamParse(msg) => {
                error!(
                    operation = %context.operation,
                    request_id = ?context.request_id,
                    error = %msg,
                    "Upstream parse error"
                );
                let mut body = ErrorBody::new("OpenRouterParseError", "Failed to parse upstream response JSON".to_string());
                body.detail = Some(msg);
                (StatusCode::BAD_GATEWAY, body)
            }
            ApiError::Network(msg) => {
                error!(
                    operation = %context.operation,
                    request_id = ?context.request_id,
                    error = %msg,
                    "Upstream network error"
                );
                (StatusCode::BAD_GATEWAY, ErrorBody::new("NetworkError", msg))
            }
            ApiError::RolesFailed { last, debug } => {
                let (status, mut body) = (*last).render(context);
                body.debug = Some(debug);
                (status, body)
            }
        }
    }
}

impl From<LlmError> for ApiError {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::Http { provider, status, body } => ApiError::UpstreamHttp {
                upstream: provider,
                status,
                detail: truncate_chars(&body, 1500),
            },
            LlmError::Parse { message, .. } => ApiError::UpstreamParse(message),
            LlmError::EmptyChoices { provider } => {
                ApiError::UpstreamParse(format!("No choices in {provider} response"))
            }
            LlmError::Network { message, .. } => ApiError::Network(message),
        }
    }
}

/// Map a solve failure onto the HTTP error surface; `page` is echoed in the debug block
pub fn classify_solve_error(err: SolveError, page: &Value) -> ApiError {
    match err {
        SolveError::EmptyText => ApiError::BadRequest("Missing 'text' field in body".to_string()),
        SolveError::NoQuestions { numbers } => ApiError::NoQuestionsFound {
            debug: json!({
                "page": page,
                "rawNumbers": numbers.raw_numbers,
                "normalizedNumbers": numbers.normalized_numbers,
            }),
        },
        // Every role failed: the gateway itself failed, whatever the upstream said.
        SolveError::AllRolesFailed { last, roles } => {
            let last = match ApiError::from(last) {
                ApiError::UpstreamHttp { upstream, status, detail } => ApiError::UpstreamHttp {
                    upstream,
                    status: StatusCode::BAD_GATEWAY.as_u16(),
                    detail: format!("{upstream} HTTP {status}: {detail}"),
                },
                other => other,
            };
            ApiError::RolesFailed {
                last: Box::new(last),
                debug: json!({ "page": page, "roles": roles }),
            }
        }
        SolveError::Llm(e) => ApiError::from(e),
    }
}

impl From<OcrFailure> for ApiError {
    fn from(failure: OcrFailure) -> Self {
        ApiError::OcrUpstream {
            debug: json!({
                "endpointUsed": failure.endpoint_used,
                "attempts": failure.attempts,
            }),
            detail: failure.detail,
            raw: failure.raw,
        }
    }
}
