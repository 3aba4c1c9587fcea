use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::ensemble::FinalAnswer;
use crate::prompts::SolverRole;
use crate::question_type::QuestionType;

/// Body of `POST /api/ocr`. The image may arrive under any of three keys.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OcrRequest {
    pub image: Option<String>,
    #[serde(rename = "dataUrl")]
    pub data_url: Option<String>,
    #[serde(rename = "base64Image")]
    pub base64_image: Option<String>,
    pub page: Option<Value>,
}

impl OcrRequest {
    /// First non-blank image field, trimmed
    pub fn image(&self) -> Option<&str> {
        [&self.image, &self.data_url, &self.base64_image]
            .into_iter()
            .flatten()
            .map(|s| s.trim())
            .find(|s| !s.is_empty())
    }

    /// Page is echoed back as sent; defaults to 1
    pub fn page(&self) -> Value {
        match &self.page {
            Some(Value::Null) | None => Value::from(1),
            Some(page) => page.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OcrMeta {
    pub mean_confidence: f64,
    pub question_number_count: usize,
    pub ocr_exit_code: Option<i64>,
    pub is_errored_on_processing: bool,
    pub processing_time_in_milliseconds: Option<Value>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OcrDebug {
    pub request_id: Uuid,
    pub page: Value,
    pub endpoint_used: String,
    pub attempts: u32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OcrResponse {
    pub ok: bool,
    pub text: String,
    pub conf: f64,
    pub hits: usize,
    pub page: Value,
    pub endpoint: String,
    pub from_backup: bool,
    pub meta: OcrMeta,
    /// OCR.Space response body, truncated
    pub raw: String,
    pub debug: OcrDebug,
}

/// Body of `POST /api/solve` and `POST /api/solve/debug`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SolveRequest {
    pub text: Option<String>,
    pub page: Option<Value>,
}

impl SolveRequest {
    pub fn text(&self) -> &str {
        self.text.as_deref().unwrap_or("")
    }

    /// Numeric pages pass through; anything else becomes 1
    pub fn page(&self) -> Value {
        match &self.page {
            Some(Value::Number(n)) => Value::Number(n.clone()),
            _ => Value::from(1),
        }
    }
}

/// Per-role outcome reported in the solve debug block
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleReport {
    pub role: SolverRole,
    pub ok: bool,
    pub finish_reason: Option<String>,
    pub parsed_count: usize,
    pub unsure: Vec<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SolveDebug {
    pub request_id: Uuid,
    pub page: Value,
    pub raw_numbers: Vec<String>,
    pub normalized_numbers: Vec<u32>,
    pub question_types: BTreeMap<u32, QuestionType>,
    pub roles: Vec<RoleReport>,
    pub model: String,
    pub stop_token: &'static str,
    pub missing_numbers: Vec<u32>,
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SolveResponse {
    pub ok: bool,
    /// Newline-delimited `N: X` answer key
    pub text: String,
    pub answers: Vec<FinalAnswer>,
    pub debug: SolveDebug,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SolveDebugInfo {
    pub request_id: Uuid,
    pub page: Value,
    pub raw_numbers: Vec<String>,
    pub normalized_numbers: Vec<u32>,
    pub numbers_for_prompt: Vec<u32>,
    pub stop_token: &'static str,
    pub model: String,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SolveDebugResponse {
    pub ok: bool,
    /// Raw completion text
    pub text: String,
    pub debug: SolveDebugInfo,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub service: String,
    pub version: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Error payload shared by every endpoint
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub ok: bool,
    pub error_type: &'static str,
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug: Option<Value>,
}

impl ErrorBody {
    pub fn new(error_type: &'static str, error: impl Into<String>) -> Self {
        Self {
            ok: false,
            error_type,
            error: error.into(),
            detail: None,
            raw: None,
            hint: None,
            debug: None,
        }
    }
}

/// Keep at most `max` characters, respecting char boundaries
pub fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_ocr_request_image_fallback_order() {
        let request: OcrRequest =
            serde_json::from_value(json!({ "image": "  ", "dataUrl": "data:image/png;base64,AAA" })).unwrap();
        assert_eq!(request.image(), Some("data:image/png;base64,AAA"));
        assert_eq!(request.page(), json!(1));

        let request: OcrRequest = serde_json::from_value(json!({ "base64Image": "x", "page": "3" })).unwrap();
        assert_eq!(request.image(), Some("x"));
        assert_eq!(request.page(), json!("3"));
    }

    #[test]
    fn test_solve_request_page_must_be_numeric() {
        let request: SolveRequest = serde_json::from_value(json!({ "text": "1. a", "page": "two" })).unwrap();
        assert_eq!(request.page(), json!(1));

        let request: SolveRequest = serde_json::from_value(json!({ "text": "1. a", "page": 4 })).unwrap();
        assert_eq!(request.page(), json!(4));
    }

    #[test]
    fn test_truncate_chars_is_char_safe() {
        assert_eq!(truncate_chars("①②③", 2), "①②");
        assert_eq!(truncate_chars("abc", 10), "abc");
    }
}
