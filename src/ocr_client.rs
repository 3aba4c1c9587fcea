use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::config::OcrConfig;
use crate::models::OcrMeta;
use crate::question_numbers::count_line_leading_numbers;
use crate::log_upstream;
use crate::models::truncate_chars;

const UPSTREAM: &str = "ocr_space";
pub const RAW_PREVIEW_CHARS: usize = 1500;

/// Subset of the OCR.Space `/parse/image` response we rely on
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OcrSpaceResponse {
    #[serde(rename = "ParsedResults", default)]
    pub parsed_results: Option<Vec<ParsedResult>>,
    #[serde(rename = "OCRExitCode", default)]
    pub ocr_exit_code: Option<Value>,
    #[serde(rename = "IsErroredOnProcessing", default)]
    pub is_errored_on_processing: Option<bool>,
    #[serde(rename = "ErrorMessage", default)]
    pub error_message: Option<Value>,
    #[serde(rename = "ErrorDetails", default)]
    pub error_details: Option<Value>,
    #[serde(rename = "ProcessingTimeInMilliseconds", default)]
    pub processing_time_in_milliseconds: Option<Value>,
}

/// Loosely typed so one odd field never rejects the whole body
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ParsedResult {
    #[serde(rename = "ParsedText", default)]
    pub parsed_text: Option<Value>,
    #[serde(rename = "Confidence", default)]
    pub confidence: Option<Value>,
}

impl ParsedResult {
    fn text(&self) -> Option<&str> {
        self.parsed_text.as_ref().and_then(Value::as_str)
    }

    /// Numeric confidences only; anything else is skipped
    fn confidence(&self) -> Option<f64> {
        self.confidence.as_ref().and_then(Value::as_f64)
    }
}

impl OcrSpaceResponse {
    /// Exit code as an integer; OCR.Space sends it as a number or a string
    pub fn exit_code(&self) -> Option<i64> {
        match &self.ocr_exit_code {
            Some(Value::Number(n)) => n.as_i64(),
            Some(Value::String(s)) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// `ErrorMessage` joined, else `ErrorDetails`, else a generic message
    pub fn error_text(&self) -> String {
        let from_message = match &self.error_message {
            Some(Value::Array(items)) => {
                let parts: Vec<String> = items
                    .iter()
                    .map(|v| v.as_str().map(str::to_string).unwrap_or_else(|| v.to_string()))
                    .filter(|s| !s.is_empty())
                    .collect();
                (!parts.is_empty()).then(|| parts.join(" | "))
            }
            Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
            _ => None,
        };

        from_message
            .or_else(|| match &self.error_details {
                Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
                Some(Value::Null) | Some(Value::String(_)) | None => None,
                Some(other) => Some(other.to_string()),
            })
            .unwrap_or_else(|| "OCR.Space processing error".to_string())
    }

    /// 1 = parsed, 2 = partially parsed; anything else is a failure
    pub fn is_success(&self) -> bool {
        !self.is_errored_on_processing.unwrap_or(false) && matches!(self.exit_code(), Some(1) | Some(2))
    }

    pub fn text(&self) -> String {
        self.parsed_results
            .iter()
            .flatten()
            .filter_map(ParsedResult::text)
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join("\n")
            .trim()
            .to_string()
    }

    pub fn meta(&self, text: &str) -> OcrMeta {
        let confidences: Vec<f64> = self
            .parsed_results
            .iter()
            .flatten()
            .filter(|r| r.text().is_some())
            .filter_map(ParsedResult::confidence)
            .collect();
        let mean_confidence = if confidences.is_empty() {
            0.0
        } else {
            confidences.iter().sum::<f64>() / confidences.len() as f64
        };

        OcrMeta {
            mean_confidence,
            question_number_count: count_line_leading_numbers(text),
            ocr_exit_code: self.exit_code(),
            is_errored_on_processing: self.is_errored_on_processing.unwrap_or(false),
            processing_time_in_milliseconds: self.processing_time_in_milliseconds.clone(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AttemptError {
    #[error("{0}")]
    Transport(String),

    #[error("OCR.Space HTTP {status}{}", .detail.as_deref().map(|d| format!(" / {d}")).unwrap_or_default())]
    Http { status: u16, detail: Option<String> },

    #[error("OCR.Space returned non-JSON")]
    NotJson,

    #[error("{0}")]
    Processing(String),
}

/// Successful recognition of one page
#[derive(Debug, Clone)]
pub struct OcrOutcome {
    pub text: String,
    pub meta: OcrMeta,
    pub endpoint: String,
    pub from_backup: bool,
    pub attempts: u32,
    pub raw: String,
}

/// Every endpoint and attempt failed
#[derive(Debug, Clone)]
pub struct OcrFailure {
    pub detail: String,
    pub raw: String,
    pub endpoint_used: String,
    pub attempts: u32,
}

/// OCR.Space client with primary/backup failover
#[derive(Debug, Clone)]
pub struct OcrSpaceClient {
    client: Client,
    config: OcrConfig,
}

impl OcrSpaceClient {
    pub fn new(config: OcrConfig) -> Self {
        let client = Client::builder()
            .timeout(config.timeout())
            .connect_timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self { client, config }
    }

    pub fn has_api_key(&self) -> bool {
        !self.config.api_key.is_empty()
    }

    fn form(&self, image: &str) -> Vec<(&'static str, String)> {
        vec![
            ("apikey", self.config.api_key.clone()),
            ("language", self.config.language.clone()),
            ("isOverlayRequired", "false".to_string()),
            ("scale", "true".to_string()),
            ("detectOrientation", "true".to_string()),
            ("isTable", "false".to_string()),
            ("OCREngine", self.config.engine.clone()),
            ("base64Image", image.to_string()),
        ]
    }

    /// One POST; `raw` is whatever body came back, even on failure
    async fn attempt(
        &self,
        endpoint: &str,
        form: &[(&'static str, String)],
        raw: &mut String,
    ) -> Result<OcrSpaceResponse, AttemptError> {
        let response = self
            .client
            .post(endpoint)
            .form(form)
            .send()
            .await
            .map_err(|e| AttemptError::Transport(e.to_string()))?;

        let status = response.status();
        *raw = response.text().await.unwrap_or_default();
        let parsed = serde_json::from_str::<OcrSpaceResponse>(raw).ok();

        if !status.is_success() {
            return Err(AttemptError::Http {
                status: status.as_u16(),
                detail: parsed.map(|p| p.error_text()),
            });
        }

        let parsed = parsed.ok_or(AttemptError::NotJson)?;
        if !parsed.is_success() {
            return Err(AttemptError::Processing(parsed.error_text()));
        }

        Ok(parsed)
    }

    /// Try each endpoint up to `max_tries` times, backing off linearly between tries
    pub async fn recognize(&self, image: &str) -> Result<OcrOutcome, OcrFailure> {
        let form = self.form(image);
        let endpoints = self.config.endpoints();
        let max_tries = self.config.max_tries.max(1);

        let mut last_error: Option<String> = None;
        let mut last_raw = String::new();
        let mut endpoint_used = String::new();
        let mut attempts = 0u32;

        for (endpoint_idx, endpoint) in endpoints.iter().enumerate() {
            endpoint_used = endpoint.clone();

            for try_idx in 0..max_tries {
                attempts += 1;
                log_upstream!(start, UPSTREAM, endpoint = endpoint, attempt = attempts);
                let started = Instant::now();

                let mut raw = String::new();
                match self.attempt(endpoint, &form, &mut raw).await {
                    Ok(parsed) => {
                        log_upstream!(
                            success,
                            UPSTREAM,
                            endpoint = endpoint,
                            duration_ms = started.elapsed().as_millis() as u64
                        );
                        let text = parsed.text();
                        let meta = parsed.meta(&text);
                        info!(
                            endpoint = %endpoint,
                            text_length = text.len(),
                            attempts,
                            from_backup = endpoint_idx > 0,
                            "OCR text extracted"
                        );
                        return Ok(OcrOutcome {
                            text,
                            meta,
                            endpoint: endpoint.clone(),
                            from_backup: endpoint_idx > 0,
                            attempts,
                            raw: truncate_chars(&raw, RAW_PREVIEW_CHARS),
                        });
                    }
                    Err(e) => {
                        log_upstream!(retry, UPSTREAM, endpoint = endpoint, attempt = attempts, error = e);
                        last_error = Some(e.to_string());
                        if !raw.is_empty() {
                            last_raw = raw;
                        }
                    }
                }

                if try_idx + 1 < max_tries {
                    let backoff = Duration::from_millis(self.config.backoff_ms * u64::from(try_idx + 1));
                    debug!(backoff_ms = backoff.as_millis() as u64, "Backing off before next OCR attempt");
                    tokio::time::sleep(backoff).await;
                }
            }
        }

        let detail = last_error.unwrap_or_else(|| "Unknown".to_string());
        log_upstream!(error, UPSTREAM, endpoint = endpoint_used, error = detail);

        Err(OcrFailure {
            detail,
            raw: truncate_chars(&last_raw, RAW_PREVIEW_CHARS),
            endpoint_used,
            attempts,
        })
    }
}
