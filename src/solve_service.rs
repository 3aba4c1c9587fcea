use futures_util::future::join_all;
use serde_json::Value;
use std::time::Instant;
use tracing::{info, warn};
use uuid::Uuid;

use crate::answer_parser::{parse_answer_lines, STOP_TOKEN};
use crate::config::SolveConfig;
use crate::ensemble::{tally, Ballot};
use crate::llm_providers::LlmError;
use crate::llm_service::LLMService;
use crate::models::{
    truncate_chars, RoleReport, SolveDebug, SolveDebugInfo, SolveDebugResponse, SolveResponse,
};
use crate::prompts::{build_debug_prompt, build_solve_prompt, DEBUG_SYSTEM_MESSAGE};
use crate::question_numbers::{extract_question_numbers, QuestionNumbers};
use crate::question_type::classify_questions;
use crate::{log_performance, log_service_start};

const RAW_PREVIEW_CHARS: usize = 1500;

#[derive(Debug, thiserror::Error)]
pub enum SolveError {
    #[error("Missing 'text' field in body")]
    EmptyText,

    #[error("No question numbers detected in text")]
    NoQuestions { numbers: QuestionNumbers },

    #[error("All solver roles failed: {last}")]
    AllRolesFailed { last: LlmError, roles: Vec<RoleReport> },

    #[error(transparent)]
    Llm(#[from] LlmError),
}

/// Turns one page of OCR text into an answer key
#[derive(Debug, Clone)]
pub struct SolveService {
    llm: LLMService,
    config: SolveConfig,
}

impl SolveService {
    pub fn new(llm: LLMService, config: SolveConfig) -> Self {
        Self { llm, config }
    }

    pub fn has_api_key(&self) -> bool {
        self.llm.has_api_key()
    }

    fn numbers(&self, text: &str) -> Result<QuestionNumbers, SolveError> {
        if text.trim().is_empty() {
            return Err(SolveError::EmptyText);
        }
        let numbers = extract_question_numbers(text, self.config.min_number, self.config.max_number);
        if numbers.is_empty() {
            return Err(SolveError::NoQuestions { numbers });
        }
        Ok(numbers)
    }

    /// Ask every configured role, vote, and fill the gaps
    pub async fn solve(&self, text: &str, page: Value, request_id: Uuid) -> Result<SolveResponse, SolveError> {
        let started = Instant::now();
        let numbers = self.numbers(text)?;
        let question_types = classify_questions(text, &numbers.normalized_numbers);
        let number_list = numbers.joined();

        log_service_start!("solve_service", "solve", question_count = numbers.normalized_numbers.len());

        let calls = self.config.roles.iter().map(|&role| {
            let prompt = build_solve_prompt(role, text, &number_list);
            async move { (role, self.llm.complete(role.system_message(), &prompt).await) }
        });
        let results = join_all(calls).await;

        let mut ballots = Vec::new();
        let mut reports = Vec::new();
        let mut last_error = None;

        for (role, result) in results {
            match result {
                Ok(completion) => {
                    let answers = parse_answer_lines(&completion.text);
                    if answers.is_empty() {
                        warn!(%request_id, role = %role, "Solver response contained no answer lines");
                    }
                    reports.push(RoleReport {
                        role,
                        ok: true,
                        finish_reason: completion.finish_reason.clone(),
                        parsed_count: answers.len(),
                        unsure: answers.unsure.iter().copied().collect(),
                        error: None,
                        raw: Some(truncate_chars(&completion.text, RAW_PREVIEW_CHARS)),
                    });
                    ballots.push(Ballot { role, answers });
                }
                Err(e) => {
                    warn!(%request_id, role = %role, error = %e, "Solver role failed");
                    reports.push(RoleReport {
                        role,
                        ok: false,
                        finish_reason: None,
                        parsed_count: 0,
                        unsure: Vec::new(),
                        error: Some(e.to_string()),
                        raw: None,
                    });
                    last_error = Some(e);
                }
            }
        }

        if ballots.is_empty() {
            if let Some(last) = last_error {
                return Err(SolveError::AllRolesFailed { last, roles: reports });
            }
        }

        let tally_started = Instant::now();
        let key = tally(&numbers.normalized_numbers, &ballots, &question_types);
        log_performance!(
            "tally",
            duration_ms = tally_started.elapsed().as_millis() as u64,
            count = key.answers.len()
        );

        let missing_numbers = key.missing_numbers();
        if !missing_numbers.is_empty() {
            warn!(%request_id, missing = ?missing_numbers, "Filled unanswered questions with fallback guesses");
        }

        let elapsed_ms = started.elapsed().as_millis() as u64;
        info!(
            %request_id,
            question_count = key.answers.len(),
            ballots = ballots.len(),
            elapsed_ms,
            "Answer key built"
        );

        Ok(SolveResponse {
            ok: true,
            text: key.to_text(),
            debug: SolveDebug {
                request_id,
                page,
                raw_numbers: numbers.raw_numbers,
                normalized_numbers: numbers.normalized_numbers,
                question_types,
                roles: reports,
                model: self.llm.model_name().to_string(),
                stop_token: STOP_TOKEN,
                missing_numbers,
                elapsed_ms,
            },
            answers: key.answers,
        })
    }

    /// Single neutral call; returns the raw completion untouched
    pub async fn solve_debug(
        &self,
        text: &str,
        page: Value,
        request_id: Uuid,
    ) -> Result<SolveDebugResponse, SolveError> {
        let numbers = self.numbers(text)?;
        let prompt = build_debug_prompt(text, &numbers.joined());

        let completion = self.llm.complete(DEBUG_SYSTEM_MESSAGE, &prompt).await?;

        Ok(SolveDebugResponse {
            ok: true,
            text: completion.text,
            debug: SolveDebugInfo {
                request_id,
                page,
                numbers_for_prompt: numbers.normalized_numbers.clone(),
                raw_numbers: numbers.raw_numbers,
                normalized_numbers: numbers.normalized_numbers,
                stop_token: STOP_TOKEN,
                model: completion.model,
                finish_reason: completion.finish_reason,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> SolveService {
        SolveService::new(
            LLMService::with_base_url("sk-test", "http://127.0.0.1:9/v1", "m"),
            SolveConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_blank_text_is_rejected() {
        let err = service().solve("  \n", Value::from(1), Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, SolveError::EmptyText));
    }

    #[tokio::test]
    async fn test_text_without_numbers() {
        let err = service()
            .solve("no markers here", Value::from(1), Uuid::new_v4())
            .await
            .unwrap_err();
        match err {
            SolveError::NoQuestions { numbers } => assert!(numbers.normalized_numbers.is_empty()),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_all_roles_failing_is_reported() {
        let err = service()
            .solve("1. What is the title?", Value::from(1), Uuid::new_v4())
            .await
            .unwrap_err();
        match err {
            SolveError::AllRolesFailed { roles, .. } => {
                assert_eq!(roles.len(), 4);
                assert!(roles.iter().all(|r| !r.ok && r.error.is_some()));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
