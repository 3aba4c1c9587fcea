use anyhow::{anyhow, Result};
use std::env;
use std::time::Duration;
use tracing::{info, warn};

use crate::llm_providers::LLMProviderType;
use crate::prompts::SolverRole;

// Import logging macros
use crate::{log_system_event, log_validation};

pub const DEFAULT_OCR_PRIMARY_ENDPOINT: &str = "https://apipro1.ocr.space/parse/image";
pub const DEFAULT_OCR_BACKUP_ENDPOINT: &str = "https://apipro2.ocr.space/parse/image";
pub const DEFAULT_OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";
pub const DEFAULT_MODEL: &str = "openai/gpt-4o-mini";

const MIN_OCR_TIMEOUT_MS: u64 = 5_000;

/// Complete application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub ocr: OcrConfig,
    pub llm: LLMConfig,
    pub solve: SolveConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

/// OCR.Space connection settings
#[derive(Debug, Clone)]
pub struct OcrConfig {
    pub api_key: String,
    pub primary_endpoint: String,
    pub backup_endpoint: Option<String>,
    pub timeout_ms: u64,
    pub max_tries: u32,
    pub backoff_ms: u64,
    pub language: String,
    pub engine: String,
}

/// Chat-completion provider settings
#[derive(Debug, Clone)]
pub struct LLMConfig {
    pub api_key: String,
    pub base_url: Option<String>,
    pub provider: LLMProviderType,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub max_tries: u32,
    pub backoff_ms: u64,
    pub timeout_ms: u64,
    pub referer: Option<String>,
    pub title: Option<String>,
}

/// Answer-key generation settings
#[derive(Debug, Clone)]
pub struct SolveConfig {
    pub roles: Vec<SolverRole>,
    pub min_number: u32,
    pub max_number: u32,
}

/// HTTP server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
}

/// Logging system configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub file_enabled: bool,
    pub console_enabled: bool,
    pub log_directory: String,
}

impl Config {
    /// Load configuration from environment variables with sensible defaults
    pub fn from_env() -> Result<Self> {
        Self::from_source(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    pub fn from_source<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        log_system_event!(config, "Loading application configuration");

        let config = Config {
            ocr: OcrConfig::from_source(&lookup)?,
            llm: LLMConfig::from_source(&lookup)?,
            solve: SolveConfig::from_source(&lookup)?,
            server: ServerConfig::from_source(&lookup)?,
            logging: LoggingConfig::from_source(&lookup),
        };

        log_system_event!(config, "Configuration loaded successfully");
        config.log_configuration_summary();

        Ok(config)
    }

    /// Log a summary of loaded configuration (without sensitive data)
    fn log_configuration_summary(&self) {
        info!(
            ocr_api_key_masked = %mask_sensitive_data(&self.ocr.api_key),
            ocr_primary = %self.ocr.primary_endpoint,
            ocr_backup = ?self.ocr.backup_endpoint,
            llm_api_key_masked = %mask_sensitive_data(&self.llm.api_key),
            llm_provider = ?self.llm.provider,
            llm_model = %self.llm.model,
            solver_roles = ?self.solve.roles,
            server_address = %self.server.address(),
            log_level = %self.logging.level,
            "Configuration summary"
        );
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(anyhow!("Server port must be greater than 0"));
        }

        if self.ocr.primary_endpoint.is_empty() {
            return Err(anyhow!("OCR_SPACE_API_ENDPOINT must not be empty"));
        }

        if self.ocr.max_tries == 0 || self.llm.max_tries == 0 {
            return Err(anyhow!("Retry counts must be at least 1"));
        }

        if self.solve.roles.is_empty() {
            return Err(anyhow!("SOLVE_ROLES must name at least one solver role"));
        }

        if self.solve.min_number > self.solve.max_number {
            return Err(anyhow!(
                "SOLVE_MIN_NUMBER ({}) is greater than SOLVE_MAX_NUMBER ({})",
                self.solve.min_number,
                self.solve.max_number
            ));
        }

        if self.ocr.api_key.is_empty() {
            warn!("OCR_SPACE_API_KEY is empty - the OCR endpoint will reject requests");
        }

        if self.llm.api_key.is_empty() {
            warn!("OPENROUTER_API_KEY is empty - the solve endpoints will reject requests");
        }

        if !["trace", "debug", "info", "warn", "error"]
            .iter()
            .any(|level| self.logging.level.to_lowercase().starts_with(level))
            && !self.logging.level.contains('=')
        {
            warn!("Unusual log filter '{}', tracing may fall back to defaults", self.logging.level);
        }

        log_validation!(success, "configuration", "Configuration validation completed successfully");
        Ok(())
    }
}

impl OcrConfig {
    fn from_source<F: Fn(&str) -> Option<String>>(lookup: &F) -> Result<Self> {
        let api_key = lookup("OCR_SPACE_API_KEY")
            .map(|k| k.trim().to_string())
            .unwrap_or_default();

        let primary_endpoint = normalize_endpoint(
            &lookup("OCR_SPACE_API_ENDPOINT").unwrap_or_else(|| DEFAULT_OCR_PRIMARY_ENDPOINT.to_string()),
        );
        let backup_endpoint = normalize_endpoint(
            &lookup("OCR_SPACE_API_ENDPOINT_BACKUP").unwrap_or_else(|| DEFAULT_OCR_BACKUP_ENDPOINT.to_string()),
        );
        let backup_endpoint = if backup_endpoint.is_empty() || backup_endpoint == primary_endpoint {
            None
        } else {
            Some(backup_endpoint)
        };

        let timeout_ms = lookup("OCR_SPACE_TIMEOUT_MS")
            .and_then(|v| v.trim().parse::<u64>().ok())
            .filter(|v| *v > 0)
            .unwrap_or(30_000)
            .max(MIN_OCR_TIMEOUT_MS);

        let max_tries = parse_or(lookup("OCR_SPACE_MAX_TRIES"), 3u32, "OCR_SPACE_MAX_TRIES")?;
        let backoff_ms = parse_or(lookup("OCR_SPACE_BACKOFF_MS"), 350u64, "OCR_SPACE_BACKOFF_MS")?;
        let language = lookup("OCR_SPACE_LANGUAGE").unwrap_or_else(|| "eng".to_string());
        let engine = lookup("OCR_SPACE_ENGINE").unwrap_or_else(|| "2".to_string());

        Ok(OcrConfig {
            api_key,
            primary_endpoint,
            backup_endpoint,
            timeout_ms,
            max_tries,
            backoff_ms,
            language,
            engine,
        })
    }

    /// Primary first, then the backup when one is configured
    pub fn endpoints(&self) -> Vec<String> {
        let mut endpoints = vec![self.primary_endpoint.clone()];
        if let Some(backup) = &self.backup_endpoint {
            endpoints.push(backup.clone());
        }
        endpoints.retain(|e| !e.is_empty());
        endpoints
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl LLMConfig {
    fn from_source<F: Fn(&str) -> Option<String>>(lookup: &F) -> Result<Self> {
        let api_key = lookup("OPENROUTER_API_KEY")
            .or_else(|| lookup("LLM_API_KEY"))
            .map(|k| k.trim().to_string())
            .unwrap_or_default();

        let provider_str = lookup("LLM_PROVIDER").unwrap_or_else(|| "openrouter".to_string());
        let provider = match provider_str.to_lowercase().as_str() {
            "openrouter" => LLMProviderType::OpenRouter,
            "openai" | "chatgpt" | "gpt" => LLMProviderType::OpenAI,
            _ => {
                info!("Unknown LLM provider '{}', defaulting to OpenRouter", provider_str);
                LLMProviderType::OpenRouter
            }
        };

        let base_url = lookup("OPENROUTER_BASE_URL").or_else(|| lookup("LLM_BASE_URL"));
        let model = lookup("LLM_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let temperature = parse_or(lookup("LLM_TEMPERATURE"), 0.0f32, "LLM_TEMPERATURE")?;
        let max_tokens = parse_or(lookup("LLM_MAX_TOKENS"), 512u32, "LLM_MAX_TOKENS")?;
        let max_tries = parse_or(lookup("LLM_MAX_TRIES"), 2u32, "LLM_MAX_TRIES")?;
        let backoff_ms = parse_or(lookup("LLM_BACKOFF_MS"), 500u64, "LLM_BACKOFF_MS")?;
        let timeout_ms = parse_or(lookup("LLM_TIMEOUT_MS"), 45_000u64, "LLM_TIMEOUT_MS")?;

        Ok(LLMConfig {
            api_key,
            base_url,
            provider,
            model,
            temperature,
            max_tokens,
            max_tries,
            backoff_ms,
            timeout_ms,
            referer: lookup("OPENROUTER_REFERER"),
            title: lookup("OPENROUTER_TITLE"),
        })
    }
}

impl SolveConfig {
    fn from_source<F: Fn(&str) -> Option<String>>(lookup: &F) -> Result<Self> {
        let roles = match lookup("SOLVE_ROLES") {
            Some(raw) => raw
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| {
                    SolverRole::parse(s).ok_or_else(|| anyhow!("Unknown solver role '{}' in SOLVE_ROLES", s))
                })
                .collect::<Result<Vec<_>>>()?,
            None => SolverRole::ALL.to_vec(),
        };

        let min_number = parse_or(lookup("SOLVE_MIN_NUMBER"), 1u32, "SOLVE_MIN_NUMBER")?;
        let max_number = parse_or(lookup("SOLVE_MAX_NUMBER"), 50u32, "SOLVE_MAX_NUMBER")?;

        Ok(SolveConfig {
            roles,
            min_number,
            max_number,
        })
    }
}

impl Default for SolveConfig {
    fn default() -> Self {
        Self {
            roles: SolverRole::ALL.to_vec(),
            min_number: 1,
            max_number: 50,
        }
    }
}

impl ServerConfig {
    fn from_source<F: Fn(&str) -> Option<String>>(lookup: &F) -> Result<Self> {
        let port_str = lookup("PORT").unwrap_or_else(|| "3000".to_string());

        let port = port_str
            .parse::<u16>()
            .map_err(|_| anyhow!("Invalid PORT value: '{}'. Must be a number between 1-65535", port_str))?;

        let host = lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string());

        Ok(ServerConfig { port, host })
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl LoggingConfig {
    /// Logging settings alone, so the subscriber can be installed before the rest of the config loads
    pub fn from_env() -> Self {
        Self::from_source(&|key: &str| env::var(key).ok())
    }

    fn from_source<F: Fn(&str) -> Option<String>>(lookup: &F) -> Self {
        let level = lookup("RUST_LOG").unwrap_or_else(|| "info,exam_answer_service=debug".to_string());

        let file_enabled = lookup("LOG_FILE_ENABLED")
            .and_then(|v| v.parse::<bool>().ok())
            .unwrap_or(true);

        let console_enabled = lookup("LOG_CONSOLE_ENABLED")
            .and_then(|v| v.parse::<bool>().ok())
            .unwrap_or(true);

        let log_directory = lookup("LOG_DIRECTORY").unwrap_or_else(|| "logs".to_string());

        LoggingConfig {
            level,
            file_enabled,
            console_enabled,
            log_directory,
        }
    }
}

fn parse_or<T: std::str::FromStr>(value: Option<String>, default: T, name: &str) -> Result<T> {
    match value {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| anyhow!("Invalid {} value: '{}'", name, raw)),
        None => Ok(default),
    }
}

/// Fix the common OCR.Space PRO host typos (`api-pro1` instead of `apipro1`)
pub fn normalize_endpoint(url: &str) -> String {
    url.trim()
        .replace("://api-pro1.ocr.space", "://apipro1.ocr.space")
        .replace("://api-pro2.ocr.space", "://apipro2.ocr.space")
}

/// Mask sensitive data in configuration for safe logging
pub fn mask_sensitive_data(data: &str) -> String {
    let chars: Vec<char> = data.chars().collect();
    if chars.len() <= 8 {
        "*".repeat(chars.len())
    } else {
        let head: String = chars[..4].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{}***{}", head, tail)
    }
}
