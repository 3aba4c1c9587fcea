#![allow(dead_code)]

use axum::Router;
use axum_test::TestServer;
use exam_answer_service::{
    api::{create_router, AppState},
    Config, LLMService, OcrSpaceClient, SolveService,
};
use std::collections::HashMap;

pub const PNG_DATA_URL: &str = "data:image/png;base64,iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNkYPhfDwAChwGA60e6kgAAAABJRU5ErkJggg==";

/// Serve `app` on an ephemeral localhost port and return its base URL
pub async fn spawn_upstream(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

/// Config pointing both upstreams at `base`, with retries sped up for tests
pub fn test_config(base: &str, overrides: &[(&str, &str)]) -> Config {
    let mut vars: HashMap<String, String> = [
        ("OCR_SPACE_API_KEY", "ocr-test-key".to_string()),
        ("OCR_SPACE_API_ENDPOINT", format!("{base}/primary")),
        ("OCR_SPACE_API_ENDPOINT_BACKUP", format!("{base}/backup")),
        ("OCR_SPACE_BACKOFF_MS", "0".to_string()),
        ("OPENROUTER_API_KEY", "sk-or-test".to_string()),
        ("OPENROUTER_BASE_URL", format!("{base}/v1")),
        ("LLM_MAX_TRIES", "1".to_string()),
        ("LLM_BACKOFF_MS", "0".to_string()),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect();

    for (key, value) in overrides {
        vars.insert(key.to_string(), value.to_string());
    }

    Config::from_source(|key| vars.get(key).cloned()).unwrap()
}

pub fn test_server(config: &Config) -> TestServer {
    let state = AppState {
        ocr: OcrSpaceClient::new(config.ocr.clone()),
        solver: SolveService::new(LLMService::new(&config.llm), config.solve.clone()),
    };
    TestServer::new(create_router(state)).unwrap()
}
