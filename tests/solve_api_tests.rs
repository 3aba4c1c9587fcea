mod common;

use axum::{http::StatusCode, routing::post, Json, Router};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use common::{spawn_upstream, test_config, test_server};

const PAGE_TEXT: &str = "1. Which word is closest in meaning to the underlined word?\n\
2. What is the main idea of the passage?\n\
3. Where would the given sentence best fit?\n\
4. Which underlined part is grammatically incorrect?";

fn completion(content: &str) -> Value {
    json!({
        "id": "gen-test",
        "model": "openai/gpt-4o-mini",
        "choices": [{
            "index": 0,
            "message": { "role": "assistant", "content": content },
            "finish_reason": "stop"
        }]
    })
}

/// Answers depend on which specialist the system message asks for
fn role_reply(system: &str) -> &'static str {
    if system.contains("vocabulary specialist") {
        "1: B\n2: D\nUNSURE: -XURTH"
    } else if system.contains("logic specialist") {
        "1: B\n2: D\n3: n/a\nUNSURE: 2 XURTH"
    } else if system.contains("reading-comprehension specialist") {
        "1: A\n2: D\nUNSURE: 1XURTH"
    } else if system.contains("grammar specialist") {
        "**1: B**\n4: D\nXURTH"
    } else {
        "1: B\n2: D\n3: n/a\n4: D\nUNSURE: 3\nXURTH"
    }
}

fn openrouter_upstream(calls: Arc<AtomicUsize>) -> Router {
    Router::new().route(
        "/v1/chat/completions",
        post(move |headers: axum::http::HeaderMap, Json(request): Json<Value>| {
            let calls = calls.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                assert_eq!(headers["authorization"], "Bearer sk-or-test");
                assert_eq!(request["model"], "openai/gpt-4o-mini");
                assert_eq!(request["temperature"], 0.0);
                let system = request["messages"][0]["content"].as_str().unwrap_or_default().to_string();
                Json(completion(role_reply(&system)))
            }
        }),
    )
}

#[tokio::test]
async fn test_solve_votes_across_roles() {
    let calls = Arc::new(AtomicUsize::new(0));
    let base = spawn_upstream(openrouter_upstream(calls.clone())).await;
    let server = test_server(&test_config(&base, &[]));

    let response = server
        .post("/api/solve")
        .json(&json!({ "text": PAGE_TEXT, "page": 5 }))
        .await;

    response.assert_status_ok();
    assert_eq!(response.header("cache-control"), "no-store");
    assert_eq!(calls.load(Ordering::SeqCst), 4);

    let body: Value = response.json();
    assert_eq!(body["ok"], true);
    assert_eq!(body["text"], "1: B\n2: D\n3: D (?)\n4: D");

    let answers = body["answers"].as_array().unwrap();
    assert_eq!(answers.len(), 4);
    assert_eq!(answers[0]["number"], 1);
    assert_eq!(answers[0]["answer"], "B");
    assert_eq!(answers[0]["fallback"], false);
    assert_eq!(answers[0]["votes"].as_array().unwrap().len(), 4);
    assert_eq!(answers[1]["level"], "high");
    assert_eq!(answers[1]["confidence"], 1.0);
    assert_eq!(answers[2]["fallback"], true);
    assert_eq!(answers[2]["level"], "low");
    assert_eq!(answers[2]["confidence"], 0.0);

    let debug = &body["debug"];
    assert_eq!(debug["page"], 5);
    assert_eq!(debug["normalizedNumbers"], json!([1, 2, 3, 4]));
    assert_eq!(debug["missingNumbers"], json!([3]));
    assert_eq!(debug["stopToken"], "XURTH");
    assert_eq!(debug["roles"].as_array().unwrap().len(), 4);
    assert!(debug["roles"].as_array().unwrap().iter().all(|r| r["ok"] == true));
}

#[tokio::test]
async fn test_solve_netlify_alias_and_single_role() {
    let calls = Arc::new(AtomicUsize::new(0));
    let base = spawn_upstream(openrouter_upstream(calls.clone())).await;
    let server = test_server(&test_config(&base, &[("SOLVE_ROLES", "grammar")]));

    let response = server
        .post("/.netlify/functions/solve")
        .json(&json!({ "text": PAGE_TEXT }))
        .await;

    response.assert_status_ok();
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let body: Value = response.json();
    // Grammar answered 1 and 4 with B and D; the tie for the fallback goes to B
    assert_eq!(body["text"], "1: B\n2: B (?)\n3: B (?)\n4: D");
    assert_eq!(body["debug"]["page"], 1);
}

#[tokio::test]
async fn test_solve_without_question_numbers() {
    let calls = Arc::new(AtomicUsize::new(0));
    let base = spawn_upstream(openrouter_upstream(calls.clone())).await;
    let server = test_server(&test_config(&base, &[]));

    let response = server
        .post("/api/solve")
        .json(&json!({ "text": "Read the passage carefully.", "page": 3 }))
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["ok"], false);
    assert_eq!(body["errorType"], "NoQuestionsFound");
    assert_eq!(body["debug"]["page"], 3);
    assert_eq!(body["debug"]["normalizedNumbers"], json!([]));
    assert!(body["debug"]["requestId"].is_string());
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_solve_blank_text_and_bad_json() {
    let server = test_server(&test_config("http://127.0.0.1:9", &[]));

    let response = server.post("/api/solve").json(&json!({ "text": "   " })).await;
    response.assert_status(StatusCode::BAD_REQUEST);

    let response = server.post("/api/solve").text("not json").await;
    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(response.json::<Value>()["error"], "Invalid JSON body");
}

#[tokio::test]
async fn test_solve_missing_api_key() {
    let server = test_server(&test_config("http://127.0.0.1:9", &[("OPENROUTER_API_KEY", "")]));

    let response = server.post("/api/solve").json(&json!({ "text": PAGE_TEXT })).await;

    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        response.json::<Value>()["error"],
        "OPENROUTER_API_KEY is not set on the server"
    );
}

#[tokio::test]
async fn test_solve_all_roles_failing() {
    let upstream = Router::new().route(
        "/v1/chat/completions",
        post(|| async { (StatusCode::SERVICE_UNAVAILABLE, "upstream overloaded") }),
    );
    let base = spawn_upstream(upstream).await;
    let server = test_server(&test_config(&base, &[]));

    let response = server.post("/api/solve").json(&json!({ "text": PAGE_TEXT })).await;

    response.assert_status(StatusCode::BAD_GATEWAY);
    let body: Value = response.json();
    assert_eq!(body["ok"], false);
    assert_eq!(body["errorType"], "OpenRouterHTTPError");
    assert!(body["detail"].as_str().unwrap().contains("upstream overloaded"));

    let roles = body["debug"]["roles"].as_array().unwrap();
    assert_eq!(roles.len(), 4);
    assert!(roles.iter().all(|r| r["ok"] == false));
    assert_eq!(body["debug"]["page"], 1);
    assert!(body["debug"]["requestId"].is_string());
}

#[tokio::test]
async fn test_solve_retries_rate_limited_call() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let upstream = Router::new().route(
        "/v1/chat/completions",
        post(move || {
            let counter = counter.clone();
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    (StatusCode::TOO_MANY_REQUESTS, Json(json!({ "error": { "message": "slow down" } })))
                } else {
                    (StatusCode::OK, Json(completion("1: A\n2: B\n3: C\n4: D\nXURTH")))
                }
            }
        }),
    );
    let base = spawn_upstream(upstream).await;
    let server = test_server(&test_config(
        &base,
        &[("SOLVE_ROLES", "grammar"), ("LLM_MAX_TRIES", "3")],
    ));

    let response = server.post("/api/solve").json(&json!({ "text": PAGE_TEXT })).await;

    response.assert_status_ok();
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    let body: Value = response.json();
    assert_eq!(body["ok"], true);
    assert_eq!(body["text"], "1: A\n2: B\n3: C\n4: D");
}

#[tokio::test]
async fn test_solve_does_not_retry_client_errors() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let upstream = Router::new().route(
        "/v1/chat/completions",
        post(move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                (StatusCode::BAD_REQUEST, Json(json!({ "error": { "message": "invalid model" } })))
            }
        }),
    );
    let base = spawn_upstream(upstream).await;
    let server = test_server(&test_config(&base, &[("LLM_MAX_TRIES", "3")]));

    let response = server.post("/api/solve/debug").json(&json!({ "text": PAGE_TEXT })).await;

    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(response.json::<Value>()["detail"].as_str().unwrap().contains("invalid model"));
}

#[tokio::test]
async fn test_solve_debug_returns_raw_completion() {
    let calls = Arc::new(AtomicUsize::new(0));
    let base = spawn_upstream(openrouter_upstream(calls.clone())).await;
    let server = test_server(&test_config(&base, &[]));

    let response = server
        .post("/api/solve/debug")
        .json(&json!({ "text": PAGE_TEXT, "page": 2 }))
        .await;

    response.assert_status_ok();
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let body: Value = response.json();
    assert_eq!(body["ok"], true);
    assert_eq!(body["text"], "1: B\n2: D\n3: n/a\n4: D\nUNSURE: 3\nXURTH");
    assert_eq!(body["debug"]["numbersForPrompt"], json!([1, 2, 3, 4]));
    assert_eq!(body["debug"]["finishReason"], "stop");
    assert_eq!(body["debug"]["model"], "openai/gpt-4o-mini");
}

#[tokio::test]
async fn test_solve_debug_forwards_upstream_status() {
    let upstream = Router::new().route(
        "/v1/chat/completions",
        post(|| async { (StatusCode::UNAUTHORIZED, Json(json!({ "error": { "message": "No auth credentials found" } }))) }),
    );
    let base = spawn_upstream(upstream).await;
    let server = test_server(&test_config(&base, &[]));

    let response = server
        .post("/.netlify/functions/solve_debug")
        .json(&json!({ "text": PAGE_TEXT }))
        .await;

    response.assert_status(StatusCode::UNAUTHORIZED);
    let body: Value = response.json();
    assert_eq!(body["errorType"], "OpenRouterHTTPError");
    assert_eq!(body["error"], "status=401");
    assert!(body["detail"].as_str().unwrap().contains("No auth credentials found"));
}

#[tokio::test]
async fn test_health() {
    let server = test_server(&test_config("http://127.0.0.1:9", &[]));

    let response = server.get("/health").await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["ok"], true);
    assert_eq!(body["service"], "exam-answer-service");
}
