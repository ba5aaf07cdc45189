//! Retry-contract tests for the Bot API client, driven against a local stub
//! server that scripts one response per incoming call.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderValue, StatusCode};
use axum::response::Response;
use axum::Router;
use serde_json::{json, Value};

use gift_courier::{ApiMethod, AppConfig, BotApiClient, ErrorCode};

enum Scripted {
    Ok(Value),
    ApiError(&'static str),
    RateLimited(u64),
}

struct Stub {
    calls: AtomicUsize,
    script: Mutex<VecDeque<Scripted>>,
}

fn json_response(status: StatusCode, body: Value) -> Response {
    Response::builder()
        .status(status)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn stub_handler(State(stub): State<Arc<Stub>>) -> Response {
    stub.calls.fetch_add(1, Ordering::SeqCst);
    match stub.script.lock().unwrap().pop_front() {
        Some(Scripted::Ok(result)) => {
            json_response(StatusCode::OK, json!({"ok": true, "result": result}))
        }
        Some(Scripted::ApiError(description)) => json_response(
            StatusCode::BAD_REQUEST,
            json!({"ok": false, "description": description, "error_code": 400}),
        ),
        Some(Scripted::RateLimited(secs)) => {
            let mut response = json_response(
                StatusCode::TOO_MANY_REQUESTS,
                json!({"ok": false, "description": "Too Many Requests", "error_code": 429}),
            );
            response.headers_mut().insert(
                "Retry-After",
                HeaderValue::from_str(&secs.to_string()).unwrap(),
            );
            response
        }
        None => json_response(StatusCode::OK, json!({"ok": true, "result": {}})),
    }
}

async fn spawn_stub(script: Vec<Scripted>) -> (Arc<Stub>, String) {
    let stub = Arc::new(Stub {
        calls: AtomicUsize::new(0),
        script: Mutex::new(script.into()),
    });

    let app = Router::new()
        .fallback(stub_handler)
        .with_state(stub.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (stub, format!("http://{}/bot", addr))
}

fn test_config(max_retries: u32) -> AppConfig {
    AppConfig {
        bot_token: "123456:test-token".to_string(),
        business_connection_id: "conn-test".to_string(),
        target_chat_id: 123_456_789,
        max_retries,
        retry_delay: 1,
        ..AppConfig::default()
    }
}

fn client(config: &AppConfig, base_url: &str) -> BotApiClient {
    BotApiClient::new(config).unwrap().with_base_url(base_url)
}

#[tokio::test]
async fn single_retry_budget_makes_exactly_one_call() {
    let (stub, base) = spawn_stub(vec![Scripted::ApiError("Bad Request")]).await;
    let config = test_config(1);

    let err = client(&config, &base)
        .call(ApiMethod::GetMe, None)
        .await
        .unwrap_err();

    assert_eq!(stub.calls.load(Ordering::SeqCst), 1);
    assert_eq!(err.code, ErrorCode::ApiError);
    assert!(err.message.contains("after 1 attempts"));
    assert!(err.message.contains("Bad Request"));
}

#[tokio::test]
async fn rate_limit_sleeps_header_delay_then_succeeds() {
    let (stub, base) = spawn_stub(vec![
        Scripted::RateLimited(1),
        Scripted::Ok(json!({"id": 123})),
    ])
    .await;
    let config = test_config(3);

    let start = Instant::now();
    let body = client(&config, &base)
        .call(ApiMethod::GetMe, None)
        .await
        .unwrap();
    let elapsed = start.elapsed();

    // Exactly two calls, second body wins, header delay was honored
    assert_eq!(stub.calls.load(Ordering::SeqCst), 2);
    assert_eq!(body["result"]["id"], 123);
    assert!(elapsed >= Duration::from_secs(1), "slept {:?}", elapsed);
    assert!(elapsed < Duration::from_secs(5), "slept {:?}", elapsed);
}

#[tokio::test]
async fn application_failure_backs_off_then_succeeds() {
    let (stub, base) = spawn_stub(vec![
        Scripted::ApiError("Internal error"),
        Scripted::Ok(json!({"id": 7})),
    ])
    .await;
    let config = test_config(3);

    let start = Instant::now();
    let body = client(&config, &base)
        .call(ApiMethod::GetMe, None)
        .await
        .unwrap();

    // First backoff step is the base delay itself
    assert!(start.elapsed() >= Duration::from_secs(1));
    assert_eq!(stub.calls.load(Ordering::SeqCst), 2);
    assert_eq!(body["result"]["id"], 7);
}

#[tokio::test]
async fn success_returns_immediately_without_spending_retries() {
    let (stub, base) = spawn_stub(vec![Scripted::Ok(json!({"id": 1}))]).await;
    let config = test_config(3);

    let start = Instant::now();
    client(&config, &base)
        .call(ApiMethod::GetMe, None)
        .await
        .unwrap();

    assert_eq!(stub.calls.load(Ordering::SeqCst), 1);
    assert!(start.elapsed() < Duration::from_secs(1));
}

#[tokio::test]
async fn exhausted_budget_reports_attempts_made() {
    let (stub, base) = spawn_stub(vec![
        Scripted::ApiError("still broken"),
        Scripted::ApiError("still broken"),
    ])
    .await;
    let config = test_config(2);

    let err = client(&config, &base)
        .call(ApiMethod::GetStarBalance, Some(json!({"business_connection_id": "conn-test"})))
        .await
        .unwrap_err();

    assert_eq!(stub.calls.load(Ordering::SeqCst), 2);
    assert!(err
        .message
        .contains("getBusinessAccountStarBalance failed after 2 attempts"));
}

#[tokio::test]
async fn transport_failure_is_retried_and_summarized() {
    // Nothing listens here; connections are refused immediately
    let config = test_config(2);
    let unreachable = client(&config, "http://127.0.0.1:1/bot");

    let start = Instant::now();
    let err = unreachable.call(ApiMethod::GetMe, None).await.unwrap_err();

    assert_eq!(err.code, ErrorCode::ApiConnectionFailed);
    assert!(err.message.contains("after 2 attempts"));
    // One backoff sleep between the two attempts
    assert!(start.elapsed() >= Duration::from_secs(1));
}
