//! End-to-end pipeline scenarios against a local stub of the Bot API.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, State};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use gift_courier::{
    AppConfig, BotApiClient, DirectedSelector, ErrorCode, PromptSelector, RunLog, RunMode,
    RunRegistry, TransferPipeline,
};

struct StubState {
    calls: Mutex<Vec<String>>,
    fail_get_me: bool,
    get_me_delay_ms: u64,
    balance: i64,
    gifts: Vec<Value>,
}

impl StubState {
    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn count(&self, method: &str) -> usize {
        self.calls().iter().filter(|m| m.as_str() == method).count()
    }
}

async fn stub_handler(
    State(state): State<Arc<StubState>>,
    Path((_token, method)): Path<(String, String)>,
) -> Json<Value> {
    state.calls.lock().unwrap().push(method.clone());

    let body = match method.as_str() {
        "getMe" => {
            if state.get_me_delay_ms > 0 {
                tokio::time::sleep(Duration::from_millis(state.get_me_delay_ms)).await;
            }
            if state.fail_get_me {
                json!({"ok": false, "description": "Unauthorized", "error_code": 401})
            } else {
                json!({"ok": true, "result": {
                    "id": 7, "username": "courier_bot", "is_business_bot": true
                }})
            }
        }
        "getChat" => json!({"ok": true, "result": {
            "id": 123_456_789, "type": "private", "first_name": "Recipient"
        }}),
        "getBusinessAccountStarBalance" => {
            json!({"ok": true, "result": {"amount": state.balance}})
        }
        "transferBusinessAccountStars" => json!({"ok": true, "result": true}),
        "getBusinessAccountGifts" => json!({"ok": true, "result": {
            "total_count": state.gifts.len(), "gifts": state.gifts
        }}),
        "transferGift" => json!({"ok": true, "result": true}),
        _ => json!({"ok": false, "description": "Unknown method", "error_code": 404}),
    };
    Json(body)
}

async fn spawn_stub(state: StubState) -> (Arc<StubState>, String) {
    let state = Arc::new(state);
    let app = Router::new()
        .route("/:token/:method", post(stub_handler))
        .with_state(state.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (state, format!("http://{}/bot", addr))
}

fn healthy_stub(gifts: Vec<Value>, balance: i64) -> StubState {
    StubState {
        calls: Mutex::new(Vec::new()),
        fail_get_me: false,
        get_me_delay_ms: 0,
        balance,
        gifts,
    }
}

fn transferable_gift(id: &str, cost: u32) -> Value {
    json!({
        "owned_gift_id": id,
        "type": "unique",
        "gift": {"base_name": "Bear", "name": "Bear #42"},
        "can_be_transferred": true,
        "transfer_star_count": cost,
    })
}

fn test_config(log_dir: &std::path::Path) -> AppConfig {
    AppConfig {
        bot_token: "123456:test-token".to_string(),
        business_connection_id: "conn-test".to_string(),
        target_chat_id: 123_456_789,
        star_count: 25,
        max_retries: 1,
        retry_delay: 1,
        transfer_wait_time: 0,
        log_dir: log_dir.to_string_lossy().into_owned(),
        ..AppConfig::default()
    }
}

fn build_pipeline(config: AppConfig, base_url: &str) -> (TransferPipeline, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let log = RunLog::create(dir.path()).unwrap();
    let client = BotApiClient::new(&config).unwrap().with_base_url(base_url);
    let pipeline = TransferPipeline::from_parts(
        Arc::new(config),
        client,
        log,
        CancellationToken::new(),
    );
    (pipeline, dir)
}

#[tokio::test]
async fn connectivity_failure_halts_before_any_transfer() {
    let (stub, base) = spawn_stub(StubState {
        fail_get_me: true,
        ..healthy_stub(vec![transferable_gift("g1", 20)], 100)
    })
    .await;

    let dir = tempfile::tempdir().unwrap();
    let (pipeline, _logs) = build_pipeline(test_config(dir.path()), &base);

    let mut selector = DirectedSelector::new("g1");
    let err = pipeline.run(&mut selector).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::RunStepFailed);

    // Exactly the single-attempt connectivity probe, nothing else
    assert_eq!(stub.calls(), vec!["getMe".to_string()]);
    assert_eq!(stub.count("transferBusinessAccountStars"), 0);

    let lines: Vec<String> = pipeline.log().lines().into_iter().map(|l| l.line).collect();
    assert!(
        lines.iter().any(|l| l.contains("Could not connect")),
        "log lines: {:?}",
        lines
    );
}

#[tokio::test]
async fn redundant_flag_issues_two_star_transfers_before_enumeration() {
    let (stub, base) = spawn_stub(healthy_stub(vec![transferable_gift("g1", 20)], 50)).await;

    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(dir.path());
    config.enable_redundant_transfer = true;
    let (pipeline, _logs) = build_pipeline(config, &base);

    let mut selector = DirectedSelector::new("g1");
    pipeline.run(&mut selector).await.unwrap();

    assert_eq!(stub.count("transferBusinessAccountStars"), 2);
    assert_eq!(stub.count("transferGift"), 1);

    // Both star transfers land before the gift enumeration
    let calls = stub.calls();
    let last_star = calls
        .iter()
        .rposition(|m| m == "transferBusinessAccountStars")
        .unwrap();
    let enumeration = calls
        .iter()
        .position(|m| m == "getBusinessAccountGifts")
        .unwrap();
    assert!(last_star < enumeration, "call order: {:?}", calls);
}

#[tokio::test]
async fn insufficient_balance_for_redundant_mode_halts_before_spending() {
    // Redundant mode needs 2*S; 40 < 50
    let (stub, base) = spawn_stub(healthy_stub(vec![transferable_gift("g1", 20)], 40)).await;

    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(dir.path());
    config.enable_redundant_transfer = true;
    let (pipeline, _logs) = build_pipeline(config, &base);

    let mut selector = DirectedSelector::new("g1");
    let err = pipeline.run(&mut selector).await.unwrap_err();

    assert_eq!(err.code, ErrorCode::RunInsufficientBalance);
    assert_eq!(stub.count("transferBusinessAccountStars"), 0);
}

#[tokio::test]
async fn directed_miss_halts_at_selection_without_gift_transfer() {
    let (stub, base) = spawn_stub(healthy_stub(vec![transferable_gift("g1", 20)], 100)).await;

    let dir = tempfile::tempdir().unwrap();
    let (pipeline, _logs) = build_pipeline(test_config(dir.path()), &base);

    let mut selector = DirectedSelector::new("no-such-gift");
    let err = pipeline.run(&mut selector).await.unwrap_err();

    assert_eq!(err.code, ErrorCode::RunGiftNotFound);
    assert_eq!(stub.count("transferGift"), 0);
}

#[tokio::test]
async fn non_transferable_gift_is_rejected_at_eligibility() {
    let gift = json!({
        "owned_gift_id": "g1",
        "gift": {"base_name": "Statue"},
        "can_be_transferred": false,
        "transfer_star_count": 10,
    });
    let (stub, base) = spawn_stub(healthy_stub(vec![gift], 100)).await;

    let dir = tempfile::tempdir().unwrap();
    let (pipeline, _logs) = build_pipeline(test_config(dir.path()), &base);

    let mut selector = DirectedSelector::new("g1");
    let err = pipeline.run(&mut selector).await.unwrap_err();

    assert_eq!(err.code, ErrorCode::RunGiftNotTransferable);
    assert_eq!(stub.count("transferGift"), 0);
}

#[tokio::test]
async fn expensive_gift_is_rejected_with_exact_cost() {
    let (stub, base) = spawn_stub(healthy_stub(vec![transferable_gift("g1", 30)], 100)).await;

    let dir = tempfile::tempdir().unwrap();
    let (pipeline, _logs) = build_pipeline(test_config(dir.path()), &base);

    let mut selector = DirectedSelector::new("g1");
    let err = pipeline.run(&mut selector).await.unwrap_err();

    assert_eq!(err.code, ErrorCode::RunGiftTooExpensive);
    assert!(err.message.contains("requires 30 stars"));
    assert_eq!(stub.count("transferGift"), 0);
}

#[tokio::test]
async fn unattended_run_terminates_at_selection() {
    let (stub, base) = spawn_stub(healthy_stub(vec![transferable_gift("g1", 20)], 100)).await;

    let dir = tempfile::tempdir().unwrap();
    let (pipeline, _logs) = build_pipeline(test_config(dir.path()), &base);

    let mut selector = PromptSelector::unattended();
    let err = pipeline.run(&mut selector).await.unwrap_err();

    assert_eq!(err.code, ErrorCode::RunInvalidSelection);
    assert_eq!(stub.count("transferGift"), 0);
}

#[tokio::test]
async fn list_gifts_is_read_only() {
    let (stub, base) =
        spawn_stub(healthy_stub(vec![transferable_gift("g1", 20), transferable_gift("g2", 5)], 100))
            .await;

    let dir = tempfile::tempdir().unwrap();
    let (pipeline, _logs) = build_pipeline(test_config(dir.path()), &base);

    let gifts = pipeline.list_gifts().await.unwrap();
    assert_eq!(gifts.len(), 2);
    assert_eq!(gifts[0].owned_gift_id, "g1");

    assert_eq!(stub.count("transferBusinessAccountStars"), 0);
    assert_eq!(stub.count("transferGift"), 0);
}

#[tokio::test]
async fn registry_enforces_one_run_at_a_time() {
    let (stub, base) = spawn_stub(StubState {
        get_me_delay_ms: 500,
        ..healthy_stub(vec![transferable_gift("g1", 20)], 100)
    })
    .await;

    let dir = tempfile::tempdir().unwrap();
    let registry = RunRegistry::with_api_base(base);
    let config = test_config(dir.path());

    let started = registry
        .start(config.clone(), RunMode::Directed("g1".to_string()))
        .unwrap();
    assert!(!started.job_id.is_empty());
    assert!(started.log_file.ends_with(".log"));

    // Second start while the first is mid-flight is refused, not queued
    let err = registry
        .start(config.clone(), RunMode::Directed("g1".to_string()))
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::JobBusy);

    // Stop is accepted and the Run winds down
    registry.stop().unwrap();
    for _ in 0..100 {
        if !registry.is_running() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert!(!registry.is_running());
    assert_eq!(stub.count("transferGift"), 0);

    // A finished Run keeps its output readable
    let status = registry.status();
    assert!(!status.running);
    assert!(!status.output.is_empty());
}
