//! コントロール設定から実行終了までの統合テスト
//!
//! 実験ドキュメントの`controls`宣言からガーディアンを構築し、
//! イベントレジストリ経由のライフサイクルでジャーナルへの記録まで
//! 確認する。

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use serial_test::serial;
use wiremock::MockServer;

use chaosguard::safeguard::{register_declared_controls, HttpProber, SafeguardHandler};
use chaosguard_common::events::EventHandlerRegistry;
use chaosguard_common::interrupt::{InterruptSignal, RunInterrupter};
use chaosguard_common::types::{Configuration, Secrets};

use crate::support::mount_health;

#[tokio::test]
#[serial]
async fn test_declared_controls_drive_the_full_lifecycle() {
    let mock = MockServer::start().await;
    mount_health(&mock, "/guard", false).await;
    mount_health(&mock, "/gate", true).await;

    std::env::set_var("CHAOSGUARD_ITEST_GUARD_URL", format!("{}/guard", mock.uri()));
    let experiment = json!({
        "title": "latency under failover",
        "controls": [
            {
                "name": "guard",
                "provider": {
                    "type": "safeguard",
                    "arguments": {
                        "url": {"type": "env", "key": "CHAOSGUARD_ITEST_GUARD_URL"},
                        "frequency": 0.5,
                    },
                },
            },
            {
                "name": "gate",
                "provider": {
                    "type": "precheck",
                    "arguments": {"url": format!("{}/gate", mock.uri())},
                },
            },
        ],
    });

    let signal = Arc::new(InterruptSignal::new());
    let handler = Arc::new(SafeguardHandler::new());
    let mut events = EventHandlerRegistry::new();
    let configured = register_declared_controls(
        &experiment,
        &mut events,
        &handler,
        Arc::new(HttpProber::new()),
        signal.clone() as Arc<dyn RunInterrupter>,
    );
    std::env::remove_var("CHAOSGUARD_ITEST_GUARD_URL");
    assert_eq!(configured, 2);

    events.run_started(&experiment, &Configuration::new(), &Secrets::new());
    tokio::time::timeout(Duration::from_secs(2), signal.wait())
        .await
        .expect("failing safeguard should interrupt the run");

    let mut journal = json!({"status": "interrupted"});
    events.run_finished(&mut journal);

    let buckets = &journal["integrations"]["chaosguard"];
    assert_eq!(buckets["safeguards"].as_array().map(Vec::len), Some(1));
    assert_eq!(buckets["prechecks"], json!([]));
}

#[tokio::test]
async fn test_missing_url_leaves_guardian_inert() {
    let experiment = json!({
        "controls": [
            {
                "name": "guard",
                "provider": {
                    "type": "safeguard",
                    "arguments": {"frequency": 0.5},
                },
            },
        ],
    });

    let signal = Arc::new(InterruptSignal::new());
    let handler = Arc::new(SafeguardHandler::new());
    let mut events = EventHandlerRegistry::new();
    register_declared_controls(
        &experiment,
        &mut events,
        &handler,
        Arc::new(HttpProber::new()),
        signal.clone() as Arc<dyn RunInterrupter>,
    );
    assert_eq!(handler.len(), 1);

    events.run_started(&json!({}), &Configuration::new(), &Secrets::new());
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert!(!signal.is_interrupted());

    let mut journal = json!({});
    events.run_finished(&mut journal);
    let buckets = &journal["integrations"]["chaosguard"];
    assert_eq!(buckets["safeguards"], json!([]));
}

#[tokio::test]
async fn test_finish_without_start_terminates_cleanly() {
    let mock = MockServer::start().await;
    mount_health(&mock, "/guard", false).await;

    let experiment = json!({
        "controls": [
            {
                "name": "guard",
                "provider": {
                    "type": "safeguard",
                    "arguments": {
                        "url": format!("{}/guard", mock.uri()),
                        "frequency": 0.5,
                    },
                },
            },
        ],
    });

    let handler = Arc::new(SafeguardHandler::new());
    let mut events = EventHandlerRegistry::new();
    register_declared_controls(
        &experiment,
        &mut events,
        &handler,
        Arc::new(HttpProber::new()),
        Arc::new(InterruptSignal::new()) as Arc<dyn RunInterrupter>,
    );

    // セットアップ失敗などでrun_startedへ到達しなかった実行
    let mut journal = json!({});
    events.run_finished(&mut journal);
    let buckets = &journal["integrations"]["chaosguard"];
    assert_eq!(buckets["prechecks"], json!([]));
    assert_eq!(buckets["safeguards"], json!([]));
}
