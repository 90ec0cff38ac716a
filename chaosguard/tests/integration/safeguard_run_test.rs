//! ガーディアン実行の統合テスト
//!
//! 実HTTPエンドポイント（wiremock）に対するprecheck/safeguardの
//! 監視・中断・停止の振る舞いを検証する。

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use wiremock::MockServer;

use chaosguard::safeguard::{Guardian, HttpProber, ProbeDefinition, SafeguardHandler};
use chaosguard_common::events::EventHandlerRegistry;
use chaosguard_common::interrupt::{InterruptSignal, RunInterrupter};

use crate::support::{mount_health, mount_health_sequence, request_count};

fn prober() -> Arc<HttpProber> {
    Arc::new(HttpProber::new())
}

fn handler_with_events() -> (Arc<SafeguardHandler>, EventHandlerRegistry) {
    let handler = Arc::new(SafeguardHandler::new());
    let mut events = EventHandlerRegistry::new();
    handler.register(&mut events);
    (handler, events)
}

#[tokio::test]
async fn test_failing_precheck_interrupts_execution() {
    let mock = MockServer::start().await;
    mount_health(&mock, "/try-me", false).await;

    let signal = Arc::new(InterruptSignal::new());
    let (handler, _events) = handler_with_events();
    handler.add(Guardian::prepare(
        ProbeDefinition::precheck(format!("{}/try-me", mock.uri()), None),
        prober(),
        signal.clone() as Arc<dyn RunInterrupter>,
    ));

    handler.start_all();
    tokio::time::timeout(Duration::from_secs(2), signal.wait())
        .await
        .expect("precheck failure should interrupt the run");

    let mut journal = json!({});
    handler.finish(&mut journal);
    assert_eq!(request_count(&mock).await, 1);
    let prechecks = &journal["integrations"]["chaosguard"]["prechecks"];
    assert_eq!(prechecks.as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn test_healthy_precheck_runs_exactly_once() {
    let mock = MockServer::start().await;
    mount_health(&mock, "/try-me", true).await;

    let signal = Arc::new(InterruptSignal::new());
    let (handler, _events) = handler_with_events();
    handler.add(Guardian::prepare(
        ProbeDefinition::precheck(format!("{}/try-me", mock.uri()), None),
        prober(),
        signal.clone() as Arc<dyn RunInterrupter>,
    ));

    handler.start_all();
    tokio::time::sleep(Duration::from_secs(1)).await;

    let mut journal = json!({});
    handler.finish(&mut journal);
    assert_eq!(request_count(&mock).await, 1);
    assert!(!signal.is_interrupted());
    let buckets = &journal["integrations"]["chaosguard"];
    assert_eq!(buckets["prechecks"], json!([]));
    assert_eq!(buckets["safeguards"], json!([]));
}

#[tokio::test]
async fn test_safeguard_polls_until_failure_then_stops() {
    let mock = MockServer::start().await;
    mount_health_sequence(&mock, "/try-me", &[true, false]).await;

    let signal = Arc::new(InterruptSignal::new());
    let (handler, _events) = handler_with_events();
    handler.add(Guardian::prepare(
        ProbeDefinition::safeguard(format!("{}/try-me", mock.uri()), None, 0.5),
        prober(),
        signal.clone() as Arc<dyn RunInterrupter>,
    ));

    handler.start_all();
    tokio::time::timeout(Duration::from_secs(2), signal.wait())
        .await
        .expect("second poll should interrupt the run");

    // 中断後は呼び出しが増えない
    let calls = request_count(&mock).await;
    assert_eq!(calls, 2);
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(request_count(&mock).await, calls);

    let mut journal = json!({});
    handler.finish(&mut journal);
    let safeguards = &journal["integrations"]["chaosguard"]["safeguards"];
    assert_eq!(safeguards.as_array().map(Vec::len), Some(1));
    assert_eq!(safeguards[0]["frequency"], json!(0.5));
}

#[tokio::test]
async fn test_guardians_operate_independently() {
    let failing = MockServer::start().await;
    let healthy = MockServer::start().await;
    mount_health(&failing, "/try-me", false).await;
    mount_health(&healthy, "/try-me", true).await;

    let first_signal = Arc::new(InterruptSignal::new());
    let second_signal = Arc::new(InterruptSignal::new());
    let (handler, _events) = handler_with_events();
    handler.add(Guardian::prepare(
        ProbeDefinition::safeguard(format!("{}/try-me", failing.uri()), None, 0.5),
        prober(),
        first_signal.clone() as Arc<dyn RunInterrupter>,
    ));
    handler.add(Guardian::prepare(
        ProbeDefinition::safeguard(format!("{}/try-me", healthy.uri()), None, 0.5),
        prober(),
        second_signal.clone() as Arc<dyn RunInterrupter>,
    ));

    handler.start_all();
    tokio::time::sleep(Duration::from_secs(2)).await;

    assert!(first_signal.is_interrupted());
    assert!(!second_signal.is_interrupted());

    // 健全な方はその間もポーリングを続けている
    assert_eq!(request_count(&failing).await, 1);
    assert!(request_count(&healthy).await >= 2);

    let mut journal = json!({});
    handler.finish(&mut journal);
    let safeguards = &journal["integrations"]["chaosguard"]["safeguards"];
    assert_eq!(safeguards.as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn test_start_all_is_idempotent_over_the_network() {
    let mock = MockServer::start().await;
    mount_health(&mock, "/try-me", true).await;

    let signal = Arc::new(InterruptSignal::new());
    let (handler, _events) = handler_with_events();
    handler.add(Guardian::prepare(
        ProbeDefinition::precheck(format!("{}/try-me", mock.uri()), None),
        prober(),
        signal as Arc<dyn RunInterrupter>,
    ));

    handler.start_all();
    handler.start_all();
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(request_count(&mock).await, 1);
}

#[tokio::test]
async fn test_triggered_probes_keep_registration_order() {
    let mock = MockServer::start().await;
    mount_health(&mock, "/a", false).await;
    mount_health(&mock, "/b", false).await;

    let (handler, _events) = handler_with_events();
    let first = ProbeDefinition::precheck(format!("{}/a", mock.uri()), None);
    let second = ProbeDefinition::precheck(format!("{}/b", mock.uri()), None);
    let first_name = first.name.clone();
    let second_name = second.name.clone();
    handler.add(Guardian::prepare(
        first,
        prober(),
        Arc::new(InterruptSignal::new()) as Arc<dyn RunInterrupter>,
    ));
    handler.add(Guardian::prepare(
        second,
        prober(),
        Arc::new(InterruptSignal::new()) as Arc<dyn RunInterrupter>,
    ));

    handler.start_all();
    tokio::time::sleep(Duration::from_secs(1)).await;

    let mut journal = json!({});
    handler.finish(&mut journal);
    let prechecks = journal["integrations"]["chaosguard"]["prechecks"]
        .as_array()
        .expect("prechecks bucket should be a list");
    assert_eq!(prechecks.len(), 2);
    assert_eq!(prechecks[0]["name"], json!(first_name));
    assert_eq!(prechecks[1]["name"], json!(second_name));
}
