//! コントロール設定エントリポイント
//!
//! 実験ドキュメントに宣言された`safeguard`/`precheck`コントロールから
//! ガーディアンを構築し、ハンドラーへ登録する。ランナーはコントロール
//! 設定時にこれらを呼ぶ。
//!
//! `url`/`auth`/`frequency`はリテラルまたは環境変数参照
//! （`{"type": "env", "key": "<NAME>"}`）で、ガーディアン構築時に
//! 1回だけ解決する。

use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use chaosguard_common::events::EventHandlerRegistry;
use chaosguard_common::interrupt::RunInterrupter;
use chaosguard_common::types::{controls, Experiment};

use crate::config::ControlValue;
use crate::safeguard::guardian::Guardian;
use crate::safeguard::handler::SafeguardHandler;
use crate::safeguard::probe::{EndpointProber, ProbeDefinition};

/// safeguard/precheckコントロールの宣言引数
#[derive(Debug, Default)]
pub struct ControlArguments {
    /// 監視対象URL
    pub url: Option<ControlValue>,
    /// Bearer認証トークン
    pub auth: Option<ControlValue>,
    /// ポーリング間隔（秒）。precheckでは無視する
    pub frequency: Option<ControlValue>,
}

impl ControlArguments {
    /// コントロール宣言の`arguments`オブジェクトから読み取る
    pub fn from_value(arguments: &Value) -> Self {
        let read = |key: &str| arguments.get(key).and_then(ControlValue::from_value);
        Self {
            url: read("url"),
            auth: read("auth"),
            frequency: read("frequency"),
        }
    }

    fn resolve_url(&self) -> String {
        self.url
            .as_ref()
            .and_then(ControlValue::resolve)
            .unwrap_or_default()
    }

    fn resolve_auth(&self) -> Option<String> {
        self.auth.as_ref().and_then(ControlValue::resolve)
    }

    fn resolve_frequency(&self) -> Option<f64> {
        self.frequency.as_ref().and_then(ControlValue::resolve_secs)
    }
}

/// safeguardコントロールを設定する
///
/// 引数を解決して繰り返しガーディアンを準備し、ハンドラーを
/// イベントレジストリへ（未登録なら）登録してから追加する。
/// `frequency`が解決できない場合はprecheckとして扱う。
pub fn configure_safeguard_control(
    event_registry: &mut EventHandlerRegistry,
    handler: &Arc<SafeguardHandler>,
    prober: Arc<dyn EndpointProber>,
    interrupter: Arc<dyn RunInterrupter>,
    arguments: &ControlArguments,
) {
    debug!("Configuring safeguard control");
    let probe = match arguments.resolve_frequency() {
        Some(frequency) => {
            ProbeDefinition::safeguard(arguments.resolve_url(), arguments.resolve_auth(), frequency)
        }
        None => ProbeDefinition::precheck(arguments.resolve_url(), arguments.resolve_auth()),
    };
    handler.register(event_registry);
    handler.add(Guardian::prepare(probe, prober, interrupter));
}

/// precheckコントロールを設定する
///
/// 引数を解決して1回実行のガーディアンを準備し、ハンドラーへ追加する。
pub fn configure_precheck_control(
    event_registry: &mut EventHandlerRegistry,
    handler: &Arc<SafeguardHandler>,
    prober: Arc<dyn EndpointProber>,
    interrupter: Arc<dyn RunInterrupter>,
    arguments: &ControlArguments,
) {
    debug!("Configuring precheck control");
    let probe = ProbeDefinition::precheck(arguments.resolve_url(), arguments.resolve_auth());
    handler.register(event_registry);
    handler.add(Guardian::prepare(probe, prober, interrupter));
}

/// 実験ドキュメントに宣言された全コントロールを設定する
///
/// `controls`配列を走査し、`safeguard`/`precheck`型のコントロール
/// ごとにガーディアンを1つ構築する。設定した数を返す。
pub fn register_declared_controls(
    experiment: &Experiment,
    event_registry: &mut EventHandlerRegistry,
    handler: &Arc<SafeguardHandler>,
    prober: Arc<dyn EndpointProber>,
    interrupter: Arc<dyn RunInterrupter>,
) -> usize {
    let mut configured = 0;
    for control in controls(experiment) {
        let kind = match control_kind(control) {
            Some(kind) => kind,
            None => continue,
        };
        let arguments = ControlArguments::from_value(control_arguments(control));
        match kind {
            ControlKind::Safeguard => configure_safeguard_control(
                event_registry,
                handler,
                prober.clone(),
                interrupter.clone(),
                &arguments,
            ),
            ControlKind::Precheck => configure_precheck_control(
                event_registry,
                handler,
                prober.clone(),
                interrupter.clone(),
                &arguments,
            ),
        }
        configured += 1;
    }
    configured
}

enum ControlKind {
    Safeguard,
    Precheck,
}

/// コントロール種別を判定する（`provider.type`優先、なければ`type`）
fn control_kind(control: &Value) -> Option<ControlKind> {
    let declared = control
        .get("provider")
        .and_then(|p| p.get("type"))
        .and_then(Value::as_str)
        .or_else(|| control.get("type").and_then(Value::as_str))?;
    match declared {
        "safeguard" => Some(ControlKind::Safeguard),
        "precheck" => Some(ControlKind::Precheck),
        _ => None,
    }
}

/// コントロール引数を取り出す（`provider.arguments`優先、なければ`arguments`）
fn control_arguments(control: &Value) -> &Value {
    control
        .get("provider")
        .and_then(|p| p.get("arguments"))
        .or_else(|| control.get("arguments"))
        .unwrap_or(&Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chaosguard_common::interrupt::InterruptSignal;
    use serde_json::json;
    use serial_test::serial;

    struct HealthyProber;

    #[async_trait]
    impl EndpointProber for HealthyProber {
        async fn call(&self, _url: &str, _auth: Option<&str>) -> bool {
            true
        }
    }

    fn deps() -> (Arc<dyn EndpointProber>, Arc<dyn RunInterrupter>) {
        (Arc::new(HealthyProber), Arc::new(InterruptSignal::new()))
    }

    #[test]
    fn test_control_arguments_from_value() {
        let arguments = ControlArguments::from_value(&json!({
            "url": "https://example.com/health",
            "auth": "sesame",
            "frequency": 0.5,
        }));
        assert_eq!(arguments.resolve_url(), "https://example.com/health");
        assert_eq!(arguments.resolve_auth().as_deref(), Some("sesame"));
        assert_eq!(arguments.resolve_frequency(), Some(0.5));
    }

    #[test]
    fn test_control_arguments_missing_url_resolves_empty() {
        let arguments = ControlArguments::from_value(&json!({}));
        assert_eq!(arguments.resolve_url(), "");
        assert_eq!(arguments.resolve_auth(), None);
        assert_eq!(arguments.resolve_frequency(), None);
    }

    #[test]
    fn test_configure_safeguard_registers_handler_and_guardian() {
        let mut events = EventHandlerRegistry::new();
        let handler = Arc::new(SafeguardHandler::new());
        let (prober, interrupter) = deps();
        let arguments = ControlArguments::from_value(&json!({
            "url": "https://example.com/health",
            "frequency": 1.0,
        }));
        configure_safeguard_control(&mut events, &handler, prober, interrupter, &arguments);
        assert_eq!(events.len(), 1);
        assert_eq!(handler.len(), 1);
    }

    #[test]
    #[serial]
    fn test_register_declared_controls_walks_experiment() {
        std::env::set_var("CHAOSGUARD_TEST_CONTROL_URL", "https://env.example.com/health");
        let experiment = json!({
            "title": "steady state under failover",
            "controls": [
                {
                    "name": "guard",
                    "provider": {
                        "type": "safeguard",
                        "arguments": {
                            "url": {"type": "env", "key": "CHAOSGUARD_TEST_CONTROL_URL"},
                            "frequency": 0.5,
                        },
                    },
                },
                {
                    "name": "gate",
                    "type": "precheck",
                    "arguments": {"url": "https://example.com/ready"},
                },
                {
                    "name": "unrelated",
                    "provider": {"type": "python"},
                },
            ],
        });

        let mut events = EventHandlerRegistry::new();
        let handler = Arc::new(SafeguardHandler::new());
        let (prober, interrupter) = deps();
        let configured =
            register_declared_controls(&experiment, &mut events, &handler, prober, interrupter);
        assert_eq!(configured, 2);
        assert_eq!(handler.len(), 2);
        // ハンドラーの購読は1回だけ
        assert_eq!(events.len(), 1);
        std::env::remove_var("CHAOSGUARD_TEST_CONTROL_URL");
    }
}
