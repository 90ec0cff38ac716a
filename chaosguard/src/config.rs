//! Configuration management via environment variables and control arguments
//!
//! Control declarations may pass literal values or an
//! `{"type": "env", "key": "<NAME>"}` indirection; resolution happens once,
//! when a guardian is built, never during polling.

use serde::Deserialize;
use serde_json::Value;

/// Get an environment variable
///
/// # Returns
/// * `Some(value)` - The environment variable value
/// * `None` - The variable is not set
pub fn get_env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

/// Get an environment variable with a default value
pub fn get_env_or(name: &str, default: &str) -> String {
    get_env(name).unwrap_or_else(|| default.to_string())
}

/// Get an environment variable, parsing to a specific type
///
/// Returns `default` when the variable is unset or fails to parse.
pub fn get_env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    get_env(name).and_then(|s| s.parse().ok()).unwrap_or(default)
}

/// コントロール引数の値。リテラルか環境変数への間接参照。
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ControlValue {
    /// `{"type": "env", "key": "<NAME>"}` 形式の間接参照
    EnvRef {
        /// 参照種別（`env` のみ対応）
        #[serde(rename = "type")]
        kind: String,
        /// 参照する環境変数名
        key: String,
    },
    /// 文字列・数値リテラル
    Literal(Value),
}

impl ControlValue {
    /// JSON値からコントロール引数を読み取る
    pub fn from_value(value: &Value) -> Option<Self> {
        serde_json::from_value(value.clone()).ok()
    }

    /// 値を文字列へ解決する
    ///
    /// リテラル文字列はそのまま、数値は文字列化、`env` 参照は環境変数を
    /// 引く。欠損した環境変数や非対応の形は `None`。
    pub fn resolve(&self) -> Option<String> {
        match self {
            Self::EnvRef { kind, key } if kind == "env" => get_env(key),
            Self::EnvRef { .. } => None,
            Self::Literal(Value::String(s)) => Some(s.clone()),
            Self::Literal(Value::Number(n)) => Some(n.to_string()),
            Self::Literal(_) => None,
        }
    }

    /// 値を秒数（f64）へ解決する
    pub fn resolve_secs(&self) -> Option<f64> {
        self.resolve().and_then(|s| s.parse().ok())
    }
}

/// `"5d"` 形式のウィンドウ指定を期間へ変換する
///
/// 単位は `s`（秒）、`m`（分）、`h`（時）、`d`（日）、`w`（週）。
/// 解釈できない指定は1週間にフォールバックする。
pub fn parse_window(window: &str) -> chrono::Duration {
    let fallback = chrono::Duration::weeks(1);
    let unit = match window.chars().last() {
        Some(unit) => unit,
        None => return fallback,
    };
    let value: i64 = match window[..window.len() - unit.len_utf8()].parse() {
        Ok(value) => value,
        Err(_) => return fallback,
    };
    match unit {
        's' => chrono::Duration::try_seconds(value),
        'm' => chrono::Duration::try_minutes(value),
        'h' => chrono::Duration::try_hours(value),
        'd' => chrono::Duration::try_days(value),
        'w' => chrono::Duration::try_weeks(value),
        _ => None,
    }
    .unwrap_or(fallback)
}
