//! 実験ドキュメント共通型
//!
//! ランナーが受け渡す experiment / journal はスキーマを固定しない
//! JSONツリーとして扱う。プラグイン側は必要なキーだけを読む。

use serde_json::{Map, Value};

/// 実験定義ドキュメント（フリーフォームJSON）
pub type Experiment = Value;

/// 実験実行ジャーナル（フリーフォームJSON）
pub type Journal = Value;

/// ランナー設定（トップレベルのkey-value）
pub type Configuration = Map<String, Value>;

/// シークレット（設定と同形、トークン等を保持）
pub type Secrets = Map<String, Value>;

/// 実験ドキュメントの `controls` 配列を返す（欠損時は空）
pub fn controls(experiment: &Experiment) -> &[Value] {
    experiment
        .get("controls")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

/// 設定・シークレットから文字列値を読む
pub fn get_str<'a>(map: &'a Configuration, key: &str) -> Option<&'a str> {
    map.get(key).and_then(Value::as_str)
}

/// 設定からboolフラグを読む（欠損・型不一致は `default`）
pub fn config_flag(configuration: &Configuration, key: &str, default: bool) -> bool {
    configuration
        .get(key)
        .and_then(Value::as_bool)
        .unwrap_or(default)
}
