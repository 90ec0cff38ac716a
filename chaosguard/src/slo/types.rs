//! SLO API レスポンス型
//!
//! ワイヤーフォーマットはcamelCase。プラグイン内部はsnake_caseで扱う。

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ActivityResult;

/// 目標結果のメタデータ
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectiveResultMetadata {
    /// ラベル（`from`/`to`の期間ラベルを含む）
    pub labels: Map<String, Value>,
    /// 関連エンティティ
    #[serde(rename = "relatedTo", default)]
    pub related_to: Vec<Map<String, Value>>,
}

/// 目標結果のスペック
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectiveResultSpec {
    /// 指標セレクター
    pub indicator_selector: Map<String, Value>,
    /// 目標パーセント
    pub objective_percent: f64,
    /// 実績パーセント
    pub actual_percent: f64,
    /// 残余パーセント（負なら目標未達）
    pub remaining_percent: f64,
}

/// SLO目標結果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectiveResult {
    /// メタデータ
    pub metadata: ObjectiveResultMetadata,
    /// スペック
    pub spec: ObjectiveResultSpec,
}

/// JSON配列を目標結果リストへ変換する
pub fn parse_objective_results(value: &Value) -> ActivityResult<Vec<ObjectiveResult>> {
    Ok(serde_json::from_value(value.clone())?)
}
