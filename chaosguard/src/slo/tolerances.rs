//! SLOトレランス

use tracing::{error, info};

use crate::slo::types::ObjectiveResult;

/// すべての目標結果が目標を満たしているか判定する
///
/// `remaining_percent`が負の結果が1つでもあれば`false`。
/// 目標99%で実績90%なら残余は-9%で未達、目標90%で実績99%なら
/// 残余は9%で達成。未達の結果はエラーレベルでログへ出す。
pub fn all_objective_results_ok(value: &[ObjectiveResult]) -> bool {
    let mut all_ok = true;
    for result in value {
        if result.spec.remaining_percent >= 0.0 {
            continue;
        }
        all_ok = false;
        error!(
            from = %label(result, "from"),
            to = %label(result, "to"),
            objective_percent = result.spec.objective_percent,
            actual_percent = result.spec.actual_percent,
            remaining_percent = result.spec.remaining_percent,
            indicator_selector = %serde_json::Value::Object(result.spec.indicator_selector.clone()),
            "Objective result was not OK"
        );
    }
    if all_ok {
        info!("All objective results were OK");
    }
    all_ok
}

fn label<'a>(result: &'a ObjectiveResult, key: &str) -> &'a str {
    result
        .metadata
        .labels
        .get(key)
        .and_then(serde_json::Value::as_str)
        .unwrap_or("")
}
