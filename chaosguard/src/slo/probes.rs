//! SLO履歴プローブ
//!
//! 信頼性サービスの`reports/history`からSLOレポート履歴を取得する。

use std::collections::{BTreeMap, VecDeque};

use serde_json::Value;
use tracing::debug;

use chaosguard_common::types::{Configuration, Secrets};

use crate::error::{ActivityError, ActivityResult};
use crate::session::ServiceSession;

/// 1回の取得で受け付ける履歴件数の上限
pub const MAX_HISTORY_LIMIT: u32 = 25;

/// SLOレポート履歴を取得する
///
/// `limit`は上限25件でクランプする（`None`なら25件）。
/// 200以外の応答は`ActivityError::Failed`。
pub async fn get_slo_history(
    limit: Option<u32>,
    configuration: &Configuration,
    secrets: &Secrets,
) -> ActivityResult<Value> {
    let limit = limit.unwrap_or(MAX_HISTORY_LIMIT).min(MAX_HISTORY_LIMIT);
    let session = ServiceSession::new(configuration, secrets)?;
    let response = session
        .get("reports/history", &[("limit", limit.to_string())])
        .await?;
    debug!(url = %response.url(), "Fetched SLO history");
    if response.status() != reqwest::StatusCode::OK {
        let body = response.text().await.unwrap_or_default();
        return Err(ActivityError::Failed(format!(
            "Failed to retrieve SLO history: {body}"
        )));
    }
    Ok(response.json().await?)
}

/// サービスごとに直近N件のSLOエントリを返す
///
/// 履歴を走査し、`"{service}/{type}/{name}"`をキーとして結果付きの
/// SLOエントリを集める。各キーは最新の`quantity`件だけを保持する
/// （古いものから捨てる）。
pub async fn get_last_n_slos(
    quantity: usize,
    configuration: &Configuration,
    secrets: &Secrets,
) -> ActivityResult<BTreeMap<String, Vec<Value>>> {
    let history = get_slo_history(None, configuration, secrets).await?;

    let mut dataset: BTreeMap<String, VecDeque<Value>> = BTreeMap::new();
    let reports = history
        .get("reports")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[]);
    for report in reports {
        let services = report
            .get("services")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[]);
        for service in services {
            let service_name = service.get("name").and_then(Value::as_str).unwrap_or("");
            let levels = service
                .get("service_levels")
                .and_then(Value::as_array)
                .map(Vec::as_slice)
                .unwrap_or(&[]);
            for slo in levels {
                if slo.get("result").map(Value::is_null).unwrap_or(true) {
                    continue;
                }
                let slo_type = slo.get("type").and_then(Value::as_str).unwrap_or("");
                let slo_name = slo.get("name").and_then(Value::as_str).unwrap_or("");
                let key = format!("{service_name}/{slo_type}/{slo_name}");
                let entries = dataset.entry(key).or_default();
                if entries.len() == quantity {
                    entries.pop_front();
                }
                entries.push_back(slo.clone());
            }
        }
    }

    Ok(dataset
        .into_iter()
        .map(|(key, entries)| (key, entries.into_iter().collect()))
        .collect())
}
