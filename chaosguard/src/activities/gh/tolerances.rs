//! GitHubトレランス
//!
//! ワークフロー実行時間などの値に対する判定。

use tracing::debug;

use crate::config::parse_window;
use crate::error::{ActivityError, ActivityResult};

/// 比率が目標値を下回るか判定する（厳密な未満）
pub fn ratio_under(target: f64, value: f64) -> bool {
    debug!(target, value, "Verifying that the ratio is below the target");
    value < target
}

/// 比率が目標値を上回るか判定する（厳密な超過）
pub fn ratio_above(target: f64, value: f64) -> bool {
    debug!(target, value, "Verifying that the ratio is above the target");
    value > target
}

/// 所要時間の分布のpパーセンタイルが許容時間以内か判定する
///
/// `percentile`は1〜99、`duration`は`"1h"`/`"30m"`/`"90s"`形式、
/// `value`は秒単位の所要時間リスト。空リストは常に`true`。
/// 例えばPRクローズ時間のリストに対し「99%が1時間以内に閉じた」
/// ことを確認できる。
pub fn percentile_under(percentile: usize, duration: &str, value: &[f64]) -> ActivityResult<bool> {
    if !(1..=99).contains(&percentile) {
        return Err(ActivityError::InvalidActivity(
            "percentile must be between 1 and 99".to_string(),
        ));
    }
    if value.is_empty() {
        return Ok(true);
    }

    let limit = parse_window(duration).num_milliseconds() as f64 / 1000.0;
    let cut_points = exclusive_quantiles(value, 100);
    Ok(cut_points[percentile - 1] <= limit)
}

/// 排他法による分位点（n分割のn-1個の切断点）を求める
///
/// 1件しかないデータはその値を全切断点に使う。
fn exclusive_quantiles(data: &[f64], n: usize) -> Vec<f64> {
    let mut sorted = data.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let ld = sorted.len();
    if ld == 1 {
        return vec![sorted[0]; n - 1];
    }

    let m = ld + 1;
    let mut cut_points = Vec::with_capacity(n - 1);
    for i in 1..n {
        let j = (i * m / n).clamp(1, ld - 1);
        // jをクランプした端ではdeltaが負になり、外挿になる
        let delta = (i * m) as f64 - (j * n) as f64;
        let interpolated = (sorted[j - 1] * (n as f64 - delta) + sorted[j] * delta) / n as f64;
        cut_points.push(interpolated);
    }
    cut_points
}
