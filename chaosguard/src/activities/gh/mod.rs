//! GitHubアクティビティ
//!
//! ワークフロー実行のキャンセルと、実行時間系の値に対する
//! トレランスを提供する。

pub mod actions;
pub mod tolerances;

use chrono::{DateTime, Utc};

use chaosguard_common::types::{get_str, Secrets};

use crate::config::{get_env, parse_window};
use crate::error::{ActivityError, ActivityResult};

/// GitHub APIのベースURL
pub const GITHUB_API_BASE_URL: &str = "https://api.github.com";

/// GitHubトークンを解決する（secrets `token` → `GITHUB_TOKEN`）
pub fn get_gh_token(secrets: &Secrets) -> ActivityResult<String> {
    get_str(secrets, "token")
        .map(str::to_string)
        .or_else(|| get_env("GITHUB_TOKEN"))
        .ok_or_else(|| {
            ActivityError::Config(
                "missing GitHub token (secrets `token` or GITHUB_TOKEN)".to_string(),
            )
        })
}

/// `"5d"`形式のウィンドウ指定から対象期間（開始・終了）を求める
pub fn get_period(window: &str) -> (DateTime<Utc>, DateTime<Utc>) {
    let end = Utc::now();
    (end - parse_window(window), end)
}
