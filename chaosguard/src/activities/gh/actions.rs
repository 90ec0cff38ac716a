//! GitHubワークフローアクション

use std::time::Duration;

use rand::Rng;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use chaosguard_common::types::Secrets;

use crate::activities::gh::{get_gh_token, get_period, GITHUB_API_BASE_URL};
use crate::error::{ActivityError, ActivityResult};

/// GitHub API呼び出しのタイムアウト（秒）
const GITHUB_TIMEOUT_SECS: u64 = 30;

/// ワークフロー実行キャンセルの対象指定
///
/// パラメータの意味と取りうる値は
/// <https://docs.github.com/en/rest/actions/workflow-runs> を参照。
#[derive(Debug, Clone)]
pub struct CancelWorkflowRun {
    /// 対象リポジトリ（`owner/name`）
    pub repo: String,
    /// 候補からランダムに選ぶ（falseなら最新の1件）
    pub at_random: bool,
    /// トリガーしたコミットメッセージの先頭にマッチする正規表現
    pub commit_message_pattern: Option<String>,
    /// トリガーしたユーザー
    pub actor: Option<String>,
    /// 対象ブランチ
    pub branch: String,
    /// トリガーイベント
    pub event: String,
    /// 実行ステータス
    pub status: String,
    /// 検索対象の期間（`"5d"`形式）
    pub window: String,
    /// プルリクエスト起点の実行を除外する
    pub exclude_pull_requests: bool,
    /// APIベースURLの差し替え（テスト用）
    pub api_base_url: Option<String>,
}

impl CancelWorkflowRun {
    /// 既定のパラメータで対象指定を作る
    pub fn new(repo: impl Into<String>) -> Self {
        Self {
            repo: repo.into(),
            at_random: false,
            commit_message_pattern: None,
            actor: None,
            branch: "main".to_string(),
            event: "push".to_string(),
            status: "in_progress".to_string(),
            window: "5d".to_string(),
            exclude_pull_requests: false,
            api_base_url: None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct WorkflowRunList {
    total_count: u64,
    #[serde(default)]
    workflow_runs: Vec<Value>,
}

/// GitHubワークフロー実行をキャンセルする
///
/// 指定条件にマッチする実行一覧を取得し、対象を1件選んで
/// キャンセルを要求する。`commit_message_pattern`があればコミット
/// メッセージで絞り込み、`at_random`なら候補からランダムに選ぶ。
/// キャンセルした実行オブジェクトを返す。
pub async fn cancel_workflow_run(
    request: &CancelWorkflowRun,
    secrets: &Secrets,
) -> ActivityResult<Value> {
    let token = get_gh_token(secrets)?;
    let (start, _) = get_period(&request.window);
    let base = request
        .api_base_url
        .as_deref()
        .unwrap_or(GITHUB_API_BASE_URL);
    let list_url = format!("{base}/repos/{}/actions/runs", request.repo);

    let mut params = vec![
        ("branch", request.branch.clone()),
        ("event", request.event.clone()),
        ("status", request.status.clone()),
        ("created", format!(">{}", start.format("%Y-%m-%d"))),
        (
            "exclude_pull_requests",
            request.exclude_pull_requests.to_string(),
        ),
        ("page", "1".to_string()),
    ];
    if let Some(actor) = &request.actor {
        params.push(("actor", actor.clone()));
    }

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(GITHUB_TIMEOUT_SECS))
        .build()?;
    let user_agent = format!("chaosguard/{}", env!("CARGO_PKG_VERSION"));

    let response = client
        .get(&list_url)
        .header("accept", "application/vnd.github+json")
        .header("X-GitHub-Api-Version", "2022-11-28")
        .header("user-agent", &user_agent)
        .bearer_auth(&token)
        .query(&params)
        .send()
        .await?;
    if response.status().as_u16() > 399 {
        let body = response.text().await.unwrap_or_default();
        debug!(repo = %request.repo, body = %body, "Failed to list workflow runs");
        return Err(ActivityError::Failed(format!(
            "failed to retrieve workflow runs for repo '{}'",
            request.repo
        )));
    }

    let result: WorkflowRunList = response.json().await?;
    debug!(
        count = result.total_count,
        "Found GitHub workflow runs matching the query"
    );

    let target = pick_target(
        &result.workflow_runs,
        request.commit_message_pattern.as_deref(),
        request.at_random,
    )?;
    let target = match target {
        Some(target) => target,
        None => {
            return Err(ActivityError::Failed(
                "failed to locate a GitHub workflow run matching the query".to_string(),
            ))
        }
    };

    let run_id = target
        .get("id")
        .and_then(Value::as_u64)
        .ok_or_else(|| ActivityError::Failed("workflow run is missing an id".to_string()))?;
    let cancel_url = format!("{list_url}/{run_id}/cancel");
    let response = client
        .post(&cancel_url)
        .header("accept", "application/vnd.github+json")
        .header("X-GitHub-Api-Version", "2022-11-28")
        .header("user-agent", &user_agent)
        .bearer_auth(&token)
        .send()
        .await?;
    if response.status().as_u16() > 399 {
        let body = response.text().await.unwrap_or_default();
        debug!(repo = %request.repo, run_id, body = %body, "Failed to cancel workflow run");
        return Err(ActivityError::Failed(format!(
            "failed to cancel run {run_id} in '{}'",
            request.repo
        )));
    }

    debug!(run_id, "Cancelled workflow run");
    Ok(target.clone())
}

/// 候補からキャンセル対象を選ぶ
fn pick_target<'a>(
    runs: &'a [Value],
    commit_message_pattern: Option<&str>,
    at_random: bool,
) -> ActivityResult<Option<&'a Value>> {
    if runs.is_empty() {
        return Ok(None);
    }

    if let Some(pattern) = commit_message_pattern {
        let pattern = Regex::new(pattern).map_err(|e| {
            ActivityError::InvalidActivity(format!("invalid commit message pattern: {e}"))
        })?;
        for run in runs {
            let message = run
                .get("head_commit")
                .and_then(|c| c.get("message"))
                .and_then(Value::as_str)
                .unwrap_or("");
            // 先頭マッチ（Pythonのre.matchと同じ扱い）
            if pattern.find(message).is_some_and(|m| m.start() == 0) {
                return Ok(Some(run));
            }
        }
        return Ok(None);
    }

    let index = if at_random {
        rand::thread_rng().gen_range(0..runs.len())
    } else {
        0
    };
    Ok(runs.get(index))
}
