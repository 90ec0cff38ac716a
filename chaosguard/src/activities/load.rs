//! 負荷試験アクション
//!
//! 対象エンドポイントへ段階的に増える負荷をかける。一気に押し寄せる
//! のではなく少しずつ仮想ユーザーを足していくため、別のアクションを
//! 実行している間にエンドポイントを稼働させ続ける用途に向く
//! （通常はバックグラウンドステップとして実行する）。

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use serde_json::{json, Value};
use tracing::{debug, warn};

use chaosguard_common::types::{get_str, Configuration, Secrets};

use crate::error::{ActivityError, ActivityResult};

/// 負荷生成プロセス終了待ちの猶予（秒）
const LOAD_TEST_GRACE_SECS: u64 = 5;

/// 埋め込みの負荷試験スクリプト
const STEP_LOAD_SCRIPT: &str = include_str!("scripts/step_load_test.py");

/// 負荷試験のパラメータ
#[derive(Debug, Clone)]
pub struct LoadTestParams {
    /// 対象エンドポイント（絶対URL）
    pub endpoint: String,
    /// 1ステップの長さ（秒）
    pub step_duration: u64,
    /// ステップごとに追加する仮想ユーザー数
    pub step_additional_vu: u64,
    /// 毎秒の仮想ユーザー投入数
    pub vu_per_second_rate: u64,
    /// 試験全体の長さ（秒）
    pub test_duration: u64,
    /// 結果JSONの書き出し先
    pub results_json_filepath: Option<PathBuf>,
}

impl LoadTestParams {
    /// 既定のパラメータで負荷試験を指定する
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            step_duration: 5,
            step_additional_vu: 1,
            vu_per_second_rate: 1,
            test_duration: 30,
            results_json_filepath: None,
        }
    }
}

/// エンドポイントへ段階的な負荷をかける
///
/// 認証が必要な場合はsecrets `test_bearer_token`でBearerトークンを
/// 渡す。負荷生成には`locust`コマンドを使い、見つからない場合は
/// `ActivityError::Failed`。結果はJSONとして返し、
/// `results_json_filepath`があればそこへも書き出す。
pub async fn inject_gradual_traffic_into_endpoint(
    params: &LoadTestParams,
    _configuration: &Configuration,
    secrets: &Secrets,
) -> ActivityResult<Value> {
    let url = reqwest::Url::parse(&params.endpoint)
        .map_err(|_| ActivityError::InvalidActivity("endpoint must be a proper url".to_string()))?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(ActivityError::InvalidActivity(
            "endpoint must be a proper url".to_string(),
        ));
    }

    let locust_path = find_on_path("locust").ok_or_else(|| {
        ActivityError::Failed("missing load test dependency (locust)".to_string())
    })?;

    let workdir = tempfile::tempdir()?;
    let locustfile_path = workdir.path().join("locustfile.py");
    std::fs::write(&locustfile_path, STEP_LOAD_SCRIPT)?;

    let mut command = tokio::process::Command::new(&locust_path);
    // タイムアウトでoutputのfutureを手放したとき、生成プロセスを残さない
    command.kill_on_drop(true);
    command
        .arg("--host")
        .arg("localhost:8089")
        .arg("--locustfile")
        .arg(&locustfile_path)
        .arg("--json")
        .arg("--headless")
        .arg("--loglevel")
        .arg("INFO")
        .current_dir(workdir.path())
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .env("CHAOSGUARD_LOCUST_ENDPOINT", &params.endpoint)
        .env(
            "CHAOSGUARD_LOCUST_STEP_DURATION",
            params.step_duration.to_string(),
        )
        .env(
            "CHAOSGUARD_LOCUST_STEP_ADDED_USER",
            params.step_additional_vu.to_string(),
        )
        .env(
            "CHAOSGUARD_LOCUST_USER_RATE",
            params.vu_per_second_rate.to_string(),
        )
        .env(
            "CHAOSGUARD_LOCUST_DURATION",
            params.test_duration.to_string(),
        );
    if let Some(token) = get_str(secrets, "test_bearer_token") {
        command.env("CHAOSGUARD_LOCUST_ENDPOINT_TOKEN", token);
    }

    debug!(endpoint = %params.endpoint, "Starting gradual load test");
    let deadline = Duration::from_secs(params.test_duration + LOAD_TEST_GRACE_SECS);
    let output = tokio::time::timeout(deadline, command.output())
        .await
        .map_err(|_| ActivityError::Failed("load test took too long to complete".to_string()))??;

    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr);
    debug!(code = ?output.status.code(), "Load generator exited");
    if !stderr.is_empty() {
        debug!(stderr = %stderr, "Load generator stderr");
    }
    if !output.status.success() {
        warn!(code = ?output.status.code(), "Load generator exited with a failure status");
    }

    if let Some(path) = &params.results_json_filepath {
        std::fs::write(path, &stdout)?;
    }

    if stdout.trim().is_empty() {
        return Ok(json!({}));
    }
    serde_json::from_str(stdout.trim()).map_err(|e| {
        ActivityError::Failed(format!("load test produced unreadable results: {e}"))
    })
}

/// PATHから実行ファイルを探す
fn find_on_path(name: &str) -> Option<PathBuf> {
    let path = std::env::var_os("PATH")?;
    for dir in std::env::split_paths(&path) {
        let candidate = dir.join(name);
        if is_executable(&candidate) {
            return Some(candidate);
        }
    }
    None
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}
