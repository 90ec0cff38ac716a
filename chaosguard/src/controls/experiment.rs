//! 実行結果アップロード
//!
//! 実験終了時にジャーナルを信頼性サービスの実行記録へPOSTする。
//! 記録の失敗が実験実行を壊してはならないため、エラーはすべて
//! ここで吸収してログへ落とす。

use serde_json::json;
use tracing::{debug, error, warn};

use chaosguard_common::events::RunEventHandler;
use chaosguard_common::types::{Configuration, Experiment, Journal, Secrets};

use crate::error::ActivityResult;
use crate::session::ServiceSession;

/// 実験終了後にジャーナルをアップロードする
///
/// 失敗してもエラーを返さない。実行へ影響させないこと。
pub async fn after_experiment_control(
    journal: &Journal,
    exp_id: &str,
    org_id: &str,
    configuration: &Configuration,
    secrets: &Secrets,
) {
    if let Err(e) = complete_run(journal, exp_id, org_id, configuration, secrets).await {
        debug!(
            error = %e,
            "An error occurred while running the after-experiment control, \
             the execution won't be affected"
        );
    }
}

/// ジャーナルを実行記録としてPOSTする
async fn complete_run(
    journal: &Journal,
    exp_id: &str,
    org_id: &str,
    configuration: &Configuration,
    secrets: &Secrets,
) -> ActivityResult<()> {
    let session = ServiceSession::new(configuration, secrets)?;
    let body = json!({"result": serde_json::to_string(journal)?});
    let path = format!("{org_id}/experiments/{exp_id}/executions");
    let response = session.post_json(&path, &body).await?;
    debug!(url = %response.url(), status = response.status().as_u16(), "Uploaded execution result");
    if !response.status().is_success() {
        warn!(
            status = response.status().as_u16(),
            "Reliability service rejected the execution result"
        );
    }
    Ok(())
}

/// 実行終了イベントでジャーナルをアップロードするハンドラー
///
/// セーフガードハンドラーと同じイベントレジストリへ登録して使う。
pub struct ExecutionReporter {
    exp_id: String,
    org_id: String,
    configuration: Configuration,
    secrets: Secrets,
}

impl ExecutionReporter {
    /// アップロード先を指定してレポーターを作る
    pub fn new(
        exp_id: impl Into<String>,
        org_id: impl Into<String>,
        configuration: Configuration,
        secrets: Secrets,
    ) -> Self {
        Self {
            exp_id: exp_id.into(),
            org_id: org_id.into(),
            configuration,
            secrets,
        }
    }
}

impl RunEventHandler for ExecutionReporter {
    fn on_run_started(
        &self,
        _experiment: &Experiment,
        _configuration: &Configuration,
        _secrets: &Secrets,
    ) {
    }

    fn on_run_finished(&self, journal: &mut Journal) {
        // イベント通知は同期なので、アップロード完了まで待ってから戻る。
        // block_in_placeはマルチスレッドランタイム限定のため、それ以外は
        // 専用スレッド上の小さなランタイムで実行する（ホストの実行を
        // このサブシステムのパニックで壊さないこと）。
        let upload = after_experiment_control(
            journal,
            &self.exp_id,
            &self.org_id,
            &self.configuration,
            &self.secrets,
        );
        match tokio::runtime::Handle::try_current() {
            Ok(handle)
                if handle.runtime_flavor() == tokio::runtime::RuntimeFlavor::MultiThread =>
            {
                tokio::task::block_in_place(|| handle.block_on(upload));
            }
            _ => {
                std::thread::scope(|scope| {
                    scope.spawn(|| {
                        let runtime = match tokio::runtime::Builder::new_current_thread()
                            .enable_all()
                            .build()
                        {
                            Ok(runtime) => runtime,
                            Err(e) => {
                                error!(error = %e, "Failed to build an upload runtime, skipping execution result upload");
                                return;
                            }
                        };
                        runtime.block_on(upload);
                    });
                });
            }
        }
    }
}
