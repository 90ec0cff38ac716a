//! 実行ライフサイクルイベント契約
//!
//! ランナーは実行開始・終了をレジストリ経由でハンドラーへファンアウトする。
//! 通知順はハンドラーの登録順。

use std::sync::Arc;

use crate::types::{Configuration, Experiment, Journal, Secrets};

/// 実行ライフサイクル通知を受け取るハンドラー
///
/// ハンドラーは自身のエラーを内部で処理する。通知から戻らない・
/// パニックする実装はランナー全体を道連れにするため許されない。
pub trait RunEventHandler: Send + Sync {
    /// 実行開始時（最初のアクティビティ実行前）に呼ばれる
    fn on_run_started(
        &self,
        experiment: &Experiment,
        configuration: &Configuration,
        secrets: &Secrets,
    );

    /// 実行終了時（ジャーナル確定前）に呼ばれる
    fn on_run_finished(&self, journal: &mut Journal);
}

/// 登録順でイベントをファンアウトするレジストリ
#[derive(Default)]
pub struct EventHandlerRegistry {
    handlers: Vec<Arc<dyn RunEventHandler>>,
}

impl EventHandlerRegistry {
    /// 空のレジストリを作成
    pub fn new() -> Self {
        Self::default()
    }

    /// ハンドラーを末尾に登録する
    pub fn register(&mut self, handler: Arc<dyn RunEventHandler>) {
        self.handlers.push(handler);
        tracing::debug!(count = self.handlers.len(), "run event handler registered");
    }

    /// 登録済みハンドラー数
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// ハンドラー未登録かどうか
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// 実行開始を全ハンドラーへ通知する
    pub fn run_started(
        &self,
        experiment: &Experiment,
        configuration: &Configuration,
        secrets: &Secrets,
    ) {
        for handler in &self.handlers {
            handler.on_run_started(experiment, configuration, secrets);
        }
    }

    /// 実行終了を全ハンドラーへ通知する
    pub fn run_finished(&self, journal: &mut Journal) {
        for handler in &self.handlers {
            handler.on_run_finished(journal);
        }
    }
}
