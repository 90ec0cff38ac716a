//! セーフガードハンドラー（ガーディアンレジストリ）
//!
//! 1回の実験実行に属するガーディアン群のライフサイクルを調停する。
//! `register`で実行イベントへ1回だけ購読し、実行開始で全ガーディアンを
//! 起動（1回だけ）、実行終了で全ガーディアンを停止して発火した
//! プローブ定義をジャーナルへ記録する。
//!
//! リストとフラグの読み書きはハンドラー単位の1つのロック配下で行う。
//! ポーリング自体は各ガーディアンの独立したタスク上で進み、このロックを
//! 保持しない。

use std::sync::{Arc, Mutex};

use serde_json::{json, Value};
use tracing::{debug, warn};

use chaosguard_common::events::{EventHandlerRegistry, RunEventHandler};
use chaosguard_common::types::{Configuration, Experiment, Journal, Secrets};

use crate::safeguard::guardian::Guardian;

/// ジャーナルへの記録に使う統合バケット名
pub const INTEGRATION_NAME: &str = "chaosguard";

#[derive(Default)]
struct Inner {
    initialized: bool,
    started: bool,
    // 挿入順 = 登録順。発火プローブのレポート順もこの順に従う
    guardians: Vec<Arc<Guardian>>,
}

/// ガーディアンレジストリ
///
/// 呼び出し側が構築して所有する（プロセス全体の暗黙シングルトンは
/// 持たない）。テストは独立したインスタンスを作れる。
#[derive(Default)]
pub struct SafeguardHandler {
    inner: Mutex<Inner>,
}

impl SafeguardHandler {
    /// 空のハンドラーを作成
    pub fn new() -> Self {
        Self::default()
    }

    /// 実行イベントレジストリへ自身を購読する
    ///
    /// 2回目以降の呼び出しは何もしない。並行に呼ばれても安全。
    pub fn register(self: &Arc<Self>, event_registry: &mut EventHandlerRegistry) {
        let mut inner = match self.inner.lock() {
            Ok(inner) => inner,
            Err(_) => return,
        };
        if inner.initialized {
            return;
        }
        event_registry.register(self.clone());
        inner.initialized = true;
        debug!("Safeguard handler registered with the run event registry");
    }

    /// 購読済みかどうか
    pub fn is_initialized(&self) -> bool {
        self.inner.lock().map(|i| i.initialized).unwrap_or(false)
    }

    /// 準備済みガーディアンを末尾へ追加する
    ///
    /// 未登録のハンドラーへの追加は何もしない。
    pub fn add(&self, guardian: Guardian) {
        let mut inner = match self.inner.lock() {
            Ok(inner) => inner,
            Err(_) => return,
        };
        if !inner.initialized {
            debug!("Safeguard handler is not registered, ignoring guardian");
            return;
        }
        inner.guardians.push(Arc::new(guardian));
    }

    /// 保持するガーディアン数
    pub fn len(&self) -> usize {
        self.inner.lock().map(|i| i.guardians.len()).unwrap_or(0)
    }

    /// ガーディアン未登録かどうか
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 全ガーディアンを登録順に起動する
    ///
    /// レジストリインスタンスごとに1回だけ実行する。2回目以降は
    /// 何もしない。
    pub fn start_all(&self) {
        let guardians = {
            let mut inner = match self.inner.lock() {
                Ok(inner) => inner,
                Err(_) => return,
            };
            if !inner.initialized || inner.started {
                return;
            }
            inner.started = true;
            inner.guardians.clone()
        };

        debug!(count = guardians.len(), "Starting all safeguard guardians");
        // ロックを手放してから起動する（runはタスクへ引き渡してすぐ戻る）
        for guardian in &guardians {
            guardian.run();
        }
    }

    /// 起動済みかどうか
    pub fn is_started(&self) -> bool {
        self.inner.lock().map(|i| i.started).unwrap_or(false)
    }

    /// 全ガーディアンを停止し、発火したプローブをジャーナルへ記録する
    ///
    /// `start_all`が一度も呼ばれていなくても安全に呼べる。バケット
    /// （`integrations.chaosguard.prechecks` / `.safeguards`）は
    /// 発火がなくても空配列として必ず作る。
    pub fn finish(&self, journal: &mut Journal) {
        let guardians = {
            let inner = match self.inner.lock() {
                Ok(inner) => inner,
                Err(_) => return,
            };
            if !inner.initialized {
                return;
            }
            inner.guardians.clone()
        };

        let mut prechecks = Vec::new();
        let mut safeguards = Vec::new();
        for guardian in &guardians {
            guardian.terminate();
            if !guardian.is_interrupted() {
                continue;
            }
            let probe = match guardian.probe() {
                Some(probe) => probe,
                None => continue,
            };
            let definition = match serde_json::to_value(probe) {
                Ok(definition) => definition,
                Err(e) => {
                    warn!(name = %probe.name, error = %e, "Failed to serialize probe definition");
                    continue;
                }
            };
            if probe.is_repeating() {
                safeguards.push(definition);
            } else {
                prechecks.push(definition);
            }
        }

        append_to_report(journal, "prechecks", prechecks);
        append_to_report(journal, "safeguards", safeguards);
    }
}

impl RunEventHandler for SafeguardHandler {
    fn on_run_started(
        &self,
        _experiment: &Experiment,
        _configuration: &Configuration,
        _secrets: &Secrets,
    ) {
        self.start_all();
    }

    fn on_run_finished(&self, journal: &mut Journal) {
        self.finish(journal);
    }
}

/// ジャーナルの統合バケットへ発火プローブを追記する
fn append_to_report(journal: &mut Journal, bucket: &str, triggered: Vec<Value>) {
    let root = match journal.as_object_mut() {
        Some(root) => root,
        None => {
            warn!("Journal is not a JSON object, dropping safeguard report");
            return;
        }
    };
    let integration = root
        .entry("integrations")
        .or_insert_with(|| json!({}))
        .as_object_mut()
        .map(|integrations| {
            integrations
                .entry(INTEGRATION_NAME)
                .or_insert_with(|| json!({}))
        });
    let integration = match integration.and_then(Value::as_object_mut) {
        Some(integration) => integration,
        None => {
            warn!("Journal integrations entry is not a JSON object, dropping safeguard report");
            return;
        }
    };
    let list = integration
        .entry(bucket)
        .or_insert_with(|| json!([]));
    if let Some(list) = list.as_array_mut() {
        list.extend(triggered);
    }
}
