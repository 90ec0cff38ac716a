//! ガーディアン
//!
//! 1つのプローブ定義を所有し、バックグラウンドタスクで1回（precheck）
//! または固定間隔（safeguard）で実行する。最初の失敗で`interrupted`を
//! 立て、ホストの実行ループへ中断を要求し、以後のポーリングを止める。
//!
//! 状態遷移: `Idle → Running → (Interrupted | Completed) → Terminated`。
//! `interrupted`はsticky（false→trueは1回だけ、リセットなし）。
//! `terminate()`後に完了した実行中のプローブ結果は破棄され、
//! 中断を発火しない。

use std::sync::{Arc, Mutex};

use tokio::sync::Notify;
use tracing::{debug, error, warn};

use chaosguard_common::interrupt::RunInterrupter;

use crate::safeguard::probe::{EndpointProber, ProbeDefinition, MIN_FREQUENCY_SECS};

/// ガーディアン可変状態（1つのロック配下で読み書きする）
#[derive(Debug, Default)]
struct Flags {
    started: bool,
    running: bool,
    interrupted: bool,
    terminated: bool,
    call_count: u64,
}

#[derive(Default)]
struct State {
    flags: Mutex<Flags>,
    // terminate()がポーリングタスクのスリープを起こすための通知
    notify: Notify,
}

impl State {
    fn is_terminated(&self) -> bool {
        self.flags.lock().map(|f| f.terminated).unwrap_or(true)
    }

    /// 中断フラグを立てる。terminate済みなら立てずに`false`を返す。
    fn mark_interrupted(&self) -> bool {
        match self.flags.lock() {
            Ok(mut flags) => {
                if flags.terminated || flags.interrupted {
                    return false;
                }
                flags.interrupted = true;
                true
            }
            Err(_) => false,
        }
    }

    fn record_call(&self) {
        if let Ok(mut flags) = self.flags.lock() {
            flags.call_count += 1;
        }
    }

    fn set_running(&self, value: bool) {
        if let Ok(mut flags) = self.flags.lock() {
            flags.running = value;
        }
    }

    async fn wait_terminated(&self) {
        if self.is_terminated() {
            return;
        }
        self.notify.notified().await;
    }
}

/// セーフガード・プリチェック ガーディアン
///
/// プローブ呼び出しとホスト中断はトレイトオブジェクトで注入する。
/// URLが空のまま準備されたガーディアンは不活性で、`run`しても
/// 何も実行しない（実験は継続する）。
pub struct Guardian {
    probe: Option<ProbeDefinition>,
    prober: Arc<dyn EndpointProber>,
    interrupter: Arc<dyn RunInterrupter>,
    state: Arc<State>,
}

impl Guardian {
    /// プローブ定義を検証してガーディアンを準備する
    ///
    /// URLが空の場合は不活性なガーディアンを返す（エラーにしない）。
    /// `frequency`は下限0.3秒へクランプする。
    pub fn prepare(
        mut probe: ProbeDefinition,
        prober: Arc<dyn EndpointProber>,
        interrupter: Arc<dyn RunInterrupter>,
    ) -> Self {
        let probe = if probe.url.is_empty() {
            debug!(name = %probe.name, "Missing URL for safeguard/precheck call");
            None
        } else {
            if let Some(frequency) = probe.frequency {
                let clamped = frequency.max(MIN_FREQUENCY_SECS);
                if clamped > frequency {
                    debug!(
                        name = %probe.name,
                        requested = frequency,
                        clamped,
                        "Clamped safeguard frequency to the minimum"
                    );
                }
                probe.frequency = Some(clamped);
            }
            Some(probe)
        };

        Self {
            probe,
            prober,
            interrupter,
            state: Arc::new(State::default()),
        }
    }

    /// プローブ定義（不活性なら`None`）
    pub fn probe(&self) -> Option<&ProbeDefinition> {
        self.probe.as_ref()
    }

    /// 中断を要求したかどうか
    pub fn is_interrupted(&self) -> bool {
        self.state
            .flags
            .lock()
            .map(|f| f.interrupted)
            .unwrap_or(false)
    }

    /// ポーリングタスクが動作中かどうか
    pub fn is_running(&self) -> bool {
        self.state.flags.lock().map(|f| f.running).unwrap_or(false)
    }

    /// これまでのプローブ呼び出し回数
    pub fn call_count(&self) -> u64 {
        self.state.flags.lock().map(|f| f.call_count).unwrap_or(0)
    }

    /// ポーリングを開始する
    ///
    /// バックグラウンドタスクへ引き渡してすぐ戻る。2回目以降の呼び出し
    /// と不活性・terminate済みガーディアンでの呼び出しは何もしない。
    pub fn run(&self) {
        let probe = match &self.probe {
            Some(probe) => probe.clone(),
            None => return,
        };

        {
            let mut flags = match self.state.flags.lock() {
                Ok(flags) => flags,
                Err(_) => return,
            };
            if flags.started || flags.terminated {
                warn!(name = %probe.name, "Guardian already started or terminated, ignoring run");
                return;
            }
            flags.started = true;
            flags.running = true;
        }

        let prober = self.prober.clone();
        let interrupter = self.interrupter.clone();
        let state = self.state.clone();

        match probe.interval() {
            Some(interval) => {
                debug!(
                    name = %probe.name,
                    url = %probe.url,
                    frequency = probe.frequency,
                    "Starting safeguard polling"
                );
                tokio::spawn(async move {
                    loop {
                        if state.is_terminated() {
                            break;
                        }
                        state.record_call();
                        let healthy = prober.call(&probe.url, probe.auth.as_deref()).await;
                        if !healthy {
                            interrupt_host(&state, &interrupter, &probe);
                            break;
                        }
                        tokio::select! {
                            _ = state.wait_terminated() => break,
                            _ = tokio::time::sleep(interval) => {}
                        }
                    }
                    state.set_running(false);
                });
            }
            None => {
                debug!(name = %probe.name, url = %probe.url, "Running precheck once");
                tokio::spawn(async move {
                    if !state.is_terminated() {
                        state.record_call();
                        let healthy = prober.call(&probe.url, probe.auth.as_deref()).await;
                        if !healthy {
                            interrupt_host(&state, &interrupter, &probe);
                        }
                    }
                    state.set_running(false);
                });
            }
        }
    }

    /// ポーリングを停止する
    ///
    /// 冪等で、`run`前に呼んでも安全。実行中のプローブ呼び出しは
    /// 強制中断しないが、その結果で`interrupted`が立つことはない。
    pub fn terminate(&self) {
        if let Ok(mut flags) = self.state.flags.lock() {
            flags.terminated = true;
        }
        self.state.notify.notify_waiters();
    }
}

/// プローブ失敗をホスト中断へ変換する
fn interrupt_host(state: &State, interrupter: &Arc<dyn RunInterrupter>, probe: &ProbeDefinition) {
    if !state.mark_interrupted() {
        return;
    }
    let reason = format!("safeguard probe '{}' reported failure for {}", probe.name, probe.url);
    warn!(name = %probe.name, url = %probe.url, "Probe failed, requesting run interruption");
    if let Err(e) = interrupter.interrupt(&reason) {
        // 中断を届けられないセーフガードは目的を果たせていない
        error!(name = %probe.name, error = %e, "Failed to interrupt the host run loop");
    }
}
