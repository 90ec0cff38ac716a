//! セーフガード・プリチェック監視
//!
//! 実験実行中に任意のエンドポイント健全性を監視し、失敗を検出した
//! 時点でホストの実行ループへ中断を要求するサブシステム。
//!
//! - precheck: 実行開始時に1回だけ確認する
//! - safeguard: 実行中、固定間隔で繰り返し確認する
//!
//! ガーディアンはプローブ呼び出し（[`probe::EndpointProber`]）と
//! ホスト中断（`RunInterrupter`）をトレイト注入で受け取るため、
//! ネットワークなしでテストできる。

pub mod control;
pub mod guardian;
pub mod handler;
pub mod probe;

pub use control::{
    configure_precheck_control, configure_safeguard_control, register_declared_controls,
    ControlArguments,
};
pub use guardian::Guardian;
pub use handler::SafeguardHandler;
pub use probe::{EndpointProber, HttpProber, ProbeDefinition};
