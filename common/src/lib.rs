//! Chaosguard ホストランナー契約
//!
//! 実験ランナーとプラグインの間で共有する型とライフサイクル契約。
//! ランナー本体の実装には依存しない。

#![warn(missing_docs)]

/// 実行ライフサイクルイベント契約
pub mod events;

/// 実行中断シグナル
pub mod interrupt;

/// 実験ドキュメント共通型
pub mod types;
