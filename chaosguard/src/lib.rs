//! Chaosguard 実験プラグイン
//!
//! カオス実験ランナーへ safeguard / precheck ガーディアンと、
//! 信頼性サービス連携のプローブ・アクション・トレランスを提供する。

#![warn(missing_docs)]

/// アクティビティ（GitHub・HTTP・TLS・負荷試験）
pub mod activities;

/// 設定値解決（環境変数ヘルパー、コントロール引数の間接参照）
pub mod config;

/// 実験コントロール（実行結果アップロード）
pub mod controls;

/// エラー型定義
pub mod error;

/// セーフガード・プリチェック ガーディアン
pub mod safeguard;

/// 信頼性サービスHTTPセッション
pub mod session;

/// SLOレポート プローブ・トレランス
pub mod slo;
