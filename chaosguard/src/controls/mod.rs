//! 実験コントロール
//!
//! 実行終了時に結果を信頼性サービスへ記録するコントロール。

pub mod experiment;

pub use experiment::{after_experiment_control, ExecutionReporter};
