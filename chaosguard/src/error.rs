//! エラー型定義
//!
//! プラグイン統一エラー型（thiserror使用）
//!
//! アクティビティは`ActivityResult`を返し、コントロールはエラーを
//! 吸収してログへ落とす。ガーディアンのプローブ失敗はエラーではなく
//! bool健全性シグナルに畳み込まれ、ここには現れない。

use thiserror::Error;

/// Plugin activity error type
#[derive(Debug, Error)]
pub enum ActivityError {
    /// Invalid activity arguments
    #[error("Invalid activity arguments: {0}")]
    InvalidActivity(String),

    /// Activity ran but did not succeed
    #[error("Activity failed: {0}")]
    Failed(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// HTTP client error
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias (activities)
pub type ActivityResult<T> = Result<T, ActivityError>;
