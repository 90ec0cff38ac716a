//! アクティビティ
//!
//! 実験ステップとして呼ばれるプローブ・アクション・トレランス。
//! いずれも内部状態を持たない単純なリクエスト/レスポンスラッパー。

pub mod gh;
pub mod http;
pub mod load;
pub mod tls;
