//! SLOレポート プローブ・トレランス
//!
//! 信頼性サービスからSLOレポート履歴を取得するプローブと、
//! 目標結果を判定するトレランス。

pub mod probes;
pub mod tolerances;
pub mod types;

pub use probes::{get_last_n_slos, get_slo_history};
pub use tolerances::all_objective_results_ok;
pub use types::{parse_objective_results, ObjectiveResult};
