//! HTTPトレランス

/// 応答時間が許容レイテンシ以内か判定する
///
/// 応答時間を測定するプローブのトレランスとして使う。
pub fn response_time_must_be_under(latency: f64, value: f64) -> bool {
    value <= latency
}
