/// Participation rates from the aggregator are clamped before they reach the ledger.
pub(super) fn sanitize_rate(rate: f32) -> f32 {
    if rate.is_nan() {
        return 0.0;
    }
    rate.clamp(0.0, 1.0)
}

pub(super) fn round_to_tenths(value: f32) -> f32 {
    (value * 10.0).round() / 10.0
}
