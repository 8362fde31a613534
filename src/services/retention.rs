//! Retention policy: how long a stored file may live, as a function of its
//! size relative to the deployment's size cap.

/// Maximum allowed age in days for a file of `size_bytes`, or `None` when no
/// size cap is configured (the record never expires implicitly).
///
/// The curve is `min_age + (min_age - max_age) * (size / cap)^5`. The fifth
/// power makes the falloff back-loaded: the penalty only bites in the top
/// size quantile. Files at or above the cap can get a negative allowance,
/// meaning they are expired on arrival; that is intentional, so ratios above
/// 1 are not special-cased.
pub fn max_age_days(
    size_bytes: u64,
    min_age: f64,
    max_age: f64,
    size_cap_bytes: Option<u64>,
) -> Option<f64> {
    let cap = size_cap_bytes?;
    let ratio = size_bytes as f64 / cap as f64;
    Some(min_age + (min_age - max_age) * ratio.powi(5))
}

/// Age of a record in (fractional) days.
pub fn age_days(now_ms: i64, created_at_ms: i64) -> f64 {
    (now_ms - created_at_ms) as f64 / 86_400_000.0
}
