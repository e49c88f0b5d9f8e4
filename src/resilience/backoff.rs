//! Exponential backoff for unhealthy probing.

use std::time::Duration;

/// Delay before the next probe after a failed one.
///
/// Growth is exponential in the excess of `failures` over `threshold`, so the
/// first `threshold` failures all wait `base`. The multiplier is capped at
/// `multiplier_cap` and the result at `max`.
pub fn unhealthy_backoff(
    failures: u32,
    threshold: u32,
    base: Duration,
    max: Duration,
    multiplier_cap: u32,
) -> Duration {
    let exponent = failures.saturating_sub(threshold);
    let multiplier = 2u32.checked_pow(exponent).unwrap_or(u32::MAX).min(multiplier_cap.max(1));

    base.saturating_mul(multiplier).min(max)
}
