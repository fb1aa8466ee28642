//! Exponential backoff schedule.

use std::time::Duration;

/// Backoff after `failures` consecutive errors:
/// `min(initial · 2^(n−1), max)`.
#[must_use]
pub fn backoff_after(failures: u32, initial: Duration, max: Duration) -> Duration {
    if failures == 0 {
        return Duration::ZERO;
    }
    let exponent = failures.saturating_sub(1).min(31);
    initial
        .checked_mul(1_u32 << exponent)
        .map_or(max, |d| d.min(max))
}
