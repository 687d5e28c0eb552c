//! Fixed-point scale and conversions.
//!
//! Gains and internal accumulators are signed 64-bit integers holding
//! `value * SCALE`. Setpoints, measurements and outputs stay in plain caller
//! units.

use core::time::Duration;

use fixed::types::I48F16;

/// Fixed-point scale factor (2^16).
pub const SCALE: i64 = 1 << 16;

/// Stored gain type: the raw bits are `gain * SCALE`.
pub type Gain = I48F16;

const NANOS_PER_SEC: u128 = 1_000_000_000;

/// Convert a real gain to fixed point, truncating toward zero.
///
/// NaN maps to zero and out-of-range values saturate.
#[inline]
pub fn gain_from_f64(value: f64) -> Gain {
    Gain::from_bits((value * SCALE as f64) as i64)
}

/// Inverse of [`gain_from_f64`].
#[inline]
pub fn gain_to_f64(gain: Gain) -> f64 {
    gain.to_bits() as f64 / SCALE as f64
}

/// Elapsed time as fixed-point seconds: `trunc(seconds * SCALE)`.
///
/// Computed from the nanosecond count so the result does not depend on float
/// rounding. Intervals shorter than 1/65536 s yield zero.
pub fn duration_to_dt(elapsed: Duration) -> i64 {
    let dt = elapsed.as_nanos() * SCALE as u128 / NANOS_PER_SEC;
    i64::try_from(dt).unwrap_or(i64::MAX)
}

/// Scale an unscaled limit, saturating at the `i64` range.
#[inline]
pub fn scale_limit(value: i64) -> i64 {
    value.saturating_mul(SCALE)
}
