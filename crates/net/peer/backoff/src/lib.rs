//! Jittered exponential backoff for peers that keep failing.
//!
//! The window after the `k`-th consecutive failure lasts `2^k` seconds scaled by a
//! random multiplier in `[MIN_JITTER, MAX_JITTER)`. The multiplier is drawn fresh on
//! every call so that peers failing in lockstep drift apart instead of retrying in waves.

use std::time::Duration;

use rand::Rng;

/// Lower bound (inclusive) of the jitter multiplier.
pub const MIN_JITTER: f64 = 0.8;

/// Upper bound (exclusive) of the jitter multiplier.
pub const MAX_JITTER: f64 = 1.4;

/// Draw a jitter multiplier uniformly from `[MIN_JITTER, MAX_JITTER)`.
pub fn jitter() -> f64 {
    rand::rng().random_range(MIN_JITTER..MAX_JITTER)
}

/// Backoff window for the given consecutive failure count, with fresh jitter.
pub fn backoff_duration(count: u32) -> Duration {
    backoff_duration_with_jitter(count, jitter())
}

/// Backoff window for `count` using a caller-supplied multiplier.
///
/// Millisecond resolution. Counts large enough to overflow saturate at `u64::MAX` ms.
pub fn backoff_duration_with_jitter(count: u32, jitter: f64) -> Duration {
    let secs = 2f64.powi(count.min(i32::MAX as u32) as i32);
    // f64 -> u64 casts saturate.
    Duration::from_millis((secs * jitter * 1000.0) as u64)
}

/// Range `[min, max)` that [`backoff_duration`] can return for `count`.
pub fn backoff_bounds(count: u32) -> (Duration, Duration) {
    (
        backoff_duration_with_jitter(count, MIN_JITTER),
        backoff_duration_with_jitter(count, MAX_JITTER),
    )
}
