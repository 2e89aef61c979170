//! Lightweight jitter for retry backoff
//!
//! Uses the system clock as a pseudo-random source so no RNG crate is needed.

use std::time::{SystemTime, UNIX_EPOCH};

/// Pseudo-random value in `0..=max_jitter_ms`
///
/// # Examples
/// ```
/// use hls_monitor::utils::jitter::generate_jitter_ms;
///
/// let jitter = generate_jitter_ms(100);
/// assert!(jitter <= 100);
/// ```
pub fn generate_jitter_ms(max_jitter_ms: u64) -> u64 {
    if max_jitter_ms == 0 {
        return 0;
    }

    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_nanos())
        .unwrap_or_default();

    (nanos % (max_jitter_ms as u128 + 1)) as u64
}

/// Pseudo-random value in `0..=base_value * jitter_percent / 100`
pub fn generate_jitter_percent(base_value: u64, jitter_percent: u8) -> u64 {
    if jitter_percent == 0 || base_value == 0 {
        return 0;
    }

    let max_jitter = base_value.saturating_mul(jitter_percent as u64) / 100;
    generate_jitter_ms(max_jitter)
}
