//! Delay calculation between retry attempts.

use std::time::Duration;

use rand::Rng;

use crate::{BackoffStrategy, RetryConfig};

/// Computes how long to wait before the `attempt`-th retry (1-based).
///
/// The result never exceeds `config.max_delay`. Jitter is drawn from `rng`,
/// so a seeded generator gives reproducible delays.
pub fn backoff_delay<R>(attempt: u32, config: &RetryConfig, rng: &mut R) -> Duration
where
    R: Rng + ?Sized,
{
    let initial = config.initial_delay.as_secs_f64();
    let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;

    let seconds = match config.strategy {
        BackoffStrategy::Constant => initial,
        BackoffStrategy::Exponential => initial * config.multiplier.powi(exponent),
        BackoffStrategy::ExponentialWithJitter => {
            let base = initial * config.multiplier.powi(exponent);
            base + rng.gen::<f64>() * base
        }
    };

    clamp(seconds, config.max_delay)
}

fn clamp(seconds: f64, max: Duration) -> Duration {
    if !seconds.is_finite() || seconds >= max.as_secs_f64() {
        return max;
    }
    Duration::from_secs_f64(seconds.max(0.0))
}
