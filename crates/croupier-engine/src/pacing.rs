//! Randomized pauses.

use std::time::Duration;

use rand::Rng;

use croupier_types::DelayRange;

/// Draw a duration uniformly from `range` (inclusive).
pub fn sample(range: &DelayRange) -> Duration {
    if range.min_ms >= range.max_ms {
        return Duration::from_millis(range.min_ms);
    }
    let ms = rand::rng().random_range(range.min_ms..=range.max_ms);
    Duration::from_millis(ms)
}

/// Sleep for a duration drawn from `range`. Zero ranges return immediately.
pub async fn pause(range: &DelayRange) {
    if range.is_zero() {
        return;
    }
    let delay = sample(range);
    tokio::time::sleep(delay).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_stays_in_range() {
        let range = DelayRange::between(350, 600);
        for _ in 0..500 {
            let d = sample(&range);
            assert!(d >= Duration::from_millis(350));
            assert!(d <= Duration::from_millis(600));
        }
    }

    #[test]
    fn fixed_range_is_exact() {
        assert_eq!(sample(&DelayRange::fixed(1000)), Duration::from_millis(1000));
    }

    #[tokio::test(start_paused = true)]
    async fn pause_sleeps_on_tokio_clock() {
        let start = tokio::time::Instant::now();
        pause(&DelayRange::fixed(750)).await;
        assert_eq!(start.elapsed(), Duration::from_millis(750));

        let start = tokio::time::Instant::now();
        pause(&DelayRange::fixed(0)).await;
        assert_eq!(start.elapsed(), Duration::ZERO);
    }
}
