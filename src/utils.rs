use rand::{Rng, rng};
use std::time::Duration;

/// Oldest and newest Chrome major versions the user agent may claim
pub const CHROME_VERSIONS: std::ops::RangeInclusive<u32> = 100..=115;

/// Pick a Chrome major version for the user agent
pub fn random_chrome_version() -> u32 {
    rng().random_range(CHROME_VERSIONS)
}

/// Desktop Chrome user agent for the given major version
pub fn chrome_user_agent(version: u32) -> String {
    format!(
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
         (KHTML, like Gecko) Chrome/{version}.0.0.0 Safari/537.36"
    )
}

/// Random delay between `min_ms` and `max_ms` inclusive
pub fn random_delay(min_ms: u64, max_ms: u64) -> Duration {
    if max_ms <= min_ms {
        return Duration::from_millis(min_ms);
    }
    Duration::from_millis(rng().random_range(min_ms..=max_ms))
}

/// Pause for a randomized delay; a zero delay returns without yielding a timer
pub async fn pause(delay: Duration) {
    if delay.is_zero() {
        return;
    }
    ::log::trace!("Pausing for {} ms", delay.as_millis());
    tokio::time::sleep(delay).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_delay_bounds() {
        for _ in 0..100 {
            let delay = random_delay(1_000, 3_000);
            assert!(delay >= Duration::from_millis(1_000));
            assert!(delay <= Duration::from_millis(3_000));
        }
    }

    #[test]
    fn test_degenerate_delay_range() {
        assert_eq!(random_delay(0, 0), Duration::ZERO);
        assert_eq!(random_delay(500, 500), Duration::from_millis(500));
    }

    #[test]
    fn test_chrome_user_agent() {
        let ua = chrome_user_agent(107);
        assert!(ua.starts_with("Mozilla/5.0 (Windows NT 10.0; Win64; x64)"));
        assert!(ua.contains("Chrome/107.0.0.0"));
        assert!(ua.ends_with("Safari/537.36"));
    }
}
