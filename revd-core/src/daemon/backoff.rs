//! Exponential backoff for failed poll cycles

use std::time::Duration;

/// Doubling delay with a ceiling, reset on success
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Backoff {
    base: Duration,
    ceiling: Duration,
    current: Duration,
}

impl Backoff {
    pub const DEFAULT_BASE: Duration = Duration::from_secs(30);
    pub const DEFAULT_CEILING: Duration = Duration::from_secs(300);

    pub fn new(base: Duration, ceiling: Duration) -> Self {
        Self {
            base,
            ceiling,
            current: base,
        }
    }

    /// Delay to wait after a failure; doubles the following one
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = self.current.saturating_mul(2).min(self.ceiling);
        delay
    }

    /// Back to the base delay after a successful cycle
    pub fn reset(&mut self) {
        self.current = self.base;
    }

    /// Delay the next failure would wait
    pub fn current(&self) -> Duration {
        self.current
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(Self::DEFAULT_BASE, Self::DEFAULT_CEILING)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(delays: &[Duration]) -> Vec<u64> {
        delays.iter().map(|d| d.as_secs()).collect()
    }

    #[test]
    fn test_doubles_up_to_ceiling() {
        let mut backoff = Backoff::default();
        let delays: Vec<Duration> = (0..8).map(|_| backoff.next_delay()).collect();
        assert_eq!(secs(&delays), vec![30, 60, 120, 240, 300, 300, 300, 300]);
    }

    #[test]
    fn test_reset_returns_to_base() {
        let mut backoff = Backoff::default();
        backoff.next_delay();
        backoff.next_delay();
        assert_eq!(backoff.current(), Duration::from_secs(120));

        backoff.reset();
        assert_eq!(backoff.next_delay(), Duration::from_secs(30));
        assert_eq!(backoff.next_delay(), Duration::from_secs(60));
    }

    #[test]
    fn test_custom_bounds() {
        let mut backoff = Backoff::new(Duration::from_secs(1), Duration::from_secs(5));
        let delays: Vec<Duration> = (0..5).map(|_| backoff.next_delay()).collect();
        assert_eq!(secs(&delays), vec![1, 2, 4, 5, 5]);
    }
}
