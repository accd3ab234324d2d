use std::time::Duration;

/// Exponential delay between retries of a failing device
#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    current: Option<Duration>,
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max: max.max(initial),
            current: None,
        }
    }

    /// Delay to wait before the next retry, doubling at every call up to the maximum
    pub fn next_delay(&mut self) -> Duration {
        let delay = match self.current {
            Some(current) => current.saturating_mul(2).min(self.max),
            None => self.initial,
        };

        self.current = Some(delay);
        delay
    }

    /// The device is working again
    pub fn reset(&mut self) {
        self.current = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_doubles_up_to_max() {
        let mut backoff = Backoff::new(Duration::from_millis(50), Duration::from_millis(300));

        let delays: Vec<_> = (0..6).map(|_| backoff.next_delay().as_millis()).collect();
        assert_eq!(vec![50, 100, 200, 300, 300, 300], delays);
    }

    #[test]
    fn test_unbounded_max_saturates() {
        let mut backoff = Backoff::new(Duration::from_secs(u64::MAX / 2), Duration::MAX);

        backoff.next_delay();
        assert_eq!(Duration::from_secs(u64::MAX - 1), backoff.next_delay());
        assert_eq!(Duration::MAX, backoff.next_delay());
    }

    #[test]
    fn test_reset_restarts_from_initial() {
        let mut backoff = Backoff::new(Duration::from_millis(10), Duration::from_secs(1));

        backoff.next_delay();
        backoff.next_delay();
        backoff.reset();

        assert_eq!(Duration::from_millis(10), backoff.next_delay());
    }
}
