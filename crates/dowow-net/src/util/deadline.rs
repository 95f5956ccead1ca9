use std::time::{Duration, Instant};

/// Single-shot, reset-able countdown timer. Becomes ready once `Instant::now()`
/// reaches the deadline; `reset` re-arms it `interval` out from now.
#[derive(Debug, Clone)]
pub struct Deadline {
    interval: Duration,
    at: Instant,
}

impl Deadline {
    pub fn new(interval: Duration) -> Self {
        Self { interval, at: Instant::now() + interval }
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.at
    }

    pub fn reset(&mut self) {
        self.at = Instant::now() + self.interval;
    }

    pub fn set_interval(&mut self, interval: Duration) {
        self.interval = interval;
        self.reset();
    }

    /// Time left until expiry, `Duration::ZERO` if already expired. Callers
    /// use this to compute the `Poll::poll` timeout that covers both the
    /// local and peer liveness deadlines without busy-waiting.
    pub fn remaining(&self) -> Duration {
        self.at.saturating_duration_since(Instant::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_expired_immediately_after_creation() {
        let d = Deadline::new(Duration::from_millis(50));
        assert!(!d.is_expired());
        assert!(d.remaining() > Duration::ZERO);
    }

    #[test]
    fn expires_after_interval() {
        let d = Deadline::new(Duration::from_millis(1));
        std::thread::sleep(Duration::from_millis(5));
        assert!(d.is_expired());
        assert_eq!(d.remaining(), Duration::ZERO);
    }

    #[test]
    fn reset_pushes_deadline_forward() {
        let mut d = Deadline::new(Duration::from_millis(1));
        std::thread::sleep(Duration::from_millis(5));
        assert!(d.is_expired());
        d.reset();
        assert!(!d.is_expired());
    }
}
