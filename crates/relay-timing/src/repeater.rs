use std::time::{Duration, Instant};

/// Fires at most once per `interval`, used to pace liveness sampling and the
/// shutdown GC drain without a dedicated timer thread.
#[derive(Clone, Copy, Debug)]
pub struct Repeater {
    interval: Duration,
    last_acted: Instant,
}

impl Repeater {
    #[inline]
    pub fn every(interval: Duration) -> Self {
        Self { interval, last_acted: Instant::now() - interval }
    }

    /// Returns true at most once per `interval`; resets the clock when it does.
    #[inline]
    pub fn fired(&mut self) -> bool {
        if self.last_acted.elapsed() >= self.interval {
            self.last_acted = Instant::now();
            true
        } else {
            false
        }
    }

    pub fn force_fire(&mut self) {
        self.last_acted = Instant::now() - self.interval;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_immediately_then_waits() {
        let mut r = Repeater::every(Duration::from_millis(20));
        assert!(r.fired());
        assert!(!r.fired());
        std::thread::sleep(Duration::from_millis(25));
        assert!(r.fired());
    }
}
