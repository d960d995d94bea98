use std::time::{Duration, Instant};

/// A timer with no background machinery: it is polled, never fires on
/// its own. Easier to reason about than armed timers when many of them
/// are reset and stopped from one loop.
#[derive(Debug, Default)]
pub struct Timer {
    deadline: Option<Instant>,
    stopped: bool,
}

impl Timer {
    pub fn new() -> Timer {
        Timer {
            deadline: None,
            stopped: true,
        }
    }

    /// Arm the timer `duration` from now. Returns whether the timer was
    /// still pending.
    pub fn reset(&mut self, duration: Duration) -> bool {
        let was_pending = self.is_pending();
        self.stopped = false;
        self.deadline = Some(Instant::now() + duration);
        was_pending
    }

    /// Returns whether the timer was still pending.
    pub fn stop(&mut self) -> bool {
        let was_pending = self.is_pending();
        self.stopped = true;
        was_pending
    }

    pub fn timed_out(&self) -> bool {
        !self.stopped && self.deadline.map_or(false, |d| Instant::now() > d)
    }

    fn is_pending(&self) -> bool {
        !self.stopped && self.deadline.map_or(false, |d| Instant::now() < d)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    #[test]
    fn new_timer_has_not_timed_out() {
        let timer = Timer::new();
        assert!(!timer.timed_out());
    }

    #[test]
    fn times_out_after_deadline() {
        let mut timer = Timer::new();
        timer.reset(Duration::from_millis(5));
        assert!(!timer.timed_out());
        sleep(Duration::from_millis(10));
        assert!(timer.timed_out());
    }

    #[test]
    fn stop_suppresses_timeout() {
        let mut timer = Timer::new();
        timer.reset(Duration::from_millis(5));
        assert!(timer.stop());
        sleep(Duration::from_millis(10));
        assert!(!timer.timed_out());
        assert!(!timer.stop());
    }

    #[test]
    fn reset_reports_pending_state() {
        let mut timer = Timer::new();
        assert!(!timer.reset(Duration::from_millis(50)));
        assert!(timer.reset(Duration::from_millis(50)));
    }
}
