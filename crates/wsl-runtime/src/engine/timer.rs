use std::fmt::Debug;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

pub trait Clock: Send + Sync + Debug {
    fn now(&self) -> Instant;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    base: Instant,
    offset: Mutex<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            base: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
        }
    }

    pub fn advance(&self, by: Duration) {
        *self.offset.lock() += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.base + *self.offset.lock()
    }
}

/// Stopwatch bound to a special variable. Stopped time accumulates.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScriptTimer {
    started_at: Option<Instant>,
    accumulated: Duration,
}

impl ScriptTimer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self) -> bool {
        self.started_at.is_some()
    }

    pub fn start(&mut self, now: Instant) {
        if self.started_at.is_none() {
            self.started_at = Some(now);
        }
    }

    pub fn stop(&mut self, now: Instant) {
        if let Some(started_at) = self.started_at.take() {
            self.accumulated += now.saturating_duration_since(started_at);
        }
    }

    pub fn clear(&mut self) {
        self.started_at = None;
        self.accumulated = Duration::ZERO;
    }

    pub fn elapsed(&self, now: Instant) -> Duration {
        match self.started_at {
            Some(started_at) => self.accumulated + now.saturating_duration_since(started_at),
            None => self.accumulated,
        }
    }

    /// Whole elapsed seconds.
    pub fn seconds(&self, now: Instant) -> f64 {
        self.elapsed(now).as_secs() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn running_timer_reports_elapsed_seconds() {
        let clock = ManualClock::new();
        let mut timer = ScriptTimer::new();
        timer.start(clock.now());
        clock.advance(Duration::from_millis(3_400));
        assert_eq!(timer.seconds(clock.now()), 3.0);
    }

    #[test]
    fn stopped_timer_freezes_and_resumes_accumulating() {
        let clock = ManualClock::new();
        let mut timer = ScriptTimer::new();
        timer.start(clock.now());
        clock.advance(Duration::from_secs(3));
        timer.stop(clock.now());
        clock.advance(Duration::from_secs(10));
        assert_eq!(timer.seconds(clock.now()), 3.0);

        timer.start(clock.now());
        clock.advance(Duration::from_secs(2));
        assert_eq!(timer.seconds(clock.now()), 5.0);
    }

    #[test]
    fn clear_resets_and_start_twice_keeps_origin() {
        let clock = ManualClock::new();
        let mut timer = ScriptTimer::new();
        timer.start(clock.now());
        clock.advance(Duration::from_secs(4));
        timer.start(clock.now());
        assert_eq!(timer.seconds(clock.now()), 4.0);
        timer.clear();
        assert!(!timer.is_running());
        assert_eq!(timer.seconds(clock.now()), 0.0);
    }
}
