use std::sync::atomic::{AtomicI64, Ordering};

use crate::model::Ms;

/// Source of wall-clock time. Readings never go backwards.
pub trait Clock: Send + Sync {
    fn now(&self) -> Ms;
}

/// System time in Unix milliseconds, clamped so a backwards step of the
/// system clock repeats the last reading instead of rewinding.
#[derive(Debug, Default)]
pub struct SystemClock {
    last: AtomicI64,
}

impl SystemClock {
    pub fn new() -> Self {
        Self::default()
    }
}

pub fn system_now_ms() -> Ms {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as Ms)
        .unwrap_or(0)
}

impl Clock for SystemClock {
    fn now(&self) -> Ms {
        let observed = system_now_ms();
        let prev = self.last.fetch_max(observed, Ordering::AcqRel);
        prev.max(observed)
    }
}

/// Settable clock for tests and replays.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    pub fn new(start: Ms) -> Self {
        Self {
            now: AtomicI64::new(start),
        }
    }

    /// Move the clock to `t`. Earlier values are ignored.
    pub fn set(&self, t: Ms) {
        self.now.fetch_max(t, Ordering::AcqRel);
    }

    pub fn advance(&self, by: Ms) {
        self.now.fetch_add(by.max(0), Ordering::AcqRel);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Ms {
        self.now.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_clock_is_non_decreasing() {
        let clock = SystemClock::new();
        let mut prev = clock.now();
        for _ in 0..1000 {
            let t = clock.now();
            assert!(t >= prev);
            prev = t;
        }
        assert!(prev > 1_600_000_000_000);
    }

    #[test]
    fn manual_clock_never_rewinds() {
        let clock = ManualClock::new(1_000);
        clock.set(500);
        assert_eq!(clock.now(), 1_000);
        clock.set(2_000);
        assert_eq!(clock.now(), 2_000);
        clock.advance(250);
        assert_eq!(clock.now(), 2_250);
        clock.advance(-100);
        assert_eq!(clock.now(), 2_250);
    }
}
