use std::fmt::Debug;
use std::hint::spin_loop;
use std::thread::sleep;
use std::time::{Duration, Instant};

/// Blocks the calling context for a minimum amount of time.
///
/// All durations are lower bounds. Implementations may wait longer, but never shorter.
pub trait Delay: Debug {
    fn delay_ns(&self, ns: u64);

    fn delay_us(&self, us: u64) {
        self.delay_ns(us.saturating_mul(1_000));
    }

    fn delay_ms(&self, ms: u64) {
        self.delay_ns(ms.saturating_mul(1_000_000));
    }
}

/// [Delay] backed by the operating system.
///
/// Waits shorter than `spin_threshold` busy-spin on [Instant], as the scheduler cannot sleep
/// for less than a tick. Longer ones use [sleep].
#[derive(Copy, Clone, Debug)]
pub struct StdDelay {
    pub spin_threshold: Duration,
}

impl StdDelay {
    pub fn with_spin_threshold(mut self, spin_threshold: Duration) -> Self {
        self.spin_threshold = spin_threshold;
        self
    }
}

impl Default for StdDelay {
    fn default() -> Self {
        StdDelay {
            spin_threshold: Duration::from_micros(100),
        }
    }
}

impl Delay for StdDelay {
    fn delay_ns(&self, ns: u64) {
        let duration = Duration::from_nanos(ns);
        if duration >= self.spin_threshold {
            sleep(duration);
            return;
        }

        let start = Instant::now();
        while start.elapsed() < duration {
            spin_loop();
        }
    }
}
