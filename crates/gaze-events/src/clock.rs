//! Millisecond clocks

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Monotonic milliseconds since the experiment epoch.
pub trait Clock {
    fn now_ms(&self) -> f64;

    /// Let `ms` milliseconds pass.
    fn pause(&self, ms: f64);
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now_ms(&self) -> f64 {
        (**self).now_ms()
    }

    fn pause(&self, ms: f64) {
        (**self).pause(ms)
    }
}

impl<C: Clock + ?Sized> Clock for Box<C> {
    fn now_ms(&self) -> f64 {
        (**self).now_ms()
    }

    fn pause(&self, ms: f64) {
        (**self).pause(ms)
    }
}

/// Wall clock measured from the moment the experiment started.
#[derive(Debug, Clone, Copy)]
pub struct ExperimentClock {
    epoch: Instant,
}

impl ExperimentClock {
    pub fn start() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }
}

impl Default for ExperimentClock {
    fn default() -> Self {
        Self::start()
    }
}

impl Clock for ExperimentClock {
    fn now_ms(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64() * 1000.0
    }

    /// Blocks the calling thread.
    fn pause(&self, ms: f64) {
        if ms > 0.0 {
            std::thread::sleep(Duration::from_secs_f64(ms / 1000.0));
        }
    }
}

/// Manually advanced clock. Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct SimClock {
    bits: Arc<AtomicU64>,
}

impl SimClock {
    pub fn new(start_ms: f64) -> Self {
        Self {
            bits: Arc::new(AtomicU64::new(start_ms.to_bits())),
        }
    }

    pub fn set(&self, ms: f64) {
        self.bits.store(ms.to_bits(), Ordering::SeqCst);
    }

    /// Advance by `ms` and return the new time.
    pub fn advance(&self, ms: f64) -> f64 {
        let now = self.now_ms() + ms;
        self.set(now);
        now
    }
}

impl Clock for SimClock {
    fn now_ms(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::SeqCst))
    }

    fn pause(&self, ms: f64) {
        if ms > 0.0 {
            self.advance(ms);
        }
    }
}
