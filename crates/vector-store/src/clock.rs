use std::sync::{Arc, Mutex};

use jiff::Timestamp;

/// Injected time source so expiration (§S5) is deterministic under test: advancing a
/// [`FixedClock`] simulates the passage of time without an actual sleep.
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp::now()
    }
}

pub struct FixedClock(Mutex<Timestamp>);

impl FixedClock {
    pub fn new(start: Timestamp) -> Arc<Self> {
        Arc::new(Self(Mutex::new(start)))
    }

    pub fn advance(&self, duration: jiff::Span) {
        let mut guard = self.0.lock().expect("clock lock poisoned");
        *guard = guard.checked_add(duration).expect("clock overflow");
    }
}

impl Clock for FixedClock {
    fn now(&self) -> Timestamp {
        *self.0.lock().expect("clock lock poisoned")
    }
}
