use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

/// How a suspension ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Wake {
    Elapsed,
    Cancelled,
}

/// Session clock plus the "wait until the next tick" primitive.
pub trait Pacer {
    /// Time since the clock was started.
    fn elapsed(&self) -> Duration;

    /// Wait for `period`. Returns `Wake::Cancelled` as soon as `stop` is raised.
    fn suspend(&mut self, period: Duration, stop: &AtomicBool) -> Wake;
}

/// Thread-blocking pacer that checks the stop flag between short sleeps.
pub struct SleepPacer {
    origin: Instant,
    slice: Duration,
}

impl SleepPacer {
    pub fn start() -> Self {
        Self {
            origin: Instant::now(),
            slice: Duration::from_millis(50),
        }
    }
}

impl Pacer for SleepPacer {
    fn elapsed(&self) -> Duration {
        self.origin.elapsed()
    }

    fn suspend(&mut self, period: Duration, stop: &AtomicBool) -> Wake {
        // A period past the clock's range only ends on the stop flag.
        let deadline = Instant::now().checked_add(period);
        loop {
            if stop.load(Ordering::Relaxed) {
                return Wake::Cancelled;
            }
            let now = Instant::now();
            let pause = match deadline {
                Some(deadline) if now >= deadline => return Wake::Elapsed,
                Some(deadline) => (deadline - now).min(self.slice),
                None => self.slice,
            };
            thread::sleep(pause);
        }
    }
}
