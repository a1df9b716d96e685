// Test doubles for the host statistics provider and the session clock.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::host::{ByteCounters, NetStatsProvider};
use crate::pacer::{Pacer, Wake};

struct FakeIface {
    name: String,
    base: ByteCounters,
    step: ByteCounters,
    reads: Cell<u64>,
    reset_at: Option<u64>,
    fail_from: Option<u64>,
    link: RefCell<VecDeque<Option<bool>>>,
    link_calls: Cell<u64>,
    link_fail_from: Option<u64>,
}

impl FakeIface {
    // Value on the k-th counter read: base + k * step, restarting from zero
    // once a reset is scheduled.
    fn read(&self) -> Option<ByteCounters> {
        let k = self.reads.get();
        self.reads.set(k + 1);
        if self.fail_from.map_or(false, |n| k >= n) {
            return None;
        }
        let (base, k) = match self.reset_at {
            Some(r) if k >= r => (ByteCounters::default(), k - r),
            _ => (self.base, k),
        };
        Some(ByteCounters {
            sent: base.sent + self.step.sent * k,
            received: base.received + self.step.received * k,
        })
    }

    fn link(&self) -> io::Result<Option<bool>> {
        let k = self.link_calls.get();
        self.link_calls.set(k + 1);
        if self.link_fail_from.map_or(false, |n| k >= n) {
            return Err(io::Error::new(io::ErrorKind::PermissionDenied, "status table unreadable"));
        }
        Ok(self.scripted_link())
    }

    fn scripted_link(&self) -> Option<bool> {
        let mut script = self.link.borrow_mut();
        if script.len() > 1 {
            script.pop_front().unwrap_or(Some(true))
        } else {
            script.front().copied().unwrap_or(Some(true))
        }
    }
}

/// Host whose counters and link states follow a script.
///
/// Link scripts are consumed one entry per `link_up` call (the session's
/// initial snapshot included); the last entry repeats.
#[derive(Default)]
pub struct ScriptedHost {
    ifaces: Vec<FakeIface>,
    names_fail: bool,
}

impl ScriptedHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn iface(self, name: &str, sent: u64, received: u64) -> Self {
        self.push(name, ByteCounters { sent, received }, ByteCounters::default())
    }

    /// Counters start at zero and grow by the given step on every read.
    pub fn growing(self, name: &str, sent_step: u64, received_step: u64) -> Self {
        self.push(
            name,
            ByteCounters::default(),
            ByteCounters { sent: sent_step, received: received_step },
        )
    }

    pub fn link_script(mut self, name: &str, script: Vec<Option<bool>>) -> Self {
        self.find_mut(name).link = RefCell::new(script.into());
        self
    }

    pub fn reset_at(mut self, name: &str, read: u64) -> Self {
        self.find_mut(name).reset_at = Some(read);
        self
    }

    pub fn counters_fail_from(mut self, name: &str, read: u64) -> Self {
        self.find_mut(name).fail_from = Some(read);
        self
    }

    /// Status queries for `name` fail with an I/O error from the given call on.
    pub fn status_fails_from(mut self, name: &str, call: u64) -> Self {
        self.find_mut(name).link_fail_from = Some(call);
        self
    }

    pub fn unreadable(mut self) -> Self {
        self.names_fail = true;
        self
    }

    fn push(mut self, name: &str, base: ByteCounters, step: ByteCounters) -> Self {
        self.ifaces.push(FakeIface {
            name: name.to_string(),
            base,
            step,
            reads: Cell::new(0),
            reset_at: None,
            fail_from: None,
            link: RefCell::new(VecDeque::new()),
            link_calls: Cell::new(0),
            link_fail_from: None,
        });
        self
    }

    fn find(&self, name: &str) -> Option<&FakeIface> {
        self.ifaces.iter().find(|i| i.name == name)
    }

    fn find_mut(&mut self, name: &str) -> &mut FakeIface {
        self.ifaces
            .iter_mut()
            .find(|i| i.name == name)
            .expect("scripted interface must be declared first")
    }
}

impl NetStatsProvider for ScriptedHost {
    fn interface_names(&self) -> io::Result<Vec<String>> {
        if self.names_fail {
            return Err(io::Error::new(io::ErrorKind::PermissionDenied, "statistics unreadable"));
        }
        Ok(self.ifaces.iter().map(|i| i.name.clone()).collect())
    }

    fn counters(&self, name: &str) -> io::Result<Option<ByteCounters>> {
        Ok(self.find(name).and_then(FakeIface::read))
    }

    fn link_up(&self, name: &str) -> io::Result<Option<bool>> {
        match self.find(name) {
            Some(iface) => iface.link(),
            None => Ok(None),
        }
    }
}

/// Virtual clock: every suspension advances time by the period plus drift,
/// and every reading of the clock advances it by `creep`.
#[derive(Default)]
pub struct ManualPacer {
    now: Cell<Duration>,
    creep: Duration,
    drift: Duration,
    suspends: usize,
    interrupt_on: Option<usize>,
}

impl ManualPacer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_drift(mut self, drift: Duration) -> Self {
        self.drift = drift;
        self
    }

    pub fn with_creep(mut self, creep: Duration) -> Self {
        self.creep = creep;
        self
    }

    /// Raise the stop flag during the n-th suspension (1-based), as an
    /// interrupt arriving mid-sleep would.
    pub fn interrupt_on(mut self, nth: usize) -> Self {
        self.interrupt_on = Some(nth);
        self
    }
}

impl Pacer for ManualPacer {
    fn elapsed(&self) -> Duration {
        let now = self.now.get();
        self.now.set(now + self.creep);
        now
    }

    fn suspend(&mut self, period: Duration, stop: &AtomicBool) -> Wake {
        self.suspends += 1;
        if self.interrupt_on == Some(self.suspends) {
            stop.store(true, Ordering::Relaxed);
        }
        if stop.load(Ordering::Relaxed) {
            return Wake::Cancelled;
        }
        self.now.set(self.now.get() + period + self.drift);
        Wake::Elapsed
    }
}
