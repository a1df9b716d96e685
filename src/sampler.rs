//! Interface throughput sampling.
//!
//! A [`CounterSampler`] validates a [`SessionConfig`] against the host and
//! hands back a [`Session`]: an iterator that polls the interface's cumulative
//! byte counters once per tick and yields one [`Sample`] per tick. Iteration
//! stops when the duration elapses, the link drops, the stop flag is raised, or
//! a host query fails; [`Session::finish`] then reports why, alongside every
//! sample seen so far.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::Sender;
use tracing::{debug, info};

use crate::error::SamplerError;
use crate::host::{self, NetStatsProvider};
use crate::metrics::{InterfaceSnapshot, RateBasis, Sample};
use crate::pacer::{Pacer, Wake};

#[derive(Clone, Debug, PartialEq)]
pub struct SessionConfig {
    pub interface: String,
    pub duration: Duration,
    pub interval: Duration,
    pub force_monitor: bool,
    pub rate_basis: RateBasis,
}

impl SessionConfig {
    pub fn new(interface: impl Into<String>, duration: Duration, interval: Duration) -> Self {
        Self {
            interface: interface.into(),
            duration,
            interval,
            force_monitor: false,
            rate_basis: RateBasis::Nominal,
        }
    }

    /// Keep sampling while the link reports down.
    pub fn force_monitor(mut self, force: bool) -> Self {
        self.force_monitor = force;
        self
    }

    pub fn rate_basis(mut self, basis: RateBasis) -> Self {
        self.rate_basis = basis;
        self
    }

    fn validate(&self) -> Result<(), SamplerError> {
        if self.interval.is_zero() {
            return Err(SamplerError::InvalidConfig("interval must be greater than zero".into()));
        }
        Ok(())
    }
}

/// Convert a user-supplied number of seconds into a `Duration`.
pub fn seconds(value: f64, what: &str) -> Result<Duration, SamplerError> {
    if !value.is_finite() || value < 0.0 {
        return Err(SamplerError::InvalidConfig(format!(
            "{what} must be a non-negative number of seconds, got {value}"
        )));
    }
    Duration::try_from_secs_f64(value)
        .map_err(|e| SamplerError::InvalidConfig(format!("{what} of {value}s: {e}")))
}

/// Events a caller may surface to the user. The sampler never prints.
#[derive(Clone, Debug, PartialEq)]
pub enum Diagnostic {
    Started { interface: String },
    Rejected { reason: String },
    LinkDown { interface: String },
    Vanished { interface: String, available: Vec<String> },
    CountersUnavailable { interface: String },
    /// A host query failed after sampling began.
    Failed { interface: String, reason: String },
    Cancelled { interface: String, samples: usize },
    Finished { interface: String, samples: usize },
}

#[derive(Debug)]
pub enum StopReason {
    /// The configured duration elapsed.
    Completed,
    /// The link went down and monitoring was not forced.
    LinkDown,
    /// The stop flag was raised.
    Cancelled,
    Failed(SamplerError),
}

impl StopReason {
    pub fn label(&self) -> &'static str {
        match self {
            StopReason::Completed => "completed",
            StopReason::LinkDown => "link-down",
            StopReason::Cancelled => "cancelled",
            StopReason::Failed(_) => "failed",
        }
    }
}

#[derive(Debug)]
pub struct SessionReport {
    pub interface: String,
    pub samples: Vec<Sample>,
    pub stop: StopReason,
}

pub struct CounterSampler<H> {
    host: H,
    stop: Arc<AtomicBool>,
    diagnostics: Option<Sender<Diagnostic>>,
}

impl<H: NetStatsProvider> CounterSampler<H> {
    pub fn new(host: H) -> Self {
        Self {
            host,
            stop: Arc::new(AtomicBool::new(false)),
            diagnostics: None,
        }
    }

    pub fn with_stop_flag(mut self, stop: Arc<AtomicBool>) -> Self {
        self.stop = stop;
        self
    }

    pub fn with_diagnostics(mut self, tx: Sender<Diagnostic>) -> Self {
        self.diagnostics = Some(tx);
        self
    }

    pub fn select_active_interface(&self) -> Result<Option<String>, SamplerError> {
        Ok(host::select_active_interface(&self.host)?)
    }

    /// Validate `config`, take the initial snapshot and return the running
    /// session. `pacer` should be freshly started: its clock is the session
    /// clock.
    pub fn start<P: Pacer>(self, config: SessionConfig, pacer: P) -> Result<Session<H, P>, SamplerError> {
        match self.prepare(&config, &pacer) {
            Ok(previous) => {
                info!(interface = %config.interface, ?config.duration, ?config.interval, "Monitoring started");
                emit(&self.diagnostics, Diagnostic::Started { interface: config.interface.clone() });
                Ok(Session {
                    host: self.host,
                    pacer,
                    stop: self.stop,
                    diagnostics: self.diagnostics,
                    config,
                    previous,
                    samples: Vec::new(),
                    ticked: false,
                    stopped: None,
                })
            }
            Err(e) => {
                emit(&self.diagnostics, Diagnostic::Rejected { reason: e.to_string() });
                Err(e)
            }
        }
    }

    fn prepare<P: Pacer>(&self, config: &SessionConfig, pacer: &P) -> Result<InterfaceSnapshot, SamplerError> {
        config.validate()?;
        let name = &config.interface;
        if !self.host.interface_names()?.iter().any(|n| n == name) {
            return Err(SamplerError::InterfaceNotFound {
                name: name.clone(),
                available: host::list_interfaces(&self.host).unwrap_or_default(),
            });
        }
        let counters = self
            .host
            .counters(name)
            .ok()
            .flatten()
            .ok_or_else(|| SamplerError::CountersUnavailable { name: name.clone() })?;
        Ok(InterfaceSnapshot {
            bytes_sent: counters.sent,
            bytes_received: counters.received,
            is_up: self.host.link_up(name).ok().flatten().unwrap_or(false),
            taken_at: pacer.elapsed(),
        })
    }
}

/// A running sampling session. Yields one [`Sample`] per tick.
pub struct Session<H, P> {
    host: H,
    pacer: P,
    stop: Arc<AtomicBool>,
    diagnostics: Option<Sender<Diagnostic>>,
    config: SessionConfig,
    previous: InterfaceSnapshot,
    samples: Vec<Sample>,
    ticked: bool,
    stopped: Option<StopReason>,
}

impl<H: NetStatsProvider, P: Pacer> Session<H, P> {
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Why iteration ended, once it has.
    pub fn stop_reason(&self) -> Option<&StopReason> {
        self.stopped.as_ref()
    }

    /// Run the session to its end and collect everything it produced.
    pub fn finish(mut self) -> SessionReport {
        while self.next().is_some() {}
        let stop = self.stopped.take().unwrap_or(StopReason::Completed);
        SessionReport {
            interface: self.config.interface,
            samples: self.samples,
            stop,
        }
    }

    fn tick(&mut self, elapsed: Duration) -> Result<Option<Sample>, SamplerError> {
        let name = &self.config.interface;
        let is_up = match self.host.link_up(name)? {
            Some(up) => up,
            None => {
                return Err(SamplerError::InterfaceVanished {
                    name: name.clone(),
                    available: host::list_interfaces(&self.host).unwrap_or_default(),
                })
            }
        };
        if !is_up && !self.config.force_monitor {
            return Ok(None);
        }

        let counters = self
            .host
            .counters(name)
            .ok()
            .flatten()
            .ok_or_else(|| SamplerError::CountersUnavailable { name: name.clone() })?;
        let current = InterfaceSnapshot {
            bytes_sent: counters.sent,
            bytes_received: counters.received,
            is_up,
            taken_at: elapsed,
        };
        debug!(
            interface = %name,
            sent = current.bytes_sent,
            received = current.bytes_received,
            up = current.is_up,
            "Counters"
        );
        // The initial snapshot was not taken on a tick boundary, so its gap to
        // the first tick says nothing about the interval.
        let basis = if self.samples.is_empty() { RateBasis::Nominal } else { self.config.rate_basis };
        let sample = Sample::between(&self.previous, &current, elapsed, self.config.interval, basis);
        debug!(
            interface = %name,
            sent_mbps = sample.sent_rate_mbps,
            received_mbps = sample.received_rate_mbps,
            total_mbps = sample.total_rate_mbps,
            "Bandwidth"
        );
        self.previous = current;
        Ok(Some(sample))
    }

    fn end(&mut self, reason: StopReason) {
        let interface = self.config.interface.clone();
        let samples = self.samples.len();
        let event = match &reason {
            StopReason::Completed => Diagnostic::Finished { interface, samples },
            StopReason::LinkDown => Diagnostic::LinkDown { interface },
            StopReason::Cancelled => Diagnostic::Cancelled { interface, samples },
            StopReason::Failed(SamplerError::InterfaceVanished { available, .. }) => Diagnostic::Vanished {
                interface,
                available: available.clone(),
            },
            StopReason::Failed(SamplerError::CountersUnavailable { .. }) => {
                Diagnostic::CountersUnavailable { interface }
            }
            StopReason::Failed(e) => Diagnostic::Failed { interface, reason: e.to_string() },
        };
        info!(interface = %self.config.interface, samples, reason = reason.label(), "Monitoring ended");
        emit(&self.diagnostics, event);
        self.stopped = Some(reason);
    }
}

impl<H: NetStatsProvider, P: Pacer> Iterator for Session<H, P> {
    type Item = Sample;

    fn next(&mut self) -> Option<Sample> {
        if self.stopped.is_some() {
            return None;
        }
        if self.stop.load(Ordering::Relaxed) {
            self.end(StopReason::Cancelled);
            return None;
        }
        if self.ticked && self.pacer.suspend(self.config.interval, &self.stop) == Wake::Cancelled {
            self.end(StopReason::Cancelled);
            return None;
        }

        // A duration shorter than one interval holds no complete tick.
        let elapsed = self.pacer.elapsed();
        if elapsed >= self.config.duration || self.config.duration < self.config.interval {
            self.end(StopReason::Completed);
            return None;
        }
        self.ticked = true;

        match self.tick(elapsed) {
            Ok(Some(sample)) => {
                self.samples.push(sample);
                Some(sample)
            }
            Ok(None) => {
                self.end(StopReason::LinkDown);
                None
            }
            Err(e) => {
                self.end(StopReason::Failed(e));
                None
            }
        }
    }
}

fn emit(tx: &Option<Sender<Diagnostic>>, event: Diagnostic) {
    if let Some(tx) = tx {
        let _ = tx.send(event);
    }
}
