use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use crossbeam_channel::{self as channel, Receiver};
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::cli::{Monitor, OutputFormat};
use crate::host::NetStatsProvider;
use crate::metrics::{RateBasis, Sample};
use crate::pacer::{Pacer, SleepPacer};
use crate::sampler::{seconds, CounterSampler, Diagnostic, SessionConfig, StopReason};

#[derive(Debug, Error)]
pub enum SelectError {
    #[error("No active network interface found. Re-run with --interface <NAME> or see 'ifrate interfaces'.")]
    NoActiveInterface,
}

pub fn run_monitor(args: Monitor) -> Result<()> {
    let stop_flag = Arc::new(AtomicBool::new(false));
    {
        let stop = stop_flag.clone();
        let _ = ctrlc::set_handler(move || {
            stop.store(true, Ordering::Relaxed);
        });
    }

    let host = crate::host::system()?;
    let stdout = std::io::stdout();
    run_monitor_with(host, SleepPacer::start(), &args, stop_flag, &mut stdout.lock())
}

pub(crate) fn run_monitor_with<H, P, W>(
    host: H,
    pacer: P,
    args: &Monitor,
    stop_flag: Arc<AtomicBool>,
    out: &mut W,
) -> Result<()>
where
    H: NetStatsProvider,
    P: Pacer,
    W: Write,
{
    let (diag_tx, diag_rx) = channel::unbounded::<Diagnostic>();
    let sampler = CounterSampler::new(host)
        .with_stop_flag(stop_flag)
        .with_diagnostics(diag_tx);

    let interface = match &args.interface {
        Some(name) => name.clone(),
        None => match sampler.select_active_interface()? {
            Some(name) => {
                info!(interface = %name, "Interface is active");
                name
            }
            None => {
                alert("No active interface found", args.bell);
                return Err(SelectError::NoActiveInterface.into());
            }
        },
    };

    let basis = if args.measured { RateBasis::Measured } else { RateBasis::Nominal };
    let config = SessionConfig::new(
        interface,
        seconds(args.duration, "duration")?,
        seconds(args.interval, "interval")?,
    )
    .force_monitor(args.force)
    .rate_basis(basis);

    let mut session = match sampler.start(config, pacer) {
        Ok(session) => session,
        Err(e) => {
            drain_diagnostics(&diag_rx, args.bell);
            if !e.available().is_empty() {
                info!(available = ?e.available(), "Available interfaces");
            }
            return Err(e).context("Starting monitoring session");
        }
    };

    if args.format == OutputFormat::Text {
        let cfg = session.config();
        writeln!(
            out,
            "# {} every {:?} for {:?} (Mbit/s)",
            cfg.interface, cfg.interval, cfg.duration
        )?;
        writeln!(out, "{:>8}  {:>12}  {:>12}  {:>12}", "time", "sent", "received", "total")?;
    }
    for sample in session.by_ref() {
        drain_diagnostics(&diag_rx, args.bell);
        if args.format == OutputFormat::Text {
            write_sample(out, &sample)?;
        }
    }
    if args.format == OutputFormat::Text {
        if let Some(reason) = session.stop_reason() {
            writeln!(out, "# stopped: {}", reason.label())?;
        }
    }

    let report = session.finish();
    drain_diagnostics(&diag_rx, args.bell);
    if report.samples.is_empty() {
        alert("No traffic data captured", args.bell);
    }

    if args.format == OutputFormat::Json {
        let error = match &report.stop {
            StopReason::Failed(e) => Some(e.to_string()),
            _ => None,
        };
        let doc = ReportOut {
            interface: &report.interface,
            stop: report.stop.label(),
            error,
            samples: &report.samples,
        };
        serde_json::to_writer_pretty(&mut *out, &doc).context("Writing JSON report")?;
        writeln!(out)?;
    }
    out.flush()?;

    match report.stop {
        StopReason::Failed(e) => Err(e).context(format!("Monitoring {}", report.interface)),
        _ => Ok(()),
    }
}

#[derive(Serialize)]
struct ReportOut<'a> {
    interface: &'a str,
    stop: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    samples: &'a [Sample],
}

fn write_sample<W: Write>(out: &mut W, s: &Sample) -> std::io::Result<()> {
    writeln!(
        out,
        "{:>7.1}s  {:>12.6}  {:>12.6}  {:>12.6}",
        s.elapsed_seconds, s.sent_rate_mbps, s.received_rate_mbps, s.total_rate_mbps
    )
}

fn drain_diagnostics(rx: &Receiver<Diagnostic>, bell: bool) {
    for event in rx.try_iter() {
        match event {
            Diagnostic::Started { interface } => info!(%interface, "Monitoring interface"),
            Diagnostic::Finished { interface, samples } => info!(%interface, samples, "Monitoring complete"),
            Diagnostic::Rejected { reason } => alert(&reason, bell),
            Diagnostic::LinkDown { interface } => {
                alert(&format!("Connection on interface '{interface}' went down"), bell)
            }
            Diagnostic::Vanished { interface, available } => {
                alert(&format!("Lost status for interface '{interface}'"), bell);
                info!(available = ?available, "Available interfaces");
            }
            Diagnostic::CountersUnavailable { interface } => {
                alert(&format!("Counters for interface '{interface}' are no longer available"), bell)
            }
            Diagnostic::Failed { interface, reason } => {
                alert(&format!("Monitoring of '{interface}' failed: {reason}"), bell)
            }
            Diagnostic::Cancelled { interface, samples } => {
                alert(&format!("Monitoring of '{interface}' interrupted after {samples} samples"), bell)
            }
        }
    }
}

fn alert(message: &str, bell: bool) {
    warn!("{message}");
    if bell {
        eprint!("\x07");
    }
}
