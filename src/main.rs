mod cli;
mod error;
mod host;
mod metrics;
#[cfg(test)]
mod mock;
mod monitor;
mod pacer;
mod sampler;

use std::io::Write;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands, OutputFormat};
use crate::error::SamplerError;
use crate::host::{list_interfaces, NetStatsProvider};
use crate::monitor::{run_monitor, SelectError};

fn print_interfaces(verbose: bool, format: OutputFormat) -> Result<()> {
    let host = host::system()?;
    let stdout = std::io::stdout();
    let listed = write_interfaces(&host, verbose, format, &mut stdout.lock())?;
    if listed == 0 && format == OutputFormat::Text {
        eprintln!("<no interfaces>");
        std::process::exit(2);
    }
    Ok(())
}

fn write_interfaces<H, W>(host: &H, verbose: bool, format: OutputFormat, out: &mut W) -> Result<usize>
where
    H: NetStatsProvider + ?Sized,
    W: Write,
{
    #[derive(serde::Serialize)]
    struct InterfaceOut {
        name: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        bytes_sent: Option<u64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        bytes_received: Option<u64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        up: Option<bool>,
    }

    let names = list_interfaces(host)?;
    let rows: Vec<InterfaceOut> = names
        .into_iter()
        .map(|name| {
            if !verbose {
                return InterfaceOut { name, bytes_sent: None, bytes_received: None, up: None };
            }
            let counters = host.counters(&name).ok().flatten();
            let up = host.link_up(&name).ok().flatten();
            InterfaceOut {
                bytes_sent: counters.map(|c| c.sent),
                bytes_received: counters.map(|c| c.received),
                up,
                name,
            }
        })
        .collect();

    match format {
        OutputFormat::Text => {
            for row in &rows {
                if verbose {
                    let state = match row.up {
                        Some(true) => "up",
                        Some(false) => "down",
                        None => "?",
                    };
                    writeln!(
                        out,
                        "{}\t{}\tsent {}\treceived {}",
                        row.name,
                        state,
                        row.bytes_sent.map_or_else(|| "-".to_string(), |v| v.to_string()),
                        row.bytes_received.map_or_else(|| "-".to_string(), |v| v.to_string()),
                    )?;
                } else {
                    writeln!(out, "{}", row.name)?;
                }
            }
        }
        OutputFormat::Json => {
            writeln!(out, "{}", serde_json::to_string_pretty(&rows)?)?;
        }
    }
    Ok(rows.len())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .try_init()
        .ok();

    let cli = Cli::parse();
    let result: Result<()> = match cli.command {
        Some(Commands::Interfaces { verbose, format }) => print_interfaces(verbose, format),
        Some(Commands::Monitor(args)) => run_monitor(args),
        None => {
            Cli::command().print_help().ok();
            println!();
            Ok(())
        }
    };

    if let Err(err) = result {
        // Map to stable exit codes
        let code = exit_code_for_error(&err);
        eprintln!("error: {err:?}");
        std::process::exit(code);
    }
}

pub(crate) fn exit_code_for_error(err: &anyhow::Error) -> i32 {
    // 2: no/unknown interface, 3: bad config, 4: host stats unreadable,
    // 5: interface lost mid-session, 1: other
    for cause in err.chain() {
        if cause.is::<SelectError>() {
            return 2;
        }
        if let Some(e) = cause.downcast_ref::<SamplerError>() {
            return match e {
                SamplerError::InterfaceNotFound { .. } => 2,
                SamplerError::InvalidConfig(_) => 3,
                SamplerError::HostQuery(_) => 4,
                SamplerError::InterfaceVanished { .. } | SamplerError::CountersUnavailable { .. } => 5,
            };
        }
        if cause.is::<std::io::Error>() {
            return 4;
        }
    }
    1
}
