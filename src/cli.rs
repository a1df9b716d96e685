use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List network interfaces (loopback excluded)
    Interfaces {
        /// Show counters and link state
        #[arg(long)]
        verbose: bool,
        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// Sample an interface's throughput
    Monitor(Monitor),
}

#[derive(Parser, Clone, Debug)]
pub struct Monitor {
    /// Interface to monitor (auto-select the first one with traffic if omitted)
    #[arg(short, long)]
    pub interface: Option<String>,

    /// Total monitoring time in seconds
    #[arg(short, long, default_value_t = 30.0)]
    pub duration: f64,

    /// Seconds between counter polls
    #[arg(short = 't', long, default_value_t = 1.0)]
    pub interval: f64,

    /// Keep monitoring even if the link reports down
    #[arg(short, long)]
    pub force: bool,

    /// Divide by the measured time between polls instead of the nominal interval
    #[arg(long)]
    pub measured: bool,

    /// Ring the terminal bell on warnings
    #[arg(long)]
    pub bell: bool,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    /// One line per sample as it arrives
    Text,
    /// A single JSON report at the end
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn monitor_defaults() {
        let cli = Cli::try_parse_from(["ifrate", "monitor"]).unwrap();
        match cli.command {
            Some(Commands::Monitor(m)) => {
                assert_eq!(m.interface, None);
                assert_eq!(m.duration, 30.0);
                assert_eq!(m.interval, 1.0);
                assert!(!m.force);
                assert_eq!(m.format, OutputFormat::Text);
            }
            _ => panic!("expected monitor"),
        }
    }

    #[test]
    fn monitor_short_flags() {
        let cli = Cli::try_parse_from(["ifrate", "monitor", "-i", "eth0", "-d", "5", "-t", "0.5", "-f", "--format", "json"])
            .unwrap();
        match cli.command {
            Some(Commands::Monitor(m)) => {
                assert_eq!(m.interface.as_deref(), Some("eth0"));
                assert_eq!(m.duration, 5.0);
                assert_eq!(m.interval, 0.5);
                assert!(m.force);
                assert_eq!(m.format, OutputFormat::Json);
            }
            _ => panic!("expected monitor"),
        }
    }
}
