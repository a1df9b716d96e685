use thiserror::Error;

/// Failures a sampling session can report.
///
/// A link going down is not a failure; it ends the session with
/// `StopReason::LinkDown`.
#[derive(Debug, Error)]
pub enum SamplerError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("interface '{name}' not found (available: {})", .available.join(", "))]
    InterfaceNotFound { name: String, available: Vec<String> },

    #[error("interface '{name}' disappeared during monitoring (available: {})", .available.join(", "))]
    InterfaceVanished { name: String, available: Vec<String> },

    #[error("byte counters for interface '{name}' are unavailable")]
    CountersUnavailable { name: String },

    #[error("reading host network statistics")]
    HostQuery(#[from] std::io::Error),
}

impl SamplerError {
    /// Names reported by the host when the error was raised, for diagnostics.
    pub fn available(&self) -> &[String] {
        match self {
            SamplerError::InterfaceNotFound { available, .. }
            | SamplerError::InterfaceVanished { available, .. } => available,
            _ => &[],
        }
    }
}
