use std::time::Duration;

use serde::Serialize;

const BITS_PER_BYTE: f64 = 8.0;
const BITS_PER_MEGABIT: f64 = 1_048_576.0;

/// Which time span divides a counter delta.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RateBasis {
    /// The configured tick interval, regardless of scheduling jitter.
    #[default]
    Nominal,
    /// The wall-clock gap between the two snapshots.
    Measured,
}

/// Cumulative counters for one interface at one point on the session clock.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InterfaceSnapshot {
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub is_up: bool,
    pub taken_at: Duration,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Sample {
    pub elapsed_seconds: f64,
    pub sent_rate_mbps: f64,
    pub received_rate_mbps: f64,
    pub total_rate_mbps: f64,
}

impl Sample {
    pub fn between(
        previous: &InterfaceSnapshot,
        current: &InterfaceSnapshot,
        elapsed: Duration,
        interval: Duration,
        basis: RateBasis,
    ) -> Self {
        let seconds = match basis {
            RateBasis::Nominal => interval.as_secs_f64(),
            RateBasis::Measured => {
                let gap = current.taken_at.saturating_sub(previous.taken_at);
                if gap.is_zero() { interval.as_secs_f64() } else { gap.as_secs_f64() }
            }
        };
        let sent = rate_mbps(previous.bytes_sent, current.bytes_sent, seconds);
        let received = rate_mbps(previous.bytes_received, current.bytes_received, seconds);
        Self {
            elapsed_seconds: round_tenths(elapsed.as_secs_f64()),
            sent_rate_mbps: sent,
            received_rate_mbps: received,
            total_rate_mbps: sent + received,
        }
    }
}

/// Megabits (2^20 bits) per second between two readings of a cumulative
/// byte counter. A counter that went backwards (reset or wrap) reads as 0.
pub fn rate_mbps(previous: u64, current: u64, seconds: f64) -> f64 {
    let delta = current.saturating_sub(previous);
    (delta as f64 * BITS_PER_BYTE) / (seconds * BITS_PER_MEGABIT)
}

fn round_tenths(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}
