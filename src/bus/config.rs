//! Bus timing configuration

#[cfg(feature = "debug-tools")]
use std::path::PathBuf;
use std::time::Duration;

/// Bus timing and retry options.
#[derive(Debug, Clone)]
pub struct BusConfig {
    /// Wait for each byte of a reply.
    pub response_timeout: Duration,
    /// Wait for a reply to an address assignment; silence ends enumeration.
    pub enumeration_timeout: Duration,
    /// Resends allowed per exchange when a checksum fault is reported.
    pub resend_retries: u32,
    /// Minimum gap between consecutive writes.
    pub min_send_spacing: Duration,
    /// Gap between reset broadcasts.
    pub reset_pulse_delay: Duration,
    /// Settle time after the last reset broadcast.
    pub post_reset_delay: Duration,
    /// Gap between an address broadcast and reading its reply.
    pub assign_settle_delay: Duration,
    /// Pings averaged by a latency measurement.
    pub ping_count: u32,
    /// Gap between pings.
    pub ping_delay: Duration,
    /// Info and latency attempts per node before enumeration fails.
    pub info_attempts: u32,
    /// Restarts allowed when enumeration hits a bus fault.
    pub enumeration_restarts: u32,
    /// Optional pcap capture of every frame (debug builds only).
    #[cfg(feature = "debug-tools")]
    pub capture_path: Option<PathBuf>,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            response_timeout: Duration::from_millis(250),
            enumeration_timeout: Duration::from_millis(100),
            resend_retries: 3,
            min_send_spacing: Duration::ZERO,
            reset_pulse_delay: Duration::from_millis(20),
            post_reset_delay: Duration::from_millis(500),
            assign_settle_delay: Duration::from_millis(100),
            ping_count: 5,
            ping_delay: Duration::from_millis(10),
            info_attempts: 5,
            enumeration_restarts: 5,
            #[cfg(feature = "debug-tools")]
            capture_path: None,
        }
    }
}

impl BusConfig {
    /// Configuration with every delay removed, for simulated buses.
    #[must_use]
    pub fn immediate() -> Self {
        Self {
            response_timeout: Duration::from_millis(1),
            enumeration_timeout: Duration::from_millis(1),
            reset_pulse_delay: Duration::ZERO,
            post_reset_delay: Duration::ZERO,
            assign_settle_delay: Duration::ZERO,
            ping_delay: Duration::ZERO,
            ..Self::default()
        }
    }
}
