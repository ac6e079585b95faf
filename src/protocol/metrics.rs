//! Process-wide bus counters

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Track bus traffic and faults without external dependencies.
pub(crate) struct Metrics;

static FRAMES_SENT: AtomicU64 = AtomicU64::new(0);
static BYTES_SENT: AtomicU64 = AtomicU64::new(0);
static FRAMES_RECEIVED: AtomicU64 = AtomicU64::new(0);
static PEER_FRAMES: AtomicU64 = AtomicU64::new(0);
static CHECKSUM_FAULTS: AtomicU64 = AtomicU64::new(0);
static RESENDS: AtomicU64 = AtomicU64::new(0);
static STATUS_FAULTS: AtomicU64 = AtomicU64::new(0);
static TIMEOUTS: AtomicU64 = AtomicU64::new(0);
static EXCHANGES: AtomicU64 = AtomicU64::new(0);
static EXCHANGE_TOTAL_NS: AtomicU64 = AtomicU64::new(0);
static EXCHANGE_MAX_NS: AtomicU64 = AtomicU64::new(0);

const NANOSECONDS_PER_MICROSECOND: u128 = 1_000;

impl Metrics {
    #[inline]
    pub(crate) fn record_frame_sent(len: usize) {
        FRAMES_SENT.fetch_add(1, Ordering::Relaxed);
        BYTES_SENT.fetch_add(len as u64, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_frame_received() {
        FRAMES_RECEIVED.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_peer_frame() {
        PEER_FRAMES.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_checksum_fault() {
        CHECKSUM_FAULTS.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_resend() {
        RESENDS.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_status_fault() {
        STATUS_FAULTS.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_timeout() {
        TIMEOUTS.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_exchange(duration: Duration) {
        let nanos = duration
            .as_nanos()
            .min(u128::from(u64::MAX))
            .try_into()
            .unwrap_or(u64::MAX);

        EXCHANGES.fetch_add(1, Ordering::Relaxed);
        EXCHANGE_TOTAL_NS.fetch_add(nanos, Ordering::Relaxed);
        update_max(&EXCHANGE_MAX_NS, nanos);
    }

    #[inline]
    pub(crate) fn totals() -> MetricsSnapshot {
        MetricsSnapshot {
            frames_sent: FRAMES_SENT.load(Ordering::Relaxed),
            bytes_sent: BYTES_SENT.load(Ordering::Relaxed),
            frames_received: FRAMES_RECEIVED.load(Ordering::Relaxed),
            peer_frames: PEER_FRAMES.load(Ordering::Relaxed),
            checksum_faults: CHECKSUM_FAULTS.load(Ordering::Relaxed),
            resends: RESENDS.load(Ordering::Relaxed),
            status_faults: STATUS_FAULTS.load(Ordering::Relaxed),
            timeouts: TIMEOUTS.load(Ordering::Relaxed),
            exchanges: EXCHANGES.load(Ordering::Relaxed),
            exchange_total_ns: EXCHANGE_TOTAL_NS.load(Ordering::Relaxed),
            exchange_max_ns: EXCHANGE_MAX_NS.load(Ordering::Relaxed),
        }
    }
}

fn update_max(target: &AtomicU64, candidate: u64) {
    let mut current = target.load(Ordering::Relaxed);
    while candidate > current {
        match target.compare_exchange_weak(
            current,
            candidate,
            Ordering::Relaxed,
            Ordering::Relaxed,
        ) {
            Ok(_) => return,
            Err(old) => current = old,
        }
    }
}

/// Current value of every bus counter.
#[must_use]
pub fn snapshot() -> MetricsSnapshot {
    Metrics::totals()
}

/// Lightweight snapshot of bus counters.
#[derive(Default, Debug, Clone, Copy)]
#[allow(missing_docs)]
pub struct MetricsSnapshot {
    pub frames_sent: u64,
    pub bytes_sent: u64,
    pub frames_received: u64,
    pub peer_frames: u64,
    pub checksum_faults: u64,
    pub resends: u64,
    pub status_faults: u64,
    pub timeouts: u64,
    pub exchanges: u64,
    pub exchange_total_ns: u64,
    pub exchange_max_ns: u64,
}

impl MetricsSnapshot {
    /// Average completed exchange time in microseconds.
    #[must_use]
    pub fn avg_exchange_us(&self) -> Option<u64> {
        if self.exchanges == 0 {
            return None;
        }

        let total = u128::from(self.exchange_total_ns);
        Some((total / (u128::from(self.exchanges) * NANOSECONDS_PER_MICROSECOND)) as u64)
    }
}
