use std::time::Duration;

use bytes::Bytes;
use serde::Serialize;

use super::LatencyHistogram;

/// Why a single call did not succeed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Connection refused, DNS failure, reset, or a broken body stream.
    NetworkFailure,
    /// The per-call timeout elapsed.
    Timeout,
    /// The endpoint answered with a non-2xx status.
    ProtocolError,
    /// The task was abandoned by the overall timeout or an interrupt.
    Cancelled,
}

impl ErrorKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            ErrorKind::NetworkFailure => "network_failure",
            ErrorKind::Timeout => "timeout",
            ErrorKind::ProtocolError => "protocol_error",
            ErrorKind::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal result of one endpoint call. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallOutcome {
    pub index: usize,
    pub success: bool,
    pub status_code: Option<u16>,
    pub latency: Duration,
    pub error: Option<ErrorKind>,
    pub response_body: Option<Bytes>,
}

impl CallOutcome {
    #[must_use]
    pub const fn succeeded(index: usize, status_code: u16, latency: Duration, body: Bytes) -> Self {
        Self {
            index,
            success: true,
            status_code: Some(status_code),
            latency,
            error: None,
            response_body: Some(body),
        }
    }

    #[must_use]
    pub const fn failed(
        index: usize,
        error: ErrorKind,
        status_code: Option<u16>,
        latency: Duration,
        body: Option<Bytes>,
    ) -> Self {
        Self {
            index,
            success: false,
            status_code,
            latency,
            error: Some(error),
            response_body: body,
        }
    }

    #[must_use]
    pub const fn cancelled(index: usize, latency: Duration) -> Self {
        Self::failed(index, ErrorKind::Cancelled, None, latency, None)
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.error == Some(ErrorKind::Cancelled)
    }
}

/// Counts and latencies of one dispatch run.
///
/// `total` only counts calls that actually completed; tasks abandoned by a
/// timeout or interrupt are counted in `cancelled` instead, so
/// `succeeded + failed == total` holds at every observation point.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    pub total: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub cancelled: u64,
    /// Latencies of completed calls, in arrival order.
    pub latencies: Vec<Duration>,
    pub last_response: Option<Bytes>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LatencyStats {
    pub count: u64,
    pub min_us: u64,
    pub max_us: u64,
    pub mean_us: u64,
    pub p50_us: u64,
    pub p90_us: u64,
    pub p99_us: u64,
}

impl DispatchSummary {
    /// Derives the latency distribution from the recorded latencies.
    #[must_use]
    pub fn latency_stats(&self) -> LatencyStats {
        if self.latencies.is_empty() {
            return LatencyStats::default();
        }

        let mut min_us = u64::MAX;
        let mut max_us = 0u64;
        let mut sum_us: u128 = 0;
        let mut histogram = match LatencyHistogram::new() {
            Ok(histogram) => Some(histogram),
            Err(err) => {
                tracing::warn!("Failed to initialize latency histogram: {}", err);
                None
            }
        };

        for latency in &self.latencies {
            let micros = duration_micros(*latency);
            min_us = min_us.min(micros);
            max_us = max_us.max(micros);
            sum_us = sum_us.saturating_add(u128::from(micros));
            if let Some(hist) = histogram.as_mut()
                && let Err(err) = hist.record(micros)
            {
                tracing::warn!("Failed to record latency: {}", err);
                histogram = None;
            }
        }

        let count = u64::try_from(self.latencies.len()).unwrap_or(u64::MAX);
        let mean_us = sum_us
            .checked_div(u128::from(count))
            .and_then(|mean| u64::try_from(mean).ok())
            .unwrap_or(0);
        let (p50_us, p90_us, p99_us) = histogram
            .as_ref()
            .map_or((0, 0, 0), LatencyHistogram::percentiles);

        LatencyStats {
            count,
            min_us,
            max_us,
            mean_us,
            p50_us,
            p90_us,
            p99_us,
        }
    }

    /// Completed calls per second over `elapsed`, scaled by 100.
    #[must_use]
    pub fn throughput_x100(&self, elapsed: Duration) -> u64 {
        let elapsed_ms = elapsed.as_millis().max(1);
        let scaled = u128::from(self.total)
            .saturating_mul(100_000)
            .checked_div(elapsed_ms)
            .unwrap_or(0);
        u64::try_from(scaled).unwrap_or(u64::MAX)
    }
}

pub(crate) fn duration_micros(duration: Duration) -> u64 {
    u64::try_from(duration.as_micros()).unwrap_or(u64::MAX)
}
