use std::borrow::Cow;

use serde::Serialize;

use crate::dispatch::{DispatchReport, RunStatus};
use crate::error::AppResult;
use crate::metrics::{CallOutcome, DispatchSummary, ErrorKind, LatencyStats};

use super::PERCENT_DIVISOR;

const MICROS_PER_MILLI: u64 = 1_000;
/// Longest response preview printed in the text summary.
const PREVIEW_CHARS: usize = 200;

#[derive(Debug, Serialize)]
pub(super) struct ReportView<'report> {
    status: RunStatus,
    total: u64,
    succeeded: u64,
    failed: u64,
    cancelled: u64,
    elapsed_ms: u64,
    throughput_x100: u64,
    errors: ErrorCounts,
    latency: LatencyStats,
    last_response: Option<Cow<'report, str>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    outcomes: Option<Vec<OutcomeView<'report>>>,
}

#[derive(Debug, Serialize)]
struct OutcomeView<'report> {
    index: usize,
    success: bool,
    status_code: Option<u16>,
    latency_us: u64,
    error: Option<ErrorKind>,
    response_body: Option<Cow<'report, str>>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub(super) struct ErrorCounts {
    pub(super) network_failure: u64,
    pub(super) timeout: u64,
    pub(super) protocol_error: u64,
}

impl<'report> ReportView<'report> {
    pub(super) fn new(report: &'report DispatchReport) -> Self {
        let summary = &report.summary;
        Self {
            status: report.status,
            total: summary.total,
            succeeded: summary.succeeded,
            failed: summary.failed,
            cancelled: summary.cancelled,
            elapsed_ms: u64::try_from(report.elapsed.as_millis()).unwrap_or(u64::MAX),
            throughput_x100: summary.throughput_x100(report.elapsed),
            errors: error_counts(&report.outcomes),
            latency: summary.latency_stats(),
            last_response: summary
                .last_response
                .as_deref()
                .map(String::from_utf8_lossy),
            outcomes: None,
        }
    }

    pub(super) fn with_outcomes(report: &'report DispatchReport) -> Self {
        let mut view = Self::new(report);
        view.outcomes = Some(report.outcomes.iter().map(OutcomeView::new).collect());
        view
    }
}

impl<'report> OutcomeView<'report> {
    fn new(outcome: &'report CallOutcome) -> Self {
        Self {
            index: outcome.index,
            success: outcome.success,
            status_code: outcome.status_code,
            latency_us: u64::try_from(outcome.latency.as_micros()).unwrap_or(u64::MAX),
            error: outcome.error,
            response_body: outcome
                .response_body
                .as_deref()
                .map(String::from_utf8_lossy),
        }
    }
}

pub(super) fn error_counts(outcomes: &[CallOutcome]) -> ErrorCounts {
    let mut counts = ErrorCounts::default();
    for outcome in outcomes {
        match outcome.error {
            Some(ErrorKind::NetworkFailure) => {
                counts.network_failure = counts.network_failure.saturating_add(1);
            }
            Some(ErrorKind::Timeout) => counts.timeout = counts.timeout.saturating_add(1),
            Some(ErrorKind::ProtocolError) => {
                counts.protocol_error = counts.protocol_error.saturating_add(1);
            }
            Some(ErrorKind::Cancelled) | None => {}
        }
    }
    counts
}

pub(super) fn render_json(report: &DispatchReport) -> AppResult<String> {
    Ok(serde_json::to_string_pretty(&ReportView::new(report))?)
}

/// Human-readable summary of a dispatch run.
pub(super) struct TextSummary<'report>(pub(super) &'report DispatchReport);

impl std::fmt::Display for TextSummary<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let report = self.0;
        let summary = &report.summary;
        let stats = summary.latency_stats();
        let errors = error_counts(&report.outcomes);
        let throughput = summary.throughput_x100(report.elapsed);
        let success_rate = success_rate_x100(summary);

        writeln!(f, "Status: {}", report.status.as_str())?;
        writeln!(f, "Elapsed: {}ms", report.elapsed.as_millis())?;
        writeln!(f, "Total Calls: {}", summary.total)?;
        writeln!(
            f,
            "Succeeded: {} ({}.{:02}%)",
            summary.succeeded,
            success_rate / PERCENT_DIVISOR,
            success_rate % PERCENT_DIVISOR
        )?;
        writeln!(f, "Failed: {}", summary.failed)?;
        writeln!(
            f,
            "  Timeouts: {} / Network: {} / Non-2xx: {}",
            errors.timeout, errors.network_failure, errors.protocol_error
        )?;
        writeln!(f, "Cancelled: {}", summary.cancelled)?;
        writeln!(
            f,
            "Min/Avg/Max Latency: {} / {} / {}",
            format_micros(stats.min_us),
            format_micros(stats.mean_us),
            format_micros(stats.max_us)
        )?;
        writeln!(
            f,
            "P50/P90/P99 Latency: {} / {} / {}",
            format_micros(stats.p50_us),
            format_micros(stats.p90_us),
            format_micros(stats.p99_us)
        )?;
        writeln!(
            f,
            "Throughput: {}.{:02} calls/s",
            throughput / PERCENT_DIVISOR,
            throughput % PERCENT_DIVISOR
        )?;
        let last_response = summary
            .last_response
            .as_deref()
            .map_or_else(|| "-".to_owned(), response_preview);
        writeln!(f, "Last Response: {}", last_response)
    }
}

fn response_preview(body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body);
    let mut preview: String = text.chars().take(PREVIEW_CHARS).collect();
    if text.chars().count() > PREVIEW_CHARS {
        preview.push_str("...");
    }
    preview
}

fn success_rate_x100(summary: &DispatchSummary) -> u64 {
    let scaled = u128::from(summary.succeeded)
        .saturating_mul(10_000)
        .checked_div(u128::from(summary.total))
        .unwrap_or(0);
    u64::try_from(scaled).unwrap_or(u64::MAX)
}

pub(super) fn format_micros(micros: u64) -> String {
    format!(
        "{}.{:03}ms",
        micros / MICROS_PER_MILLI,
        micros % MICROS_PER_MILLI
    )
}
