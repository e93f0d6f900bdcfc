use crate::args::{OutputFormat, ProbeArgs};
use crate::error::AppResult;
use crate::probe::{ProbeConfig, ProbeReport, run_probe};

use super::PERCENT_DIVISOR;

/// Runs `llm-fanout probe`. Must run outside of a tokio runtime.
pub(crate) fn run_probe_command(args: &ProbeArgs) -> AppResult<()> {
    let config = ProbeConfig {
        tasks: args.tasks.get(),
        work: args.work,
        mode: args.mode,
        executor: args.executor,
        worker_threads: args.worker_threads.map(|threads| threads.get()),
    };
    let report = run_probe(&config)?;

    match args.output_format {
        OutputFormat::Text => print!("{}", ProbeText(&report)),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }
    Ok(())
}

/// Per-task timeline plus span and overlap figures.
pub(super) struct ProbeText<'report>(pub(super) &'report ProbeReport);

impl std::fmt::Display for ProbeText<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let report = self.0;
        writeln!(
            f,
            "Probe: {} tasks, {} mode, {} executor, {}ms work each",
            report.records.len(),
            report.mode.as_str(),
            report.executor.as_str(),
            report.work.as_millis()
        )?;
        for record in &report.records {
            writeln!(
                f,
                "  task {:>3}  {} -> {}  (+{}ms .. +{}ms)  {}",
                record.index,
                record.started_at.format("%H:%M:%S%.3f"),
                record.finished_at.format("%H:%M:%S%.3f"),
                record.start_offset.as_millis(),
                record.end_offset.as_millis(),
                record.worker
            )?;
        }
        let overlap = report.overlap_x100();
        writeln!(f, "Span: {}ms", report.span().as_millis())?;
        writeln!(f, "Summed Work: {}ms", report.total_work().as_millis())?;
        writeln!(
            f,
            "Overlap: {}.{:02}x{}",
            overlap / PERCENT_DIVISOR,
            overlap % PERCENT_DIVISOR,
            if report.is_sequential() {
                " (sequential)"
            } else {
                ""
            }
        )
    }
}
