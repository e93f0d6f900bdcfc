use clap::{CommandFactory, FromArgMatches};

use crate::app::{run_dispatch, run_mock, run_probe_command};
use crate::args::{Cli, Command};
use crate::error::AppResult;

/// Parses the command line and runs the selected command.
///
/// # Errors
///
/// Returns an error when arguments, configuration, or the command fail.
pub fn run() -> AppResult<()> {
    let matches = Cli::command().get_matches();
    let cli = Cli::from_arg_matches(&matches)?;

    crate::logger::init_logging(cli.verbose);

    match cli.command {
        // The probe builds its own threads or runtime.
        Command::Probe(args) => run_probe_command(&args),
        Command::Dispatch(args) => {
            let dispatch_matches = matches
                .subcommand_matches("dispatch")
                .cloned()
                .unwrap_or_default();
            build_runtime()?.block_on(run_dispatch(args, &dispatch_matches))
        }
        Command::Mock(args) => build_runtime()?.block_on(run_mock(&args)),
    }
}

fn build_runtime() -> AppResult<tokio::runtime::Runtime> {
    Ok(tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?)
}
