use tokio_util::sync::CancellationToken;

use crate::args::MockArgs;
use crate::error::AppResult;
use crate::mock::{MockConfig, bind, serve};
use crate::shutdown::spawn_signal_handler;

/// Runs `llm-fanout mock` until Ctrl+C or SIGTERM.
pub(crate) async fn run_mock(args: &MockArgs) -> AppResult<()> {
    let config = MockConfig {
        listen: args.listen,
        response_delay: args.delay,
        max_concurrent: args.max_concurrent.get(),
    };
    let listener = bind(config.listen).await?;

    let shutdown = CancellationToken::new();
    let signal_handler = spawn_signal_handler(&shutdown);
    let result = serve(listener, &config, shutdown.clone()).await;
    shutdown.cancel();
    drop(signal_handler.await);
    result
}
