use async_trait::async_trait;

use crate::error::AppResult;
use crate::metrics::CallOutcome;

use super::DispatchRequest;

/// Performs one call of a dispatch run.
///
/// Implementations never retry and never fail across this boundary: every
/// failure is reported as data in the returned [`CallOutcome`].
#[async_trait]
pub trait Endpoint: Send + Sync {
    /// Validates the request template before any task is scheduled.
    ///
    /// # Errors
    ///
    /// Returns an error when the template can never produce a valid call.
    fn prepare(&self, request: &DispatchRequest) -> AppResult<()> {
        let _ = request;
        Ok(())
    }

    async fn call(&self, index: usize, request: &DispatchRequest) -> CallOutcome;
}
