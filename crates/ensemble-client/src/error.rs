//! Client-side error types.

use ensemble_runtime::RuntimeError;
use thiserror::Error;

/// Errors surfaced to callers of [`crate::GroupClient`].
///
/// Task failure is not modeled here: a submitted task that is force-failed
/// completes its future successfully with `TaskOutcome::Failed` (§4.4), it
/// never surfaces as an `Err`.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}
