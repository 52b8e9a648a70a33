use thiserror::Error;

use cadence_store::StoreError;

/// Webhook signature verification failed. The event payload is discarded;
/// nothing else is affected.
#[derive(Debug, Error)]
#[error("invalid webhook signature")]
pub struct AuthError;

/// Errors surfaced by the status reconciler. Per-row issues are absorbed
/// into counters; only authentication and store failures propagate.
#[derive(Debug, Error)]
pub enum StatusError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("invalid webhook payload: {0}")]
    Payload(String),
}
