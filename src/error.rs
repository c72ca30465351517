//! Error types for the patch engine.
//!
//! One variant per caller-distinguishable failure family; the transport layer
//! that invokes the engine maps these to status codes.

use thiserror::Error;

/// Failures surfaced by the patch dispatcher and its handlers.
#[derive(Error, Debug)]
pub enum PatchError {
    /// A referenced entity id, location code, array index or payload shape
    /// could not be resolved against current state. No mutation was applied
    /// for the offending operation.
    #[error("malformed patch: {detail}")]
    MalformedPatch { detail: String },

    /// The trigger-created audit row never appeared within the retry budget.
    /// The field mutation this reason was meant to annotate has already been
    /// committed and is not rolled back.
    #[error(
        "no undefined-reason audit row found for client {client_number} \
         (action filter {action_filter:?}) after {attempts} attempts"
    )]
    ReasonReconciliationExhausted {
        client_number: String,
        action_filter: Option<String>,
        attempts: u32,
    },

    /// Transient or permanent failure from the underlying store; surfaced
    /// directly, no automatic retry outside reason reconciliation.
    #[error("storage failure: {0}")]
    Storage(#[from] anyhow::Error),
}

impl PatchError {
    pub fn malformed(detail: impl Into<String>) -> Self {
        PatchError::MalformedPatch {
            detail: detail.into(),
        }
    }
}
