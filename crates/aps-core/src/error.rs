//! Error types for plan construction

use crate::hash::HashError;

/// Errors building or versioning a [`Plan`](crate::Plan)
#[derive(Debug, thiserror::Error)]
pub enum PlanError {
    /// Builder was missing a required field
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    /// Plan already carries an approval
    #[error("plan already approved by {approved_by}")]
    AlreadyApproved { approved_by: String },

    /// Hash computation failed
    #[error("hash error: {0}")]
    Hash(#[from] HashError),

    /// JSON encoding or decoding failed
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
