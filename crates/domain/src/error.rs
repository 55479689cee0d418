//! Common error types used across the workspace.
//!
//! Each layer defines its own typed errors and converts into [`EnrollError`]
//! via `#[from]` at the port boundary.

use std::error::Error;

/// Top-level error returned by every port operation.
#[derive(Debug, thiserror::Error)]
pub enum EnrollError {
    /// A domain invariant was violated.
    #[error("validation error")]
    Validation(#[from] ValidationError),

    /// A referenced record does not exist.
    #[error("not found")]
    NotFound(#[from] NotFoundError),

    /// A record with the same identity already exists, or is in a state
    /// that forbids the operation.
    #[error("conflict")]
    Conflict(#[from] ConflictError),

    /// The persistence backend failed.
    #[error("storage error")]
    Storage(#[source] Box<dyn Error + Send + Sync>),

    /// An outbound transport failed to deliver a message.
    #[error("transport error")]
    Transport(#[source] Box<dyn Error + Send + Sync>),
}

/// Domain invariant violations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("hardware id must not be empty")]
    EmptyHardwareId,

    #[error("specification token must not be empty")]
    EmptySpecificationToken,

    #[error("site token must not be empty")]
    EmptySiteToken,
}

/// A lookup by identity found nothing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{entity} not found: {id}")]
pub struct NotFoundError {
    pub entity: &'static str,
    pub id: String,
}

/// An operation collided with existing state.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{entity} conflict on {id}: {reason}")]
pub struct ConflictError {
    pub entity: &'static str,
    pub id: String,
    pub reason: &'static str,
}
