//! Errors raised by the registration service.

use enroll_domain::error::{EnrollError, ValidationError};
use enroll_domain::id::SiteToken;

/// Fatal start-up failure. The service does not accept registrations after
/// returning one of these.
#[derive(Debug, thiserror::Error)]
pub enum ConfigurationError {
    /// Auto-assignment is enabled without a site token and the catalog is empty.
    #[error("auto-assign site is enabled, but no sites were found")]
    NoSites,

    /// The configured auto-assignment site does not exist.
    #[error("auto-assign site token is invalid: {token}")]
    UnknownSite { token: SiteToken },

    /// The backend failed while validating the configuration.
    #[error("backend error while validating configuration")]
    Backend(#[from] EnrollError),
}

/// Per-request failure of [`handle_registration`](crate::services::registration_service::RegistrationService::handle_registration).
///
/// Not retried internally; the caller owns any retry or dead-letter policy.
#[derive(Debug, thiserror::Error)]
pub enum RegistrationError {
    /// The service has not been started, failed to start, or was stopped.
    #[error("registration service is not running")]
    NotStarted,

    /// The request itself is malformed.
    #[error("invalid registration request")]
    InvalidRequest(#[from] ValidationError),

    /// A lookup or creation call to the backend failed.
    #[error("device management backend error")]
    Backend(#[from] EnrollError),

    /// The outcome could not be delivered.
    #[error("failed to send registration outcome")]
    Outcome(#[source] EnrollError),
}
