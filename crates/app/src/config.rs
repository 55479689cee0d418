//! Registration policy configuration.

use serde::Deserialize;

use enroll_domain::id::SiteToken;

/// Policy knobs for [`RegistrationService`](crate::services::registration_service::RegistrationService).
///
/// Set once at construction and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RegistrationConfig {
    /// Whether unknown devices may register.
    ///
    /// Stored and exposed, but not consulted by the registration workflow.
    pub allow_new_devices: bool,
    /// Bind unassigned devices to a default site instead of asking for one.
    pub auto_assign_site: bool,
    /// Default site for auto-assignment. When unset and auto-assignment is
    /// enabled, the first site in the catalog is used.
    pub auto_assign_site_token: Option<SiteToken>,
}

impl Default for RegistrationConfig {
    fn default() -> Self {
        Self {
            allow_new_devices: true,
            auto_assign_site: false,
            auto_assign_site_token: None,
        }
    }
}

impl RegistrationConfig {
    /// Configuration with auto-assignment enabled and the site left for
    /// resolution at start-up.
    #[must_use]
    pub fn auto_assign() -> Self {
        Self {
            auto_assign_site: true,
            ..Self::default()
        }
    }

    /// Configuration with auto-assignment enabled against `token`.
    #[must_use]
    pub fn auto_assign_to(token: impl Into<SiteToken>) -> Self {
        Self {
            auto_assign_site: true,
            auto_assign_site_token: Some(token.into()),
            ..Self::default()
        }
    }
}
