//! Site: an operational location devices are assigned to.

use serde::{Deserialize, Serialize};

use crate::error::{EnrollError, ValidationError};
use crate::id::SiteToken;

/// An operational location such as a building or facility.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Site {
    pub token: SiteToken,
    pub name: String,
}

impl Site {
    /// Create a builder for constructing a [`Site`].
    #[must_use]
    pub fn builder() -> SiteBuilder {
        SiteBuilder::default()
    }

    /// Check domain invariants.
    ///
    /// # Errors
    ///
    /// Returns [`EnrollError::Validation`] when `token` is empty.
    pub fn validate(&self) -> Result<(), EnrollError> {
        if self.token.is_empty() {
            return Err(ValidationError::EmptySiteToken.into());
        }
        Ok(())
    }
}

/// Step-by-step builder for [`Site`].
#[derive(Debug, Default)]
pub struct SiteBuilder {
    token: Option<SiteToken>,
    name: Option<String>,
}

impl SiteBuilder {
    #[must_use]
    pub fn token(mut self, token: impl Into<SiteToken>) -> Self {
        self.token = Some(token.into());
        self
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Consume the builder, validate, and return a [`Site`].
    ///
    /// The name defaults to the token when not set.
    ///
    /// # Errors
    ///
    /// Returns [`EnrollError::Validation`] if `token` is missing or empty.
    pub fn build(self) -> Result<Site, EnrollError> {
        let token = self.token.unwrap_or_else(|| SiteToken::new(""));
        let site = Site {
            name: self.name.unwrap_or_else(|| token.to_string()),
            token,
        };
        site.validate()?;
        Ok(site)
    }
}
