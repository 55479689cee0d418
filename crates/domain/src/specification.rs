//! Device specification: the declared type/capability profile of a device.
//!
//! Registration only ever checks that a specification exists; the name is
//! carried for operators.

use serde::{Deserialize, Serialize};

use crate::error::{EnrollError, ValidationError};
use crate::id::SpecificationToken;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceSpecification {
    pub token: SpecificationToken,
    pub name: String,
}

impl DeviceSpecification {
    /// Create a specification, validating the token.
    ///
    /// # Errors
    ///
    /// Returns [`EnrollError::Validation`] when `token` is empty.
    pub fn new(
        token: impl Into<SpecificationToken>,
        name: impl Into<String>,
    ) -> Result<Self, EnrollError> {
        let spec = Self {
            token: token.into(),
            name: name.into(),
        };
        spec.validate()?;
        Ok(spec)
    }

    /// Check domain invariants.
    ///
    /// # Errors
    ///
    /// Returns [`EnrollError::Validation`] when `token` is empty.
    pub fn validate(&self) -> Result<(), EnrollError> {
        if self.token.is_empty() {
            return Err(ValidationError::EmptySpecificationToken.into());
        }
        Ok(())
    }
}
