//! Registration messages: what a device announces and what it is told back.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{EnrollError, ValidationError};
use crate::id::{HardwareId, SiteToken, SpecificationToken};

/// A device announcing itself to the system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationRequest {
    pub hardware_id: HardwareId,
    pub specification_token: SpecificationToken,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub site_token: Option<SiteToken>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl RegistrationRequest {
    /// Create a builder for constructing a [`RegistrationRequest`].
    #[must_use]
    pub fn builder() -> RegistrationRequestBuilder {
        RegistrationRequestBuilder::default()
    }

    /// Check domain invariants.
    ///
    /// Only the hardware id is required. An empty specification token is a
    /// valid request that resolves to no specification.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::EmptyHardwareId`].
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.hardware_id.is_empty() {
            return Err(ValidationError::EmptyHardwareId);
        }
        Ok(())
    }
}

/// Step-by-step builder for [`RegistrationRequest`].
#[derive(Debug, Default)]
pub struct RegistrationRequestBuilder {
    hardware_id: Option<HardwareId>,
    specification_token: Option<SpecificationToken>,
    site_token: Option<SiteToken>,
    metadata: BTreeMap<String, String>,
}

impl RegistrationRequestBuilder {
    #[must_use]
    pub fn hardware_id(mut self, hardware_id: impl Into<HardwareId>) -> Self {
        self.hardware_id = Some(hardware_id.into());
        self
    }

    #[must_use]
    pub fn specification_token(mut self, token: impl Into<SpecificationToken>) -> Self {
        self.specification_token = Some(token.into());
        self
    }

    #[must_use]
    pub fn site_token(mut self, token: impl Into<SiteToken>) -> Self {
        self.site_token = Some(token.into());
        self
    }

    #[must_use]
    pub fn metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Consume the builder, validate, and return a [`RegistrationRequest`].
    ///
    /// # Errors
    ///
    /// Returns [`EnrollError::Validation`] if the hardware id is missing
    /// or empty.
    pub fn build(self) -> Result<RegistrationRequest, EnrollError> {
        let request = RegistrationRequest {
            hardware_id: self.hardware_id.unwrap_or_else(|| HardwareId::new("")),
            specification_token: self
                .specification_token
                .unwrap_or_else(|| SpecificationToken::new("")),
            site_token: self.site_token,
            metadata: self.metadata,
        };
        request.validate()?;
        Ok(request)
    }
}

/// The single response emitted for a registration request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RegistrationOutcome {
    /// The device is registered and assigned.
    Ack {
        hardware_id: HardwareId,
        /// `true` when this request created the device.
        new_registration: bool,
    },
    /// The specification is unknown, or differs from the one on record.
    InvalidSpecification { hardware_id: HardwareId },
    /// The device is unassigned and auto-assignment is disabled.
    SiteTokenRequired { hardware_id: HardwareId },
}

impl RegistrationOutcome {
    /// The device this outcome is addressed to.
    #[must_use]
    pub fn hardware_id(&self) -> &HardwareId {
        match self {
            Self::Ack { hardware_id, .. }
            | Self::InvalidSpecification { hardware_id }
            | Self::SiteTokenRequired { hardware_id } => hardware_id,
        }
    }

    /// Short label used in logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Ack { .. } => "ack",
            Self::InvalidSpecification { .. } => "invalid_specification",
            Self::SiteTokenRequired { .. } => "site_token_required",
        }
    }
}
