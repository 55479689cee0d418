//! Device: a physical thing identified by its hardware id.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{EnrollError, ValidationError};
use crate::id::{AssignmentToken, HardwareId, SpecificationToken};
use crate::registration::RegistrationRequest;
use crate::time::{Timestamp, now};

/// Comment attached to every device created through registration.
pub const ON_DEMAND_REGISTRATION_COMMENT: &str = "Device created by on-demand registration.";

/// A device record as held by the device-management backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub hardware_id: HardwareId,
    pub specification_token: SpecificationToken,
    /// Current assignment; `None` while the device is unassigned.
    pub assignment_token: Option<AssignmentToken>,
    pub comments: Option<String>,
    pub metadata: BTreeMap<String, String>,
    pub created_at: Timestamp,
}

impl Device {
    /// Materialise a device from a validated creation request.
    #[must_use]
    pub fn from_request(request: DeviceCreateRequest) -> Self {
        Self {
            hardware_id: request.hardware_id,
            specification_token: request.specification_token,
            assignment_token: None,
            comments: request.comments,
            metadata: request.metadata,
            created_at: now(),
        }
    }

    /// Whether the device is bound to a site.
    #[must_use]
    pub fn is_assigned(&self) -> bool {
        self.assignment_token.is_some()
    }
}

/// Parameters for creating a new [`Device`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceCreateRequest {
    pub hardware_id: HardwareId,
    pub specification_token: SpecificationToken,
    pub comments: Option<String>,
    pub metadata: BTreeMap<String, String>,
}

impl DeviceCreateRequest {
    /// Create a builder for constructing a [`DeviceCreateRequest`].
    #[must_use]
    pub fn builder() -> DeviceCreateRequestBuilder {
        DeviceCreateRequestBuilder::default()
    }

    /// Build the creation request for a device first seen in `request`.
    ///
    /// Copies the hardware id, specification token and every metadata entry,
    /// and marks the device as created by on-demand registration.
    #[must_use]
    pub fn from_registration(request: &RegistrationRequest) -> Self {
        Self {
            hardware_id: request.hardware_id.clone(),
            specification_token: request.specification_token.clone(),
            comments: Some(ON_DEMAND_REGISTRATION_COMMENT.to_string()),
            metadata: request.metadata.clone(),
        }
    }

    /// Check domain invariants.
    ///
    /// # Errors
    ///
    /// Returns [`EnrollError::Validation`] when the hardware id or
    /// specification token is empty.
    pub fn validate(&self) -> Result<(), EnrollError> {
        if self.hardware_id.is_empty() {
            return Err(ValidationError::EmptyHardwareId.into());
        }
        if self.specification_token.is_empty() {
            return Err(ValidationError::EmptySpecificationToken.into());
        }
        Ok(())
    }
}

/// Step-by-step builder for [`DeviceCreateRequest`].
#[derive(Debug, Default)]
pub struct DeviceCreateRequestBuilder {
    hardware_id: Option<HardwareId>,
    specification_token: Option<SpecificationToken>,
    comments: Option<String>,
    metadata: BTreeMap<String, String>,
}

impl DeviceCreateRequestBuilder {
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
    pub fn comments(mut self, comments: impl Into<String>) -> Self {
        self.comments = Some(comments.into());
        self
    }

    /// Add a metadata entry, replacing any previous value for `key`.
    #[must_use]
    pub fn metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Consume the builder, validate, and return a [`DeviceCreateRequest`].
    ///
    /// # Errors
    ///
    /// Returns [`EnrollError::Validation`] if the hardware id or
    /// specification token is missing or empty.
    pub fn build(self) -> Result<DeviceCreateRequest, EnrollError> {
        let request = DeviceCreateRequest {
            hardware_id: self.hardware_id.unwrap_or_else(|| HardwareId::new("")),
            specification_token: self
                .specification_token
                .unwrap_or_else(|| SpecificationToken::new("")),
            comments: self.comments,
            metadata: self.metadata,
        };
        request.validate()?;
        Ok(request)
    }
}
