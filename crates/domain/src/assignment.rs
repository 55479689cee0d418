//! Device assignment: binds a device to a site.

use serde::{Deserialize, Serialize};

use crate::error::{EnrollError, ValidationError};
use crate::id::{AssignmentToken, HardwareId, SiteToken};
use crate::time::{Timestamp, now};

/// Nature of the binding between a device and a site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentType {
    /// Bound to the site only, not to any asset.
    Unassociated,
}

/// Parameters for creating a new [`DeviceAssignment`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceAssignmentCreateRequest {
    pub site_token: SiteToken,
    pub device_hardware_id: HardwareId,
    pub assignment_type: AssignmentType,
}

impl DeviceAssignmentCreateRequest {
    /// Request an [`AssignmentType::Unassociated`] binding of `device` to `site`.
    #[must_use]
    pub fn unassociated(site_token: SiteToken, device_hardware_id: HardwareId) -> Self {
        Self {
            site_token,
            device_hardware_id,
            assignment_type: AssignmentType::Unassociated,
        }
    }

    /// Check domain invariants.
    ///
    /// # Errors
    ///
    /// Returns [`EnrollError::Validation`] when the site token or hardware id
    /// is empty.
    pub fn validate(&self) -> Result<(), EnrollError> {
        if self.site_token.is_empty() {
            return Err(ValidationError::EmptySiteToken.into());
        }
        if self.device_hardware_id.is_empty() {
            return Err(ValidationError::EmptyHardwareId.into());
        }
        Ok(())
    }
}

/// A persisted binding of a device to a site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceAssignment {
    pub token: AssignmentToken,
    pub site_token: SiteToken,
    pub device_hardware_id: HardwareId,
    pub assignment_type: AssignmentType,
    pub created_at: Timestamp,
}

impl DeviceAssignment {
    /// Materialise an assignment from a creation request under a fresh token.
    #[must_use]
    pub fn from_request(request: DeviceAssignmentCreateRequest) -> Self {
        Self {
            token: AssignmentToken::generate(),
            site_token: request.site_token,
            device_hardware_id: request.device_hardware_id,
            assignment_type: request.assignment_type,
            created_at: now(),
        }
    }
}
