//! # enroll-adapter-memory
//!
//! In-memory implementation of the [`DeviceManagement`] port.
//!
//! Holds the whole catalog behind one mutex, so every operation is atomic
//! with respect to the others. Creating a device whose hardware id is
//! already registered fails with [`EnrollError::Conflict`], which is what
//! closes the lookup-then-create race of concurrent first registrations.
//!
//! ## Dependency rule
//!
//! Depends on `enroll-app` (port traits) and `enroll-domain` only.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};

use enroll_app::ports::DeviceManagement;
use enroll_domain::assignment::{DeviceAssignment, DeviceAssignmentCreateRequest};
use enroll_domain::device::{Device, DeviceCreateRequest};
use enroll_domain::error::{ConflictError, EnrollError, NotFoundError};
use enroll_domain::id::{HardwareId, SiteToken, SpecificationToken};
use enroll_domain::search::{SearchCriteria, SearchResults};
use enroll_domain::site::Site;
use enroll_domain::specification::DeviceSpecification;

#[derive(Default)]
struct Catalog {
    devices: HashMap<HardwareId, Device>,
    specifications: HashMap<SpecificationToken, DeviceSpecification>,
    /// Insertion order is the listing order.
    sites: Vec<Site>,
    assignments: Vec<DeviceAssignment>,
}

impl Catalog {
    fn site(&self, token: &SiteToken) -> Option<&Site> {
        self.sites.iter().find(|site| &site.token == token)
    }

    fn create_device(&mut self, request: DeviceCreateRequest) -> Result<Device, EnrollError> {
        request.validate()?;
        if self.devices.contains_key(&request.hardware_id) {
            return Err(ConflictError {
                entity: "Device",
                id: request.hardware_id.to_string(),
                reason: "hardware id already registered",
            }
            .into());
        }
        if !self.specifications.contains_key(&request.specification_token) {
            return Err(NotFoundError {
                entity: "DeviceSpecification",
                id: request.specification_token.to_string(),
            }
            .into());
        }
        let device = Device::from_request(request);
        self.devices.insert(device.hardware_id.clone(), device.clone());
        Ok(device)
    }

    fn create_assignment(
        &mut self,
        request: DeviceAssignmentCreateRequest,
    ) -> Result<DeviceAssignment, EnrollError> {
        request.validate()?;
        if self.site(&request.site_token).is_none() {
            return Err(NotFoundError {
                entity: "Site",
                id: request.site_token.to_string(),
            }
            .into());
        }
        let device = self
            .devices
            .get_mut(&request.device_hardware_id)
            .ok_or_else(|| NotFoundError {
                entity: "Device",
                id: request.device_hardware_id.to_string(),
            })?;
        if device.is_assigned() {
            return Err(ConflictError {
                entity: "Device",
                id: request.device_hardware_id.to_string(),
                reason: "device already has an active assignment",
            }
            .into());
        }
        let assignment = DeviceAssignment::from_request(request);
        device.assignment_token = Some(assignment.token.clone());
        self.assignments.push(assignment.clone());
        Ok(assignment)
    }
}

/// Device-management backend kept entirely in memory.
#[derive(Default)]
pub struct InMemoryDeviceManagement {
    catalog: Mutex<Catalog>,
}

impl InMemoryDeviceManagement {
    /// Create an empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn catalog(&self) -> MutexGuard<'_, Catalog> {
        self.catalog.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a site to the catalog.
    ///
    /// # Errors
    ///
    /// Returns [`EnrollError::Validation`] for an invalid site, or
    /// [`EnrollError::Conflict`] if the token is taken.
    pub fn add_site(&self, site: Site) -> Result<(), EnrollError> {
        site.validate()?;
        let mut catalog = self.catalog();
        if catalog.site(&site.token).is_some() {
            return Err(ConflictError {
                entity: "Site",
                id: site.token.to_string(),
                reason: "token already in use",
            }
            .into());
        }
        tracing::debug!(site_token = %site.token, "site added");
        catalog.sites.push(site);
        Ok(())
    }

    /// Add a device specification to the catalog.
    ///
    /// # Errors
    ///
    /// Returns [`EnrollError::Validation`] for an invalid specification, or
    /// [`EnrollError::Conflict`] if the token is taken.
    pub fn add_specification(
        &self,
        specification: DeviceSpecification,
    ) -> Result<(), EnrollError> {
        specification.validate()?;
        let mut catalog = self.catalog();
        if catalog.specifications.contains_key(&specification.token) {
            return Err(ConflictError {
                entity: "DeviceSpecification",
                id: specification.token.to_string(),
                reason: "token already in use",
            }
            .into());
        }
        tracing::debug!(specification_token = %specification.token, "specification added");
        catalog
            .specifications
            .insert(specification.token.clone(), specification);
        Ok(())
    }

    /// Snapshot of every device, in no particular order.
    #[must_use]
    pub fn devices(&self) -> Vec<Device> {
        self.catalog().devices.values().cloned().collect()
    }

    /// Snapshot of every assignment, oldest first.
    #[must_use]
    pub fn assignments(&self) -> Vec<DeviceAssignment> {
        self.catalog().assignments.clone()
    }
}

impl DeviceManagement for InMemoryDeviceManagement {
    fn get_device_by_hardware_id(
        &self,
        hardware_id: &HardwareId,
    ) -> impl Future<Output = Result<Option<Device>, EnrollError>> + Send {
        let result = self.catalog().devices.get(hardware_id).cloned();
        async { Ok(result) }
    }

    fn get_device_specification_by_token(
        &self,
        token: &SpecificationToken,
    ) -> impl Future<Output = Result<Option<DeviceSpecification>, EnrollError>> + Send {
        let result = self.catalog().specifications.get(token).cloned();
        async { Ok(result) }
    }

    fn create_device(
        &self,
        request: DeviceCreateRequest,
    ) -> impl Future<Output = Result<Device, EnrollError>> + Send {
        let result = self.catalog().create_device(request);
        if let Ok(device) = &result {
            tracing::debug!(hardware_id = %device.hardware_id, "device created");
        }
        async { result }
    }

    fn get_site_by_token(
        &self,
        token: &SiteToken,
    ) -> impl Future<Output = Result<Option<Site>, EnrollError>> + Send {
        let result = self.catalog().site(token).cloned();
        async { Ok(result) }
    }

    fn list_sites(
        &self,
        criteria: SearchCriteria,
    ) -> impl Future<Output = Result<SearchResults<Site>, EnrollError>> + Send {
        let result = criteria.paginate(&self.catalog().sites);
        async { Ok(result) }
    }

    fn create_device_assignment(
        &self,
        request: DeviceAssignmentCreateRequest,
    ) -> impl Future<Output = Result<DeviceAssignment, EnrollError>> + Send {
        let result = self.catalog().create_assignment(request);
        if let Ok(assignment) = &result {
            tracing::debug!(
                hardware_id = %assignment.device_hardware_id,
                site_token = %assignment.site_token,
                "device assignment created"
            );
        }
        async { result }
    }
}
