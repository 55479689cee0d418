//! Device-management port: the backend that owns devices, specifications,
//! sites and assignments.
//!
//! Registration never stores anything itself; every fact it reasons about is
//! read from, or written to, an implementation of [`DeviceManagement`].

use std::future::Future;

use enroll_domain::assignment::{DeviceAssignment, DeviceAssignmentCreateRequest};
use enroll_domain::device::{Device, DeviceCreateRequest};
use enroll_domain::error::EnrollError;
use enroll_domain::id::{HardwareId, SiteToken, SpecificationToken};
use enroll_domain::search::{SearchCriteria, SearchResults};
use enroll_domain::site::Site;
use enroll_domain::specification::DeviceSpecification;

/// Backend capabilities consumed by the registration workflow.
///
/// Implementations must enforce uniqueness of hardware ids: a second
/// [`create_device`](Self::create_device) for the same id fails with
/// [`EnrollError::Conflict`].
pub trait DeviceManagement {
    /// Find a device by hardware id.
    fn get_device_by_hardware_id(
        &self,
        hardware_id: &HardwareId,
    ) -> impl Future<Output = Result<Option<Device>, EnrollError>> + Send;

    /// Find a device specification by token.
    fn get_device_specification_by_token(
        &self,
        token: &SpecificationToken,
    ) -> impl Future<Output = Result<Option<DeviceSpecification>, EnrollError>> + Send;

    /// Create a new device.
    fn create_device(
        &self,
        request: DeviceCreateRequest,
    ) -> impl Future<Output = Result<Device, EnrollError>> + Send;

    /// Find a site by token.
    fn get_site_by_token(
        &self,
        token: &SiteToken,
    ) -> impl Future<Output = Result<Option<Site>, EnrollError>> + Send;

    /// List sites, one page at a time.
    fn list_sites(
        &self,
        criteria: SearchCriteria,
    ) -> impl Future<Output = Result<SearchResults<Site>, EnrollError>> + Send;

    /// Bind a device to a site.
    fn create_device_assignment(
        &self,
        request: DeviceAssignmentCreateRequest,
    ) -> impl Future<Output = Result<DeviceAssignment, EnrollError>> + Send;
}

impl<T: DeviceManagement + Send + Sync> DeviceManagement for std::sync::Arc<T> {
    fn get_device_by_hardware_id(
        &self,
        hardware_id: &HardwareId,
    ) -> impl Future<Output = Result<Option<Device>, EnrollError>> + Send {
        (**self).get_device_by_hardware_id(hardware_id)
    }

    fn get_device_specification_by_token(
        &self,
        token: &SpecificationToken,
    ) -> impl Future<Output = Result<Option<DeviceSpecification>, EnrollError>> + Send {
        (**self).get_device_specification_by_token(token)
    }

    fn create_device(
        &self,
        request: DeviceCreateRequest,
    ) -> impl Future<Output = Result<Device, EnrollError>> + Send {
        (**self).create_device(request)
    }

    fn get_site_by_token(
        &self,
        token: &SiteToken,
    ) -> impl Future<Output = Result<Option<Site>, EnrollError>> + Send {
        (**self).get_site_by_token(token)
    }

    fn list_sites(
        &self,
        criteria: SearchCriteria,
    ) -> impl Future<Output = Result<SearchResults<Site>, EnrollError>> + Send {
        (**self).list_sites(criteria)
    }

    fn create_device_assignment(
        &self,
        request: DeviceAssignmentCreateRequest,
    ) -> impl Future<Output = Result<DeviceAssignment, EnrollError>> + Send {
        (**self).create_device_assignment(request)
    }
}
