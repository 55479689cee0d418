//! Registration sink port: delivers registration outcomes back to devices.
//!
//! Each transport (MQTT, in-process bus, …) provides its own implementation.
//! The registration service calls exactly one of these methods per request.

use std::future::Future;

use enroll_domain::error::EnrollError;
use enroll_domain::id::HardwareId;

/// Outbound channel for registration outcomes.
pub trait RegistrationSink {
    /// Tell the device it is registered.
    fn send_ack(
        &self,
        hardware_id: &HardwareId,
        new_registration: bool,
    ) -> impl Future<Output = Result<(), EnrollError>> + Send;

    /// Tell the device its specification is unknown or does not match the
    /// one on record.
    fn send_invalid_specification(
        &self,
        hardware_id: &HardwareId,
    ) -> impl Future<Output = Result<(), EnrollError>> + Send;

    /// Tell the device a site token is required before it can be registered.
    fn send_site_token_required(
        &self,
        hardware_id: &HardwareId,
    ) -> impl Future<Output = Result<(), EnrollError>> + Send;
}

impl<T: RegistrationSink + Send + Sync> RegistrationSink for std::sync::Arc<T> {
    fn send_ack(
        &self,
        hardware_id: &HardwareId,
        new_registration: bool,
    ) -> impl Future<Output = Result<(), EnrollError>> + Send {
        (**self).send_ack(hardware_id, new_registration)
    }

    fn send_invalid_specification(
        &self,
        hardware_id: &HardwareId,
    ) -> impl Future<Output = Result<(), EnrollError>> + Send {
        (**self).send_invalid_specification(hardware_id)
    }

    fn send_site_token_required(
        &self,
        hardware_id: &HardwareId,
    ) -> impl Future<Output = Result<(), EnrollError>> + Send {
        (**self).send_site_token_required(hardware_id)
    }
}
