//! In-process outcome bus backed by a tokio broadcast channel.

use std::future::Future;

use tokio::sync::broadcast;

use enroll_domain::error::EnrollError;
use enroll_domain::id::HardwareId;
use enroll_domain::registration::RegistrationOutcome;

use crate::ports::RegistrationSink;

/// [`RegistrationSink`] that fans outcomes out to in-process subscribers.
///
/// Publishing succeeds even when there are no active subscribers
/// (the outcome is simply dropped).
#[derive(Clone)]
pub struct OutcomeBus {
    sender: broadcast::Sender<RegistrationOutcome>,
}

impl OutcomeBus {
    /// Create a new bus with the given channel capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to outcomes published *after* this call.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<RegistrationOutcome> {
        self.sender.subscribe()
    }

    fn publish(
        &self,
        outcome: RegistrationOutcome,
    ) -> impl Future<Output = Result<(), EnrollError>> + Send {
        // Only fails with zero receivers.
        let _ = self.sender.send(outcome);
        async { Ok(()) }
    }
}

impl RegistrationSink for OutcomeBus {
    fn send_ack(
        &self,
        hardware_id: &HardwareId,
        new_registration: bool,
    ) -> impl Future<Output = Result<(), EnrollError>> + Send {
        self.publish(RegistrationOutcome::Ack {
            hardware_id: hardware_id.clone(),
            new_registration,
        })
    }

    fn send_invalid_specification(
        &self,
        hardware_id: &HardwareId,
    ) -> impl Future<Output = Result<(), EnrollError>> + Send {
        self.publish(RegistrationOutcome::InvalidSpecification {
            hardware_id: hardware_id.clone(),
        })
    }

    fn send_site_token_required(
        &self,
        hardware_id: &HardwareId,
    ) -> impl Future<Output = Result<(), EnrollError>> + Send {
        self.publish(RegistrationOutcome::SiteTokenRequired {
            hardware_id: hardware_id.clone(),
        })
    }
}
