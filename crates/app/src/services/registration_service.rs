//! Registration service: decides what happens to every device that
//! announces itself.
//!
//! For each request the service makes sure a device record exists, that its
//! specification matches the one announced, and that it is bound to a site,
//! then emits exactly one outcome through the [`RegistrationSink`].
//!
//! Lookup-then-create is not serialised per hardware id: two concurrent
//! first registrations of the same device both observe "no device" and both
//! try to create it. The backend is expected to reject the second creation
//! with [`EnrollError::Conflict`](enroll_domain::error::EnrollError::Conflict),
//! which surfaces here as [`RegistrationError::Backend`].

use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, Ordering};

use enroll_domain::assignment::DeviceAssignmentCreateRequest;
use enroll_domain::device::DeviceCreateRequest;
use enroll_domain::id::SiteToken;
use enroll_domain::registration::{RegistrationOutcome, RegistrationRequest};
use enroll_domain::search::SearchCriteria;

use crate::config::RegistrationConfig;
use crate::error::{ConfigurationError, RegistrationError};
use crate::ports::{DeviceManagement, RegistrationSink};

/// Application service running the device registration workflow.
pub struct RegistrationService<B, S> {
    backend: B,
    sink: S,
    config: RegistrationConfig,
    /// Auto-assignment site, written once by [`start`](Self::start).
    auto_assign_site: OnceLock<SiteToken>,
    running: AtomicBool,
}

impl<B, S> RegistrationService<B, S>
where
    B: DeviceManagement,
    S: RegistrationSink,
{
    /// Create a stopped service. Call [`start`](Self::start) before
    /// handing it any request.
    pub fn new(backend: B, sink: S, config: RegistrationConfig) -> Self {
        Self {
            backend,
            sink,
            config,
            auto_assign_site: OnceLock::new(),
            running: AtomicBool::new(false),
        }
    }

    /// Validate the configuration against the site catalog and start
    /// accepting registrations.
    ///
    /// With auto-assignment enabled, the configured site must exist; without
    /// a configured site, the first site of the catalog is adopted. With
    /// auto-assignment disabled nothing is checked. Starting a running
    /// service is a no-op, and the resolved site is never re-resolved.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::NoSites`] or
    /// [`ConfigurationError::UnknownSite`] when the auto-assignment site
    /// cannot be resolved, or [`ConfigurationError::Backend`] if the
    /// lookup itself fails. The service stays stopped on error.
    #[tracing::instrument(skip(self))]
    pub async fn start(&self) -> Result<(), ConfigurationError> {
        if self.is_running() {
            return Ok(());
        }
        tracing::info!("registration service starting");
        if self.config.auto_assign_site && self.auto_assign_site.get().is_none() {
            let token = self.resolve_auto_assign_site().await?;
            tracing::info!(site_token = %token, "unassigned devices will be auto-assigned");
            if let Err(token) = self.auto_assign_site.set(token) {
                tracing::debug!(
                    site_token = %token,
                    "auto-assignment site already resolved by a concurrent start"
                );
            }
        }
        self.running.store(true, Ordering::Release);
        Ok(())
    }

    /// Stop accepting registrations.
    pub fn stop(&self) {
        tracing::info!("registration service stopping");
        self.running.store(false, Ordering::Release);
    }

    /// Whether the service currently accepts registrations.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Whether unknown devices may register. Not enforced.
    #[must_use]
    pub fn allow_new_devices(&self) -> bool {
        self.config.allow_new_devices
    }

    /// Whether unassigned devices are bound to a default site.
    #[must_use]
    pub fn auto_assign_site(&self) -> bool {
        self.config.auto_assign_site
    }

    /// The auto-assignment site: the one resolved at start-up if any,
    /// otherwise the configured one.
    #[must_use]
    pub fn auto_assign_site_token(&self) -> Option<&SiteToken> {
        self.auto_assign_site
            .get()
            .or(self.config.auto_assign_site_token.as_ref())
    }

    /// Process one registration request and emit exactly one outcome.
    ///
    /// Returns the outcome that was sent.
    ///
    /// # Errors
    ///
    /// Returns [`RegistrationError::NotStarted`] if the service is not
    /// running, [`RegistrationError::InvalidRequest`] for a request without a
    /// hardware id, [`RegistrationError::Backend`]
    /// when a backend call fails, and [`RegistrationError::Outcome`] when
    /// the sink fails. Nothing is sent when the backend fails.
    #[tracing::instrument(skip(self, request), fields(hardware_id = %request.hardware_id))]
    pub async fn handle_registration(
        &self,
        request: RegistrationRequest,
    ) -> Result<RegistrationOutcome, RegistrationError> {
        if !self.is_running() {
            return Err(RegistrationError::NotStarted);
        }
        request.validate()?;
        tracing::debug!("handling device registration request");

        let existing = self
            .backend
            .get_device_by_hardware_id(&request.hardware_id)
            .await?;
        let specification = self
            .backend
            .get_device_specification_by_token(&request.specification_token)
            .await?;

        let (device, new_registration) = match existing {
            None => {
                if specification.is_none() {
                    tracing::debug!(
                        specification_token = %request.specification_token,
                        "unknown specification for new device"
                    );
                    return self.invalid_specification(request).await;
                }
                tracing::debug!("creating new device as part of registration");
                let create = DeviceCreateRequest::from_registration(&request);
                (self.backend.create_device(create).await?, true)
            }
            Some(device) if device.specification_token != request.specification_token => {
                tracing::debug!(
                    stored = %device.specification_token,
                    requested = %request.specification_token,
                    "specification does not match existing device"
                );
                return self.invalid_specification(request).await;
            }
            Some(device) => (device, false),
        };

        if !device.is_assigned() {
            let Some(site_token) = self.auto_assign_site.get() else {
                tracing::debug!("device is unassigned and auto-assignment is disabled");
                return self
                    .emit(RegistrationOutcome::SiteTokenRequired {
                        hardware_id: request.hardware_id,
                    })
                    .await;
            };
            tracing::debug!(site_token = %site_token, "auto-assigning unassigned device");
            self.backend
                .create_device_assignment(DeviceAssignmentCreateRequest::unassociated(
                    site_token.clone(),
                    device.hardware_id.clone(),
                ))
                .await?;
        }

        self.emit(RegistrationOutcome::Ack {
            hardware_id: request.hardware_id,
            new_registration,
        })
        .await
    }

    async fn resolve_auto_assign_site(&self) -> Result<SiteToken, ConfigurationError> {
        match &self.config.auto_assign_site_token {
            None => {
                let sites = self.backend.list_sites(SearchCriteria::new(1, 1)).await?;
                sites
                    .results
                    .into_iter()
                    .next()
                    .map(|site| site.token)
                    .ok_or(ConfigurationError::NoSites)
            }
            Some(token) => self
                .backend
                .get_site_by_token(token)
                .await?
                .map(|site| site.token)
                .ok_or_else(|| ConfigurationError::UnknownSite {
                    token: token.clone(),
                }),
        }
    }

    async fn invalid_specification(
        &self,
        request: RegistrationRequest,
    ) -> Result<RegistrationOutcome, RegistrationError> {
        self.emit(RegistrationOutcome::InvalidSpecification {
            hardware_id: request.hardware_id,
        })
        .await
    }

    async fn emit(
        &self,
        outcome: RegistrationOutcome,
    ) -> Result<RegistrationOutcome, RegistrationError> {
        let sent = match &outcome {
            RegistrationOutcome::Ack {
                hardware_id,
                new_registration,
            } => self.sink.send_ack(hardware_id, *new_registration).await,
            RegistrationOutcome::InvalidSpecification { hardware_id } => {
                self.sink.send_invalid_specification(hardware_id).await
            }
            RegistrationOutcome::SiteTokenRequired { hardware_id } => {
                self.sink.send_site_token_required(hardware_id).await
            }
        };
        sent.map_err(RegistrationError::Outcome)?;
        tracing::info!(outcome = outcome.kind(), "registration outcome sent");
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use enroll_domain::assignment::{AssignmentType, DeviceAssignment};
    use enroll_domain::device::{Device, ON_DEMAND_REGISTRATION_COMMENT};
    use enroll_domain::error::{ConflictError, EnrollError};
    use enroll_domain::id::{AssignmentToken, HardwareId, SpecificationToken};
    use enroll_domain::search::SearchResults;
    use enroll_domain::site::Site;
    use enroll_domain::specification::DeviceSpecification;
    use std::collections::HashMap;
    use std::future::Future;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct BackendState {
        devices: HashMap<HardwareId, Device>,
        specifications: Vec<SpecificationToken>,
        sites: Vec<Site>,
        created: Vec<DeviceCreateRequest>,
        assignments: Vec<DeviceAssignmentCreateRequest>,
        site_queries: Vec<SearchCriteria>,
        calls: Vec<&'static str>,
        fail_on: Option<&'static str>,
    }

    impl BackendState {
        fn record(&mut self, call: &'static str) -> Result<(), EnrollError> {
            self.calls.push(call);
            if self.fail_on == Some(call) {
                return Err(EnrollError::Storage(Box::new(std::io::Error::other(
                    "backend unavailable",
                ))));
            }
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakeBackend {
        state: Mutex<BackendState>,
    }

    impl FakeBackend {
        fn with_specification(self, token: &str) -> Self {
            self.state
                .lock()
                .unwrap()
                .specifications
                .push(SpecificationToken::new(token));
            self
        }

        fn with_site(self, token: &str) -> Self {
            let site = Site::builder().token(token).build().unwrap();
            self.state.lock().unwrap().sites.push(site);
            self
        }

        fn with_device(self, hardware_id: &str, spec: &str, assigned: bool) -> Self {
            let mut device = Device::from_request(
                DeviceCreateRequest::builder()
                    .hardware_id(hardware_id)
                    .specification_token(spec)
                    .build()
                    .unwrap(),
            );
            if assigned {
                device.assignment_token = Some(AssignmentToken::generate());
            }
            self.state
                .lock()
                .unwrap()
                .devices
                .insert(device.hardware_id.clone(), device);
            self
        }

        fn failing_on(self, call: &'static str) -> Self {
            self.state.lock().unwrap().fail_on = Some(call);
            self
        }

        fn calls(&self) -> Vec<&'static str> {
            self.state.lock().unwrap().calls.clone()
        }

        fn created(&self) -> Vec<DeviceCreateRequest> {
            self.state.lock().unwrap().created.clone()
        }

        fn assignments(&self) -> Vec<DeviceAssignmentCreateRequest> {
            self.state.lock().unwrap().assignments.clone()
        }

        fn site_queries(&self) -> Vec<SearchCriteria> {
            self.state.lock().unwrap().site_queries.clone()
        }
    }

    impl DeviceManagement for FakeBackend {
        fn get_device_by_hardware_id(
            &self,
            hardware_id: &HardwareId,
        ) -> impl Future<Output = Result<Option<Device>, EnrollError>> + Send {
            let mut state = self.state.lock().unwrap();
            let result = state
                .record("get_device")
                .map(|()| state.devices.get(hardware_id).cloned());
            async { result }
        }

        fn get_device_specification_by_token(
            &self,
            token: &SpecificationToken,
        ) -> impl Future<Output = Result<Option<DeviceSpecification>, EnrollError>> + Send
        {
            let mut state = self.state.lock().unwrap();
            let result = state.record("get_specification").map(|()| {
                state
                    .specifications
                    .contains(token)
                    .then(|| DeviceSpecification::new(token.clone(), "fake").unwrap())
            });
            async { result }
        }

        fn create_device(
            &self,
            request: DeviceCreateRequest,
        ) -> impl Future<Output = Result<Device, EnrollError>> + Send {
            let mut state = self.state.lock().unwrap();
            let result = state.record("create_device").and_then(|()| {
                if state.devices.contains_key(&request.hardware_id) {
                    return Err(ConflictError {
                        entity: "Device",
                        id: request.hardware_id.to_string(),
                        reason: "hardware id already registered",
                    }
                    .into());
                }
                state.created.push(request.clone());
                let device = Device::from_request(request);
                state
                    .devices
                    .insert(device.hardware_id.clone(), device.clone());
                Ok(device)
            });
            async { result }
        }

        fn get_site_by_token(
            &self,
            token: &SiteToken,
        ) -> impl Future<Output = Result<Option<Site>, EnrollError>> + Send {
            let mut state = self.state.lock().unwrap();
            let result = state
                .record("get_site")
                .map(|()| state.sites.iter().find(|s| &s.token == token).cloned());
            async { result }
        }

        fn list_sites(
            &self,
            criteria: SearchCriteria,
        ) -> impl Future<Output = Result<SearchResults<Site>, EnrollError>> + Send {
            let mut state = self.state.lock().unwrap();
            let result = state.record("list_sites").map(|()| {
                state.site_queries.push(criteria);
                criteria.paginate(&state.sites)
            });
            async { result }
        }

        fn create_device_assignment(
            &self,
            request: DeviceAssignmentCreateRequest,
        ) -> impl Future<Output = Result<DeviceAssignment, EnrollError>> + Send {
            let mut state = self.state.lock().unwrap();
            let result = state.record("create_assignment").map(|()| {
                state.assignments.push(request.clone());
                let assignment = DeviceAssignment::from_request(request);
                if let Some(device) = state.devices.get_mut(&assignment.device_hardware_id) {
                    device.assignment_token = Some(assignment.token.clone());
                }
                assignment
            });
            async { result }
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        sent: Mutex<Vec<RegistrationOutcome>>,
        fail: bool,
    }

    impl RecordingSink {
        fn failing() -> Self {
            Self {
                fail: true,
                ..Self::default()
            }
        }

        fn sent(&self) -> Vec<RegistrationOutcome> {
            self.sent.lock().unwrap().clone()
        }

        fn push(&self, outcome: RegistrationOutcome) -> Result<(), EnrollError> {
            if self.fail {
                return Err(EnrollError::Transport(Box::new(std::io::Error::other(
                    "broker down",
                ))));
            }
            self.sent.lock().unwrap().push(outcome);
            Ok(())
        }
    }

    impl RegistrationSink for RecordingSink {
        fn send_ack(
            &self,
            hardware_id: &HardwareId,
            new_registration: bool,
        ) -> impl Future<Output = Result<(), EnrollError>> + Send {
            let result = self.push(RegistrationOutcome::Ack {
                hardware_id: hardware_id.clone(),
                new_registration,
            });
            async { result }
        }

        fn send_invalid_specification(
            &self,
            hardware_id: &HardwareId,
        ) -> impl Future<Output = Result<(), EnrollError>> + Send {
            let result = self.push(RegistrationOutcome::InvalidSpecification {
                hardware_id: hardware_id.clone(),
            });
            async { result }
        }

        fn send_site_token_required(
            &self,
            hardware_id: &HardwareId,
        ) -> impl Future<Output = Result<(), EnrollError>> + Send {
            let result = self.push(RegistrationOutcome::SiteTokenRequired {
                hardware_id: hardware_id.clone(),
            });
            async { result }
        }
    }

    type Service = RegistrationService<Arc<FakeBackend>, Arc<RecordingSink>>;

    async fn started(
        backend: FakeBackend,
        config: RegistrationConfig,
    ) -> (Service, Arc<FakeBackend>, Arc<RecordingSink>) {
        let backend = Arc::new(backend);
        let sink = Arc::new(RecordingSink::default());
        let svc = RegistrationService::new(Arc::clone(&backend), Arc::clone(&sink), config);
        svc.start().await.unwrap();
        (svc, backend, sink)
    }

    fn request(hardware_id: &str, spec: &str) -> RegistrationRequest {
        RegistrationRequest::builder()
            .hardware_id(hardware_id)
            .specification_token(spec)
            .build()
            .unwrap()
    }

    fn ack(hardware_id: &str, new_registration: bool) -> RegistrationOutcome {
        RegistrationOutcome::Ack {
            hardware_id: HardwareId::new(hardware_id),
            new_registration,
        }
    }

    #[tokio::test]
    async fn should_create_assign_and_ack_when_device_is_new() {
        let backend = FakeBackend::default()
            .with_specification("SPEC-A")
            .with_site("SITE-1");
        let (svc, backend, sink) = started(backend, RegistrationConfig::auto_assign()).await;

        let registration = RegistrationRequest::builder()
            .hardware_id("DEV-1")
            .specification_token("SPEC-A")
            .metadata("fw", "1.2")
            .build()
            .unwrap();
        let outcome = svc.handle_registration(registration).await.unwrap();

        assert_eq!(outcome, ack("DEV-1", true));
        assert_eq!(sink.sent(), vec![ack("DEV-1", true)]);

        let created = backend.created();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].hardware_id.as_str(), "DEV-1");
        assert_eq!(created[0].specification_token.as_str(), "SPEC-A");
        assert_eq!(created[0].metadata.get("fw").map(String::as_str), Some("1.2"));
        assert_eq!(
            created[0].comments.as_deref(),
            Some(ON_DEMAND_REGISTRATION_COMMENT)
        );

        let assignments = backend.assignments();
        assert_eq!(assignments.len(), 1);
        assert_eq!(assignments[0].site_token.as_str(), "SITE-1");
        assert_eq!(assignments[0].device_hardware_id.as_str(), "DEV-1");
        assert_eq!(assignments[0].assignment_type, AssignmentType::Unassociated);
    }

    #[tokio::test]
    async fn should_send_invalid_specification_when_new_device_has_unknown_spec() {
        let backend = FakeBackend::default().with_site("SITE-1");
        let (svc, backend, sink) = started(backend, RegistrationConfig::auto_assign()).await;

        let outcome = svc
            .handle_registration(request("DEV-1", "SPEC-MISSING"))
            .await
            .unwrap();

        let expected = RegistrationOutcome::InvalidSpecification {
            hardware_id: HardwareId::new("DEV-1"),
        };
        assert_eq!(outcome, expected);
        assert_eq!(sink.sent(), vec![expected]);
        assert!(backend.created().is_empty());
        assert!(backend.assignments().is_empty());
    }

    #[tokio::test]
    async fn should_send_invalid_specification_when_existing_device_spec_differs() {
        let backend = FakeBackend::default()
            .with_specification("SPEC-A")
            .with_specification("SPEC-B")
            .with_site("SITE-1")
            .with_device("DEV-1", "SPEC-A", false);
        let (svc, backend, sink) = started(backend, RegistrationConfig::auto_assign()).await;

        let outcome = svc
            .handle_registration(request("DEV-1", "SPEC-B"))
            .await
            .unwrap();

        assert!(matches!(
            outcome,
            RegistrationOutcome::InvalidSpecification { .. }
        ));
        assert_eq!(sink.sent().len(), 1);
        assert!(backend.created().is_empty());
        assert!(backend.assignments().is_empty());
    }

    #[tokio::test]
    async fn should_require_site_token_when_unassigned_and_auto_assign_disabled() {
        let backend = FakeBackend::default()
            .with_specification("SPEC-A")
            .with_device("DEV-1", "SPEC-A", false);
        let (svc, backend, sink) = started(backend, RegistrationConfig::default()).await;

        let outcome = svc
            .handle_registration(request("DEV-1", "SPEC-A"))
            .await
            .unwrap();

        let expected = RegistrationOutcome::SiteTokenRequired {
            hardware_id: HardwareId::new("DEV-1"),
        };
        assert_eq!(outcome, expected);
        assert_eq!(sink.sent(), vec![expected]);
        assert!(backend.assignments().is_empty());
    }

    #[tokio::test]
    async fn should_keep_new_device_but_require_site_when_auto_assign_disabled() {
        let backend = FakeBackend::default().with_specification("SPEC-A");
        let (svc, backend, sink) = started(backend, RegistrationConfig::default()).await;

        svc.handle_registration(request("DEV-1", "SPEC-A"))
            .await
            .unwrap();

        assert_eq!(backend.created().len(), 1);
        assert!(backend.assignments().is_empty());
        assert_eq!(sink.sent()[0].kind(), "site_token_required");
    }

    #[tokio::test]
    async fn should_auto_assign_existing_unassigned_device_to_configured_site() {
        let backend = FakeBackend::default()
            .with_specification("SPEC-A")
            .with_site("SITE-1")
            .with_site("SITE-2")
            .with_device("DEV-1", "SPEC-A", false);
        let (svc, backend, sink) =
            started(backend, RegistrationConfig::auto_assign_to("SITE-2")).await;

        svc.handle_registration(request("DEV-1", "SPEC-A"))
            .await
            .unwrap();

        let assignments = backend.assignments();
        assert_eq!(assignments.len(), 1);
        assert_eq!(assignments[0].site_token.as_str(), "SITE-2");
        assert_eq!(sink.sent(), vec![ack("DEV-1", false)]);
    }

    #[tokio::test]
    async fn should_ack_existing_assigned_device_without_side_effects() {
        let backend = FakeBackend::default()
            .with_specification("SPEC-A")
            .with_device("DEV-1", "SPEC-A", true);
        let (svc, backend, sink) = started(backend, RegistrationConfig::default()).await;

        let outcome = svc
            .handle_registration(request("DEV-1", "SPEC-A"))
            .await
            .unwrap();

        assert_eq!(outcome, ack("DEV-1", false));
        assert_eq!(sink.sent().len(), 1);
        assert!(backend.created().is_empty());
        assert!(backend.assignments().is_empty());
    }

    #[tokio::test]
    async fn should_ack_existing_device_even_when_its_specification_is_gone() {
        let backend = FakeBackend::default().with_device("DEV-1", "SPEC-OLD", true);
        let (svc, _backend, _sink) = started(backend, RegistrationConfig::default()).await;

        let outcome = svc
            .handle_registration(request("DEV-1", "SPEC-OLD"))
            .await
            .unwrap();

        assert_eq!(outcome, ack("DEV-1", false));
    }

    #[tokio::test]
    async fn should_look_up_device_then_specification_before_acting() {
        let backend = FakeBackend::default()
            .with_specification("SPEC-A")
            .with_device("DEV-1", "SPEC-A", true);
        let (svc, backend, _sink) = started(backend, RegistrationConfig::default()).await;

        svc.handle_registration(request("DEV-1", "SPEC-A"))
            .await
            .unwrap();

        assert_eq!(backend.calls(), vec!["get_device", "get_specification"]);
    }

    #[tokio::test]
    async fn should_report_new_registration_only_on_first_sighting() {
        let backend = FakeBackend::default()
            .with_specification("SPEC-A")
            .with_site("SITE-1");
        let (svc, backend, sink) = started(backend, RegistrationConfig::auto_assign()).await;

        svc.handle_registration(request("DEV-1", "SPEC-A"))
            .await
            .unwrap();
        svc.handle_registration(request("DEV-1", "SPEC-A"))
            .await
            .unwrap();

        assert_eq!(sink.sent(), vec![ack("DEV-1", true), ack("DEV-1", false)]);
        assert_eq!(backend.created().len(), 1);
        assert_eq!(backend.assignments().len(), 1);
    }

    // `allow_new_devices` is carried but not enforced; unknown devices are
    // still created when it is false.
    #[tokio::test]
    async fn should_still_create_device_when_new_devices_are_disallowed() {
        let backend = FakeBackend::default()
            .with_specification("SPEC-A")
            .with_site("SITE-1");
        let config = RegistrationConfig {
            allow_new_devices: false,
            ..RegistrationConfig::auto_assign()
        };
        let (svc, backend, _sink) = started(backend, config).await;

        let outcome = svc
            .handle_registration(request("DEV-1", "SPEC-A"))
            .await
            .unwrap();

        assert!(!svc.allow_new_devices());
        assert_eq!(outcome, ack("DEV-1", true));
        assert_eq!(backend.created().len(), 1);
    }

    #[tokio::test]
    async fn should_propagate_backend_error_without_sending_outcome() {
        let backend = FakeBackend::default()
            .with_specification("SPEC-A")
            .with_site("SITE-1")
            .failing_on("create_device");
        let (svc, backend, sink) = started(backend, RegistrationConfig::auto_assign()).await;

        let result = svc.handle_registration(request("DEV-1", "SPEC-A")).await;

        assert!(matches!(
            result,
            Err(RegistrationError::Backend(EnrollError::Storage(_)))
        ));
        assert!(sink.sent().is_empty());
        assert!(!backend.calls().contains(&"create_assignment"));
    }

    #[tokio::test]
    async fn should_abort_when_assignment_creation_fails() {
        let backend = FakeBackend::default()
            .with_specification("SPEC-A")
            .with_site("SITE-1")
            .failing_on("create_assignment");
        let (svc, _backend, sink) = started(backend, RegistrationConfig::auto_assign()).await;

        let result = svc.handle_registration(request("DEV-1", "SPEC-A")).await;

        assert!(matches!(result, Err(RegistrationError::Backend(_))));
        assert!(sink.sent().is_empty());
    }

    #[tokio::test]
    async fn should_propagate_sink_failure_as_outcome_error() {
        let backend = Arc::new(
            FakeBackend::default()
                .with_specification("SPEC-A")
                .with_device("DEV-1", "SPEC-A", true),
        );
        let svc = RegistrationService::new(
            backend,
            RecordingSink::failing(),
            RegistrationConfig::default(),
        );
        svc.start().await.unwrap();

        let result = svc.handle_registration(request("DEV-1", "SPEC-A")).await;

        assert!(matches!(
            result,
            Err(RegistrationError::Outcome(EnrollError::Transport(_)))
        ));
    }

    #[tokio::test]
    async fn should_reject_request_without_hardware_id_before_touching_backend() {
        let (svc, backend, sink) =
            started(FakeBackend::default(), RegistrationConfig::default()).await;
        let malformed = RegistrationRequest {
            hardware_id: HardwareId::new(""),
            specification_token: SpecificationToken::new("SPEC-A"),
            site_token: None,
            metadata: std::collections::BTreeMap::new(),
        };

        let result = svc.handle_registration(malformed).await;

        assert!(matches!(result, Err(RegistrationError::InvalidRequest(_))));
        assert!(backend.calls().is_empty());
        assert!(sink.sent().is_empty());
    }

    #[tokio::test]
    async fn should_send_invalid_specification_for_new_device_with_empty_spec_token() {
        let backend = FakeBackend::default()
            .with_specification("SPEC-A")
            .with_site("SITE-1");
        let (svc, backend, sink) = started(backend, RegistrationConfig::auto_assign()).await;

        let outcome = svc.handle_registration(request("DEV-1", "")).await.unwrap();

        let expected = RegistrationOutcome::InvalidSpecification {
            hardware_id: HardwareId::new("DEV-1"),
        };
        assert_eq!(outcome, expected);
        assert_eq!(sink.sent(), vec![expected]);
        assert_eq!(backend.calls(), vec!["get_device", "get_specification"]);
    }

    #[tokio::test]
    async fn should_send_invalid_specification_for_known_device_with_empty_spec_token() {
        let backend = FakeBackend::default()
            .with_specification("SPEC-A")
            .with_device("DEV-1", "SPEC-A", true);
        let (svc, backend, sink) = started(backend, RegistrationConfig::default()).await;

        let outcome = svc.handle_registration(request("DEV-1", "")).await.unwrap();

        assert_eq!(outcome.kind(), "invalid_specification");
        assert_eq!(sink.sent().len(), 1);
        assert!(backend.created().is_empty());
    }

    #[tokio::test]
    async fn should_abort_when_device_lookup_fails() {
        let backend = FakeBackend::default()
            .with_specification("SPEC-A")
            .with_site("SITE-1")
            .failing_on("get_device");
        let (svc, backend, sink) = started(backend, RegistrationConfig::auto_assign()).await;

        let result = svc.handle_registration(request("DEV-1", "SPEC-A")).await;

        assert!(matches!(
            result,
            Err(RegistrationError::Backend(EnrollError::Storage(_)))
        ));
        assert!(sink.sent().is_empty());
        assert_eq!(backend.calls(), vec!["list_sites", "get_device"]);
    }

    #[tokio::test]
    async fn should_abort_when_specification_lookup_fails() {
        let backend = FakeBackend::default()
            .with_specification("SPEC-A")
            .with_site("SITE-1")
            .failing_on("get_specification");
        let (svc, backend, sink) = started(backend, RegistrationConfig::auto_assign()).await;

        let result = svc.handle_registration(request("DEV-1", "SPEC-A")).await;

        assert!(matches!(
            result,
            Err(RegistrationError::Backend(EnrollError::Storage(_)))
        ));
        assert!(sink.sent().is_empty());
        assert!(backend.created().is_empty());
        assert!(!backend.calls().contains(&"create_device"));
    }

    #[tokio::test]
    async fn should_adopt_first_site_when_no_token_configured() {
        let backend = FakeBackend::default()
            .with_site("SITE-1")
            .with_site("SITE-2");
        let (svc, backend, _sink) = started(backend, RegistrationConfig::auto_assign()).await;

        assert_eq!(svc.auto_assign_site_token(), Some(&SiteToken::new("SITE-1")));
        assert_eq!(backend.site_queries(), vec![SearchCriteria::new(1, 1)]);
    }

    #[tokio::test]
    async fn should_fail_start_when_auto_assign_has_no_sites() {
        let backend = Arc::new(FakeBackend::default().with_specification("SPEC-A"));
        let sink = Arc::new(RecordingSink::default());
        let svc = RegistrationService::new(
            backend,
            Arc::clone(&sink),
            RegistrationConfig::auto_assign(),
        );

        let result = svc.start().await;

        assert!(matches!(result, Err(ConfigurationError::NoSites)));
        assert!(!svc.is_running());
        let rejected = svc.handle_registration(request("DEV-1", "SPEC-A")).await;
        assert!(matches!(rejected, Err(RegistrationError::NotStarted)));
        assert!(sink.sent().is_empty());
    }

    #[tokio::test]
    async fn should_fail_start_when_configured_site_is_unknown() {
        let backend = FakeBackend::default().with_site("SITE-1");
        let svc = RegistrationService::new(
            backend,
            RecordingSink::default(),
            RegistrationConfig::auto_assign_to("SITE-404"),
        );

        let result = svc.start().await;

        assert!(matches!(
            result,
            Err(ConfigurationError::UnknownSite { token }) if token.as_str() == "SITE-404"
        ));
        assert!(!svc.is_running());
    }

    #[tokio::test]
    async fn should_fail_start_when_site_lookup_fails() {
        let backend = FakeBackend::default().failing_on("list_sites");
        let svc = RegistrationService::new(
            backend,
            RecordingSink::default(),
            RegistrationConfig::auto_assign(),
        );

        let result = svc.start().await;

        assert!(matches!(result, Err(ConfigurationError::Backend(_))));
    }

    #[tokio::test]
    async fn should_fail_start_when_configured_site_lookup_fails() {
        let backend = FakeBackend::default()
            .with_site("SITE-1")
            .failing_on("get_site");
        let svc = RegistrationService::new(
            backend,
            RecordingSink::default(),
            RegistrationConfig::auto_assign_to("SITE-1"),
        );

        let result = svc.start().await;

        assert!(matches!(
            result,
            Err(ConfigurationError::Backend(EnrollError::Storage(_)))
        ));
        assert!(!svc.is_running());
        assert_eq!(svc.auto_assign_site_token(), Some(&SiteToken::new("SITE-1")));
        let rejected = svc.handle_registration(request("DEV-1", "SPEC-A")).await;
        assert!(matches!(rejected, Err(RegistrationError::NotStarted)));
    }

    #[tokio::test]
    async fn should_keep_first_resolved_site_when_started_concurrently() {
        let backend = FakeBackend::default()
            .with_site("SITE-1")
            .with_site("SITE-2");
        let svc = RegistrationService::new(
            backend,
            RecordingSink::default(),
            RegistrationConfig::auto_assign(),
        );

        let (first, second) = tokio::join!(svc.start(), svc.start());

        assert!(first.is_ok());
        assert!(second.is_ok());
        assert!(svc.is_running());
        assert_eq!(svc.auto_assign_site_token(), Some(&SiteToken::new("SITE-1")));
    }

    #[tokio::test]
    async fn should_skip_site_validation_when_auto_assign_disabled() {
        let config = RegistrationConfig {
            auto_assign_site_token: Some(SiteToken::new("STALE")),
            ..RegistrationConfig::default()
        };
        let (svc, backend, _sink) = started(FakeBackend::default(), config).await;

        assert!(svc.is_running());
        assert!(backend.calls().is_empty());
        assert_eq!(svc.auto_assign_site_token(), Some(&SiteToken::new("STALE")));
    }

    #[tokio::test]
    async fn should_not_resolve_site_again_when_restarted() {
        let backend = FakeBackend::default().with_site("SITE-1");
        let (svc, backend, _sink) = started(backend, RegistrationConfig::auto_assign()).await;

        svc.start().await.unwrap();
        svc.stop();
        svc.start().await.unwrap();

        assert_eq!(backend.site_queries().len(), 1);
        assert_eq!(svc.auto_assign_site_token(), Some(&SiteToken::new("SITE-1")));
    }

    #[tokio::test]
    async fn should_reject_registrations_after_stop() {
        let backend = FakeBackend::default().with_specification("SPEC-A");
        let (svc, backend, _sink) = started(backend, RegistrationConfig::default()).await;

        svc.stop();
        let result = svc.handle_registration(request("DEV-1", "SPEC-A")).await;

        assert!(matches!(result, Err(RegistrationError::NotStarted)));
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn should_reject_registrations_before_start() {
        let svc = RegistrationService::new(
            FakeBackend::default(),
            RecordingSink::default(),
            RegistrationConfig::default(),
        );

        let result = svc.handle_registration(request("DEV-1", "SPEC-A")).await;

        assert!(matches!(result, Err(RegistrationError::NotStarted)));
    }

    #[test]
    fn should_expose_configuration_accessors() {
        let svc = RegistrationService::new(
            FakeBackend::default(),
            RecordingSink::default(),
            RegistrationConfig::auto_assign_to("SITE-1"),
        );

        assert!(svc.allow_new_devices());
        assert!(svc.auto_assign_site());
        assert_eq!(svc.auto_assign_site_token(), Some(&SiteToken::new("SITE-1")));
    }
}
