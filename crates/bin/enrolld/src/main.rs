//! # enrolld: enroll daemon
//!
//! Composition root that wires the registration service to its collaborators
//! and feeds it requests.
//!
//! ## Responsibilities
//! - Load configuration (config file, env vars) and install logging
//! - Seed the in-memory device-management backend from the catalog section
//! - Pick the outcome transport: MQTT when enabled, otherwise JSON lines on stdout
//! - Start the registration service (fails fast on bad auto-assign config)
//! - Read newline-delimited JSON registration requests from stdin
//! - Stop on EOF or Ctrl-C
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer: no domain logic belongs here.

mod config;

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;
use tracing_subscriber::EnvFilter;

use enroll_adapter_memory::InMemoryDeviceManagement;
use enroll_adapter_mqtt::MqttRegistrationSink;
use enroll_app::outcome_bus::OutcomeBus;
use enroll_app::ports::{DeviceManagement, RegistrationSink};
use enroll_app::services::registration_service::RegistrationService;
use enroll_domain::error::EnrollError;
use enroll_domain::registration::{RegistrationOutcome, RegistrationRequest};
use enroll_domain::site::Site;
use enroll_domain::specification::DeviceSpecification;

use crate::config::{CatalogConfig, Config};

const MQTT_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&config.logging.filter))
        .with_writer(std::io::stderr)
        .init();

    // Backend
    let backend = Arc::new(InMemoryDeviceManagement::new());
    seed(&backend, &config.catalog)?;

    // Transport + service
    if config.mqtt.enabled {
        let (sink, driver) = MqttRegistrationSink::spawn(&config.mqtt.client);
        let service = RegistrationService::new(backend, sink.clone(), config.registration);
        serve(&service).await?;
        sink.disconnect().await?;
        if tokio::time::timeout(MQTT_DRAIN_TIMEOUT, driver).await.is_err() {
            tracing::warn!("MQTT connection did not close in time");
        }
    } else {
        let bus = OutcomeBus::new(256);
        let printer = tokio::spawn(print_outcomes(bus.subscribe()));
        let service = RegistrationService::new(backend, bus, config.registration);
        serve(&service).await?;
        drop(service);
        printer.await?;
    }

    Ok(())
}

fn seed(backend: &InMemoryDeviceManagement, catalog: &CatalogConfig) -> Result<(), EnrollError> {
    for entry in &catalog.sites {
        let mut site = Site::builder().token(entry.token.as_str());
        if let Some(name) = &entry.name {
            site = site.name(name.as_str());
        }
        backend.add_site(site.build()?)?;
    }
    for entry in &catalog.specifications {
        backend.add_specification(DeviceSpecification::new(
            entry.token.as_str(),
            entry.name.as_str(),
        )?)?;
    }
    tracing::info!(
        sites = catalog.sites.len(),
        specifications = catalog.specifications.len(),
        "catalog loaded"
    );
    Ok(())
}

/// Start the service, then handle requests from stdin until EOF or Ctrl-C.
async fn serve<B, S>(
    service: &RegistrationService<B, S>,
) -> Result<(), Box<dyn std::error::Error>>
where
    B: DeviceManagement,
    S: RegistrationSink,
{
    service.start().await?;
    tracing::info!("enrolld ready, reading registration requests from stdin");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => match line? {
                Some(line) => handle_line(service, &line).await,
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("shutdown signal received");
                break;
            }
        }
    }

    service.stop();
    Ok(())
}

async fn handle_line<B, S>(service: &RegistrationService<B, S>, line: &str)
where
    B: DeviceManagement,
    S: RegistrationSink,
{
    let line = line.trim();
    if line.is_empty() {
        return;
    }
    let request: RegistrationRequest = match serde_json::from_str(line) {
        Ok(request) => request,
        Err(err) => {
            tracing::warn!(error = %err, "discarding malformed registration request");
            return;
        }
    };
    // Failures are per request; keep serving.
    if let Err(err) = service.handle_registration(request).await {
        let cause = std::error::Error::source(&err).map(ToString::to_string);
        tracing::error!(error = %err, cause = ?cause, "registration failed");
    }
}

async fn print_outcomes(mut rx: broadcast::Receiver<RegistrationOutcome>) {
    loop {
        match rx.recv().await {
            Ok(outcome) => match serde_json::to_string(&outcome) {
                Ok(json) => println!("{json}"),
                Err(err) => tracing::error!(error = %err, "failed to encode outcome"),
            },
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "outcome printer lagged");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
