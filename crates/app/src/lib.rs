//! # enroll-app
//!
//! Application layer: the registration use-case and **port definitions** (traits).
//!
//! ## Responsibilities
//! - Define **port traits** that adapters must implement (driven/outbound ports):
//!   - `DeviceManagement`: device, specification, site and assignment lookups/creation
//!   - `RegistrationSink`: delivery of registration outcomes to the device
//! - Define the **driving/inbound port** as a use-case struct:
//!   - `RegistrationService`: start/stop lifecycle and `handle_registration`
//! - Provide **in-process infrastructure** (outcome bus) that doesn't need IO
//!
//! ## Dependency rule
//! Depends on `enroll-domain` only (plus `tokio::sync` for channels).
//! Never imports adapter crates. Adapters depend on *this* crate, not the reverse.

pub mod config;
pub mod error;
pub mod outcome_bus;
pub mod ports;
pub mod services;
