//! # enroll-domain
//!
//! Pure domain model for the enroll device registration system.
//!
//! ## Responsibilities
//! - Foundational types: typed tokens, error conventions, timestamps, paging
//! - Define **Devices** (physical things identified by a hardware id)
//! - Define **Device specifications** (the declared type/capability profile of a device)
//! - Define **Sites** and **Assignments** (bindings of a device to a site)
//! - Define **Registration** messages (inbound requests and emitted outcomes)
//! - Contain all invariant enforcement for the types above
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or external IO crates.
//! All IO boundaries are expressed as traits in the `app` crate (ports).

pub mod error;
pub mod id;
pub mod search;
pub mod time;

pub mod assignment;
pub mod device;
pub mod registration;
pub mod site;
pub mod specification;
