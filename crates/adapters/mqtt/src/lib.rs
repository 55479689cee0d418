//! # enroll-adapter-mqtt
//!
//! MQTT adapter: delivers registration outcomes to devices.
//!
//! Each outcome is serialised as JSON and published with QoS 1 to
//! `{base_topic}/registration/{hardware_id}`, where the device is expected to
//! be subscribed.
//!
//! ## Dependency rule
//! Same as other adapters: depends on `enroll-app` and `enroll-domain`.

pub mod config;
pub mod error;
pub mod sink;

pub use config::MqttConfig;
pub use error::MqttError;
pub use sink::MqttRegistrationSink;
