//! MQTT transport configuration.

use serde::Deserialize;

/// Configuration for the MQTT outcome transport.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MqttConfig {
    /// MQTT broker hostname or IP address.
    pub broker_host: String,
    /// MQTT broker port.
    pub broker_port: u16,
    /// MQTT client identifier.
    pub client_id: String,
    /// Topic prefix for every outcome published by enroll.
    pub base_topic: String,
    /// Keep-alive interval in seconds.
    pub keep_alive_secs: u16,
    /// Number of publishes that may be queued while the broker is unreachable.
    pub channel_capacity: usize,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            broker_host: "localhost".to_string(),
            broker_port: 1883,
            client_id: "enroll".to_string(),
            base_topic: "enroll".to_string(),
            keep_alive_secs: 30,
            channel_capacity: 64,
        }
    }
}
