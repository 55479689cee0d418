//! MQTT adapter error types.

use enroll_domain::error::EnrollError;

/// Errors specific to the MQTT adapter.
#[derive(Debug, thiserror::Error)]
pub enum MqttError {
    /// The rumqttc client rejected the request.
    #[error("MQTT client error")]
    Client(#[source] rumqttc::ClientError),

    /// Failed to encode an outcome as JSON.
    #[error("failed to encode MQTT payload")]
    PayloadEncode(#[source] serde_json::Error),

    /// The hardware id cannot be used as an MQTT topic level.
    #[error("hardware id is not a valid topic level: {0}")]
    InvalidTopicLevel(String),
}

impl From<MqttError> for EnrollError {
    fn from(err: MqttError) -> Self {
        Self::Transport(Box::new(err))
    }
}
