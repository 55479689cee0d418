//! [`RegistrationSink`] that publishes outcomes to an MQTT broker.

use std::future::Future;
use std::time::Duration;

use rumqttc::{AsyncClient, ConnectionError, Event, EventLoop, MqttOptions, Outgoing, QoS};
use tokio::task::JoinHandle;

use enroll_app::ports::RegistrationSink;
use enroll_domain::error::EnrollError;
use enroll_domain::id::HardwareId;
use enroll_domain::registration::RegistrationOutcome;

use crate::config::MqttConfig;
use crate::error::MqttError;

const RECONNECT_DELAY: Duration = Duration::from_secs(2);

/// Publishes each registration outcome as JSON on the device's topic.
#[derive(Clone)]
pub struct MqttRegistrationSink {
    client: AsyncClient,
    base_topic: String,
}

impl MqttRegistrationSink {
    /// Create the sink and the event loop that must be polled for publishes
    /// to reach the broker. Nothing connects until the loop is polled.
    #[must_use]
    pub fn new(config: &MqttConfig) -> (Self, EventLoop) {
        let mut options = MqttOptions::new(
            config.client_id.clone(),
            config.broker_host.clone(),
            config.broker_port,
        );
        options.set_keep_alive(Duration::from_secs(u64::from(
            config.keep_alive_secs.max(1),
        )));
        let (client, eventloop) = AsyncClient::new(options, config.channel_capacity.max(1));
        let sink = Self {
            client,
            base_topic: config.base_topic.trim_end_matches('/').to_string(),
        };
        (sink, eventloop)
    }

    /// Create the sink and drive its event loop on a background task.
    ///
    /// The task reconnects after connection errors and ends after
    /// [`disconnect`](Self::disconnect) or once every handle is dropped.
    #[must_use]
    pub fn spawn(config: &MqttConfig) -> (Self, JoinHandle<()>) {
        let (sink, eventloop) = Self::new(config);
        tracing::info!(
            broker_host = %config.broker_host,
            broker_port = config.broker_port,
            base_topic = %sink.base_topic,
            "MQTT registration sink started"
        );
        (sink, tokio::spawn(drive(eventloop)))
    }

    /// Topic on which `hardware_id` receives its registration outcome.
    ///
    /// # Errors
    ///
    /// Returns [`MqttError::InvalidTopicLevel`] when the hardware id is empty
    /// or contains `/`, `+` or `#`.
    pub fn topic_for(&self, hardware_id: &HardwareId) -> Result<String, MqttError> {
        let level = hardware_id.as_str();
        if level.is_empty() || level.contains(['/', '+', '#']) {
            return Err(MqttError::InvalidTopicLevel(level.to_string()));
        }
        Ok(format!("{}/registration/{level}", self.base_topic))
    }

    /// Ask the broker connection to close once queued publishes are sent.
    ///
    /// # Errors
    ///
    /// Returns [`MqttError::Client`] if the event loop is already gone.
    pub async fn disconnect(&self) -> Result<(), MqttError> {
        self.client.disconnect().await.map_err(MqttError::Client)
    }

    async fn publish(&self, outcome: RegistrationOutcome) -> Result<(), EnrollError> {
        let topic = self.topic_for(outcome.hardware_id())?;
        let payload = encode(&outcome)?;
        self.client
            .publish(topic.as_str(), QoS::AtLeastOnce, false, payload)
            .await
            .map_err(MqttError::Client)?;
        tracing::debug!(topic = %topic, outcome = outcome.kind(), "outcome published");
        Ok(())
    }
}

fn encode(outcome: &RegistrationOutcome) -> Result<Vec<u8>, MqttError> {
    serde_json::to_vec(outcome).map_err(MqttError::PayloadEncode)
}

async fn drive(mut eventloop: EventLoop) {
    loop {
        match eventloop.poll().await {
            Ok(Event::Outgoing(Outgoing::Disconnect)) | Err(ConnectionError::RequestsDone) => {
                tracing::info!("MQTT registration sink stopped");
                return;
            }
            Ok(event) => tracing::trace!(?event, "MQTT event"),
            Err(err) => {
                tracing::warn!(error = %err, "MQTT connection error, reconnecting");
                tokio::time::sleep(RECONNECT_DELAY).await;
            }
        }
    }
}

impl RegistrationSink for MqttRegistrationSink {
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
