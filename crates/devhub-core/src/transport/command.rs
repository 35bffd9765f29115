//! MQTT command round trip.
//!
//! Publishes a command to a device's private topic and waits for the
//! correlated confirmation on `<topic>/publish`. Each call opens its own
//! broker connection, so concurrent calls never share in-flight state.

use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use tokio::time::timeout;
use tracing::debug;

use crate::error::TransportError;
use crate::protocol::{confirm_topic, CommandMessage, ConfirmationMessage};

/// Default deadline for a command round trip.
pub const COMMAND_TIMEOUT: Duration = Duration::from_secs(20);

/// Keep alive time to send `pingreq` to broker when the connection is idle.
const KEEP_ALIVE: Duration = Duration::from_secs(5);

/// Capacity of the client's bounded request channel.
const CHANNEL_CAPACITY: usize = 10;

/// Command/confirmation round trip against a device topic.
#[async_trait]
pub trait CommandTransport: Send + Sync {
    /// Publish `command` on `topic` and wait for a positive confirmation
    /// on the reply topic.
    async fn send_command(
        &self,
        topic: &str,
        command: &CommandMessage,
    ) -> Result<ConfirmationMessage, TransportError>;
}

/// MQTT implementation of [`CommandTransport`].
pub struct MqttCommandSender {
    host: String,
    port: u16,
    username: String,
    password: String,
    timeout: Duration,
}

impl MqttCommandSender {
    pub fn new(
        host: impl Into<String>,
        port: u16,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            username: username.into(),
            password: password.into(),
            timeout: COMMAND_TIMEOUT,
        }
    }

    /// Override the round-trip deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    // Unique per call so concurrent connections do not evict each other
    // from the broker.
    fn client_id(&self) -> String {
        format!("devhub-cmd-{:08x}", rand::thread_rng().gen::<u32>())
    }
}

#[async_trait]
impl CommandTransport for MqttCommandSender {
    async fn send_command(
        &self,
        topic: &str,
        command: &CommandMessage,
    ) -> Result<ConfirmationMessage, TransportError> {
        let payload =
            serde_json::to_vec(command).map_err(|e| TransportError::Payload(e.to_string()))?;

        let mut options = MqttOptions::new(self.client_id(), self.host.clone(), self.port);
        options.set_credentials(self.username.clone(), self.password.clone());
        options.set_keep_alive(KEEP_ALIVE);

        let (client, mut eventloop) = AsyncClient::new(options, CHANNEL_CAPACITY);
        let reply_topic = confirm_topic(topic);

        let outcome = timeout(self.timeout, async {
            // Subscribe before publishing so the reply cannot slip past.
            client
                .subscribe(reply_topic.as_str(), QoS::AtMostOnce)
                .await
                .map_err(|e| TransportError::Connection(e.to_string()))?;
            // QoS 2: the broker stores and forwards the command even if the
            // device is briefly offline.
            client
                .publish(topic, QoS::ExactlyOnce, false, payload)
                .await
                .map_err(|e| TransportError::Connection(e.to_string()))?;

            loop {
                match eventloop.poll().await {
                    Ok(Event::Incoming(Packet::Publish(publish)))
                        if publish.topic == reply_topic =>
                    {
                        let confirm: ConfirmationMessage =
                            serde_json::from_slice(&publish.payload)
                                .map_err(|e| TransportError::Payload(e.to_string()))?;

                        if confirm.status {
                            return Ok(confirm);
                        }
                        // A negative confirmation fails fast instead of
                        // running out the clock.
                        return Err(TransportError::Rejected(confirm.message.to_string()));
                    }
                    Ok(event) => {
                        debug!("mqtt event on {}: {:?}", topic, event);
                        continue;
                    }
                    Err(e) => return Err(TransportError::Connection(e.to_string())),
                }
            }
        })
        .await;

        let _ = client.disconnect().await;

        match outcome {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout {
                topic: topic.to_string(),
                seconds: self.timeout.as_secs(),
            }),
        }
    }
}
