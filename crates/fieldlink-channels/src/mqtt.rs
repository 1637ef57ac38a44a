//! MQTT channel.
//!
//! Sends are one-shot: each call builds a fresh client, publishes the
//! envelope to the receiver's topic, waits for the broker's ack, and
//! disconnects. The receive side subscribes to the device's topic and
//! polls the network loop forever — connection errors are logged and
//! retried indefinitely without returning, so only process teardown ends
//! a subscription.

use crate::channel::{Channel, ChannelError, ChannelResult, MessageQueue};
use async_trait::async_trait;
use fieldlink_core::{encode_command, MqttSettings, Protocol};
use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use std::time::Duration;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Delay between receive-loop retries after a connection error.
const RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// MQTT transport channel.
pub struct MqttChannel {
    settings: MqttSettings,
    inbound: MessageQueue,
}

impl MqttChannel {
    /// Create a channel against the configured broker, feeding `inbound`.
    pub fn new(settings: MqttSettings, inbound: MessageQueue) -> Self {
        Self { settings, inbound }
    }

    /// Build client options for a fresh connection.
    ///
    /// Client ids must be unique per connection or the broker evicts the
    /// previous session, so every connection gets its own uuid.
    fn options(&self, role: &str) -> MqttOptions {
        let client_id = format!("fieldlink-{}-{}", role, Uuid::new_v4());
        let mut options = MqttOptions::new(client_id, &self.settings.host, self.settings.port);
        options.set_keep_alive(Duration::from_secs(self.settings.keep_alive_secs));
        if let (Some(username), Some(password)) =
            (&self.settings.username, &self.settings.password)
        {
            options.set_credentials(username, password);
        }
        options
    }
}

#[async_trait]
impl Channel for MqttChannel {
    fn protocol(&self) -> Protocol {
        Protocol::Mqtt
    }

    fn inbound(&self) -> &MessageQueue {
        &self.inbound
    }

    async fn send(&self, command: &str, receiver: &str) -> ChannelResult<()> {
        let (client, mut eventloop) = AsyncClient::new(self.options("pub"), 10);
        let payload = encode_command(command, Protocol::Mqtt, receiver);

        client
            .publish(receiver, QoS::AtLeastOnce, false, payload)
            .await
            .map_err(|e| ChannelError::Send(e.to_string()))?;

        // Drive the network loop until the broker acknowledges the
        // publish, bounded by the configured connect timeout.
        let deadline = self.settings.connect_timeout();
        tokio::time::timeout(deadline, async {
            loop {
                match eventloop.poll().await {
                    Ok(Event::Incoming(Packet::PubAck(_))) => break Ok(()),
                    Ok(_) => continue,
                    Err(e) => break Err(ChannelError::Connection(e.to_string())),
                }
            }
        })
        .await
        .map_err(|_| ChannelError::Timeout(deadline))??;

        let _ = client.disconnect().await;
        debug!("published command for {receiver}");
        Ok(())
    }

    async fn receive(&self, device_id: &str) -> ChannelResult<()> {
        let (client, mut eventloop) = AsyncClient::new(self.options("sub"), 10);
        client
            .subscribe(device_id, QoS::AtLeastOnce)
            .await
            .map_err(|e| ChannelError::Connection(e.to_string()))?;
        info!("mqtt subscription for {device_id} starting");

        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    match String::from_utf8(publish.payload.to_vec()) {
                        Ok(payload) => {
                            debug!("mqtt inbound queue newly adds: {payload}");
                            self.inbound.push(payload);
                        }
                        Err(_) => {
                            warn!(topic = %publish.topic, "dropping non-utf8 mqtt payload");
                        }
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    error!("mqtt connection error for {device_id}: {e}, retrying");
                    tokio::time::sleep(RECONNECT_DELAY).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_ids_are_unique() {
        let channel = MqttChannel::new(MqttSettings::default(), MessageQueue::new());
        let a = channel.options("pub");
        let b = channel.options("pub");
        assert_ne!(a.client_id(), b.client_id());
        assert!(a.client_id().starts_with("fieldlink-pub-"));
    }

    #[test]
    fn test_credentials_applied() {
        let settings = MqttSettings::new("broker.local").with_auth("user", "pass");
        let channel = MqttChannel::new(settings, MessageQueue::new());
        let options = channel.options("sub");
        assert_eq!(
            options.credentials(),
            Some(("user".to_string(), "pass".to_string()))
        );
    }
}
