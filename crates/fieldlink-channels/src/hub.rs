//! Channel hub: the protocol-to-handler table.
//!
//! The hub is the single dispatch point between the routing logic and
//! the transports. Handlers are constructed once at startup and resolved
//! by [`Protocol`] tag at call time; an unregistered protocol is an
//! error log and a `false` return, never a panic — callers treat it as a
//! no-op.
//!
//! On the receive path the hub also runs the inbound queue bridge:
//! envelopes landing in a handler's private queue are moved, one at a
//! time and in arrival order, into the shared queue the router consumes.

use crate::channel::{Channel, MessageQueue};
use crate::modbus::ModbusChannel;
use crate::mqtt::MqttChannel;
use crate::websocket::WebSocketChannel;
use fieldlink_core::{DeviceRegistry, GatewayConfig, Protocol};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info};

/// Registry and dispatcher for all configured channels.
pub struct ChannelHub {
    channels: HashMap<Protocol, Arc<dyn Channel>>,
    shared: Arc<MessageQueue>,
}

impl ChannelHub {
    /// Create an empty hub feeding the given shared queue.
    pub fn new(shared: Arc<MessageQueue>) -> Self {
        Self {
            channels: HashMap::new(),
            shared,
        }
    }

    /// Build the full hub from configuration: one handler per supported
    /// transport, each with its own private inbound queue.
    pub fn from_config(
        config: &GatewayConfig,
        devices: Arc<DeviceRegistry>,
        shared: Arc<MessageQueue>,
    ) -> Self {
        Self::new(shared)
            .with_channel(Arc::new(MqttChannel::new(
                config.mqtt.clone(),
                MessageQueue::new(),
            )))
            .with_channel(Arc::new(WebSocketChannel::new(
                config.websocket.clone(),
                config.schema,
                MessageQueue::new(),
            )))
            .with_channel(Arc::new(ModbusChannel::new(
                config.serial.clone(),
                devices,
                MessageQueue::new(),
            )))
    }

    /// Register a channel under its own protocol tag.
    pub fn with_channel(mut self, channel: Arc<dyn Channel>) -> Self {
        self.channels.insert(channel.protocol(), channel);
        self
    }

    /// Registered protocols, in stable order.
    pub fn protocols(&self) -> Vec<Protocol> {
        let mut protocols: Vec<Protocol> = self.channels.keys().copied().collect();
        protocols.sort();
        protocols
    }

    /// The registered channel for `protocol`, if any.
    pub fn channel(&self, protocol: Protocol) -> Option<&Arc<dyn Channel>> {
        self.channels.get(&protocol)
    }

    /// Send one command envelope on the given transport.
    ///
    /// Returns `false` — never an error — when the protocol has no
    /// registered handler or the transport rejects the send.
    pub async fn send_to(&self, protocol: Protocol, command: &str, receiver: &str) -> bool {
        let Some(channel) = self.channels.get(&protocol) else {
            error!("no channel registered for protocol {protocol}");
            return false;
        };
        match channel.send(command, receiver).await {
            Ok(()) => true,
            Err(e) => {
                error!("send on {protocol} to {receiver} failed: {e}");
                false
            }
        }
    }

    /// Run one receive session for `device_id` on the given transport,
    /// bridging the handler's private queue into the shared queue for as
    /// long as the session lasts.
    ///
    /// Returns when the handler's receive call returns; `false` signals
    /// a transport fault (the supervisor re-invokes either way).
    pub async fn receive_from(&self, protocol: Protocol, device_id: &str) -> bool {
        let Some(channel) = self.channels.get(&protocol) else {
            error!("no channel registered for protocol {protocol}");
            return false;
        };

        let bridge = async {
            loop {
                let Some(message) = channel.inbound().pop().await else {
                    break;
                };
                info!("shared queue newly adds: {message}");
                self.shared.push(message);
            }
        };

        tokio::select! {
            _ = bridge => {
                // Only reachable if the private queue is torn down.
                false
            }
            result = channel.receive(device_id) => match result {
                Ok(()) => true,
                Err(e) => {
                    error!("receive on {protocol} for {device_id} failed: {e}");
                    false
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::MockChannel;
    use std::time::Duration;

    fn hub_with(mock: Arc<MockChannel>) -> (ChannelHub, Arc<MessageQueue>) {
        let shared = Arc::new(MessageQueue::new());
        let hub = ChannelHub::new(shared.clone()).with_channel(mock);
        (hub, shared)
    }

    #[tokio::test]
    async fn test_send_dispatches_to_registered_channel() {
        let mock = Arc::new(MockChannel::new(Protocol::WebSocket));
        let (hub, _) = hub_with(mock.clone());

        assert!(hub.send_to(Protocol::WebSocket, "template2", "B").await);
        assert_eq!(mock.sent(), vec![("template2".to_string(), "B".to_string())]);
    }

    #[tokio::test]
    async fn test_unregistered_protocol_is_a_noop() {
        let mock = Arc::new(MockChannel::new(Protocol::WebSocket));
        let (hub, _) = hub_with(mock.clone());

        assert!(!hub.send_to(Protocol::Mqtt, "template2", "B").await);
        assert!(!hub.receive_from(Protocol::Modbus, "A").await);
        assert!(mock.sent().is_empty());
    }

    #[tokio::test]
    async fn test_send_failure_reported_as_sentinel() {
        let mock = Arc::new(MockChannel::new(Protocol::Mqtt).with_failing_sends());
        let (hub, _) = hub_with(mock);
        assert!(!hub.send_to(Protocol::Mqtt, "x", "y").await);
    }

    #[tokio::test]
    async fn test_bridge_moves_messages_in_order() {
        let mock = Arc::new(
            MockChannel::new(Protocol::Mqtt).with_receive_delay(Duration::from_millis(50)),
        );
        let (hub, shared) = hub_with(mock.clone());

        for i in 0..10 {
            mock.inbound().push(format!("envelope-{i}"));
        }

        assert!(hub.receive_from(Protocol::Mqtt, "A").await);

        for i in 0..10 {
            assert_eq!(shared.pop().await.unwrap(), format!("envelope-{i}"));
        }
        assert_eq!(shared.try_pop(), None);
    }

    #[tokio::test]
    async fn test_bridge_keeps_draining_during_session() {
        let mock = Arc::new(
            MockChannel::new(Protocol::Mqtt).with_receive_delay(Duration::from_millis(50)),
        );
        let (hub, shared) = hub_with(mock.clone());

        let pusher = {
            let mock = mock.clone();
            tokio::spawn(async move {
                for i in 0..3 {
                    mock.inbound().push(format!("late-{i}"));
                    tokio::time::sleep(Duration::from_millis(5)).await;
                }
            })
        };

        assert!(hub.receive_from(Protocol::Mqtt, "A").await);
        pusher.await.unwrap();

        for i in 0..3 {
            assert_eq!(shared.pop().await.unwrap(), format!("late-{i}"));
        }
    }

    #[tokio::test]
    async fn test_from_config_registers_all_transports() {
        let config = fieldlink_core::GatewayConfig::default();
        let devices = Arc::new(fieldlink_core::DeviceRegistry::new().with_device("A"));
        let shared = Arc::new(MessageQueue::new());
        let hub = ChannelHub::from_config(&config, devices, shared);

        assert_eq!(
            hub.protocols(),
            vec![Protocol::Mqtt, Protocol::WebSocket, Protocol::Modbus]
        );
    }
}
