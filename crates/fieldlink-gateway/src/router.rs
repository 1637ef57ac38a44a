//! Command routing loop.
//!
//! The router is the single consumer of the shared queue. Each raw
//! envelope is decoded through the configured schema, the sender checked
//! against the device fleet, and the `(sender, command)` pair looked up
//! in the command map; a hit forwards the mapped next command to the
//! envelope's receiver over the mapped transport. Every fault along the
//! way is a logged drop — the loop itself never dies on bad input.

use crate::GatewayError;
use fieldlink_channels::{ChannelHub, MessageQueue};
use fieldlink_core::{CommandMap, DeviceRegistry, EnvelopeSchema};
use std::sync::Arc;
use tracing::{error, info};

/// The supervised command-processing loop.
#[derive(Clone)]
pub struct CommandRouter {
    schema: EnvelopeSchema,
    devices: Arc<DeviceRegistry>,
    commands: Arc<CommandMap>,
    shared: Arc<MessageQueue>,
    hub: Arc<ChannelHub>,
}

impl CommandRouter {
    /// Create a router over the shared queue and channel hub.
    pub fn new(
        schema: EnvelopeSchema,
        devices: Arc<DeviceRegistry>,
        commands: Arc<CommandMap>,
        shared: Arc<MessageQueue>,
        hub: Arc<ChannelHub>,
    ) -> Self {
        Self {
            schema,
            devices,
            commands,
            shared,
            hub,
        }
    }

    /// Consume the shared queue until it is torn down.
    pub async fn run(&self) -> Result<(), GatewayError> {
        info!("command router started");
        while let Some(raw) = self.shared.pop().await {
            info!("shared queue delivers: {raw}");
            self.process(&raw).await;
        }
        Ok(())
    }

    /// Route a single raw envelope.
    pub async fn process(&self, raw: &str) {
        let envelope = match self.schema.parse(raw) {
            Ok(envelope) => envelope,
            Err(e) => {
                error!("dropping malformed envelope: {e}");
                return;
            }
        };

        if !self.devices.is_known(&envelope.sender) {
            error!("{} is not a supported device id", envelope.sender);
            return;
        }

        let Some(route) = self.commands.route(&envelope.sender, &envelope.command) else {
            error!(
                "unsupported command {} for {}",
                envelope.command, envelope.sender
            );
            return;
        };

        if !self
            .hub
            .send_to(route.protocol, &route.next_command, &envelope.receiver)
            .await
        {
            error!(
                "forwarding {} over {} to {} failed",
                route.next_command, route.protocol, envelope.receiver
            );
        }
    }
}
