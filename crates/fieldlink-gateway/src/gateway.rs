//! Gateway assembly.
//!
//! Builds the full pipeline out of a [`GatewayConfig`]: the channel hub
//! with one handler per transport, one supervised listener per
//! device × protocol combination, the command router, and the WebSocket
//! server endpoint on its own task.

use crate::router::CommandRouter;
use crate::supervisor::{SupervisedTask, Supervisor};
use crate::GatewayError;
use fieldlink_channels::{ChannelHub, MessageQueue, WebSocketServer};
use fieldlink_core::{DeviceRegistry, GatewayConfig};
use std::sync::Arc;
use tracing::{error, info};

/// The assembled gateway process.
pub struct Gateway {
    config: GatewayConfig,
}

impl Gateway {
    /// Create a gateway from resolved configuration.
    pub fn new(config: GatewayConfig) -> Self {
        Self { config }
    }

    /// The configuration this gateway runs with.
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Run the gateway until the process is terminated.
    ///
    /// Spawns the WebSocket server on its own task, then hands every
    /// listener and the router to the supervisor. Under the default
    /// restart policy this never returns.
    pub async fn run(&self) -> Result<(), GatewayError> {
        let devices = Arc::new(self.config.devices.clone());
        let shared = Arc::new(MessageQueue::new());
        let hub = Arc::new(ChannelHub::from_config(
            &self.config,
            devices.clone(),
            shared.clone(),
        ));
        let router = CommandRouter::new(
            self.config.schema,
            devices.clone(),
            Arc::new(self.config.commands.clone()),
            shared,
            hub.clone(),
        );

        let server = WebSocketServer::new(self.config.websocket.clone(), devices.clone());
        tokio::spawn(async move {
            if let Err(e) = server.run().await {
                error!("websocket server stopped running: {e}");
            }
        });
        info!("websocket server start working");

        let mut supervisor = Supervisor::new(self.config.restart);
        for task in listener_tasks(hub, &devices, router) {
            supervisor.register(task);
        }
        supervisor.run().await
    }
}

/// Build the supervised task set: one listener per device × protocol,
/// plus the command-processing loop.
pub fn listener_tasks(
    hub: Arc<ChannelHub>,
    devices: &DeviceRegistry,
    router: CommandRouter,
) -> Vec<SupervisedTask> {
    let mut tasks = Vec::new();
    for device_id in devices.device_ids() {
        for protocol in hub.protocols() {
            let hub = hub.clone();
            let device_id = device_id.to_string();
            tasks.push(SupervisedTask::new(
                format!("listen:{protocol}:{device_id}"),
                move || {
                    let hub = hub.clone();
                    let device_id = device_id.clone();
                    async move {
                        if hub.receive_from(protocol, &device_id).await {
                            Ok(())
                        } else {
                            Err(GatewayError::ListenerFault {
                                protocol,
                                device_id,
                            })
                        }
                    }
                },
            ));
        }
    }

    tasks.push(SupervisedTask::new("command-router", move || {
        let router = router.clone();
        async move { router.run().await }
    }));
    tasks
}

#[cfg(test)]
mod tests {
    use super::*;
    use fieldlink_core::EnvelopeSchema;

    #[test]
    fn test_task_census() {
        let config = GatewayConfig::default().with_devices(
            fieldlink_core::DeviceRegistry::new()
                .with_device("A")
                .with_device("B"),
        );
        let devices = Arc::new(config.devices.clone());
        let shared = Arc::new(MessageQueue::new());
        let hub = Arc::new(ChannelHub::from_config(&config, devices.clone(), shared.clone()));
        let router = CommandRouter::new(
            EnvelopeSchema::default(),
            devices.clone(),
            Arc::new(config.commands.clone()),
            shared,
            hub.clone(),
        );

        let tasks = listener_tasks(hub, &devices, router);
        // Two devices times three protocols, plus the router loop.
        assert_eq!(tasks.len(), 7);
        assert!(tasks.iter().any(|t| t.name() == "command-router"));
        assert!(tasks.iter().any(|t| t.name() == "listen:MQTT:A"));
        assert!(tasks.iter().any(|t| t.name() == "listen:Modbus:B"));
    }
}
