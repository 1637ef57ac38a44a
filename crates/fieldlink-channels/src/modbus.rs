//! Modbus serial channel.
//!
//! Devices on this transport are wired to the gateway host over serial
//! adapters; the registry maps each device id to its port path. Both
//! directions are single-shot: open the port, transfer, close. There is
//! no persistent stream — receive is a poll of whatever lines are
//! currently buffered.

use crate::channel::{Channel, ChannelError, ChannelResult, MessageQueue};
use async_trait::async_trait;
use fieldlink_core::{encode_command, DeviceRegistry, Protocol, SerialSettings, LINE_SEPARATOR};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio_serial::SerialPortBuilderExt;
use tracing::{error, info};

/// Modbus serial transport channel.
pub struct ModbusChannel {
    settings: SerialSettings,
    devices: Arc<DeviceRegistry>,
    inbound: MessageQueue,
}

impl ModbusChannel {
    /// Create a channel over the configured serial parameters, feeding
    /// `inbound`.
    pub fn new(
        settings: SerialSettings,
        devices: Arc<DeviceRegistry>,
        inbound: MessageQueue,
    ) -> Self {
        Self {
            settings,
            devices,
            inbound,
        }
    }

    /// Resolve a device id to its bound serial port path.
    fn port_path(&self, device_id: &str) -> ChannelResult<String> {
        self.devices
            .serial_path(device_id)
            .map(str::to_string)
            .ok_or_else(|| ChannelError::DeviceNotFound(device_id.to_string()))
    }

    /// Open the port bound to `device_id`.
    fn open_port(&self, device_id: &str) -> ChannelResult<tokio_serial::SerialStream> {
        let path = self.port_path(device_id)?;
        tokio_serial::new(path, self.settings.baud_rate)
            .timeout(self.settings.timeout())
            .open_native_async()
            .map_err(|e| ChannelError::Connection(e.to_string()))
    }

    /// Check whether a device with the given hardware serial number is
    /// currently attached, via the configured external discovery tool.
    pub async fn probe_device(&self, serial_number: &str) -> ChannelResult<bool> {
        let mut parts = self.settings.probe_command.split_whitespace();
        let program = parts
            .next()
            .ok_or_else(|| ChannelError::Connection("empty probe command".to_string()))?;
        let output = tokio::process::Command::new(program)
            .args(parts)
            .output()
            .await?;

        let listing = String::from_utf8_lossy(&output.stdout);
        if listing.contains(serial_number) {
            info!("device {serial_number} connected");
            Ok(true)
        } else {
            error!("device {serial_number} disconnected");
            Ok(false)
        }
    }
}

#[async_trait]
impl Channel for ModbusChannel {
    fn protocol(&self) -> Protocol {
        Protocol::Modbus
    }

    fn inbound(&self) -> &MessageQueue {
        &self.inbound
    }

    async fn send(&self, command: &str, receiver: &str) -> ChannelResult<()> {
        let mut port = self.open_port(receiver)?;
        let payload = encode_command(command, Protocol::Modbus, receiver);
        port.write_all(payload.as_bytes()).await?;
        port.write_all(LINE_SEPARATOR.as_bytes()).await?;
        info!("sent command to {receiver} over serial");
        Ok(())
    }

    async fn receive(&self, device_id: &str) -> ChannelResult<()> {
        let port = self.open_port(device_id)?;
        let mut reader = BufReader::new(port);

        // Drain whatever is buffered right now; the read timeout bounds
        // the wait for each next line.
        let mut drained = 0usize;
        loop {
            let mut line = String::new();
            match tokio::time::timeout(self.settings.timeout(), reader.read_line(&mut line)).await
            {
                Ok(Ok(0)) => break,
                Ok(Ok(_)) => {
                    let line = line.trim_end().to_string();
                    if !line.is_empty() {
                        info!("serial inbound queue newly adds: {line}");
                        self.inbound.push(line);
                        drained += 1;
                    }
                }
                Ok(Err(e)) => return Err(e.into()),
                Err(_) => break,
            }
        }
        info!("serial poll for {device_id} drained {drained} lines");
        Ok(())
    }
}
