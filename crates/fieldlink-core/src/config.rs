//! Gateway configuration.
//!
//! Everything the gateway needs to run is resolved here at startup:
//! broker and server endpoints, serial parameters, the envelope schema,
//! the restart policy, the device fleet, and the command map. Loaded from
//! a JSON file or built in code through the `with_*` helpers.

use crate::command::CommandMap;
use crate::device::DeviceRegistry;
use crate::envelope::EnvelopeSchema;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Configuration file could not be read
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file was not valid JSON
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

/// MQTT broker settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MqttSettings {
    /// Broker hostname or IP
    pub host: String,

    /// Broker port
    #[serde(default = "default_mqtt_port")]
    pub port: u16,

    /// Username for broker authentication
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    /// Password for broker authentication
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// Keep-alive interval in seconds
    #[serde(default = "default_keep_alive")]
    pub keep_alive_secs: u64,

    /// Bound on connect/publish handshakes in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

fn default_mqtt_port() -> u16 {
    1883
}
fn default_keep_alive() -> u64 {
    60
}
fn default_connect_timeout() -> u64 {
    10
}

impl MqttSettings {
    /// Create settings for a broker host with defaults.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: default_mqtt_port(),
            username: None,
            password: None,
            keep_alive_secs: default_keep_alive(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }

    /// Set the broker port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set broker credentials.
    pub fn with_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// The bound on connection handshakes.
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

impl Default for MqttSettings {
    fn default() -> Self {
        Self::new("localhost")
    }
}

/// WebSocket endpoint settings.
///
/// The gateway both serves this endpoint and connects to it as a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebSocketSettings {
    /// Bind/connect host
    #[serde(default = "default_ws_host")]
    pub host: String,

    /// Bind/connect port
    #[serde(default = "default_ws_port")]
    pub port: u16,
}

fn default_ws_host() -> String {
    "0.0.0.0".to_string()
}
fn default_ws_port() -> u16 {
    5678
}

impl WebSocketSettings {
    /// Create settings for a host/port pair.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Socket address string for binding the server.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// URL the client side connects to.
    pub fn url(&self) -> String {
        format!("ws://{}:{}", self.host, self.port)
    }
}

impl Default for WebSocketSettings {
    fn default() -> Self {
        Self {
            host: default_ws_host(),
            port: default_ws_port(),
        }
    }
}

/// Serial line settings shared by all Modbus devices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerialSettings {
    /// Baud rate for every bound port
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    /// Read timeout in milliseconds; also bounds the drain on a poll
    #[serde(default = "default_serial_timeout")]
    pub timeout_ms: u64,

    /// External command used to list attached devices for the probe
    #[serde(default = "default_probe_command")]
    pub probe_command: String,
}

fn default_baud_rate() -> u32 {
    115_200
}
fn default_serial_timeout() -> u64 {
    1000
}
fn default_probe_command() -> String {
    "hdc_std list targets".to_string()
}

impl SerialSettings {
    /// The read timeout as a duration.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for SerialSettings {
    fn default() -> Self {
        Self {
            baud_rate: default_baud_rate(),
            timeout_ms: default_serial_timeout(),
            probe_command: default_probe_command(),
        }
    }
}

/// What the supervisor does when a listener task ends.
///
/// Both observed policies are kept selectable rather than hard-coding one:
/// retry forever with a short fixed delay is the default; retrying only
/// until a task's first clean return is the alternate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum RestartPolicy {
    /// Resubmit after every completion, success or failure, forever.
    Always {
        /// Fixed delay before the restart, in seconds
        #[serde(default = "default_restart_delay")]
        delay_secs: u64,
    },
    /// Resubmit on failure only; a clean return retires the task.
    UntilSuccess,
}

fn default_restart_delay() -> u64 {
    5
}

impl RestartPolicy {
    /// Delay to apply before a restart, if the policy has one.
    pub fn restart_delay(&self) -> Duration {
        match self {
            Self::Always { delay_secs } => Duration::from_secs(*delay_secs),
            Self::UntilSuccess => Duration::ZERO,
        }
    }
}

impl Default for RestartPolicy {
    fn default() -> Self {
        Self::Always {
            delay_secs: default_restart_delay(),
        }
    }
}

/// Complete gateway configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// MQTT broker settings
    #[serde(default)]
    pub mqtt: MqttSettings,

    /// WebSocket endpoint settings
    #[serde(default)]
    pub websocket: WebSocketSettings,

    /// Serial line settings
    #[serde(default)]
    pub serial: SerialSettings,

    /// Positional layout of inbound envelopes
    #[serde(default)]
    pub schema: EnvelopeSchema,

    /// Listener restart policy
    #[serde(default)]
    pub restart: RestartPolicy,

    /// The device fleet
    #[serde(default)]
    pub devices: DeviceRegistry,

    /// The command routing table
    #[serde(default)]
    pub commands: CommandMap,
}

impl GatewayConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Set the device fleet.
    pub fn with_devices(mut self, devices: DeviceRegistry) -> Self {
        self.devices = devices;
        self
    }

    /// Set the command map.
    pub fn with_commands(mut self, commands: CommandMap) -> Self {
        self.commands = commands;
        self
    }

    /// Set the restart policy.
    pub fn with_restart(mut self, restart: RestartPolicy) -> Self {
        self.restart = restart;
        self
    }
}
