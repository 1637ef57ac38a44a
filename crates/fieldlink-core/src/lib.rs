//! Core data model for the FieldLink gateway.
//!
//! This crate holds everything the gateway shares across transports:
//! the command envelope wire codec, the protocol tag, the static device
//! registry, the per-device command routing table, and the gateway
//! configuration. All of it is plain data — resolved once at startup and
//! read-only afterwards, so none of it needs locking.

pub mod command;
pub mod config;
pub mod device;
pub mod envelope;
pub mod protocol;

pub use command::{CommandMap, CommandRoute};
pub use config::{
    ConfigError, GatewayConfig, MqttSettings, RestartPolicy, SerialSettings, WebSocketSettings,
};
pub use device::{DeviceRegistry, DeviceSpec};
pub use envelope::{
    decode_fields, encode_command, Envelope, EnvelopeError, EnvelopeSchema, FIELD_SEPARATOR,
    LINE_SEPARATOR,
};
pub use protocol::{Protocol, UnknownProtocol};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
