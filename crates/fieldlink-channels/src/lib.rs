//! Transport channels for the FieldLink gateway.
//!
//! A channel is a protocol-specific implementation of the uniform
//! send/receive contract: `send(command, receiver)` delivers one command
//! envelope, `receive(device_id)` feeds raw envelopes into the channel's
//! private inbound queue. The [`ChannelHub`] resolves a [`Protocol`] tag
//! to its handler and bridges private queues into the shared queue the
//! command router consumes.
//!
//! | Channel | Transport | Receive shape |
//! |---------|-----------|---------------|
//! | [`MqttChannel`] | broker pub/sub | subscribes and loops forever |
//! | [`WebSocketChannel`] | gateway's own WS endpoint | one session per invocation |
//! | [`ModbusChannel`] | bound serial port | single-shot poll |
//!
//! [`Protocol`]: fieldlink_core::Protocol

pub mod channel;
pub mod hub;
pub mod modbus;
pub mod mqtt;
pub mod websocket;

pub use channel::{Channel, ChannelError, ChannelResult, MessageQueue, MockChannel};
pub use hub::ChannelHub;
pub use modbus::ModbusChannel;
pub use mqtt::MqttChannel;
pub use websocket::{WebSocketChannel, WebSocketServer, SERVER_REPLY_PREFIX};
