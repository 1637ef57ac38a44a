//! Command envelope wire codec.
//!
//! Envelopes are the message unit exchanged between devices and the
//! gateway on every transport: CRLF-separated `key: value` lines in a
//! fixed field order. The outbound form is always
//!
//! ```text
//! command: {command}
//! protocol: {protocol}
//! receiver: {receiver}
//! ```
//!
//! Decoding is positional: each line is split once on `": "` and the
//! right-hand side kept, then an [`EnvelopeSchema`] maps positions to the
//! sender / command / receiver roles. The schema is configuration because
//! the field order is fixed by device firmware, not by this crate —
//! deployments must confirm their indices before going live.

use crate::protocol::Protocol;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Separator between a field key and its value.
pub const FIELD_SEPARATOR: &str = ": ";

/// Separator between envelope lines.
pub const LINE_SEPARATOR: &str = "\r\n";

/// Error type for envelope decoding.
///
/// A malformed envelope is always a dropped message, never a crash: the
/// router logs these and moves on.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnvelopeError {
    /// The raw message contained no lines at all
    #[error("empty envelope")]
    Empty,

    /// A line did not contain the `": "` key/value separator
    #[error("malformed envelope line {0}: missing field separator")]
    MalformedLine(usize),

    /// The configured schema points past the decoded field list
    #[error("envelope has {found} fields, position {position} required")]
    MissingField { position: usize, found: usize },
}

/// A decoded inbound envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// Originating device id
    pub sender: String,
    /// Opaque command token
    pub command: String,
    /// Target device id
    pub receiver: String,
}

/// Encode an outbound command envelope.
///
/// This is the exact payload published to MQTT topics, transmitted over
/// WebSocket connections, and written to serial ports.
pub fn encode_command(command: &str, protocol: Protocol, receiver: &str) -> String {
    format!("command: {command}\r\nprotocol: {protocol}\r\nreceiver: {receiver}")
}

/// Decode a raw envelope into its positional field values.
///
/// Each line is split once on [`FIELD_SEPARATOR`]; the value keeps any
/// further separator occurrences intact.
pub fn decode_fields(raw: &str) -> Result<Vec<String>, EnvelopeError> {
    let mut fields = Vec::new();
    for (index, line) in raw.lines().enumerate() {
        let (_, value) = line
            .split_once(FIELD_SEPARATOR)
            .ok_or(EnvelopeError::MalformedLine(index))?;
        fields.push(value.to_string());
    }
    if fields.is_empty() {
        return Err(EnvelopeError::Empty);
    }
    Ok(fields)
}

/// Positional layout of inbound envelopes.
///
/// Maps decoded field positions to the three semantic roles the router
/// needs. Defaults to `[sender, command, receiver]` in line order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvelopeSchema {
    /// Position of the originating device id
    #[serde(default = "default_sender_position")]
    pub sender: usize,
    /// Position of the command token
    #[serde(default = "default_command_position")]
    pub command: usize,
    /// Position of the target device id
    #[serde(default = "default_receiver_position")]
    pub receiver: usize,
}

fn default_sender_position() -> usize {
    0
}
fn default_command_position() -> usize {
    1
}
fn default_receiver_position() -> usize {
    2
}

impl Default for EnvelopeSchema {
    fn default() -> Self {
        Self {
            sender: 0,
            command: 1,
            receiver: 2,
        }
    }
}

impl EnvelopeSchema {
    /// Decode a raw envelope and project it through this schema.
    pub fn parse(&self, raw: &str) -> Result<Envelope, EnvelopeError> {
        let fields = decode_fields(raw)?;
        Ok(Envelope {
            sender: self.field(&fields, self.sender)?,
            command: self.field(&fields, self.command)?,
            receiver: self.field(&fields, self.receiver)?,
        })
    }

    fn field(&self, fields: &[String], position: usize) -> Result<String, EnvelopeError> {
        fields
            .get(position)
            .cloned()
            .ok_or(EnvelopeError::MissingField {
                position,
                found: fields.len(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_format() {
        let payload = encode_command("template1", Protocol::Mqtt, "A");
        assert_eq!(payload, "command: template1\r\nprotocol: MQTT\r\nreceiver: A");
    }

    #[test]
    fn test_encode_decode_round_trip() {
        let payload = encode_command("reset", Protocol::WebSocket, "device-7");
        let fields = decode_fields(&payload).unwrap();
        assert_eq!(fields, vec!["reset", "WebSocket", "device-7"]);
    }

    #[test]
    fn test_value_may_contain_separator() {
        let fields = decode_fields("command: set: mode: eco").unwrap();
        assert_eq!(fields, vec!["set: mode: eco"]);
    }

    #[test]
    fn test_empty_envelope() {
        assert_eq!(decode_fields(""), Err(EnvelopeError::Empty));
    }

    #[test]
    fn test_malformed_line() {
        let raw = "command: ok\r\nnot-a-field";
        assert_eq!(decode_fields(raw), Err(EnvelopeError::MalformedLine(1)));
    }

    #[test]
    fn test_schema_parse_default_layout() {
        let raw = "sender: A\r\ncommand: template1\r\nreceiver: B";
        let envelope = EnvelopeSchema::default().parse(raw).unwrap();
        assert_eq!(
            envelope,
            Envelope {
                sender: "A".to_string(),
                command: "template1".to_string(),
                receiver: "B".to_string(),
            }
        );
    }

    #[test]
    fn test_schema_position_out_of_range() {
        let schema = EnvelopeSchema {
            sender: 0,
            command: 1,
            receiver: 5,
        };
        let err = schema.parse("a: 1\r\nb: 2").unwrap_err();
        assert_eq!(
            err,
            EnvelopeError::MissingField {
                position: 5,
                found: 2
            }
        );
    }

    #[test]
    fn test_short_envelope_is_not_fatal() {
        // A single well-formed line decodes, but the default schema
        // cannot project it.
        let err = EnvelopeSchema::default().parse("command: x").unwrap_err();
        assert!(matches!(err, EnvelopeError::MissingField { .. }));
    }
}
