//! Transport protocol tags.
//!
//! Every transport the gateway can speak is identified by a `Protocol`
//! value. The tag doubles as the wire name used in envelopes and in the
//! command map configuration, so `Display`/`FromStr` and the serde
//! representation all agree on the same spelling.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A transport the gateway can send and receive on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Protocol {
    /// MQTT publish/subscribe via a broker
    #[serde(rename = "MQTT")]
    Mqtt,
    /// WebSocket connections against the gateway's own server endpoint
    #[serde(rename = "WebSocket")]
    WebSocket,
    /// Serial line to a directly attached device
    #[serde(rename = "Modbus")]
    Modbus,
}

impl Protocol {
    /// All supported protocols, in registration order.
    pub const ALL: [Protocol; 3] = [Protocol::Mqtt, Protocol::WebSocket, Protocol::Modbus];

    /// The wire name carried in envelopes and configuration.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mqtt => "MQTT",
            Self::WebSocket => "WebSocket",
            Self::Modbus => "Modbus",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a protocol name is not recognized.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown protocol: {0}")]
pub struct UnknownProtocol(pub String);

impl FromStr for Protocol {
    type Err = UnknownProtocol;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "MQTT" => Ok(Self::Mqtt),
            "WebSocket" => Ok(Self::WebSocket),
            "Modbus" => Ok(Self::Modbus),
            other => Err(UnknownProtocol(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_round_trip() {
        for protocol in Protocol::ALL {
            assert_eq!(protocol.to_string().parse::<Protocol>(), Ok(protocol));
        }
    }

    #[test]
    fn test_unknown_protocol() {
        let err = "CoAP".parse::<Protocol>().unwrap_err();
        assert_eq!(err, UnknownProtocol("CoAP".to_string()));
    }

    #[test]
    fn test_serde_uses_wire_names() {
        assert_eq!(
            serde_json::to_string(&Protocol::WebSocket).unwrap(),
            "\"WebSocket\""
        );
        let parsed: Protocol = serde_json::from_str("\"MQTT\"").unwrap();
        assert_eq!(parsed, Protocol::Mqtt);
    }
}
