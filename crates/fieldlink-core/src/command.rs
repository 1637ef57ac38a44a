//! Per-device command routing table.
//!
//! The command map is the finite state machine driving request/response
//! cycles between devices: for each device, the command token it just
//! sent determines the next command and the transport to send it on.

use crate::protocol::Protocol;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The next hop for a received command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandRoute {
    /// Command token to send next
    pub next_command: String,
    /// Transport to send it on
    pub protocol: Protocol,
}

impl CommandRoute {
    /// Create a new route.
    pub fn new(next_command: impl Into<String>, protocol: Protocol) -> Self {
        Self {
            next_command: next_command.into(),
            protocol,
        }
    }
}

/// Static routing table: device id → received command → next hop.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommandMap {
    routes: BTreeMap<String, BTreeMap<String, CommandRoute>>,
}

impl CommandMap {
    /// Create an empty command map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a route for `(device, command)`.
    pub fn with_route(
        mut self,
        device: impl Into<String>,
        command: impl Into<String>,
        route: CommandRoute,
    ) -> Self {
        self.routes
            .entry(device.into())
            .or_default()
            .insert(command.into(), route);
        self
    }

    /// Look up the next hop for a command received from `device`.
    pub fn route(&self, device: &str, command: &str) -> Option<&CommandRoute> {
        self.routes.get(device)?.get(command)
    }

    /// Whether `device` has any routes at all.
    pub fn has_device(&self, device: &str) -> bool {
        self.routes.contains_key(device)
    }

    /// Whether the map is empty.
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> CommandMap {
        CommandMap::new()
            .with_route("A", "template1", CommandRoute::new("template2", Protocol::WebSocket))
            .with_route("A", "template2", CommandRoute::new("template1", Protocol::Mqtt))
    }

    #[test]
    fn test_route_hit() {
        let map = sample();
        let route = map.route("A", "template1").unwrap();
        assert_eq!(route.next_command, "template2");
        assert_eq!(route.protocol, Protocol::WebSocket);
    }

    #[test]
    fn test_route_miss() {
        let map = sample();
        assert!(map.route("A", "template9").is_none());
        assert!(map.route("B", "template1").is_none());
    }

    #[test]
    fn test_json_shape() {
        let map = sample();
        let json = serde_json::to_value(&map).unwrap();
        assert_eq!(json["A"]["template1"]["protocol"], "WebSocket");
        let back: CommandMap = serde_json::from_value(json).unwrap();
        assert_eq!(back, map);
    }
}
