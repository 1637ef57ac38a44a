//! Static device registry.
//!
//! The gateway serves a fixed fleet: device ids are configured at startup
//! and never created or destroyed at runtime. The registry answers two
//! questions — is this sender a device we know, and where is a device's
//! serial port bound.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Per-device configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceSpec {
    /// Serial port path for Modbus traffic (e.g. `/dev/ttyUSB1`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serial_path: Option<String>,

    /// Hardware serial number, used by the attachment probe
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serial_number: Option<String>,
}

/// The set of devices this gateway speaks for.
///
/// Read-only after startup; safe to share without locking.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceRegistry {
    devices: BTreeMap<String, DeviceSpec>,
}

impl DeviceRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a device with no serial binding.
    pub fn with_device(mut self, id: impl Into<String>) -> Self {
        self.devices.insert(id.into(), DeviceSpec::default());
        self
    }

    /// Add a device with an explicit spec.
    pub fn with_spec(mut self, id: impl Into<String>, spec: DeviceSpec) -> Self {
        self.devices.insert(id.into(), spec);
        self
    }

    /// Whether `id` belongs to the configured fleet.
    pub fn is_known(&self, id: &str) -> bool {
        self.devices.contains_key(id)
    }

    /// Serial port path bound to `id`, if any.
    pub fn serial_path(&self, id: &str) -> Option<&str> {
        self.devices.get(id)?.serial_path.as_deref()
    }

    /// Hardware serial number recorded for `id`, if any.
    pub fn serial_number(&self, id: &str) -> Option<&str> {
        self.devices.get(id)?.serial_number.as_deref()
    }

    /// All configured device ids, in stable order.
    pub fn device_ids(&self) -> impl Iterator<Item = &str> {
        self.devices.keys().map(String::as_str)
    }

    /// Number of configured devices.
    pub fn len(&self) -> usize {
        self.devices.len()
    }

    /// Whether the fleet is empty.
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}
