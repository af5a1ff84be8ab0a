//! Defines shared data structures for the Bluetooth module.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::dice::DiceColor;

/// Opaque, platform-level identifier of a peripheral. Stable across
/// sessions; used to re-retrieve the live device handle after a radio
/// power cycle.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PeripheralId(String);

impl PeripheralId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PeripheralId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One paired dice accessory. At most one is live at a time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiceAccessory {
    /// Platform identity used to resolve the peripheral handle.
    pub identity: PeripheralId,
    /// Which dice variant this accessory is.
    pub color: DiceColor,
    /// The name under which the accessory was paired.
    pub display_name: String,
}

/// Radio power state of the BLE central.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RadioState {
    #[default]
    Unknown,
    PoweredOff,
    PoweredOn,
    Unauthorized,
    Unsupported,
}

/// The discovered GATT path to the roll-result characteristic. Rebuilt on
/// every connect; never reused across connection cycles.
#[derive(Debug, Clone)]
pub struct CharacteristicSession {
    pub service_uuid: Uuid,
    pub characteristic_uuid: Uuid,
    pub subscribed: bool,
}
