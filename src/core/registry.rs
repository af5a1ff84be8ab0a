//! Paired-accessory registry
//! A pure cache over the pairing service's events. Holds at most one
//! record; malformed events are logged and ignored, never propagated.

use log::{info, warn};

use crate::core::bluetooth::types::DiceAccessory;
use crate::core::pairing::PairingEvent;

/// How the registry changed in response to an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryChange {
    Added(DiceAccessory),
    Changed(DiceAccessory),
    Removed,
}

/// Tracks the one currently-paired accessory.
#[derive(Debug, Default)]
pub struct DeviceRegistry {
    current: Option<DiceAccessory>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<&DiceAccessory> {
        self.current.as_ref()
    }

    /// Applies one pairing event. Picker lifecycle events are not the
    /// registry's concern and return `None`.
    pub fn handle(&mut self, event: &PairingEvent) -> Option<RegistryChange> {
        match event {
            // Activation with no record just means nothing was paired yet.
            PairingEvent::Activated { accessory: None } => None,
            PairingEvent::Activated {
                accessory: Some(accessory),
            } => {
                info!("Accessory restored: {} ({})", accessory.display_name, accessory.identity);
                self.current = Some(accessory.clone());
                Some(RegistryChange::Added(accessory.clone()))
            }
            PairingEvent::AccessoryAdded { accessory } => {
                let accessory = match accessory {
                    Some(a) => a.clone(),
                    None => {
                        warn!("Accessory-added event without a payload, ignoring");
                        return None;
                    }
                };
                info!("Accessory paired: {} ({})", accessory.display_name, accessory.identity);
                self.current = Some(accessory.clone());
                Some(RegistryChange::Added(accessory))
            }
            PairingEvent::AccessoryChanged { accessory } => {
                let accessory = match accessory {
                    Some(a) => a.clone(),
                    None => {
                        warn!("Accessory-changed event without a payload, ignoring");
                        return None;
                    }
                };
                self.current = Some(accessory.clone());
                Some(RegistryChange::Changed(accessory))
            }
            PairingEvent::AccessoryRemoved => {
                if self.current.take().is_some() {
                    info!("Accessory removed");
                    Some(RegistryChange::Removed)
                } else {
                    None
                }
            }
            PairingEvent::PickerDidPresent | PairingEvent::PickerDidDismiss => None,
        }
    }
}
