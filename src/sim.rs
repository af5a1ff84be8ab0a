//! In-process simulated dice accessory
//! A scripted picker and central that let the demo binary and the
//! integration tests run the full session lifecycle without radio
//! hardware. The simulated dice advertises its profile service, accepts
//! one connection and rolls a new face at a fixed interval.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use log::info;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::core::bluetooth::constants::UUID_ROLL_RESULT_CHAR;
use crate::core::bluetooth::link::{BleCentral, BleEvent, ConnectionError};
use crate::core::bluetooth::types::{DiceAccessory, PeripheralId, RadioState};
use crate::core::dice::DiceColor;
use crate::core::pairing::{AccessoryPairing, PairingError, PairingEvent, PickerItem};
use crate::core::roll::DiceValue;

/// Identity shared between the simulated picker and the simulated central.
pub const SIM_DICE_IDENTITY: &str = "sim-dice-0";

fn next_face(value: DiceValue) -> DiceValue {
    match value {
        DiceValue::One => DiceValue::Two,
        DiceValue::Two => DiceValue::Three,
        DiceValue::Three => DiceValue::Four,
        DiceValue::Four => DiceValue::Five,
        DiceValue::Five => DiceValue::Six,
        DiceValue::Six => DiceValue::One,
    }
}

/// Pairing service whose user always picks the configured color, when it is
/// offered.
pub struct SimulatedPicker {
    color: DiceColor,
    identity: PeripheralId,
    record: Mutex<Option<DiceAccessory>>,
    events: Mutex<Option<mpsc::UnboundedSender<PairingEvent>>>,
}

impl SimulatedPicker {
    pub fn new(color: DiceColor) -> Self {
        Self {
            color,
            identity: PeripheralId::new(SIM_DICE_IDENTITY),
            record: Mutex::new(None),
            events: Mutex::new(None),
        }
    }

    fn send(&self, event: PairingEvent) {
        if let Some(sender) = self.events.lock().unwrap().as_ref() {
            let _ = sender.send(event);
        }
    }
}

#[async_trait]
impl AccessoryPairing for SimulatedPicker {
    async fn activate(&self, events: mpsc::UnboundedSender<PairingEvent>) {
        let record = self.record.lock().unwrap().clone();
        let _ = events.send(PairingEvent::Activated { accessory: record });
        *self.events.lock().unwrap() = Some(events);
    }

    async fn show_picker(&self, candidates: &[PickerItem]) -> Result<(), PairingError> {
        self.send(PairingEvent::PickerDidPresent);

        let offered = candidates.iter().any(|c| c.color == self.color);
        if offered {
            let record = DiceAccessory {
                identity: self.identity.clone(),
                color: self.color,
                display_name: self.color.display_name().to_owned(),
            };
            *self.record.lock().unwrap() = Some(record.clone());
            info!("Simulated user picked the {}", record.display_name);
            self.send(PairingEvent::AccessoryAdded {
                accessory: Some(record),
            });
        } else {
            info!("Simulated user found nothing to pick");
        }

        self.send(PairingEvent::PickerDidDismiss);
        Ok(())
    }

    async fn remove_accessory(&self, accessory: &DiceAccessory) -> Result<(), PairingError> {
        let mut record = self.record.lock().unwrap();
        if record.as_ref() != Some(accessory) {
            return Err(PairingError::RemovalFailed("no such accessory".to_owned()));
        }
        *record = None;
        drop(record);
        self.send(PairingEvent::AccessoryRemoved);
        Ok(())
    }
}

/// Central backed by one simulated dice peripheral.
pub struct SimulatedCentral {
    identity: PeripheralId,
    service: Uuid,
    roll_interval: Duration,
    value: Arc<Mutex<DiceValue>>,
    events: Mutex<Option<mpsc::UnboundedSender<BleEvent>>>,
    roll_cancel: Mutex<Option<CancellationToken>>,
}

impl SimulatedCentral {
    pub fn new(color: DiceColor, roll_interval: Duration) -> Self {
        Self {
            identity: PeripheralId::new(SIM_DICE_IDENTITY),
            service: color.service_uuid(),
            roll_interval,
            value: Arc::new(Mutex::new(DiceValue::One)),
            events: Mutex::new(None),
            roll_cancel: Mutex::new(None),
        }
    }

    fn send(&self, event: BleEvent) {
        if let Some(sender) = self.events.lock().unwrap().as_ref() {
            let _ = sender.send(event);
        }
    }

    fn stop_rolling(&self) {
        if let Some(token) = self.roll_cancel.lock().unwrap().take() {
            token.cancel();
        }
    }
}

impl Drop for SimulatedCentral {
    fn drop(&mut self) {
        self.stop_rolling();
    }
}

#[async_trait]
impl BleCentral for SimulatedCentral {
    async fn activate(&self, events: mpsc::UnboundedSender<BleEvent>) {
        let _ = events.send(BleEvent::RadioStateChanged(RadioState::PoweredOn));
        *self.events.lock().unwrap() = Some(events);
    }

    async fn retrieve_known_peripheral(&self, identity: &PeripheralId) -> Option<PeripheralId> {
        (identity == &self.identity).then(|| identity.clone())
    }

    async fn connect(&self, peripheral: &PeripheralId) -> Result<(), ConnectionError> {
        if peripheral != &self.identity {
            return Err(ConnectionError::PeripheralUnreachable);
        }
        self.send(BleEvent::PeripheralConnected {
            id: peripheral.clone(),
        });
        Ok(())
    }

    async fn cancel_connection(&self, peripheral: &PeripheralId) -> Result<(), ConnectionError> {
        if peripheral != &self.identity {
            return Err(ConnectionError::PeripheralUnreachable);
        }
        self.stop_rolling();
        self.send(BleEvent::PeripheralDisconnected {
            id: peripheral.clone(),
            reason: None,
        });
        Ok(())
    }

    async fn discover_services(&self, peripheral: &PeripheralId, service: Uuid) {
        let matching = if service == self.service {
            vec![self.service]
        } else {
            vec![]
        };
        self.send(BleEvent::ServicesDiscovered {
            id: peripheral.clone(),
            result: Ok(matching),
        });
    }

    async fn discover_characteristics(
        &self,
        peripheral: &PeripheralId,
        service: Uuid,
        characteristic: Uuid,
    ) {
        let matching = if characteristic == UUID_ROLL_RESULT_CHAR {
            vec![UUID_ROLL_RESULT_CHAR]
        } else {
            vec![]
        };
        self.send(BleEvent::CharacteristicsDiscovered {
            id: peripheral.clone(),
            service,
            result: Ok(matching),
        });
    }

    async fn set_notify(&self, peripheral: &PeripheralId, characteristic: Uuid, enabled: bool) {
        if !enabled {
            self.stop_rolling();
            self.send(BleEvent::NotifyStateUpdated {
                id: peripheral.clone(),
                characteristic,
                enabled: false,
            });
            return;
        }

        self.send(BleEvent::NotifyStateUpdated {
            id: peripheral.clone(),
            characteristic,
            enabled: true,
        });

        let Some(events) = self.events.lock().unwrap().clone() else {
            return;
        };
        self.stop_rolling();
        let token = CancellationToken::new();
        *self.roll_cancel.lock().unwrap() = Some(token.clone());

        let id = peripheral.clone();
        let value = self.value.clone();
        let interval = self.roll_interval;
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = tokio::time::sleep(interval) => {
                        let rolled = {
                            let mut value = value.lock().unwrap();
                            *value = next_face(*value);
                            *value
                        };
                        let _ = events.send(BleEvent::ValueUpdated {
                            id: id.clone(),
                            characteristic,
                            result: Ok(rolled.as_label().as_bytes().to_vec()),
                        });
                    }
                }
            }
        });
    }

    async fn read_value(&self, peripheral: &PeripheralId, characteristic: Uuid) {
        let current = *self.value.lock().unwrap();
        self.send(BleEvent::ValueUpdated {
            id: peripheral.clone(),
            characteristic,
            result: Ok(current.as_label().as_bytes().to_vec()),
        });
    }
}
