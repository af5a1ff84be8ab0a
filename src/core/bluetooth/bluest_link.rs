//! `bluest`-backed implementation of the central seam.
//! Resolution is restricted to devices the system already knows as
//! connected or paired; OS-level discovery and pairing belong to the
//! accessory-pairing collaborator, so this link carries no scanner.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use bluest::{Adapter, Characteristic, Device, Service};
use futures_util::StreamExt;
use log::{error, info, warn};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::core::bluetooth::link::{BleCentral, BleEvent, ConnectionError};
use crate::core::bluetooth::types::{PeripheralId, RadioState};

/// Drives a real adapter through the [`BleCentral`] seam.
pub struct BluestCentral {
    adapter: Adapter,
    /// Map of device id strings to live device handles.
    devices: Arc<Mutex<HashMap<String, Device>>>,
    events: Arc<Mutex<Option<mpsc::UnboundedSender<BleEvent>>>>,
    /// Services matched in the current discovery cycle.
    services: Arc<Mutex<Vec<Service>>>,
    /// The roll characteristic of the current cycle, once found.
    characteristic: Arc<Mutex<Option<Characteristic>>>,
    notify_cancel: Arc<Mutex<Option<CancellationToken>>>,
}

impl BluestCentral {
    pub async fn new() -> Result<Self> {
        let adapter = Adapter::default()
            .await
            .ok_or_else(|| anyhow!("No Bluetooth adapter found"))?;
        Ok(Self {
            adapter,
            devices: Arc::new(Mutex::new(HashMap::new())),
            events: Arc::new(Mutex::new(None)),
            services: Arc::new(Mutex::new(Vec::new())),
            characteristic: Arc::new(Mutex::new(None)),
            notify_cancel: Arc::new(Mutex::new(None)),
        })
    }

    fn emit(&self, event: BleEvent) {
        if let Some(sender) = self.events.lock().unwrap().as_ref() {
            let _ = sender.send(event);
        }
    }

    fn device_for(&self, id: &PeripheralId) -> Option<Device> {
        self.devices.lock().unwrap().get(id.as_str()).cloned()
    }

    fn stop_notify_task(&self) {
        if let Some(token) = self.notify_cancel.lock().unwrap().take() {
            token.cancel();
        }
    }

    /// Discards the GATT handles of the current connection cycle.
    fn clear_gatt(&self) {
        self.stop_notify_task();
        self.services.lock().unwrap().clear();
        *self.characteristic.lock().unwrap() = None;
    }
}

#[async_trait]
impl BleCentral for BluestCentral {
    async fn activate(&self, events: mpsc::UnboundedSender<BleEvent>) {
        *self.events.lock().unwrap() = Some(events.clone());

        let adapter = self.adapter.clone();
        tokio::spawn(async move {
            if let Err(e) = adapter.wait_available().await {
                error!("Bluetooth adapter did not become available: {}", e);
                let _ = events.send(BleEvent::RadioStateChanged(RadioState::Unsupported));
                return;
            }
            info!("Bluetooth adapter is available.");
            let _ = events.send(BleEvent::RadioStateChanged(RadioState::PoweredOn));
        });
    }

    async fn retrieve_known_peripheral(&self, identity: &PeripheralId) -> Option<PeripheralId> {
        if self.device_for(identity).is_some() {
            return Some(identity.clone());
        }

        let connected = match self.adapter.connected_devices().await {
            Ok(devices) => devices,
            Err(e) => {
                warn!("Failed to enumerate connected devices: {}", e);
                return None;
            }
        };
        for device in connected {
            let id = device.id().to_string();
            self.devices.lock().unwrap().insert(id.clone(), device);
            if id == identity.as_str() {
                return Some(identity.clone());
            }
        }
        None
    }

    async fn connect(&self, peripheral: &PeripheralId) -> Result<(), ConnectionError> {
        let device = self
            .device_for(peripheral)
            .ok_or(ConnectionError::PeripheralUnreachable)?;

        let adapter = self.adapter.clone();
        let events = self.events.lock().unwrap().clone();
        let id = peripheral.clone();
        tokio::spawn(async move {
            let event = if device.is_connected().await {
                info!("Device {} already connected.", id);
                BleEvent::PeripheralConnected { id }
            } else {
                match adapter.connect_device(&device).await {
                    Ok(()) => BleEvent::PeripheralConnected { id },
                    Err(e) => BleEvent::PeripheralConnectFailed {
                        id,
                        reason: e.to_string(),
                    },
                }
            };
            if let Some(events) = events {
                let _ = events.send(event);
            }
        });
        Ok(())
    }

    async fn cancel_connection(&self, peripheral: &PeripheralId) -> Result<(), ConnectionError> {
        let device = self
            .device_for(peripheral)
            .ok_or(ConnectionError::PeripheralUnreachable)?;
        self.clear_gatt();

        let adapter = self.adapter.clone();
        let events = self.events.lock().unwrap().clone();
        let id = peripheral.clone();
        tokio::spawn(async move {
            match adapter.disconnect_device(&device).await {
                Ok(()) => {
                    info!("Successfully disconnected from {}", id);
                    if let Some(events) = events {
                        let _ = events.send(BleEvent::PeripheralDisconnected { id, reason: None });
                    }
                }
                Err(e) => error!("Failed to disconnect from {}: {}", id, e),
            }
        });
        Ok(())
    }

    async fn discover_services(&self, peripheral: &PeripheralId, service: Uuid) {
        let Some(device) = self.device_for(peripheral) else {
            self.emit(BleEvent::ServicesDiscovered {
                id: peripheral.clone(),
                result: Err("peripheral handle lost".to_owned()),
            });
            return;
        };

        let result = match device.services().await {
            Ok(services) => {
                let matching: Vec<Service> = services
                    .into_iter()
                    .filter(|s| s.uuid() == service)
                    .collect();
                let uuids = matching.iter().map(|s| s.uuid()).collect();
                *self.services.lock().unwrap() = matching;
                Ok(uuids)
            }
            Err(e) => Err(e.to_string()),
        };
        self.emit(BleEvent::ServicesDiscovered {
            id: peripheral.clone(),
            result,
        });
    }

    async fn discover_characteristics(
        &self,
        peripheral: &PeripheralId,
        service: Uuid,
        characteristic: Uuid,
    ) {
        let found = self
            .services
            .lock()
            .unwrap()
            .iter()
            .find(|s| s.uuid() == service)
            .cloned();
        let Some(found) = found else {
            self.emit(BleEvent::CharacteristicsDiscovered {
                id: peripheral.clone(),
                service,
                result: Err(format!("service {service} not held from discovery")),
            });
            return;
        };

        let result = match found.characteristics().await {
            Ok(characteristics) => {
                let matching: Vec<Characteristic> = characteristics
                    .into_iter()
                    .filter(|c| c.uuid() == characteristic)
                    .collect();
                let uuids = matching.iter().map(|c| c.uuid()).collect();
                *self.characteristic.lock().unwrap() = matching.into_iter().next();
                Ok(uuids)
            }
            Err(e) => Err(e.to_string()),
        };
        self.emit(BleEvent::CharacteristicsDiscovered {
            id: peripheral.clone(),
            service,
            result,
        });
    }

    async fn set_notify(&self, peripheral: &PeripheralId, characteristic: Uuid, enabled: bool) {
        if !enabled {
            self.stop_notify_task();
            self.emit(BleEvent::NotifyStateUpdated {
                id: peripheral.clone(),
                characteristic,
                enabled: false,
            });
            return;
        }

        let Some(notify_char) = self.characteristic.lock().unwrap().clone() else {
            warn!("set_notify requested before the characteristic was discovered");
            return;
        };
        let Some(events) = self.events.lock().unwrap().clone() else {
            return;
        };

        self.stop_notify_task();
        let token = CancellationToken::new();
        *self.notify_cancel.lock().unwrap() = Some(token.clone());

        let id = peripheral.clone();
        tokio::spawn(async move {
            info!("Subscribing to notifications...");
            match notify_char.notify().await {
                Ok(mut notification_stream) => {
                    let _ = events.send(BleEvent::NotifyStateUpdated {
                        id: id.clone(),
                        characteristic,
                        enabled: true,
                    });
                    loop {
                        tokio::select! {
                            _ = token.cancelled() => break,
                            item = notification_stream.next() => match item {
                                Some(Ok(value)) => {
                                    let _ = events.send(BleEvent::ValueUpdated {
                                        id: id.clone(),
                                        characteristic,
                                        result: Ok(value.to_vec()),
                                    });
                                }
                                Some(Err(e)) => {
                                    let _ = events.send(BleEvent::ValueUpdated {
                                        id: id.clone(),
                                        characteristic,
                                        result: Err(e.to_string()),
                                    });
                                }
                                None => break,
                            },
                        }
                    }
                }
                Err(e) => {
                    error!("Failed to subscribe to notifications: {}", e);
                    let _ = events.send(BleEvent::NotifyStateUpdated {
                        id: id.clone(),
                        characteristic,
                        enabled: false,
                    });
                }
            }
            info!("Notification stream ended");
        });
    }

    async fn read_value(&self, peripheral: &PeripheralId, characteristic: Uuid) {
        let Some(read_char) = self.characteristic.lock().unwrap().clone() else {
            warn!("read_value requested before the characteristic was discovered");
            return;
        };
        let result = match read_char.read().await {
            Ok(value) => Ok(value.to_vec()),
            Err(e) => Err(e.to_string()),
        };
        self.emit(BleEvent::ValueUpdated {
            id: peripheral.clone(),
            characteristic,
            result,
        });
    }
}
