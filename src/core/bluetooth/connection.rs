//! Connection control for the dice peripheral
//! Owns the central seam and the single live peripheral handle. Reacts to
//! radio power changes and drives connect/disconnect against the one
//! target identity. At most one connect or disconnect request is
//! outstanding at a time; the `pending` field enforces that, not a lock.

use std::sync::Arc;

use log::{info, warn};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::core::bluetooth::link::{BleCentral, BleEvent, ConnectionError};
use crate::core::bluetooth::types::{DiceAccessory, PeripheralId, RadioState};

#[derive(Debug, Clone, PartialEq, Eq)]
struct ConnectTarget {
    identity: PeripheralId,
    service: Uuid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PendingRequest {
    Connect,
    Disconnect,
}

/// Drives the BLE central against a single target peripheral.
pub struct ConnectionController {
    central: Arc<dyn BleCentral>,
    events: mpsc::UnboundedSender<BleEvent>,
    central_active: bool,
    target: Option<ConnectTarget>,
    radio_state: RadioState,
    peripheral: Option<PeripheralId>,
    connected: bool,
    pending: Option<PendingRequest>,
}

impl ConnectionController {
    pub fn new(central: Arc<dyn BleCentral>, events: mpsc::UnboundedSender<BleEvent>) -> Self {
        Self {
            central,
            events,
            central_active: false,
            target: None,
            radio_state: RadioState::Unknown,
            peripheral: None,
            connected: false,
            pending: None,
        }
    }

    /// Stores the accessory as the connect target and brings up the
    /// central on first use. Re-calls with a new record just replace the
    /// target.
    pub async fn set_target(&mut self, accessory: &DiceAccessory) {
        self.target = Some(ConnectTarget {
            identity: accessory.identity.clone(),
            service: accessory.color.service_uuid(),
        });
        if !self.central_active {
            self.central.activate(self.events.clone()).await;
            self.central_active = true;
        }
    }

    /// Drops the target and every handle derived from it. The central is
    /// re-activated the next time a target is set.
    pub fn clear_target(&mut self) {
        self.target = None;
        self.peripheral = None;
        self.connected = false;
        self.pending = None;
        self.central_active = false;
    }

    /// Applies a radio power change. Returns `true` when a live connection
    /// was dropped because the radio left the powered-on state.
    pub async fn on_radio_state(&mut self, state: RadioState) -> bool {
        self.radio_state = state;
        if state == RadioState::PoweredOn {
            if let Some(target) = &self.target {
                self.peripheral = self.central.retrieve_known_peripheral(&target.identity).await;
                if self.peripheral.is_none() {
                    info!("Peripheral {} not currently reachable", target.identity);
                }
            }
            false
        } else {
            // No handle can be assumed valid without a powered-on radio.
            self.peripheral = None;
            self.pending = None;
            let dropped = self.connected;
            self.connected = false;
            dropped
        }
    }

    /// Requests a connection. Silently returns `Ok(false)` unless the radio
    /// is powered on, a peripheral handle is resolved, and no request is
    /// outstanding.
    pub async fn connect(&mut self) -> Result<bool, ConnectionError> {
        if self.radio_state != RadioState::PoweredOn || self.connected || self.pending.is_some() {
            return Ok(false);
        }
        let Some(peripheral) = self.peripheral.clone() else {
            return Ok(false);
        };
        self.central.connect(&peripheral).await?;
        self.pending = Some(PendingRequest::Connect);
        Ok(true)
    }

    /// Requests a disconnect. Silently returns `Ok(false)` without a
    /// resolved handle or while another request is outstanding.
    pub async fn disconnect(&mut self) -> Result<bool, ConnectionError> {
        if self.pending.is_some() {
            return Ok(false);
        }
        let Some(peripheral) = self.peripheral.clone() else {
            return Ok(false);
        };
        self.central.cancel_connection(&peripheral).await?;
        self.pending = Some(PendingRequest::Disconnect);
        Ok(true)
    }

    /// Records a connect completion. Returns `true` when the event is for
    /// the current target.
    pub fn on_connected(&mut self, id: &PeripheralId) -> bool {
        if self.peripheral.as_ref() != Some(id) {
            return false;
        }
        self.pending = None;
        self.connected = true;
        true
    }

    /// Records a connect failure for the current target, if it is ours.
    pub fn on_connect_failed(&mut self, id: &PeripheralId, reason: &str) -> Option<ConnectionError> {
        if self.peripheral.as_ref() != Some(id) {
            return None;
        }
        warn!("Connect to {} failed: {}", id, reason);
        self.pending = None;
        self.connected = false;
        Some(ConnectionError::ConnectFailed(reason.to_owned()))
    }

    /// Records a disconnect. Returns `true` when the event is for the
    /// current target.
    pub fn on_disconnected(&mut self, id: &PeripheralId, reason: Option<&str>) -> bool {
        if self.peripheral.as_ref() != Some(id) {
            return false;
        }
        if let Some(reason) = reason {
            warn!("Peripheral {} disconnected: {}", id, reason);
        }
        self.pending = None;
        self.connected = false;
        true
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn radio_state(&self) -> RadioState {
        self.radio_state
    }

    pub fn peripheral(&self) -> Option<&PeripheralId> {
        self.peripheral.as_ref()
    }

    /// The profile service UUID of the current target.
    pub fn target_service(&self) -> Option<Uuid> {
        self.target.as_ref().map(|t| t.service)
    }
}
