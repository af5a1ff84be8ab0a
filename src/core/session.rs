//! Dice session orchestration
//! The top-level state machine. Sequences the registry, the connection
//! controller and the discovery pipeline, exposes the public actions
//! (present picker, remove dice, connect, disconnect) and publishes an
//! observable snapshot for the UI layer.
//!
//! All transitions run under one lock, fed by a single driver task, so
//! events are applied strictly one at a time.

use std::sync::Arc;

use log::{error, info, warn};
use tokio::sync::{Mutex, mpsc, watch};
use tokio_util::sync::CancellationToken;

use crate::config::BridgeConfig;
use crate::core::bluetooth::connection::ConnectionController;
use crate::core::bluetooth::discovery::{DiscoveryError, DiscoveryPhase, GattDiscoveryPipeline};
use crate::core::bluetooth::link::{BleCentral, BleEvent, ConnectionError};
use crate::core::bluetooth::types::RadioState;
use crate::core::dice::DiceColor;
use crate::core::feedback::RollFeedback;
use crate::core::pairing::{AccessoryPairing, PairingError, PairingEvent, PickerItem};
use crate::core::registry::{DeviceRegistry, RegistryChange};
use crate::core::roll::{DiceValue, decode_roll};

/// Where the session currently stands. `Paired` means a dice is paired but
/// not connected.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SessionPhase {
    #[default]
    Idle,
    PickerPresented,
    Paired,
    Connecting,
    Connected,
}

/// Snapshot of the session for UI consumption.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct SessionState {
    pub dice_color: Option<DiceColor>,
    pub connected: bool,
    pub picker_visible: bool,
    pub current_value: DiceValue,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            dice_color: None,
            connected: false,
            picker_visible: false,
            current_value: DiceValue::One,
        }
    }
}

/// Receiving ends of the collaborator event channels, consumed by [`run`].
pub struct SessionEventQueue {
    pairing: mpsc::UnboundedReceiver<PairingEvent>,
    ble: mpsc::UnboundedReceiver<BleEvent>,
}

/// The session orchestrator.
pub struct DiceSession {
    pairing: Arc<dyn AccessoryPairing>,
    feedback: Arc<dyn RollFeedback>,
    config: BridgeConfig,
    registry: DeviceRegistry,
    controller: ConnectionController,
    pipeline: GattDiscoveryPipeline,
    phase: SessionPhase,
    phase_before_picker: SessionPhase,
    picker_visible: bool,
    current_value: DiceValue,
    pending_removal: bool,
    activated: bool,
    pairing_tx: mpsc::UnboundedSender<PairingEvent>,
    state_tx: watch::Sender<SessionState>,
}

impl DiceSession {
    pub fn new(
        pairing: Arc<dyn AccessoryPairing>,
        central: Arc<dyn BleCentral>,
        feedback: Arc<dyn RollFeedback>,
        config: BridgeConfig,
    ) -> (Self, SessionEventQueue) {
        let (pairing_tx, pairing_rx) = mpsc::unbounded_channel();
        let (ble_tx, ble_rx) = mpsc::unbounded_channel();
        let (state_tx, _) = watch::channel(SessionState::default());

        let session = Self {
            pairing,
            feedback,
            config,
            registry: DeviceRegistry::new(),
            controller: ConnectionController::new(central.clone(), ble_tx),
            pipeline: GattDiscoveryPipeline::new(central),
            phase: SessionPhase::Idle,
            phase_before_picker: SessionPhase::Idle,
            picker_visible: false,
            current_value: DiceValue::One,
            pending_removal: false,
            activated: false,
            pairing_tx,
            state_tx,
        };
        let queue = SessionEventQueue {
            pairing: pairing_rx,
            ble: ble_rx,
        };
        (session, queue)
    }

    /// Activates the session: requests notification authorization and
    /// subscribes to the pairing service. Idempotent.
    pub async fn activate(&mut self) {
        if self.activated {
            return;
        }
        self.feedback.request_authorization().await;
        self.pairing.activate(self.pairing_tx.clone()).await;
        self.activated = true;
        info!("Dice session activated");
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn state(&self) -> SessionState {
        self.state_tx.borrow().clone()
    }

    /// Watch channel carrying every state snapshot.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state_tx.subscribe()
    }

    // ---- public actions -------------------------------------------------

    /// Asks the pairing service to present its picker for both dice
    /// variants. The phase changes once the picker-presented event arrives.
    pub async fn present_picker(&mut self) -> Result<(), PairingError> {
        if !matches!(self.phase, SessionPhase::Idle | SessionPhase::Paired) {
            return Ok(());
        }
        let candidates = [
            PickerItem::for_color(DiceColor::Pink),
            PickerItem::for_color(DiceColor::Blue),
        ];
        self.pairing.show_picker(&candidates).await.inspect_err(|e| {
            error!("Failed to show picker: {}", e);
        })
    }

    /// Removes the paired dice. While connected, the disconnect is issued
    /// first and the removal request is deferred until the disconnected
    /// event arrives, so teardown is always observed as disconnect, then
    /// removal.
    pub async fn remove_dice(&mut self) -> Result<(), PairingError> {
        let Some(accessory) = self.registry.current().cloned() else {
            return Ok(());
        };
        if self.controller.is_connected() {
            self.controller
                .disconnect()
                .await
                .map_err(|e| PairingError::RemovalFailed(e.to_string()))?;
            self.pending_removal = true;
            return Ok(());
        }
        self.pairing
            .remove_accessory(&accessory)
            .await
            .inspect_err(|e| {
                // State is left untouched; there is no partial removal.
                error!("Failed to remove accessory: {}", e);
            })
    }

    /// Connects to the paired dice. No-op outside the paired-disconnected
    /// phase or while the controller's preconditions are unmet.
    pub async fn connect(&mut self) -> Result<(), ConnectionError> {
        if self.phase != SessionPhase::Paired {
            return Ok(());
        }
        if self.controller.connect().await? {
            self.phase = SessionPhase::Connecting;
            self.publish();
        }
        Ok(())
    }

    /// Disconnects from the dice. The phase falls back to `Paired` when the
    /// disconnected event arrives.
    pub async fn disconnect(&mut self) -> Result<(), ConnectionError> {
        self.controller.disconnect().await?;
        Ok(())
    }

    // ---- event handling -------------------------------------------------

    pub async fn handle_pairing_event(&mut self, event: PairingEvent) {
        match &event {
            PairingEvent::PickerDidPresent => {
                self.picker_visible = true;
                if self.phase != SessionPhase::PickerPresented {
                    self.phase_before_picker = self.phase;
                    self.phase = SessionPhase::PickerPresented;
                }
            }
            PairingEvent::PickerDidDismiss => {
                self.picker_visible = false;
                if self.phase == SessionPhase::PickerPresented {
                    self.phase = if self.registry.current().is_some() {
                        SessionPhase::Paired
                    } else {
                        self.phase_before_picker
                    };
                }
            }
            _ => {}
        }

        match self.registry.handle(&event) {
            Some(RegistryChange::Added(accessory)) => {
                self.controller.set_target(&accessory).await;
                self.phase = SessionPhase::Paired;
            }
            Some(RegistryChange::Changed(accessory)) => {
                self.controller.set_target(&accessory).await;
            }
            Some(RegistryChange::Removed) => {
                self.controller.clear_target();
                self.pipeline.reset();
                self.pending_removal = false;
                self.phase = SessionPhase::Idle;
            }
            None => {}
        }

        self.publish();
    }

    pub async fn handle_ble_event(&mut self, event: BleEvent) {
        match event {
            BleEvent::RadioStateChanged(state) => {
                self.controller.on_radio_state(state).await;
                if state != RadioState::PoweredOn
                    && matches!(self.phase, SessionPhase::Connecting | SessionPhase::Connected)
                {
                    self.pipeline.reset();
                    self.phase = SessionPhase::Paired;
                }
            }
            BleEvent::PeripheralConnected { id } => {
                if self.controller.on_connected(&id) {
                    info!("Connected to peripheral {}", id);
                    if let Some(service) = self.controller.target_service() {
                        self.pipeline.start(id, service).await;
                    }
                }
            }
            BleEvent::PeripheralConnectFailed { id, reason } => {
                if let Some(err) = self.controller.on_connect_failed(&id, &reason) {
                    error!("Connection attempt failed: {}", err);
                    if self.phase == SessionPhase::Connecting {
                        self.phase = SessionPhase::Paired;
                    }
                }
            }
            BleEvent::PeripheralDisconnected { id, reason } => {
                if self.controller.on_disconnected(&id, reason.as_deref()) {
                    self.pipeline.reset();
                    if matches!(self.phase, SessionPhase::Connecting | SessionPhase::Connected) {
                        self.phase = SessionPhase::Paired;
                    }
                    if self.pending_removal {
                        self.pending_removal = false;
                        self.finish_pending_removal().await;
                    }
                }
            }
            BleEvent::ServicesDiscovered { id, result } => {
                if self.controller.peripheral() == Some(&id) {
                    if let Err(err) = self.pipeline.on_services(result).await {
                        self.abort_discovery(err).await;
                    }
                }
            }
            BleEvent::CharacteristicsDiscovered { id, service: _, result } => {
                if self.controller.peripheral() == Some(&id) {
                    match self.pipeline.on_characteristics(result).await {
                        Ok(()) => {
                            if self.pipeline.phase() == DiscoveryPhase::Subscribing {
                                // The roll characteristic is live; only now
                                // does the session count as connected.
                                self.phase = SessionPhase::Connected;
                            }
                        }
                        Err(err) => self.abort_discovery(err).await,
                    }
                }
            }
            BleEvent::NotifyStateUpdated { characteristic, enabled, .. } => {
                self.pipeline.on_notify_state(characteristic, enabled);
            }
            BleEvent::ValueUpdated { characteristic, result, .. } => {
                if let Some(bytes) = self.pipeline.on_value(characteristic, result) {
                    self.apply_roll(&bytes).await;
                }
            }
        }

        self.publish();
    }

    // ---- internals ------------------------------------------------------

    async fn apply_roll(&mut self, bytes: &[u8]) {
        let value = match decode_roll(bytes) {
            Ok(value) => value,
            Err(err) => {
                // A bad payload drops this update only; the displayed value
                // persists.
                warn!("Dropping roll payload: {}", err);
                return;
            }
        };
        info!("New dice value received: {}", value.as_label());
        self.current_value = value;
        self.publish();

        if self.config.notifications_enabled {
            let body = format!("New value: {}", value.as_label());
            if let Err(err) = self.feedback.deliver_notification("Dice Rolled", &body).await {
                warn!("{}", err);
            }
        }
        if self.config.haptics_enabled {
            self.feedback.trigger_vibration().await;
        }
    }

    /// The accessory does not expose the expected profile. Cancel the
    /// transport connection so link state cannot drift from session state.
    async fn abort_discovery(&mut self, err: DiscoveryError) {
        error!("Discovery aborted: {}", err);
        if let Err(e) = self.controller.disconnect().await {
            warn!("Disconnect after discovery failure also failed: {}", e);
        }
        if matches!(self.phase, SessionPhase::Connecting | SessionPhase::Connected) {
            self.phase = SessionPhase::Paired;
        }
    }

    async fn finish_pending_removal(&mut self) {
        let Some(accessory) = self.registry.current().cloned() else {
            return;
        };
        if let Err(err) = self.pairing.remove_accessory(&accessory).await {
            // Removal failed after the disconnect; the dice stays paired.
            error!("Failed to remove accessory: {}", err);
        }
    }

    fn publish(&self) {
        let state = SessionState {
            dice_color: self.registry.current().map(|a| a.color),
            connected: self.phase == SessionPhase::Connected,
            picker_visible: self.picker_visible,
            current_value: self.current_value,
        };
        self.state_tx.send_replace(state);
    }
}

/// Drives a session until cancelled: selects over both collaborator
/// channels and applies events one at a time.
pub async fn run(
    session: Arc<Mutex<DiceSession>>,
    mut queue: SessionEventQueue,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            event = queue.pairing.recv() => match event {
                Some(event) => session.lock().await.handle_pairing_event(event).await,
                None => break,
            },
            event = queue.ble.recv() => match event {
                Some(event) => session.lock().await.handle_ble_event(event).await,
                None => break,
            },
        }
    }
    info!("Session driver stopped");
}
