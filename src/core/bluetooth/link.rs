//! The seam between the session core and the platform Bluetooth stack.
//! The platform's central/peripheral delegate callbacks are folded into a
//! single [`BleEvent`] enum delivered over one channel; requests go out
//! through the [`BleCentral`] trait. Platform error details cross the seam
//! as strings and are mapped to the crate taxonomy on this side.

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::core::bluetooth::types::{PeripheralId, RadioState};

/// Errors surfaced by connection management.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConnectionError {
    #[error("radio is not powered on")]
    RadioNotReady,
    #[error("peripheral is not currently reachable")]
    PeripheralUnreachable,
    #[error("connect failed: {0}")]
    ConnectFailed(String),
    #[error("unexpected disconnect: {0}")]
    UnexpectedDisconnect(String),
}

/// Asynchronous completions and state changes reported by the platform
/// Bluetooth stack.
#[derive(Debug, Clone)]
pub enum BleEvent {
    RadioStateChanged(RadioState),
    PeripheralConnected {
        id: PeripheralId,
    },
    PeripheralConnectFailed {
        id: PeripheralId,
        reason: String,
    },
    PeripheralDisconnected {
        id: PeripheralId,
        reason: Option<String>,
    },
    /// Completion of a `discover_services` request. `Ok` carries the UUIDs
    /// of the matching services (possibly empty).
    ServicesDiscovered {
        id: PeripheralId,
        result: Result<Vec<Uuid>, String>,
    },
    /// Completion of a `discover_characteristics` request for one service.
    CharacteristicsDiscovered {
        id: PeripheralId,
        service: Uuid,
        result: Result<Vec<Uuid>, String>,
    },
    NotifyStateUpdated {
        id: PeripheralId,
        characteristic: Uuid,
        enabled: bool,
    },
    /// A read completion or an incoming notification.
    ValueUpdated {
        id: PeripheralId,
        characteristic: Uuid,
        result: Result<Vec<u8>, String>,
    },
}

/// The BLE central collaborator. Requests are submitted here; completions
/// arrive as [`BleEvent`]s on the sender passed to [`BleCentral::activate`].
///
/// Implementations must treat `activate` as idempotent: repeated calls
/// replace the event sink and re-report the current radio state.
#[async_trait]
pub trait BleCentral: Send + Sync {
    /// Brings up the central and starts radio-state reporting.
    async fn activate(&self, events: mpsc::UnboundedSender<BleEvent>);

    /// Resolves a stored identity to a live peripheral handle, if the
    /// device is currently known to the platform. `None` is not an error;
    /// the device is simply unreachable right now.
    async fn retrieve_known_peripheral(&self, identity: &PeripheralId) -> Option<PeripheralId>;

    /// Requests a connection. Completion arrives as `PeripheralConnected`
    /// or `PeripheralConnectFailed`.
    async fn connect(&self, peripheral: &PeripheralId) -> Result<(), ConnectionError>;

    /// Requests a disconnect. Completion arrives as `PeripheralDisconnected`.
    async fn cancel_connection(&self, peripheral: &PeripheralId) -> Result<(), ConnectionError>;

    /// Issues service discovery restricted to one service UUID.
    async fn discover_services(&self, peripheral: &PeripheralId, service: Uuid);

    /// Issues characteristic discovery restricted to one characteristic
    /// UUID within one service.
    async fn discover_characteristics(
        &self,
        peripheral: &PeripheralId,
        service: Uuid,
        characteristic: Uuid,
    );

    /// Enables or disables notifications on a characteristic.
    async fn set_notify(&self, peripheral: &PeripheralId, characteristic: Uuid, enabled: bool);

    /// Issues an explicit read of a characteristic.
    async fn read_value(&self, peripheral: &PeripheralId, characteristic: Uuid);
}
