//! The seam to the platform accessory-pairing service. The service owns the
//! picker UI and the persistence of paired-accessory records; this crate
//! only reacts to its events.

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::core::bluetooth::types::DiceAccessory;
use crate::core::dice::DiceColor;

/// Errors surfaced by the pairing collaborator.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PairingError {
    #[error("picker failed: {0}")]
    PickerFailed(String),
    #[error("picker was dismissed without a selection")]
    PickerDismissed,
    #[error("accessory removal failed: {0}")]
    RemovalFailed(String),
}

/// One entry offered in the accessory picker.
#[derive(Debug, Clone)]
pub struct PickerItem {
    pub name: String,
    pub color: DiceColor,
}

impl PickerItem {
    pub fn for_color(color: DiceColor) -> Self {
        Self {
            name: color.display_name().to_owned(),
            color,
        }
    }
}

/// Events emitted by the accessory-pairing service. The accessory payload
/// is optional on the wire; events that should carry one but do not are
/// treated as malformed and ignored by the registry.
#[derive(Debug, Clone)]
pub enum PairingEvent {
    Activated { accessory: Option<DiceAccessory> },
    AccessoryAdded { accessory: Option<DiceAccessory> },
    AccessoryChanged { accessory: Option<DiceAccessory> },
    AccessoryRemoved,
    PickerDidPresent,
    PickerDidDismiss,
}

/// The accessory-pairing collaborator.
///
/// `activate` is idempotent: repeated calls replace the event sink and
/// re-emit `Activated` with the currently-paired accessory, if any.
#[async_trait]
pub trait AccessoryPairing: Send + Sync {
    async fn activate(&self, events: mpsc::UnboundedSender<PairingEvent>);

    /// Presents the system picker for the given candidates. Selection and
    /// dismissal arrive asynchronously as [`PairingEvent`]s.
    async fn show_picker(&self, candidates: &[PickerItem]) -> Result<(), PairingError>;

    /// Requests removal of a paired accessory. On success the service emits
    /// `AccessoryRemoved`.
    async fn remove_accessory(&self, accessory: &DiceAccessory) -> Result<(), PairingError>;
}
