//! Bluetooth functionality for the dice bridge
//! This module holds the central seam, connection control and GATT
//! discovery for the roll-result characteristic.

pub mod bluest_link;
pub mod connection;
pub mod constants;
pub mod discovery;
pub mod link;
pub mod types;

// Re-export types that should be publicly accessible
pub use connection::ConnectionController;
pub use constants::*;
pub use discovery::{DiscoveryError, DiscoveryPhase, GattDiscoveryPipeline};
pub use link::{BleCentral, BleEvent, ConnectionError};
pub use types::{CharacteristicSession, DiceAccessory, PeripheralId, RadioState};
