//! Constants used throughout the application
//! This module contains the fixed identifiers of the dice accessory
//! firmware. They must match the accessory bit-exact.

use uuid::Uuid;

/// The service advertised by the pink dice.
pub const UUID_PINK_DICE_SERVICE: Uuid = Uuid::from_u128(0x12345678_1234_5678_1234_567812345678);

/// The service advertised by the blue dice.
pub const UUID_BLUE_DICE_SERVICE: Uuid = Uuid::from_u128(0x87654321_4321_6789_4321_678987654321);

/// The roll-result characteristic, 16-bit alias 0xFF3F expanded over the
/// Bluetooth base UUID.
pub const UUID_ROLL_RESULT_CHAR: Uuid = Uuid::from_u128(0x0000FF3F_0000_1000_8000_00805f9b34fb);
