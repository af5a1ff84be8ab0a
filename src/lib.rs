//! Dice bridge library
//! Pairs with a Bluetooth LE smart dice accessory, streams roll results and
//! dispatches user-facing feedback. The platform collaborators (accessory
//! picker, BLE stack, notifications/haptics) sit behind narrow traits; the
//! session core is platform-independent.

// Module declarations
pub mod config;
pub mod core;
pub mod sim;
pub mod utils;

// Initialize logging
pub fn setup_logging() {
    env_logger::init();
    log::info!("Logging initialized");
}
