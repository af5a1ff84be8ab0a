//! Core session logic for the dice bridge.

pub mod bluetooth;
pub mod dice;
pub mod feedback;
pub mod pairing;
pub mod registry;
pub mod roll;
pub mod session;

pub use session::{DiceSession, SessionPhase, SessionState};
