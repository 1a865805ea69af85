//! Session tracking
//!
//! The in-memory picture of what the player is doing, and the state machine
//! that keeps it in sync with the game log.

pub mod instruments;
pub mod machine;
pub mod state;

pub use machine::SessionMachine;
pub use state::{PerformanceRef, SessionState, TrackRef};
