//! Shared type definitions for the Cadence adaptive signal controller.
//!
//! Types here are used by the fuzzy controller, the session runner, and the
//! engine binary. Keeping them in one crate means lanes and strategies are
//! strongly typed everywhere, so a lookup can never miss on a misspelled name.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe UUID wrapper for session identifiers
//! - [`enums`] -- Lanes, control strategies, and phase groups
//! - [`structs`] -- Wait-time samples and signal state snapshots

pub mod enums;
pub mod ids;
pub mod structs;

pub use enums::{Lane, PhaseGroup, Strategy};
pub use ids::SessionId;
pub use structs::{SignalState, WaitTimeSample};
