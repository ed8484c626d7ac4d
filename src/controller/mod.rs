//! Toggle controller module
//!
//! This module wires the LED output, the pushbutton input and the on-screen
//! indicator together.
//!
//! # Overview
//!
//! The controller:
//! - **Drives the LED** on direct `turn_on`/`turn_off` commands
//! - **Reacts to button edges** delivered on the peripheral's callback thread
//! - **Keeps the indicator in sync** with the toggle state
//! - **Swallows peripheral errors**: every failure is logged with operation and pin
//!
//! # Event Flow
//!
//! ```text
//! button edge → read value → (value == true) ? toggle : keep → DisplayIndicator
//! UI command  → ControllerCommand → turn_on / turn_off → LED OutputLine
//! ```
//!
//! # Toggle Logic
//!
//! The button is active-low with edge trigger on both edges, so one
//! press-and-release cycle delivers two callbacks:
//!
//! 1. **Press** (value `true`): flip `LedState`, refresh indicator
//! 2. **Release** (value `false`): keep `LedState`, refresh indicator anyway
//!
//! Holding the button does not repeat the toggle; each cycle toggles exactly once.
//!
//! # Thread Safety
//!
//! `LedState` lives in a single cell shared only with the edge callback. Each
//! computed state carries a sequence number; the indicator is updated after
//! the cell is unlocked and a frame older than the last one shown is dropped,
//! so the indicator always ends on the latest state. Line handles sit behind
//! their own mutexes so teardown cannot race a command.

pub mod state;
pub mod toggle_controller;

pub use state::LedState;
pub use toggle_controller::{ControllerCommand, ToggleController};
