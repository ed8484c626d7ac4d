//! `ledtoggle` - event-driven GPIO LED toggle controller
//!
//! A momentary push-button on one GPIO line toggles an on/off state that is
//! mirrored on a display indicator, while explicit commands drive an LED on a
//! second line. Peripheral failures never abort the program: they are logged
//! and the affected feature goes inert.
//!
//! # Architecture
//!
//! - [`gpio`]: peripheral service seam with sysfs and simulated backends
//! - [`controller`]: the toggle controller and its state cell
//! - [`display`]: indicator abstraction the toggle state is rendered to
//! - [`config`]: JSON configuration with atomic saves

// Module declarations
pub mod config;
pub mod controller;
pub mod display;
pub mod error;
pub mod gpio;
pub mod utils;

#[cfg(test)]
mod test_utils;

// Re-export commonly used types
pub use error::{LedToggleError, Result};
