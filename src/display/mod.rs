//! Display indicator module
//!
//! The controller shows the toggle state on screen through a write-only
//! indicator with two fixed images. Implementations:
//!
//! - `ChannelIndicator`: forwards frames to a UI thread over an mpsc channel
//! - `LogIndicator`: records frames in the log, for headless runs
//!
//! # Frame Flow
//!
//! ```text
//! ToggleController → IndicatorImage → ChannelIndicator → mpsc → UI render loop
//! ```

pub mod indicator;

pub use indicator::{ChannelIndicator, DisplayIndicator, IndicatorImage, LogIndicator};
