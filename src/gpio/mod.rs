//! GPIO peripheral access module
//!
//! This module describes the peripheral collaborators the controller talks to
//! and provides two implementations of them.
//!
//! # Overview
//!
//! - **`PeripheralService`**: opens named lines as inputs or outputs
//! - **`InputLine`**: readable line that delivers edge callbacks
//! - **`OutputLine`**: writable line
//! - **`Subscription`**: handle returned by callback registration, used to revoke it
//! - **`CallbackAction`**: what an edge callback asks the line to do next
//!
//! # Backends
//!
//! - `simulated`: in-memory board with fault injection, used by tests and the demo mode
//! - `sysfs`: Linux `/sys/class/gpio` interface with a polling edge watcher per input line
//!
//! # Callback Dispatch
//!
//! ```text
//! level change → EdgeTrigger filter → CallbackRegistry::dispatch → callback(&dyn LevelSource)
//!                                                                       ↓
//!                                                       Continue (kept) / Unsubscribe (dropped)
//! ```
//!
//! Dispatch for one line is serialized: two edges on the same line are never
//! handled concurrently, and unregistering waits for an in-flight callback.

pub mod line;
pub mod simulated;
pub mod sysfs;
pub mod types;

pub use line::{
    CallbackAction, CallbackRegistry, EdgeCallback, InputLine, LevelSource, OutputLine,
    PeripheralService, Subscription,
};
pub use simulated::SimulatedPeripheralService;
pub use sysfs::SysfsPeripheralService;
pub use types::{ActiveLevel, EdgeTrigger, Level};
