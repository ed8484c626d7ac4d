//! Error types for `ledtoggle`
//!
//! This module defines the peripheral error raised by every GPIO operation and
//! the application-level error used by configuration and logging setup.
//!
//! Error variants use `#[source]` to preserve error chains so the logged
//! message always shows the underlying OS error.

use std::fmt;
use std::io;
use thiserror::Error;

/// Simple error type for wrapping string messages while implementing `std::error::Error`
#[derive(Debug, Error)]
#[error("{0}")]
pub struct StringError(pub String);

impl StringError {
    /// Create a new `StringError` from a string message
    pub fn new(msg: impl Into<String>) -> Box<Self> {
        Box::new(Self(msg.into()))
    }
}

/// The peripheral operation that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PeripheralOp {
    /// Claiming a named line from the peripheral service
    Open,
    /// Setting direction, edge trigger or active level
    Configure,
    /// Reading the logical line value
    Read,
    /// Driving the line value
    Write,
    /// Releasing the line
    Close,
    /// Registering an edge callback
    RegisterCallback,
    /// Revoking an edge callback subscription
    UnregisterCallback,
}

impl fmt::Display for PeripheralOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Open => "open",
            Self::Configure => "configure",
            Self::Read => "read",
            Self::Write => "write",
            Self::Close => "close",
            Self::RegisterCallback => "register callback",
            Self::UnregisterCallback => "unregister callback",
        };
        f.write_str(name)
    }
}

/// The single error kind raised by GPIO open/read/write/close operations
///
/// Missing pins surface as [`io::ErrorKind::NotFound`], pins claimed by another
/// owner as [`io::ErrorKind::ResourceBusy`] and closed handles as
/// [`io::ErrorKind::NotConnected`].
#[derive(Debug, Error)]
#[error("GPIO {op} failed on {pin}: {source}")]
pub struct PeripheralIoError {
    /// Operation that failed
    pub op: PeripheralOp,
    /// Logical pin name, e.g. `GPIO_37`
    pub pin: String,
    /// Underlying I/O error
    #[source]
    pub source: io::Error,
}

impl PeripheralIoError {
    /// Wrap an I/O error with the operation and pin it occurred on
    pub fn new(op: PeripheralOp, pin: impl Into<String>, source: io::Error) -> Self {
        Self {
            op,
            pin: pin.into(),
            source,
        }
    }

    /// Pin does not exist on this board
    pub fn no_such_pin(op: PeripheralOp, pin: &str) -> Self {
        Self::new(
            op,
            pin,
            io::Error::new(io::ErrorKind::NotFound, format!("no GPIO named {pin}")),
        )
    }

    /// Pin is already owned by another handle
    pub fn already_claimed(pin: &str) -> Self {
        Self::new(
            PeripheralOp::Open,
            pin,
            io::Error::new(
                io::ErrorKind::ResourceBusy,
                format!("{pin} is already claimed"),
            ),
        )
    }

    /// Handle was used after being closed
    pub fn closed(op: PeripheralOp, pin: &str) -> Self {
        Self::new(
            op,
            pin,
            io::Error::new(io::ErrorKind::NotConnected, format!("{pin} is closed")),
        )
    }

    /// Kind of the underlying I/O error
    pub fn kind(&self) -> io::ErrorKind {
        self.source.kind()
    }
}

/// Result type alias for peripheral operations
pub type PeripheralResult<T> = std::result::Result<T, PeripheralIoError>;

/// Main error type for `ledtoggle`
#[derive(Debug, Error)]
pub enum LedToggleError {
    /// GPIO peripheral error
    #[error("Peripheral error: {0}")]
    Peripheral(#[from] PeripheralIoError),

    /// Configuration error
    /// Preserves the underlying error source for full error chain transparency
    #[error("Configuration error: {0}")]
    ConfigError(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Result type alias for `ledtoggle` operations
pub type Result<T> = std::result::Result<T, LedToggleError>;

/// Convert an error to a user-friendly message
///
/// Used by the binary when startup fails before the controller exists.
pub fn get_user_friendly_error(error: &LedToggleError) -> String {
    match error {
        LedToggleError::Peripheral(e) => match e.kind() {
            io::ErrorKind::NotFound => format!(
                "GPIO pin {} does not exist on this board.\n\n\
                 Check the pin names in config.json.",
                e.pin
            ),
            io::ErrorKind::ResourceBusy => format!(
                "GPIO pin {} is in use by another program.\n\n\
                 Stop the other program or choose a different pin.",
                e.pin
            ),
            io::ErrorKind::PermissionDenied => format!(
                "Permission denied while accessing GPIO pin {}.\n\n\
                 Run as a user in the gpio group.",
                e.pin
            ),
            _ => format!("GPIO pin {} reported an error:\n\n{e}", e.pin),
        },
        LedToggleError::ConfigError(_) => "Failed to load or save configuration.\n\n\
             Your settings may not persist.\n\
             Check that LEDTOGGLE_HOME points to a writable directory."
            .to_string(),
        LedToggleError::IoError(e) => {
            format!(
                "A file system error occurred:\n\n{e}\n\n\
                 Please check file permissions and disk space."
            )
        }
        LedToggleError::JsonError(e) => {
            format!(
                "Configuration file is corrupted:\n\n{e}\n\n\
                 The application will use default settings."
            )
        }
    }
}
