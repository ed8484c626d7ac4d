//! Toggle state machine

/// Whether the LED should currently be lit
///
/// Starts [`LedState::Off`] on every controller initialization and is never
/// persisted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum LedState {
    /// LED dark
    #[default]
    Off,
    /// LED lit
    On,
}

impl LedState {
    /// Opposite state
    #[must_use]
    pub fn toggled(self) -> Self {
        match self {
            Self::Off => Self::On,
            Self::On => Self::Off,
        }
    }

    /// State after an edge whose read value was `pressed`
    ///
    /// Only the active half of a press-release cycle toggles.
    #[must_use]
    pub fn after_edge(self, pressed: bool) -> Self {
        if pressed { self.toggled() } else { self }
    }

    /// `true` for [`LedState::On`]
    pub fn is_on(self) -> bool {
        self == Self::On
    }
}

impl From<bool> for LedState {
    fn from(on: bool) -> Self {
        if on { Self::On } else { Self::Off }
    }
}
