//! Pin configuration types

use serde::{Deserialize, Serialize};

/// Physical voltage level of a pin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    /// Line held near ground
    Low,
    /// Line held near supply voltage
    High,
}

impl Level {
    /// `true` for [`Level::High`]
    pub fn is_high(self) -> bool {
        self == Self::High
    }
}

impl From<bool> for Level {
    fn from(high: bool) -> Self {
        if high { Self::High } else { Self::Low }
    }
}

/// Which voltage level reads as logical `true`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActiveLevel {
    /// High voltage is `true`
    High,
    /// Low voltage is `true` (pressed pull-up button)
    Low,
}

impl ActiveLevel {
    /// Logical value reported for a physical level
    pub fn logical(self, level: Level) -> bool {
        match self {
            Self::High => level == Level::High,
            Self::Low => level == Level::Low,
        }
    }

    /// Physical level that produces a logical value
    pub fn physical(self, logical: bool) -> Level {
        match self {
            Self::High => Level::from(logical),
            Self::Low => Level::from(!logical),
        }
    }
}

/// Transitions of the logical value that fire edge callbacks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeTrigger {
    /// No callbacks
    None,
    /// `false → true`
    Rising,
    /// `true → false`
    Falling,
    /// Any change
    Both,
}

impl EdgeTrigger {
    /// Whether a change from `previous` to `current` fires a callback
    pub fn fires(self, previous: bool, current: bool) -> bool {
        if previous == current {
            return false;
        }
        match self {
            Self::None => false,
            Self::Rising => current,
            Self::Falling => !current,
            Self::Both => true,
        }
    }

    /// Value written to a sysfs `edge` attribute
    pub fn sysfs_name(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Rising => "rising",
            Self::Falling => "falling",
            Self::Both => "both",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_active_low_inverts() {
        assert!(ActiveLevel::Low.logical(Level::Low));
        assert!(!ActiveLevel::Low.logical(Level::High));
        assert_eq!(ActiveLevel::Low.physical(true), Level::Low);
        assert_eq!(ActiveLevel::High.physical(true), Level::High);
    }

    #[test]
    fn test_edge_trigger_filtering() {
        assert!(EdgeTrigger::Both.fires(false, true));
        assert!(EdgeTrigger::Both.fires(true, false));
        assert!(EdgeTrigger::Rising.fires(false, true));
        assert!(!EdgeTrigger::Rising.fires(true, false));
        assert!(EdgeTrigger::Falling.fires(true, false));
        assert!(!EdgeTrigger::Falling.fires(false, true));
        assert!(!EdgeTrigger::None.fires(false, true));
    }

    #[test]
    fn test_no_edge_without_change() {
        for trigger in [
            EdgeTrigger::None,
            EdgeTrigger::Rising,
            EdgeTrigger::Falling,
            EdgeTrigger::Both,
        ] {
            assert!(!trigger.fires(true, true));
            assert!(!trigger.fires(false, false));
        }
    }
}
