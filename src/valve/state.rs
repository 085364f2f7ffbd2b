//! Value types for the ball valve state machine.

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::error::Error;

// ---------------------------------------------------------------------------
// Actuator state
// ---------------------------------------------------------------------------

/// Every state a [`ValveActuator`](super::ValveActuator) can be in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ValveState {
    Init = 0,
    Idle = 1,
    StartOpening = 2,
    Opening = 3,
    Open = 4,
    StartClosing = 5,
    Closing = 6,
    Closed = 7,
}

impl ValveState {
    pub const COUNT: usize = 8;

    /// Decode a raw state code.  Unknown codes map to `Init`, the
    /// recovery state, with a debug assertion.
    pub fn from_index(idx: usize) -> Self {
        match idx {
            0 => Self::Init,
            1 => Self::Idle,
            2 => Self::StartOpening,
            3 => Self::Opening,
            4 => Self::Open,
            5 => Self::StartClosing,
            6 => Self::Closing,
            7 => Self::Closed,
            _ => {
                debug_assert!(false, "invalid valve state index: {idx}");
                Self::Init
            }
        }
    }

    /// Upper-case label used on the telemetry topic.
    pub const fn label(self) -> &'static str {
        match self {
            Self::Init => "INIT",
            Self::Idle => "IDLE",
            Self::StartOpening => "START OPENING",
            Self::Opening => "OPENING",
            Self::Open => "OPEN",
            Self::StartClosing => "START CLOSING",
            Self::Closing => "CLOSING",
            Self::Closed => "CLOSED",
        }
    }

    /// States during which the drive may be energised and new commands
    /// must be refused.
    pub const fn is_transition(self) -> bool {
        matches!(
            self,
            Self::StartOpening | Self::Opening | Self::StartClosing | Self::Closing
        )
    }
}

impl fmt::Display for ValveState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

// ---------------------------------------------------------------------------
// Transition request (single slot)
// ---------------------------------------------------------------------------

/// A pending request, consumed by the machine on its next Idle tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransitionRequest {
    #[default]
    None,
    Open,
    Close,
}

// ---------------------------------------------------------------------------
// Drive output
// ---------------------------------------------------------------------------

/// What the direction + enable pair is told to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DriveState {
    None = 0,
    Open = 1,
    Close = 2,
}

impl DriveState {
    /// `(direction, enable)` output levels.
    pub const fn levels(self) -> (bool, bool) {
        match self {
            Self::None => (false, false),
            Self::Open => (false, true),
            Self::Close => (true, true),
        }
    }
}

impl TryFrom<u8> for DriveState {
    type Error = Error;

    fn try_from(raw: u8) -> Result<Self, Self::Error> {
        match raw {
            0 => Ok(Self::None),
            1 => Ok(Self::Open),
            2 => Ok(Self::Close),
            other => Err(Error::InvalidDriveTransition(other)),
        }
    }
}

// ---------------------------------------------------------------------------
// Sensed position
// ---------------------------------------------------------------------------

/// End position as reported by the two limit switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValvePosition {
    /// Neither or both switches asserted.  Never treated as an end state.
    Unknown,
    Open,
    Closed,
}

impl ValvePosition {
    /// Decode from asserted (polarity-corrected) switch bits.
    pub const fn from_asserted(open: bool, closed: bool) -> Self {
        match (open, closed) {
            (true, false) => Self::Open,
            (false, true) => Self::Closed,
            _ => Self::Unknown,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Unknown => "UNKNOWN",
            Self::Open => "OPEN",
            Self::Closed => "CLOSED",
        }
    }
}

impl fmt::Display for ValvePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ---------------------------------------------------------------------------
// Wiring
// ---------------------------------------------------------------------------

/// Which input level means "switch engaged".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensePolarity {
    ActiveHigh,
    /// Switch pulls the input low when engaged (installed boxes).
    #[default]
    ActiveLow,
}

impl SensePolarity {
    pub const fn asserted(self, level: bool) -> bool {
        match self {
            Self::ActiveHigh => level,
            Self::ActiveLow => !level,
        }
    }

    /// Raw level a switch presents when `asserted`.
    pub const fn level(self, asserted: bool) -> bool {
        self.asserted(asserted)
    }
}

/// Fixed pin bindings for one valve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValvePins {
    pub open_sense: u8,
    pub close_sense: u8,
    pub direction: u8,
    pub enable: u8,
}
