//! Unified error types for the valve/pump controller.
//!
//! A single `Error` enum that every subsystem converts into, keeping the
//! service loop's error handling uniform.  Only [`Error::Io`] is retried
//! implicitly (the state machine that hit it does not advance); every
//! other variant is surfaced to the caller and to telemetry.

use core::fmt;

use crate::valve::ValveState;

// ---------------------------------------------------------------------------
// Top-level controller error
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A request was made while the actuator was not Idle.  Carries the
    /// state observed so the caller can decide to retry or queue.
    InvalidStateForRequest { state: ValveState },
    /// A queued command reached a valve that is mid-transition.  The
    /// command is dropped, never re-queued.
    InterlockViolation { valve: String, state: ValveState },
    /// A digital or analog collaborator failed.
    Io(IoError),
    /// A transition deadline elapsed before the end position was sensed.
    TransitionTimeout { valve: String, state: ValveState },
    /// A command or config entry named a valve that does not exist.
    UnknownValve(String),
    /// A limit named a measurement the monitor cannot select.
    UnknownMeasurement(String),
    /// An inbound payload was not a recognised action.
    UnknownAction(String),
    /// A raw drive code outside the three defined drive states.
    InvalidDriveTransition(u8),
    /// Configuration is invalid.
    Config(&'static str),
}

impl Error {
    /// True for the one class of error the state machines absorb by simply
    /// holding their state until the next tick.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Io(_))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidStateForRequest { state } => {
                write!(f, "request rejected: actuator is {state}, not Idle")
            }
            Self::InterlockViolation { valve, state } => {
                write!(f, "interlock: {valve} is {state}, command dropped")
            }
            Self::Io(e) => write!(f, "io: {e}"),
            Self::TransitionTimeout { valve, state } => {
                write!(f, "{valve} timed out while {state}")
            }
            Self::UnknownValve(name) => write!(f, "unknown valve '{name}'"),
            Self::UnknownMeasurement(name) => write!(f, "unknown measurement '{name}'"),
            Self::UnknownAction(text) => write!(f, "unknown action '{text}'"),
            Self::InvalidDriveTransition(raw) => write!(f, "invalid drive transition code {raw}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// I/O errors
// ---------------------------------------------------------------------------

/// Which side of a collaborator call failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoOp {
    Read,
    Write,
    Analog,
}

/// Failure reported by a [`DigitalIoPort`](crate::app::ports::DigitalIoPort)
/// or [`AnalogPort`](crate::app::ports::AnalogPort) implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IoError {
    pub op: IoOp,
    /// Pin id or analog channel that was being accessed.
    pub pin: u8,
}

impl IoError {
    pub const fn read(pin: u8) -> Self {
        Self { op: IoOp::Read, pin }
    }

    pub const fn write(pin: u8) -> Self {
        Self { op: IoOp::Write, pin }
    }

    pub const fn analog(channel: u8) -> Self {
        Self {
            op: IoOp::Analog,
            pin: channel,
        }
    }
}

impl fmt::Display for IoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.op {
            IoOp::Read => write!(f, "digital read failed on pin {}", self.pin),
            IoOp::Write => write!(f, "digital write failed on pin {}", self.pin),
            IoOp::Analog => write!(f, "analog read failed on channel {}", self.pin),
        }
    }
}

impl From<IoError> for Error {
    fn from(e: IoError) -> Self {
        Self::Io(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Controller-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
