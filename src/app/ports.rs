//! Port traits — the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ ValveActuator / PumpOrchestrator (domain)
//! ```
//!
//! Driven adapters (pin expander, ADC, clock, event sinks, config storage)
//! implement these traits.  The state machines receive them as generic
//! parameters at call sites, so the core never touches hardware directly.
//!
//! ## Threading
//!
//! [`DigitalIoPort`] and [`AnalogPort`] are assumed non-reentrant and are
//! only ever called from the service loop thread.  The one structure that
//! crosses threads is the command queue in [`commands`](super::commands).

use crate::config::SystemConfig;
use crate::error::IoError;

use super::events::AppEvent;

// ───────────────────────────────────────────────────────────────
// Digital I/O port (driven adapter: domain ↔ pin expander)
// ───────────────────────────────────────────────────────────────

/// Discrete sense inputs and drive outputs, addressed by pin id.
pub trait DigitalIoPort {
    /// Read two sensor bits in one go.  Levels are raw (polarity is the
    /// caller's concern).
    fn read_position(&mut self, sensor_a: u8, sensor_b: u8) -> Result<(bool, bool), IoError>;

    /// Drive a direction + enable output pair.
    fn write_drive(
        &mut self,
        direction_pin: u8,
        enable_pin: u8,
        direction: bool,
        enable: bool,
    ) -> Result<(), IoError>;
}

// ───────────────────────────────────────────────────────────────
// Analog port (driven adapter: ADC → domain)
// ───────────────────────────────────────────────────────────────

/// 4–20 mA current-loop inputs.
pub trait AnalogPort {
    /// Loop current on `channel`, in milliamps.
    fn read_milliamps(&mut self, channel: u8) -> Result<f32, IoError>;
}

// ───────────────────────────────────────────────────────────────
// Clock port
// ───────────────────────────────────────────────────────────────

/// Monotonic time source.  Deadlines are checked once per tick against
/// this value, so detection latency is at most one tick period.
pub trait Clock {
    /// Milliseconds since an arbitrary fixed origin.  Never decreases.
    fn now_ms(&self) -> u64;
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging / telemetry)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`]s through this port.  Adapters
/// decide where they go (console log, MQTT, ...).  Emission cannot fail
/// from the domain's point of view; transport problems stay in the adapter.
pub trait EventSink {
    fn emit(&mut self, event: &AppEvent);
}

/// Sink that drops everything.
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&mut self, _event: &AppEvent) {}
}

// ───────────────────────────────────────────────────────────────
// Configuration port (driven adapter: domain ↔ persistent config)
// ───────────────────────────────────────────────────────────────

/// Loads and persists system configuration.
///
/// Implementations MUST call [`SystemConfig::validate`] before persisting
/// and reject invalid values with [`ConfigError::ValidationFailed`].
pub trait ConfigPort {
    /// Load configuration.  Returns [`SystemConfig::default()`] if no stored
    /// config exists.
    fn load(&self) -> Result<SystemConfig, ConfigError>;

    /// Validate and persist configuration.
    fn save(&self, config: &SystemConfig) -> Result<(), ConfigError>;
}

/// Errors from [`ConfigPort`] operations.
#[derive(Debug)]
pub enum ConfigError {
    /// Stored config failed deserialization.
    Corrupted(String),
    /// A config field failed validation.
    ValidationFailed(crate::error::Error),
    /// Generic I/O error from the storage backend.
    IoError(std::io::Error),
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Corrupted(msg) => write!(f, "config corrupted: {}", msg),
            Self::ValidationFailed(e) => write!(f, "validation failed: {}", e),
            Self::IoError(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        Self::IoError(e)
    }
}
