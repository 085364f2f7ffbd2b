//! Safety limit evaluation for the pump.
//!
//! A [`LimitMonitor`] holds an ordered table of [`Limit`]s.  Each tick in
//! Pumping the orchestrator hands it the latest [`Measurements`]; the
//! monitor returns every violated limit and takes no action itself.
//!
//! Measurement selectors are resolved when the table is built, so an
//! unknown selector is a configuration error and evaluation is total.

use core::fmt;
use core::str::FromStr;

use heapless::Vec as FixedVec;
use serde::{Deserialize, Serialize};

use crate::config::LimitConfig;
use crate::error::{Error, Result};

/// Maximum number of limits in one table.
pub const MAX_LIMITS: usize = 8;

// ---------------------------------------------------------------------------
// Measurements
// ---------------------------------------------------------------------------

/// Quantities sampled each tick while the pump box runs.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Measurements {
    pub motor_current_amps: f32,
    pub water_pressure_psi: f32,
    /// Seconds since the motor was energised; zero when not pumping.
    pub pump_runtime_secs: f32,
}

/// Selector for one field of [`Measurements`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Quantity {
    MotorCurrentAmps,
    WaterPressurePsi,
    PumpRuntimeSecs,
}

impl Quantity {
    pub const fn key(self) -> &'static str {
        match self {
            Self::MotorCurrentAmps => "motor_current_amps",
            Self::WaterPressurePsi => "water_pressure_psi",
            Self::PumpRuntimeSecs => "pump_runtime_secs",
        }
    }

    /// True for quantities read from the analog front end; false for those
    /// derived from the clock.
    pub const fn is_sampled(self) -> bool {
        !matches!(self, Self::PumpRuntimeSecs)
    }

    pub fn select(self, m: &Measurements) -> f32 {
        match self {
            Self::MotorCurrentAmps => m.motor_current_amps,
            Self::WaterPressurePsi => m.water_pressure_psi,
            Self::PumpRuntimeSecs => m.pump_runtime_secs,
        }
    }
}

impl FromStr for Quantity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "motor_current_amps" => Ok(Self::MotorCurrentAmps),
            "water_pressure_psi" => Ok(Self::WaterPressurePsi),
            "pump_runtime_secs" => Ok(Self::PumpRuntimeSecs),
            other => Err(Error::UnknownMeasurement(other.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Thresholds
// ---------------------------------------------------------------------------

/// Predicate that is true when a value is out of bounds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Threshold {
    Above(f32),
    Below(f32),
    Outside { min: f32, max: f32 },
}

impl Threshold {
    /// A non-finite value always violates: a reading that cannot be
    /// compared is never treated as safe.
    pub fn violated_by(self, value: f32) -> bool {
        if !value.is_finite() {
            return true;
        }
        match self {
            Self::Above(max) => value > max,
            Self::Below(min) => value < min,
            Self::Outside { min, max } => value < min || value > max,
        }
    }
}

impl fmt::Display for Threshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Above(max) => write!(f, "above {max:.2}"),
            Self::Below(min) => write!(f, "below {min:.2}"),
            Self::Outside { min, max } => write!(f, "outside {min:.2}..{max:.2}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Limit table
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct Limit {
    pub name: String,
    pub quantity: Quantity,
    pub threshold: Threshold,
    pub shutdown_on_error: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Violation {
    pub name: String,
    pub message: String,
    pub measured_value: f32,
    pub shutdown_on_error: bool,
}

#[derive(Debug, Clone, Default)]
pub struct LimitMonitor {
    limits: FixedVec<Limit, MAX_LIMITS>,
}

impl LimitMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from configuration, resolving every measurement selector.
    pub fn from_config(configs: &[LimitConfig]) -> Result<Self> {
        let mut monitor = Self::new();
        for cfg in configs {
            monitor.push(Limit {
                name: cfg.name.clone(),
                quantity: cfg.measurement.parse()?,
                threshold: cfg.threshold,
                shutdown_on_error: cfg.shutdown_on_error,
            })?;
        }
        Ok(monitor)
    }

    pub fn push(&mut self, limit: Limit) -> Result<()> {
        self.limits
            .push(limit)
            .map_err(|_| Error::Config("too many limits"))
    }

    pub fn limits(&self) -> &[Limit] {
        &self.limits
    }

    /// Every violated limit, in table order.  Pure: no logging, no state.
    pub fn evaluate(&self, measurements: &Measurements) -> FixedVec<Violation, MAX_LIMITS> {
        self.evaluate_available(measurements, |_| true)
    }

    /// Like [`evaluate`](Self::evaluate), restricted to limits whose
    /// quantity is `available`.  Used when part of the sample is missing.
    pub fn evaluate_available(
        &self,
        measurements: &Measurements,
        available: impl Fn(Quantity) -> bool,
    ) -> FixedVec<Violation, MAX_LIMITS> {
        let mut violations = FixedVec::new();
        for limit in self.limits.iter().filter(|l| available(l.quantity)) {
            let value = limit.quantity.select(measurements);
            if limit.threshold.violated_by(value) {
                // Same capacity as `limits`, cannot overflow.
                let _ = violations.push(Violation {
                    name: limit.name.clone(),
                    message: format!(
                        "{}: {} = {:.2} is {}",
                        limit.name,
                        limit.quantity.key(),
                        value,
                        limit.threshold
                    ),
                    measured_value: value,
                    shutdown_on_error: limit.shutdown_on_error,
                });
            }
        }
        violations
    }
}
