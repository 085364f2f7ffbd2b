//! Outbound application events.
//!
//! The state machines emit these through the
//! [`EventSink`](super::ports::EventSink) port.  Adapters on the other
//! side decide what to do with them: log to the console, publish over
//! the message bus, etc.  [`AppEvent::publications`] gives the bus view.

use heapless::Vec as FixedVec;
use serde::Serialize;

use crate::error::Error;
use crate::pump::PumpState;
use crate::pump::limits::{Measurements, Violation};
use crate::valve::{ValvePosition, ValveState};

/// Structured events emitted by the controller core.
#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    /// The service finished building its actuators.
    Started { valves: usize, pump: bool },

    /// A valve actuator changed state.
    ValveStateChanged {
        valve: String,
        from: ValveState,
        to: ValveState,
        /// Human-readable reason, e.g. the timeout that was armed.
        context: String,
    },

    /// A valve's sensed position differs from the previous reading.
    ValvePositionChanged {
        valve: String,
        position: ValvePosition,
    },

    /// The pump orchestrator changed state.
    PumpStateChanged { from: PumpState, to: PumpState },

    /// Periodic pump measurements.
    PumpMeasurements(Measurements),

    /// A limit evaluated true while pumping.
    LimitViolated(Violation),

    /// An inbound command was dropped (unknown valve, interlock, ...).
    CommandRejected { target: String, error: Error },

    /// A fault surfaced from a state machine tick.
    Fault { source: String, error: Error },
}

/// Payload of a bus message: the core only ever publishes text or numbers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Payload {
    Text(String),
    Number(f64),
}

/// One outbound message, addressed relative to the configured base topic.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Publication {
    pub topic_suffix: String,
    pub payload: Payload,
}

impl Publication {
    fn text(topic_suffix: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            topic_suffix: topic_suffix.into(),
            payload: Payload::Text(text.into()),
        }
    }

    fn number(topic_suffix: impl Into<String>, value: f32) -> Self {
        Self {
            topic_suffix: topic_suffix.into(),
            payload: Payload::Number(f64::from(value)),
        }
    }
}

/// Topic suffix for faults, rejections and limit violations.
pub const ERROR_TOPIC: &str = "error_message";

impl AppEvent {
    /// Bus messages for this event.  Empty for events that are log-only.
    pub fn publications(&self) -> FixedVec<Publication, 3> {
        let mut out = FixedVec::new();
        // Capacity 3 covers the largest case (measurements); pushes below
        // never exceed it.
        match self {
            Self::Started { .. } => {}
            Self::ValveStateChanged { valve, to, .. } => {
                let _ = out.push(Publication::text(format!("{valve}/state"), to.label()));
            }
            Self::ValvePositionChanged { valve, position } => {
                let _ = out.push(Publication::text(
                    format!("{valve}/position"),
                    position.label(),
                ));
            }
            Self::PumpStateChanged { to, .. } => {
                let _ = out.push(Publication::text("system_state", to.label()));
            }
            Self::PumpMeasurements(m) => {
                let _ = out.push(Publication::number("motor_current", m.motor_current_amps));
                let _ = out.push(Publication::number("pressure", m.water_pressure_psi));
                let _ = out.push(Publication::number("pump_run_time_secs", m.pump_runtime_secs));
            }
            Self::LimitViolated(v) => {
                let _ = out.push(Publication::text(ERROR_TOPIC, v.message.clone()));
            }
            Self::CommandRejected { target, error } => {
                let _ = out.push(Publication::text(ERROR_TOPIC, format!("{target}: {error}")));
            }
            Self::Fault { source, error } => {
                let _ = out.push(Publication::text(ERROR_TOPIC, format!("{source}: {error}")));
            }
        }
        out
    }
}
