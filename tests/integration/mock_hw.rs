//! Mock hardware adapters for integration tests.
//!
//! Records every drive write so tests can assert on the full output
//! history, lets tests script sense levels and analog loop currents per
//! pin, and fails reads or writes on demand.

use std::cell::Cell;
use std::collections::HashMap;

use valvebox::app::events::AppEvent;
use valvebox::app::ports::{AnalogPort, Clock, DigitalIoPort, EventSink};
use valvebox::config::ValveConfig;
use valvebox::error::IoError;
use valvebox::pump::PumpState;
use valvebox::valve::{ValvePosition, ValveState};

// ── Drive write record ────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriveWrite {
    pub direction_pin: u8,
    pub enable_pin: u8,
    pub direction: bool,
    pub enable: bool,
}

// ── MockBench ─────────────────────────────────────────────────

/// Pin-level bench.  Unscripted inputs read high, which is "released"
/// for the active-low switches used throughout these tests.
#[derive(Default)]
pub struct MockBench {
    pub levels: HashMap<u8, bool>,
    pub analog_ma: HashMap<u8, f32>,
    pub writes: Vec<DriveWrite>,
    pub fail_reads: bool,
    pub fail_writes: bool,
    pub fail_analog: bool,
}

#[allow(dead_code)]
impl MockBench {
    pub fn new() -> Self {
        Self::default()
    }

    /// Present `position` on an active-low valve's limit switches.
    pub fn set_position(&mut self, valve: &ValveConfig, position: ValvePosition) {
        let (open, closed) = match position {
            ValvePosition::Open => (true, false),
            ValvePosition::Closed => (false, true),
            ValvePosition::Unknown => (false, false),
        };
        self.levels.insert(valve.open_pin, !open);
        self.levels.insert(valve.close_pin, !closed);
    }

    pub fn set_milliamps(&mut self, channel: u8, ma: f32) {
        self.analog_ma.insert(channel, ma);
    }

    /// Writes that went to this output pair.
    pub fn writes_to(&self, direction_pin: u8) -> Vec<DriveWrite> {
        self.writes
            .iter()
            .copied()
            .filter(|w| w.direction_pin == direction_pin)
            .collect()
    }

    /// Last enable level written to this output pair.
    pub fn enabled(&self, direction_pin: u8) -> bool {
        self.writes
            .iter()
            .rev()
            .find(|w| w.direction_pin == direction_pin)
            .is_some_and(|w| w.enable)
    }
}

impl DigitalIoPort for MockBench {
    fn read_position(&mut self, sensor_a: u8, sensor_b: u8) -> Result<(bool, bool), IoError> {
        if self.fail_reads {
            return Err(IoError::read(sensor_a));
        }
        let level = |pin| self.levels.get(&pin).copied().unwrap_or(true);
        Ok((level(sensor_a), level(sensor_b)))
    }

    fn write_drive(
        &mut self,
        direction_pin: u8,
        enable_pin: u8,
        direction: bool,
        enable: bool,
    ) -> Result<(), IoError> {
        if self.fail_writes {
            return Err(IoError::write(direction_pin));
        }
        self.writes.push(DriveWrite {
            direction_pin,
            enable_pin,
            direction,
            enable,
        });
        Ok(())
    }
}

impl AnalogPort for MockBench {
    fn read_milliamps(&mut self, channel: u8) -> Result<f32, IoError> {
        if self.fail_analog {
            return Err(IoError::analog(channel));
        }
        Ok(self.analog_ma.get(&channel).copied().unwrap_or(0.0))
    }
}

// ── ManualClock ───────────────────────────────────────────────

#[derive(Default)]
pub struct ManualClock(Cell<u64>);

impl ManualClock {
    pub fn advance_ms(&self, ms: u64) {
        self.0.set(self.0.get() + ms);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.0.get()
    }
}

// ── RecordingSink ─────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<AppEvent>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Target states of one valve, in order.
    pub fn valve_states(&self, name: &str) -> Vec<ValveState> {
        self.events
            .iter()
            .filter_map(|e| match e {
                AppEvent::ValveStateChanged { valve, to, .. } if valve == name => Some(*to),
                _ => None,
            })
            .collect()
    }

    pub fn pump_states(&self) -> Vec<PumpState> {
        self.events
            .iter()
            .filter_map(|e| match e {
                AppEvent::PumpStateChanged { to, .. } => Some(*to),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, pred: impl Fn(&AppEvent) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}
