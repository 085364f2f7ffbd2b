//! Pump orchestration state machine.
//!
//! Sequences the pump's inlet valve, the motor contactor and the safety
//! limits:
//!
//! ```text
//!  INIT ──▶ IDLE ──[ON]──▶ STARTING ──▶ OPENING_VALVE ──[valve open]──▶ PUMPING
//!   ▲        ▲                              │                          │
//!   │        │                        [valve timeout]        [OFF or limit violated]
//!   ├────────┼──────────────────────────────┘                          ▼
//!   │        └──── STOPPED ◀──[valve closed]──────────────────────  STOPPING
//!   └─────────────────────────────────[valve timeout]────────────────────┘
//! ```
//!
//! The motor contactor is energised if and only if the state is Pumping:
//! the contactor write happens before entering Pumping and before leaving
//! it, and a failed write holds the current state for a retry next tick.

pub mod limits;

use core::fmt;

use log::{error, info, warn};
use serde::Serialize;

use crate::app::events::AppEvent;
use crate::app::ports::{Clock, DigitalIoPort, EventSink};
use crate::config::{ContactorConfig, PumpConfig};
use crate::error::{Error, Result};
use crate::valve::{TransitionRequest, ValveActuator, ValveState};

use limits::{LimitMonitor, Measurements};

// ---------------------------------------------------------------------------
// State identity
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[repr(u8)]
pub enum PumpState {
    Init = 0,
    Idle = 1,
    Starting = 2,
    OpeningValve = 3,
    Pumping = 4,
    Stopping = 5,
    /// Reserved; no transition leads here and a tick in it recovers to Init.
    ClosingValve = 6,
    Stopped = 7,
}

impl PumpState {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Init => "INIT",
            Self::Idle => "IDLE",
            Self::Starting => "STARTING",
            Self::OpeningValve => "OPENING VALVE",
            Self::Pumping => "PUMPING",
            Self::Stopping => "STOPPING",
            Self::ClosingValve => "CLOSING VALVE",
            Self::Stopped => "STOPPED",
        }
    }
}

impl fmt::Display for PumpState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Remote run request, single slot like the valve's transition request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PumpRequest {
    #[default]
    None,
    On,
    Off,
}

// ---------------------------------------------------------------------------
// Motor contactor
// ---------------------------------------------------------------------------

/// Contactor coil driven through a direction + enable output pair.
pub struct MotorContactor {
    pins: ContactorConfig,
    energized: bool,
}

impl MotorContactor {
    pub fn new(pins: ContactorConfig) -> Self {
        Self {
            pins,
            energized: false,
        }
    }

    /// Write the coil state.  `energized` only changes once the write
    /// succeeded.
    pub fn set(&mut self, io: &mut impl DigitalIoPort, on: bool) -> Result<()> {
        io.write_drive(self.pins.direction_pin, self.pins.enable_pin, false, on)?;
        self.energized = on;
        Ok(())
    }

    pub fn is_energized(&self) -> bool {
        self.energized
    }
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

pub struct PumpOrchestrator {
    state: PumpState,
    request: PumpRequest,
    valve: ValveActuator,
    contactor: MotorContactor,
    limits: LimitMonitor,
    /// Set when the motor was energised; cleared on Init/Idle.
    pump_start_ms: Option<u64>,
    /// Set on entering Starting; cleared on Init/Idle.
    cycle_start_ms: Option<u64>,
    /// Valve request the valve refused (not Idle yet); retried every tick.
    pending_valve: Option<TransitionRequest>,
    /// Valve reported Open while waiting in OpeningValve.
    valve_confirmed_open: bool,
}

impl PumpOrchestrator {
    pub fn new(valve: ValveActuator, contactor: MotorContactor, limits: LimitMonitor) -> Self {
        Self {
            state: PumpState::Init,
            request: PumpRequest::None,
            valve,
            contactor,
            limits,
            pump_start_ms: None,
            cycle_start_ms: None,
            pending_valve: None,
            valve_confirmed_open: false,
        }
    }

    pub fn from_config(cfg: &PumpConfig) -> Result<Self> {
        Ok(Self::new(
            ValveActuator::from_config(&cfg.valve),
            MotorContactor::new(cfg.motor_contactor),
            LimitMonitor::from_config(&cfg.limits)?,
        ))
    }

    // ── Requests ──────────────────────────────────────────────

    pub fn request(&mut self, request: PumpRequest) {
        info!("Pump request: {:?}", request);
        self.request = request;
    }

    pub fn request_on(&mut self) {
        self.request(PumpRequest::On);
    }

    pub fn request_off(&mut self) {
        self.request(PumpRequest::Off);
    }

    // ── Per-tick orchestration ────────────────────────────────

    /// Run one cycle: valve step, pending valve retry, then the pump step.
    ///
    /// `readings` carries motor current and water pressure; `None` means
    /// the analog sample failed this tick; only clock-derived limits
    /// (motor runtime) are checked then.
    /// Valve timeouts are handled here (they drive the pump back to Init);
    /// only I/O failures are returned.
    pub fn tick(
        &mut self,
        io: &mut impl DigitalIoPort,
        clock: &impl Clock,
        readings: Option<Measurements>,
        sink: &mut impl EventSink,
    ) -> Result<()> {
        let valve_result = match self.valve.process(io, clock, sink) {
            Err(Error::TransitionTimeout { .. }) => Ok(()),
            other => other,
        };
        self.retry_pending_valve();
        let pump_result = self.step(io, clock, readings, sink);
        pump_result.and(valve_result)
    }

    fn step(
        &mut self,
        io: &mut impl DigitalIoPort,
        clock: &impl Clock,
        readings: Option<Measurements>,
        sink: &mut impl EventSink,
    ) -> Result<()> {
        let now = clock.now_ms();
        match self.state {
            PumpState::Init => {
                self.contactor.set(io, false)?;
                self.request = PumpRequest::None;
                self.command_valve(TransitionRequest::Close);
                self.change_state(PumpState::Idle, sink);
            }
            PumpState::Idle => {
                if core::mem::take(&mut self.request) == PumpRequest::On {
                    self.cycle_start_ms = Some(now);
                    self.change_state(PumpState::Starting, sink);
                }
            }
            PumpState::Starting => {
                self.valve_confirmed_open = false;
                self.command_valve(TransitionRequest::Open);
                self.change_state(PumpState::OpeningValve, sink);
            }
            PumpState::OpeningValve => {
                if self.valve.is_open() || self.valve_confirmed_open {
                    self.valve_confirmed_open = true;
                    self.contactor.set(io, true)?;
                    self.pump_start_ms = Some(now);
                    self.change_state(PumpState::Pumping, sink);
                } else if self.valve_attempt_failed() {
                    self.report_valve_timeout(ValveState::Opening, sink);
                    self.change_state(PumpState::Init, sink);
                }
            }
            PumpState::Pumping => {
                if self.request == PumpRequest::Off {
                    self.stop(io, sink)?;
                    self.request = PumpRequest::None;
                    return Ok(());
                }
                // An On while already pumping is consumed without effect.
                self.request = PumpRequest::None;

                let runtime = self.pump_runtime_secs(now);
                let violations = match readings {
                    Some(mut m) => {
                        m.pump_runtime_secs = runtime;
                        self.limits.evaluate(&m)
                    }
                    None => {
                        warn!("Pump: no analog sample this tick, checking clock limits only");
                        let m = Measurements {
                            motor_current_amps: f32::NAN,
                            water_pressure_psi: f32::NAN,
                            pump_runtime_secs: runtime,
                        };
                        self.limits.evaluate_available(&m, |q| !q.is_sampled())
                    }
                };
                let mut shutdown = false;
                for v in &violations {
                    error!("LIMIT VIOLATED: {}", v.message);
                    sink.emit(&AppEvent::LimitViolated(v.clone()));
                    shutdown |= v.shutdown_on_error;
                }
                if shutdown {
                    self.stop(io, sink)?;
                }
            }
            PumpState::Stopping => {
                if self.valve.is_closed() {
                    self.change_state(PumpState::Stopped, sink);
                } else if self.valve_attempt_failed() {
                    self.report_valve_timeout(ValveState::Closing, sink);
                    self.change_state(PumpState::Init, sink);
                }
            }
            PumpState::Stopped => {
                self.change_state(PumpState::Idle, sink);
            }
            PumpState::ClosingValve => {
                warn!("Pump: unexpected state {}, recovering to Init", self.state);
                self.change_state(PumpState::Init, sink);
            }
        }
        Ok(())
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn state(&self) -> PumpState {
        self.state
    }

    pub fn pending_request(&self) -> PumpRequest {
        self.request
    }

    pub fn valve(&self) -> &ValveActuator {
        &self.valve
    }

    pub fn limits(&self) -> &LimitMonitor {
        &self.limits
    }

    pub fn motor_energized(&self) -> bool {
        self.contactor.is_energized()
    }

    pub fn pump_start_ms(&self) -> Option<u64> {
        self.pump_start_ms
    }

    pub fn cycle_start_ms(&self) -> Option<u64> {
        self.cycle_start_ms
    }

    /// Seconds the motor has been running, zero when stopped.
    pub fn pump_runtime_secs(&self, now_ms: u64) -> f32 {
        self.pump_start_ms
            .map_or(0.0, |start| now_ms.saturating_sub(start) as f32 / 1000.0)
    }

    // ── Internal ──────────────────────────────────────────────

    fn stop(&mut self, io: &mut impl DigitalIoPort, sink: &mut impl EventSink) -> Result<()> {
        self.contactor.set(io, false)?;
        self.command_valve(TransitionRequest::Close);
        self.change_state(PumpState::Stopping, sink);
        Ok(())
    }

    /// Ask the valve to move, or park the request until it is Idle.
    fn command_valve(&mut self, request: TransitionRequest) {
        let result = match request {
            TransitionRequest::Open => self.valve.request_open(),
            TransitionRequest::Close => self.valve.request_close(),
            TransitionRequest::None => return,
        };
        match result {
            Ok(()) => self.pending_valve = None,
            Err(e) => {
                warn!("Pump: valve {:?} deferred ({})", request, e);
                self.pending_valve = Some(request);
            }
        }
    }

    fn retry_pending_valve(&mut self) {
        if let Some(request) = self.pending_valve {
            if self.valve.is_idle() {
                self.command_valve(request);
            }
        }
    }

    /// The latest valve attempt ended in a timeout.  A stale flag from an
    /// earlier attempt does not count while our request is still queued.
    fn valve_attempt_failed(&self) -> bool {
        self.pending_valve.is_none()
            && self.valve.pending_request() == TransitionRequest::None
            && self.valve.is_timed_out()
    }

    fn report_valve_timeout(&self, moving: ValveState, sink: &mut impl EventSink) {
        let error = Error::TransitionTimeout {
            valve: self.valve.name().to_string(),
            state: moving,
        };
        error!("Pump: {}", error);
        sink.emit(&AppEvent::Fault {
            source: "pump".into(),
            error,
        });
    }

    fn change_state(&mut self, next: PumpState, sink: &mut impl EventSink) {
        let from = self.state;
        self.state = next;
        if matches!(next, PumpState::Init | PumpState::Idle) {
            self.pump_start_ms = None;
            self.cycle_start_ms = None;
        }
        info!("Pump: {} -> {}", from, next);
        sink.emit(&AppEvent::PumpStateChanged { from, to: next });
    }
}
