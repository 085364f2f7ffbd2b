//! Ball valve actuator state machine.
//!
//! One [`ValveActuator`] per physical valve.  It owns the pin bindings,
//! the single-slot transition request and the deadline for the current
//! move.  The service loop calls [`ValveActuator::process`] once per tick.
//!
//! ```text
//!  INIT ──▶ IDLE ──[open]──▶ START_OPENING ──▶ OPENING ──[sensed]──▶ OPEN ──┐
//!   ▲        ▲ │                                 │                         │
//!   │        │ └─[close]─▶ START_CLOSING ─▶ CLOSING ─[sensed]─▶ CLOSED ─┐  │
//!   │        └──────────────────────────────────────────────────────────┴──┘
//!   └────────────[deadline elapsed, TimedOut latched]── OPENING / CLOSING
//! ```
//!
//! Pin I/O happens only through [`DigitalIoPort`].  An I/O failure leaves
//! the state untouched, so the next tick retries the same step.

pub mod state;
pub mod timer;

use log::{debug, error, info};
use serde::Serialize;

use crate::app::events::AppEvent;
use crate::app::ports::{Clock, DigitalIoPort, EventSink};
use crate::config::ValveConfig;
use crate::error::{Error, Result};

pub use state::{DriveState, SensePolarity, TransitionRequest, ValvePins, ValvePosition, ValveState};
pub use timer::TransitionTimer;

/// Point-in-time view of an actuator, for status queries.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValveStatus {
    pub name: String,
    pub state: ValveState,
    pub position: Option<ValvePosition>,
    pub timed_out: bool,
    /// Time left on the armed deadline; zero when not moving.
    pub remaining_ms: u64,
}

pub struct ValveActuator {
    name: String,
    pins: ValvePins,
    polarity: SensePolarity,
    timeout_ms: u64,
    state: ValveState,
    request: TransitionRequest,
    /// Armed only while Opening or Closing.
    timer: Option<TransitionTimer>,
    timed_out: bool,
    /// Last position reported, for edge-triggered notification.
    last_position: Option<ValvePosition>,
}

impl ValveActuator {
    pub fn new(
        name: impl Into<String>,
        pins: ValvePins,
        polarity: SensePolarity,
        transition_timeout_secs: u32,
    ) -> Self {
        Self {
            name: name.into(),
            pins,
            polarity,
            timeout_ms: u64::from(transition_timeout_secs) * 1000,
            state: ValveState::Init,
            request: TransitionRequest::None,
            timer: None,
            timed_out: false,
            last_position: None,
        }
    }

    pub fn from_config(cfg: &ValveConfig) -> Self {
        Self::new(
            cfg.name.clone(),
            cfg.pins(),
            cfg.sense_polarity,
            cfg.transition_timeout_secs,
        )
    }

    // ── Requests ──────────────────────────────────────────────

    /// Ask the valve to open.  Only accepted in Idle.
    pub fn request_open(&mut self) -> Result<()> {
        self.request(TransitionRequest::Open)
    }

    /// Ask the valve to close.  Only accepted in Idle.
    pub fn request_close(&mut self) -> Result<()> {
        self.request(TransitionRequest::Close)
    }

    fn request(&mut self, request: TransitionRequest) -> Result<()> {
        if self.state != ValveState::Idle {
            return Err(Error::InvalidStateForRequest { state: self.state });
        }
        if self.request != TransitionRequest::None && self.request != request {
            debug!(
                "{}: pending {:?} request replaced by {:?}",
                self.name, self.request, request
            );
        }
        self.request = request;
        Ok(())
    }

    // ── Per-tick processing ───────────────────────────────────

    /// Advance the state machine by one step.
    ///
    /// Returns [`Error::TransitionTimeout`] on the tick a deadline is
    /// detected (the actuator is then already back in Init), and
    /// [`Error::Io`] when a pin access failed (state unchanged).
    pub fn process(
        &mut self,
        io: &mut impl DigitalIoPort,
        clock: &impl Clock,
        sink: &mut impl EventSink,
    ) -> Result<()> {
        match self.state {
            ValveState::Init => {
                self.timer = None;
                self.change_state(ValveState::Idle, "Initialization complete.".into(), sink);
            }
            ValveState::Idle => match core::mem::take(&mut self.request) {
                TransitionRequest::Open => {
                    self.timed_out = false;
                    self.change_state(ValveState::StartOpening, "Start opening.".into(), sink);
                }
                TransitionRequest::Close => {
                    self.timed_out = false;
                    self.change_state(ValveState::StartClosing, "Start closing.".into(), sink);
                }
                TransitionRequest::None => {}
            },
            ValveState::StartOpening => {
                self.begin_move(io, clock, DriveState::Open, ValveState::Opening, sink)?;
            }
            ValveState::Opening => {
                self.await_end_position(io, clock, ValvePosition::Open, ValveState::Open, sink)?;
            }
            ValveState::Open => {
                self.set_drive(io, DriveState::None)?;
                self.change_state(ValveState::Idle, "Valve open.".into(), sink);
            }
            ValveState::StartClosing => {
                self.begin_move(io, clock, DriveState::Close, ValveState::Closing, sink)?;
            }
            ValveState::Closing => {
                self.await_end_position(io, clock, ValvePosition::Closed, ValveState::Closed, sink)?;
            }
            ValveState::Closed => {
                self.set_drive(io, DriveState::None)?;
                self.change_state(ValveState::Idle, "Valve closed.".into(), sink);
            }
        }
        Ok(())
    }

    /// Read both limit switches and decode the end position.
    ///
    /// Notification is edge-triggered: a `ValvePositionChanged` event is
    /// emitted only when the decoded position differs from the previous
    /// successful read.
    pub fn position(
        &mut self,
        io: &mut impl DigitalIoPort,
        sink: &mut impl EventSink,
    ) -> Result<ValvePosition> {
        let (open_level, close_level) =
            io.read_position(self.pins.open_sense, self.pins.close_sense)?;
        let position = ValvePosition::from_asserted(
            self.polarity.asserted(open_level),
            self.polarity.asserted(close_level),
        );
        if self.last_position != Some(position) {
            self.last_position = Some(position);
            info!("{}: position {}", self.name, position);
            sink.emit(&AppEvent::ValvePositionChanged {
                valve: self.name.clone(),
                position,
            });
        }
        Ok(position)
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> ValveState {
        self.state
    }

    pub fn pending_request(&self) -> TransitionRequest {
        self.request
    }

    pub fn is_open(&self) -> bool {
        self.state == ValveState::Open
    }

    pub fn is_closed(&self) -> bool {
        self.state == ValveState::Closed
    }

    pub fn is_idle(&self) -> bool {
        self.state == ValveState::Idle
    }

    pub fn is_timed_out(&self) -> bool {
        self.timed_out
    }

    pub fn is_in_transition(&self) -> bool {
        self.state.is_transition()
    }

    pub fn has_timer(&self) -> bool {
        self.timer.is_some()
    }

    pub fn last_position(&self) -> Option<ValvePosition> {
        self.last_position
    }

    pub fn snapshot(&self, now_ms: u64) -> ValveStatus {
        ValveStatus {
            name: self.name.clone(),
            state: self.state,
            position: self.last_position,
            timed_out: self.timed_out,
            remaining_ms: self.timer.map_or(0, |t| t.remaining_ms(now_ms)),
        }
    }

    // ── Internal ──────────────────────────────────────────────

    fn begin_move(
        &mut self,
        io: &mut impl DigitalIoPort,
        clock: &impl Clock,
        drive: DriveState,
        next: ValveState,
        sink: &mut impl EventSink,
    ) -> Result<()> {
        self.set_drive(io, drive)?;
        self.timer = Some(TransitionTimer::start(clock.now_ms(), self.timeout_ms));
        let verb = if drive == DriveState::Open {
            "opening"
        } else {
            "closing"
        };
        self.change_state(
            next,
            format!("Valve {verb}, timeout: {} seconds", self.timeout_ms / 1000),
            sink,
        );
        Ok(())
    }

    fn await_end_position(
        &mut self,
        io: &mut impl DigitalIoPort,
        clock: &impl Clock,
        target: ValvePosition,
        reached: ValveState,
        sink: &mut impl EventSink,
    ) -> Result<()> {
        if self.position(io, sink)? == target {
            self.timer = None;
            self.timed_out = false;
            self.change_state(reached, format!("Valve reached {target}."), sink);
            return Ok(());
        }

        // A missing timer here would be a bug; treat it as expired so the
        // drive cannot run unbounded.
        let expired = self
            .timer
            .is_none_or(|t| t.has_timed_out(clock.now_ms()));
        if !expired {
            return Ok(());
        }

        self.set_drive(io, DriveState::None)?;
        let moving = self.state;
        self.timer = None;
        self.timed_out = true;
        error!(
            "{}: {} timed out after {} s, returning to Init",
            self.name,
            moving,
            self.timeout_ms / 1000
        );
        self.change_state(
            ValveState::Init,
            format!("{moving} timeout. Returning to INIT state."),
            sink,
        );
        Err(Error::TransitionTimeout {
            valve: self.name.clone(),
            state: moving,
        })
    }

    fn set_drive(&mut self, io: &mut impl DigitalIoPort, drive: DriveState) -> Result<()> {
        let (direction, enable) = drive.levels();
        io.write_drive(self.pins.direction, self.pins.enable, direction, enable)?;
        Ok(())
    }

    fn change_state(&mut self, next: ValveState, context: String, sink: &mut impl EventSink) {
        let from = self.state;
        self.state = next;
        info!("{}: {} -> {} ({})", self.name, from, next, context);
        sink.emit(&AppEvent::ValveStateChanged {
            valve: self.name.clone(),
            from,
            to: next,
            context,
        });
    }
}
