//! Valve fleet dispatcher.
//!
//! Owns every independently commanded [`ValveActuator`] and the FIFO queue
//! that external transports feed.  Commands are applied in arrival order
//! at the start of each tick; a command for a valve that is mid-transition
//! is dropped and reported, never re-queued.

use log::{error, info, warn};

use crate::app::commands::{CommandQueue, CommandSender, ValveAction, ValveCommand};
use crate::app::events::AppEvent;
use crate::app::ports::{Clock, DigitalIoPort, EventSink};
use crate::config::ValveConfig;
use crate::error::{Error, Result};
use crate::valve::{ValveActuator, ValveStatus};

/// Result of applying one queued command.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandOutcome {
    pub command: ValveCommand,
    pub result: Result<()>,
}

pub struct ValveFleetDispatcher {
    valves: Vec<ValveActuator>,
    queue: CommandQueue<ValveCommand>,
}

impl ValveFleetDispatcher {
    pub fn new(valves: Vec<ValveActuator>) -> Self {
        Self {
            valves,
            queue: CommandQueue::new(),
        }
    }

    pub fn from_config(configs: &[ValveConfig]) -> Self {
        Self::new(configs.iter().map(ValveActuator::from_config).collect())
    }

    // ── Ingress ───────────────────────────────────────────────

    /// Queue a command.  Always succeeds.
    pub fn enqueue(&self, valve: impl Into<String>, action: ValveAction) {
        self.queue.push(ValveCommand::new(valve, action));
    }

    /// Producer handle for transports running on other threads.
    pub fn sender(&self) -> CommandSender<ValveCommand> {
        self.queue.sender()
    }

    /// Apply every queued command in FIFO order.
    ///
    /// Rejections (unknown valve, interlock, refused request) are logged
    /// and emitted as [`AppEvent::CommandRejected`].
    pub fn drain_and_apply(&mut self, sink: &mut impl EventSink) -> Vec<CommandOutcome> {
        self.queue
            .drain()
            .into_iter()
            .map(|command| {
                let result = self.apply(&command);
                if let Err(e) = &result {
                    warn!("Command {} {} rejected: {}", command.valve, command.action, e);
                    sink.emit(&AppEvent::CommandRejected {
                        target: command.valve.clone(),
                        error: e.clone(),
                    });
                } else {
                    info!("Command {} {} accepted", command.valve, command.action);
                }
                CommandOutcome { command, result }
            })
            .collect()
    }

    fn apply(&mut self, command: &ValveCommand) -> Result<()> {
        let valve = self
            .valves
            .iter_mut()
            .find(|v| v.name() == command.valve)
            .ok_or_else(|| Error::UnknownValve(command.valve.clone()))?;

        if valve.is_in_transition() {
            return Err(Error::InterlockViolation {
                valve: command.valve.clone(),
                state: valve.state(),
            });
        }

        match command.action {
            ValveAction::Open => valve.request_open(),
            ValveAction::Close => valve.request_close(),
        }
    }

    // ── Per-tick processing ───────────────────────────────────

    /// Advance every valve one step.  Each failure is logged and emitted
    /// as a fault; the first one is returned after all valves ran.
    pub fn process(
        &mut self,
        io: &mut impl DigitalIoPort,
        clock: &impl Clock,
        sink: &mut impl EventSink,
    ) -> Result<()> {
        let mut first = Ok(());
        for valve in &mut self.valves {
            if let Err(e) = valve.process(io, clock, sink) {
                error!("{}: {}", valve.name(), e);
                sink.emit(&AppEvent::Fault {
                    source: valve.name().to_string(),
                    error: e.clone(),
                });
                if first.is_ok() {
                    first = Err(e);
                }
            }
        }
        first
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn valve(&self, name: &str) -> Option<&ValveActuator> {
        self.valves.iter().find(|v| v.name() == name)
    }

    pub fn valves(&self) -> &[ValveActuator] {
        &self.valves
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.valves.iter().map(ValveActuator::name)
    }

    pub fn snapshots(&self, now_ms: u64) -> Vec<ValveStatus> {
        self.valves.iter().map(|v| v.snapshot(now_ms)).collect()
    }
}
