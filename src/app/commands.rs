//! Inbound commands to the application service.
//!
//! The message bus delivers `(topic, payload)` pairs on its own execution
//! context.  [`TopicRouter`] turns them into typed [`Inbound`] commands and
//! the transport pushes those through a [`CommandSender`]; the service loop
//! drains the matching [`CommandQueue`] once per tick.
//!
//! Topics, relative to the configured base topic:
//!
//! | Topic                     | Payload          |
//! |---------------------------|------------------|
//! | `{valve}/control`         | `OPEN` / `CLOSE` |
//! | `remote_run_state`        | `ON` / `OFF`     |

use core::fmt;
use core::str::FromStr;
use std::sync::mpsc::{self, Receiver, Sender};

use crate::error::{Error, Result};
use crate::pump::PumpRequest;

/// Topic suffix of the pump run switch.
pub const PUMP_TOPIC: &str = "remote_run_state";
/// Last segment of every valve control topic.
pub const CONTROL_SEGMENT: &str = "control";

// ---------------------------------------------------------------------------
// Command types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValveAction {
    Open,
    Close,
}

impl FromStr for ValveAction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("OPEN") {
            Ok(Self::Open)
        } else if s.eq_ignore_ascii_case("CLOSE") {
            Ok(Self::Close)
        } else {
            Err(Error::UnknownAction(s.to_string()))
        }
    }
}

impl fmt::Display for ValveAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Open => "OPEN",
            Self::Close => "CLOSE",
        })
    }
}

/// One queued request for a named valve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValveCommand {
    pub valve: String,
    pub action: ValveAction,
}

impl ValveCommand {
    pub fn new(valve: impl Into<String>, action: ValveAction) -> Self {
        Self {
            valve: valve.into(),
            action,
        }
    }
}

/// Anything the outside world can ask of the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    Valve(ValveCommand),
    Pump(PumpRequest),
}

fn parse_run_state(payload: &str) -> Result<PumpRequest> {
    let p = payload.trim();
    if p.eq_ignore_ascii_case("ON") {
        Ok(PumpRequest::On)
    } else if p.eq_ignore_ascii_case("OFF") {
        Ok(PumpRequest::Off)
    } else {
        Err(Error::UnknownAction(p.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Topic routing
// ---------------------------------------------------------------------------

/// Maps bus topics under `base_topic` to [`Inbound`] commands.
#[derive(Debug, Clone)]
pub struct TopicRouter {
    base_topic: String,
}

impl TopicRouter {
    pub fn new(base_topic: impl Into<String>) -> Self {
        let mut base_topic = base_topic.into();
        while base_topic.ends_with('/') {
            base_topic.pop();
        }
        Self { base_topic }
    }

    pub fn base_topic(&self) -> &str {
        &self.base_topic
    }

    /// Full topic for a publication suffix.
    pub fn topic(&self, suffix: &str) -> String {
        format!("{}/{}", self.base_topic, suffix)
    }

    /// Topics a transport should subscribe to for these valve names.
    pub fn subscriptions<'a>(
        &'a self,
        valves: impl IntoIterator<Item = &'a str> + 'a,
        pump: bool,
    ) -> impl Iterator<Item = String> + 'a {
        valves
            .into_iter()
            .map(|v| self.topic(&format!("{v}/{CONTROL_SEGMENT}")))
            .chain(pump.then(|| self.topic(PUMP_TOPIC)))
    }

    /// Decode one inbound message.
    ///
    /// A topic outside the command namespace is reported as
    /// [`Error::UnknownValve`]; a payload that is not a known action as
    /// [`Error::UnknownAction`].  Whether the named valve exists is for the
    /// dispatcher to decide.
    pub fn route(&self, topic: &str, payload: &str) -> Result<Inbound> {
        let rest = topic
            .strip_prefix(self.base_topic.as_str())
            .and_then(|r| r.strip_prefix('/'))
            .ok_or_else(|| Error::UnknownValve(topic.to_string()))?;

        if rest == PUMP_TOPIC {
            return parse_run_state(payload).map(Inbound::Pump);
        }

        match rest.split_once('/') {
            Some((valve, CONTROL_SEGMENT)) if !valve.is_empty() => {
                let action = payload.parse()?;
                Ok(Inbound::Valve(ValveCommand::new(valve, action)))
            }
            _ => Err(Error::UnknownValve(topic.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Command queue
// ---------------------------------------------------------------------------

/// Producer handle.  Cheap to clone and safe to move to another thread.
#[derive(Debug)]
pub struct CommandSender<T> {
    tx: Sender<T>,
}

impl<T> Clone for CommandSender<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<T> CommandSender<T> {
    /// Push a command.  Never blocks; only fails once the queue is gone,
    /// in which case the command is handed back.
    pub fn send(&self, command: T) -> core::result::Result<(), T> {
        self.tx.send(command).map_err(|e| e.0)
    }
}

/// Unbounded FIFO, many producers, one consumer (the service loop).
#[derive(Debug)]
pub struct CommandQueue<T> {
    tx: Sender<T>,
    rx: Receiver<T>,
}

impl<T> Default for CommandQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> CommandQueue<T> {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();
        Self { tx, rx }
    }

    pub fn sender(&self) -> CommandSender<T> {
        CommandSender {
            tx: self.tx.clone(),
        }
    }

    /// Push from the consumer side.
    pub fn push(&self, command: T) {
        // The queue owns a sender and its receiver, so the channel is
        // always connected here.
        let _ = self.tx.send(command);
    }

    /// Everything queued right now, in arrival order.  Non-blocking.
    pub fn drain(&self) -> Vec<T> {
        self.rx.try_iter().collect()
    }
}
