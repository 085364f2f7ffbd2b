//! Application service — the hexagonal core.
//!
//! [`ControlService`] owns the valve fleet, the optional pump orchestrator
//! and its sampler.  All I/O flows through port traits injected at call
//! sites, so the whole service runs against mock adapters in tests.
//!
//! ```text
//!  Ingress ──▶ CommandQueue ──▶ ┌──────────────────────────┐ ──▶ EventSink
//!                               │      ControlService       │
//!  DigitalIoPort / AnalogPort ◀─│ Fleet · Pump · Limits     │
//!                               └──────────────────────────┘
//! ```
//!
//! One [`tick`](ControlService::tick) is: drain commands → process valves
//! → sample analog channels → orchestrate the pump → publish measurements.

use log::{debug, info, warn};

use crate::config::SystemConfig;
use crate::dispatch::ValveFleetDispatcher;
use crate::error::{Error, Result};
use crate::pump::{PumpOrchestrator, PumpRequest};
use crate::sensors::PumpMonitor;
use crate::valve::ValveStatus;

use super::commands::{
    CommandQueue, CommandSender, Inbound, PUMP_TOPIC, TopicRouter, ValveCommand,
};
use super::events::AppEvent;
use super::ports::{AnalogPort, Clock, DigitalIoPort, EventSink};

// ───────────────────────────────────────────────────────────────
// Ingress handle
// ───────────────────────────────────────────────────────────────

/// Transport-side handle: routes raw bus messages into the service's
/// queues.  `Clone + Send`, meant to live in a bus callback thread.
#[derive(Debug, Clone)]
pub struct Ingress {
    router: TopicRouter,
    valves: CommandSender<ValveCommand>,
    pump: Option<CommandSender<PumpRequest>>,
}

impl Ingress {
    /// Route and queue one message.  Routing errors are returned so the
    /// transport can report them; they never reach the core.
    pub fn deliver(&self, topic: &str, payload: &str) -> Result<()> {
        let queued = match self.router.route(topic, payload)? {
            Inbound::Valve(cmd) => self.valves.send(cmd).is_ok(),
            Inbound::Pump(req) => match &self.pump {
                Some(tx) => tx.send(req).is_ok(),
                None => return Err(Error::UnknownValve(topic.to_string())),
            },
        };
        if !queued {
            warn!("Service gone, dropped message on {}", topic);
        }
        Ok(())
    }

    pub fn router(&self) -> &TopicRouter {
        &self.router
    }
}

// ───────────────────────────────────────────────────────────────
// ControlService
// ───────────────────────────────────────────────────────────────

struct PumpUnit {
    orchestrator: PumpOrchestrator,
    monitor: PumpMonitor,
    requests: CommandQueue<PumpRequest>,
}

pub struct ControlService {
    router: TopicRouter,
    fleet: ValveFleetDispatcher,
    pump: Option<PumpUnit>,
    tick_count: u64,
}

impl ControlService {
    /// Build every actuator from a validated configuration.
    pub fn new(config: &SystemConfig) -> Result<Self> {
        config.validate()?;
        let pump = config
            .pump
            .as_ref()
            .map(|cfg| -> Result<PumpUnit> {
                Ok(PumpUnit {
                    orchestrator: PumpOrchestrator::from_config(cfg)?,
                    monitor: PumpMonitor::from_config(cfg),
                    requests: CommandQueue::new(),
                })
            })
            .transpose()?;

        Ok(Self {
            router: TopicRouter::new(config.base_topic.clone()),
            fleet: ValveFleetDispatcher::from_config(&config.valves),
            pump,
            tick_count: 0,
        })
    }

    // ── Lifecycle ─────────────────────────────────────────────

    pub fn start(&self, sink: &mut impl EventSink) {
        let valves = self.fleet.valves().len();
        let pump = self.pump.is_some();
        info!("ControlService started: {} valve(s), pump: {}", valves, pump);
        sink.emit(&AppEvent::Started { valves, pump });
    }

    pub fn ingress(&self) -> Ingress {
        Ingress {
            router: self.router.clone(),
            valves: self.fleet.sender(),
            pump: self.pump.as_ref().map(|p| p.requests.sender()),
        }
    }

    /// Bus topics a transport should subscribe to.
    pub fn subscriptions(&self) -> Vec<String> {
        self.router
            .subscriptions(self.fleet.names(), self.pump.is_some())
            .collect()
    }

    // ── Per-tick orchestration ────────────────────────────────

    /// Run one full control cycle.
    ///
    /// The `hw` parameter satisfies **both** [`DigitalIoPort`] and
    /// [`AnalogPort`], which avoids a double mutable borrow while keeping
    /// the port boundary explicit.  Nothing here aborts the loop: every
    /// failure is logged and emitted, and the next tick carries on.
    pub fn tick(
        &mut self,
        hw: &mut (impl DigitalIoPort + AnalogPort),
        clock: &impl Clock,
        sink: &mut impl EventSink,
    ) {
        self.tick_count += 1;

        // 1. Commands, FIFO
        self.fleet.drain_and_apply(sink);
        if let Some(unit) = &mut self.pump {
            for req in unit.requests.drain() {
                unit.orchestrator.request(req);
            }
        }

        // 2. Valve fleet (faults already emitted by the dispatcher)
        if let Err(e) = self.fleet.process(hw, clock, sink) {
            debug!("Fleet tick {}: {}", self.tick_count, e);
        }

        // 3-5. Pump box
        if let Some(unit) = &mut self.pump {
            let readings = match unit.monitor.sample(hw) {
                Ok(m) => Some(m),
                Err(e) => {
                    sink.emit(&AppEvent::Fault {
                        source: "pump_monitor".into(),
                        error: e,
                    });
                    None
                }
            };

            if let Err(e) = unit.orchestrator.tick(hw, clock, readings, sink) {
                warn!("Pump tick {}: {}", self.tick_count, e);
                sink.emit(&AppEvent::Fault {
                    source: "pump".into(),
                    error: e,
                });
            }

            let now = clock.now_ms();
            if let Some(mut m) = readings {
                if unit.monitor.publish_due(now) {
                    m.pump_runtime_secs = unit.orchestrator.pump_runtime_secs(now);
                    sink.emit(&AppEvent::PumpMeasurements(m));
                }
            }
        }
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn fleet(&self) -> &ValveFleetDispatcher {
        &self.fleet
    }

    pub fn pump(&self) -> Option<&PumpOrchestrator> {
        self.pump.as_ref().map(|p| &p.orchestrator)
    }

    pub fn router(&self) -> &TopicRouter {
        &self.router
    }

    /// Every valve, pump valve last.
    pub fn valve_status(&self, now_ms: u64) -> Vec<ValveStatus> {
        let mut all = self.fleet.snapshots(now_ms);
        if let Some(unit) = &self.pump {
            all.push(unit.orchestrator.valve().snapshot(now_ms));
        }
        all
    }

    /// Total control ticks executed since startup.
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// Topic the pump listens on, if there is a pump.
    pub fn pump_topic(&self) -> Option<String> {
        self.pump.as_ref().map(|_| self.router.topic(PUMP_TOPIC))
    }
}
