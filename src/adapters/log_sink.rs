//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing every application event as one
//! pipe-separated line through the `log` facade.  A message bus adapter
//! would implement the same trait and use [`AppEvent::publications`].

use log::{error, info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`AppEvent`] to the console.
#[derive(Debug, Default)]
pub struct LogEventSink {
    emitted: u64,
}

impl LogEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Events handled so far.
    pub fn emitted(&self) -> u64 {
        self.emitted
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        self.emitted += 1;
        match event {
            AppEvent::Started { valves, pump } => {
                info!("START | valves={} | pump={}", valves, pump);
            }
            AppEvent::ValveStateChanged {
                valve,
                from,
                to,
                context,
            } => {
                info!("VALVE | {} {:?} -> {:?} | {}", valve, from, to, context);
            }
            AppEvent::ValvePositionChanged { valve, position } => {
                info!("POS   | {} {}", valve, position);
            }
            AppEvent::PumpStateChanged { from, to } => {
                info!("PUMP  | {} -> {}", from, to);
            }
            AppEvent::PumpMeasurements(m) => {
                info!(
                    "MEAS  | current={:.2}A | pressure={:.1}psi | runtime={:.0}s",
                    m.motor_current_amps, m.water_pressure_psi, m.pump_runtime_secs
                );
            }
            AppEvent::LimitViolated(v) => {
                error!(
                    "LIMIT | {} | shutdown={}",
                    v.message, v.shutdown_on_error
                );
            }
            AppEvent::CommandRejected { target, error } => {
                warn!("REJECT | {} | {}", target, error);
            }
            AppEvent::Fault { source, error } => {
                error!("FAULT | {} | {}", source, error);
            }
        }
    }
}
