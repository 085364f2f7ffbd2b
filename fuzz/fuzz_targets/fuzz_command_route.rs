//! Fuzz target: inbound bus messages
//!
//! Splits arbitrary bytes into a `(topic, payload)` pair, pushes it through
//! the service ingress and runs one tick, asserting that routing never
//! panics and that nothing but routing errors come back.
//!
//! cargo fuzz run fuzz_command_route

#![no_main]

use libfuzzer_sys::fuzz_target;
use valvebox::adapters::sim::SimulatedPlant;
use valvebox::app::ports::{Clock, NullSink};
use valvebox::app::service::ControlService;
use valvebox::config::SystemConfig;
use valvebox::error::Error;

struct Frozen;

impl Clock for Frozen {
    fn now_ms(&self) -> u64 {
        0
    }
}

fuzz_target!(|data: &[u8]| {
    let text = String::from_utf8_lossy(data);
    let text: &str = &text;
    let (topic, payload) = text.split_once(' ').unwrap_or((text, ""));

    let cfg = SystemConfig::default();
    let Ok(mut service) = ControlService::new(&cfg) else {
        return;
    };
    let mut plant = SimulatedPlant::new(&cfg, 1_000);
    service.tick(&mut plant, &Frozen, &mut NullSink);

    match service.ingress().deliver(topic, payload) {
        Ok(()) | Err(Error::UnknownValve(_) | Error::UnknownAction(_)) => {}
        Err(other) => panic!("unexpected routing error: {other:?}"),
    }
    service.tick(&mut plant, &Frozen, &mut NullSink);
});
