//! Pump box scenarios: ControlService → PumpOrchestrator → valve, contactor
//! and limits, all against the mock bench.

use crate::mock_hw::{ManualClock, MockBench, RecordingSink};

use valvebox::app::events::{AppEvent, ERROR_TOPIC};
use valvebox::app::service::ControlService;
use valvebox::config::{LimitConfig, PumpConfig, SystemConfig};
use valvebox::error::Error;
use valvebox::pump::PumpState;
use valvebox::pump::limits::Threshold;
use valvebox::valve::ValvePosition;

const CONTACTOR: u8 = 10;

struct PumpBox {
    svc: ControlService,
    hw: MockBench,
    clock: ManualClock,
    sink: RecordingSink,
    pump_cfg: PumpConfig,
}

impl PumpBox {
    fn new() -> Self {
        Self::with_config(SystemConfig::default())
    }

    fn with_config(cfg: SystemConfig) -> Self {
        let mut hw = MockBench::new();
        for v in cfg.all_valves() {
            hw.set_position(v, ValvePosition::Closed);
        }
        hw.set_milliamps(0, 1.0); // 4.25 A
        hw.set_milliamps(1, 2.0); // 36.5 psi
        let svc = ControlService::new(&cfg).unwrap();
        let mut sink = RecordingSink::new();
        svc.start(&mut sink);
        Self {
            svc,
            hw,
            clock: ManualClock::default(),
            sink,
            pump_cfg: cfg.pump.unwrap(),
        }
    }

    fn state(&self) -> PumpState {
        self.svc.pump().unwrap().state()
    }

    fn tick(&mut self) {
        self.clock.advance_ms(100);
        self.svc.tick(&mut self.hw, &self.clock, &mut self.sink);
        assert_eq!(
            self.hw.enabled(CONTACTOR),
            self.state() == PumpState::Pumping,
            "motor must be energised exactly while pumping"
        );
    }

    fn run_until(&mut self, target: PumpState, max_ticks: usize) {
        for _ in 0..max_ticks {
            if self.state() == target {
                return;
            }
            self.tick();
        }
        assert_eq!(self.state(), target);
    }

    fn send(&self, payload: &str) {
        self.svc
            .ingress()
            .deliver("/RainBarrelPump/remote_run_state", payload)
            .unwrap();
    }

    fn set_pump_valve(&mut self, position: ValvePosition) {
        let valve = self.pump_cfg.valve.clone();
        self.hw.set_position(&valve, position);
    }

    /// Idle → Pumping with the valve confirming open.
    fn start_pumping(&mut self) {
        // Let the Init close request finish first.
        for _ in 0..6 {
            self.tick();
        }
        assert_eq!(self.state(), PumpState::Idle);
        self.send("ON");
        self.run_until(PumpState::OpeningValve, 3);
        self.set_pump_valve(ValvePosition::Open);
        self.run_until(PumpState::Pumping, 5);
    }
}

#[test]
fn on_then_off_runs_the_full_cycle() {
    let mut b = PumpBox::new();
    b.start_pumping();
    assert!(b.svc.pump().unwrap().pump_start_ms().is_some());

    b.send("OFF");
    b.tick();
    assert_eq!(b.state(), PumpState::Stopping);
    b.set_pump_valve(ValvePosition::Closed);
    b.run_until(PumpState::Idle, 8);

    assert_eq!(
        b.sink.pump_states(),
        [
            PumpState::Idle,
            PumpState::Starting,
            PumpState::OpeningValve,
            PumpState::Pumping,
            PumpState::Stopping,
            PumpState::Stopped,
            PumpState::Idle
        ]
    );
    assert!(b.svc.pump().unwrap().pump_start_ms().is_none());
}

#[test]
fn over_current_stops_within_one_tick() {
    let mut b = PumpBox::new();
    b.start_pumping();

    b.hw.set_milliamps(0, 3.0); // 12.75 A
    b.tick();
    assert_eq!(b.state(), PumpState::Stopping);
    assert!(!b.hw.enabled(CONTACTOR));

    let violation = b
        .sink
        .events
        .iter()
        .find_map(|e| match e {
            AppEvent::LimitViolated(v) => Some(v.clone()),
            _ => None,
        })
        .unwrap();
    assert_eq!(violation.name, "max_motor_current");
    assert!(violation.shutdown_on_error);
    let publications = AppEvent::LimitViolated(violation).publications();
    assert_eq!(publications[0].topic_suffix, ERROR_TOPIC);
}

#[test]
fn valve_that_never_opens_sends_pump_back_to_init() {
    let mut b = PumpBox::new();
    for _ in 0..6 {
        b.tick();
    }
    b.send("ON");
    b.run_until(PumpState::OpeningValve, 3);
    b.set_pump_valve(ValvePosition::Unknown);

    b.run_until(PumpState::Init, 220);
    assert!(b.sink.events.iter().any(|e| matches!(
        e,
        AppEvent::Fault { source, error: Error::TransitionTimeout { .. } } if source == "pump"
    )));

    // Recovery: back to Idle and the valve is commanded closed again.
    b.set_pump_valve(ValvePosition::Closed);
    b.run_until(PumpState::Idle, 2);
    for _ in 0..6 {
        b.tick();
    }
    let valve = b.svc.pump().unwrap().valve();
    assert!(valve.is_idle());
    assert!(!valve.is_timed_out());
}

#[test]
fn analog_failure_holds_pumping() {
    let mut b = PumpBox::new();
    b.start_pumping();
    b.hw.fail_analog = true;
    for _ in 0..5 {
        b.tick();
    }
    assert_eq!(b.state(), PumpState::Pumping);
    assert!(b.sink.events.iter().any(|e| matches!(
        e,
        AppEvent::Fault { source, error: Error::Io(_) } if source == "pump_monitor"
    )));
}

#[test]
fn dead_analog_inputs_do_not_disable_runtime_limit() {
    let mut b = PumpBox::new();
    b.start_pumping();
    b.hw.fail_analog = true;
    b.tick();
    assert_eq!(b.state(), PumpState::Pumping);

    // Well past the 1200 s runtime limit with no sample arriving.
    b.clock.advance_ms(3_600_000);
    b.tick();
    assert_eq!(b.state(), PumpState::Stopping);
    assert!(!b.hw.enabled(CONTACTOR));
    assert!(b.sink.events.iter().any(|e| matches!(
        e,
        AppEvent::LimitViolated(v) if v.name == "max_motor_runtime" && v.shutdown_on_error
    )));
    assert!(
        !b.sink
            .events
            .iter()
            .any(|e| matches!(e, AppEvent::LimitViolated(v) if v.name == "max_motor_current"))
    );
}

#[test]
fn advisory_limit_is_reported_but_keeps_pumping() {
    let mut cfg = SystemConfig::default();
    cfg.pump.as_mut().unwrap().limits.push(LimitConfig {
        name: "min_water_pressure".into(),
        measurement: "water_pressure_psi".into(),
        threshold: Threshold::Below(100.0),
        shutdown_on_error: false,
    });
    let mut b = PumpBox::with_config(cfg);
    b.start_pumping();
    for _ in 0..4 {
        b.tick();
    }

    assert_eq!(b.state(), PumpState::Pumping);
    assert!(b.hw.enabled(CONTACTOR));
    let advisories = b.sink.count(|e| {
        matches!(
            e,
            AppEvent::LimitViolated(v) if v.name == "min_water_pressure" && !v.shutdown_on_error
        )
    });
    assert!(advisories >= 4, "reported {advisories} times");
}

#[test]
fn contactor_write_failure_is_retried() {
    let mut b = PumpBox::new();
    b.start_pumping();
    b.send("OFF");
    b.hw.fail_writes = true;
    b.clock.advance_ms(100);
    b.svc.tick(&mut b.hw, &b.clock, &mut b.sink);
    assert_eq!(b.state(), PumpState::Pumping);

    b.hw.fail_writes = false;
    b.tick();
    assert_eq!(b.state(), PumpState::Stopping);
}

#[test]
fn measurements_carry_motor_runtime() {
    let mut b = PumpBox::new();
    b.start_pumping();
    for _ in 0..60 {
        b.tick();
    }
    let runtime = b
        .sink
        .events
        .iter()
        .rev()
        .find_map(|e| match e {
            AppEvent::PumpMeasurements(m) => Some(m.pump_runtime_secs),
            _ => None,
        })
        .unwrap();
    assert!(runtime > 0.0);
}
