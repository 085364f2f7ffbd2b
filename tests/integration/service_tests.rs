//! End-to-end: bus messages in, events and publications out, running the
//! service against the simulated plant.

use crate::mock_hw::{ManualClock, RecordingSink};

use valvebox::adapters::sim::SimulatedPlant;
use valvebox::app::events::{AppEvent, Payload};
use valvebox::app::service::ControlService;
use valvebox::config::SystemConfig;
use valvebox::error::Error;
use valvebox::pump::PumpState;
use valvebox::valve::{ValvePosition, ValveState};

struct Rig {
    svc: ControlService,
    plant: SimulatedPlant,
    clock: ManualClock,
    sink: RecordingSink,
}

impl Rig {
    fn new() -> Self {
        let cfg = SystemConfig::default();
        Self {
            svc: ControlService::new(&cfg).unwrap(),
            plant: SimulatedPlant::new(&cfg, 1_000),
            clock: ManualClock::default(),
            sink: RecordingSink::new(),
        }
    }

    fn run(&mut self, ticks: usize) {
        for _ in 0..ticks {
            self.svc.tick(&mut self.plant, &self.clock, &mut self.sink);
            self.plant.step(100);
            self.clock.advance_ms(100);
        }
    }

    fn pump_state(&self) -> PumpState {
        self.svc.pump().unwrap().state()
    }
}

#[test]
fn valve_opens_from_a_message_on_another_thread() {
    let mut rig = Rig::new();
    rig.run(1);

    let ingress = rig.svc.ingress();
    std::thread::spawn(move || {
        ingress
            .deliver("/RainBarrelPump/valve_1/control", "OPEN")
            .unwrap();
    })
    .join()
    .unwrap();

    rig.run(20);
    let v = rig.svc.fleet().valve("valve_1").unwrap();
    assert_eq!(v.state(), ValveState::Idle);
    assert_eq!(v.last_position(), Some(ValvePosition::Open));
    assert_eq!(rig.plant.valve_travel("valve_1"), Some(1.0));

    let published: Vec<_> = rig
        .sink
        .events
        .iter()
        .flat_map(|e| e.publications())
        .filter(|p| p.topic_suffix == "valve_1/state")
        .map(|p| p.payload)
        .collect();
    assert_eq!(
        published,
        ["IDLE", "START OPENING", "OPENING", "OPEN", "IDLE"].map(|s| Payload::Text(s.into()))
    );
}

#[test]
fn routing_errors_are_returned_to_the_transport() {
    let rig = Rig::new();
    let ingress = rig.svc.ingress();
    assert_eq!(
        ingress.deliver("/RainBarrelPump/valve_1/control", "SIDEWAYS"),
        Err(Error::UnknownAction("SIDEWAYS".into()))
    );
    assert!(matches!(
        ingress.deliver("/elsewhere", "OPEN"),
        Err(Error::UnknownValve(_))
    ));
}

#[test]
fn unknown_valve_name_is_rejected_by_the_core() {
    let mut rig = Rig::new();
    rig.svc
        .ingress()
        .deliver("/RainBarrelPump/valve_7/control", "CLOSE")
        .unwrap();
    rig.run(1);
    assert!(rig.sink.events.iter().any(|e| matches!(
        e,
        AppEvent::CommandRejected { error: Error::UnknownValve(name), .. } if name == "valve_7"
    )));
}

#[test]
fn pump_runs_and_trips_on_simulated_overload() {
    let mut rig = Rig::new();
    rig.run(20);
    assert_eq!(rig.pump_state(), PumpState::Idle);

    rig.svc
        .ingress()
        .deliver("/RainBarrelPump/remote_run_state", "on")
        .unwrap();
    rig.run(20);
    assert_eq!(rig.pump_state(), PumpState::Pumping);
    assert!(rig.plant.motor_energized());

    rig.plant.set_motor_load(20.0, 40.0);
    rig.run(1);
    assert_eq!(rig.pump_state(), PumpState::Stopping);
    assert!(!rig.plant.motor_energized());

    rig.run(20);
    assert_eq!(rig.pump_state(), PumpState::Idle);
    assert_eq!(rig.plant.valve_travel("pump_valve"), Some(0.0));
}

#[test]
fn stuck_valve_times_out_and_reports() {
    let mut rig = Rig::new();
    rig.run(1);
    rig.plant.set_stuck("valve_2", true);
    rig.svc
        .ingress()
        .deliver("/RainBarrelPump/valve_2/control", "OPEN")
        .unwrap();
    rig.run(205);

    let v = rig.svc.fleet().valve("valve_2").unwrap();
    assert!(v.is_timed_out());
    let errors: Vec<_> = rig
        .sink
        .events
        .iter()
        .filter(|e| matches!(e, AppEvent::Fault { source, .. } if source == "valve_2"))
        .flat_map(AppEvent::publications)
        .collect();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].topic_suffix, "error_message");
}
