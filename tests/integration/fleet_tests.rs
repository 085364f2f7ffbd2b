//! ValveFleetDispatcher: FIFO dispatch and the mid-transition interlock.

use crate::mock_hw::{ManualClock, MockBench, RecordingSink};

use valvebox::app::commands::{ValveAction, ValveCommand};
use valvebox::app::events::AppEvent;
use valvebox::config::SystemConfig;
use valvebox::dispatch::ValveFleetDispatcher;
use valvebox::error::Error;
use valvebox::valve::{ValvePosition, ValveState};

fn setup() -> (ValveFleetDispatcher, MockBench, ManualClock, RecordingSink) {
    let cfg = SystemConfig::default();
    let mut hw = MockBench::new();
    for v in &cfg.valves {
        hw.set_position(v, ValvePosition::Closed);
    }
    let mut fleet = ValveFleetDispatcher::from_config(&cfg.valves);
    let clock = ManualClock::default();
    let mut sink = RecordingSink::new();
    fleet.process(&mut hw, &clock, &mut sink).unwrap();
    (fleet, hw, clock, sink)
}

#[test]
fn interlock_blocks_every_queued_command_without_drive_writes() {
    let (mut fleet, mut hw, clock, mut sink) = setup();
    fleet.enqueue("valve_1", ValveAction::Open);
    fleet.drain_and_apply(&mut sink);
    fleet.process(&mut hw, &clock, &mut sink).unwrap();
    fleet.process(&mut hw, &clock, &mut sink).unwrap();
    assert_eq!(fleet.valve("valve_1").unwrap().state(), ValveState::Opening);

    let writes = hw.writes.len();
    for action in [ValveAction::Close, ValveAction::Open, ValveAction::Close] {
        fleet.enqueue("valve_1", action);
    }
    let out = fleet.drain_and_apply(&mut sink);
    assert_eq!(out.len(), 3);
    assert!(
        out.iter()
            .all(|o| matches!(o.result, Err(Error::InterlockViolation { .. })))
    );
    assert_eq!(hw.writes.len(), writes);
    assert_eq!(
        sink.count(|e| matches!(
            e,
            AppEvent::CommandRejected { error: Error::InterlockViolation { .. }, .. }
        )),
        3
    );
}

#[test]
fn dropped_command_is_not_requeued() {
    let (mut fleet, mut hw, clock, mut sink) = setup();
    fleet.enqueue("valve_2", ValveAction::Open);
    fleet.drain_and_apply(&mut sink);
    fleet.process(&mut hw, &clock, &mut sink).unwrap();

    fleet.enqueue("valve_2", ValveAction::Close);
    assert!(fleet.drain_and_apply(&mut sink)[0].result.is_err());
    assert!(fleet.drain_and_apply(&mut sink).is_empty());
}

#[test]
fn mixed_burst_is_applied_in_arrival_order() {
    let (mut fleet, _hw, _clock, mut sink) = setup();
    let tx = fleet.sender();
    let cmds = [
        ValveCommand::new("valve_2", ValveAction::Close),
        ValveCommand::new("nope", ValveAction::Open),
        ValveCommand::new("valve_1", ValveAction::Open),
    ];
    for c in cmds.clone() {
        tx.send(c).unwrap();
    }
    let out = fleet.drain_and_apply(&mut sink);
    let order: Vec<_> = out.iter().map(|o| o.command.clone()).collect();
    assert_eq!(order, cmds);
    assert!(out[0].result.is_ok());
    assert_eq!(out[1].result, Err(Error::UnknownValve("nope".into())));
    assert!(out[2].result.is_ok());
}

#[test]
fn fleet_completes_moves_and_reports_positions() {
    let (mut fleet, mut hw, clock, mut sink) = setup();
    let cfg = SystemConfig::default();
    fleet.enqueue("valve_1", ValveAction::Open);
    fleet.enqueue("valve_2", ValveAction::Open);
    fleet.drain_and_apply(&mut sink);
    fleet.process(&mut hw, &clock, &mut sink).unwrap();
    fleet.process(&mut hw, &clock, &mut sink).unwrap();
    for v in &cfg.valves {
        hw.set_position(v, ValvePosition::Open);
    }
    fleet.process(&mut hw, &clock, &mut sink).unwrap();
    fleet.process(&mut hw, &clock, &mut sink).unwrap();

    let snaps = fleet.snapshots(0);
    assert!(snaps.iter().all(|s| s.state == ValveState::Idle));
    assert!(snaps.iter().all(|s| s.position == Some(ValvePosition::Open)));
    assert_eq!(
        sink.count(|e| matches!(
            e,
            AppEvent::ValvePositionChanged { position: ValvePosition::Open, .. }
        )),
        2
    );
}
