mod common;

use common::{MockInstant, TICK_MS, build_task, run_until};
use selftest_core::arbiter::evaluate;
use selftest_core::link::{LinkStatus, LinkStatusSource, SharedLinkStatus};
use selftest_core::sequencer::PhaseTransition;
use selftest_core::sequences::SelfTestPhase;
use selftest_core::task::BenchControl;
use selftest_core::telemetry::TelemetryEventKind;

#[test]
fn arbiter_truth_table() {
    assert!(!evaluate(false, LinkStatus::Connected).is_armed());
    assert!(!evaluate(false, LinkStatus::Disconnected).is_armed());
    assert!(!evaluate(true, LinkStatus::Connected).is_armed());
    assert!(evaluate(true, LinkStatus::Disconnected).is_armed());
}

#[test]
fn disabled_request_keeps_sequencer_idle() {
    let link = SharedLinkStatus::new();
    link.publish(LinkStatus::Disconnected);
    let control = BenchControl::new();
    let mut task = build_task(&link);

    for tick in 0..20 {
        let report = task.tick(&control, MockInstant::millis(tick * TICK_MS));
        assert_eq!(report.phase, SelfTestPhase::Idle);
        assert_eq!(report.transition, None);
    }

    assert!(task.sequencer().actuator().commands.is_empty());
    assert!(!task.status(&control, MockInstant::millis(200)).armed);
}

#[test]
fn armed_request_starts_sweep_on_next_tick() {
    let link = SharedLinkStatus::new();
    link.publish(LinkStatus::Disconnected);
    let control = BenchControl::new();
    let mut task = build_task(&link);

    run_until(&mut task, &control, 0, 50);
    control.set_test_mode(true);

    let report = task.tick(&control, MockInstant::millis(60));
    assert_eq!(report.phase, SelfTestPhase::ActuatorSweep);
    assert_eq!(
        report.transition,
        Some(PhaseTransition {
            from: SelfTestPhase::Idle,
            to: SelfTestPhase::ActuatorSweep,
        })
    );
    assert_eq!(task.sequencer().actuator().commands.len(), 1);
    assert_eq!(
        task.events().latest().map(|record| record.event),
        Some(TelemetryEventKind::PhaseEntered(SelfTestPhase::ActuatorSweep))
    );
}

#[test]
fn link_recovery_preempts_sweep_and_issues_neutral() {
    let link = SharedLinkStatus::new();
    link.publish(LinkStatus::Disconnected);
    let control = BenchControl::new();
    control.set_test_mode(true);
    let mut task = build_task(&link);

    run_until(&mut task, &control, 0, 300);
    assert_eq!(task.sequencer().phase(), SelfTestPhase::ActuatorSweep);
    let neutral_before = task.sequencer().actuator().neutral;
    let commands_before = task.sequencer().actuator().commands.len();

    link.publish(LinkStatus::Connected);
    let report = task.tick(&control, MockInstant::millis(310));

    assert_eq!(report.phase, SelfTestPhase::Idle);
    assert!(report.neutral_issued);
    assert_eq!(task.sequencer().actuator().neutral, neutral_before + 1);

    // Still armed by request, but the link keeps the sweep from driving outputs.
    run_until(&mut task, &control, 320, 2_000);
    assert_eq!(task.sequencer().phase(), SelfTestPhase::Idle);
    assert_eq!(task.sequencer().actuator().neutral, neutral_before + 1);
    assert_eq!(task.sequencer().actuator().commands.len(), commands_before);
}

#[test]
fn unarmed_ticks_do_not_repeat_neutral() {
    let link = SharedLinkStatus::new();
    let control = BenchControl::new();
    control.set_test_mode(true);
    let mut task = build_task(&link);

    // Boot neutral only; the link starts out connected.
    run_until(&mut task, &control, 0, 500);
    assert_eq!(task.sequencer().actuator().neutral, 1);

    link.publish(LinkStatus::Disconnected);
    run_until(&mut task, &control, 510, 600);
    control.set_test_mode(false);
    run_until(&mut task, &control, 610, 1_500);

    assert_eq!(task.sequencer().phase(), SelfTestPhase::Idle);
    assert_eq!(task.sequencer().actuator().neutral, 2);
}

#[test]
fn idle_whenever_latest_decision_is_disarmed() {
    let link = SharedLinkStatus::new();
    let control = BenchControl::new();
    let mut task = build_task(&link);

    // Deterministic mix of request and link toggles.
    for tick in 0u64..400 {
        control.set_test_mode(tick % 7 != 0);
        link.publish(if tick % 53 < 40 {
            LinkStatus::Disconnected
        } else {
            LinkStatus::Connected
        });

        let armed = evaluate(control.test_mode_requested(), link.read());
        let report = task.tick(&control, MockInstant::millis(tick * TICK_MS));

        if !armed.is_armed() {
            assert_eq!(report.phase, SelfTestPhase::Idle, "tick {tick}");
        }
    }
}

#[test]
fn arming_edges_are_logged() {
    let link = SharedLinkStatus::new();
    link.publish(LinkStatus::Disconnected);
    let control = BenchControl::new();
    let mut task = build_task(&link);

    control.set_test_mode(true);
    task.tick(&control, MockInstant::millis(0));
    control.set_test_mode(false);
    task.tick(&control, MockInstant::millis(10));

    let edges: heapless::Vec<bool, 4> = task
        .events()
        .oldest_first()
        .filter_map(|record| match record.event {
            TelemetryEventKind::ArmingChanged(armed) => Some(armed),
            _ => None,
        })
        .collect();
    assert_eq!(edges.as_slice(), &[true, false]);
}
