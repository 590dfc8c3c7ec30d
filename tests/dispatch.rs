//! End-to-end dispatch scenarios: hierarchy, orthogonal regions, history,
//! completion transitions, do-actions, reentrancy and failing actions.

use statechart::core::ActionKind;
use statechart::effects::DispatchError;
use statechart::{MachineOptions, StateBuilder, StateMachine, StateMachineTemplate, TransitionBuilder};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Clone, Copy, Debug, PartialEq)]
enum Ev {
    Start,
    Stop,
    Next,
    Other,
    Go,
}

type Log = Arc<Mutex<Vec<String>>>;

fn logged(log: &Log, name: &str) -> StateBuilder<Ev, u32> {
    let (enter, exit) = (Arc::clone(log), Arc::clone(log));
    let (en, ex) = (format!("En{name}"), format!("Ex{name}"));
    StateBuilder::new(name)
        .on_entry(move |_m, _e, _a| {
            enter.lock().unwrap().push(en.clone());
            Ok(())
        })
        .on_exit(move |_m, _e, _a| {
            exit.lock().unwrap().push(ex.clone());
            Ok(())
        })
}

fn take(log: &Log) -> Vec<String> {
    std::mem::take(&mut *log.lock().unwrap())
}

/// Root {Idle, Work{[A1, A2] | [B1, B2]}, Done}
///
/// - Fork: Idle --Start--> A2 + B2
/// - Join: A2 + B2 --Stop--> Done
/// - Next toggles A1/A2 inside the first region
fn orthogonal(log: &Log) -> StateMachine<Ev, u32> {
    let mut t = StateMachineTemplate::new();
    t.region("Idle", false).unwrap();
    t.state(logged(log, "Idle")).unwrap();
    t.end_state().unwrap();
    t.state(logged(log, "Work")).unwrap();
    t.region("A1", false).unwrap();
    t.state(logged(log, "A1")).unwrap();
    t.end_state().unwrap();
    t.state(logged(log, "A2")).unwrap();
    t.end_state().unwrap();
    t.transition(TransitionBuilder::new("AForward").from("A1").to("A2").on(Ev::Next))
        .unwrap();
    t.end_region().unwrap();
    t.region("B1", false).unwrap();
    t.state(logged(log, "B1")).unwrap();
    t.end_state().unwrap();
    t.state(logged(log, "B2")).unwrap();
    t.end_state().unwrap();
    t.end_region().unwrap();
    t.end_state().unwrap();
    t.state(logged(log, "Done")).unwrap();
    t.end_state().unwrap();
    t.transition(
        TransitionBuilder::new("Fork")
            .from("Idle")
            .to("A2")
            .to("B2")
            .on(Ev::Start),
    )
    .unwrap();
    t.transition(
        TransitionBuilder::new("Join")
            .from("A2")
            .from("B2")
            .to("Done")
            .on(Ev::Stop),
    )
    .unwrap();
    t.transition(TransitionBuilder::new("Enter").from("Idle").to("Work").on(Ev::Go))
        .unwrap();
    t.end_region().unwrap();
    StateMachine::new(t.build().unwrap())
}

#[test]
fn fork_enters_both_regions() {
    let log = Log::default();
    let machine = orthogonal(&log);
    machine.startup().unwrap();
    take(&log);

    machine.send_trigger_event(Ev::Start, 0).unwrap();

    assert_eq!(take(&log), vec!["ExIdle", "EnWork", "EnA2", "EnB2"]);
    assert_eq!(machine.configuration().to_string(), "Work(A2,B2,)");
}

#[test]
fn join_requires_every_source() {
    let log = Log::default();
    let machine = orthogonal(&log);
    machine.startup().unwrap();
    machine.send_trigger_event(Ev::Go, 0).unwrap();
    assert_eq!(machine.configuration().to_string(), "Work(A1,B1,)");

    machine.send_trigger_event(Ev::Stop, 0).unwrap();
    assert!(machine.is_active("Work"));

    machine.send_trigger_event(Ev::Next, 0).unwrap();
    machine.send_trigger_event(Ev::Stop, 0).unwrap();
    assert!(machine.is_active("Work"), "B2 is still inactive");
}

#[test]
fn join_exits_regions_in_order() {
    let log = Log::default();
    let machine = orthogonal(&log);
    machine.startup().unwrap();
    machine.send_trigger_event(Ev::Start, 0).unwrap();
    take(&log);

    machine.send_trigger_event(Ev::Stop, 0).unwrap();

    assert_eq!(take(&log), vec!["ExA2", "ExB2", "ExWork", "EnDone"]);
    assert_eq!(machine.configuration().to_string(), "Done");
}

#[test]
fn startup_and_finish_are_symmetric() {
    let log = Log::default();
    let machine = orthogonal(&log);
    machine.startup().unwrap();
    machine.send_trigger_event(Ev::Go, 0).unwrap();
    take(&log);

    machine.finish().unwrap();

    assert_eq!(take(&log), vec!["ExA1", "ExB1", "ExWork"]);
    assert!(machine.is_nirvana());
    assert_eq!(machine.configuration().to_string(), "*");
}

#[test]
fn configuration_patterns_match_loosely() {
    let log = Log::default();
    let machine = orthogonal(&log);
    machine.startup().unwrap();
    machine.send_trigger_event(Ev::Start, 0).unwrap();
    let topology = machine.topology();
    let current = machine.configuration();

    let empty = topology.create_state_configuration(Vec::<&str>::new()).unwrap();
    assert_eq!(empty.to_string(), "*");
    assert!(empty.is_matching(&current));
    assert!(current.is_matching(&empty));

    let partial = topology.create_state_configuration(["B2"]).unwrap();
    assert_eq!(partial.to_string(), "Work(*,B2,)");
    assert!(partial.is_matching(&current));

    let wrong = topology.create_state_configuration(["A1"]).unwrap();
    assert!(!wrong.is_matching(&current));
    assert_ne!(partial, current);
    assert_eq!(topology.create_state_configuration(["A2", "B2"]).unwrap(), current);
}

#[test]
fn configuration_rejects_bad_names() {
    let machine = orthogonal(&Log::default());
    let topology = machine.topology();

    assert!(topology.create_state_configuration(["A1", "A2"]).is_err());
    assert!(topology.create_state_configuration(["Nowhere"]).is_err());
    assert!(topology.create_state_configuration([""]).is_err());
}

/// Root {Off, On{[Low, High] with history}}
fn dimmer(log: &Log) -> StateMachine<Ev, u32> {
    let mut t = StateMachineTemplate::new();
    t.region("Off", false).unwrap();
    t.state(logged(log, "Off")).unwrap();
    t.end_state().unwrap();
    t.state(logged(log, "On")).unwrap();
    t.region("Low", true).unwrap();
    t.state(logged(log, "Low")).unwrap();
    t.end_state().unwrap();
    t.state(logged(log, "High")).unwrap();
    t.end_state().unwrap();
    t.transition(TransitionBuilder::new("Up").from("Low").to("High").on(Ev::Next))
        .unwrap();
    t.end_region().unwrap();
    t.end_state().unwrap();
    t.transition(TransitionBuilder::new("Power").from("Off").to("On").on(Ev::Start))
        .unwrap();
    t.transition(TransitionBuilder::new("Cut").from("On").to("Off").on(Ev::Stop))
        .unwrap();
    t.transition(TransitionBuilder::new("ForceLow").from("Off").to("Low").on(Ev::Other))
        .unwrap();
    t.end_region().unwrap();
    StateMachine::new(t.build().unwrap())
}

#[test]
fn history_resumes_last_substate() {
    let log = Log::default();
    let machine = dimmer(&log);
    machine.startup().unwrap();
    machine.send_trigger_event(Ev::Start, 0).unwrap();
    machine.send_trigger_event(Ev::Next, 0).unwrap();
    machine.send_trigger_event(Ev::Stop, 0).unwrap();
    take(&log);

    machine.send_trigger_event(Ev::Start, 0).unwrap();

    assert_eq!(take(&log), vec!["ExOff", "EnOn", "EnHigh"]);
}

#[test]
fn explicit_target_beats_history() {
    let log = Log::default();
    let machine = dimmer(&log);
    machine.startup().unwrap();
    machine.send_trigger_event(Ev::Start, 0).unwrap();
    machine.send_trigger_event(Ev::Next, 0).unwrap();
    machine.send_trigger_event(Ev::Stop, 0).unwrap();

    machine.send_trigger_event(Ev::Other, 0).unwrap();

    assert_eq!(machine.configuration().to_string(), "On(Low,)");
}

#[test]
fn history_survives_finish_and_restart() {
    let machine = dimmer(&Log::default());
    machine.startup().unwrap();
    machine.send_trigger_event(Ev::Start, 0).unwrap();
    machine.send_trigger_event(Ev::Next, 0).unwrap();
    machine.finish().unwrap();

    machine.startup().unwrap();
    assert_eq!(machine.configuration().to_string(), "Off");
    machine.send_trigger_event(Ev::Start, 0).unwrap();
    assert_eq!(machine.configuration().to_string(), "On(High,)");
}

#[test]
fn guards_see_event_arguments() {
    let mut t = StateMachineTemplate::<Ev, u32>::new();
    t.region("Locked", false).unwrap();
    t.state("Locked").unwrap();
    t.end_state().unwrap();
    t.state("Open").unwrap();
    t.end_state().unwrap();
    t.transition(
        TransitionBuilder::new("Unlock")
            .from("Locked")
            .to("Open")
            .on(Ev::Go)
            .when(|_m, _e, code| code == Some(&1234)),
    )
    .unwrap();
    t.end_region().unwrap();
    let machine = StateMachine::new(t.build().unwrap());
    machine.startup().unwrap();

    machine.send_trigger_event(Ev::Go, 1111).unwrap();
    assert!(machine.is_active("Locked"));
    machine.send_trigger_event(Ev::Go, 1234).unwrap();
    assert!(machine.is_active("Open"));
}

#[test]
fn first_declared_transition_wins() {
    let mut t = StateMachineTemplate::<Ev, u32>::new();
    t.region("S", false).unwrap();
    for name in ["S", "First", "Second"] {
        t.state(name).unwrap();
        t.end_state().unwrap();
    }
    t.transition(TransitionBuilder::new("ToFirst").from("S").to("First").on(Ev::Go))
        .unwrap();
    t.transition(TransitionBuilder::new("ToSecond").from("S").to("Second").on(Ev::Go))
        .unwrap();
    t.end_region().unwrap();
    let machine = StateMachine::new(t.build().unwrap());

    machine.startup().unwrap();
    machine.send_trigger_event(Ev::Go, 0).unwrap();
    assert_eq!(machine.configuration().to_string(), "First");
}

#[test]
fn transition_action_runs_between_exit_and_entry() {
    let log = Log::default();
    let action_log = Arc::clone(&log);
    let mut t = StateMachineTemplate::<Ev, u32>::new();
    t.region("A", false).unwrap();
    t.state(logged(&log, "A")).unwrap();
    t.end_state().unwrap();
    t.state(logged(&log, "B")).unwrap();
    t.end_state().unwrap();
    t.transition(
        TransitionBuilder::new("Move")
            .from("A")
            .to("B")
            .on(Ev::Go)
            .action(move |_m, event, args| {
                action_log
                    .lock()
                    .unwrap()
                    .push(format!("Move {:?} {}", event.copied(), args.copied().unwrap_or(0)));
                Ok(())
            }),
    )
    .unwrap();
    t.end_region().unwrap();
    let machine = StateMachine::new(t.build().unwrap());

    machine.startup().unwrap();
    machine.send_trigger_event(Ev::Go, 7).unwrap();

    assert_eq!(take(&log), vec!["EnA", "ExA", "Move Some(Go) 7", "EnB"]);
}

#[test]
fn do_actions_drive_completion_transitions() {
    let count = Arc::new(AtomicUsize::new(0));
    let ticks = Arc::clone(&count);
    let (done_guard, again_guard) = (Arc::clone(&count), Arc::clone(&count));

    let mut t = StateMachineTemplate::<Ev, u32>::new();
    t.region("Idle", false).unwrap();
    t.state("Idle").unwrap();
    t.end_state().unwrap();
    t.state(StateBuilder::<Ev, u32>::new("Counting").on_do(move |_m| {
        ticks.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }))
    .unwrap();
    t.end_state().unwrap();
    t.state("Done").unwrap();
    t.end_state().unwrap();
    t.transition(TransitionBuilder::new("Begin").from("Idle").to("Counting").on(Ev::Go))
        .unwrap();
    t.transition(
        TransitionBuilder::new("Finish")
            .from("Counting")
            .to("Done")
            .when(move |_m, _e, _a| done_guard.load(Ordering::SeqCst) >= 3),
    )
    .unwrap();
    t.transition(
        TransitionBuilder::new("Again")
            .from("Counting")
            .to("Counting")
            .when(move |_m, _e, _a| again_guard.load(Ordering::SeqCst) < 3),
    )
    .unwrap();
    t.end_region().unwrap();

    let machine = StateMachine::with_options(t.build().unwrap(), MachineOptions { use_do_actions: true });
    machine.startup().unwrap();
    machine.send_trigger_event(Ev::Go, 0).unwrap();

    assert_eq!(count.load(Ordering::SeqCst), 3);
    assert_eq!(machine.configuration().to_string(), "Done");
}

#[test]
fn do_actions_are_off_by_default() {
    let count = Arc::new(AtomicUsize::new(0));
    let ticks = Arc::clone(&count);
    let mut t = StateMachineTemplate::<Ev, u32>::new();
    t.region("Busy", false).unwrap();
    t.state(StateBuilder::<Ev, u32>::new("Busy").on_do(move |_m| {
        ticks.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }))
    .unwrap();
    t.end_state().unwrap();
    t.end_region().unwrap();

    let mut machine = StateMachine::new(t.build().unwrap());
    machine.startup().unwrap();
    assert_eq!(count.load(Ordering::SeqCst), 0);

    machine.finish().unwrap();
    machine.set_use_do_actions(true);
    machine.startup().unwrap();
    assert_eq!(count.load(Ordering::SeqCst), 1);
}

#[test]
fn reentrant_events_are_ignored() {
    let mut t = StateMachineTemplate::<Ev, u32>::new();
    t.region("A", false).unwrap();
    t.state("A").unwrap();
    t.end_state().unwrap();
    t.state(StateBuilder::<Ev, u32>::new("B").on_entry(|m, _e, _a| {
        assert!(m.is_dispatching());
        m.send_trigger_event(Ev::Next, 0)?;
        m.finish()?;
        Ok(())
    }))
    .unwrap();
    t.end_state().unwrap();
    t.state("C").unwrap();
    t.end_state().unwrap();
    t.transition(TransitionBuilder::new("AB").from("A").to("B").on(Ev::Go))
        .unwrap();
    t.transition(TransitionBuilder::new("BC").from("B").to("C").on(Ev::Next))
        .unwrap();
    t.end_region().unwrap();
    let machine = StateMachine::new(t.build().unwrap());

    machine.startup().unwrap();
    machine.send_trigger_event(Ev::Go, 0).unwrap();

    assert_eq!(machine.configuration().to_string(), "B");
    assert!(!machine.is_dispatching());
}

#[test]
fn failing_exit_keeps_state_active_until_retry() {
    let fail_once = Arc::new(AtomicBool::new(true));
    let exits = Arc::new(AtomicUsize::new(0));
    let (flag, counter) = (Arc::clone(&fail_once), Arc::clone(&exits));

    let mut t = StateMachineTemplate::<Ev, u32>::new();
    t.region("A", false).unwrap();
    t.state(StateBuilder::<Ev, u32>::new("A").on_exit(move |_m, _e, _a| {
        counter.fetch_add(1, Ordering::SeqCst);
        if flag.swap(false, Ordering::SeqCst) {
            return Err("disk full".into());
        }
        Ok(())
    }))
    .unwrap();
    t.end_state().unwrap();
    t.state("B").unwrap();
    t.end_state().unwrap();
    t.transition(TransitionBuilder::new("AB").from("A").to("B").on(Ev::Go))
        .unwrap();
    t.end_region().unwrap();
    let machine = StateMachine::new(t.build().unwrap());
    machine.startup().unwrap();

    let err = machine.send_trigger_event(Ev::Go, 0).unwrap_err();
    match &err {
        DispatchError::ActionFailed { owner, kind, .. } => {
            assert_eq!(owner, "A");
            assert_eq!(*kind, ActionKind::Exit);
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert_eq!(err.action_error().map(ToString::to_string).as_deref(), Some("disk full"));
    assert!(machine.is_active("A"));
    assert!(!machine.is_dispatching());

    machine.send_trigger_event(Ev::Go, 0).unwrap();
    assert!(machine.is_active("B"));
    assert_eq!(exits.load(Ordering::SeqCst), 2);
}

#[test]
fn failing_entry_leaves_state_inactive() {
    let mut t = StateMachineTemplate::<Ev, u32>::new();
    t.region("A", false).unwrap();
    t.state("A").unwrap();
    t.end_state().unwrap();
    t.state(StateBuilder::<Ev, u32>::new("B").on_entry(|_m, _e, _a| Err("refused".into())))
        .unwrap();
    t.end_state().unwrap();
    t.transition(TransitionBuilder::new("AB").from("A").to("B").on(Ev::Go))
        .unwrap();
    t.end_region().unwrap();
    let machine = StateMachine::new(t.build().unwrap());
    machine.startup().unwrap();

    assert!(machine.send_trigger_event(Ev::Go, 0).is_err());
    assert!(!machine.is_active("A"));
    assert!(!machine.is_active("B"));
    assert!(machine.is_nirvana());
    machine.startup().unwrap();
    assert!(machine.is_active("A"));
}

/// Root {W{[A1, A2] | [B1, B2]}} with one transition per scope kind:
/// - `Local` inside the A region: A1 -> A2
/// - `InState` inside W: A2 -> A1
/// - `Outer` in the root region: A1 -> A2
fn scoped(log: &Log) -> StateMachine<Ev, u32> {
    let mut t = StateMachineTemplate::new();
    t.region("W", false).unwrap();
    t.state(logged(log, "W")).unwrap();
    t.region("A1", false).unwrap();
    t.state(logged(log, "A1")).unwrap();
    t.end_state().unwrap();
    t.state(logged(log, "A2")).unwrap();
    t.end_state().unwrap();
    t.transition(TransitionBuilder::new("Local").from("A1").to("A2").on(Ev::Next))
        .unwrap();
    t.end_region().unwrap();
    t.region("B1", false).unwrap();
    t.state(logged(log, "B1")).unwrap();
    t.end_state().unwrap();
    t.state(logged(log, "B2")).unwrap();
    t.end_state().unwrap();
    t.end_region().unwrap();
    t.transition(TransitionBuilder::new("InState").from("A2").to("A1").on(Ev::Other))
        .unwrap();
    t.end_state().unwrap();
    t.transition(TransitionBuilder::new("Outer").from("A1").to("A2").on(Ev::Go))
        .unwrap();
    t.end_region().unwrap();
    StateMachine::new(t.build().unwrap())
}

#[test]
fn declaration_scope_bounds_exits_and_entries() {
    let log = Log::default();
    let machine = scoped(&log);
    machine.startup().unwrap();
    assert_eq!(take(&log), vec!["EnW", "EnA1", "EnB1"]);

    // Region scope: the owner and the sibling region stay untouched.
    machine.send_trigger_event(Ev::Next, 0).unwrap();
    assert_eq!(take(&log), vec!["ExA1", "EnA2"]);
    assert_eq!(machine.configuration().to_string(), "W(A2,B1,)");

    // State scope: every region of W is left and re-entered, W stays.
    machine.send_trigger_event(Ev::Other, 0).unwrap();
    assert_eq!(take(&log), vec!["ExA2", "ExB1", "EnA1", "EnB1"]);
    assert_eq!(machine.configuration().to_string(), "W(A1,B1,)");

    // Outer region scope: W itself is exited and re-entered.
    machine.send_trigger_event(Ev::Go, 0).unwrap();
    assert_eq!(take(&log), vec!["ExA1", "ExB1", "ExW", "EnW", "EnA2", "EnB1"]);
    assert_eq!(machine.configuration().to_string(), "W(A2,B1,)");
}
