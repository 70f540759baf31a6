//! Property-based tests for event processing.
//!
//! These tests use proptest to verify properties hold across
//! many randomly generated inputs.

use proptest::prelude::*;
use statecraft::{
    CompositeState, Context, CountingObserver, DeferState, Guard, HistoryState, State,
    StateMachine, Transition,
};
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::runtime::Runtime;

fn runtime() -> Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

fn history_machine(history: HistoryState) -> StateMachine {
    let branch = |name: &str| {
        State::composite(
            name,
            CompositeState::new()
                .child(State::simple("X"))
                .child(State::simple("Y"))
                .child(State::simple("Z"))
                .initial("X"),
        )
    };
    let machine = StateMachine::new("history");
    machine.add_state(State::composite(
        "C",
        CompositeState::new()
            .child(State::history("H", history))
            .child(branch("A"))
            .child(branch("B"))
            .initial("A"),
    ));
    machine.add_state(State::simple("Outside"));
    machine.add_transition("C", "Outside", "LEAVE");
    machine.add_transition("Outside", "C", "BACK");
    for outer in ["A", "B"] {
        machine.add_transition("C", format!("C.{outer}"), format!("GO_{outer}"));
        for inner in ["X", "Y", "Z"] {
            machine.add_transition(
                format!("C.{outer}"),
                format!("C.{outer}.{inner}"),
                format!("GO_{inner}"),
            );
        }
    }
    machine.set_initial_state("C");
    machine
}

fn walk_machine() -> StateMachine {
    let machine = StateMachine::new("walk");
    machine.add_state(State::composite(
        "C",
        CompositeState::new()
            .child(State::simple("A"))
            .child(State::composite(
                "B",
                CompositeState::new()
                    .child(State::simple("X"))
                    .child(State::simple("Y"))
                    .initial("X")
                    .transition(Transition::new("X", "Y", "e1")),
            ))
            .initial("A")
            .transition(Transition::new("A", "B", "e0"))
            .transition(Transition::new("B", "A", "e2")),
    ));
    machine.add_state(State::simple("D"));
    machine.add_transition("C", "D", "e3");
    machine.add_transition("D", "C.B.Y", "e0");
    machine.add_transition("C.B.Y", "C.B", "e4");
    machine.set_initial_state("C");
    machine
}

const WALK_STATES: [&str; 6] = ["C", "C.A", "C.B", "C.B.X", "C.B.Y", "D"];

proptest! {
    #[test]
    fn highest_enabled_priority_wins(
        candidates in prop::collection::vec((-5i32..5, any::<bool>()), 1..8)
    ) {
        let rt = runtime();
        let _guard = rt.enter();

        let machine = StateMachine::new("priority");
        machine.add_state(State::simple("S"));
        for (index, (priority, enabled)) in candidates.iter().enumerate() {
            let target = format!("T{index}");
            machine.add_state(State::simple(target.clone()));
            let guard = if *enabled { Guard::always() } else { Guard::always().not() };
            machine.declare(
                Transition::new("S", target, "GO")
                    .with_guard(guard)
                    .with_priority(*priority),
            );
        }
        machine.set_initial_state("S");

        let ctx = Context::new();
        machine.start(ctx.clone()).unwrap();
        machine.handle_event(&ctx, "GO").unwrap();

        // First declared among the highest enabled priorities.
        let expected = candidates
            .iter()
            .enumerate()
            .filter(|(_, (_, enabled))| *enabled)
            .fold(None::<(usize, i32)>, |best, (index, (priority, _))| match best {
                Some((_, top)) if top >= *priority => best,
                _ => Some((index, *priority)),
            })
            .map(|(index, _)| format!("T{index}"))
            .unwrap_or_else(|| "S".to_string());

        prop_assert_eq!(machine.current_state(), Some(expected));
        machine.stop().unwrap();
    }

    #[test]
    fn deferred_events_keep_arrival_order(
        events in prop::collection::vec(prop::sample::select(vec!["a", "b", "c"]), 0..20)
    ) {
        let rt = runtime();
        let _guard = rt.enter();

        let machine = StateMachine::new("deferral");
        machine.add_state(State::defer("Busy", DeferState::events(["a", "b", "c"])));
        machine.add_state(State::simple("Idle"));
        machine.add_transition("Busy", "Idle", "DONE");
        machine.set_initial_state("Busy");
        let observer = Arc::new(CountingObserver::new());
        machine.add_observer(observer.clone());

        let ctx = Context::new();
        machine.start(ctx.clone()).unwrap();
        for event in &events {
            machine.handle_event(&ctx, *event).unwrap();
        }
        prop_assert_eq!(machine.deferred_len(), events.len());

        machine.handle_event(&ctx, "DONE").unwrap();

        let mut expected = vec!["DONE".to_string()];
        expected.extend(events.iter().map(|e| e.to_string()));
        prop_assert_eq!(observer.events(), expected);
        prop_assert_eq!(machine.deferred_len(), 0);
        machine.stop().unwrap();
    }

    #[test]
    fn history_restores_recorded_configuration(
        outer in prop::sample::select(vec!["A", "B"]),
        inner in prop::sample::select(vec!["X", "Y", "Z"]),
        deep in any::<bool>(),
    ) {
        let rt = runtime();
        let _guard = rt.enter();

        let history = if deep { HistoryState::deep() } else { HistoryState::shallow() };
        let machine = history_machine(history);
        let ctx = Context::new();
        machine.start(ctx.clone()).unwrap();

        machine.handle_event(&ctx, format!("GO_{outer}")).unwrap();
        machine.handle_event(&ctx, format!("GO_{inner}")).unwrap();
        let before = machine.active_path();

        // Restoring twice gives the same configuration.
        for _ in 0..2 {
            machine.handle_event(&ctx, "LEAVE").unwrap();
            machine.handle_event(&ctx, "BACK").unwrap();
            let expected_leaf = if deep {
                format!("C.{outer}.{inner}")
            } else {
                format!("C.{outer}.X")
            };
            prop_assert_eq!(machine.active_leaf(), Some(expected_leaf));
        }
        if deep {
            prop_assert_eq!(machine.active_path(), before);
        }
        machine.stop().unwrap();
    }

    #[test]
    fn active_flags_match_active_path(
        events in prop::collection::vec(prop::sample::select(vec!["e0", "e1", "e2", "e3", "e4"]), 0..30)
    ) {
        let rt = runtime();
        let _guard = rt.enter();

        let machine = walk_machine();
        let ctx = Context::new();
        machine.start(ctx.clone()).unwrap();

        for event in events {
            machine.handle_event(&ctx, event).unwrap();

            let path = machine.active_path();
            let flagged: BTreeSet<String> = WALK_STATES
                .iter()
                .filter(|state| machine.is_active(state))
                .map(|state| state.to_string())
                .collect();
            let expected: BTreeSet<String> = path.iter().cloned().collect();
            prop_assert_eq!(flagged, expected);

            // The configuration always ends in a leaf.
            let leaf = machine.active_leaf().unwrap();
            prop_assert!(["C.A", "C.B.X", "C.B.Y", "D"].contains(&leaf.as_str()));
            prop_assert_eq!(path.last(), Some(&leaf));
        }
        machine.stop().unwrap();
    }
}
