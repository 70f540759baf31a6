//! Static checks over a machine's topology.
//!
//! Validation never stops at the first problem: every violation found is
//! reported, so a caller can fix a whole definition in one pass.

use super::topology::{Node, StateId, Topology};
use crate::core::StateKind;
use thiserror::Error;

/// A problem found in a machine definition.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum Violation {
    #[error("no initial state is set")]
    MissingInitialState,

    #[error("initial state '{0}' does not exist")]
    UnknownInitialState(String),

    #[error("state path '{0}' is declared more than once")]
    DuplicateState(String),

    #[error("transition on '{event}' leaves unknown state '{from}'")]
    UnknownSource { from: String, event: String },

    #[error("transition on '{event}' targets unknown state '{to}'")]
    UnknownTarget { to: String, event: String },

    #[error("composite state '{0}' has no initial child")]
    MissingInitialChild(String),

    #[error("composite state '{composite}' names unknown initial child '{child}'")]
    UnknownInitialChild { composite: String, child: String },

    #[error("history state '{0}' is not inside a composite state")]
    OrphanHistory(String),

    #[error("parallel state '{0}' has no regions")]
    EmptyParallel(String),

    #[error("{kind} state '{state}' refers to unknown state '{target}'")]
    UnresolvedTarget {
        state: String,
        kind: String,
        target: String,
    },
}

pub(crate) fn validate(topo: &Topology) -> Vec<Violation> {
    let mut violations = Vec::new();

    match &topo.initial {
        None => violations.push(Violation::MissingInitialState),
        Some(initial) if topo.lookup(initial).is_none() => {
            violations.push(Violation::UnknownInitialState(initial.clone()));
        }
        Some(_) => {}
    }

    violations.extend(topo.duplicates.iter().cloned().map(Violation::DuplicateState));

    for t in &topo.transitions {
        if topo.lookup(t.from()).is_none() {
            violations.push(Violation::UnknownSource {
                from: t.from().to_string(),
                event: t.event().to_string(),
            });
        }
        if topo.resolve(None, t.to()).is_none() {
            violations.push(Violation::UnknownTarget {
                to: t.to().to_string(),
                event: t.event().to_string(),
            });
        }
    }

    for (id, node) in topo.nodes() {
        check_node(topo, id, node, &mut violations);
    }

    violations
}

fn check_node(topo: &Topology, id: StateId, node: &Node, violations: &mut Vec<Violation>) {
    let mut check = |target: &str| {
        if topo.resolve(node.parent, target).is_none() {
            violations.push(Violation::UnresolvedTarget {
                state: node.path.clone(),
                kind: node.kind.label().to_string(),
                target: target.to_string(),
            });
        }
    };

    match &node.kind {
        StateKind::Composite(composite) => {
            check_composite(topo, id, node, violations);
            for t in composite.transitions() {
                if topo.resolve(Some(id), t.from()).is_none() {
                    violations.push(Violation::UnknownSource {
                        from: t.from().to_string(),
                        event: t.event().to_string(),
                    });
                }
                if topo.resolve(Some(id), t.to()).is_none() {
                    violations.push(Violation::UnknownTarget {
                        to: t.to().to_string(),
                        event: t.event().to_string(),
                    });
                }
            }
        }
        StateKind::History(history) => {
            let in_composite = node
                .parent
                .is_some_and(|p| matches!(topo.node(p).kind, StateKind::Composite(_)));
            if let Some(default) = history.default_state() {
                check(default);
            }
            if !in_composite {
                violations.push(Violation::OrphanHistory(node.path.clone()));
            }
        }
        StateKind::Choice(choice) => choice.targets().for_each(&mut check),
        StateKind::Junction(junction) => junction.routes().iter().for_each(|r| check(r.to())),
        StateKind::Timeout(timeout) => timeout.target_name().into_iter().for_each(check),
        StateKind::Parallel(parallel) => {
            parallel.join_target().into_iter().for_each(&mut check);
            if parallel.regions().is_empty() {
                violations.push(Violation::EmptyParallel(node.path.clone()));
            }
        }
        StateKind::EntryPoint(point) | StateKind::ExitPoint(point) => check(point.target()),
        StateKind::Submachine(submachine) => submachine.exit_targets().for_each(check),
        StateKind::Simple | StateKind::Defer(_) | StateKind::Final => {}
    }
}

fn check_composite(topo: &Topology, id: StateId, node: &Node, violations: &mut Vec<Violation>) {
    let StateKind::Composite(composite) = &node.kind else {
        return;
    };
    match composite.initial_name() {
        Some(child) => {
            let resolved = topo
                .resolve(Some(id), child)
                .filter(|c| topo.is_descendant(*c, id));
            if resolved.is_none() {
                violations.push(Violation::UnknownInitialChild {
                    composite: node.path.clone(),
                    child: child.to_string(),
                });
            }
        }
        None => {
            let has_default = node.history.is_some_and(|h| match &topo.node(h).kind {
                StateKind::History(history) => history.default_state().is_some(),
                _ => false,
            });
            if !has_default {
                violations.push(Violation::MissingInitialChild(node.path.clone()));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::State;
    use crate::engine::Transition;
    use crate::states::{ChoiceState, CompositeState, HistoryState};

    #[test]
    fn empty_topology_lacks_initial() {
        let topo = Topology::default();
        assert_eq!(validate(&topo), vec![Violation::MissingInitialState]);
    }

    #[test]
    fn valid_topology_passes() {
        let mut topo = Topology::default();
        topo.insert(State::simple("A"), None);
        topo.insert(State::simple("B"), None);
        topo.transitions.push(Transition::new("A", "B", "GO"));
        topo.initial = Some("A".into());
        assert!(validate(&topo).is_empty());
    }

    #[test]
    fn all_violations_are_reported() {
        let mut topo = Topology::default();
        topo.insert(
            State::composite("C", CompositeState::new().child(State::simple("A"))),
            None,
        );
        topo.insert(
            State::choice("Pick", ChoiceState::new().otherwise("Nowhere")),
            None,
        );
        topo.insert(State::history("H", HistoryState::shallow()), None);
        topo.transitions.push(Transition::new("Ghost", "C", "GO"));
        topo.initial = Some("Missing".into());

        let violations = validate(&topo);
        assert!(violations.contains(&Violation::UnknownInitialState("Missing".into())));
        assert!(violations.contains(&Violation::MissingInitialChild("C".into())));
        assert!(violations.contains(&Violation::OrphanHistory("H".into())));
        assert!(violations.contains(&Violation::UnknownSource {
            from: "Ghost".into(),
            event: "GO".into(),
        }));
        assert!(violations.contains(&Violation::UnresolvedTarget {
            state: "Pick".into(),
            kind: "choice".into(),
            target: "Nowhere".into(),
        }));
        assert_eq!(violations.len(), 5);
    }

    #[test]
    fn history_default_counts_as_initial() {
        let mut topo = Topology::default();
        topo.insert(
            State::composite(
                "C",
                CompositeState::new()
                    .child(State::simple("A"))
                    .child(State::history("H", HistoryState::deep().with_default("A"))),
            ),
            None,
        );
        topo.initial = Some("C".into());
        assert!(validate(&topo).is_empty());
    }
}
