//! State arena: the flattened containment tree of one machine.
//!
//! States are stored in a `Vec` and addressed by [`StateId`]. Parent links
//! are plain indices, so the tree has no ownership cycles. Each node keeps
//! its runtime flags (active, current child, recorded history, timer and
//! activity tokens) behind its own mutex; the arena itself is only mutated
//! while the topology is being declared.

use super::transition::Transition;
use crate::core::sync::lock;
use crate::core::{Action, Activity, State, StateKind};
use std::collections::{BTreeSet, HashMap};
use std::sync::{Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;

/// Index of a state inside its machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StateId(usize);

impl StateId {
    pub(crate) fn new(index: usize) -> Self {
        Self(index)
    }

    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Default)]
pub(crate) struct NodeRuntime {
    pub(crate) active: bool,
    pub(crate) current_child: Option<StateId>,
    pub(crate) recorded: Option<StateId>,
    pub(crate) timer: Option<CancellationToken>,
    pub(crate) activity: Option<CancellationToken>,
}

impl NodeRuntime {
    fn release(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.cancel();
        }
        if let Some(activity) = self.activity.take() {
            activity.cancel();
        }
    }
}

pub(crate) struct Node {
    pub(crate) name: String,
    pub(crate) path: String,
    pub(crate) parent: Option<StateId>,
    pub(crate) children: Vec<StateId>,
    pub(crate) history: Option<StateId>,
    pub(crate) kind: StateKind,
    pub(crate) on_entry: Option<Action>,
    pub(crate) on_exit: Option<Action>,
    pub(crate) activity: Option<Activity>,
    runtime: Mutex<NodeRuntime>,
}

impl Node {
    pub(crate) fn runtime(&self) -> MutexGuard<'_, NodeRuntime> {
        lock(&self.runtime)
    }

    pub(crate) fn is_active(&self) -> bool {
        self.runtime().active
    }

    pub(crate) fn current_child(&self) -> Option<StateId> {
        self.runtime().current_child
    }
}

#[derive(Default)]
pub(crate) struct Topology {
    nodes: Vec<Node>,
    index: HashMap<String, StateId>,
    roots: Vec<StateId>,
    pub(crate) transitions: Vec<Transition>,
    pub(crate) initial: Option<String>,
    pub(crate) finals: BTreeSet<String>,
    pub(crate) duplicates: Vec<String>,
}

impl Topology {
    /// Flatten `state` (and, for composites, its children) into the arena.
    pub(crate) fn insert(&mut self, mut state: State, parent: Option<StateId>) -> StateId {
        let id = StateId(self.nodes.len());
        let path = match parent {
            Some(p) => format!("{}.{}", self.nodes[p.0].path, state.name),
            None => state.name.clone(),
        };
        let children = match &mut state.kind {
            StateKind::Composite(composite) => std::mem::take(&mut composite.children),
            _ => Vec::new(),
        };

        if self.index.insert(path.clone(), id).is_some() {
            self.duplicates.push(path.clone());
        }
        if parent.is_none() && state.is_final() {
            self.finals.insert(path.clone());
        }

        self.nodes.push(Node {
            name: state.name,
            path,
            parent,
            children: Vec::new(),
            history: None,
            kind: state.kind,
            on_entry: state.on_entry,
            on_exit: state.on_exit,
            activity: state.activity,
            runtime: Mutex::new(NodeRuntime::default()),
        });
        match parent {
            Some(p) => self.nodes[p.0].children.push(id),
            None => self.roots.push(id),
        }

        for child in children {
            let child_id = self.insert(child, Some(id));
            let is_history = matches!(self.nodes[child_id.0].kind, StateKind::History(_));
            if is_history && self.nodes[id.0].history.is_none() {
                self.nodes[id.0].history = Some(child_id);
            }
        }
        id
    }

    pub(crate) fn node(&self, id: StateId) -> &Node {
        &self.nodes[id.0]
    }

    pub(crate) fn nodes(&self) -> impl Iterator<Item = (StateId, &Node)> {
        self.nodes.iter().enumerate().map(|(i, n)| (StateId(i), n))
    }

    pub(crate) fn len(&self) -> usize {
        self.nodes.len()
    }

    pub(crate) fn lookup(&self, path: &str) -> Option<StateId> {
        self.index.get(path).copied()
    }

    pub(crate) fn path(&self, id: StateId) -> &str {
        &self.nodes[id.0].path
    }

    /// Resolve `name` as seen from inside `scope`: first relative to the
    /// scope and each of its ancestors, then as an absolute path.
    pub(crate) fn resolve(&self, scope: Option<StateId>, name: &str) -> Option<StateId> {
        let mut cursor = scope;
        while let Some(id) = cursor {
            let node = self.node(id);
            if let Some(found) = self.lookup(&format!("{}.{}", node.path, name)) {
                return Some(found);
            }
            cursor = node.parent;
        }
        self.lookup(name)
    }

    /// Strict ancestors, nearest first.
    pub(crate) fn ancestors(&self, id: StateId) -> Vec<StateId> {
        let mut ancestors = Vec::new();
        let mut cursor = self.node(id).parent;
        while let Some(parent) = cursor {
            ancestors.push(parent);
            cursor = self.node(parent).parent;
        }
        ancestors
    }

    /// True when `id` is strictly nested somewhere below `ancestor`.
    pub(crate) fn is_descendant(&self, id: StateId, ancestor: StateId) -> bool {
        self.ancestors(id).contains(&ancestor)
    }

    /// Deepest state that strictly contains both `a` and `b`; `None` when
    /// that is the machine itself.
    pub(crate) fn common_ancestor(&self, a: StateId, b: StateId) -> Option<StateId> {
        let theirs = self.ancestors(b);
        self.ancestors(a).into_iter().find(|id| theirs.contains(id))
    }

    /// The ancestor-or-self of `id` whose parent is `scope`.
    pub(crate) fn child_toward(&self, scope: Option<StateId>, id: StateId) -> StateId {
        let mut cursor = id;
        while let Some(parent) = self.node(cursor).parent {
            if Some(parent) == scope {
                break;
            }
            cursor = parent;
        }
        cursor
    }

    /// States to enter, outermost first, to get from inside `scope` down to
    /// `target` inclusive.
    pub(crate) fn path_between(&self, scope: Option<StateId>, target: StateId) -> Vec<StateId> {
        let mut path = vec![target];
        let mut cursor = self.node(target).parent;
        while let Some(parent) = cursor {
            if Some(parent) == scope {
                break;
            }
            path.push(parent);
            cursor = self.node(parent).parent;
        }
        path.reverse();
        path
    }

    /// Active chain starting at `top`, following current children.
    pub(crate) fn chain_from(&self, top: StateId) -> Vec<StateId> {
        let mut chain = vec![top];
        let mut cursor = self.node(top).current_child();
        while let Some(child) = cursor {
            chain.push(child);
            cursor = self.node(child).current_child();
        }
        chain
    }

    pub(crate) fn leaf_from(&self, top: StateId) -> StateId {
        let mut leaf = top;
        while let Some(child) = self.node(leaf).current_child() {
            leaf = child;
        }
        leaf
    }

    pub(crate) fn is_final(&self, id: StateId) -> bool {
        self.finals.contains(self.path(id))
    }

    /// Drop all runtime state: flags, history records, timers, activities,
    /// region and nested machine state.
    pub(crate) fn reset_runtime(&self) {
        for node in &self.nodes {
            {
                let mut runtime = node.runtime();
                runtime.release();
                *runtime = NodeRuntime::default();
            }
            match &node.kind {
                StateKind::Parallel(parallel) => parallel.reset(),
                StateKind::Submachine(submachine) => submachine.reset(),
                _ => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::states::{CompositeState, HistoryState};

    fn sample() -> Topology {
        let mut topo = Topology::default();
        topo.insert(
            State::composite(
                "C",
                CompositeState::new()
                    .child(State::simple("A"))
                    .child(State::composite(
                        "B",
                        CompositeState::new().child(State::simple("X")).initial("X"),
                    ))
                    .child(State::history("H", HistoryState::shallow()))
                    .initial("A"),
            ),
            None,
        );
        topo.insert(State::simple("Other"), None);
        topo.insert(State::final_state("Done"), None);
        topo
    }

    #[test]
    fn children_get_dotted_paths() {
        let topo = sample();
        assert!(topo.lookup("C.A").is_some());
        assert!(topo.lookup("C.B.X").is_some());
        assert!(topo.lookup("A").is_none());
        assert_eq!(topo.len(), 7);
    }

    #[test]
    fn history_child_is_attached() {
        let topo = sample();
        let c = topo.lookup("C").unwrap();
        assert_eq!(topo.node(c).history, topo.lookup("C.H"));
    }

    #[test]
    fn top_level_finals_are_registered() {
        let topo = sample();
        assert!(topo.is_final(topo.lookup("Done").unwrap()));
        assert!(!topo.is_final(topo.lookup("Other").unwrap()));
    }

    #[test]
    fn resolve_prefers_scope() {
        let topo = sample();
        let b = topo.lookup("C.B").unwrap();
        assert_eq!(topo.resolve(Some(b), "X"), topo.lookup("C.B.X"));
        assert_eq!(topo.resolve(Some(b), "A"), topo.lookup("C.A"));
        assert_eq!(topo.resolve(Some(b), "Other"), topo.lookup("Other"));
        assert_eq!(topo.resolve(None, "X"), None);
    }

    #[test]
    fn ancestry_queries() {
        let topo = sample();
        let c = topo.lookup("C").unwrap();
        let a = topo.lookup("C.A").unwrap();
        let b = topo.lookup("C.B").unwrap();
        let x = topo.lookup("C.B.X").unwrap();
        let other = topo.lookup("Other").unwrap();

        assert_eq!(topo.ancestors(x), vec![b, c]);
        assert!(topo.is_descendant(x, c));
        assert!(!topo.is_descendant(c, c));
        assert_eq!(topo.common_ancestor(a, x), Some(c));
        assert_eq!(topo.common_ancestor(a, other), None);
        assert_eq!(topo.child_toward(Some(c), x), b);
        assert_eq!(topo.child_toward(None, x), c);
        assert_eq!(topo.path_between(Some(c), x), vec![b, x]);
        assert_eq!(topo.path_between(None, x), vec![c, b, x]);
    }

    #[test]
    fn duplicates_are_recorded() {
        let mut topo = sample();
        topo.insert(State::simple("Other"), None);
        assert_eq!(topo.duplicates, vec!["Other".to_string()]);
    }

    #[test]
    fn chain_follows_current_children() {
        let topo = sample();
        let c = topo.lookup("C").unwrap();
        let b = topo.lookup("C.B").unwrap();
        let x = topo.lookup("C.B.X").unwrap();
        topo.node(c).runtime().current_child = Some(b);
        topo.node(b).runtime().current_child = Some(x);

        assert_eq!(topo.chain_from(c), vec![c, b, x]);
        assert_eq!(topo.leaf_from(c), x);

        topo.reset_runtime();
        assert_eq!(topo.chain_from(c), vec![c]);
    }
}
