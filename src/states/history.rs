//! History pseudostates.

use crate::engine::StateId;

/// Depth of the configuration a history state restores.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum HistoryKind {
    /// Restore the direct child that was active on exit.
    #[default]
    Shallow,
    /// Restore the full nested chain that was active on exit.
    Deep,
}

/// Payload of a history state.
///
/// The owning composite records its active configuration into the history
/// state every time it exits. Entering the history state restores the
/// recorded state, or the configured default when nothing is recorded yet;
/// with neither, entry fails with `NoTargetState`. A composite entered
/// directly uses its history when that yields a state and its declared
/// initial child otherwise.
#[derive(Debug, Clone, Default)]
pub struct HistoryState {
    pub(crate) kind: HistoryKind,
    pub(crate) default: Option<String>,
}

impl HistoryState {
    pub fn new(kind: HistoryKind) -> Self {
        Self {
            kind,
            default: None,
        }
    }

    pub fn shallow() -> Self {
        Self::new(HistoryKind::Shallow)
    }

    pub fn deep() -> Self {
        Self::new(HistoryKind::Deep)
    }

    /// Sibling restored when nothing has been recorded yet.
    pub fn with_default(mut self, state: impl Into<String>) -> Self {
        self.default = Some(state.into());
        self
    }

    pub fn kind(&self) -> HistoryKind {
        self.kind
    }

    pub fn default_state(&self) -> Option<&str> {
        self.default.as_deref()
    }

    /// What to record when the owning composite exits with `child` active
    /// and `leaf` as the deepest active descendant.
    pub(crate) fn record_target(&self, child: StateId, leaf: StateId) -> StateId {
        match self.kind {
            HistoryKind::Shallow => child,
            HistoryKind::Deep => leaf,
        }
    }
}

/// Pick the state a history entry restores.
///
/// The recorded state wins over the default.
pub(crate) fn resolve(recorded: Option<StateId>, default: Option<StateId>) -> Option<StateId> {
    recorded.or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recorded_state_wins() {
        let recorded = StateId::new(3);
        let default = StateId::new(1);
        assert_eq!(resolve(Some(recorded), Some(default)), Some(recorded));
    }

    #[test]
    fn default_used_until_something_is_recorded() {
        let default = StateId::new(1);
        assert_eq!(resolve(None, Some(default)), Some(default));
        assert_eq!(resolve(None, None), None);
    }

    #[test]
    fn deep_history_records_leaf() {
        let child = StateId::new(4);
        let leaf = StateId::new(6);
        assert_eq!(HistoryState::shallow().record_target(child, leaf), child);
        assert_eq!(HistoryState::deep().record_target(child, leaf), leaf);
    }

    #[test]
    fn default_is_configurable() {
        let history = HistoryState::deep().with_default("Idle");
        assert_eq!(history.kind(), HistoryKind::Deep);
        assert_eq!(history.default_state(), Some("Idle"));
    }
}
