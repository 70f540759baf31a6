//! Entry and exit points.

/// Payload shared by entry and exit points: the state they redirect to.
///
/// The target is resolved relative to the point's enclosing scope first,
/// then as an absolute path.
#[derive(Clone, Debug)]
pub struct PointState {
    pub(crate) target: String,
}

impl PointState {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
        }
    }

    pub fn target(&self) -> &str {
        &self.target
    }
}
