//! Choice and junction pseudostates.

use crate::core::{Context, Guard};
use std::cmp::Reverse;

/// One guarded branch of a choice.
#[derive(Clone, Debug)]
pub struct ChoiceOption {
    guard: Guard,
    target: String,
    priority: i32,
}

impl ChoiceOption {
    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }
}

/// Dynamic branch point evaluated when the choice state is entered.
///
/// Options are tried by descending priority, keeping declaration order
/// among equal priorities; the first enabled option wins. The `otherwise`
/// branch is tried last. When nothing matches, the choice stays active.
///
/// # Example
///
/// ```rust
/// use statecraft::{ChoiceState, Context, Guard};
///
/// let choice = ChoiceState::new()
///     .when(Guard::flag("vip"), "Priority")
///     .otherwise("Standard");
///
/// let ctx = Context::new();
/// assert_eq!(choice.select(&ctx), Some("Standard"));
/// ctx.set("vip", true);
/// assert_eq!(choice.select(&ctx), Some("Priority"));
/// ```
#[derive(Clone, Debug, Default)]
pub struct ChoiceState {
    options: Vec<ChoiceOption>,
    otherwise: Option<String>,
}

impl ChoiceState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn when(self, guard: Guard, target: impl Into<String>) -> Self {
        self.when_with_priority(guard, target, 0)
    }

    pub fn when_with_priority(
        mut self,
        guard: Guard,
        target: impl Into<String>,
        priority: i32,
    ) -> Self {
        self.options.push(ChoiceOption {
            guard,
            target: target.into(),
            priority,
        });
        self
    }

    /// Branch taken when no option matches.
    pub fn otherwise(mut self, target: impl Into<String>) -> Self {
        self.otherwise = Some(target.into());
        self
    }

    pub fn options(&self) -> &[ChoiceOption] {
        &self.options
    }

    pub fn otherwise_target(&self) -> Option<&str> {
        self.otherwise.as_deref()
    }

    /// Every target this choice may select.
    pub fn targets(&self) -> impl Iterator<Item = &str> {
        self.options
            .iter()
            .map(|o| o.target.as_str())
            .chain(self.otherwise.as_deref())
    }

    pub fn select(&self, ctx: &Context) -> Option<&str> {
        let mut ordered: Vec<&ChoiceOption> = self.options.iter().collect();
        ordered.sort_by_key(|o| Reverse(o.priority));
        ordered
            .into_iter()
            .find(|o| o.guard.check(ctx))
            .map(|o| o.target.as_str())
            .or(self.otherwise.as_deref())
    }
}

/// One row of a junction table.
#[derive(Clone, Debug)]
pub struct JunctionRoute {
    from: String,
    guard: Option<Guard>,
    to: String,
}

impl JunctionRoute {
    pub fn from(&self) -> &str {
        &self.from
    }

    pub fn to(&self) -> &str {
        &self.to
    }
}

/// Static branch table shared by several incoming paths.
///
/// A junction does nothing on entry. Callers resolve it explicitly with
/// the state they are coming from; rows are tried in declaration order.
#[derive(Clone, Debug, Default)]
pub struct JunctionState {
    routes: Vec<JunctionRoute>,
}

impl JunctionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.routes.push(JunctionRoute {
            from: from.into(),
            guard: None,
            to: to.into(),
        });
        self
    }

    pub fn route_when(
        mut self,
        from: impl Into<String>,
        guard: Guard,
        to: impl Into<String>,
    ) -> Self {
        self.routes.push(JunctionRoute {
            from: from.into(),
            guard: Some(guard),
            to: to.into(),
        });
        self
    }

    pub fn routes(&self) -> &[JunctionRoute] {
        &self.routes
    }

    pub fn resolve(&self, from: &str, ctx: &Context) -> Option<&str> {
        self.routes
            .iter()
            .filter(|r| r.from == from)
            .find(|r| r.guard.as_ref().map_or(true, |g| g.check(ctx)))
            .map(|r| r.to.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn higher_priority_option_wins() {
        let choice = ChoiceState::new()
            .when_with_priority(Guard::always(), "Low", 1)
            .when_with_priority(Guard::always(), "High", 5);

        assert_eq!(choice.select(&Context::new()), Some("High"));
    }

    #[test]
    fn equal_priorities_keep_declaration_order() {
        let choice = ChoiceState::new()
            .when(Guard::always(), "First")
            .when(Guard::always(), "Second");

        assert_eq!(choice.select(&Context::new()), Some("First"));
    }

    #[test]
    fn otherwise_is_tried_last() {
        let choice = ChoiceState::new()
            .otherwise("Fallback")
            .when(Guard::flag("x"), "X");

        let ctx = Context::new();
        assert_eq!(choice.select(&ctx), Some("Fallback"));
        ctx.set("x", true);
        assert_eq!(choice.select(&ctx), Some("X"));
    }

    #[test]
    fn no_match_without_otherwise() {
        let choice = ChoiceState::new().when(Guard::flag("x"), "X");
        assert_eq!(choice.select(&Context::new()), None);
        assert_eq!(choice.targets().collect::<Vec<_>>(), vec!["X"]);
    }

    #[test]
    fn junction_resolves_by_source_and_guard() {
        let junction = JunctionState::new()
            .route_when("A", Guard::flag("fast"), "Express")
            .route("A", "Normal")
            .route("B", "Normal");

        let ctx = Context::new();
        assert_eq!(junction.resolve("A", &ctx), Some("Normal"));
        ctx.set("fast", true);
        assert_eq!(junction.resolve("A", &ctx), Some("Express"));
        assert_eq!(junction.resolve("B", &ctx), Some("Normal"));
        assert_eq!(junction.resolve("C", &ctx), None);
    }
}
