//! Builder for constructing transitions.

use crate::core::{Action, ActionResult, Guard};
use crate::effects::StateMachine;

/// Fluent description of a transition, passed to
/// [`StateMachineTemplate::transition`](crate::builder::StateMachineTemplate::transition).
///
/// Call `from` once per source state (several sources form a join) and `to`
/// once per target state (several targets form a fork). Without `on` the
/// transition is a completion transition.
pub struct TransitionBuilder<E, A> {
    pub(crate) name: String,
    pub(crate) sources: Vec<String>,
    pub(crate) targets: Vec<String>,
    pub(crate) trigger: Option<E>,
    pub(crate) guard: Option<Guard<E, A>>,
    pub(crate) action: Option<Action<E, A>>,
}

impl<E, A> TransitionBuilder<E, A> {
    /// Create a new transition builder.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sources: Vec::new(),
            targets: Vec::new(),
            trigger: None,
            guard: None,
            action: None,
        }
    }

    /// Add a source state (at least one required).
    pub fn from(mut self, state: impl Into<String>) -> Self {
        self.sources.push(state.into());
        self
    }

    /// Add a target state (at least one required).
    pub fn to(mut self, state: impl Into<String>) -> Self {
        self.targets.push(state.into());
        self
    }

    /// Set the trigger event.
    pub fn on(mut self, event: E) -> Self {
        self.trigger = Some(event);
        self
    }

    /// Add a guard predicate (optional).
    pub fn guard(mut self, guard: Guard<E, A>) -> Self {
        self.guard = Some(guard);
        self
    }

    /// Add a guard using a closure (optional).
    pub fn when<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&StateMachine<E, A>, Option<&E>, Option<&A>) -> bool + Send + Sync + 'static,
    {
        self.guard = Some(Guard::new(predicate));
        self
    }

    /// Set the action run between exits and entries (optional).
    pub fn action<F>(mut self, action: F) -> Self
    where
        F: Fn(&StateMachine<E, A>, Option<&E>, Option<&A>) -> ActionResult + Send + Sync + 'static,
    {
        self.action = Some(Action::new(action));
        self
    }
}
