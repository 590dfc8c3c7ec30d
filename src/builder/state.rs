//! Builder for a state's name and callbacks.

use crate::core::{Action, ActionResult, DoAction, StateBehavior};
use crate::effects::StateMachine;

/// Fluent description of one state, passed to
/// [`StateMachineTemplate::state`](crate::builder::StateMachineTemplate::state).
///
/// A plain `&str` converts into a state without callbacks.
pub struct StateBuilder<E, A> {
    pub(crate) name: String,
    pub(crate) behavior: StateBehavior<E, A>,
}

impl<E, A> StateBuilder<E, A> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            behavior: StateBehavior::default(),
        }
    }

    /// Run when the state becomes active.
    pub fn on_entry<F>(mut self, action: F) -> Self
    where
        F: Fn(&StateMachine<E, A>, Option<&E>, Option<&A>) -> ActionResult + Send + Sync + 'static,
    {
        self.behavior.entry = Some(Action::new(action));
        self
    }

    /// Run when the state stops being active.
    pub fn on_exit<F>(mut self, action: F) -> Self
    where
        F: Fn(&StateMachine<E, A>, Option<&E>, Option<&A>) -> ActionResult + Send + Sync + 'static,
    {
        self.behavior.exit = Some(Action::new(action));
        self
    }

    /// Run after every micro-step while the state is active, when the
    /// machine has do-actions enabled.
    pub fn on_do<F>(mut self, action: F) -> Self
    where
        F: Fn(&StateMachine<E, A>) -> ActionResult + Send + Sync + 'static,
    {
        self.behavior.do_action = Some(DoAction::new(action));
        self
    }
}

impl<E, A> From<&str> for StateBuilder<E, A> {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl<E, A> From<String> for StateBuilder<E, A> {
    fn from(name: String) -> Self {
        Self::new(name)
    }
}
