//! Transitions and dispatch errors.

use crate::core::{Action, ActionError, ActionKind, Guard, Scope, StateId};
use std::fmt;

/// Errors surfaced by `startup`, `send_trigger_event` and `finish`.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("State machine is already started")]
    AlreadyStarted,

    #[error("{kind} action of '{owner}' failed: {source}")]
    ActionFailed {
        owner: String,
        kind: ActionKind,
        #[source]
        source: ActionError,
    },
}

impl DispatchError {
    pub(crate) fn action(owner: &str, kind: ActionKind, source: ActionError) -> Self {
        Self::ActionFailed {
            owner: owner.to_string(),
            kind,
            source,
        }
    }

    /// The application error behind a failed callback.
    pub fn action_error(&self) -> Option<&ActionError> {
        match self {
            Self::ActionFailed { source, .. } => Some(source),
            Self::AlreadyStarted => None,
        }
    }
}

/// A transition between sets of states.
///
/// All `sources` must be active at once for the transition to be eligible
/// (a join across orthogonal regions); all `targets` are entered together
/// (a fork). A transition without trigger is a completion transition, tested
/// after every micro-step without an external event.
pub struct Transition<E, A> {
    pub(crate) name: String,
    pub(crate) sources: Vec<StateId>,
    pub(crate) targets: Vec<StateId>,
    pub(crate) trigger: Option<E>,
    pub(crate) guard: Option<Guard<E, A>>,
    pub(crate) action: Option<Action<E, A>>,
    pub(crate) scope: Scope,
    /// Per region: the state the targets force, if any.
    pub(crate) target_selection: Vec<Option<StateId>>,
}

impl<E, A> Transition<E, A> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sources(&self) -> &[StateId] {
        &self.sources
    }

    pub fn targets(&self) -> &[StateId] {
        &self.targets
    }

    pub fn trigger(&self) -> Option<&E> {
        self.trigger.as_ref()
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    pub fn is_completion(&self) -> bool {
        self.trigger.is_none()
    }

    pub fn has_guard(&self) -> bool {
        self.guard.is_some()
    }

    pub(crate) fn target_selection(&self) -> &[Option<StateId>] {
        &self.target_selection
    }
}

impl<E: PartialEq, A> Transition<E, A> {
    /// Whether this transition reacts to `event` (`None` for completion).
    pub fn is_triggered_by(&self, event: Option<&E>) -> bool {
        self.trigger.as_ref() == event
    }
}

impl<E: fmt::Debug, A> fmt::Debug for Transition<E, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transition")
            .field("name", &self.name)
            .field("sources", &self.sources)
            .field("targets", &self.targets)
            .field("trigger", &self.trigger)
            .field("scope", &self.scope)
            .field("guard", &self.guard.is_some())
            .field("action", &self.action.is_some())
            .finish()
    }
}
