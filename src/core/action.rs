//! Entry, exit, do and transition actions.
//!
//! Actions are the application's side effects. The engine runs them in a
//! fixed order and hands any error they return back to the caller untouched.

use crate::effects::StateMachine;
use std::fmt;
use std::sync::Arc;

/// Error returned by user callbacks.
pub type ActionError = Box<dyn std::error::Error + Send + Sync>;

/// Result returned by user callbacks.
pub type ActionResult = Result<(), ActionError>;

type ActionFn<E, A> =
    dyn Fn(&StateMachine<E, A>, Option<&E>, Option<&A>) -> ActionResult + Send + Sync;
type DoActionFn<E, A> = dyn Fn(&StateMachine<E, A>) -> ActionResult + Send + Sync;

/// Entry, exit or transition action.
pub struct Action<E, A> {
    run: Arc<ActionFn<E, A>>,
}

impl<E, A> Action<E, A> {
    pub fn new<F>(action: F) -> Self
    where
        F: Fn(&StateMachine<E, A>, Option<&E>, Option<&A>) -> ActionResult + Send + Sync + 'static,
    {
        Self {
            run: Arc::new(action),
        }
    }

    pub fn run(
        &self,
        machine: &StateMachine<E, A>,
        event: Option<&E>,
        args: Option<&A>,
    ) -> ActionResult {
        (self.run)(machine, event, args)
    }
}

impl<E, A> Clone for Action<E, A> {
    fn clone(&self) -> Self {
        Self {
            run: Arc::clone(&self.run),
        }
    }
}

impl<E, A> fmt::Debug for Action<E, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Action")
    }
}

/// Continuous action, run for every active state after each micro-step.
pub struct DoAction<E, A> {
    run: Arc<DoActionFn<E, A>>,
}

impl<E, A> DoAction<E, A> {
    pub fn new<F>(action: F) -> Self
    where
        F: Fn(&StateMachine<E, A>) -> ActionResult + Send + Sync + 'static,
    {
        Self {
            run: Arc::new(action),
        }
    }

    pub fn run(&self, machine: &StateMachine<E, A>) -> ActionResult {
        (self.run)(machine)
    }
}

impl<E, A> Clone for DoAction<E, A> {
    fn clone(&self) -> Self {
        Self {
            run: Arc::clone(&self.run),
        }
    }
}

impl<E, A> fmt::Debug for DoAction<E, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DoAction")
    }
}

/// Callbacks attached to one state.
pub struct StateBehavior<E, A> {
    pub(crate) entry: Option<Action<E, A>>,
    pub(crate) exit: Option<Action<E, A>>,
    pub(crate) do_action: Option<DoAction<E, A>>,
}

impl<E, A> Default for StateBehavior<E, A> {
    fn default() -> Self {
        Self {
            entry: None,
            exit: None,
            do_action: None,
        }
    }
}

impl<E, A> Clone for StateBehavior<E, A> {
    fn clone(&self) -> Self {
        Self {
            entry: self.entry.clone(),
            exit: self.exit.clone(),
            do_action: self.do_action.clone(),
        }
    }
}

impl<E, A> fmt::Debug for StateBehavior<E, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateBehavior")
            .field("entry", &self.entry.is_some())
            .field("exit", &self.exit.is_some())
            .field("do_action", &self.do_action.is_some())
            .finish()
    }
}

/// Which callback failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ActionKind {
    Entry,
    Exit,
    Do,
    Transition,
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Entry => "entry",
            Self::Exit => "exit",
            Self::Do => "do",
            Self::Transition => "transition",
        };
        f.write_str(name)
    }
}
