//! Per-instance trace hooks.

use crate::core::StateConfiguration;
use crate::effects::{StateMachine, Transition};

pub type StateChangeHook<E, A> = Box<
    dyn Fn(&StateMachine<E, A>, &StateConfiguration, &StateConfiguration, Option<&Transition<E, A>>)
        + Send,
>;
pub type TestTransitionHook<E, A> =
    Box<dyn Fn(&StateMachine<E, A>, &Transition<E, A>, Option<&E>, Option<&A>) + Send>;
pub type DispatchHook<E, A> = Box<dyn Fn(&StateMachine<E, A>, Option<&E>, Option<&A>) + Send>;

/// Optional observers of a machine's dispatch loop.
pub(crate) struct TraceHooks<E, A> {
    pub(crate) state_change: Option<StateChangeHook<E, A>>,
    pub(crate) test_transition: Option<TestTransitionHook<E, A>>,
    pub(crate) dispatch_trigger_event: Option<DispatchHook<E, A>>,
}

impl<E, A> Default for TraceHooks<E, A> {
    fn default() -> Self {
        Self {
            state_change: None,
            test_transition: None,
            dispatch_trigger_event: None,
        }
    }
}

impl<E, A> TraceHooks<E, A> {
    pub(crate) fn state_change(
        &self,
        machine: &StateMachine<E, A>,
        from: &StateConfiguration,
        to: &StateConfiguration,
        transition: Option<&Transition<E, A>>,
    ) {
        if let Some(hook) = &self.state_change {
            hook(machine, from, to, transition);
        }
    }

    pub(crate) fn test_transition(
        &self,
        machine: &StateMachine<E, A>,
        transition: &Transition<E, A>,
        event: Option<&E>,
        args: Option<&A>,
    ) {
        if let Some(hook) = &self.test_transition {
            hook(machine, transition, event, args);
        }
    }

    pub(crate) fn dispatch_trigger_event(
        &self,
        machine: &StateMachine<E, A>,
        event: Option<&E>,
        args: Option<&A>,
    ) {
        if let Some(hook) = &self.dispatch_trigger_event {
            hook(machine, event, args);
        }
    }
}
