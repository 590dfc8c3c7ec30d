//! Guard predicates for controlling state transitions.
//!
//! Guards are boolean functions that decide whether an otherwise eligible
//! transition may fire. They see the machine, the event being dispatched and
//! its arguments; both are `None` while completion transitions are evaluated.

use crate::effects::StateMachine;
use std::fmt;
use std::sync::Arc;

type Predicate<E, A> = dyn Fn(&StateMachine<E, A>, Option<&E>, Option<&A>) -> bool + Send + Sync;

/// Predicate that determines if a transition can fire.
///
/// # Example
///
/// ```rust
/// use statechart::core::Guard;
///
/// let only_urgent: Guard<&str, u32> = Guard::new(|_machine, _event, args| {
///     args.is_some_and(|priority| *priority > 5)
/// });
/// ```
pub struct Guard<E, A> {
    predicate: Arc<Predicate<E, A>>,
}

impl<E, A> Guard<E, A> {
    /// Create a guard from a predicate.
    ///
    /// Guards should not have observable side effects: they are evaluated in
    /// declaration order and a guard may run several times per dispatch.
    pub fn new<F>(predicate: F) -> Self
    where
        F: Fn(&StateMachine<E, A>, Option<&E>, Option<&A>) -> bool + Send + Sync + 'static,
    {
        Guard {
            predicate: Arc::new(predicate),
        }
    }

    /// Evaluate the guard.
    pub fn check(&self, machine: &StateMachine<E, A>, event: Option<&E>, args: Option<&A>) -> bool {
        (self.predicate)(machine, event, args)
    }
}

impl<E, A> Clone for Guard<E, A> {
    fn clone(&self) -> Self {
        Self {
            predicate: Arc::clone(&self.predicate),
        }
    }
}

impl<E, A> fmt::Debug for Guard<E, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Guard")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::StateMachineTemplate;
    use crate::effects::StateMachine;

    fn machine() -> StateMachine<&'static str, u32> {
        let mut template = StateMachineTemplate::new();
        template.region("Idle", false).unwrap();
        template.state("Idle").unwrap();
        template.end_state().unwrap();
        template.end_region().unwrap();
        StateMachine::new(template.build().unwrap())
    }

    #[test]
    fn guard_sees_event_and_args() {
        let machine = machine();
        let guard = Guard::new(|_m, event: Option<&&str>, args: Option<&u32>| {
            event == Some(&"Go") && args.is_some_and(|a| *a > 2)
        });

        assert!(guard.check(&machine, Some(&"Go"), Some(&3)));
        assert!(!guard.check(&machine, Some(&"Go"), Some(&1)));
        assert!(!guard.check(&machine, Some(&"Stop"), Some(&3)));
        assert!(!guard.check(&machine, None, None));
    }

    #[test]
    fn guard_can_inspect_machine() {
        let machine = machine();
        let guard = Guard::new(|m: &StateMachine<&str, u32>, _e, _a| m.is_active("Idle"));

        assert!(!guard.check(&machine, None, None));
        machine.startup().unwrap();
        assert!(guard.check(&machine, None, None));
    }

    #[test]
    fn guard_is_deterministic() {
        let machine = machine();
        let guard = Guard::new(|_m, _e, args: Option<&u32>| args.copied().unwrap_or(0) % 2 == 0);

        let first = guard.check(&machine, None, Some(&4));
        let second = guard.check(&machine, None, Some(&4));
        assert_eq!(first, second);
    }

    #[test]
    fn cloned_guard_shares_predicate() {
        let machine = machine();
        let guard = Guard::new(|_m, _e, _a| true);
        let cloned = guard.clone();

        assert!(cloned.check(&machine, None, None));
    }
}
