//! State machine runtime and the run-to-completion dispatcher.

use crate::core::{ActionKind, RegionId, StateConfiguration, StateId, Topology};
use crate::effects::trace::TraceHooks;
use crate::effects::transition::{DispatchError, Transition};
use serde::{Deserialize, Serialize};
use std::cell::{Cell, RefCell};
use std::fmt;
use std::sync::Arc;

/// Per-instance runtime options.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MachineOptions {
    /// Run the do-action of every active state after each micro-step.
    pub use_do_actions: bool,
}

/// Mutable bookkeeping of one machine.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Runtime {
    /// Per region: the active state, if any.
    pub(crate) active: Vec<Option<StateId>>,
    /// Per history slot: the state that was active when the region was left.
    pub(crate) history: Vec<Option<StateId>>,
}

/// Holds the busy flag for the duration of one public call.
pub(crate) struct DispatchGuard<'a> {
    busy: &'a Cell<bool>,
}

impl<'a> DispatchGuard<'a> {
    fn acquire(busy: &'a Cell<bool>) -> Option<Self> {
        if busy.replace(true) {
            None
        } else {
            Some(Self { busy })
        }
    }
}

impl Drop for DispatchGuard<'_> {
    fn drop(&mut self) {
        self.busy.set(false);
    }
}

/// A running instance of a [`Topology`].
///
/// The machine starts in Nirvana (nothing active). [`startup`](Self::startup)
/// enters the default configuration, [`send_trigger_event`](Self::send_trigger_event)
/// runs one run-to-completion step and [`finish`](Self::finish) exits back to
/// Nirvana. Callbacks receive `&StateMachine` and may query it; calls back
/// into `startup`, `send_trigger_event` or `finish` while the machine is
/// dispatching are ignored.
///
/// # Example
///
/// ```rust
/// use statechart::builder::{StateMachineTemplate, TransitionBuilder};
/// use statechart::effects::StateMachine;
///
/// let mut template = StateMachineTemplate::<&str, ()>::new();
/// template.region("Off", false).unwrap();
/// template.state("Off").unwrap();
/// template.end_state().unwrap();
/// template.state("On").unwrap();
/// template.end_state().unwrap();
/// template
///     .transition(TransitionBuilder::new("SwitchOn").from("Off").to("On").on("press"))
///     .unwrap();
/// template.end_region().unwrap();
///
/// let machine = StateMachine::new(template.build().unwrap());
/// machine.startup().unwrap();
/// machine.send_trigger_event("press", ()).unwrap();
/// assert_eq!(machine.configuration().to_string(), "On");
/// ```
pub struct StateMachine<E, A> {
    topology: Arc<Topology<E, A>>,
    runtime: RefCell<Runtime>,
    busy: Cell<bool>,
    options: MachineOptions,
    hooks: TraceHooks<E, A>,
}

impl<E, A> StateMachine<E, A> {
    /// Create a machine in Nirvana with default options.
    pub fn new(topology: Arc<Topology<E, A>>) -> Self {
        Self::with_options(topology, MachineOptions::default())
    }

    pub fn with_options(topology: Arc<Topology<E, A>>, options: MachineOptions) -> Self {
        let structure = topology.structure();
        let runtime = Runtime {
            active: vec![None; structure.regions().len()],
            history: vec![None; structure.history_max()],
        };
        Self {
            topology,
            runtime: RefCell::new(runtime),
            busy: Cell::new(false),
            options,
            hooks: TraceHooks::default(),
        }
    }

    pub fn topology(&self) -> &Arc<Topology<E, A>> {
        &self.topology
    }

    pub fn options(&self) -> &MachineOptions {
        &self.options
    }

    pub fn set_use_do_actions(&mut self, enabled: bool) {
        self.options.use_do_actions = enabled;
    }

    /// Observe every configuration change: `(machine, from, to, transition)`.
    /// `transition` is `None` for startup, finish and resume.
    pub fn set_trace_state_change<F>(&mut self, hook: F)
    where
        F: Fn(&StateMachine<E, A>, &StateConfiguration, &StateConfiguration, Option<&Transition<E, A>>)
            + Send
            + 'static,
    {
        self.hooks.state_change = Some(Box::new(hook));
    }

    /// Observe every transition whose trigger and sources match, before its
    /// guard is evaluated.
    pub fn set_trace_test_transition<F>(&mut self, hook: F)
    where
        F: Fn(&StateMachine<E, A>, &Transition<E, A>, Option<&E>, Option<&A>) + Send + 'static,
    {
        self.hooks.test_transition = Some(Box::new(hook));
    }

    /// Observe the start of every transition search.
    pub fn set_trace_dispatch_trigger_event<F>(&mut self, hook: F)
    where
        F: Fn(&StateMachine<E, A>, Option<&E>, Option<&A>) + Send + 'static,
    {
        self.hooks.dispatch_trigger_event = Some(Box::new(hook));
    }

    /// Snapshot of the active configuration.
    pub fn configuration(&self) -> StateConfiguration {
        StateConfiguration::from_active(self.topology.structure(), &self.runtime.borrow().active)
    }

    /// True when no state is active.
    pub fn is_nirvana(&self) -> bool {
        self.runtime.borrow().active.iter().all(Option::is_none)
    }

    /// Whether the named state is active. Unknown names are never active.
    pub fn is_active(&self, name: &str) -> bool {
        self.topology
            .find_state(name)
            .is_some_and(|state| self.is_state_active(state))
    }

    pub fn is_state_active(&self, state: StateId) -> bool {
        let parent = self.topology.structure().state(state).parent();
        self.runtime.borrow().active[parent.index()] == Some(state)
    }

    /// True while `startup`, `send_trigger_event`, `finish` or a resume runs.
    pub fn is_dispatching(&self) -> bool {
        self.busy.get()
    }

    /// State remembered by a history region, if it was left before.
    pub fn history_of(&self, region: RegionId) -> Option<StateId> {
        let slot = self.topology.structure().region(region).history_slot()?;
        self.runtime.borrow().history[slot]
    }

    pub(crate) fn begin_dispatch(&self) -> Option<DispatchGuard<'_>> {
        DispatchGuard::acquire(&self.busy)
    }

    pub(crate) fn runtime_snapshot(&self) -> Runtime {
        self.runtime.borrow().clone()
    }
}

impl<E: PartialEq + fmt::Debug, A> StateMachine<E, A> {
    /// Enter the default configuration from Nirvana.
    ///
    /// Regions enter their history state when they have one, their initial
    /// state otherwise. Entry actions run outer to inner, regions in
    /// declaration order, followed by do-actions when enabled.
    pub fn startup(&self) -> Result<(), DispatchError> {
        let Some(_guard) = self.begin_dispatch() else {
            tracing::trace!("ignoring reentrant startup");
            return Ok(());
        };
        if !self.is_nirvana() {
            return Err(DispatchError::AlreadyStarted);
        }

        let before = self.configuration();
        let structure = Arc::clone(self.topology.structure());
        for region in structure.root_regions() {
            self.enter_region(*region, &[], None, None)?;
        }
        if self.options.use_do_actions {
            self.run_do_actions()?;
        }
        let after = self.configuration();
        tracing::debug!(configuration = %after, "state machine started");
        self.hooks.state_change(self, &before, &after, None);
        Ok(())
    }

    /// Dispatch `event` and run completion transitions until none is eligible.
    ///
    /// Reentrant calls made from callbacks of this machine are dropped.
    pub fn send_trigger_event(&self, event: E, args: A) -> Result<(), DispatchError> {
        let Some(_guard) = self.begin_dispatch() else {
            tracing::trace!(?event, "ignoring reentrant trigger event");
            return Ok(());
        };
        self.run_to_completion(Some(&event), Some(&args))
    }

    /// Exit every active state, innermost first, and return to Nirvana.
    pub fn finish(&self) -> Result<(), DispatchError> {
        let Some(_guard) = self.begin_dispatch() else {
            tracing::trace!("ignoring reentrant finish");
            return Ok(());
        };
        if self.is_nirvana() {
            return Ok(());
        }

        let before = self.configuration();
        let structure = Arc::clone(self.topology.structure());
        for region in structure.root_regions() {
            self.exit_region(*region, None, None)?;
        }
        let after = self.configuration();
        tracing::debug!(from = %before, "state machine finished");
        self.hooks.state_change(self, &before, &after, None);
        Ok(())
    }

    fn run_to_completion(&self, event: Option<&E>, args: Option<&A>) -> Result<(), DispatchError> {
        let (mut event, mut args) = (event, args);
        loop {
            self.hooks.dispatch_trigger_event(self, event, args);
            let Some(transition) = self.select_transition(event, args) else {
                return Ok(());
            };
            self.fire(transition, event, args)?;
            if self.options.use_do_actions {
                self.run_do_actions()?;
            }
            event = None;
            args = None;
        }
    }

    /// First transition, in declaration order, whose trigger matches, whose
    /// sources are all active and whose guard passes.
    fn select_transition(&self, event: Option<&E>, args: Option<&A>) -> Option<&Transition<E, A>> {
        self.topology.transitions().iter().find(|transition| {
            if !transition.is_triggered_by(event) {
                return false;
            }
            if !transition.sources().iter().all(|s| self.is_state_active(*s)) {
                return false;
            }
            tracing::trace!(transition = transition.name(), "testing transition");
            self.hooks.test_transition(self, transition, event, args);
            transition
                .guard
                .as_ref()
                .is_none_or(|guard| guard.check(self, event, args))
        })
    }

    fn fire(
        &self,
        transition: &Transition<E, A>,
        event: Option<&E>,
        args: Option<&A>,
    ) -> Result<(), DispatchError> {
        let before = self.configuration();
        let structure = Arc::clone(self.topology.structure());
        let boundary = structure.boundary(transition.scope());

        for region in boundary {
            self.exit_region(*region, event, args)?;
        }
        if let Some(action) = &transition.action {
            action
                .run(self, event, args)
                .map_err(|e| DispatchError::action(transition.name(), ActionKind::Transition, e))?;
        }
        for region in boundary {
            self.enter_region(*region, transition.target_selection(), event, args)?;
        }

        let after = self.configuration();
        tracing::debug!(
            transition = transition.name(),
            from = %before,
            to = %after,
            "transition fired"
        );
        self.hooks.state_change(self, &before, &after, Some(transition));
        Ok(())
    }

    fn exit_region(
        &self,
        region: RegionId,
        event: Option<&E>,
        args: Option<&A>,
    ) -> Result<(), DispatchError> {
        let active = self.runtime.borrow().active[region.index()];
        match active {
            Some(state) => self.exit_state(state, event, args),
            None => Ok(()),
        }
    }

    /// Exit `state` after its substates. A state whose exit action fails
    /// stays active and is exited again by the next transition.
    fn exit_state(
        &self,
        state: StateId,
        event: Option<&E>,
        args: Option<&A>,
    ) -> Result<(), DispatchError> {
        let structure = self.topology.structure();
        let node = structure.state(state);
        for region in node.regions() {
            self.exit_region(*region, event, args)?;
        }
        if let Some(exit) = &self.topology.behavior(state).exit {
            exit.run(self, event, args)
                .map_err(|e| DispatchError::action(node.name(), ActionKind::Exit, e))?;
        }

        let parent = structure.region(node.parent());
        let mut runtime = self.runtime.borrow_mut();
        runtime.active[node.parent().index()] = None;
        if let Some(slot) = parent.history_slot() {
            runtime.history[slot] = Some(state);
        }
        Ok(())
    }

    /// Enter `region`: a forced state wins over history, history over the
    /// initial state.
    pub(crate) fn enter_region(
        &self,
        region: RegionId,
        forced: &[Option<StateId>],
        event: Option<&E>,
        args: Option<&A>,
    ) -> Result<(), DispatchError> {
        let node = self.topology.structure().region(region);
        let remembered = node
            .history_slot()
            .and_then(|slot| self.runtime.borrow().history[slot]);
        let target = forced
            .get(region.index())
            .copied()
            .flatten()
            .or(remembered)
            .unwrap_or(node.initial());
        self.enter_state(target, forced, event, args)
    }

    fn enter_state(
        &self,
        state: StateId,
        forced: &[Option<StateId>],
        event: Option<&E>,
        args: Option<&A>,
    ) -> Result<(), DispatchError> {
        let node = self.topology.structure().state(state);
        if let Some(entry) = &self.topology.behavior(state).entry {
            entry
                .run(self, event, args)
                .map_err(|e| DispatchError::action(node.name(), ActionKind::Entry, e))?;
        }
        self.runtime.borrow_mut().active[node.parent().index()] = Some(state);
        for region in node.regions() {
            self.enter_region(*region, forced, event, args)?;
        }
        Ok(())
    }

    /// Run do-actions of the active states, outer to inner.
    pub(crate) fn run_do_actions(&self) -> Result<(), DispatchError> {
        for state in self.configuration().active_states() {
            if let Some(action) = &self.topology.behavior(state).do_action {
                action.run(self).map_err(|e| {
                    DispatchError::action(self.topology.structure().state_name(state), ActionKind::Do, e)
                })?;
            }
        }
        Ok(())
    }

    /// Adopt restored bookkeeping. The caller holds the dispatch guard and
    /// has checked that the machine is in Nirvana.
    pub(crate) fn adopt(&self, restored: Runtime, execute_entry_actions: bool) -> Result<(), DispatchError> {
        if !execute_entry_actions {
            *self.runtime.borrow_mut() = restored;
            tracing::debug!(configuration = %self.configuration(), "state machine resumed silently");
            return Ok(());
        }

        self.runtime.borrow_mut().history = restored.history;
        let before = self.configuration();
        let structure = Arc::clone(self.topology.structure());
        for region in structure.root_regions() {
            if restored.active[region.index()].is_some() {
                self.enter_region(*region, &restored.active, None, None)?;
            }
        }
        if self.options.use_do_actions {
            self.run_do_actions()?;
        }
        let after = self.configuration();
        tracing::debug!(configuration = %after, "state machine resumed");
        self.hooks.state_change(self, &before, &after, None);
        Ok(())
    }
}

impl<E, A> fmt::Debug for StateMachine<E, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateMachine")
            .field("configuration", &self.configuration())
            .field("options", &self.options)
            .field("dispatching", &self.busy.get())
            .finish()
    }
}
