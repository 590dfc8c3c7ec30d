//! Template for declaring a statechart topology.

use crate::builder::error::BuildError;
use crate::builder::is_valid_identifier;
use crate::builder::state::StateBuilder;
use crate::builder::transition::TransitionBuilder;
use crate::core::{
    canonical_structure, default_generator, RegionId, RegionNode, Scope, SignatureGenerator,
    StateBehavior, StateId, StateNode, Structure, Topology,
};
use crate::effects::Transition;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

struct RegionDraft {
    owner: Option<StateId>,
    initial: String,
    history: bool,
    states: Vec<StateId>,
    resolved_initial: Option<StateId>,
}

#[derive(Clone, Copy, Debug)]
enum Frame {
    Region(RegionId),
    State(StateId),
}

/// Collects a topology from balanced begin/end calls.
///
/// `region`/`end_region` and `state`/`end_state` nest like brackets: regions
/// open at the root or inside a state, states open inside a region.
/// `transition` may be called at any point and takes the innermost open
/// region or state (or the root) as its scope. [`build`](Self::build) closes
/// the template and yields the shared, immutable [`Topology`].
///
/// # Example
///
/// ```rust
/// use statechart::builder::{StateMachineTemplate, TransitionBuilder};
///
/// let mut t = StateMachineTemplate::<&str, ()>::new();
/// t.region("Idle", false)?
///     .state("Idle")?
///     .end_state()?
///     .state("Running")?
///     .region("Slow", true)?
///     .state("Slow")?
///     .end_state()?
///     .state("Fast")?
///     .end_state()?
///     .transition(TransitionBuilder::new("SpeedUp").from("Slow").to("Fast").on("faster"))?
///     .end_region()?
///     .end_state()?
///     .transition(TransitionBuilder::new("Start").from("Idle").to("Running").on("start"))?
///     .end_region()?;
///
/// let topology = t.build()?;
/// assert_eq!(topology.history_max(), 1);
/// # Ok::<(), statechart::builder::BuildError>(())
/// ```
pub struct StateMachineTemplate<E, A> {
    states: Vec<StateNode>,
    behaviors: Vec<StateBehavior<E, A>>,
    regions: Vec<RegionDraft>,
    root_regions: Vec<RegionId>,
    names: HashMap<String, StateId>,
    transitions: Vec<Transition<E, A>>,
    scopes: Vec<Frame>,
    /// `None` until configured; `Some(None)` disables signatures.
    generator: Option<Option<SignatureGenerator>>,
}

impl<E, A> StateMachineTemplate<E, A> {
    pub fn new() -> Self {
        Self {
            states: Vec::new(),
            behaviors: Vec::new(),
            regions: Vec::new(),
            root_regions: Vec::new(),
            names: HashMap::new(),
            transitions: Vec::new(),
            scopes: Vec::new(),
            generator: None,
        }
    }

    /// Choose how the canonical structure text becomes a signature.
    ///
    /// Can be called once. `None` disables signatures: the topology gets an
    /// empty signature and resume skips the structure check.
    pub fn set_signature_generator(
        &mut self,
        generator: Option<SignatureGenerator>,
    ) -> Result<&mut Self, BuildError> {
        if self.generator.is_some() {
            return Err(BuildError::SignatureGeneratorAlreadySet);
        }
        self.generator = Some(generator);
        Ok(self)
    }

    /// True once every scope is closed and at least one region exists.
    pub fn is_closed(&self) -> bool {
        self.scopes.is_empty() && !self.root_regions.is_empty()
    }

    /// Open a region at the root or inside the open state.
    pub fn region(&mut self, initial_state: &str, has_history: bool) -> Result<&mut Self, BuildError> {
        check_name(initial_state)?;
        let owner = match self.scopes.last() {
            None => None,
            Some(Frame::State(state)) => Some(*state),
            Some(Frame::Region(_)) => return Err(BuildError::RegionInsideRegion),
        };

        let id = RegionId(self.regions.len());
        self.regions.push(RegionDraft {
            owner,
            initial: initial_state.to_string(),
            history: has_history,
            states: Vec::new(),
            resolved_initial: None,
        });
        match owner {
            Some(state) => self.states[state.0].regions.push(id),
            None => self.root_regions.push(id),
        }
        self.scopes.push(Frame::Region(id));
        Ok(self)
    }

    /// Close the innermost region; it must contain its initial state.
    pub fn end_region(&mut self) -> Result<&mut Self, BuildError> {
        let region = match self.scopes.last() {
            Some(Frame::Region(region)) => *region,
            Some(Frame::State(state)) => {
                return Err(BuildError::StateStillOpen(self.states[state.0].name.clone()))
            }
            None => return Err(BuildError::EndRegionWithoutRegion),
        };

        let draft = &self.regions[region.0];
        if draft.states.is_empty() {
            return Err(BuildError::EmptyRegion);
        }
        let initial = draft
            .states
            .iter()
            .copied()
            .find(|s| self.states[s.0].name == draft.initial)
            .ok_or_else(|| BuildError::UnknownInitialState(draft.initial.clone()))?;

        self.regions[region.0].resolved_initial = Some(initial);
        self.scopes.pop();
        Ok(self)
    }

    /// Open a state inside the innermost open region.
    pub fn state(&mut self, state: impl Into<StateBuilder<E, A>>) -> Result<&mut Self, BuildError> {
        let StateBuilder { name, behavior } = state.into();
        check_name(&name)?;
        let region = match self.scopes.last() {
            Some(Frame::Region(region)) => *region,
            _ => return Err(BuildError::StateOutsideRegion(name)),
        };
        if self.names.contains_key(&name) {
            return Err(BuildError::DuplicateState(name));
        }

        let id = StateId(self.states.len());
        self.names.insert(name.clone(), id);
        self.states.push(StateNode {
            name,
            parent: region,
            regions: Vec::new(),
        });
        self.behaviors.push(behavior);
        self.regions[region.0].states.push(id);
        self.scopes.push(Frame::State(id));
        Ok(self)
    }

    /// Close the innermost state.
    pub fn end_state(&mut self) -> Result<&mut Self, BuildError> {
        match self.scopes.last() {
            Some(Frame::State(_)) => {
                self.scopes.pop();
                Ok(self)
            }
            _ => Err(BuildError::EndStateWithoutState),
        }
    }

    /// Declare a transition scoped to the innermost open region or state.
    ///
    /// Every source and target must already be declared and lie below the
    /// scope. Endpoints are resolved and their region paths computed right
    /// here, so the scope check and endpoint conflicts are reported by this
    /// call. A transition into a state declared later therefore goes after
    /// that state, typically just before the enclosing `end_region` or
    /// `end_state`.
    pub fn transition(&mut self, builder: TransitionBuilder<E, A>) -> Result<&mut Self, BuildError> {
        let TransitionBuilder {
            name,
            sources,
            targets,
            trigger,
            guard,
            action,
        } = builder;

        check_name(&name)?;
        if self.transitions.iter().any(|t| t.name == name) {
            return Err(BuildError::DuplicateTransition(name));
        }
        if sources.is_empty() {
            return Err(BuildError::MissingSource(name));
        }
        if targets.is_empty() {
            return Err(BuildError::MissingTarget(name));
        }

        let scope = match self.scopes.last() {
            None => Scope::Root,
            Some(Frame::Region(region)) => Scope::Region(*region),
            Some(Frame::State(state)) => Scope::State(*state),
        };
        let sources = self.resolve_endpoints(&name, &sources, scope)?;
        let targets = self.resolve_endpoints(&name, &targets, scope)?;
        self.select_paths(&name, &sources)?;
        let target_selection = self.select_paths(&name, &targets)?;

        self.transitions.push(Transition {
            name,
            sources,
            targets,
            trigger,
            guard,
            action,
            scope,
            target_selection,
        });
        Ok(self)
    }

    fn resolve_endpoints(
        &self,
        transition: &str,
        names: &[String],
        scope: Scope,
    ) -> Result<Vec<StateId>, BuildError> {
        names
            .iter()
            .map(|name| {
                let state = self.names.get(name).copied().ok_or_else(|| BuildError::UnknownState {
                    transition: transition.to_string(),
                    state: name.clone(),
                })?;
                if !self.within_scope(state, scope) {
                    return Err(BuildError::OutOfScope {
                        transition: transition.to_string(),
                        state: name.clone(),
                    });
                }
                Ok(state)
            })
            .collect()
    }

    fn within_scope(&self, state: StateId, scope: Scope) -> bool {
        let mut current = state;
        loop {
            let region = self.states[current.0].parent;
            if scope == Scope::Region(region) {
                return true;
            }
            match self.regions[region.0].owner {
                Some(owner) if scope == Scope::State(owner) => return true,
                Some(owner) => current = owner,
                None => return scope == Scope::Root,
            }
        }
    }

    /// Per region, the state selected by the ancestor chains of `states`.
    fn select_paths(&self, transition: &str, states: &[StateId]) -> Result<Vec<Option<StateId>>, BuildError> {
        let mut selection = vec![None; self.regions.len()];
        for state in states {
            let mut current = *state;
            loop {
                let region = self.states[current.0].parent;
                match selection[region.0] {
                    None => selection[region.0] = Some(current),
                    Some(existing) if existing == current => break,
                    Some(existing) => {
                        return Err(BuildError::ConflictingEndpoints {
                            transition: transition.to_string(),
                            first: self.states[existing.0].name.clone(),
                            second: self.states[current.0].name.clone(),
                        })
                    }
                }
                match self.regions[region.0].owner {
                    Some(owner) => current = owner,
                    None => break,
                }
            }
        }
        Ok(selection)
    }

    /// Close the template and produce the topology.
    pub fn build(self) -> Result<Arc<Topology<E, A>>, BuildError> {
        if !self.scopes.is_empty() {
            return Err(BuildError::UnclosedScope(self.scopes.len()));
        }
        if self.root_regions.is_empty() {
            return Err(BuildError::NoRegions);
        }
        if self.states.len() > i16::MAX as usize {
            return Err(BuildError::TooManyStates(self.states.len()));
        }

        let mut history_slots = 0;
        let regions = self
            .regions
            .into_iter()
            .map(|draft| {
                let initial = draft
                    .resolved_initial
                    .ok_or_else(|| BuildError::UnknownInitialState(draft.initial.clone()))?;
                let history_slot = draft.history.then(|| {
                    history_slots += 1;
                    history_slots - 1
                });
                Ok(RegionNode {
                    owner: draft.owner,
                    states: draft.states,
                    initial,
                    history_slot,
                })
            })
            .collect::<Result<Vec<_>, BuildError>>()?;

        let mut structure = Structure::assemble(self.states, regions, self.root_regions);
        structure.canonical = canonical_structure(&structure, &self.transitions);
        structure.signature = match self.generator {
            None => default_generator()(&structure.canonical),
            Some(None) => String::new(),
            Some(Some(generator)) => generator(&structure.canonical),
        };
        tracing::debug!(
            states = structure.states.len(),
            regions = structure.regions.len(),
            transitions = self.transitions.len(),
            signature = %structure.signature,
            "topology built"
        );

        Ok(Arc::new(Topology {
            structure: Arc::new(structure),
            behaviors: self.behaviors,
            transitions: self.transitions,
        }))
    }
}

impl<E, A> Default for StateMachineTemplate<E, A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E, A> fmt::Debug for StateMachineTemplate<E, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateMachineTemplate")
            .field("states", &self.states.len())
            .field("regions", &self.regions.len())
            .field("transitions", &self.transitions.len())
            .field("open_scopes", &self.scopes)
            .finish()
    }
}

fn check_name(name: &str) -> Result<(), BuildError> {
    if name.is_empty() {
        return Err(BuildError::MissingName);
    }
    if !is_valid_identifier(name) {
        return Err(BuildError::InvalidIdentifier(name.to_string()));
    }
    Ok(())
}
