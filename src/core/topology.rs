//! Immutable structure of a hierarchical state machine.
//!
//! States and regions live in flat arenas and refer to each other by index.
//! A [`Structure`] holds the callback-free part of the tree so that
//! configurations can reference it without caring about event or argument
//! types. A [`Topology`] adds the state behaviors and the transition table.

use crate::core::action::StateBehavior;
use crate::core::configuration::{ConfigurationError, StateConfiguration};
use crate::effects::Transition;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Index of a state inside its topology.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StateId(pub(crate) usize);

impl StateId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for StateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "state#{}", self.0)
    }
}

/// Index of a region inside its topology.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RegionId(pub(crate) usize);

impl RegionId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for RegionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "region#{}", self.0)
    }
}

/// A named node of the state tree.
#[derive(Clone, Debug)]
pub struct StateNode {
    pub(crate) name: String,
    pub(crate) parent: RegionId,
    pub(crate) regions: Vec<RegionId>,
}

impl StateNode {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The region this state is one of the alternatives of.
    pub fn parent(&self) -> RegionId {
        self.parent
    }

    /// Owned orthogonal regions in declaration order.
    pub fn regions(&self) -> &[RegionId] {
        &self.regions
    }

    pub fn is_composite(&self) -> bool {
        !self.regions.is_empty()
    }
}

/// A group of mutually exclusive sibling states.
#[derive(Clone, Debug)]
pub struct RegionNode {
    pub(crate) owner: Option<StateId>,
    pub(crate) states: Vec<StateId>,
    pub(crate) initial: StateId,
    pub(crate) history_slot: Option<usize>,
}

impl RegionNode {
    /// Owning state, or `None` for a root region.
    pub fn owner(&self) -> Option<StateId> {
        self.owner
    }

    pub fn states(&self) -> &[StateId] {
        &self.states
    }

    pub fn initial(&self) -> StateId {
        self.initial
    }

    pub fn has_history(&self) -> bool {
        self.history_slot.is_some()
    }

    /// Index into the per-machine history table, if this region remembers.
    pub fn history_slot(&self) -> Option<usize> {
        self.history_slot
    }

    /// Position of `state` among this region's states.
    pub fn local_index(&self, state: StateId) -> Option<usize> {
        self.states.iter().position(|s| *s == state)
    }
}

/// Where a transition was declared; bounds the states it exits and enters.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Scope {
    /// Declared outside of any region: every root region is left.
    Root,
    /// Declared directly inside a region: that region's active state is left.
    Region(RegionId),
    /// Declared inside a state: everything below the state is left, the state
    /// itself stays active.
    State(StateId),
}

/// Callback-free state tree plus derived metrics.
#[derive(Debug)]
pub struct Structure {
    pub(crate) states: Vec<StateNode>,
    pub(crate) regions: Vec<RegionNode>,
    pub(crate) root_regions: Vec<RegionId>,
    pub(crate) by_name: HashMap<String, StateId>,
    pub(crate) configuration_max: usize,
    pub(crate) concurrency_degree: usize,
    pub(crate) history_max: usize,
    pub(crate) canonical: String,
    pub(crate) signature: String,
}

impl Structure {
    /// Index the tree and compute the derived metrics. Canonical text and
    /// signature are filled in by the caller once transitions are known.
    pub(crate) fn assemble(
        states: Vec<StateNode>,
        regions: Vec<RegionNode>,
        root_regions: Vec<RegionId>,
    ) -> Self {
        let by_name = states
            .iter()
            .enumerate()
            .map(|(index, node)| (node.name.clone(), StateId(index)))
            .collect();
        let history_max = regions.iter().filter(|r| r.has_history()).count();

        let mut structure = Self {
            states,
            regions,
            root_regions,
            by_name,
            configuration_max: 0,
            concurrency_degree: 0,
            history_max,
            canonical: String::new(),
            signature: String::new(),
        };

        structure.configuration_max = structure
            .root_regions
            .iter()
            .map(|r| structure.region_leaf_max(*r))
            .sum();
        structure.concurrency_degree = structure
            .states
            .iter()
            .map(|s| s.regions.len())
            .chain(std::iter::once(structure.root_regions.len()))
            .max()
            .unwrap_or(0);

        structure
    }

    fn region_leaf_max(&self, region: RegionId) -> usize {
        self.region(region)
            .states
            .iter()
            .map(|s| self.state_leaf_max(*s))
            .max()
            .unwrap_or(0)
    }

    fn state_leaf_max(&self, state: StateId) -> usize {
        let node = self.state(state);
        if node.regions.is_empty() {
            1
        } else {
            node.regions.iter().map(|r| self.region_leaf_max(*r)).sum()
        }
    }

    pub fn state(&self, id: StateId) -> &StateNode {
        &self.states[id.0]
    }

    pub fn region(&self, id: RegionId) -> &RegionNode {
        &self.regions[id.0]
    }

    pub fn states(&self) -> &[StateNode] {
        &self.states
    }

    pub fn regions(&self) -> &[RegionNode] {
        &self.regions
    }

    pub fn root_regions(&self) -> &[RegionId] {
        &self.root_regions
    }

    pub fn find_state(&self, name: &str) -> Option<StateId> {
        self.by_name.get(name).copied()
    }

    pub fn state_name(&self, id: StateId) -> &str {
        &self.states[id.0].name
    }

    /// Regions whose contents a transition declared in `scope` exits and
    /// re-enters.
    pub fn boundary<'a>(&'a self, scope: &'a Scope) -> &'a [RegionId] {
        match scope {
            Scope::Root => &self.root_regions,
            Scope::Region(region) => std::slice::from_ref(region),
            Scope::State(state) => &self.state(*state).regions,
        }
    }

    /// Maximum number of simultaneously active leaf states.
    pub fn state_configuration_max(&self) -> usize {
        self.configuration_max
    }

    /// Largest number of orthogonal regions owned by one state (or the root).
    pub fn concurrency_degree(&self) -> usize {
        self.concurrency_degree
    }

    /// Number of history-enabled regions.
    pub fn history_max(&self) -> usize {
        self.history_max
    }

    /// Deterministic textual form of the structure, input of the signature.
    pub fn canonical_structure(&self) -> &str {
        &self.canonical
    }

    /// Structural fingerprint; empty when signatures are disabled.
    pub fn signature(&self) -> &str {
        &self.signature
    }
}

/// Same tree shape, possibly from two independently built templates.
pub(crate) fn same_shape(a: &Arc<Structure>, b: &Arc<Structure>) -> bool {
    Arc::ptr_eq(a, b) || a.canonical == b.canonical
}

/// Finalized, read-only product of a [`crate::builder::StateMachineTemplate`].
///
/// A topology is shared (behind an `Arc`) by every machine created from it and
/// never changes after the template closed.
pub struct Topology<E, A> {
    pub(crate) structure: Arc<Structure>,
    pub(crate) behaviors: Vec<StateBehavior<E, A>>,
    pub(crate) transitions: Vec<Transition<E, A>>,
}

impl<E, A> Topology<E, A> {
    pub fn structure(&self) -> &Arc<Structure> {
        &self.structure
    }

    pub fn signature(&self) -> &str {
        self.structure.signature()
    }

    pub fn canonical_structure(&self) -> &str {
        self.structure.canonical_structure()
    }

    pub fn state_configuration_max(&self) -> usize {
        self.structure.state_configuration_max()
    }

    pub fn concurrency_degree(&self) -> usize {
        self.structure.concurrency_degree()
    }

    pub fn history_max(&self) -> usize {
        self.structure.history_max()
    }

    pub fn find_state(&self, name: &str) -> Option<StateId> {
        self.structure.find_state(name)
    }

    /// State names in declaration order.
    pub fn state_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.structure.states.iter().map(|s| s.name.as_str())
    }

    /// Transitions in declaration order, which is also their dispatch priority.
    pub fn transitions(&self) -> &[Transition<E, A>] {
        &self.transitions
    }

    pub fn transition(&self, name: &str) -> Option<&Transition<E, A>> {
        self.transitions.iter().find(|t| t.name() == name)
    }

    pub(crate) fn behavior(&self, state: StateId) -> &StateBehavior<E, A> {
        &self.behaviors[state.0]
    }

    /// Build a (possibly partial) configuration from state names.
    ///
    /// Regions that none of the names select stay unspecified (`*`).
    pub fn create_state_configuration<I, S>(
        &self,
        names: I,
    ) -> Result<StateConfiguration, ConfigurationError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        StateConfiguration::from_names(&self.structure, names)
    }

    /// The fully unspecified configuration, also the value of Nirvana.
    pub fn empty_configuration(&self) -> StateConfiguration {
        StateConfiguration::empty(&self.structure)
    }
}

impl<E, A> fmt::Debug for Topology<E, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Topology")
            .field("states", &self.structure.states.len())
            .field("regions", &self.structure.regions.len())
            .field("transitions", &self.transitions.len())
            .field("signature", &self.structure.signature)
            .finish()
    }
}
