//! Active state configurations.
//!
//! A [`StateConfiguration`] is an immutable selection of one state per
//! region, mirroring the region tree of a topology. Any region may be left
//! [`Selection::Unspecified`], which renders as `*` and means "defer to the
//! default or history when entering".

use crate::core::topology::{same_shape, RegionId, StateId, Structure};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Errors raised while building a configuration from state names.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("State name must not be empty")]
    MissingName,

    #[error("Unknown state '{0}'")]
    UnknownState(String),

    #[error("States '{first}' and '{second}' select the same region")]
    RegionConflict { first: String, second: String },
}

/// Choice made for one region.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Selection {
    Unspecified,
    Specific(StateId),
}

impl Selection {
    pub fn state(self) -> Option<StateId> {
        match self {
            Self::Specific(state) => Some(state),
            Self::Unspecified => None,
        }
    }
}

impl From<Option<StateId>> for Selection {
    fn from(state: Option<StateId>) -> Self {
        state.map_or(Self::Unspecified, Self::Specific)
    }
}

/// Immutable snapshot of an (optionally partial) active state selection.
///
/// A region only carries a specific selection when its owner is selected too,
/// so two configurations with the same meaning always compare equal.
///
/// # Example
///
/// ```rust
/// use statechart::builder::StateMachineTemplate;
///
/// let mut template = StateMachineTemplate::<&str, ()>::new();
/// template.region("Off", false).unwrap();
/// template.state("Off").unwrap();
/// template.end_state().unwrap();
/// template.state("On").unwrap();
/// template.end_state().unwrap();
/// template.end_region().unwrap();
/// let topology = template.build().unwrap();
///
/// let any = topology.create_state_configuration(Vec::<&str>::new()).unwrap();
/// let on = topology.create_state_configuration(["On"]).unwrap();
///
/// assert_eq!(any.to_string(), "*");
/// assert_eq!(on.to_string(), "On");
/// assert!(any.is_matching(&on));
/// assert_ne!(any, on);
/// ```
#[derive(Clone)]
pub struct StateConfiguration {
    structure: Arc<Structure>,
    slots: Vec<Selection>,
}

impl StateConfiguration {
    /// Fully unspecified configuration.
    pub fn empty(structure: &Arc<Structure>) -> Self {
        Self {
            structure: Arc::clone(structure),
            slots: vec![Selection::Unspecified; structure.regions.len()],
        }
    }

    pub(crate) fn from_names<I, S>(
        structure: &Arc<Structure>,
        names: I,
    ) -> Result<Self, ConfigurationError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut configuration = Self::empty(structure);
        for name in names {
            let name = name.as_ref();
            if name.is_empty() {
                return Err(ConfigurationError::MissingName);
            }
            let state = structure
                .find_state(name)
                .ok_or_else(|| ConfigurationError::UnknownState(name.to_string()))?;
            configuration.select_path(state)?;
        }
        Ok(configuration)
    }

    /// Build from per-region active states, as kept by a running machine.
    pub(crate) fn from_active(structure: &Arc<Structure>, active: &[Option<StateId>]) -> Self {
        Self {
            structure: Arc::clone(structure),
            slots: active.iter().map(|s| Selection::from(*s)).collect(),
        }
    }

    /// Select `state` and all of its ancestors.
    fn select_path(&mut self, state: StateId) -> Result<(), ConfigurationError> {
        let mut current = state;
        loop {
            let node = self.structure.state(current);
            let region = node.parent;
            match self.slots[region.0] {
                Selection::Unspecified => self.slots[region.0] = Selection::Specific(current),
                // Ancestors of an already selected state are selected as well.
                Selection::Specific(existing) if existing == current => return Ok(()),
                Selection::Specific(existing) => {
                    return Err(ConfigurationError::RegionConflict {
                        first: self.structure.state_name(existing).to_string(),
                        second: node.name.clone(),
                    });
                }
            }
            match self.structure.region(region).owner {
                Some(owner) => current = owner,
                None => return Ok(()),
            }
        }
    }

    pub fn structure(&self) -> &Arc<Structure> {
        &self.structure
    }

    /// Selection made for `region`.
    pub fn selection(&self, region: RegionId) -> Selection {
        self.slots[region.0]
    }

    pub fn selections(&self) -> &[Selection] {
        &self.slots
    }

    /// True when nothing is selected (the Nirvana configuration).
    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(|s| *s == Selection::Unspecified)
    }

    /// True when no selected state leaves one of its regions unspecified.
    pub fn is_complete(&self) -> bool {
        self.structure
            .root_regions
            .iter()
            .all(|r| self.region_complete(*r))
    }

    fn region_complete(&self, region: RegionId) -> bool {
        match self.slots[region.0] {
            Selection::Unspecified => false,
            Selection::Specific(state) => self
                .structure
                .state(state)
                .regions
                .iter()
                .all(|r| self.region_complete(*r)),
        }
    }

    /// Whether the named state is selected.
    pub fn contains(&self, name: &str) -> bool {
        self.structure
            .find_state(name)
            .is_some_and(|state| self.contains_state(state))
    }

    pub fn contains_state(&self, state: StateId) -> bool {
        let parent = self.structure.state(state).parent;
        self.slots[parent.0] == Selection::Specific(state)
    }

    /// Selected states, outer to inner, regions in declaration order.
    pub fn active_states(&self) -> Vec<StateId> {
        let mut states = Vec::new();
        for region in &self.structure.root_regions {
            self.collect_region(*region, &mut states);
        }
        states
    }

    fn collect_region(&self, region: RegionId, out: &mut Vec<StateId>) {
        if let Selection::Specific(state) = self.slots[region.0] {
            out.push(state);
            for child in &self.structure.state(state).regions {
                self.collect_region(*child, out);
            }
        }
    }

    /// Names of the selected states without selected substates.
    pub fn leaf_names(&self) -> Vec<&str> {
        self.active_states()
            .into_iter()
            .filter(|s| {
                self.structure
                    .state(*s)
                    .regions
                    .iter()
                    .all(|r| self.slots[r.0] == Selection::Unspecified)
            })
            .map(|s| self.structure.state_name(s))
            .collect()
    }

    /// Loose equality: an unspecified region on either side matches anything.
    pub fn is_matching(&self, other: &StateConfiguration) -> bool {
        same_shape(&self.structure, &other.structure)
            && self
                .structure
                .root_regions
                .iter()
                .all(|r| self.region_matches(other, *r))
    }

    fn region_matches(&self, other: &StateConfiguration, region: RegionId) -> bool {
        match (self.slots[region.0], other.slots[region.0]) {
            (Selection::Specific(mine), Selection::Specific(theirs)) => {
                mine == theirs
                    && self
                        .structure
                        .state(mine)
                        .regions
                        .iter()
                        .all(|r| self.region_matches(other, *r))
            }
            _ => true,
        }
    }

    fn fmt_region(&self, f: &mut fmt::Formatter<'_>, region: RegionId) -> fmt::Result {
        match self.slots[region.0] {
            Selection::Unspecified => f.write_str("*"),
            Selection::Specific(state) => {
                let node = self.structure.state(state);
                f.write_str(&node.name)?;
                if node.regions.is_empty() {
                    return Ok(());
                }
                f.write_str("(")?;
                for child in &node.regions {
                    self.fmt_region(f, *child)?;
                    f.write_str(",")?;
                }
                f.write_str(")")
            }
        }
    }
}

impl PartialEq for StateConfiguration {
    fn eq(&self, other: &Self) -> bool {
        same_shape(&self.structure, &other.structure) && self.slots == other.slots
    }
}

impl Eq for StateConfiguration {}

/// Canonical form: `Name(region1,region2,)` nested, `*` for unspecified.
/// Several root regions render like the regions of an unnamed state.
impl fmt::Display for StateConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let roots = &self.structure.root_regions;
        if self.is_empty() {
            return f.write_str("*");
        }
        if let [single] = roots.as_slice() {
            return self.fmt_region(f, *single);
        }
        f.write_str("(")?;
        for region in roots {
            self.fmt_region(f, *region)?;
            f.write_str(",")?;
        }
        f.write_str(")")
    }
}

impl fmt::Debug for StateConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StateConfiguration({self})")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::StateMachineTemplate;
    use crate::core::Topology;

    /// Root region {Idle, Busy{Work{Fast, Slow} | Log{Quiet, Loud}}}
    fn topology() -> Arc<Topology<&'static str, ()>> {
        let mut t = StateMachineTemplate::new();
        t.region("Idle", false).unwrap();
        t.state("Idle").unwrap();
        t.end_state().unwrap();
        t.state("Busy").unwrap();
        t.region("Fast", false).unwrap();
        t.state("Fast").unwrap();
        t.end_state().unwrap();
        t.state("Slow").unwrap();
        t.end_state().unwrap();
        t.end_region().unwrap();
        t.region("Quiet", true).unwrap();
        t.state("Quiet").unwrap();
        t.end_state().unwrap();
        t.state("Loud").unwrap();
        t.end_state().unwrap();
        t.end_region().unwrap();
        t.end_state().unwrap();
        t.end_region().unwrap();
        t.build().unwrap()
    }

    #[test]
    fn empty_names_give_wildcard() {
        let topology = topology();
        let config = topology
            .create_state_configuration(Vec::<&str>::new())
            .unwrap();

        assert_eq!(config.to_string(), "*");
        assert!(config.is_empty());
        assert_eq!(config, topology.empty_configuration());
    }

    #[test]
    fn leaf_selects_its_ancestors() {
        let topology = topology();
        let config = topology.create_state_configuration(["Slow"]).unwrap();

        assert_eq!(config.to_string(), "Busy(Slow,*,)");
        assert!(config.contains("Busy"));
        assert!(config.contains("Slow"));
        assert!(!config.contains("Fast"));
        assert!(!config.is_complete());
    }

    #[test]
    fn orthogonal_leaves_combine() {
        let topology = topology();
        let config = topology
            .create_state_configuration(["Slow", "Loud"])
            .unwrap();

        assert_eq!(config.to_string(), "Busy(Slow,Loud,)");
        assert!(config.is_complete());
        assert_eq!(config.leaf_names(), vec!["Slow", "Loud"]);
    }

    #[test]
    fn composite_and_leaf_agree() {
        let topology = topology();
        let a = topology
            .create_state_configuration(["Busy", "Fast"])
            .unwrap();
        let b = topology
            .create_state_configuration(["Fast", "Busy"])
            .unwrap();

        assert_eq!(a, b);
    }

    #[test]
    fn two_states_of_one_region_conflict() {
        let topology = topology();
        let result = topology.create_state_configuration(["Fast", "Slow"]);

        assert!(matches!(
            result,
            Err(ConfigurationError::RegionConflict { .. })
        ));
    }

    #[test]
    fn conflict_detected_through_ancestors() {
        let topology = topology();
        let result = topology.create_state_configuration(["Idle", "Loud"]);

        assert!(matches!(
            result,
            Err(ConfigurationError::RegionConflict { .. })
        ));
    }

    #[test]
    fn unknown_and_empty_names_rejected() {
        let topology = topology();

        assert_eq!(
            topology.create_state_configuration(["Nope"]),
            Err(ConfigurationError::UnknownState("Nope".to_string()))
        );
        assert_eq!(
            topology.create_state_configuration([""]),
            Err(ConfigurationError::MissingName)
        );
    }

    #[test]
    fn matching_treats_wildcards_loosely() {
        let topology = topology();
        let any = topology.empty_configuration();
        let busy = topology.create_state_configuration(["Busy"]).unwrap();
        let slow_loud = topology
            .create_state_configuration(["Slow", "Loud"])
            .unwrap();
        let fast = topology.create_state_configuration(["Fast"]).unwrap();
        let idle = topology.create_state_configuration(["Idle"]).unwrap();

        assert!(any.is_matching(&slow_loud));
        assert!(slow_loud.is_matching(&any));
        assert!(busy.is_matching(&slow_loud));
        assert!(!fast.is_matching(&slow_loud));
        assert!(!idle.is_matching(&busy));
        assert_ne!(busy, slow_loud);
    }

    #[test]
    fn configurations_from_equal_structures_compare_equal() {
        let first = topology();
        let second = topology();

        let a = first.create_state_configuration(["Loud"]).unwrap();
        let b = second.create_state_configuration(["Loud"]).unwrap();

        assert_eq!(a, b);
        assert!(a.is_matching(&b));
    }
}
