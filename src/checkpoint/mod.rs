//! Save and resume of state machines.
//!
//! Two persistence forms are offered. [`StateMachine::save_state`] and
//! [`StateMachine::resume`] use the compact binary layout of the
//! [`codec`] module:
//!
//! ```text
//! string  signature
//! i16     region count
//! i16     per region: local index of the active state, -1 when inactive
//! i16     history slot count
//! i16     per slot: local index of the remembered state, -1 when unset
//! ```
//!
//! [`Checkpoint`] is a self-describing snapshot keyed by state names that
//! travels as JSON or bincode.
//!
//! Both forms refuse data produced by a machine with a different structural
//! signature, unless signatures are disabled for the current topology.

use crate::core::{RegionId, StateId, Structure};
use crate::effects::{Runtime, StateMachine};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{Read, Write};
use std::sync::Arc;
use uuid::Uuid;

pub mod codec;
pub mod error;

pub use codec::{BinaryReader, BinaryWriter, CodecError};
pub use error::CheckpointError;

/// Version identifier for checkpoint format
pub const CHECKPOINT_VERSION: u32 = 1;

/// Serializable snapshot of a machine's configuration and history.
/// Callbacks are not part of it; they come from the topology on restore.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Checkpoint format version
    pub version: u32,

    /// Unique checkpoint identifier
    pub id: Uuid,

    /// When checkpoint was created
    pub timestamp: DateTime<Utc>,

    /// Structural signature of the topology that produced it
    pub signature: String,

    /// Per region, in region order: name of the active state
    pub active: Vec<Option<String>>,

    /// Per history slot: name of the remembered state
    pub history: Vec<Option<String>>,
}

impl Checkpoint {
    pub fn to_json(&self) -> Result<String, CheckpointError> {
        serde_json::to_string_pretty(self).map_err(|e| CheckpointError::SerializationFailed(e.to_string()))
    }

    pub fn from_json(json: &str) -> Result<Self, CheckpointError> {
        let checkpoint: Self =
            serde_json::from_str(json).map_err(|e| CheckpointError::DeserializationFailed(e.to_string()))?;
        checkpoint.check_version()?;
        Ok(checkpoint)
    }

    pub fn to_binary(&self) -> Result<Vec<u8>, CheckpointError> {
        bincode::serialize(self).map_err(|e| CheckpointError::SerializationFailed(e.to_string()))
    }

    pub fn from_binary(bytes: &[u8]) -> Result<Self, CheckpointError> {
        let checkpoint: Self =
            bincode::deserialize(bytes).map_err(|e| CheckpointError::DeserializationFailed(e.to_string()))?;
        checkpoint.check_version()?;
        Ok(checkpoint)
    }

    fn check_version(&self) -> Result<(), CheckpointError> {
        if self.version != CHECKPOINT_VERSION {
            return Err(CheckpointError::UnsupportedVersion {
                found: self.version,
                supported: CHECKPOINT_VERSION,
            });
        }
        Ok(())
    }
}

impl<E: PartialEq + fmt::Debug, A> StateMachine<E, A> {
    /// Write the active configuration and history to `writer`.
    pub fn save_state<W: Write>(&self, writer: &mut BinaryWriter<W>) -> Result<(), CheckpointError> {
        let structure = self.topology().structure();
        let runtime = self.runtime_snapshot();

        writer.write_string(structure.signature())?;
        writer.write_i16(to_i16(runtime.active.len())?)?;
        for (index, state) in runtime.active.iter().enumerate() {
            writer.write_i16(local_index(structure, RegionId(index), *state)?)?;
        }
        let slots = history_regions(structure);
        writer.write_i16(to_i16(slots.len())?)?;
        for region in slots {
            let slot = structure.region(region).history_slot();
            let state = slot.and_then(|slot| runtime.history[slot]);
            writer.write_i16(local_index(structure, region, state)?)?;
        }
        tracing::debug!(configuration = %self.configuration(), "state machine saved");
        Ok(())
    }

    /// Restore a configuration written by [`save_state`](Self::save_state).
    ///
    /// The machine must be in Nirvana. With `execute_entry_actions` the
    /// saved configuration is entered normally (entry actions outer to
    /// inner, then do-actions when enabled); otherwise it is adopted
    /// silently. Nothing changes when the data is rejected.
    pub fn resume<R: Read>(
        &self,
        reader: &mut BinaryReader<R>,
        execute_entry_actions: bool,
    ) -> Result<(), CheckpointError> {
        let Some(_guard) = self.begin_dispatch() else {
            return Err(CheckpointError::Busy);
        };
        if !self.is_nirvana() {
            return Err(CheckpointError::NotInNirvana);
        }
        let structure = Arc::clone(self.topology().structure());
        check_signature(&structure, &reader.read_string()?)?;

        let region_count = reader.read_i16()?;
        if usize::try_from(region_count).ok() != Some(structure.regions().len()) {
            return Err(CheckpointError::Corrupt(format!(
                "expected {} regions, found {region_count}",
                structure.regions().len()
            )));
        }
        let mut active = Vec::with_capacity(structure.regions().len());
        for index in 0..structure.regions().len() {
            active.push(state_at(&structure, RegionId(index), reader.read_i16()?)?);
        }

        let slots = history_regions(&structure);
        let slot_count = reader.read_i16()?;
        if usize::try_from(slot_count).ok() != Some(slots.len()) {
            return Err(CheckpointError::Corrupt(format!(
                "expected {} history slots, found {slot_count}",
                slots.len()
            )));
        }
        let mut history = Vec::with_capacity(slots.len());
        for region in slots {
            history.push(state_at(&structure, region, reader.read_i16()?)?);
        }

        let restored = Runtime { active, history };
        validate(&structure, &restored)?;
        self.adopt(restored, execute_entry_actions)?;
        Ok(())
    }

    /// Snapshot the machine into a [`Checkpoint`].
    pub fn checkpoint(&self) -> Checkpoint {
        let structure = self.topology().structure();
        let runtime = self.runtime_snapshot();
        let name = |state: &Option<StateId>| state.map(|s| structure.state_name(s).to_string());
        Checkpoint {
            version: CHECKPOINT_VERSION,
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            signature: structure.signature().to_string(),
            active: runtime.active.iter().map(name).collect(),
            history: runtime.history.iter().map(name).collect(),
        }
    }

    /// Restore a [`Checkpoint`]; same rules as [`resume`](Self::resume).
    pub fn restore(&self, checkpoint: &Checkpoint, execute_entry_actions: bool) -> Result<(), CheckpointError> {
        let Some(_guard) = self.begin_dispatch() else {
            return Err(CheckpointError::Busy);
        };
        if !self.is_nirvana() {
            return Err(CheckpointError::NotInNirvana);
        }
        checkpoint.check_version()?;
        let structure = Arc::clone(self.topology().structure());
        check_signature(&structure, &checkpoint.signature)?;

        if checkpoint.active.len() != structure.regions().len() {
            return Err(CheckpointError::Corrupt(format!(
                "expected {} regions, found {}",
                structure.regions().len(),
                checkpoint.active.len()
            )));
        }
        if checkpoint.history.len() != structure.history_max() {
            return Err(CheckpointError::Corrupt(format!(
                "expected {} history slots, found {}",
                structure.history_max(),
                checkpoint.history.len()
            )));
        }
        let resolve = |name: &Option<String>| -> Result<Option<StateId>, CheckpointError> {
            name.as_deref()
                .map(|name| {
                    structure
                        .find_state(name)
                        .ok_or_else(|| CheckpointError::Corrupt(format!("unknown state '{name}'")))
                })
                .transpose()
        };
        let restored = Runtime {
            active: checkpoint.active.iter().map(resolve).collect::<Result<_, _>>()?,
            history: checkpoint.history.iter().map(resolve).collect::<Result<_, _>>()?,
        };
        validate(&structure, &restored)?;
        self.adopt(restored, execute_entry_actions)?;
        Ok(())
    }
}

fn check_signature(structure: &Structure, found: &str) -> Result<(), CheckpointError> {
    let expected = structure.signature();
    if expected.is_empty() || expected == found {
        return Ok(());
    }
    tracing::warn!(expected, found, "saved state does not match the state machine structure");
    Err(CheckpointError::SignatureMismatch {
        expected: expected.to_string(),
        found: found.to_string(),
    })
}

/// Regions with history, in slot order.
fn history_regions(structure: &Structure) -> Vec<RegionId> {
    let mut slots: Vec<(usize, RegionId)> = structure
        .regions()
        .iter()
        .enumerate()
        .filter_map(|(index, region)| region.history_slot().map(|slot| (slot, RegionId(index))))
        .collect();
    slots.sort_unstable();
    slots.into_iter().map(|(_, region)| region).collect()
}

fn to_i16(value: usize) -> Result<i16, CheckpointError> {
    i16::try_from(value).map_err(|_| CheckpointError::SerializationFailed(format!("{value} does not fit in i16")))
}

fn local_index(structure: &Structure, region: RegionId, state: Option<StateId>) -> Result<i16, CheckpointError> {
    match state {
        None => Ok(-1),
        Some(state) => {
            let index = structure.region(region).local_index(state).ok_or_else(|| {
                CheckpointError::SerializationFailed(format!(
                    "state '{}' is not in region {region}",
                    structure.state_name(state)
                ))
            })?;
            to_i16(index)
        }
    }
}

fn state_at(structure: &Structure, region: RegionId, index: i16) -> Result<Option<StateId>, CheckpointError> {
    if index == -1 {
        return Ok(None);
    }
    usize::try_from(index)
        .ok()
        .and_then(|index| structure.region(region).states().get(index).copied())
        .map(Some)
        .ok_or_else(|| CheckpointError::Corrupt(format!("region {region} has no state at index {index}")))
}

/// Every state must sit in its own region, and a region may only be active
/// while its owner is. An active owner may leave regions unspecified: a
/// failed exit action leaves the owner active after its substates are gone.
fn validate(structure: &Structure, runtime: &Runtime) -> Result<(), CheckpointError> {
    for (index, node) in structure.regions().iter().enumerate() {
        let region = RegionId(index);
        let Some(state) = runtime.active[index] else {
            continue;
        };
        if structure.state(state).parent() != region {
            return Err(CheckpointError::Corrupt(format!(
                "state '{}' is not in region {region}",
                structure.state_name(state)
            )));
        }
        if let Some(owner) = node.owner() {
            if runtime.active[structure.state(owner).parent().index()] != Some(owner) {
                return Err(CheckpointError::Corrupt(format!(
                    "region {region} is active while its owner is not"
                )));
            }
        }
    }

    for region in history_regions(structure) {
        let slot = structure.region(region).history_slot();
        let remembered = slot.and_then(|slot| runtime.history[slot]);
        if let Some(state) = remembered {
            if structure.state(state).parent() != region {
                return Err(CheckpointError::Corrupt(format!(
                    "history of region {region} names foreign state '{}'",
                    structure.state_name(state)
                )));
            }
        }
    }
    Ok(())
}
