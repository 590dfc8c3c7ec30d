//! Core statechart types.
//!
//! This module contains the passive data of a state machine:
//! - The immutable topology (states, regions, derived metrics)
//! - Active state configurations with wildcard support
//! - Guard predicates and action callbacks
//! - Structural signatures used to gate persistence
//!
//! Nothing here runs user callbacks; that happens in [`crate::effects`].

mod action;
mod configuration;
mod guard;
mod signature;
mod topology;

pub use action::{Action, ActionError, ActionKind, ActionResult, DoAction, StateBehavior};
pub use configuration::{ConfigurationError, Selection, StateConfiguration};
pub use guard::Guard;
pub use signature::{blake3_signature, default_generator, SignatureGenerator};
pub use topology::{RegionId, RegionNode, Scope, StateId, StateNode, Structure, Topology};

pub(crate) use signature::canonical_structure;
