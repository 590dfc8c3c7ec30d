//! Statechart: hierarchical UML-style state machines
//!
//! A topology is declared once with a [`StateMachineTemplate`], validated, and
//! frozen into an [`Arc<Topology>`](Topology) that any number of
//! [`StateMachine`] instances share. Each instance keeps its own active
//! configuration and history and dispatches events with run-to-completion
//! semantics.
//!
//! # Core Concepts
//!
//! - **Regions and states**: every state lives in a region; composite states
//!   own one or more orthogonal regions
//! - **Transitions**: triggered or completion, with optional guard and action,
//!   forks and joins through multiple targets and sources
//! - **History**: regions may remember their last active state
//! - **Persistence**: configurations can be saved and resumed, guarded by a
//!   structural signature of the topology
//!
//! # Example
//!
//! ```rust
//! use statechart::{StateMachine, StateMachineTemplate, TransitionBuilder};
//!
//! #[derive(Clone, Debug, PartialEq)]
//! enum Event {
//!     Start,
//!     Stop,
//! }
//!
//! let mut template = StateMachineTemplate::<Event, ()>::new();
//! template.region("Idle", false).unwrap();
//! template.state("Idle").unwrap();
//! template.end_state().unwrap();
//! template.state("Running").unwrap();
//! template.end_state().unwrap();
//! template
//!     .transition(TransitionBuilder::new("Go").from("Idle").to("Running").on(Event::Start))
//!     .unwrap();
//! template
//!     .transition(TransitionBuilder::new("Halt").from("Running").to("Idle").on(Event::Stop))
//!     .unwrap();
//! template.end_region().unwrap();
//!
//! let machine = StateMachine::new(template.build().unwrap());
//! machine.startup().unwrap();
//! machine.send_trigger_event(Event::Start, ()).unwrap();
//! assert!(machine.is_active("Running"));
//! machine.finish().unwrap();
//! assert!(machine.is_nirvana());
//! ```

pub mod builder;
pub mod checkpoint;
pub mod core;
pub mod effects;

// Re-export commonly used types
pub use builder::{BuildError, StateBuilder, StateMachineTemplate, TransitionBuilder};
pub use checkpoint::{BinaryReader, BinaryWriter, Checkpoint, CheckpointError};
pub use core::{Guard, StateConfiguration, Topology};
pub use effects::{DispatchError, MachineOptions, StateMachine};
