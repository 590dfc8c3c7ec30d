//! Runtime side of the statechart: the place where callbacks run.
//!
//! This module is the "imperative shell" around the passive [`crate::core`]
//! data. A [`StateMachine`] binds one shared topology to its own active
//! configuration and history, and drives it synchronously:
//!
//! - **Startup**: Nirvana to the default configuration
//! - **Dispatch**: one run-to-completion step per trigger event, followed by
//!   completion transitions until none is eligible
//! - **Finish**: back to Nirvana, exit actions innermost first
//!
//! Everything runs on the calling thread. Reentrant calls from callbacks are
//! dropped, never queued.

mod machine;
mod trace;
mod transition;

pub use machine::{MachineOptions, StateMachine};
pub use trace::{DispatchHook, StateChangeHook, TestTransitionHook};
pub use transition::{DispatchError, Transition};

pub(crate) use machine::Runtime;
