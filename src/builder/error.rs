//! Build errors for the statechart template.

use thiserror::Error;

/// Errors raised while declaring a topology.
///
/// The offending call is rejected; everything declared before it stays in
/// the template.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BuildError {
    #[error("Name must not be empty")]
    MissingName,

    #[error("'{0}' is not a valid identifier")]
    InvalidIdentifier(String),

    #[error("State '{0}' is already defined")]
    DuplicateState(String),

    #[error("Transition '{0}' is already defined")]
    DuplicateTransition(String),

    #[error("Transition '{transition}' references unknown state '{state}'")]
    UnknownState { transition: String, state: String },

    #[error("State '{state}' of transition '{transition}' lies outside the transition's scope")]
    OutOfScope { transition: String, state: String },

    #[error("States '{first}' and '{second}' of transition '{transition}' select the same region")]
    ConflictingEndpoints {
        transition: String,
        first: String,
        second: String,
    },

    #[error("Transition '{0}' has no source state. Call .from(state)")]
    MissingSource(String),

    #[error("Transition '{0}' has no target state. Call .to(state)")]
    MissingTarget(String),

    #[error("State '{0}' must be declared directly inside a region")]
    StateOutsideRegion(String),

    #[error("A region must be declared at the root or inside a state")]
    RegionInsideRegion,

    #[error("end_state() called without an open state")]
    EndStateWithoutState,

    #[error("end_region() called without an open region")]
    EndRegionWithoutRegion,

    #[error("State '{0}' is still open. Call .end_state() first")]
    StateStillOpen(String),

    #[error("Region declares no state")]
    EmptyRegion,

    #[error("Initial state '{0}' is not a state of its region")]
    UnknownInitialState(String),

    #[error("{0} region or state scope(s) still open")]
    UnclosedScope(usize),

    #[error("No region defined. Declare at least one region")]
    NoRegions,

    #[error("Signature generator can only be set once")]
    SignatureGeneratorAlreadySet,

    #[error("Too many states ({0}); at most {max} are supported", max = i16::MAX)]
    TooManyStates(usize),
}

/// Broad category of a [`BuildError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildErrorKind {
    /// A required name is empty.
    MissingArgument,
    /// A name or reference is invalid, unknown or duplicated.
    OutOfRange,
    /// Begin/end calls are not balanced or a region is malformed.
    Structure,
    /// The call is not allowed in the template's current state.
    InvalidOperation,
}

impl BuildError {
    pub fn kind(&self) -> BuildErrorKind {
        match self {
            Self::MissingName => BuildErrorKind::MissingArgument,
            Self::InvalidIdentifier(_)
            | Self::DuplicateState(_)
            | Self::DuplicateTransition(_)
            | Self::UnknownState { .. }
            | Self::ConflictingEndpoints { .. }
            | Self::MissingSource(_)
            | Self::MissingTarget(_)
            | Self::TooManyStates(_) => BuildErrorKind::OutOfRange,
            Self::OutOfScope { .. }
            | Self::StateOutsideRegion(_)
            | Self::RegionInsideRegion
            | Self::EndStateWithoutState
            | Self::EndRegionWithoutRegion
            | Self::StateStillOpen(_)
            | Self::EmptyRegion
            | Self::UnknownInitialState(_)
            | Self::UnclosedScope(_)
            | Self::NoRegions => BuildErrorKind::Structure,
            Self::SignatureGeneratorAlreadySet => BuildErrorKind::InvalidOperation,
        }
    }
}
