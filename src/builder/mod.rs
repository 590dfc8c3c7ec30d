//! Builder API for declaring statechart topologies.
//!
//! A [`StateMachineTemplate`] is fed balanced `region`/`state` calls, each
//! closed by its `end_*` counterpart, plus transitions described with a
//! [`TransitionBuilder`]. States with callbacks are described with a
//! [`StateBuilder`]. Structural mistakes are reported by the call that makes
//! them.

pub mod error;
pub mod state;
pub mod template;
pub mod transition;

pub use error::{BuildError, BuildErrorKind};
pub use state::StateBuilder;
pub use template::StateMachineTemplate;
pub use transition::TransitionBuilder;

/// Check that `name` matches `[A-Za-z_][A-Za-z0-9_]*`.
///
/// # Example
///
/// ```
/// use statechart::builder::is_valid_identifier;
///
/// assert!(is_valid_identifier("Motor_On2"));
/// assert!(!is_valid_identifier("2fast"));
/// assert!(!is_valid_identifier(""));
/// ```
pub fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_identifiers() {
        for name in ["a", "_", "_x1", "State", "S2A1", "snake_case_9"] {
            assert!(is_valid_identifier(name), "{name}");
        }
    }

    #[test]
    fn rejects_non_identifiers() {
        for name in ["", "1a", "a-b", "a b", "ä", "a.b", "*"] {
            assert!(!is_valid_identifier(name), "{name}");
        }
    }
}
