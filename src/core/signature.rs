//! Structural signatures.
//!
//! A topology is rendered to a canonical text covering every region, state and
//! transition. The signature generator turns that text into the fingerprint
//! stored in front of saved machine state.

use crate::core::topology::{RegionId, Scope, StateId, Structure};
use crate::effects::Transition;
use std::sync::Arc;

/// Maps the canonical structure text to a signature.
pub type SignatureGenerator = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// BLAKE3 of the canonical text, lowercase hex.
pub fn blake3_signature(canonical: &str) -> String {
    blake3::hash(canonical.as_bytes()).to_hex().to_string()
}

/// Generator used when a template never configures one.
pub fn default_generator() -> SignatureGenerator {
    Arc::new(blake3_signature)
}

pub(crate) fn canonical_structure<E, A>(
    structure: &Structure,
    transitions: &[Transition<E, A>],
) -> String {
    let mut out = String::new();
    for region in &structure.root_regions {
        write_region(structure, *region, &mut out);
    }
    for transition in transitions {
        out.push('\n');
        out.push_str(transition.name());
        out.push(':');
        write_states(structure, transition.sources(), &mut out);
        out.push_str("->");
        write_states(structure, transition.targets(), &mut out);
        out.push('@');
        write_scope(structure, transition.scope(), &mut out);
        if transition.is_completion() {
            out.push('~');
        }
    }
    out
}

fn write_region(structure: &Structure, region: RegionId, out: &mut String) {
    let node = structure.region(region);
    out.push('[');
    out.push_str(structure.state_name(node.initial));
    if node.has_history() {
        out.push_str("|H");
    }
    out.push(':');
    for (index, state) in node.states.iter().enumerate() {
        if index > 0 {
            out.push(',');
        }
        let child = structure.state(*state);
        out.push_str(&child.name);
        if child.is_composite() {
            out.push('{');
            for nested in &child.regions {
                write_region(structure, *nested, out);
            }
            out.push('}');
        }
    }
    out.push(']');
}

fn write_states(structure: &Structure, states: &[StateId], out: &mut String) {
    for (index, state) in states.iter().enumerate() {
        if index > 0 {
            out.push('+');
        }
        out.push_str(structure.state_name(*state));
    }
}

fn write_scope(structure: &Structure, scope: &Scope, out: &mut String) {
    match scope {
        Scope::Root => out.push('^'),
        Scope::State(state) => out.push_str(structure.state_name(*state)),
        Scope::Region(region) => {
            let node = structure.region(*region);
            // Regions are anonymous; name them by owner and position.
            let (owner, siblings) = match node.owner {
                Some(owner) => (
                    structure.state_name(owner),
                    structure.state(owner).regions.as_slice(),
                ),
                None => ("^", structure.root_regions.as_slice()),
            };
            let position = siblings.iter().position(|r| r == region).unwrap_or(0);
            out.push_str(owner);
            out.push('/');
            out.push_str(&position.to_string());
        }
    }
}
