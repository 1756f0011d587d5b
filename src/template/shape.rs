//! Shape tokens.
//!
//! A [`ShapeToken`] summarises the part of a template that cannot be changed
//! by patching a live object: its paths, the kind of each entry, the literals
//! of init-time constants, reference targets and update lookups. Two templates
//! with equal tokens can drive the same wrapper; a different token means the
//! wrapper must be rebuilt.

use std::hash::{Hash, Hasher};

use indexmap::IndexMap;
use rustc_hash::FxHasher;

use crate::core::{Evaluator, Parameter};

/// Hash of a template's non-updatable structure.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ShapeToken(u64);

impl ShapeToken {
    /// Compute the token of a set of template entries.
    pub fn of(entries: &IndexMap<String, Parameter>) -> Self {
        let mut hasher = FxHasher::default();
        entries.len().hash(&mut hasher);

        for (path, param) in entries {
            path.hash(&mut hasher);
            match param {
                Parameter::Init(p) => {
                    0u8.hash(&mut hasher);
                    hash_evaluator(p.evaluator(), &mut hasher);
                }
                Parameter::Update(p) => {
                    1u8.hash(&mut hasher);
                    p.flags().bits().hash(&mut hasher);
                    // Update values are patchable; only their wiring is shape
                    if let Some(target) = p.evaluator().reference_target() {
                        target.hash(&mut hasher);
                    }
                    if let Some(lookup) = p.lookup_strategy() {
                        lookup.node_type.name().hash(&mut hasher);
                        lookup.node_id.hash(&mut hasher);
                        lookup.parameter_relpath.hash(&mut hasher);
                    }
                }
            }
        }

        Self(hasher.finish())
    }

    /// Raw token value.
    pub fn value(self) -> u64 {
        self.0
    }
}

fn hash_evaluator(evaluator: &Evaluator, hasher: &mut FxHasher) {
    match evaluator {
        Evaluator::Constant(v) => {
            0u8.hash(hasher);
            // Canonical textual form; floats are not Hash
            serde_json::to_string(v).unwrap_or_default().hash(hasher);
        }
        Evaluator::Function(_) => 1u8.hash(hasher),
        Evaluator::Reference(target) => {
            2u8.hash(hasher);
            target.hash(hasher);
        }
    }
}
