//! Smart builder for union types.
//!
//! Invariants maintained here:
//!   * No single-element union types (just the contained type instead.)
//!   * No nested unions; an inner union flattens into the outer one.
//!   * The same type never appears more than once, under structural
//!     identity (same variant; classes by generic identity plus
//!     specialization arguments; type variables by identity).
//!   * `Never` contributes nothing to a union; a union of nothing is
//!     `Never`.
//!
//! The implication is that `build()` does not necessarily produce a
//! [`Type::Union`]: one distinct element comes back unwrapped.

use std::sync::Arc;

use crate::types::{Type, UnionType};

pub struct UnionBuilder {
    elements: Vec<Type>,
}

impl UnionBuilder {
    pub fn new() -> Self {
        Self {
            elements: Vec::new(),
        }
    }

    /// Adds a type to this union.
    pub fn add(mut self, ty: Type) -> Self {
        match ty {
            Type::Union(union) => {
                self.elements.reserve(union.subtypes().len());
                for element in union.subtypes() {
                    self = self.add(element.clone());
                }
            }
            Type::Never => {}
            _ => {
                if !self.elements.iter().any(|element| element.is_same(&ty)) {
                    self.elements.push(ty);
                }
            }
        }
        self
    }

    pub fn build(self) -> Type {
        let mut elements = self.elements;
        match elements.len() {
            0 => Type::Never,
            1 => elements.pop().expect("length was just checked"),
            _ => Type::Union(Arc::new(UnionType::new(elements))),
        }
    }
}

impl Default for UnionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Combines an arbitrary list of types into their canonical union form:
/// `Never` for no types, the single type for one, a flattened and
/// deduplicated union otherwise.
pub fn combine_types(types: impl IntoIterator<Item = Type>) -> Type {
    let mut builder = UnionBuilder::new();
    for ty in types {
        builder = builder.add(ty);
    }
    builder.build()
}
