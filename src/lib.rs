//! Expression-level type evaluation for a gradually-typed, class-based
//! language with PEP 484 surface conventions.
//!
//! The crate's center is [`types::TypeEvaluator`]: given an expression parse
//! tree and a lexical scope, it computes static types, reports diagnostics
//! through a collected sink, memoizes per-node results through an injected
//! cache, and specializes generic classes and callables. The tokenizer,
//! parser, scope builder, and narrowing-constraint builder are external
//! collaborators; their consumed surfaces live in [`ast`], [`scope`],
//! [`program`], and the traits in [`types`].

use std::hash::BuildHasherDefault;

use rustc_hash::FxHasher;

pub use types::{Type, TypeEvaluator};

pub mod ast;
pub mod name;
pub mod program;
pub mod scope;
pub mod testing;
pub mod types;

pub(crate) type FxOrderMap<K, V> = ordermap::map::OrderMap<K, V, BuildHasherDefault<FxHasher>>;
