//! Evaluation context: the diagnostic gateway and the per-node type cache.
//!
//! One context exists per evaluated scope. It tracks reported diagnostics,
//! routes configurable diagnostics through their configured level, and
//! supports a silence scope for speculative overload probing: while a probe
//! is running nothing reaches the sink, and the silence is released on every
//! exit path including unwinds.

use std::cell::{Cell, RefCell};
use std::fmt;

use rustc_hash::FxHashMap;

use crate::ast::{NodeId, TextRange};
use crate::program::{DiagnosticLevel, ProgramSettings};
use crate::types::diagnostic::{Severity, TypeCheckDiagnostic, TypeCheckDiagnostics};
use crate::types::Type;

/// The injected per-node memoization the evaluator reads before dispatch and
/// writes after. Writes must be idempotent: storing the same type twice for
/// one node is permitted.
pub trait ExpressionTypeCache {
    fn get(&self, node: NodeId) -> Option<Type>;
    fn set(&self, node: NodeId, ty: Type);
}

/// The default cache: a hash map per analyzed tree.
#[derive(Debug, Default)]
pub struct NodeTypeCache {
    entries: RefCell<FxHashMap<NodeId, Type>>,
}

impl NodeTypeCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}

impl ExpressionTypeCache for NodeTypeCache {
    fn get(&self, node: NodeId) -> Option<Type> {
        self.entries.borrow().get(&node).cloned()
    }

    fn set(&self, node: NodeId, ty: Type) {
        self.entries.borrow_mut().insert(node, ty);
    }
}

/// Diagnostic sink plus cache handle for one evaluation.
pub struct EvalContext<'a> {
    settings: &'a ProgramSettings,
    cache: &'a dyn ExpressionTypeCache,
    diagnostics: RefCell<TypeCheckDiagnostics>,
    silence_depth: Cell<u32>,
}

impl<'a> EvalContext<'a> {
    pub fn new(settings: &'a ProgramSettings, cache: &'a dyn ExpressionTypeCache) -> Self {
        Self {
            settings,
            cache,
            diagnostics: RefCell::new(TypeCheckDiagnostics::new()),
            silence_depth: Cell::new(0),
        }
    }

    pub fn settings(&self) -> &ProgramSettings {
        self.settings
    }

    pub fn cached_type(&self, node: NodeId) -> Option<Type> {
        self.cache.get(node)
    }

    pub fn write_cache(&self, node: NodeId, ty: Type) {
        self.cache.set(node, ty);
    }

    pub fn is_silenced(&self) -> bool {
        self.silence_depth.get() > 0
    }

    /// Runs `f` with the diagnostic sink detached. Used for speculative
    /// overload probing; the guard restores the sink even if `f` unwinds.
    pub fn with_silenced_diagnostics<R>(&self, f: impl FnOnce() -> R) -> R {
        let _guard = SilenceGuard::new(&self.silence_depth);
        f()
    }

    pub fn report_error(&self, range: TextRange, message: fmt::Arguments) {
        self.report(Severity::Error, range, message);
    }

    pub fn report_warning(&self, range: TextRange, message: fmt::Arguments) {
        self.report(Severity::Warning, range, message);
    }

    /// Routes a configurable diagnostic through its configured level;
    /// `DiagnosticLevel::None` suppresses it entirely.
    pub fn report_configurable(
        &self,
        level: DiagnosticLevel,
        range: TextRange,
        message: fmt::Arguments,
    ) {
        match level {
            DiagnosticLevel::None => {}
            DiagnosticLevel::Warning => self.report_warning(range, message),
            DiagnosticLevel::Error => self.report_error(range, message),
        }
    }

    fn report(&self, severity: Severity, range: TextRange, message: fmt::Arguments) {
        if self.is_silenced() {
            return;
        }
        self.diagnostics.borrow_mut().push(TypeCheckDiagnostic {
            severity,
            message: message.to_string(),
            range,
        });
    }

    pub fn diagnostic_count(&self) -> usize {
        self.diagnostics.borrow().len()
    }

    /// Consumes the context and surrenders the collected diagnostics.
    #[must_use]
    pub fn finish(self) -> TypeCheckDiagnostics {
        let mut diagnostics = self.diagnostics.into_inner();
        diagnostics.shrink_to_fit();
        diagnostics
    }
}

impl fmt::Debug for EvalContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EvalContext")
            .field("diagnostics", &self.diagnostics.borrow().len())
            .field("silenced", &self.is_silenced())
            .finish()
    }
}

struct SilenceGuard<'a> {
    depth: &'a Cell<u32>,
}

impl<'a> SilenceGuard<'a> {
    fn new(depth: &'a Cell<u32>) -> Self {
        depth.set(depth.get() + 1);
        Self { depth }
    }
}

impl Drop for SilenceGuard<'_> {
    fn drop(&mut self) {
        self.depth.set(self.depth.get() - 1);
    }
}
