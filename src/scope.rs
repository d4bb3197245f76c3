//! The lexical-scope surface consumed from the scope/symbol builder.
//!
//! Scope construction and symbol interning happen upstream; the evaluator
//! only reads the chain. Symbols record their declarations plus the current
//! and inferred types the binder assigned.

use std::cell::RefCell;
use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::name::Name;
use crate::types::narrow::TypeConstraint;
use crate::types::Type;

/// What kind of scope a [`Scope`] is.
///
/// Only `Temporary` scopes (conditional execution contexts) carry narrowing
/// constraints; all other kinds are permanent.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ScopeKind {
    Builtin,
    Module,
    Function,
    Class,
    Temporary,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum DeclarationCategory {
    Variable,
    Class,
    Function,
    Method,
    Parameter,
    Module,
}

#[derive(Clone, Debug)]
pub struct Declaration {
    pub category: DeclarationCategory,
    pub declared_ty: Option<Type>,
}

/// A named binding with its declarations and binder-assigned types.
#[derive(Clone, Debug)]
pub struct Symbol {
    declarations: Vec<Declaration>,
    current_ty: Type,
    inferred_ty: Type,
}

impl Symbol {
    pub fn new(category: DeclarationCategory, ty: Type) -> Self {
        Self {
            declarations: vec![Declaration {
                category,
                declared_ty: Some(ty.clone()),
            }],
            current_ty: ty.clone(),
            inferred_ty: ty,
        }
    }

    /// A variable binding with no declared type; name resolution falls
    /// through to the inferred type.
    pub fn inferred(ty: Type) -> Self {
        Self {
            declarations: vec![Declaration {
                category: DeclarationCategory::Variable,
                declared_ty: None,
            }],
            current_ty: ty.clone(),
            inferred_ty: ty,
        }
    }

    pub fn with_current_type(mut self, ty: Type) -> Self {
        self.current_ty = ty;
        self
    }

    pub fn add_declaration(&mut self, declaration: Declaration) {
        self.declarations.push(declaration);
    }

    pub fn declarations(&self) -> &[Declaration] {
        &self.declarations
    }

    pub fn current_type(&self) -> &Type {
        &self.current_ty
    }

    pub fn inferred_type(&self) -> &Type {
        &self.inferred_ty
    }

    /// The type name resolution sees: the declared type when one exists,
    /// the current type for non-variable symbols, the inferred type
    /// otherwise.
    pub fn effective_type(&self) -> Type {
        if let Some(declared) = self
            .declarations
            .iter()
            .find_map(|declaration| declaration.declared_ty.clone())
        {
            return declared;
        }
        let non_variable = self
            .declarations
            .iter()
            .any(|declaration| declaration.category != DeclarationCategory::Variable);
        if non_variable {
            self.current_ty.clone()
        } else {
            self.inferred_ty.clone()
        }
    }
}

/// A successful recursive symbol lookup: the symbol plus the scope that
/// defined it.
#[derive(Clone)]
pub struct SymbolLookup {
    pub symbol: Symbol,
    pub scope: Arc<Scope>,
}

/// One link of the lexical scope chain.
pub struct Scope {
    kind: ScopeKind,
    parent: Option<Arc<Scope>>,
    symbols: RefCell<FxHashMap<Name, Symbol>>,
    type_constraints: RefCell<Vec<Arc<dyn TypeConstraint>>>,
}

impl Scope {
    pub fn new(kind: ScopeKind, parent: Option<Arc<Scope>>) -> Arc<Self> {
        Arc::new(Self {
            kind,
            parent,
            symbols: RefCell::new(FxHashMap::default()),
            type_constraints: RefCell::new(Vec::new()),
        })
    }

    pub fn kind(&self) -> ScopeKind {
        self.kind
    }

    pub fn parent(&self) -> Option<&Arc<Scope>> {
        self.parent.as_ref()
    }

    pub fn add_symbol(&self, name: impl Into<Name>, symbol: Symbol) {
        self.symbols.borrow_mut().insert(name.into(), symbol);
    }

    pub fn lookup_symbol(&self, name: &str) -> Option<Symbol> {
        self.symbols.borrow().get(name).cloned()
    }

    /// Walks the scope chain from the innermost scope outward and returns
    /// the first symbol with the given name.
    pub fn lookup_symbol_recursive(self: &Arc<Self>, name: &str) -> Option<SymbolLookup> {
        let mut scope = self;
        loop {
            if let Some(symbol) = scope.lookup_symbol(name) {
                return Some(SymbolLookup {
                    symbol,
                    scope: scope.clone(),
                });
            }
            scope = scope.parent()?;
        }
    }

    pub fn add_type_constraint(&self, constraint: Arc<dyn TypeConstraint>) {
        self.type_constraints.borrow_mut().push(constraint);
    }

    pub fn type_constraints(&self) -> Vec<Arc<dyn TypeConstraint>> {
        self.type_constraints.borrow().clone()
    }
}

impl std::fmt::Debug for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scope")
            .field("kind", &self.kind)
            .field("symbols", &self.symbols.borrow().len())
            .field("constraints", &self.type_constraints.borrow().len())
            .finish()
    }
}

/// Looks up a name in the builtin scope at the root of the chain.
pub fn get_builtin_type(scope: &Arc<Scope>, name: &str) -> Option<Type> {
    let mut current = scope;
    loop {
        if current.kind() == ScopeKind::Builtin {
            return current.lookup_symbol(name).map(|s| s.effective_type());
        }
        current = current.parent()?;
    }
}

/// Looks up a builtin class by name and returns an instance of it,
/// optionally specialized with the given type arguments.
pub fn get_builtin_object(
    scope: &Arc<Scope>,
    name: &str,
    type_args: Option<Vec<Type>>,
) -> Option<Type> {
    let ty = get_builtin_type(scope, name)?;
    match ty {
        Type::Class(class) => {
            let class = match type_args {
                Some(args) => class.clone_for_specialization(args),
                None => class,
            };
            Some(Type::object(class))
        }
        _ => Some(ty),
    }
}
