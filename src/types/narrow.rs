//! Narrowing glue.
//!
//! Constraint *construction* is the job of an external builder (it knows how
//! to read `isinstance` checks, comparisons against `None`, and so on); the
//! evaluator only pushes and pops constraints around branch evaluation and
//! applies them to computed types. The push/pop discipline is enforced with
//! a drop guard so the stack balances on every exit path.

use std::cell::RefCell;
use std::sync::Arc;

use crate::ast::ExpressionNode;
use crate::scope::{Scope, ScopeKind};
use crate::types::Type;

/// A single narrowing fact, e.g. "`x` is not `None` in this branch".
pub trait TypeConstraint {
    /// Applies the constraint to `ty` if the constraint targets `node`;
    /// returns `ty` unchanged otherwise.
    fn apply_to_type(&self, node: &ExpressionNode, ty: Type) -> Type;

    /// When true for `node`, constraints from enclosing scopes are not
    /// consulted (an inner assignment invalidated them).
    fn blocks_subsequent_constraints(&self, _node: &ExpressionNode) -> bool {
        false
    }
}

/// The two constraint sets a conditional test splits into.
pub struct ConditionalConstraints {
    pub if_constraints: Vec<Arc<dyn TypeConstraint>>,
    pub else_constraints: Vec<Arc<dyn TypeConstraint>>,
}

/// The external constraint builder interface.
pub trait ConstraintBuilder {
    /// Builds the truthy/falsy constraint sets for a conditional test
    /// expression. `eval` lets the builder type subexpressions of the test.
    fn build_for_conditional(
        &self,
        test: &ExpressionNode,
        eval: &mut dyn FnMut(&ExpressionNode) -> Type,
    ) -> ConditionalConstraints;
}

pub(crate) type ConstraintStack = RefCell<Vec<Arc<dyn TypeConstraint>>>;

/// Pushes a batch of constraints onto the expression-local stack and pops
/// them on drop, so unwinding or early returns can't leave the stack
/// unbalanced.
pub(crate) struct ConstraintScope<'a> {
    stack: &'a ConstraintStack,
    base_depth: usize,
}

impl<'a> ConstraintScope<'a> {
    pub(crate) fn push(stack: &'a ConstraintStack, constraints: &[Arc<dyn TypeConstraint>]) -> Self {
        let base_depth = stack.borrow().len();
        stack.borrow_mut().extend(constraints.iter().cloned());
        Self { stack, base_depth }
    }
}

impl Drop for ConstraintScope<'_> {
    fn drop(&mut self) {
        self.stack.borrow_mut().truncate(self.base_depth);
    }
}

/// Applies the expression-local constraint stack to a computed type, in
/// push order.
pub(crate) fn apply_expression_constraints(
    stack: &ConstraintStack,
    node: &ExpressionNode,
    mut ty: Type,
) -> Type {
    for constraint in stack.borrow().iter() {
        ty = constraint.apply_to_type(node, ty);
    }
    ty
}

/// Applies the constraints of the temporary-scope chain, outer scopes first,
/// unless a constraint in an inner scope blocks its parents for this node.
pub(crate) fn apply_scope_constraints(scope: &Arc<Scope>, node: &ExpressionNode, ty: Type) -> Type {
    if scope.kind() != ScopeKind::Temporary {
        return ty;
    }
    let constraints = scope.type_constraints();
    let blocked = constraints
        .iter()
        .any(|constraint| constraint.blocks_subsequent_constraints(node));

    let mut ty = if blocked {
        ty
    } else if let Some(parent) = scope.parent() {
        apply_scope_constraints(parent, node, ty)
    } else {
        ty
    };

    for constraint in &constraints {
        ty = constraint.apply_to_type(node, ty);
    }
    ty
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{AstFactory, TextRange};
    use crate::types::builder::combine_types;
    use crate::types::{ClassType, ClassTypeFlags};

    /// Strips `None` from the type of the named expression.
    struct NotNone {
        target: &'static str,
    }

    impl TypeConstraint for NotNone {
        fn apply_to_type(&self, node: &ExpressionNode, ty: Type) -> Type {
            let applies = node
                .as_name()
                .is_some_and(|name| name.value == self.target);
            if !applies {
                return ty;
            }
            ty.map_subtypes(|subtype| {
                if subtype.is_none() {
                    Type::Never
                } else {
                    subtype.clone()
                }
            })
        }
    }

    struct Blocker;

    impl TypeConstraint for Blocker {
        fn apply_to_type(&self, _node: &ExpressionNode, ty: Type) -> Type {
            ty
        }

        fn blocks_subsequent_constraints(&self, _node: &ExpressionNode) -> bool {
            true
        }
    }

    fn int_object() -> Type {
        Type::object(ClassType::new("int", ClassTypeFlags::BUILT_IN, 1))
    }

    #[test]
    fn constraint_scope_balances_on_drop() {
        let stack: ConstraintStack = RefCell::new(Vec::new());
        let constraint: Arc<dyn TypeConstraint> = Arc::new(NotNone { target: "x" });
        {
            let _scope = ConstraintScope::push(&stack, &[constraint.clone(), constraint]);
            assert_eq!(stack.borrow().len(), 2);
        }
        assert_eq!(stack.borrow().len(), 0);
    }

    #[test]
    fn expression_constraints_narrow_matching_nodes() {
        let factory = AstFactory::new();
        let x = factory.name(TextRange::new(0, 1), "x");
        let y = factory.name(TextRange::new(2, 3), "y");
        let optional_int = combine_types([int_object(), Type::None]);

        let stack: ConstraintStack = RefCell::new(Vec::new());
        let constraint: Arc<dyn TypeConstraint> = Arc::new(NotNone { target: "x" });
        let _scope = ConstraintScope::push(&stack, &[constraint]);

        let narrowed = apply_expression_constraints(&stack, &x, optional_int.clone());
        assert!(narrowed.is_same(&int_object()));

        let untouched = apply_expression_constraints(&stack, &y, optional_int.clone());
        assert!(untouched.is_same(&optional_int));
    }

    #[test]
    fn scope_chain_applies_outer_first_unless_blocked(){
        use crate::scope::Scope;

        let factory = AstFactory::new();
        let x = factory.name(TextRange::new(0, 1), "x");
        let optional_int = combine_types([int_object(), Type::None]);

        let module = Scope::new(ScopeKind::Module, None);
        let outer = Scope::new(ScopeKind::Temporary, Some(module.clone()));
        outer.add_type_constraint(Arc::new(NotNone { target: "x" }));
        let inner = Scope::new(ScopeKind::Temporary, Some(outer.clone()));

        let narrowed = apply_scope_constraints(&inner, &x, optional_int.clone());
        assert!(narrowed.is_same(&int_object()));

        // A blocking constraint in the inner scope hides the outer one.
        let blocked_inner = Scope::new(ScopeKind::Temporary, Some(outer));
        blocked_inner.add_type_constraint(Arc::new(Blocker));
        let unchanged = apply_scope_constraints(&blocked_inner, &x, optional_int.clone());
        assert!(unchanged.is_same(&optional_int));
    }
}
