//! The expression dispatcher.
//!
//! [`TypeEvaluator`] owns the recursive walk over expression nodes. The
//! entry point consults the injected per-node cache, dispatches on the node
//! kind, pipes the computed type through the narrowing machinery, and writes
//! the result back to the cache. Diagnostic errors never abort evaluation;
//! the offending subexpression resolves to `Unknown` and the walk continues.

use std::cell::Cell;
use std::sync::Arc;

use crate::ast::{
    AssignmentNode, BinaryOperationNode, CallNode, ConstantNode, DictNode, ExpressionNode,
    IndexNode, KeywordType, LambdaNode, ListComprehensionNode, ListNode, NameNode, NumberLiteral,
    NumberNode, OperatorType, SetNode, SliceNode, StringNode, TernaryNode, TextRange, TupleNode,
    UnaryOperationNode,
};
use bitflags::bitflags;

use crate::name::Name;
use crate::program::ProgramSettings;
use crate::scope::{get_builtin_object, get_builtin_type, Scope};
use crate::types::assignability::{can_assign_type, specialize_type, TypeVarMap};
use crate::types::builder::{combine_types, UnionBuilder};
use crate::types::call::{self, CallArguments, FunctionArgument};
use crate::types::context::{EvalContext, ExpressionTypeCache};
use crate::types::member::{self, MemberAccessFlags, MemberAccessUsage};
use crate::types::narrow::{
    apply_expression_constraints, apply_scope_constraints, ConditionalConstraints,
    ConstraintBuilder, ConstraintScope, ConstraintStack,
};
use crate::types::special_form;
use crate::types::{
    bind_function_to_class_or_object, convert_class_to_object, lookup_class_member,
    remove_falsiness, remove_truthiness, ClassMemberLookupFlags, ClassType, FunctionParameter,
    FunctionType, FunctionTypeFlags, KnownClass, ObjectType, Type, TypeCheckDiagnostics,
};

/// Expression depth is bounded only by parse-tree depth; past this the
/// evaluator reports instead of blowing the stack.
const MAX_EXPRESSION_DEPTH: u32 = 512;

/// Synthesized classes (named tuples) get source ids from this range so they
/// can't collide with binder-assigned ids.
const SYNTHESIZED_SOURCE_ID_BASE: u32 = 0x8000_0000;

bitflags! {
    #[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
    pub struct EvaluatorFlags: u8 {
        /// Evaluate a literal `...` as plain `Any` instead of the
        /// ellipsis-tagged form.
        const CONVERT_ELLIPSIS_TO_ANY = 1 << 0;
    }
}

/// Previously-analyzed expression types (lambdas, enclosing functions)
/// supplied by the surrounding analyzer.
pub trait ExpressionTypeProvider {
    fn get_expression_type(&self, node: &ExpressionNode) -> Option<Type>;
}

/// The evaluated form of one type argument. `type_list` carries the
/// unnested list used for `Callable[[A, B], R]` parameter lists.
pub struct TypeResult<'n> {
    pub ty: Type,
    pub type_list: Option<Vec<TypeResult<'n>>>,
    pub node: &'n ExpressionNode,
}

/// The expression type evaluator for a single scope.
///
/// Single-threaded by design: evaluator state (the scope handle, the
/// narrowing stack, the diagnostic sink) must not be shared across threads.
/// Analyze scopes in parallel by building one evaluator per scope.
pub struct TypeEvaluator<'a> {
    scope: Arc<Scope>,
    ctx: EvalContext<'a>,
    constraint_builder: Option<&'a dyn ConstraintBuilder>,
    type_provider: Option<&'a dyn ExpressionTypeProvider>,
    enclosing_function: Option<Arc<FunctionType>>,
    expression_constraints: ConstraintStack,
    depth: Cell<u32>,
    next_synthesized_id: Cell<u32>,
}

impl<'a> TypeEvaluator<'a> {
    pub fn new(
        scope: Arc<Scope>,
        settings: &'a ProgramSettings,
        cache: &'a dyn ExpressionTypeCache,
    ) -> Self {
        Self {
            scope,
            ctx: EvalContext::new(settings, cache),
            constraint_builder: None,
            type_provider: None,
            enclosing_function: None,
            expression_constraints: ConstraintStack::default(),
            depth: Cell::new(0),
            next_synthesized_id: Cell::new(SYNTHESIZED_SOURCE_ID_BASE),
        }
    }

    pub fn with_constraint_builder(mut self, builder: &'a dyn ConstraintBuilder) -> Self {
        self.constraint_builder = Some(builder);
        self
    }

    pub fn with_expression_type_provider(
        mut self,
        provider: &'a dyn ExpressionTypeProvider,
    ) -> Self {
        self.type_provider = Some(provider);
        self
    }

    /// Sets the function whose body is being evaluated; `yield` expressions
    /// read their send type from its declared generator return type.
    pub fn with_enclosing_function(mut self, function: Arc<FunctionType>) -> Self {
        self.enclosing_function = Some(function);
        self
    }

    pub fn scope(&self) -> &Arc<Scope> {
        &self.scope
    }

    pub(crate) fn context(&self) -> &EvalContext<'a> {
        &self.ctx
    }

    pub(crate) fn next_synthesized_source_id(&self) -> u32 {
        let id = self.next_synthesized_id.get();
        self.next_synthesized_id.set(id + 1);
        id
    }

    /// Consumes the evaluator and surrenders the collected diagnostics.
    #[must_use]
    pub fn finish(self) -> TypeCheckDiagnostics {
        self.ctx.finish()
    }

    /// The public entry: computes the static type of `node`.
    pub fn get_type(&self, node: &ExpressionNode) -> Type {
        self.get_type_with_usage(node, MemberAccessUsage::Get, EvaluatorFlags::empty())
    }

    pub fn get_type_with_usage(
        &self,
        node: &ExpressionNode,
        usage: MemberAccessUsage,
        flags: EvaluatorFlags,
    ) -> Type {
        // Only `Get` results are memoized; set/delete resolutions depend on
        // the usage and stay out of the shared cache.
        if usage != MemberAccessUsage::Get {
            return self.evaluate(node, usage, flags);
        }
        if let Some(cached) = self.ctx.cached_type(node.id()) {
            return cached;
        }
        let ty = self.evaluate(node, usage, flags);
        self.ctx.write_cache(node.id(), ty.clone());
        ty
    }

    fn evaluate(
        &self,
        node: &ExpressionNode,
        usage: MemberAccessUsage,
        flags: EvaluatorFlags,
    ) -> Type {
        let depth = self.depth.get();
        let _span = (depth == 0)
            .then(|| tracing::trace_span!("get_type", node = node.id().as_u32()).entered());

        if depth >= MAX_EXPRESSION_DEPTH {
            self.ctx.report_error(
                node.range(),
                format_args!("Maximum expression evaluation depth exceeded"),
            );
            return Type::Unknown;
        }
        self.depth.set(depth + 1);
        let ty = self.infer_expression(node, usage, flags);
        self.depth.set(depth);

        let ty = apply_expression_constraints(&self.expression_constraints, node, ty);
        apply_scope_constraints(&self.scope, node, ty)
    }

    fn infer_expression(
        &self,
        node: &ExpressionNode,
        usage: MemberAccessUsage,
        flags: EvaluatorFlags,
    ) -> Type {
        match node {
            ExpressionNode::Name(name) => self.infer_name(name),
            ExpressionNode::MemberAccess(access) => {
                let base = self.get_type(&access.left);
                member::get_type_from_member_access(
                    &self.ctx,
                    &base,
                    &access.member,
                    access.range,
                    usage,
                    MemberAccessFlags::empty(),
                )
            }
            ExpressionNode::Index(index) => self.infer_index(index),
            ExpressionNode::Call(call) => self.infer_call(call),
            ExpressionNode::Tuple(tuple) => self.infer_tuple(tuple),
            ExpressionNode::List(list) => self.infer_list(list),
            ExpressionNode::Set(set) => self.infer_set(set),
            ExpressionNode::Dict(dict) => self.infer_dict(dict),
            ExpressionNode::Number(number) => self.infer_number(number),
            ExpressionNode::StringLiteral(string) => self.infer_string(string),
            ExpressionNode::Constant(constant) => self.infer_constant(constant),
            ExpressionNode::Ellipsis(_) => {
                if flags.contains(EvaluatorFlags::CONVERT_ELLIPSIS_TO_ANY) {
                    Type::any()
                } else {
                    Type::ellipsis()
                }
            }
            ExpressionNode::UnaryOperation(unary) => self.infer_unary_operation(unary),
            ExpressionNode::BinaryOperation(binary) => self.infer_binary_operation(binary),
            ExpressionNode::Ternary(ternary) => self.infer_ternary(ternary),
            ExpressionNode::Await(await_node) => {
                let operand = self.get_type(&await_node.expression);
                self.get_type_from_awaitable(&operand, await_node.expression.range())
            }
            ExpressionNode::Yield(yield_node) => {
                if let Some(expression) = &yield_node.expression {
                    self.get_type(expression);
                }
                self.generator_send_type()
            }
            ExpressionNode::YieldFrom(yield_from) => {
                self.get_type(&yield_from.expression);
                self.generator_send_type()
            }
            ExpressionNode::Lambda(lambda) => self.infer_lambda(node, lambda),
            ExpressionNode::ListComprehension(comprehension) => {
                self.infer_list_comprehension(comprehension)
            }
            ExpressionNode::Slice(slice) => self.infer_slice(slice),
            ExpressionNode::Assignment(assignment) => self.infer_assignment(assignment),
            ExpressionNode::TypeAnnotation(annotation) => {
                let annotation_ty = self.get_type(&annotation.annotation);
                convert_class_to_object(&annotation_ty)
            }
        }
    }

    fn infer_name(&self, node: &NameNode) -> Type {
        match self.scope.lookup_symbol_recursive(&node.value) {
            Some(lookup) => lookup.symbol.effective_type(),
            None => {
                self.ctx.report_error(
                    node.range,
                    format_args!("'{}' is not defined", node.value),
                );
                Type::Unknown
            }
        }
    }

    fn infer_index(&self, node: &IndexNode) -> Type {
        let base = self.get_type(&node.base);
        let type_args = self.get_type_args(&node.items);

        base.map_subtypes(|subtype| match subtype {
            Type::Any { .. } | Type::Unknown => Type::Unknown,
            Type::Class(class) => {
                special_form::create_specialized_class_type(self, class, &type_args, node.range)
            }
            Type::None => {
                self.ctx.report_configurable(
                    self.ctx.settings().report_optional_subscript,
                    node.base.range(),
                    format_args!("Optional of type 'None' cannot be subscripted"),
                );
                Type::Unknown
            }
            // TODO: subscripting an object should resolve through its
            // `__getitem__`; functions would need a generic-alias model.
            _ => Type::Unknown,
        })
    }

    fn get_type_args<'n>(&self, items: &'n [ExpressionNode]) -> Vec<TypeResult<'n>> {
        items.iter().map(|item| self.get_type_arg(item)).collect()
    }

    fn get_type_arg<'n>(&self, node: &'n ExpressionNode) -> TypeResult<'n> {
        if let ExpressionNode::List(list) = node {
            TypeResult {
                ty: Type::Unknown,
                type_list: Some(
                    list.items
                        .iter()
                        .map(|item| self.get_type_arg(item))
                        .collect(),
                ),
                node,
            }
        } else {
            TypeResult {
                ty: self.get_type(node),
                type_list: None,
                node,
            }
        }
    }

    fn infer_call(&self, node: &CallNode) -> Type {
        let callee = self.get_type(&node.left);
        let arguments: Vec<FunctionArgument<'_>> = node
            .arguments
            .iter()
            .map(|argument| FunctionArgument {
                category: argument.category,
                name: argument.name.clone(),
                value_expression: Some(&argument.value),
                ty: self.get_type(&argument.value),
            })
            .collect();
        let args = CallArguments::new(arguments);
        let mut type_var_map = TypeVarMap::new();
        self.validate_call_arguments(node.range, &args, &callee, &mut type_var_map)
            .unwrap_or(Type::Unknown)
    }

    /// Dispatches a call over the callee's shape. Returns `None` when the
    /// call failed validation (diagnostics already reported).
    pub(crate) fn validate_call_arguments(
        &self,
        error_range: TextRange,
        args: &CallArguments<'_>,
        callee: &Type,
        type_var_map: &mut TypeVarMap,
    ) -> Option<Type> {
        match callee {
            Type::Any { .. } | Type::Unknown => Some(Type::Unknown),
            Type::Function(function) => call::validate_function_arguments(
                &self.ctx,
                error_range,
                args,
                function,
                type_var_map,
            ),
            Type::Overloaded(overloaded) => {
                // Probe each overload with diagnostics silenced; the first
                // that matches wins.
                for overload in overloaded.overloads() {
                    let mut overload_map = TypeVarMap::new();
                    let result = self.ctx.with_silenced_diagnostics(|| {
                        call::validate_function_arguments(
                            &self.ctx,
                            error_range,
                            args,
                            overload,
                            &mut overload_map,
                        )
                    });
                    if let Some(ty) = result {
                        return Some(ty);
                    }
                }
                self.ctx
                    .report_error(error_range, format_args!("No overloads match parameters"));
                None
            }
            Type::Class(class) => {
                if class.is_special_built_in() {
                    match class.name().as_str() {
                        "TypeVar" => {
                            return special_form::create_type_var_type(self, error_range, args)
                        }
                        "NamedTuple" => {
                            return special_form::create_named_tuple_type(self, error_range, args)
                        }
                        _ => {}
                    }
                }
                call::validate_constructor_arguments(&self.ctx, error_range, args, class)
            }
            Type::Object(object) => {
                let call_member = lookup_class_member(
                    &object.class,
                    "__call__",
                    ClassMemberLookupFlags::SKIP_INSTANCE_MEMBERS,
                );
                if let Some(hit) = call_member {
                    let member_ty = hit.symbol.effective_type();
                    let member_ty = if object.class.type_args().is_some() {
                        specialize_type(&member_ty, &TypeVarMap::from_class(&object.class))
                    } else {
                        member_ty
                    };
                    let bound = bind_function_to_class_or_object(
                        &Type::Object(object.clone()),
                        member_ty,
                    );
                    return self.validate_call_arguments(error_range, args, &bound, type_var_map);
                }
                self.ctx.report_error(
                    error_range,
                    format_args!("Object of type '{}' cannot be called", callee.display()),
                );
                None
            }
            Type::Union(union) => {
                let mut builder = UnionBuilder::new();
                for subtype in union.subtypes() {
                    if subtype.is_none() {
                        self.ctx.report_configurable(
                            self.ctx.settings().report_optional_call,
                            error_range,
                            format_args!("Object of type 'None' cannot be called"),
                        );
                        continue;
                    }
                    let mut branch_map = TypeVarMap::new();
                    let branch = self
                        .validate_call_arguments(error_range, args, subtype, &mut branch_map)
                        .unwrap_or(Type::Unknown);
                    builder = builder.add(branch);
                }
                Some(builder.build())
            }
            Type::None => {
                self.ctx.report_configurable(
                    self.ctx.settings().report_optional_call,
                    error_range,
                    format_args!("Object of type 'None' cannot be called"),
                );
                None
            }
            Type::TypeVar(type_var) => match type_var.bound.clone() {
                Some(bound) => self.validate_call_arguments(error_range, args, &bound, type_var_map),
                None => {
                    self.ctx.report_error(
                        error_range,
                        format_args!("'{}' is not callable", callee.display()),
                    );
                    None
                }
            },
            _ => {
                self.ctx.report_error(
                    error_range,
                    format_args!("'{}' is not callable", callee.display()),
                );
                None
            }
        }
    }

    fn infer_tuple(&self, node: &TupleNode) -> Type {
        let entry_types: Vec<Type> = node.items.iter().map(|item| self.get_type(item)).collect();
        get_builtin_object(&self.scope, "tuple", Some(entry_types)).unwrap_or(Type::Unknown)
    }

    fn infer_list(&self, node: &ListNode) -> Type {
        let element = self.combined_element_type(&node.items);
        get_builtin_object(&self.scope, "list", Some(vec![element])).unwrap_or(Type::Unknown)
    }

    fn infer_set(&self, node: &SetNode) -> Type {
        let element = self.combined_element_type(&node.items);
        get_builtin_object(&self.scope, "set", Some(vec![element])).unwrap_or(Type::Unknown)
    }

    fn combined_element_type(&self, items: &[ExpressionNode]) -> Type {
        let combined = combine_types(items.iter().map(|item| self.get_type(item)));
        if combined.is_never() {
            Type::Unknown
        } else {
            combined
        }
    }

    fn infer_dict(&self, node: &DictNode) -> Type {
        for entry in &node.entries {
            self.get_type(&entry.key);
            self.get_type(&entry.value);
        }
        // Key/value inference from the entries is deferred; the dict is
        // specialized as dict[Unknown, Unknown] in this revision.
        get_builtin_object(&self.scope, "dict", Some(vec![Type::Unknown, Type::Unknown]))
            .unwrap_or(Type::Unknown)
    }

    fn infer_number(&self, node: &NumberNode) -> Type {
        let class_name = match node.value {
            NumberLiteral::Integer(_) => "int",
            NumberLiteral::Float(_) => "float",
        };
        get_builtin_object(&self.scope, class_name, None).unwrap_or(Type::Unknown)
    }

    fn infer_string(&self, node: &StringNode) -> Type {
        // A literal carrying a type-comment annotation means the annotated
        // type, not `str`.
        if let Some(annotation) = &node.type_annotation {
            return self.get_type(annotation);
        }
        get_builtin_object(&self.scope, "str", None).unwrap_or(Type::Unknown)
    }

    fn infer_constant(&self, node: &ConstantNode) -> Type {
        match node.keyword {
            KeywordType::None => Type::None,
            KeywordType::True | KeywordType::False => {
                match get_builtin_type(&self.scope, "bool") {
                    Some(Type::Class(bool_class)) => Type::object_with_truthiness(
                        bool_class,
                        node.keyword == KeywordType::True,
                    ),
                    _ => Type::Unknown,
                }
            }
            KeywordType::Debug => self.builtin_bool_object(),
        }
    }

    fn builtin_bool_object(&self) -> Type {
        get_builtin_object(&self.scope, "bool", None).unwrap_or(Type::Unknown)
    }

    fn infer_unary_operation(&self, node: &UnaryOperationNode) -> Type {
        let operand = self.get_type(&node.expression);
        match node.operator {
            OperatorType::Not => self.builtin_bool_object(),
            OperatorType::Add => {
                self.get_type_from_magic_method_return(&operand, None, "__pos__", node)
            }
            OperatorType::Subtract => {
                self.get_type_from_magic_method_return(&operand, None, "__neg__", node)
            }
            // NB: the invert hook is probed as '__inv__', but the language's
            // canonical dunder is '__invert__'.
            OperatorType::BitwiseInvert => {
                self.get_type_from_magic_method_return(&operand, None, "__inv__", node)
            }
            _ => Type::Unknown,
        }
    }

    fn infer_binary_operation(&self, node: &BinaryOperationNode) -> Type {
        match node.operator {
            OperatorType::And | OperatorType::Or => self.infer_boolean_operation(node),
            OperatorType::Is
            | OperatorType::IsNot
            | OperatorType::In
            | OperatorType::NotIn => {
                self.get_type(&node.left);
                self.get_type(&node.right);
                self.builtin_bool_object()
            }
            OperatorType::Add
            | OperatorType::Subtract
            | OperatorType::Multiply
            | OperatorType::MatrixMultiply
            | OperatorType::Divide
            | OperatorType::FloorDivide
            | OperatorType::Mod
            | OperatorType::Power => self.infer_arithmetic_operation(node),
            OperatorType::BitwiseAnd
            | OperatorType::BitwiseOr
            | OperatorType::BitwiseXor
            | OperatorType::LeftShift
            | OperatorType::RightShift => self.infer_bitwise_operation(node),
            OperatorType::Equals
            | OperatorType::NotEquals
            | OperatorType::LessThan
            | OperatorType::LessThanOrEqual
            | OperatorType::GreaterThan
            | OperatorType::GreaterThanOrEqual => self.infer_comparison_operation(node),
            _ => {
                // Augmented-assignment operators don't occur in expression
                // position; evaluate the operands and move on.
                self.get_type(&node.left);
                self.get_type(&node.right);
                Type::Unknown
            }
        }
    }

    fn infer_arithmetic_operation(&self, node: &BinaryOperationNode) -> Type {
        let left = self.get_type(&node.left);
        let right = self.get_type(&node.right);

        // The matrix-multiply operator takes no part in numeric promotion.
        if node.operator != OperatorType::MatrixMultiply {
            if let Some(promoted) = self.numeric_promotion(&left, &right) {
                return promoted;
            }
        }

        let method = match node.operator {
            OperatorType::Add => "__add__",
            OperatorType::Subtract => "__sub__",
            OperatorType::Multiply => "__mul__",
            OperatorType::MatrixMultiply => "__matmul__",
            OperatorType::Divide => "__truediv__",
            OperatorType::FloorDivide => "__floordiv__",
            OperatorType::Mod => "__mod__",
            _ => "__pow__",
        };
        self.binary_magic_method(node, &left, &right, method, None)
    }

    /// int ⟶ float ⟶ complex promotion for the arithmetic operators; the
    /// int/int quotient stays int in this revision.
    fn numeric_promotion(&self, left: &Type, right: &Type) -> Option<Type> {
        fn rank(ty: &Type) -> Option<u8> {
            let object = ty.as_object()?;
            if object.class.is_known(KnownClass::Int) {
                Some(0)
            } else if object.class.is_known(KnownClass::Float) {
                Some(1)
            } else if object.class.is_known(KnownClass::Complex) {
                Some(2)
            } else {
                None
            }
        }
        let class_name = match rank(left)?.max(rank(right)?) {
            0 => "int",
            1 => "float",
            _ => "complex",
        };
        get_builtin_object(&self.scope, class_name, None)
    }

    fn infer_bitwise_operation(&self, node: &BinaryOperationNode) -> Type {
        let left = self.get_type(&node.left);
        let right = self.get_type(&node.right);

        let both_int = [&left, &right].iter().all(|ty| {
            ty.as_object()
                .is_some_and(|object| object.class.is_known(KnownClass::Int))
        });
        if both_int {
            return get_builtin_object(&self.scope, "int", None).unwrap_or(Type::Unknown);
        }

        let method = match node.operator {
            OperatorType::BitwiseAnd => "__and__",
            OperatorType::BitwiseOr => "__or__",
            OperatorType::BitwiseXor => "__xor__",
            OperatorType::LeftShift => "__lshift__",
            _ => "__rshift__",
        };
        self.binary_magic_method(node, &left, &right, method, None)
    }

    fn infer_comparison_operation(&self, node: &BinaryOperationNode) -> Type {
        let left = self.get_type(&node.left);
        let right = self.get_type(&node.right);
        let method = match node.operator {
            OperatorType::Equals => "__eq__",
            OperatorType::NotEquals => "__ne__",
            OperatorType::LessThan => "__lt__",
            OperatorType::LessThanOrEqual => "__le__",
            OperatorType::GreaterThan => "__gt__",
            _ => "__ge__",
        };
        let fallback = Some(self.builtin_bool_object());
        self.binary_magic_method(node, &left, &right, method, fallback)
    }

    fn infer_boolean_operation(&self, node: &BinaryOperationNode) -> Type {
        let left = self.get_type(&node.left);
        let conditional = self.build_conditional_constraints(&node.left);

        match node.operator {
            OperatorType::And => {
                // The right operand only evaluates when the left was truthy.
                let right = {
                    let _scope = ConstraintScope::push(
                        &self.expression_constraints,
                        &conditional.if_constraints,
                    );
                    self.get_type(&node.right)
                };
                combine_types([remove_truthiness(&left), right])
            }
            _ => {
                let right = {
                    let _scope = ConstraintScope::push(
                        &self.expression_constraints,
                        &conditional.else_constraints,
                    );
                    self.get_type(&node.right)
                };
                combine_types([remove_falsiness(&left), right])
            }
        }
    }

    fn build_conditional_constraints(&self, test: &ExpressionNode) -> ConditionalConstraints {
        match self.constraint_builder {
            Some(builder) => builder.build_for_conditional(test, &mut |node| self.get_type(node)),
            None => ConditionalConstraints {
                if_constraints: Vec::new(),
                else_constraints: Vec::new(),
            },
        }
    }

    fn binary_magic_method(
        &self,
        node: &BinaryOperationNode,
        left: &Type,
        right: &Type,
        method: &str,
        fallback: Option<Type>,
    ) -> Type {
        left.map_subtypes(|subtype| {
            if subtype.is_any_or_unknown() {
                return Type::Unknown;
            }
            if let Some(return_ty) = self.magic_method_return(subtype, Some(right), method) {
                return return_ty;
            }
            if let Some(fallback) = &fallback {
                return fallback.clone();
            }
            self.ctx.report_error(
                node.range,
                format_args!(
                    "Operator '{}' not supported for types '{}' and '{}'",
                    node.operator.display(),
                    subtype.display(),
                    right.display()
                ),
            );
            Type::Unknown
        })
    }

    fn get_type_from_magic_method_return(
        &self,
        operand: &Type,
        right: Option<&Type>,
        method: &str,
        node: &UnaryOperationNode,
    ) -> Type {
        operand.map_subtypes(|subtype| {
            if subtype.is_any_or_unknown() {
                return Type::Unknown;
            }
            if let Some(return_ty) = self.magic_method_return(subtype, right, method) {
                return return_ty;
            }
            self.ctx.report_error(
                node.range,
                format_args!(
                    "Operator '{}' not supported for type '{}'",
                    node.operator.display(),
                    subtype.display()
                ),
            );
            Type::Unknown
        })
    }

    /// Looks the dunder up on the operand's class (raw method lookup, no
    /// descriptor or getattr fallback), binds it, and silently checks the
    /// right operand against its first parameter.
    fn magic_method_return(&self, operand: &Type, right: Option<&Type>, method: &str) -> Option<Type> {
        let Type::Object(object) = operand else {
            return None;
        };
        let hit = lookup_class_member(
            &object.class,
            method,
            ClassMemberLookupFlags::SKIP_INSTANCE_MEMBERS,
        )?;
        let member_ty = hit.symbol.effective_type();
        let member_ty = if object.class.type_args().is_some() {
            specialize_type(&member_ty, &TypeVarMap::from_class(&object.class))
        } else {
            member_ty
        };
        let bound = bind_function_to_class_or_object(&Type::Object(object.clone()), member_ty);
        let Type::Function(function) = bound else {
            return None;
        };
        if let Some(right) = right {
            let accepts = function
                .parameters()
                .first()
                .map(|param| can_assign_type(&param.ty, right, None))
                .unwrap_or(false);
            if !accepts {
                return None;
            }
        }
        Some(function.effective_return_type())
    }

    fn infer_ternary(&self, node: &TernaryNode) -> Type {
        self.get_type(&node.test_expression);
        let conditional = self.build_conditional_constraints(&node.test_expression);

        let if_ty = {
            let _scope = ConstraintScope::push(
                &self.expression_constraints,
                &conditional.if_constraints,
            );
            self.get_type(&node.if_expression)
        };
        let else_ty = {
            let _scope = ConstraintScope::push(
                &self.expression_constraints,
                &conditional.else_constraints,
            );
            self.get_type(&node.else_expression)
        };
        combine_types([if_ty, else_ty])
    }

    fn infer_lambda(&self, node: &ExpressionNode, lambda: &LambdaNode) -> Type {
        if let Some(provider) = self.type_provider {
            if let Some(analyzed) = provider.get_expression_type(node) {
                return analyzed;
            }
        }

        let mut function = FunctionType::new(FunctionTypeFlags::empty());
        for parameter in &lambda.parameters {
            function.add_parameter(FunctionParameter {
                category: parameter.category,
                name: parameter.name.clone(),
                has_default: parameter.default_value.is_some(),
                default_ty: parameter
                    .default_value
                    .as_ref()
                    .map(|default| self.get_type(default)),
                ty: Type::Unknown,
            });
        }
        function.set_inferred_return_type(Some(self.get_type(&lambda.expression)));
        Type::function(function)
    }

    fn infer_list_comprehension(&self, node: &ListComprehensionNode) -> Type {
        self.get_type(&node.iterable);
        self.get_type(&node.expression);
        // Comprehension element inference is deferred in this revision.
        tracing::debug!("list comprehension type inference is stubbed");
        Type::Unknown
    }

    fn infer_slice(&self, node: &SliceNode) -> Type {
        let mut entry_types = Vec::new();
        for part in [&node.start, &node.end, &node.step].into_iter().flatten() {
            entry_types.push(self.get_type(part));
        }
        let element = combine_types(entry_types);
        let element = if element.is_never() {
            Type::Unknown
        } else {
            element
        };
        // TODO: this placeholder specializes 'set'; the correct builtin for
        // a slice expression is 'slice'.
        get_builtin_object(&self.scope, "set", Some(vec![element])).unwrap_or(Type::Unknown)
    }

    fn infer_assignment(&self, node: &AssignmentNode) -> Type {
        let rhs = self.get_type(&node.right);

        if let ExpressionNode::TypeAnnotation(_) = &*node.left {
            let declared = self.get_type(&node.left);
            if !can_assign_type(&declared, &rhs, None) {
                self.ctx.report_error(
                    node.right.range(),
                    format_args!(
                        "Argument of type '{}' cannot be assigned to parameter of type '{}'",
                        rhs.display(),
                        declared.display()
                    ),
                );
            }
            return declared;
        }
        rhs
    }

    fn generator_send_type(&self) -> Type {
        let Some(function) = &self.enclosing_function else {
            return Type::Unknown;
        };
        match function.declared_return_type() {
            Some(Type::Object(object)) => self
                .generator_type_arg(&object.class, 1)
                .unwrap_or(Type::Unknown),
            _ => Type::Unknown,
        }
    }

    fn generator_type_arg(&self, class: &ClassType, index: usize) -> Option<Type> {
        if !class.is_known(KnownClass::Generator) {
            return None;
        }
        Some(
            class
                .type_args()
                .and_then(|args| args.get(index))
                .cloned()
                .unwrap_or(Type::Unknown),
        )
    }

    fn specialized_method_return(&self, object: &ObjectType, method: &str) -> Option<Type> {
        let hit = lookup_class_member(
            &object.class,
            method,
            ClassMemberLookupFlags::SKIP_INSTANCE_MEMBERS,
        )?;
        let member_ty = hit.symbol.effective_type();
        let member_ty = if object.class.type_args().is_some() {
            specialize_type(&member_ty, &TypeVarMap::from_class(&object.class))
        } else {
            member_ty
        };
        match bind_function_to_class_or_object(&Type::Object(object.clone()), member_ty) {
            Type::Function(function) => Some(function.effective_return_type()),
            _ => None,
        }
    }

    /// The result type of awaiting a value: `Generator[Y, S, R]` awaits to
    /// `R`; otherwise the `__await__` → `__iter__` chain is followed.
    pub fn get_type_from_awaitable(&self, ty: &Type, range: TextRange) -> Type {
        ty.map_subtypes(|subtype| {
            if subtype.is_any_or_unknown() {
                return Type::Unknown;
            }
            if let Type::Object(object) = subtype {
                if let Some(result) = self.generator_type_arg(&object.class, 2) {
                    return result;
                }
                if let Some(await_ret) = self.specialized_method_return(object, "__await__") {
                    if await_ret.is_any_or_unknown() {
                        return Type::Unknown;
                    }
                    if let Type::Object(iterator) = &await_ret {
                        if let Some(iter_ret) =
                            self.specialized_method_return(iterator, "__iter__")
                        {
                            if let Type::Object(generator) = &iter_ret {
                                if let Some(result) =
                                    self.generator_type_arg(&generator.class, 2)
                                {
                                    return result;
                                }
                            }
                            return iter_ret;
                        }
                    }
                    return await_ret;
                }
            }
            self.ctx.report_error(
                range,
                format_args!("'{}' is not awaitable", subtype.display()),
            );
            Type::Unknown
        })
    }

    /// The element type produced by iterating a value, through
    /// `__iter__`/`__next__` (or the async pair, whose items are awaited).
    pub fn get_type_from_iterable(&self, ty: &Type, is_async: bool, range: TextRange) -> Type {
        ty.map_subtypes(|subtype| {
            if subtype.is_any_or_unknown() {
                return Type::Unknown;
            }
            if let Type::Object(object) = subtype {
                if !is_async {
                    if let Some(yield_ty) = self.generator_type_arg(&object.class, 0) {
                        return yield_ty;
                    }
                }
                let iter_method = if is_async { "__aiter__" } else { "__iter__" };
                if let Some(iterator_ty) = self.specialized_method_return(object, iter_method) {
                    if iterator_ty.is_any_or_unknown() {
                        return Type::Unknown;
                    }
                    if let Type::Object(iterator) = &iterator_ty {
                        if !is_async {
                            if let Some(yield_ty) =
                                self.generator_type_arg(&iterator.class, 0)
                            {
                                return yield_ty;
                            }
                        }
                        let next_method = if is_async { "__anext__" } else { "__next__" };
                        if let Some(item) = self.specialized_method_return(iterator, next_method) {
                            return if is_async {
                                self.get_type_from_awaitable(&item, range)
                            } else {
                                item
                            };
                        }
                    }
                }
            }
            self.ctx.report_error(
                range,
                format_args!("'{}' is not iterable", subtype.display()),
            );
            Type::Unknown
        })
    }

    /// The type a decorator application produces for `input_ty`.
    pub fn get_type_from_decorator(&self, node: &ExpressionNode, input_ty: &Type) -> Type {
        let decorator_ty = self.get_type(node);
        if decorator_ty.is_any_or_unknown() {
            return Type::Unknown;
        }
        let args = CallArguments::new(vec![FunctionArgument::positional(input_ty.clone())]);
        let mut type_var_map = TypeVarMap::new();
        self.validate_call_arguments(node.range(), &args, &decorator_ty, &mut type_var_map)
            .unwrap_or(Type::Unknown)
    }

    /// Member access on an already-computed type, reported at `range`.
    pub fn get_type_from_object_member(
        &self,
        range: TextRange,
        object_ty: &Type,
        member: &str,
        usage: MemberAccessUsage,
        flags: MemberAccessFlags,
    ) -> Type {
        member::get_type_from_member_access(
            &self.ctx,
            object_ty,
            &Name::new(member),
            range,
            usage,
            flags,
        )
    }

    /// Synthesizes and installs `__new__`/`__init__` for a dataclass from
    /// its suite's top-level statements.
    pub fn synthesize_dataclass_methods(&self, class: &ClassType, suite: &[ExpressionNode]) {
        special_form::synthesize_data_class_methods(self, class, suite);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{ArgumentCategory, AstFactory, ParameterCategory};
    use crate::name::Name;
    use crate::program::DiagnosticLevel;
    use crate::scope::{DeclarationCategory, Symbol};
    use crate::testing::{builtin_object, create_module_scope, define_class, USER_SOURCE_ID_BASE};
    use crate::types::context::NodeTypeCache;
    use crate::types::OverloadedFunctionType;
    use test_case::test_case;

    fn r(start: u32, end: u32) -> TextRange {
        TextRange::new(start, end)
    }

    fn eval_with_settings(
        scope: &Arc<Scope>,
        settings: &ProgramSettings,
        node: &ExpressionNode,
    ) -> (Type, Vec<String>) {
        let cache = NodeTypeCache::new();
        let evaluator = TypeEvaluator::new(scope.clone(), settings, &cache);
        let ty = evaluator.get_type(node);
        let messages = evaluator
            .finish()
            .into_iter()
            .map(|diagnostic| diagnostic.message)
            .collect();
        (ty, messages)
    }

    fn eval(scope: &Arc<Scope>, node: &ExpressionNode) -> (Type, Vec<String>) {
        let settings = ProgramSettings::default();
        eval_with_settings(scope, &settings, node)
    }

    #[test]
    fn name_resolution_and_missing_name() {
        let scope = create_module_scope();
        let factory = AstFactory::new();

        let (ty, messages) = eval(&scope, &factory.name(r(0, 3), "int"));
        assert!(messages.is_empty());
        assert!(matches!(ty, Type::Class(_)));

        let (ty, messages) = eval(&scope, &factory.name(r(0, 7), "missing"));
        assert!(ty.is_unknown());
        assert_eq!(messages, vec!["'missing' is not defined"]);
    }

    #[test]
    fn literal_expressions() {
        let scope = create_module_scope();
        let factory = AstFactory::new();

        let (ty, _) = eval(&scope, &factory.integer(r(0, 1), 3));
        assert!(ty.is_same(&builtin_object(&scope, "int")));

        let (ty, _) = eval(&scope, &factory.float(r(0, 3), 1.5));
        assert!(ty.is_same(&builtin_object(&scope, "float")));

        let (ty, _) = eval(&scope, &factory.string(r(0, 4), "hi"));
        assert!(ty.is_same(&builtin_object(&scope, "str")));

        let (ty, _) = eval(&scope, &factory.constant(r(0, 4), KeywordType::None));
        assert!(ty.is_none());

        let (ty, _) = eval(&scope, &factory.constant(r(0, 4), KeywordType::True));
        let Type::Object(object) = ty else {
            panic!("expected a bool instance");
        };
        assert_eq!(object.truthiness, Some(true));
    }

    #[test_case("int", "int", "int")]
    #[test_case("int", "float", "float")]
    #[test_case("float", "int", "float")]
    #[test_case("int", "complex", "complex")]
    #[test_case("complex", "float", "complex")]
    fn numeric_promotion_matrix(left: &str, right: &str, expected: &str) {
        let scope = create_module_scope();
        let factory = AstFactory::new();
        scope.add_symbol(
            Name::new("a"),
            Symbol::inferred(builtin_object(&scope, left)),
        );
        scope.add_symbol(
            Name::new("b"),
            Symbol::inferred(builtin_object(&scope, right)),
        );

        let node = factory.binary_operation(
            r(0, 5),
            OperatorType::Add,
            factory.name(r(0, 1), "a"),
            factory.name(r(4, 5), "b"),
        );
        let (ty, messages) = eval(&scope, &node);
        assert!(messages.is_empty());
        assert!(ty.is_same(&builtin_object(&scope, expected)));
    }

    #[test]
    fn int_division_stays_int() {
        let scope = create_module_scope();
        let factory = AstFactory::new();
        let node = factory.binary_operation(
            r(0, 5),
            OperatorType::Divide,
            factory.integer(r(0, 1), 1),
            factory.integer(r(4, 5), 2),
        );
        let (ty, messages) = eval(&scope, &node);
        assert!(messages.is_empty());
        assert!(ty.is_same(&builtin_object(&scope, "int")));
    }

    #[test]
    fn binary_falls_back_to_left_dunder() {
        let scope = create_module_scope();
        let factory = AstFactory::new();

        let class = define_class(&scope, "Vec", USER_SOURCE_ID_BASE, &[]);
        let mut add = FunctionType::new(FunctionTypeFlags::INSTANCE_METHOD);
        add.add_parameter(FunctionParameter::simple("self", Type::Unknown));
        add.add_parameter(FunctionParameter::simple("other", Type::object(class.clone())));
        add.set_declared_return_type(Some(Type::object(class.clone())));
        class.add_class_field(
            "__add__",
            Symbol::new(DeclarationCategory::Method, Type::function(add)),
        );
        scope.add_symbol(Name::new("v"), Symbol::inferred(Type::object(class.clone())));

        let good = factory.binary_operation(
            r(0, 5),
            OperatorType::Add,
            factory.name(r(0, 1), "v"),
            factory.name(r(4, 5), "v"),
        );
        let (ty, messages) = eval(&scope, &good);
        assert!(messages.is_empty());
        assert!(ty.is_same(&Type::object(class)));

        let bad = factory.binary_operation(
            r(0, 5),
            OperatorType::Subtract,
            factory.name(r(0, 1), "v"),
            factory.integer(r(4, 5), 1),
        );
        let (ty, messages) = eval(&scope, &bad);
        assert!(ty.is_unknown());
        assert_eq!(
            messages,
            vec!["Operator '-' not supported for types 'Vec' and 'int'"]
        );
    }

    #[test]
    fn comparison_falls_back_to_bool() {
        let scope = create_module_scope();
        let factory = AstFactory::new();
        let class = define_class(&scope, "Opaque", USER_SOURCE_ID_BASE, &[]);
        scope.add_symbol(Name::new("o"), Symbol::inferred(Type::object(class)));

        let node = factory.binary_operation(
            r(0, 5),
            OperatorType::LessThan,
            factory.name(r(0, 1), "o"),
            factory.name(r(4, 5), "o"),
        );
        let (ty, messages) = eval(&scope, &node);
        assert!(messages.is_empty());
        assert!(ty.is_same(&builtin_object(&scope, "bool")));
    }

    #[test]
    fn boolean_operators_strip_known_truthiness() {
        let scope = create_module_scope();
        let factory = AstFactory::new();

        // `True and 5`: the left operand can't be the result.
        let node = factory.binary_operation(
            r(0, 9),
            OperatorType::And,
            factory.constant(r(0, 4), KeywordType::True),
            factory.integer(r(8, 9), 5),
        );
        let (ty, messages) = eval(&scope, &node);
        assert!(messages.is_empty());
        assert!(ty.is_same(&builtin_object(&scope, "int")));

        // `x or 5` where x: None.
        scope.add_symbol(Name::new("x"), Symbol::inferred(Type::None));
        let node = factory.binary_operation(
            r(0, 6),
            OperatorType::Or,
            factory.name(r(0, 1), "x"),
            factory.integer(r(5, 6), 5),
        );
        let (ty, messages) = eval(&scope, &node);
        assert!(messages.is_empty());
        assert!(ty.is_same(&builtin_object(&scope, "int")));
    }

    #[test]
    fn unary_operators() {
        let scope = create_module_scope();
        let factory = AstFactory::new();

        let not_node = factory.unary_operation(
            r(0, 5),
            OperatorType::Not,
            factory.integer(r(4, 5), 1),
        );
        let (ty, _) = eval(&scope, &not_node);
        assert!(ty.is_same(&builtin_object(&scope, "bool")));

        // The fixture's int carries __neg__ and the '__inv__'-named invert
        // hook, so both resolve to int.
        for operator in [OperatorType::Subtract, OperatorType::BitwiseInvert] {
            let node =
                factory.unary_operation(r(0, 2), operator, factory.integer(r(1, 2), 1));
            let (ty, messages) = eval(&scope, &node);
            assert!(messages.is_empty());
            assert!(ty.is_same(&builtin_object(&scope, "int")));
        }
    }

    #[test]
    fn ternary_unions_branches() {
        let scope = create_module_scope();
        let factory = AstFactory::new();
        let node = factory.ternary(
            r(0, 20),
            factory.integer(r(0, 1), 1),
            factory.constant(r(5, 9), KeywordType::True),
            factory.string(r(15, 19), "no"),
        );
        let (ty, messages) = eval(&scope, &node);
        assert!(messages.is_empty());
        let Type::Union(union) = &ty else {
            panic!("expected a union of the branch types");
        };
        assert_eq!(union.subtypes().len(), 2);
        assert!(union.contains(&builtin_object(&scope, "int")));
        assert!(union.contains(&builtin_object(&scope, "str")));
    }

    #[test]
    fn container_literals_specialize_builtins() {
        let scope = create_module_scope();
        let factory = AstFactory::new();

        let list_node = factory.list(
            r(0, 6),
            vec![factory.integer(r(1, 2), 1), factory.integer(r(4, 5), 2)],
        );
        let (ty, _) = eval(&scope, &list_node);
        let Type::Object(object) = &ty else {
            panic!("expected a list instance");
        };
        assert_eq!(object.class.name().as_str(), "list");
        assert!(object.class.type_args().unwrap()[0].is_same(&builtin_object(&scope, "int")));

        let dict_node = factory.dict(
            r(0, 8),
            vec![crate::ast::DictEntryNode {
                key: factory.string(r(1, 4), "k"),
                value: factory.integer(r(6, 7), 1),
            }],
        );
        let (ty, _) = eval(&scope, &dict_node);
        let Type::Object(object) = &ty else {
            panic!("expected a dict instance");
        };
        // Entry inference is deferred in this revision.
        assert!(object.class.type_args().unwrap()[0].is_unknown());

        let tuple_node = factory.tuple(
            r(0, 6),
            vec![factory.integer(r(1, 2), 1), factory.string(r(4, 5), "s")],
        );
        let (ty, _) = eval(&scope, &tuple_node);
        let Type::Object(object) = &ty else {
            panic!("expected a tuple instance");
        };
        let args = object.class.type_args().unwrap();
        assert!(args[0].is_same(&builtin_object(&scope, "int")));
        assert!(args[1].is_same(&builtin_object(&scope, "str")));
    }

    #[test]
    fn slice_placeholder_and_comprehension_stub() {
        let scope = create_module_scope();
        let factory = AstFactory::new();

        let slice = factory.slice(
            r(0, 3),
            Some(factory.integer(r(0, 1), 0)),
            Some(factory.integer(r(2, 3), 5)),
            None,
        );
        let (ty, messages) = eval(&scope, &slice);
        assert!(messages.is_empty());
        let Type::Object(object) = &ty else {
            panic!("expected the placeholder instance");
        };
        assert_eq!(object.class.name().as_str(), "set");

        let comprehension = factory.list_comprehension(
            r(0, 10),
            factory.integer(r(1, 2), 1),
            factory.list(r(6, 8), vec![]),
        );
        let (ty, messages) = eval(&scope, &comprehension);
        assert!(messages.is_empty());
        assert!(ty.is_unknown());
    }

    #[test]
    fn await_follows_generator_return() {
        let scope = create_module_scope();
        let factory = AstFactory::new();

        let Some(Type::Class(generator)) = get_builtin_type(&scope, "Generator") else {
            panic!("Generator missing from fixture");
        };
        let awaited = generator.clone_for_specialization(vec![
            Type::None,
            Type::None,
            builtin_object(&scope, "str"),
        ]);
        scope.add_symbol(Name::new("g"), Symbol::inferred(Type::object(awaited)));

        let node = factory.await_expression(r(0, 8), factory.name(r(6, 7), "g"));
        let (ty, messages) = eval(&scope, &node);
        assert!(messages.is_empty());
        assert!(ty.is_same(&builtin_object(&scope, "str")));

        let bad = factory.await_expression(r(0, 8), factory.integer(r(6, 7), 3));
        let (_, messages) = eval(&scope, &bad);
        assert_eq!(messages, vec!["'int' is not awaitable"]);
    }

    #[test]
    fn iterating_a_list_yields_its_element() {
        let scope = create_module_scope();
        let settings = ProgramSettings::default();
        let cache = NodeTypeCache::new();
        let evaluator = TypeEvaluator::new(scope.clone(), &settings, &cache);

        let int_ty = builtin_object(&scope, "int");
        let list_of_int =
            crate::scope::get_builtin_object(&scope, "list", Some(vec![int_ty.clone()])).unwrap();
        let element = evaluator.get_type_from_iterable(&list_of_int, false, r(0, 1));
        assert!(element.is_same(&int_ty));

        let diagnostics = evaluator.finish();
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn yield_reads_enclosing_generator_send_type() {
        let scope = create_module_scope();
        let settings = ProgramSettings::default();
        let cache = NodeTypeCache::new();
        let factory = AstFactory::new();

        let Some(Type::Class(generator)) = get_builtin_type(&scope, "Generator") else {
            panic!("Generator missing from fixture");
        };
        let mut function = FunctionType::new(FunctionTypeFlags::empty());
        function.set_declared_return_type(Some(Type::object(generator.clone_for_specialization(
            vec![Type::None, builtin_object(&scope, "int"), Type::None],
        ))));

        let evaluator = TypeEvaluator::new(scope.clone(), &settings, &cache)
            .with_enclosing_function(Arc::new(function));
        let node = factory.yield_expression(r(0, 5), None);
        let ty = evaluator.get_type(&node);
        assert!(ty.is_same(&builtin_object(&scope, "int")));
        let _ = evaluator.finish();
    }

    #[test]
    fn lambda_synthesizes_function() {
        let scope = create_module_scope();
        let factory = AstFactory::new();

        let node = factory.lambda(
            r(0, 12),
            vec![crate::ast::LambdaParameterNode {
                range: r(7, 8),
                category: ParameterCategory::Simple,
                name: Some(Name::new("a")),
                default_value: None,
            }],
            factory.integer(r(10, 11), 1),
        );
        let (ty, messages) = eval(&scope, &node);
        assert!(messages.is_empty());
        let Type::Function(function) = &ty else {
            panic!("expected a synthesized function");
        };
        assert_eq!(function.parameters().len(), 1);
        assert!(function
            .effective_return_type()
            .is_same(&builtin_object(&scope, "int")));
    }

    #[test]
    fn generic_class_subscription_specializes() {
        let scope = create_module_scope();
        let factory = AstFactory::new();

        let node = factory.index(
            r(0, 9),
            factory.name(r(0, 4), "list"),
            vec![factory.name(r(5, 8), "int")],
        );
        let (ty, messages) = eval(&scope, &node);
        assert!(messages.is_empty());
        let Type::Class(class) = &ty else {
            panic!("expected a specialized class");
        };
        assert_eq!(class.name().as_str(), "list");
        assert!(class.type_args().unwrap()[0].is_same(&builtin_object(&scope, "int")));

        // Arity mismatch reports at the subscript.
        let node = factory.index(
            r(0, 14),
            factory.name(r(0, 4), "list"),
            vec![factory.name(r(5, 8), "int"), factory.name(r(10, 13), "str")],
        );
        let (_, messages) = eval(&scope, &node);
        assert_eq!(messages, vec!["Expected 1 type argument"]);
    }

    #[test]
    fn callable_special_form() {
        let scope = create_module_scope();
        let factory = AstFactory::new();

        let node = factory.index(
            r(0, 20),
            factory.name(r(0, 8), "Callable"),
            vec![
                factory.list(r(9, 14), vec![factory.name(r(10, 13), "int")]),
                factory.name(r(16, 19), "str"),
            ],
        );
        let (ty, messages) = eval(&scope, &node);
        assert!(messages.is_empty());
        let Type::Function(function) = &ty else {
            panic!("expected a callable type");
        };
        assert_eq!(function.parameters().len(), 1);
        assert!(function.parameters()[0]
            .ty
            .is_same(&builtin_object(&scope, "int")));
        assert!(function
            .effective_return_type()
            .is_same(&builtin_object(&scope, "str")));

        // The ellipsis form disables parameter checks entirely.
        let node = factory.index(
            r(0, 18),
            factory.name(r(0, 8), "Callable"),
            vec![factory.ellipsis(r(9, 12)), factory.name(r(14, 17), "int")],
        );
        let (ty, messages) = eval(&scope, &node);
        assert!(messages.is_empty());
        let Type::Function(function) = &ty else {
            panic!("expected a callable type");
        };
        assert!(function
            .flags()
            .contains(FunctionTypeFlags::DISABLE_DEFAULT_CHECKS));
    }

    #[test]
    fn tuple_special_form_rejects_interior_ellipsis() {
        let scope = create_module_scope();
        let factory = AstFactory::new();

        let node = factory.index(
            r(0, 18),
            factory.name(r(0, 5), "Tuple"),
            vec![factory.ellipsis(r(6, 9)), factory.name(r(11, 14), "int")],
        );
        let (_, messages) = eval(&scope, &node);
        assert_eq!(
            messages,
            vec!["'...' is allowed only as the last type argument"]
        );

        let ok = factory.index(
            r(0, 18),
            factory.name(r(0, 5), "Tuple"),
            vec![factory.name(r(6, 9), "int"), factory.ellipsis(r(11, 14))],
        );
        let (_, messages) = eval(&scope, &ok);
        assert!(messages.is_empty());
    }

    #[test]
    fn type_var_constructor_validation() {
        let scope = create_module_scope();
        let factory = AstFactory::new();

        let node = factory.call(
            r(0, 14),
            factory.name(r(0, 7), "TypeVar"),
            vec![factory.positional_arg(factory.string(r(8, 12), "_T"))],
        );
        let (ty, messages) = eval(&scope, &node);
        assert!(messages.is_empty());
        let Type::TypeVar(type_var) = &ty else {
            panic!("expected a type variable");
        };
        assert_eq!(type_var.name.as_str(), "_T");

        // bound= plus positional constraints is rejected.
        let node = factory.call(
            r(0, 30),
            factory.name(r(0, 7), "TypeVar"),
            vec![
                factory.positional_arg(factory.string(r(8, 12), "_U")),
                factory.positional_arg(factory.name(r(14, 17), "int")),
                factory.keyword_arg("bound", factory.name(r(25, 28), "str")),
            ],
        );
        let (_, messages) = eval(&scope, &node);
        assert_eq!(messages, vec!["A TypeVar cannot be both bound and constrained"]);

        let node = factory.call(
            r(0, 30),
            factory.name(r(0, 7), "TypeVar"),
            vec![
                factory.positional_arg(factory.string(r(8, 12), "_V")),
                factory.keyword_arg("covariant", factory.constant(r(20, 24), KeywordType::True)),
                factory.keyword_arg(
                    "contravariant",
                    factory.constant(r(26, 30), KeywordType::True),
                ),
            ],
        );
        let (_, messages) = eval(&scope, &node);
        assert_eq!(
            messages,
            vec!["A TypeVar cannot be both covariant and contravariant"]
        );
    }

    #[test]
    fn named_tuple_synthesis() {
        let scope = create_module_scope();
        let factory = AstFactory::new();

        let node = factory.call(
            r(0, 40),
            factory.name(r(0, 10), "NamedTuple"),
            vec![
                factory.positional_arg(factory.string(r(11, 18), "Point")),
                factory.positional_arg(factory.list(
                    r(20, 39),
                    vec![
                        factory.tuple(
                            r(21, 29),
                            vec![factory.string(r(22, 25), "x"), factory.name(r(27, 30), "int")],
                        ),
                        factory.tuple(
                            r(31, 38),
                            vec![factory.string(r(32, 35), "y"), factory.name(r(36, 39), "int")],
                        ),
                    ],
                )),
            ],
        );
        let (ty, messages) = eval(&scope, &node);
        assert!(messages.is_empty());
        let Type::Class(class) = &ty else {
            panic!("expected a synthesized class");
        };
        assert_eq!(class.name().as_str(), "Point");

        let init = class.class_field("__init__").unwrap().effective_type();
        let Type::Function(init) = init else {
            panic!("expected a synthesized __init__");
        };
        assert_eq!(init.parameters().len(), 3);
        assert!(init.parameters()[1]
            .ty
            .is_same(&builtin_object(&scope, "int")));
        assert!(class.class_field("keys").is_some());
        assert!(class.class_field("__len__").is_some());
    }

    #[test]
    fn object_call_resolves_dunder_call() {
        let scope = create_module_scope();
        let factory = AstFactory::new();

        let class = define_class(&scope, "Adder", USER_SOURCE_ID_BASE, &[]);
        let mut call_fn = FunctionType::new(FunctionTypeFlags::INSTANCE_METHOD);
        call_fn.add_parameter(FunctionParameter::simple("self", Type::Unknown));
        call_fn.add_parameter(FunctionParameter::simple("x", builtin_object(&scope, "int")));
        call_fn.set_declared_return_type(Some(builtin_object(&scope, "int")));
        class.add_class_field(
            "__call__",
            Symbol::new(DeclarationCategory::Method, Type::function(call_fn)),
        );
        scope.add_symbol(Name::new("adder"), Symbol::inferred(Type::object(class)));

        let node = factory.call(
            r(0, 8),
            factory.name(r(0, 5), "adder"),
            vec![factory.positional_arg(factory.integer(r(6, 7), 1))],
        );
        let (ty, messages) = eval(&scope, &node);
        assert!(messages.is_empty());
        assert!(ty.is_same(&builtin_object(&scope, "int")));
    }

    #[test]
    fn overload_resolution_probes_silently() {
        let scope = create_module_scope();
        let factory = AstFactory::new();

        let int_ty = builtin_object(&scope, "int");
        let str_ty = builtin_object(&scope, "str");
        let make = |param: &Type, ret: &Type| {
            let mut f = FunctionType::new(FunctionTypeFlags::empty());
            f.add_parameter(FunctionParameter::simple("x", param.clone()));
            f.set_declared_return_type(Some(ret.clone()));
            Arc::new(f)
        };
        let overloaded = Type::Overloaded(Arc::new(OverloadedFunctionType::new(vec![
            make(&str_ty, &str_ty),
            make(&int_ty, &int_ty),
        ])));
        scope.add_symbol(
            Name::new("f"),
            Symbol::new(DeclarationCategory::Function, overloaded),
        );

        // The int argument skips the str overload without any diagnostic.
        let node = factory.call(
            r(0, 4),
            factory.name(r(0, 1), "f"),
            vec![factory.positional_arg(factory.integer(r(2, 3), 1))],
        );
        let (ty, messages) = eval(&scope, &node);
        assert!(messages.is_empty());
        assert!(ty.is_same(&int_ty));

        // Nothing matches: one summary diagnostic.
        let node = factory.call(
            r(0, 8),
            factory.name(r(0, 1), "f"),
            vec![factory.positional_arg(factory.constant(r(2, 6), KeywordType::None))],
        );
        let (ty, messages) = eval(&scope, &node);
        assert!(ty.is_unknown());
        assert_eq!(messages, vec!["No overloads match parameters"]);
    }

    #[test]
    fn optional_subscript_diagnostic_is_configurable() {
        let scope = create_module_scope();
        let factory = AstFactory::new();
        scope.add_symbol(Name::new("x"), Symbol::inferred(Type::None));

        let node = factory.index(
            r(0, 4),
            factory.name(r(0, 1), "x"),
            vec![factory.integer(r(2, 3), 0)],
        );

        let settings = ProgramSettings {
            report_optional_subscript: DiagnosticLevel::Error,
            ..ProgramSettings::default()
        };
        let (ty, messages) = eval_with_settings(&scope, &settings, &node);
        assert!(ty.is_unknown());
        assert_eq!(messages, vec!["Optional of type 'None' cannot be subscripted"]);

        let silent = ProgramSettings::default();
        let (_, messages) = eval_with_settings(&scope, &silent, &node);
        assert!(messages.is_empty());
    }

    #[test]
    fn cache_makes_reevaluation_idempotent() {
        let scope = create_module_scope();
        let settings = ProgramSettings::default();
        let cache = NodeTypeCache::new();
        let factory = AstFactory::new();
        let evaluator = TypeEvaluator::new(scope.clone(), &settings, &cache);

        let node = factory.name(r(0, 7), "missing");
        let first = evaluator.get_type(&node);
        let second = evaluator.get_type(&node);
        assert!(first.is_same(&second));

        // The second call served from cache: exactly one diagnostic.
        let diagnostics = evaluator.finish();
        assert_eq!(diagnostics.len(), 1);
    }

    #[test]
    fn decorator_application() {
        let scope = create_module_scope();
        let settings = ProgramSettings::default();
        let cache = NodeTypeCache::new();
        let factory = AstFactory::new();

        // A decorator accepting anything and returning int.
        let int_ty = builtin_object(&scope, "int");
        let mut decorator = FunctionType::new(FunctionTypeFlags::empty());
        decorator.add_parameter(FunctionParameter::simple("func", Type::any()));
        decorator.set_declared_return_type(Some(int_ty.clone()));
        scope.add_symbol(
            Name::new("deco"),
            Symbol::new(DeclarationCategory::Function, Type::function(decorator)),
        );

        let evaluator = TypeEvaluator::new(scope.clone(), &settings, &cache);
        let node = factory.name(r(0, 4), "deco");
        let decorated = FunctionType::new(FunctionTypeFlags::empty());
        let result = evaluator.get_type_from_decorator(&node, &Type::function(decorated));
        assert!(result.is_same(&int_ty));
        assert!(evaluator.finish().is_empty());
    }

    #[test]
    fn string_literal_with_type_comment_dispatches_to_annotation() {
        let scope = create_module_scope();
        let factory = AstFactory::new();

        let mut literal = match factory.string(r(0, 5), "int") {
            ExpressionNode::StringLiteral(node) => node,
            _ => unreachable!(),
        };
        literal.type_annotation = Some(Box::new(factory.name(r(0, 3), "int")));
        let node = ExpressionNode::StringLiteral(literal);

        let (ty, messages) = eval(&scope, &node);
        assert!(messages.is_empty());
        assert!(matches!(ty, Type::Class(_)));
    }

    #[test]
    fn arguments_category_matrix_reaches_kwargs() {
        let scope = create_module_scope();
        let factory = AstFactory::new();

        let mut f = FunctionType::new(FunctionTypeFlags::empty());
        f.add_parameter(FunctionParameter::simple("a", Type::Unknown));
        scope.add_symbol(
            Name::new("f"),
            Symbol::new(DeclarationCategory::Function, Type::function(f)),
        );

        // `f(**mapping)`: the unpacked dictionary suppresses the
        // missing-argument check for `a`.
        let mut dict_arg = factory.positional_arg(factory.dict(r(2, 8), vec![]));
        dict_arg.category = ArgumentCategory::Dictionary;
        let node = factory.call(r(0, 9), factory.name(r(0, 1), "f"), vec![dict_arg]);
        let (_, messages) = eval(&scope, &node);
        assert!(messages.is_empty());
    }
}
