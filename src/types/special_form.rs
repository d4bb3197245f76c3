//! Special-form synthesis.
//!
//! Subscription of the special built-in classes (`Callable`, `Optional`,
//! `Union`, `Type`, `Tuple`, the typed container aliases, `Generic`,
//! `Protocol`, `ClassVar`), the `TypeVar(...)` constructor, `NamedTuple`
//! class synthesis, and dataclass `__new__`/`__init__` synthesis.

use std::sync::Arc;

use crate::ast::{ExpressionNode, KeywordType, TextRange};
use crate::name::Name;
use crate::scope::{get_builtin_object, get_builtin_type, DeclarationCategory, Symbol};
use crate::types::builder::combine_types;
use crate::types::call::CallArguments;
use crate::types::infer::{TypeEvaluator, TypeResult};
use crate::types::{
    convert_class_to_object, ClassType, ClassTypeFlags, FunctionParameter, FunctionType,
    FunctionTypeFlags, Type, TypeVarType, Variance,
};

/// Subscription on a class: either one of the special forms, or ordinary
/// generic specialization.
pub(crate) fn create_specialized_class_type(
    ev: &TypeEvaluator<'_>,
    class: &ClassType,
    type_args: &[TypeResult<'_>],
    error_range: TextRange,
) -> Type {
    if class.is_special_built_in() {
        match class.name().as_str() {
            "Callable" => return create_callable_type(ev, type_args),
            "Optional" => return create_optional_type(ev, type_args, error_range),
            "Type" => return create_type_type(ev, type_args, error_range),
            "ClassVar" => return create_class_var_type(ev, type_args, error_range),
            "Union" => return create_union_type(ev, type_args),
            "Generic" => return create_generic_type(ev, class, type_args, error_range),
            "Tuple" => return create_tuple_type(ev, class, type_args),
            "Protocol" => return specialize_target(ev, class, type_args, usize::MAX),
            "List" | "Set" | "FrozenSet" | "Deque" => {
                return specialize_target(ev, class, type_args, 1)
            }
            "Dict" | "DefaultDict" | "ChainMap" => {
                return specialize_target(ev, class, type_args, 2)
            }
            _ => {}
        }
    }

    let params = class.type_params();
    if params.is_empty() {
        if let Some(first) = type_args.first() {
            ev.context()
                .report_error(first.node.range(), format_args!("Expected no type arguments"));
        }
        return Type::Class(class.clone());
    }
    if type_args.len() != params.len() {
        ev.context().report_error(
            error_range,
            format_args!(
                "Expected {} type {}",
                params.len(),
                if params.len() == 1 {
                    "argument"
                } else {
                    "arguments"
                }
            ),
        );
    }
    let args = (0..params.len())
        .map(|index| {
            type_args
                .get(index)
                .map(|arg| convert_type_arg(ev, arg, false))
                .unwrap_or(Type::any())
        })
        .collect();
    Type::Class(class.clone_for_specialization(args))
}

/// Validates one type argument: ellipses and modules are rejected outside
/// the positions that explicitly allow them, and class references become
/// the instances they denote.
fn convert_type_arg(ev: &TypeEvaluator<'_>, arg: &TypeResult<'_>, allow_ellipsis: bool) -> Type {
    if arg.ty.is_ellipsis() && !allow_ellipsis {
        ev.context().report_error(
            arg.node.range(),
            format_args!("'...' not allowed in this context"),
        );
        return Type::Unknown;
    }
    if matches!(arg.ty, Type::Module(_)) {
        ev.context().report_error(
            arg.node.range(),
            format_args!("Module not allowed in this context"),
        );
        return Type::Unknown;
    }
    convert_class_to_object(&arg.ty)
}

/// `Callable[[P1, ...], R]` / `Callable[..., R]`.
fn create_callable_type(ev: &TypeEvaluator<'_>, type_args: &[TypeResult<'_>]) -> Type {
    let mut flags = FunctionTypeFlags::empty();
    let mut parameters = Vec::new();
    let mut declared_return = None;

    if let Some(first) = type_args.first() {
        if let Some(list) = &first.type_list {
            for (index, entry) in list.iter().enumerate() {
                parameters.push(FunctionParameter::simple(
                    format!("p{index}"),
                    convert_type_arg(ev, entry, false),
                ));
            }
        } else if first.ty.is_ellipsis() {
            // The gradual form: accepts anything, checks nothing.
            flags |= FunctionTypeFlags::DISABLE_DEFAULT_CHECKS;
            parameters.push(FunctionParameter::var_arg_list(
                Some(Name::new_static("args")),
                Type::any(),
            ));
            parameters.push(FunctionParameter::var_arg_dictionary("kwargs", Type::any()));
        } else {
            ev.context().report_error(
                first.node.range(),
                format_args!("Expected parameter type list or '...'"),
            );
        }

        if let Some(extra) = type_args.get(2) {
            ev.context().report_error(
                extra.node.range(),
                format_args!("Expected only two type arguments to 'Callable'"),
            );
        }
        if let Some(ret) = type_args.get(1) {
            declared_return = Some(convert_type_arg(ev, ret, false));
        }
    } else {
        // Bare `Callable`.
        flags |= FunctionTypeFlags::DISABLE_DEFAULT_CHECKS;
        declared_return = Some(Type::any());
    }

    let mut function = FunctionType::new(flags);
    for parameter in parameters {
        function.add_parameter(parameter);
    }
    function.set_declared_return_type(declared_return);
    Type::function(function)
}

fn create_optional_type(
    ev: &TypeEvaluator<'_>,
    type_args: &[TypeResult<'_>],
    error_range: TextRange,
) -> Type {
    if type_args.len() != 1 {
        ev.context().report_error(
            error_range,
            format_args!("Expected a single type argument after 'Optional'"),
        );
        if type_args.is_empty() {
            return Type::Unknown;
        }
    }
    combine_types([convert_type_arg(ev, &type_args[0], false), Type::None])
}

fn create_type_type(
    ev: &TypeEvaluator<'_>,
    type_args: &[TypeResult<'_>],
    error_range: TextRange,
) -> Type {
    if type_args.len() != 1 {
        ev.context().report_error(
            error_range,
            format_args!("Expected a single type argument after 'Type'"),
        );
        return Type::Unknown;
    }
    let arg = &type_args[0];
    match &arg.ty {
        Type::Class(_) => arg.ty.clone(),
        Type::Object(object) => Type::Class(object.class.clone()),
        Type::Any { .. } | Type::Unknown | Type::TypeVar(_) => arg.ty.clone(),
        _ => {
            ev.context().report_error(
                arg.node.range(),
                format_args!("Expected a class as a type argument to 'Type'"),
            );
            Type::Unknown
        }
    }
}

fn create_class_var_type(
    ev: &TypeEvaluator<'_>,
    type_args: &[TypeResult<'_>],
    error_range: TextRange,
) -> Type {
    if type_args.len() > 1 {
        ev.context().report_error(
            error_range,
            format_args!("Expected only one type argument after 'ClassVar'"),
        );
    }
    type_args
        .first()
        .map(|arg| convert_type_arg(ev, arg, false))
        .unwrap_or(Type::any())
}

fn create_union_type(ev: &TypeEvaluator<'_>, type_args: &[TypeResult<'_>]) -> Type {
    combine_types(
        type_args
            .iter()
            .map(|arg| convert_type_arg(ev, arg, false))
            .collect::<Vec<_>>(),
    )
}

/// `Generic[T1, ...]`: at least one argument, all distinct type variables.
fn create_generic_type(
    ev: &TypeEvaluator<'_>,
    class: &ClassType,
    type_args: &[TypeResult<'_>],
    error_range: TextRange,
) -> Type {
    if type_args.is_empty() {
        ev.context().report_error(
            error_range,
            format_args!("Expected at least one type argument after 'Generic'"),
        );
        return Type::Class(class.clone());
    }

    let mut seen: Vec<Arc<TypeVarType>> = Vec::new();
    let mut args = Vec::with_capacity(type_args.len());
    for arg in type_args {
        let Type::TypeVar(type_var) = &arg.ty else {
            ev.context().report_error(
                arg.node.range(),
                format_args!("Type argument for 'Generic' must be a type variable"),
            );
            continue;
        };
        if seen.iter().any(|existing| Arc::ptr_eq(existing, type_var)) {
            ev.context().report_error(
                arg.node.range(),
                format_args!("Type arguments for 'Generic' must be unique"),
            );
            continue;
        }
        seen.push(type_var.clone());
        args.push(arg.ty.clone());
    }
    Type::Class(class.clone_for_specialization(args))
}

/// `Tuple[...]`: per-position arguments; `...` only in the last slot.
fn create_tuple_type(
    ev: &TypeEvaluator<'_>,
    class: &ClassType,
    type_args: &[TypeResult<'_>],
) -> Type {
    let target = class.aliased_class().unwrap_or(class);
    if type_args.is_empty() {
        return Type::Class(target.clone());
    }
    let last = type_args.len() - 1;
    let args = type_args
        .iter()
        .enumerate()
        .map(|(index, arg)| {
            if arg.ty.is_ellipsis() && index != last {
                ev.context().report_error(
                    arg.node.range(),
                    format_args!("'...' is allowed only as the last type argument"),
                );
                return Type::Unknown;
            }
            convert_type_arg(ev, arg, index == last)
        })
        .collect();
    Type::Class(target.clone_for_specialization(args))
}

/// The bounded container aliases: specialize the aliased builtin with at
/// most `max_args` arguments, filling missing slots with `Any`.
fn specialize_target(
    ev: &TypeEvaluator<'_>,
    class: &ClassType,
    type_args: &[TypeResult<'_>],
    max_args: usize,
) -> Type {
    let target = class.aliased_class().unwrap_or(class);
    if type_args.len() > max_args {
        ev.context().report_error(
            type_args[max_args].node.range(),
            format_args!(
                "Expected at most {max_args} type {}",
                if max_args == 1 {
                    "argument"
                } else {
                    "arguments"
                }
            ),
        );
    }
    if type_args.is_empty() {
        return Type::Class(target.clone());
    }

    let slot_count = if max_args == usize::MAX {
        type_args.len()
    } else {
        max_args
    };
    let args = (0..slot_count)
        .map(|index| {
            type_args
                .get(index)
                .map(|arg| convert_type_arg(ev, arg, false))
                .unwrap_or(Type::any())
        })
        .collect();
    Type::Class(target.clone_for_specialization(args))
}

/// The `TypeVar(name, *constraints, bound=..., covariant=..., contravariant=...)`
/// constructor.
pub(crate) fn create_type_var_type(
    ev: &TypeEvaluator<'_>,
    error_range: TextRange,
    args: &CallArguments<'_>,
) -> Option<Type> {
    let ctx = ev.context();
    let name = args
        .get(0)
        .filter(|arg| arg.name.is_none())
        .and_then(|arg| arg.value_expression)
        .and_then(ExpressionNode::as_string_literal)
        .map(|literal| literal.value.clone());
    let Some(name) = name else {
        ctx.report_error(
            args.get(0)
                .map(|arg| arg.range_or(error_range))
                .unwrap_or(error_range),
            format_args!("Expected name of type variable as first argument"),
        );
        return None;
    };

    let mut type_var = TypeVarType::new(name);
    let mut covariant = false;
    let mut contravariant = false;
    let mut seen_keywords: Vec<Name> = Vec::new();

    for arg in args.iter().skip(1) {
        let Some(keyword) = &arg.name else {
            type_var
                .constraints
                .push(convert_class_to_object(&arg.ty));
            continue;
        };

        if seen_keywords.iter().any(|seen| seen == keyword) {
            ctx.report_error(
                arg.range_or(error_range),
                format_args!("Duplicate parameter '{keyword}'"),
            );
            continue;
        }
        seen_keywords.push(keyword.clone());

        match keyword.as_str() {
            "bound" => type_var.bound = Some(convert_class_to_object(&arg.ty)),
            "covariant" => covariant = argument_is_true(arg),
            "contravariant" => contravariant = argument_is_true(arg),
            _ => {
                ctx.report_error(
                    arg.range_or(error_range),
                    format_args!("'{keyword}' is unknown parameter to TypeVar"),
                );
            }
        }
    }

    if !type_var.constraints.is_empty() && type_var.bound.is_some() {
        ctx.report_error(
            error_range,
            format_args!("A TypeVar cannot be both bound and constrained"),
        );
        type_var.bound = None;
    }
    match (covariant, contravariant) {
        (true, true) => {
            ctx.report_error(
                error_range,
                format_args!("A TypeVar cannot be both covariant and contravariant"),
            );
        }
        (true, false) => type_var.variance = Variance::Covariant,
        (false, true) => type_var.variance = Variance::Contravariant,
        (false, false) => {}
    }

    Some(Type::TypeVar(Arc::new(type_var)))
}

fn argument_is_true(arg: &crate::types::call::FunctionArgument<'_>) -> bool {
    matches!(
        arg.value_expression,
        Some(ExpressionNode::Constant(constant)) if constant.keyword == KeywordType::True
    )
}

struct NamedTupleField {
    name: Name,
    ty: Type,
}

/// `NamedTuple(name, fields)` class synthesis. Fields come either as a
/// whitespace-separated string (untyped mode) or as a list of
/// `(name, type)` tuples (typed mode); anything else falls back to a
/// dynamic-fields class with a `__getattribute__` catch-all.
pub(crate) fn create_named_tuple_type(
    ev: &TypeEvaluator<'_>,
    error_range: TextRange,
    args: &CallArguments<'_>,
) -> Option<Type> {
    let ctx = ev.context();

    let class_name = args
        .get(0)
        .and_then(|arg| arg.value_expression)
        .and_then(ExpressionNode::as_string_literal)
        .map(|literal| literal.value.clone());
    if class_name.is_none() {
        ctx.report_error(
            error_range,
            format_args!("Expected named tuple class name as first argument"),
        );
    }
    let class = ClassType::new(
        class_name.unwrap_or_else(|| "NamedTuple".to_string()),
        ClassTypeFlags::empty(),
        ev.next_synthesized_source_id(),
    );
    if let Some(Type::Class(tuple_class)) = get_builtin_type(ev.scope(), "tuple") {
        class.add_base_class(Type::Class(tuple_class), true);
    }

    let mut fields: Vec<NamedTupleField> = Vec::new();
    let mut dynamic_fields = false;

    match args.get(1).and_then(|arg| arg.value_expression) {
        Some(ExpressionNode::StringLiteral(literal)) => {
            for part in literal.value.split_whitespace() {
                fields.push(NamedTupleField {
                    name: Name::new(part),
                    ty: Type::Unknown,
                });
            }
        }
        Some(ExpressionNode::List(list)) => {
            for (index, entry) in list.items.iter().enumerate() {
                match entry {
                    ExpressionNode::StringLiteral(literal) => fields.push(NamedTupleField {
                        name: Name::new(&literal.value),
                        ty: Type::Unknown,
                    }),
                    ExpressionNode::Tuple(tuple) if !tuple.items.is_empty() => {
                        // Missing entry names fall back to `_<index>`.
                        let name = tuple.items[0]
                            .as_string_literal()
                            .map(|literal| Name::new(&literal.value))
                            .unwrap_or_else(|| Name::new(format!("_{index}")));
                        let ty = tuple
                            .items
                            .get(1)
                            .map(|expr| convert_class_to_object(&ev.get_type(expr)))
                            .unwrap_or(Type::Unknown);
                        fields.push(NamedTupleField { name, ty });
                    }
                    _ => {
                        dynamic_fields = true;
                        break;
                    }
                }
            }
        }
        _ => dynamic_fields = true,
    }

    for (index, field) in fields.iter_mut().enumerate() {
        if field.name.is_empty() {
            ctx.report_error(
                error_range,
                format_args!("Names within a named tuple cannot be empty"),
            );
            field.name = Name::new(format!("_{index}"));
        }
    }
    let mut names_seen: Vec<Name> = Vec::new();
    for field in &fields {
        if names_seen.iter().any(|seen| seen == &field.name) {
            ctx.report_error(
                error_range,
                format_args!("Names within a named tuple must be unique"),
            );
        } else {
            names_seen.push(field.name.clone());
        }
    }

    let mut new_fn = FunctionType::new(
        FunctionTypeFlags::STATIC_METHOD | FunctionTypeFlags::SYNTHESIZED_METHOD,
    );
    new_fn.add_parameter(FunctionParameter::simple("cls", Type::Unknown));
    let mut init_fn = FunctionType::new(
        FunctionTypeFlags::INSTANCE_METHOD | FunctionTypeFlags::SYNTHESIZED_METHOD,
    );
    init_fn.add_parameter(FunctionParameter::simple("self", Type::Unknown));
    for field in &fields {
        new_fn.add_parameter(FunctionParameter::simple(field.name.clone(), field.ty.clone()));
        init_fn.add_parameter(FunctionParameter::simple(field.name.clone(), field.ty.clone()));
    }
    new_fn.set_declared_return_type(Some(Type::object(class.clone())));
    init_fn.set_declared_return_type(Some(Type::None));
    install_method(&class, "__new__", new_fn);
    install_method(&class, "__init__", init_fn);

    let str_object = get_builtin_object(ev.scope(), "str", None).unwrap_or(Type::Unknown);
    let list_of_str =
        get_builtin_object(ev.scope(), "list", Some(vec![str_object.clone()])).unwrap_or(Type::Unknown);
    for accessor in ["keys", "items"] {
        let mut method = FunctionType::new(
            FunctionTypeFlags::INSTANCE_METHOD | FunctionTypeFlags::SYNTHESIZED_METHOD,
        );
        method.add_parameter(FunctionParameter::simple("self", Type::Unknown));
        method.set_declared_return_type(Some(list_of_str.clone()));
        install_method(&class, accessor, method);
    }

    let mut len_fn = FunctionType::new(
        FunctionTypeFlags::INSTANCE_METHOD | FunctionTypeFlags::SYNTHESIZED_METHOD,
    );
    len_fn.add_parameter(FunctionParameter::simple("self", Type::Unknown));
    len_fn.set_declared_return_type(
        Some(get_builtin_object(ev.scope(), "int", None).unwrap_or(Type::Unknown)),
    );
    install_method(&class, "__len__", len_fn);

    if dynamic_fields {
        let mut getattribute = FunctionType::new(
            FunctionTypeFlags::INSTANCE_METHOD | FunctionTypeFlags::SYNTHESIZED_METHOD,
        );
        getattribute.add_parameter(FunctionParameter::simple("self", Type::Unknown));
        getattribute.add_parameter(FunctionParameter::simple("name", str_object));
        getattribute.set_declared_return_type(Some(Type::any()));
        install_method(&class, "__getattribute__", getattribute);
    }

    Some(Type::Class(class))
}

fn install_method(class: &ClassType, name: &str, function: FunctionType) {
    class.add_class_field(
        name,
        Symbol::new(DeclarationCategory::Method, Type::function(function)),
    );
}

struct DataClassField {
    name: Name,
    ty: Type,
    default_ty: Option<Type>,
    range: TextRange,
}

/// Walks a dataclass suite's top-level statements and installs synthesized
/// `__new__` and `__init__` methods built from its field declarations.
pub(crate) fn synthesize_data_class_methods(
    ev: &TypeEvaluator<'_>,
    class: &ClassType,
    suite: &[ExpressionNode],
) {
    debug_assert!(
        class.is_data_class(),
        "dataclass synthesis invoked on a non-dataclass"
    );
    let ctx = ev.context();

    let mut fields: Vec<DataClassField> = Vec::new();
    let mut saw_default = false;
    for statement in suite {
        let field = match statement {
            ExpressionNode::Assignment(assign) => match &*assign.left {
                ExpressionNode::TypeAnnotation(annotation) => {
                    annotation.value.as_name().map(|name| DataClassField {
                        name: name.value.clone(),
                        ty: convert_class_to_object(&ev.get_type(&annotation.annotation)),
                        default_ty: Some(ev.get_type(&assign.right)),
                        range: assign.range,
                    })
                }
                ExpressionNode::Name(name) => Some(DataClassField {
                    name: name.value.clone(),
                    ty: Type::Unknown,
                    default_ty: Some(ev.get_type(&assign.right)),
                    range: assign.range,
                }),
                _ => None,
            },
            ExpressionNode::TypeAnnotation(annotation) => {
                annotation.value.as_name().map(|name| DataClassField {
                    name: name.value.clone(),
                    ty: convert_class_to_object(&ev.get_type(&annotation.annotation)),
                    default_ty: None,
                    range: annotation.range,
                })
            }
            _ => None,
        };
        let Some(field) = field else {
            continue;
        };

        if ev.context().settings().python_version >= crate::program::PythonVersion::PY37
            && field.name.starts_with('_')
        {
            ctx.report_error(
                field.range,
                format_args!("Data field name cannot start with _"),
            );
            continue;
        }

        if field.default_ty.is_some() {
            saw_default = true;
        } else if saw_default {
            ctx.report_error(
                field.range,
                format_args!(
                    "Data fields without default value cannot appear after data fields with default values"
                ),
            );
            continue;
        }

        // A redeclaration replaces the earlier field in place.
        if let Some(existing) = fields.iter_mut().find(|f| f.name == field.name) {
            *existing = field;
        } else {
            fields.push(field);
        }
    }

    let mut new_fn = FunctionType::new(
        FunctionTypeFlags::STATIC_METHOD | FunctionTypeFlags::SYNTHESIZED_METHOD,
    );
    new_fn.add_parameter(FunctionParameter::simple("cls", Type::Unknown));
    let mut init_fn = FunctionType::new(
        FunctionTypeFlags::INSTANCE_METHOD | FunctionTypeFlags::SYNTHESIZED_METHOD,
    );
    init_fn.add_parameter(FunctionParameter::simple("self", Type::Unknown));
    for field in &fields {
        let parameter = match &field.default_ty {
            Some(default_ty) => FunctionParameter::with_default(
                field.name.clone(),
                field.ty.clone(),
                default_ty.clone(),
            ),
            None => FunctionParameter::simple(field.name.clone(), field.ty.clone()),
        };
        new_fn.add_parameter(parameter.clone());
        init_fn.add_parameter(parameter);
    }
    new_fn.set_declared_return_type(Some(Type::object(class.clone())));
    init_fn.set_declared_return_type(Some(Type::None));

    install_method(class, "__new__", new_fn);
    install_method(class, "__init__", init_fn);
}
