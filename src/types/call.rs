//! Call validation: constructor dispatch and the argument binder.
//!
//! The callee-shape dispatch (functions, overloads, classes, callable
//! objects, unions) lives on the evaluator, which owns the context and the
//! special-form hooks; this module holds the argument model, the parameter
//! binder, and `__new__`/`__init__` constructor matching.

use std::sync::Arc;

use crate::ast::TextRange;
use crate::types::assignability::{specialize_type, TypeVarMap};
use crate::types::context::EvalContext;
use crate::types::{
    bind_function_to_class_or_object, convert_class_to_object, lookup_class_member,
    ClassMemberLookupFlags, ClassType, OverloadedFunctionType, Type,
};

mod arguments;
mod bind;

pub use arguments::{CallArguments, FunctionArgument};
pub(crate) use bind::validate_function_arguments;

/// Validates a constructor call `C(...)`: `__new__` first (looked up on the
/// class only, skipping the `object` base), then `__init__` bound against an
/// instance, which also drives generic specialization of the produced
/// object. `__init__` diagnostics are suppressed when `__new__` already
/// failed, so one bad call doesn't report twice.
pub(crate) fn validate_constructor_arguments(
    ctx: &EvalContext<'_>,
    error_range: TextRange,
    args: &CallArguments<'_>,
    class: &ClassType,
) -> Option<Type> {
    let mut validated = false;
    let mut new_errored = false;

    let new_lookup = lookup_class_member(
        class,
        "__new__",
        ClassMemberLookupFlags::SKIP_INSTANCE_MEMBERS
            | ClassMemberLookupFlags::SKIP_OBJECT_BASE_CLASS,
    );
    if let Some(hit) = new_lookup {
        let new_ty = strip_first_parameter(hit.symbol.effective_type());
        validated = true;
        let mut type_var_map = TypeVarMap::new();
        let ok = match &new_ty {
            Type::Function(function) => validate_function_arguments(
                ctx,
                error_range,
                args,
                function,
                &mut type_var_map,
            )
            .is_some(),
            Type::Overloaded(overloaded) => overloaded.overloads().iter().any(|overload| {
                ctx.with_silenced_diagnostics(|| {
                    validate_function_arguments(
                        ctx,
                        error_range,
                        args,
                        overload,
                        &mut TypeVarMap::new(),
                    )
                    .is_some()
                })
            }),
            _ => true,
        };
        if !ok {
            new_errored = true;
        }
    }

    let mut result = None;
    let init_lookup = lookup_class_member(
        class,
        "__init__",
        ClassMemberLookupFlags::SKIP_INSTANCE_MEMBERS,
    );
    if let Some(hit) = init_lookup {
        let bound = bind_function_to_class_or_object(
            &Type::object(class.clone()),
            hit.symbol.effective_type(),
        );
        if let Type::Function(function) = bound {
            validated = true;
            let mut type_var_map = TypeVarMap::new();
            let validate = |map: &mut TypeVarMap| {
                validate_function_arguments(ctx, error_range, args, &function, map).is_some()
            };
            let ok = if new_errored {
                ctx.with_silenced_diagnostics(|| validate(&mut type_var_map))
            } else {
                validate(&mut type_var_map)
            };
            if ok {
                let specialized = specialize_type(&Type::Class(class.clone()), &type_var_map);
                result = Some(convert_class_to_object(&specialized));
            }
        }
    }

    if !validated {
        if !args.is_empty() {
            ctx.report_error(
                error_range,
                format_args!("Expected no arguments to '{}' constructor", class.name()),
            );
            return None;
        }
        return Some(Type::object(class.clone()));
    }

    Some(result.unwrap_or_else(|| Type::object(class.clone())))
}

/// Removes the implicit `cls` slot from a `__new__` signature (or from every
/// overload of one).
fn strip_first_parameter(ty: Type) -> Type {
    match ty {
        Type::Function(function) => {
            let mut stripped = function.as_ref().clone();
            stripped.strip_first_parameter();
            Type::Function(Arc::new(stripped))
        }
        Type::Overloaded(overloaded) => {
            let overloads = overloaded
                .overloads()
                .iter()
                .map(|overload| {
                    let mut stripped = overload.as_ref().clone();
                    stripped.strip_first_parameter();
                    Arc::new(stripped)
                })
                .collect();
            Type::Overloaded(Arc::new(OverloadedFunctionType::new(overloads)))
        }
        other => other,
    }
}
