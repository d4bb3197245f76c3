//! Binds a call-site argument list against a function's parameter list.
//!
//! This is the positional/keyword/var-arg matching pass: positional
//! arguments are matched left to right until the positional region of the
//! parameter list ends, a named `*args` parameter swallows the remaining
//! positionals, keyword arguments are matched by name (or routed to
//! `**kwargs`), and every required parameter must end up with exactly one
//! argument.

use smallvec::SmallVec;

use crate::ast::{ArgumentCategory, ParameterCategory, TextRange};
use crate::types::assignability::{can_assign_type, specialize_type, TypeVarMap};
use crate::types::call::{CallArguments, FunctionArgument};
use crate::types::context::EvalContext;
use crate::types::{FunctionType, FunctionTypeFlags, Type};

#[derive(Copy, Clone, Default)]
struct ParamEntry {
    args_needed: u32,
    args_received: u32,
}

/// Validates `args` against `function`'s parameters, reporting diagnostics
/// through `ctx` and recording generic bindings into `type_var_map`.
///
/// Returns `None` when any error was found, otherwise the function's return
/// type with the accumulated substitutions applied.
pub(crate) fn validate_function_arguments(
    ctx: &EvalContext<'_>,
    error_range: TextRange,
    args: &CallArguments<'_>,
    function: &FunctionType,
    type_var_map: &mut TypeVarMap,
) -> Option<Type> {
    if function
        .flags()
        .contains(FunctionTypeFlags::DISABLE_DEFAULT_CHECKS)
    {
        return Some(specialize_type(
            &function.effective_return_type(),
            type_var_map,
        ));
    }

    let params = function.parameters();
    let mut entries: SmallVec<[ParamEntry; 8]> = params
        .iter()
        .map(|param| ParamEntry {
            args_needed: u32::from(
                param.category == ParameterCategory::Simple && !param.has_default,
            ),
            args_received: 0,
        })
        .collect();

    // The index where the positional region of the parameter list ends: a
    // bare `*` blocks everything after it, a named `*args` consumes the
    // remaining positionals itself, and `**kwargs` never takes positionals.
    let positional_param_count = if let Some(index) = params
        .iter()
        .position(|p| p.category == ParameterCategory::VarArgList && p.name.is_none())
    {
        index
    } else if let Some(index) = params
        .iter()
        .position(|p| p.category == ParameterCategory::VarArgList)
    {
        index + 1
    } else if let Some(index) = params
        .iter()
        .position(|p| p.category == ParameterCategory::VarArgDictionary)
    {
        index
    } else {
        params.len()
    };

    let positional_arg_count = args
        .iter()
        .position(|arg| arg.category == ArgumentCategory::Dictionary || arg.name.is_some())
        .unwrap_or(args.len());

    let mut reported_error = false;

    // Positional phase.
    let mut arg_index = 0;
    let mut param_index = 0;
    while arg_index < positional_arg_count {
        if param_index >= positional_param_count {
            let arg = args.get(arg_index).expect("index is below the arg count");
            ctx.report_error(
                arg.range_or(error_range),
                format_args!(
                    "Expected {} positional {}",
                    positional_param_count,
                    if positional_param_count == 1 {
                        "argument"
                    } else {
                        "arguments"
                    }
                ),
            );
            reported_error = true;
            break;
        }

        let param = &params[param_index];
        if param.category == ParameterCategory::VarArgList {
            // The named `*args` parameter validates every remaining
            // positional against its element type.
            while arg_index < positional_arg_count {
                let arg = args.get(arg_index).expect("index is below the arg count");
                if !validate_arg_type(ctx, error_range, arg, &param.ty, type_var_map) {
                    reported_error = true;
                }
                entries[param_index].args_received += 1;
                arg_index += 1;
            }
            break;
        }

        let arg = args.get(arg_index).expect("index is below the arg count");
        if !validate_arg_type(ctx, error_range, arg, &param.ty, type_var_map) {
            reported_error = true;
        }
        entries[param_index].args_received += 1;
        arg_index += 1;
        param_index += 1;
    }

    // Named phase.
    let mut found_dictionary_arg = false;
    let found_list_arg = args
        .iter()
        .any(|arg| arg.category == ArgumentCategory::List);

    for arg in args.iter().skip(positional_arg_count) {
        if arg.category == ArgumentCategory::Dictionary {
            found_dictionary_arg = true;
            continue;
        }
        let Some(name) = &arg.name else {
            continue;
        };

        let named_param = params.iter().position(|p| {
            p.category == ParameterCategory::Simple && p.name.as_ref() == Some(name)
        });
        if let Some(index) = named_param {
            if entries[index].args_received > 0 {
                ctx.report_error(
                    arg.range_or(error_range),
                    format_args!("Parameter '{name}' is already assigned"),
                );
                reported_error = true;
            } else {
                entries[index].args_received += 1;
                if !validate_arg_type(ctx, error_range, arg, &params[index].ty, type_var_map) {
                    reported_error = true;
                }
            }
        } else if let Some(index) = params
            .iter()
            .position(|p| p.category == ParameterCategory::VarArgDictionary)
        {
            entries[index].args_received += 1;
            if !validate_arg_type(ctx, error_range, arg, &params[index].ty, type_var_map) {
                reported_error = true;
            }
        } else {
            ctx.report_error(
                arg.range_or(error_range),
                format_args!("No parameter named '{name}'"),
            );
            reported_error = true;
        }
    }

    // Completeness: an unpacked `*` or `**` argument could supply anything,
    // so missing-argument checks only run without one.
    if !found_dictionary_arg && !found_list_arg {
        for (index, param) in params.iter().enumerate() {
            if entries[index].args_received < entries[index].args_needed {
                let name = param
                    .name
                    .as_ref()
                    .map(|name| name.as_str())
                    .unwrap_or("<unnamed>");
                ctx.report_error(
                    error_range,
                    format_args!("Argument missing for parameter '{name}'"),
                );
                reported_error = true;
            }
        }
    }

    if reported_error {
        return None;
    }
    Some(specialize_type(
        &function.effective_return_type(),
        type_var_map,
    ))
}

fn validate_arg_type(
    ctx: &EvalContext<'_>,
    error_range: TextRange,
    arg: &FunctionArgument<'_>,
    param_ty: &Type,
    type_var_map: &mut TypeVarMap,
) -> bool {
    if can_assign_type(param_ty, &arg.ty, Some(type_var_map)) {
        return true;
    }
    ctx.report_error(
        arg.range_or(error_range),
        format_args!(
            "Argument of type '{}' cannot be assigned to parameter of type '{}'",
            arg.ty.display(),
            param_ty.display()
        ),
    );
    false
}
