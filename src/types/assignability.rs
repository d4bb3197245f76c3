//! Assignability checks and generic specialization.
//!
//! `can_assign_type` is the single structural-compatibility judgment the
//! evaluator uses: annotation validation, call-argument matching, and
//! overload probing all funnel through it. While matching, type-variable
//! bindings are recorded into a [`TypeVarMap`]; `specialize_type` applies an
//! accumulated map to realize return types and class specializations.

use std::sync::Arc;

use crate::name::Name;
use crate::types::{
    ClassType, FunctionType, FunctionTypeFlags, KnownClass, ObjectType, Type, TypeVarType,
    Variance,
};
use crate::FxOrderMap;

/// Recursive generic shapes can tie assignability into a loop; past this
/// depth the answer is assumed compatible rather than diverging.
const MAX_TYPE_RECURSION: u32 = 64;

/// An ordered substitution from type-variable name to bound type, built up
/// during call validation and applied by [`specialize_type`].
#[derive(Clone, Debug, Default)]
pub struct TypeVarMap {
    map: FxOrderMap<Name, Type>,
}

impl TypeVarMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// The substitution a specialized class implies for its own parameters:
    /// `list[int]` maps `_T -> int`.
    pub fn from_class(class: &ClassType) -> Self {
        let mut map = Self::new();
        if let Some(args) = class.type_args() {
            for (param, arg) in class.type_params().iter().zip(args) {
                map.set(param.name.clone(), arg.clone());
            }
        }
        map
    }

    pub fn get(&self, name: &str) -> Option<&Type> {
        self.map.get(name)
    }

    pub fn set(&mut self, name: Name, ty: Type) {
        self.map.insert(name, ty);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.map.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// Whether `src` can be assigned to `dest`. Substitutions discovered along
/// the way are recorded into `type_var_map` when one is supplied.
pub fn can_assign_type(dest: &Type, src: &Type, type_var_map: Option<&mut TypeVarMap>) -> bool {
    can_assign_inner(dest, src, type_var_map, 0)
}

fn can_assign_inner(
    dest: &Type,
    src: &Type,
    mut type_var_map: Option<&mut TypeVarMap>,
    depth: u32,
) -> bool {
    if depth > MAX_TYPE_RECURSION {
        return true;
    }

    // `Unknown` and `Any` absorb on either side without complaint.
    if dest.is_any_or_unknown() || src.is_any_or_unknown() {
        return true;
    }

    if src.is_never() {
        return true;
    }

    if let Type::TypeVar(type_var) = dest {
        return can_assign_to_type_var_inner(type_var, src, type_var_map, depth);
    }

    // A type variable as source stands for its bound (or one of its
    // constraints); an unconstrained one could be anything.
    if let Type::TypeVar(type_var) = src {
        if let Some(bound) = &type_var.bound {
            return can_assign_inner(dest, bound, type_var_map, depth + 1);
        }
        if !type_var.constraints.is_empty() {
            return type_var
                .constraints
                .iter()
                .all(|constraint| can_assign_inner(dest, constraint, type_var_map.as_deref_mut(), depth + 1));
        }
        return true;
    }

    // Every branch of a source union must be acceptable.
    if let Type::Union(union) = src {
        return union
            .subtypes()
            .iter()
            .all(|subtype| can_assign_inner(dest, subtype, type_var_map.as_deref_mut(), depth + 1));
    }

    if dest.is_never() {
        return false;
    }

    // A destination union accepts the source if some branch does; `None`
    // inside the union is what makes `Optional` work.
    if let Type::Union(union) = dest {
        return union
            .subtypes()
            .iter()
            .any(|subtype| can_assign_inner(subtype, src, type_var_map.as_deref_mut(), depth + 1));
    }

    // Everything is an instance of `object`.
    if let Type::Object(object) = dest {
        if object.class.is_known(KnownClass::Object) {
            return true;
        }
    }

    match (dest, src) {
        (Type::None, Type::None) => true,
        (Type::Object(dest_object), Type::Object(src_object)) => {
            can_assign_object(dest_object, src_object, type_var_map, depth)
        }
        (Type::Class(dest_class), Type::Class(src_class)) => {
            find_matching_base(src_class, dest_class, depth).is_some()
        }
        (Type::Function(dest_fn), Type::Function(src_fn)) => {
            can_assign_function(dest_fn, src_fn, type_var_map, depth)
        }
        (Type::Function(_), Type::Overloaded(src_overloads)) => src_overloads
            .overloads()
            .iter()
            .any(|overload| {
                can_assign_inner(
                    dest,
                    &Type::Function(overload.clone()),
                    type_var_map.as_deref_mut(),
                    depth + 1,
                )
            }),
        (Type::Module(a), Type::Module(b)) => Arc::ptr_eq(a, b),
        (Type::Property(a), Type::Property(b)) => Arc::ptr_eq(a, b),
        _ => false,
    }
}

/// Whether `src` satisfies `type_var`'s bound or constraints; on success the
/// binding is recorded (or checked against a previous one).
pub fn can_assign_to_type_var(
    type_var: &Arc<TypeVarType>,
    src: &Type,
    type_var_map: Option<&mut TypeVarMap>,
) -> bool {
    can_assign_to_type_var_inner(type_var, src, type_var_map, 0)
}

fn can_assign_to_type_var_inner(
    type_var: &Arc<TypeVarType>,
    src: &Type,
    mut type_var_map: Option<&mut TypeVarMap>,
    depth: u32,
) -> bool {
    if let Some(map) = type_var_map.as_deref_mut() {
        if let Some(existing) = map.get(&type_var.name).cloned() {
            return can_assign_inner(&existing, src, None, depth + 1);
        }
    }

    if let Some(bound) = &type_var.bound {
        if !can_assign_inner(bound, src, None, depth + 1) {
            return false;
        }
    }

    if !type_var.constraints.is_empty()
        && !type_var
            .constraints
            .iter()
            .any(|constraint| can_assign_inner(constraint, src, None, depth + 1))
    {
        return false;
    }

    if let Some(map) = type_var_map {
        map.set(type_var.name.clone(), src.clone());
    }
    true
}

fn can_assign_object(
    dest: &ObjectType,
    src: &ObjectType,
    mut type_var_map: Option<&mut TypeVarMap>,
    depth: u32,
) -> bool {
    let Some(matched) = find_matching_base(&src.class, &dest.class, depth) else {
        return false;
    };

    let Some(dest_args) = dest.class.type_args() else {
        // An unspecialized destination accepts any specialization.
        return true;
    };
    let Some(src_args) = matched.type_args() else {
        return true;
    };

    let params = dest.class.type_params();
    for (index, (src_arg, dest_arg)) in src_args.iter().zip(dest_args).enumerate() {
        let variance = params
            .get(index)
            .map(|param| param.variance)
            .unwrap_or_default();
        let compatible = match variance {
            Variance::Covariant => {
                can_assign_inner(dest_arg, src_arg, type_var_map.as_deref_mut(), depth + 1)
            }
            Variance::Contravariant => {
                can_assign_inner(src_arg, dest_arg, type_var_map.as_deref_mut(), depth + 1)
            }
            Variance::Invariant => {
                if let Type::TypeVar(_) = dest_arg {
                    can_assign_inner(dest_arg, src_arg, type_var_map.as_deref_mut(), depth + 1)
                } else {
                    src_arg.is_same(dest_arg)
                        || src_arg.is_any_or_unknown()
                        || dest_arg.is_any_or_unknown()
                }
            }
        };
        if !compatible {
            return false;
        }
    }
    true
}

/// Searches `src`'s transitive `include_in_mro` bases for `dest`'s generic
/// identity, substituting type arguments down the chain so the returned
/// class is `dest` as seen from `src`.
fn find_matching_base(src: &ClassType, dest: &ClassType, depth: u32) -> Option<ClassType> {
    if depth > MAX_TYPE_RECURSION {
        return None;
    }
    if src.is_same_generic_class(dest) {
        return Some(src.clone());
    }
    let substitution = TypeVarMap::from_class(src);
    for base in src.base_classes() {
        if !base.include_in_mro {
            continue;
        }
        let Type::Class(base_class) = &base.ty else {
            continue;
        };
        let specialized = match specialize_inner(&Type::Class(base_class.clone()), &substitution, 0)
        {
            Type::Class(class) => class,
            _ => base_class.clone(),
        };
        if let Some(found) = find_matching_base(&specialized, dest, depth + 1) {
            return Some(found);
        }
    }
    None
}

fn can_assign_function(
    dest: &FunctionType,
    src: &FunctionType,
    mut type_var_map: Option<&mut TypeVarMap>,
    depth: u32,
) -> bool {
    let skip_param_checks = dest
        .flags()
        .contains(FunctionTypeFlags::DISABLE_DEFAULT_CHECKS)
        || src
            .flags()
            .contains(FunctionTypeFlags::DISABLE_DEFAULT_CHECKS);

    if !skip_param_checks {
        if dest.parameters().len() != src.parameters().len() {
            return false;
        }
        for (dest_param, src_param) in dest.parameters().iter().zip(src.parameters()) {
            if dest_param.category != src_param.category {
                return false;
            }
            // Parameters are contravariant: the source function must accept
            // everything the destination signature promises to pass.
            if !can_assign_inner(
                &src_param.ty,
                &dest_param.ty,
                type_var_map.as_deref_mut(),
                depth + 1,
            ) {
                return false;
            }
        }
    }

    can_assign_inner(
        &dest.effective_return_type(),
        &src.effective_return_type(),
        type_var_map,
        depth + 1,
    )
}

/// Applies a substitution map: type variables are replaced by their
/// bindings, classes and callables are rebuilt with substituted arguments.
pub fn specialize_type(ty: &Type, type_var_map: &TypeVarMap) -> Type {
    specialize_inner(ty, type_var_map, 0)
}

fn specialize_inner(ty: &Type, type_var_map: &TypeVarMap, depth: u32) -> Type {
    if depth > MAX_TYPE_RECURSION {
        return ty.clone();
    }
    match ty {
        Type::TypeVar(type_var) => type_var_map
            .get(&type_var.name)
            .cloned()
            .unwrap_or_else(|| ty.clone()),
        Type::Union(_) => ty.map_subtypes(|subtype| specialize_inner(subtype, type_var_map, depth + 1)),
        Type::Class(class) => Type::Class(specialize_class(class, type_var_map, depth)),
        Type::Object(object) => Type::Object(ObjectType {
            class: specialize_class(&object.class, type_var_map, depth),
            truthiness: object.truthiness,
        }),
        Type::Function(function) => {
            Type::Function(Arc::new(specialize_function(function, type_var_map, depth)))
        }
        Type::Overloaded(overloaded) => {
            let overloads = overloaded
                .overloads()
                .iter()
                .map(|overload| Arc::new(specialize_function(overload, type_var_map, depth)))
                .collect();
            Type::Overloaded(Arc::new(crate::types::OverloadedFunctionType::new(
                overloads,
            )))
        }
        _ => ty.clone(),
    }
}

fn specialize_class(class: &ClassType, type_var_map: &TypeVarMap, depth: u32) -> ClassType {
    if let Some(args) = class.type_args() {
        let new_args = args
            .iter()
            .map(|arg| specialize_inner(arg, type_var_map, depth + 1))
            .collect();
        return class.clone_for_specialization(new_args);
    }

    let params = class.type_params();
    if params.is_empty() {
        return class.clone();
    }
    // An unspecialized generic class: fill each slot from the map, with
    // `Any` for the ones the map doesn't bind.
    let args = params
        .iter()
        .map(|param| {
            type_var_map
                .get(&param.name)
                .cloned()
                .unwrap_or(Type::any())
        })
        .collect();
    class.clone_for_specialization(args)
}

fn specialize_function(
    function: &FunctionType,
    type_var_map: &TypeVarMap,
    depth: u32,
) -> FunctionType {
    let mut specialized = FunctionType::new(function.flags());
    specialized.set_builtin_name(function.builtin_name().cloned());
    for param in function.parameters() {
        let mut param = param.clone();
        param.ty = specialize_inner(&param.ty, type_var_map, depth + 1);
        param.default_ty = param
            .default_ty
            .as_ref()
            .map(|default| specialize_inner(default, type_var_map, depth + 1));
        specialized.add_parameter(param);
    }
    specialized.set_declared_return_type(
        function
            .declared_return_type()
            .map(|ret| specialize_inner(ret, type_var_map, depth + 1)),
    );
    specialized.set_inferred_return_type(
        function
            .inferred_return_type()
            .map(|ret| specialize_inner(ret, type_var_map, depth + 1)),
    );
    specialized
}
