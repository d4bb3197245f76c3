//! Member access and descriptor resolution.
//!
//! Resolves `obj.name` / `Cls.name` over classes, objects, modules, and
//! unions: properties, the descriptor protocol, the
//! `__getattribute__`/`__getattr__`/`__setattr__` fallbacks, and method
//! binding. Failures report a diagnostic and resolve to `Unknown` so
//! evaluation continues.

use bitflags::bitflags;

use crate::ast::TextRange;
use crate::name::Name;
use crate::types::assignability::{specialize_type, TypeVarMap};
use crate::types::builder::UnionBuilder;
use crate::types::context::EvalContext;
use crate::types::{
    bind_function_to_class_or_object, lookup_class_member, ClassMemberLookupFlags, ClassType,
    ObjectType, PropertyType, Type,
};

bitflags! {
    #[derive(Copy, Clone, Debug, Eq, PartialEq)]
    pub struct MemberAccessFlags: u8 {
        /// Look at class fields only.
        const SKIP_INSTANCE_MEMBERS = 1 << 0;
        /// Don't fall back to `__getattribute__` / `__getattr__`.
        const SKIP_GET_ATTRIBUTE_CHECK = 1 << 1;
        /// Don't invoke the descriptor protocol on the resolved member.
        const SKIP_GET_CHECK = 1 << 2;
    }
}

impl MemberAccessFlags {
    /// The combination used internally to find raw method definitions
    /// without triggering descriptors or attribute fallbacks.
    pub const SKIP_FOR_METHOD_LOOKUP: MemberAccessFlags = MemberAccessFlags::union(
        MemberAccessFlags::union(
            MemberAccessFlags::SKIP_INSTANCE_MEMBERS,
            MemberAccessFlags::SKIP_GET_ATTRIBUTE_CHECK,
        ),
        MemberAccessFlags::SKIP_GET_CHECK,
    );
}

/// Why the member is being accessed; setting and deleting resolve through
/// different hooks than reading.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum MemberAccessUsage {
    Get,
    Set,
    Delete,
}

impl MemberAccessUsage {
    fn verb(self) -> &'static str {
        match self {
            MemberAccessUsage::Get => "access",
            MemberAccessUsage::Set => "set",
            MemberAccessUsage::Delete => "delete",
        }
    }
}

/// Resolves `base_ty.member`, reporting diagnostics at `range`.
pub(crate) fn get_type_from_member_access(
    ctx: &EvalContext<'_>,
    base_ty: &Type,
    member: &Name,
    range: TextRange,
    usage: MemberAccessUsage,
    flags: MemberAccessFlags,
) -> Type {
    match base_ty {
        Type::Any { .. } | Type::Unknown => base_ty.clone(),
        Type::Class(class) => {
            if let Some(ty) = class_member_access(class, member, usage, flags) {
                return ty;
            }
            report_failure(ctx, base_ty, member, range, usage)
        }
        Type::Object(object) => {
            if let Some(ty) = object_member_access(object, member, usage, flags) {
                return ty;
            }
            report_failure(ctx, base_ty, member, range, usage)
        }
        Type::Module(module) => match module.field(member) {
            Some(symbol) => symbol.effective_type(),
            None => {
                ctx.report_error(
                    range,
                    format_args!(
                        "'{member}' is not a known member of module '{}'",
                        module.name()
                    ),
                );
                Type::Unknown
            }
        },
        Type::Union(union) => {
            // A `None` branch gets the configurable optional-access
            // diagnostic (once) but doesn't abort the other branches.
            let mut reported_none = false;
            let mut builder = UnionBuilder::new();
            for subtype in union.subtypes() {
                if subtype.is_none() {
                    if !reported_none {
                        report_optional_member_access(ctx, member, range);
                        reported_none = true;
                    }
                    continue;
                }
                builder =
                    builder.add(get_type_from_member_access(ctx, subtype, member, range, usage, flags));
            }
            builder.build()
        }
        Type::None => {
            report_optional_member_access(ctx, member, range);
            Type::Unknown
        }
        Type::TypeVar(type_var) => match &type_var.bound {
            Some(bound) => get_type_from_member_access(ctx, bound, member, range, usage, flags),
            None => report_failure(ctx, base_ty, member, range, usage),
        },
        _ => report_failure(ctx, base_ty, member, range, usage),
    }
}

fn report_optional_member_access(ctx: &EvalContext<'_>, member: &Name, range: TextRange) {
    ctx.report_configurable(
        ctx.settings().report_optional_member_access,
        range,
        format_args!("'{member}' is not a known member of 'None'"),
    );
}

fn report_failure(
    ctx: &EvalContext<'_>,
    base_ty: &Type,
    member: &Name,
    range: TextRange,
    usage: MemberAccessUsage,
) -> Type {
    ctx.report_error(
        range,
        format_args!(
            "Cannot {} member '{member}' for type '{}'",
            usage.verb(),
            base_ty.display()
        ),
    );
    Type::Unknown
}

fn class_member_access(
    class: &ClassType,
    member: &Name,
    usage: MemberAccessUsage,
    flags: MemberAccessFlags,
) -> Option<Type> {
    if let Some(hit) = lookup_class_member(
        class,
        member,
        ClassMemberLookupFlags::SKIP_INSTANCE_MEMBERS,
    ) {
        let member_ty = hit.symbol.effective_type();
        return Some(bind_function_to_class_or_object(
            &Type::Class(class.clone()),
            member_ty,
        ));
    }
    attribute_fallback(class, None, usage, flags)
}

fn object_member_access(
    object: &ObjectType,
    member: &Name,
    usage: MemberAccessUsage,
    flags: MemberAccessFlags,
) -> Option<Type> {
    let lookup_flags = if flags.contains(MemberAccessFlags::SKIP_INSTANCE_MEMBERS) {
        ClassMemberLookupFlags::SKIP_INSTANCE_MEMBERS
    } else {
        ClassMemberLookupFlags::empty()
    };

    if let Some(hit) = lookup_class_member(&object.class, member, lookup_flags) {
        let member_ty = hit.symbol.effective_type();

        if let Type::Property(property) = &member_ty {
            return property_access(property, usage);
        }

        if !flags.contains(MemberAccessFlags::SKIP_GET_CHECK) {
            if let Type::Object(member_object) = &member_ty {
                if let Some(ty) = descriptor_access(member_object, usage) {
                    return Some(ty);
                }
            }
        }

        // Specialize the member through the owning object's type arguments
        // before binding, so `Box[int].value` comes out as `int`.
        let member_ty = if object.class.type_args().is_some() {
            specialize_type(&member_ty, &TypeVarMap::from_class(&object.class))
        } else {
            member_ty
        };
        return Some(bind_function_to_class_or_object(
            &Type::Object(object.clone()),
            member_ty,
        ));
    }

    attribute_fallback(&object.class, Some(object), usage, flags)
}

fn property_access(property: &PropertyType, usage: MemberAccessUsage) -> Option<Type> {
    match usage {
        MemberAccessUsage::Get => Some(
            property
                .getter
                .as_ref()
                .map(|getter| getter.effective_return_type())
                .unwrap_or(Type::any()),
        ),
        MemberAccessUsage::Set => property.setter.as_ref().map(|_| Type::any()),
        MemberAccessUsage::Delete => property.deleter.as_ref().map(|_| Type::any()),
    }
}

/// The descriptor protocol: a resolved member whose class defines `__get__`,
/// `__set__`, or `__del__` intercepts the access.
fn descriptor_access(member_object: &ObjectType, usage: MemberAccessUsage) -> Option<Type> {
    let method_name = match usage {
        MemberAccessUsage::Get => "__get__",
        MemberAccessUsage::Set => "__set__",
        MemberAccessUsage::Delete => "__del__",
    };
    let hit = lookup_class_member(
        &member_object.class,
        method_name,
        ClassMemberLookupFlags::SKIP_INSTANCE_MEMBERS,
    )?;

    match usage {
        MemberAccessUsage::Get => {
            let bound = bind_function_to_class_or_object(
                &Type::Object(member_object.clone()),
                hit.symbol.effective_type(),
            );
            match bound {
                Type::Function(function) => Some(function.effective_return_type()),
                _ => None,
            }
        }
        MemberAccessUsage::Set | MemberAccessUsage::Delete => Some(Type::any()),
    }
}

/// The `__getattribute__` / `__getattr__` (and set/delete counterpart)
/// fallback, consulted when ordinary lookup finds nothing.
fn attribute_fallback(
    class: &ClassType,
    object: Option<&ObjectType>,
    usage: MemberAccessUsage,
    flags: MemberAccessFlags,
) -> Option<Type> {
    if flags.contains(MemberAccessFlags::SKIP_GET_ATTRIBUTE_CHECK) {
        return None;
    }
    // NB: the delete probe looks up '__detattr__', but the canonical hook
    // name is '__delattr__'.
    let probe_names: &[&str] = match usage {
        MemberAccessUsage::Get => &["__getattribute__", "__getattr__"],
        MemberAccessUsage::Set => &["__setattr__"],
        MemberAccessUsage::Delete => &["__detattr__"],
    };

    for probe in probe_names {
        let Some(hit) = lookup_class_member(
            class,
            probe,
            ClassMemberLookupFlags::SKIP_INSTANCE_MEMBERS,
        ) else {
            continue;
        };
        let base = match object {
            Some(object) => Type::Object(object.clone()),
            None => Type::Class(class.clone()),
        };
        let bound = bind_function_to_class_or_object(&base, hit.symbol.effective_type());
        if let Type::Function(function) = bound {
            let return_ty = function.effective_return_type();
            if let Some(object) = object {
                if object.class.type_args().is_some() {
                    return Some(specialize_type(
                        &return_ty,
                        &TypeVarMap::from_class(&object.class),
                    ));
                }
            }
            return Some(return_ty);
        }
    }
    None
}
