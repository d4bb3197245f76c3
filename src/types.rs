//! The static type model.
//!
//! Types are immutable values. Payloads that are shared between many type
//! values (classes, functions, modules, unions, type variables, properties)
//! live behind [`Arc`]; classes additionally split into a shared
//! [`ClassDetails`] (the generic identity) and per-value specialization
//! arguments, so specializing a generic class never copies its field maps.
//!
//! The only mutation the model permits is construction-time population:
//! appending base classes, parameters, and class/instance fields. Class
//! field maps use interior mutability for this (the evaluator is strictly
//! single-threaded); equality and comparisons never read the field maps, so
//! a class's identity is fixed once it is registered in a symbol.

use std::cell::RefCell;
use std::sync::Arc;

use bitflags::bitflags;
use rustc_hash::FxHashMap;

use crate::ast::ParameterCategory;
use crate::name::Name;
use crate::scope::Symbol;

pub mod assignability;
pub mod builder;
pub mod call;
pub mod context;
pub mod diagnostic;
pub mod display;
pub mod infer;
pub mod member;
pub mod narrow;
pub mod special_form;


pub use assignability::{can_assign_to_type_var, can_assign_type, specialize_type, TypeVarMap};
pub use builder::{combine_types, UnionBuilder};
pub use call::{CallArguments, FunctionArgument};
pub use context::{EvalContext, ExpressionTypeCache, NodeTypeCache};
pub use diagnostic::{Severity, TypeCheckDiagnostic, TypeCheckDiagnostics};
pub use infer::{EvaluatorFlags, ExpressionTypeProvider, TypeEvaluator, TypeResult};
pub use member::{MemberAccessFlags, MemberAccessUsage};
pub use narrow::{ConditionalConstraints, ConstraintBuilder, TypeConstraint};

/// A static type.
#[derive(Clone, Debug)]
pub enum Type {
    /// Terminal unresolved type. Assignable to and from anything without
    /// complaint.
    Unknown,
    /// The dynamic type. `is_ellipsis` preserves a literal `...` through
    /// `Callable[..., T]` forms.
    Any { is_ellipsis: bool },
    /// The `None` singleton.
    None,
    /// The empty set of values.
    Never,
    /// A class object (the value `int`, not an instance of it).
    Class(ClassType),
    /// An instance of a class.
    Object(ObjectType),
    Function(Arc<FunctionType>),
    Overloaded(Arc<OverloadedFunctionType>),
    Module(Arc<ModuleType>),
    Union(Arc<UnionType>),
    TypeVar(Arc<TypeVarType>),
    Property(Arc<PropertyType>),
}

impl Type {
    pub const fn any() -> Self {
        Type::Any { is_ellipsis: false }
    }

    pub const fn ellipsis() -> Self {
        Type::Any { is_ellipsis: true }
    }

    pub fn object(class: ClassType) -> Self {
        Type::Object(ObjectType {
            class,
            truthiness: None,
        })
    }

    pub fn object_with_truthiness(class: ClassType, truthy: bool) -> Self {
        Type::Object(ObjectType {
            class,
            truthiness: Some(truthy),
        })
    }

    pub fn function(function: FunctionType) -> Self {
        Type::Function(Arc::new(function))
    }

    pub const fn is_unknown(&self) -> bool {
        matches!(self, Type::Unknown)
    }

    pub const fn is_any(&self) -> bool {
        matches!(self, Type::Any { .. })
    }

    pub const fn is_any_or_unknown(&self) -> bool {
        matches!(self, Type::Any { .. } | Type::Unknown)
    }

    pub const fn is_ellipsis(&self) -> bool {
        matches!(self, Type::Any { is_ellipsis: true })
    }

    pub const fn is_never(&self) -> bool {
        matches!(self, Type::Never)
    }

    pub const fn is_none(&self) -> bool {
        matches!(self, Type::None)
    }

    /// Whether the type is `None` or a union with a `None` branch.
    pub fn is_possibly_none(&self) -> bool {
        match self {
            Type::None => true,
            Type::Union(union) => union.subtypes().iter().any(Type::is_none),
            _ => false,
        }
    }

    pub fn as_class(&self) -> Option<&ClassType> {
        match self {
            Type::Class(class) => Some(class),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ObjectType> {
        match self {
            Type::Object(object) => Some(object),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&Arc<FunctionType>> {
        match self {
            Type::Function(function) => Some(function),
            _ => None,
        }
    }

    /// Applies `f` to each union branch and combines the results, or to the
    /// type itself when it isn't a union. The only sanctioned way to
    /// distribute an operation over a union.
    pub fn map_subtypes(&self, mut f: impl FnMut(&Type) -> Type) -> Type {
        match self {
            Type::Union(union) => {
                let mut builder = UnionBuilder::new();
                for subtype in union.subtypes() {
                    builder = builder.add(f(subtype));
                }
                builder.build()
            }
            _ => f(self),
        }
    }

    /// Structural identity: same variant, classes by generic identity plus
    /// specialization arguments, type variables and function-like payloads
    /// by allocation identity.
    pub fn is_same(&self, other: &Type) -> bool {
        match (self, other) {
            (Type::Unknown, Type::Unknown)
            | (Type::Any { .. }, Type::Any { .. })
            | (Type::None, Type::None)
            | (Type::Never, Type::Never) => true,
            (Type::Class(a), Type::Class(b)) => a == b,
            (Type::Object(a), Type::Object(b)) => a == b,
            (Type::Function(a), Type::Function(b)) => Arc::ptr_eq(a, b),
            (Type::Overloaded(a), Type::Overloaded(b)) => Arc::ptr_eq(a, b),
            (Type::Module(a), Type::Module(b)) => Arc::ptr_eq(a, b),
            (Type::TypeVar(a), Type::TypeVar(b)) => Arc::ptr_eq(a, b),
            (Type::Property(a), Type::Property(b)) => Arc::ptr_eq(a, b),
            (Type::Union(a), Type::Union(b)) => {
                a.subtypes().len() == b.subtypes().len()
                    && a.subtypes()
                        .iter()
                        .zip(b.subtypes())
                        .all(|(x, y)| x.is_same(y))
            }
            _ => false,
        }
    }
}

impl PartialEq for Type {
    fn eq(&self, other: &Self) -> bool {
        self.is_same(other)
    }
}

impl Eq for Type {}

bitflags! {
    #[derive(Copy, Clone, Debug, Eq, PartialEq)]
    pub struct ClassTypeFlags: u8 {
        /// Defined in the builtins scope.
        const BUILT_IN = 1 << 0;
        /// A built-in whose subscription has special-form semantics
        /// (`Callable`, `Optional`, `Union`, `Generic`, `Tuple`, `Type`, ...).
        const SPECIAL_BUILT_IN = 1 << 1;
        const ABSTRACT = 1 << 2;
        /// Eligible for `__new__`/`__init__` synthesis from its field
        /// declarations.
        const DATA_CLASS = 1 << 3;
    }
}

bitflags! {
    #[derive(Copy, Clone, Debug, Eq, PartialEq)]
    pub struct FunctionTypeFlags: u8 {
        const INSTANCE_METHOD = 1 << 0;
        const CLASS_METHOD = 1 << 1;
        const STATIC_METHOD = 1 << 2;
        const ABSTRACT_METHOD = 1 << 3;
        /// Generated by the evaluator (dataclass / named-tuple synthesis)
        /// rather than declared in source.
        const SYNTHESIZED_METHOD = 1 << 4;
        /// Parameter checks are disabled; the `Callable[..., T]` form.
        const DISABLE_DEFAULT_CHECKS = 1 << 5;
    }
}

/// Builtin classes the evaluator itself needs to recognize.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum KnownClass {
    Object,
    Bool,
    Int,
    Float,
    Complex,
    Str,
    List,
    Dict,
    Set,
    FrozenSet,
    Tuple,
    Generator,
}

impl KnownClass {
    pub const fn as_str(self) -> &'static str {
        match self {
            KnownClass::Object => "object",
            KnownClass::Bool => "bool",
            KnownClass::Int => "int",
            KnownClass::Float => "float",
            KnownClass::Complex => "complex",
            KnownClass::Str => "str",
            KnownClass::List => "list",
            KnownClass::Dict => "dict",
            KnownClass::Set => "set",
            KnownClass::FrozenSet => "frozenset",
            KnownClass::Tuple => "tuple",
            KnownClass::Generator => "Generator",
        }
    }
}

/// A base-class reference plus whether it participates in attribute lookup.
#[derive(Clone, Debug)]
pub struct BaseClass {
    pub ty: Type,
    pub include_in_mro: bool,
}

/// The shared, identity-carrying half of a class.
pub struct ClassDetails {
    name: Name,
    flags: ClassTypeFlags,
    source_id: u32,
    type_params: RefCell<Vec<Arc<TypeVarType>>>,
    base_classes: RefCell<Vec<BaseClass>>,
    class_fields: RefCell<FxHashMap<Name, Symbol>>,
    instance_fields: RefCell<FxHashMap<Name, Symbol>>,
    /// Special forms like `List` transparently forward lookups to the class
    /// they alias (`list`).
    aliased_class: Option<ClassType>,
}

/// A class, possibly specialized with type arguments.
///
/// `clone_for_specialization` shares the details allocation, so all
/// specializations of one class declaration compare equal under
/// [`ClassType::is_same_generic_class`].
#[derive(Clone)]
pub struct ClassType {
    details: Arc<ClassDetails>,
    type_args: Option<Arc<[Type]>>,
}

impl ClassType {
    pub fn new(name: impl Into<Name>, flags: ClassTypeFlags, source_id: u32) -> Self {
        Self {
            details: Arc::new(ClassDetails {
                name: name.into(),
                flags,
                source_id,
                type_params: RefCell::new(Vec::new()),
                base_classes: RefCell::new(Vec::new()),
                class_fields: RefCell::new(FxHashMap::default()),
                instance_fields: RefCell::new(FxHashMap::default()),
                aliased_class: None,
            }),
            type_args: None,
        }
    }

    /// A special-form class that forwards member lookup to `target`.
    pub fn new_alias(
        name: impl Into<Name>,
        flags: ClassTypeFlags,
        source_id: u32,
        target: ClassType,
    ) -> Self {
        Self {
            details: Arc::new(ClassDetails {
                name: name.into(),
                flags,
                source_id,
                type_params: RefCell::new(Vec::new()),
                base_classes: RefCell::new(Vec::new()),
                class_fields: RefCell::new(FxHashMap::default()),
                instance_fields: RefCell::new(FxHashMap::default()),
                aliased_class: Some(target),
            }),
            type_args: None,
        }
    }

    /// A new class value with the same generic identity and the given type
    /// arguments.
    pub fn clone_for_specialization(&self, type_args: Vec<Type>) -> Self {
        Self {
            details: self.details.clone(),
            type_args: Some(type_args.into()),
        }
    }

    pub fn name(&self) -> &Name {
        &self.details.name
    }

    pub fn flags(&self) -> ClassTypeFlags {
        self.details.flags
    }

    pub fn source_id(&self) -> u32 {
        self.details.source_id
    }

    pub fn is_built_in(&self) -> bool {
        self.details.flags.contains(ClassTypeFlags::BUILT_IN)
    }

    pub fn is_special_built_in(&self) -> bool {
        self.details.flags.contains(ClassTypeFlags::SPECIAL_BUILT_IN)
    }

    pub fn is_abstract(&self) -> bool {
        self.details.flags.contains(ClassTypeFlags::ABSTRACT)
    }

    pub fn is_data_class(&self) -> bool {
        self.details.flags.contains(ClassTypeFlags::DATA_CLASS)
    }

    pub fn is_known(&self, known: KnownClass) -> bool {
        self.is_built_in() && self.details.name == known.as_str()
    }

    /// Same class declaration, ignoring specialization arguments.
    pub fn is_same_generic_class(&self, other: &ClassType) -> bool {
        self.details.source_id == other.details.source_id
    }

    pub fn type_args(&self) -> Option<&[Type]> {
        self.type_args.as_deref()
    }

    pub fn type_params(&self) -> Vec<Arc<TypeVarType>> {
        self.details.type_params.borrow().clone()
    }

    pub fn set_type_params(&self, params: Vec<Arc<TypeVarType>>) {
        *self.details.type_params.borrow_mut() = params;
    }

    pub fn base_classes(&self) -> Vec<BaseClass> {
        self.details.base_classes.borrow().clone()
    }

    pub fn add_base_class(&self, ty: Type, include_in_mro: bool) {
        self.details.base_classes.borrow_mut().push(BaseClass {
            ty,
            include_in_mro,
        });
    }

    pub fn aliased_class(&self) -> Option<&ClassType> {
        self.details.aliased_class.as_ref()
    }

    pub fn class_field(&self, name: &str) -> Option<Symbol> {
        self.details.class_fields.borrow().get(name).cloned()
    }

    pub fn add_class_field(&self, name: impl Into<Name>, symbol: Symbol) {
        self.details
            .class_fields
            .borrow_mut()
            .insert(name.into(), symbol);
    }

    pub fn instance_field(&self, name: &str) -> Option<Symbol> {
        self.details.instance_fields.borrow().get(name).cloned()
    }

    pub fn add_instance_field(&self, name: impl Into<Name>, symbol: Symbol) {
        self.details
            .instance_fields
            .borrow_mut()
            .insert(name.into(), symbol);
    }
}

impl PartialEq for ClassType {
    fn eq(&self, other: &Self) -> bool {
        if !self.is_same_generic_class(other) {
            return false;
        }
        match (&self.type_args, &other.type_args) {
            (None, None) => true,
            (Some(a), Some(b)) => {
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.is_same(y))
            }
            _ => false,
        }
    }
}

impl Eq for ClassType {}

impl std::fmt::Debug for ClassType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut debug = f.debug_struct("ClassType");
        debug.field("name", &self.details.name);
        if let Some(args) = &self.type_args {
            debug.field("type_args", args);
        }
        debug.finish_non_exhaustive()
    }
}

/// An instance of a class, optionally tagged with a proven truthiness
/// (`True`/`False` literals feed this into narrowing).
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ObjectType {
    pub class: ClassType,
    pub truthiness: Option<bool>,
}

/// One function parameter.
#[derive(Clone, Debug)]
pub struct FunctionParameter {
    pub category: ParameterCategory,
    pub name: Option<Name>,
    pub has_default: bool,
    pub default_ty: Option<Type>,
    pub ty: Type,
}

impl FunctionParameter {
    pub fn simple(name: impl Into<Name>, ty: Type) -> Self {
        Self {
            category: ParameterCategory::Simple,
            name: Some(name.into()),
            has_default: false,
            default_ty: None,
            ty,
        }
    }

    pub fn with_default(name: impl Into<Name>, ty: Type, default_ty: Type) -> Self {
        Self {
            category: ParameterCategory::Simple,
            name: Some(name.into()),
            has_default: true,
            default_ty: Some(default_ty),
            ty,
        }
    }

    pub fn var_arg_list(name: Option<Name>, ty: Type) -> Self {
        Self {
            category: ParameterCategory::VarArgList,
            name,
            has_default: false,
            default_ty: None,
            ty,
        }
    }

    pub fn var_arg_dictionary(name: impl Into<Name>, ty: Type) -> Self {
        Self {
            category: ParameterCategory::VarArgDictionary,
            name: Some(name.into()),
            has_default: false,
            default_ty: None,
            ty,
        }
    }
}

#[derive(Clone, Debug)]
pub struct FunctionType {
    flags: FunctionTypeFlags,
    parameters: Vec<FunctionParameter>,
    declared_return_ty: Option<Type>,
    inferred_return_ty: Option<Type>,
    builtin_name: Option<Name>,
}

impl FunctionType {
    pub fn new(flags: FunctionTypeFlags) -> Self {
        Self {
            flags,
            parameters: Vec::new(),
            declared_return_ty: None,
            inferred_return_ty: None,
            builtin_name: None,
        }
    }

    pub fn flags(&self) -> FunctionTypeFlags {
        self.flags
    }

    pub fn is_instance_method(&self) -> bool {
        self.flags.contains(FunctionTypeFlags::INSTANCE_METHOD)
    }

    pub fn is_class_method(&self) -> bool {
        self.flags.contains(FunctionTypeFlags::CLASS_METHOD)
    }

    pub fn is_static_method(&self) -> bool {
        self.flags.contains(FunctionTypeFlags::STATIC_METHOD)
    }

    pub fn add_parameter(&mut self, parameter: FunctionParameter) {
        self.parameters.push(parameter);
    }

    pub fn parameters(&self) -> &[FunctionParameter] {
        &self.parameters
    }

    pub fn strip_first_parameter(&mut self) {
        if !self.parameters.is_empty() {
            self.parameters.remove(0);
        }
    }

    pub fn set_declared_return_type(&mut self, ty: Option<Type>) {
        self.declared_return_ty = ty;
    }

    pub fn declared_return_type(&self) -> Option<&Type> {
        self.declared_return_ty.as_ref()
    }

    pub fn set_inferred_return_type(&mut self, ty: Option<Type>) {
        self.inferred_return_ty = ty;
    }

    pub fn inferred_return_type(&self) -> Option<&Type> {
        self.inferred_return_ty.as_ref()
    }

    pub fn set_builtin_name(&mut self, name: Option<Name>) {
        self.builtin_name = name;
    }

    pub fn builtin_name(&self) -> Option<&Name> {
        self.builtin_name.as_ref()
    }

    /// The declared return type when present, the inferred one otherwise.
    pub fn effective_return_type(&self) -> Type {
        self.declared_return_ty
            .clone()
            .or_else(|| self.inferred_return_ty.clone())
            .unwrap_or(Type::Unknown)
    }
}

#[derive(Clone, Debug)]
pub struct OverloadedFunctionType {
    overloads: Vec<Arc<FunctionType>>,
}

impl OverloadedFunctionType {
    pub fn new(overloads: Vec<Arc<FunctionType>>) -> Self {
        Self { overloads }
    }

    pub fn overloads(&self) -> &[Arc<FunctionType>] {
        &self.overloads
    }
}

#[derive(Debug)]
pub struct ModuleType {
    name: Name,
    fields: RefCell<FxHashMap<Name, Symbol>>,
}

impl ModuleType {
    pub fn new(name: impl Into<Name>) -> Self {
        Self {
            name: name.into(),
            fields: RefCell::new(FxHashMap::default()),
        }
    }

    pub fn name(&self) -> &Name {
        &self.name
    }

    pub fn add_field(&self, name: impl Into<Name>, symbol: Symbol) {
        self.fields.borrow_mut().insert(name.into(), symbol);
    }

    pub fn field(&self, name: &str) -> Option<Symbol> {
        self.fields.borrow().get(name).cloned()
    }
}

/// A canonicalized union: flattened, deduplicated, never empty, never a
/// singleton. Built exclusively by [`UnionBuilder`].
#[derive(Clone, Debug)]
pub struct UnionType {
    subtypes: Vec<Type>,
}

impl UnionType {
    pub(crate) fn new(subtypes: Vec<Type>) -> Self {
        debug_assert!(subtypes.len() >= 2);
        Self { subtypes }
    }

    pub fn subtypes(&self) -> &[Type] {
        &self.subtypes
    }

    pub fn contains(&self, ty: &Type) -> bool {
        self.subtypes.iter().any(|subtype| subtype.is_same(ty))
    }
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum Variance {
    #[default]
    Invariant,
    Covariant,
    Contravariant,
}

/// A type variable. Either bounded or constrained, never both.
#[derive(Clone, Debug)]
pub struct TypeVarType {
    pub name: Name,
    pub bound: Option<Type>,
    pub constraints: Vec<Type>,
    pub variance: Variance,
}

impl TypeVarType {
    pub fn new(name: impl Into<Name>) -> Self {
        Self {
            name: name.into(),
            bound: None,
            constraints: Vec::new(),
            variance: Variance::Invariant,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct PropertyType {
    pub getter: Option<Arc<FunctionType>>,
    pub setter: Option<Arc<FunctionType>>,
    pub deleter: Option<Arc<FunctionType>>,
}

bitflags! {
    #[derive(Copy, Clone, Debug, Eq, PartialEq)]
    pub struct ClassMemberLookupFlags: u8 {
        const SKIP_INSTANCE_MEMBERS = 1 << 0;
        const SKIP_BASE_CLASSES = 1 << 1;
        const SKIP_OBJECT_BASE_CLASS = 1 << 2;
    }
}

/// A successful class-member lookup: the symbol, the class that owns it, and
/// whether it came from the instance-field side.
#[derive(Clone, Debug)]
pub struct ClassMemberLookup {
    pub symbol: Symbol,
    pub class: ClassType,
    pub is_instance_member: bool,
}

/// Depth-first walk over the class and its `include_in_mro` bases, returning
/// the first field named `name`. Alias classes are followed before lookup,
/// so the special-form `List` transparently searches `list`.
pub fn lookup_class_member(
    class: &ClassType,
    name: &str,
    flags: ClassMemberLookupFlags,
) -> Option<ClassMemberLookup> {
    if let Some(alias) = class.aliased_class() {
        return lookup_class_member(alias, name, flags);
    }

    if !flags.contains(ClassMemberLookupFlags::SKIP_INSTANCE_MEMBERS) {
        if let Some(symbol) = class.instance_field(name) {
            return Some(ClassMemberLookup {
                symbol,
                class: class.clone(),
                is_instance_member: true,
            });
        }
    }

    if let Some(symbol) = class.class_field(name) {
        return Some(ClassMemberLookup {
            symbol,
            class: class.clone(),
            is_instance_member: false,
        });
    }

    if !flags.contains(ClassMemberLookupFlags::SKIP_BASE_CLASSES) {
        for base in class.base_classes() {
            if !base.include_in_mro {
                continue;
            }
            let Type::Class(base_class) = &base.ty else {
                continue;
            };
            if flags.contains(ClassMemberLookupFlags::SKIP_OBJECT_BASE_CLASS)
                && base_class.is_known(KnownClass::Object)
            {
                continue;
            }
            if let Some(hit) = lookup_class_member(base_class, name, flags) {
                return Some(hit);
            }
        }
    }

    None
}

/// Binds a method to the value it was accessed through: strips the implicit
/// first parameter of instance methods accessed on an object and class
/// methods accessed on a class, and partially specializes the result with
/// the class's type arguments. Everything else is returned unchanged.
pub fn bind_function_to_class_or_object(base: &Type, member_ty: Type) -> Type {
    match member_ty {
        Type::Function(function) => bind_single_function(base, &function),
        Type::Overloaded(overloaded) => {
            let bound = overloaded
                .overloads()
                .iter()
                .map(|overload| match bind_single_function(base, overload) {
                    Type::Function(function) => function,
                    _ => overload.clone(),
                })
                .collect();
            Type::Overloaded(Arc::new(OverloadedFunctionType::new(bound)))
        }
        other => other,
    }
}

fn bind_single_function(base: &Type, function: &Arc<FunctionType>) -> Type {
    let class = match base {
        Type::Object(object) if function.is_instance_method() => Some(&object.class),
        Type::Class(class) if function.is_class_method() => Some(class),
        _ => None,
    };
    let Some(class) = class else {
        return Type::Function(function.clone());
    };
    if function.parameters().is_empty() {
        // A no-parameter method can't consume the implicit argument; leave
        // it alone and let call validation produce the diagnostic.
        return Type::Function(function.clone());
    }

    let mut bound = function.as_ref().clone();
    bound.strip_first_parameter();

    if class.type_args().is_some() {
        let type_var_map = TypeVarMap::from_class(class);
        if let Type::Function(specialized) =
            specialize_type(&Type::function(bound.clone()), &type_var_map)
        {
            return Type::Function(specialized);
        }
    }

    Type::Function(Arc::new(bound))
}

/// Removes the values that are always truthy: the result type of `a` when
/// `a and b` evaluates to `a`.
pub fn remove_truthiness(ty: &Type) -> Type {
    ty.map_subtypes(|subtype| match subtype {
        Type::Object(object) if object.class.is_known(KnownClass::Bool) => {
            match object.truthiness {
                Some(true) => Type::Never,
                _ => Type::object_with_truthiness(object.class.clone(), false),
            }
        }
        other => other.clone(),
    })
}

/// Removes the values that are always falsy: the result type of `a` when
/// `a or b` evaluates to `a`.
pub fn remove_falsiness(ty: &Type) -> Type {
    ty.map_subtypes(|subtype| match subtype {
        Type::None => Type::Never,
        Type::Object(object) if object.class.is_known(KnownClass::Bool) => {
            match object.truthiness {
                Some(false) => Type::Never,
                _ => Type::object_with_truthiness(object.class.clone(), true),
            }
        }
        other => other.clone(),
    })
}

/// Converts class references in an annotation to the instances they denote:
/// `int` in `x: int` means "an instance of int". Distributes over unions.
pub fn convert_class_to_object(ty: &Type) -> Type {
    ty.map_subtypes(|subtype| match subtype {
        Type::Class(class) => Type::object(class.clone()),
        other => other.clone(),
    })
}
