//! Fixtures for exercising the evaluator without a parser or binder.
//!
//! A real pipeline builds the builtins scope from stub files; tests (and
//! embedders experimenting with the evaluator) get a hand-assembled one
//! here, covering the builtin classes and the special typing forms the
//! evaluator recognizes.

use std::sync::Arc;

use crate::name::Name;
use crate::scope::{DeclarationCategory, Scope, ScopeKind, Symbol};
use crate::types::{
    ClassType, ClassTypeFlags, FunctionParameter, FunctionType, FunctionTypeFlags, Type,
    TypeVarType,
};

/// Source ids below this are reserved for the builtins fixture; user classes
/// in tests should allocate above it.
pub const USER_SOURCE_ID_BASE: u32 = 1000;

struct BuiltinsBuilder {
    scope: Arc<Scope>,
    next_id: u32,
}

impl BuiltinsBuilder {
    fn next_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn register(&self, class: &ClassType) {
        self.scope.add_symbol(
            class.name().clone(),
            Symbol::new(DeclarationCategory::Class, Type::Class(class.clone())),
        );
    }

    fn class(&mut self, name: &str, flags: ClassTypeFlags) -> ClassType {
        let class = ClassType::new(name, flags, self.next_id());
        self.register(&class);
        class
    }

    fn alias(&mut self, name: &str, target: &ClassType) {
        let id = self.next_id();
        let class = ClassType::new_alias(
            name,
            ClassTypeFlags::BUILT_IN | ClassTypeFlags::SPECIAL_BUILT_IN,
            id,
            target.clone(),
        );
        self.register(&class);
    }

    fn special_form(&mut self, name: &str) -> ClassType {
        self.class(
            name,
            ClassTypeFlags::BUILT_IN | ClassTypeFlags::SPECIAL_BUILT_IN,
        )
    }
}

fn instance_method(
    params: impl IntoIterator<Item = FunctionParameter>,
    return_ty: Type,
) -> Symbol {
    let mut function = FunctionType::new(FunctionTypeFlags::INSTANCE_METHOD);
    function.add_parameter(FunctionParameter::simple("self", Type::Unknown));
    for param in params {
        function.add_parameter(param);
    }
    function.set_declared_return_type(Some(return_ty));
    Symbol::new(DeclarationCategory::Method, Type::function(function))
}

/// Builds a builtins scope with the stdlib subset the evaluator's own
/// machinery recognizes: the numeric tower, the container classes with their
/// type parameters, `Generator`, and the special typing forms.
pub fn create_builtins_scope() -> Arc<Scope> {
    let mut b = BuiltinsBuilder {
        scope: Scope::new(ScopeKind::Builtin, None),
        next_id: 1,
    };

    let object = b.class("object", ClassTypeFlags::BUILT_IN);

    let int = b.class("int", ClassTypeFlags::BUILT_IN);
    int.add_base_class(Type::Class(object.clone()), true);
    let int_object = Type::object(int.clone());
    int.add_class_field("bit_length", instance_method([], int_object.clone()));
    for dunder in ["__neg__", "__pos__", "__inv__"] {
        int.add_class_field(dunder, instance_method([], int_object.clone()));
    }

    let float = b.class("float", ClassTypeFlags::BUILT_IN);
    float.add_base_class(Type::Class(object.clone()), true);
    let complex = b.class("complex", ClassTypeFlags::BUILT_IN);
    complex.add_base_class(Type::Class(object.clone()), true);

    let bool_class = b.class("bool", ClassTypeFlags::BUILT_IN);
    bool_class.add_base_class(Type::Class(int.clone()), true);

    let str_class = b.class("str", ClassTypeFlags::BUILT_IN);
    str_class.add_base_class(Type::Class(object.clone()), true);
    str_class.add_class_field("upper", instance_method([], Type::object(str_class.clone())));

    // Generator[_YieldT, _SendT, _ReturnT]
    let generator = b.class("Generator", ClassTypeFlags::BUILT_IN);
    generator.add_base_class(Type::Class(object.clone()), true);
    generator.set_type_params(vec![
        Arc::new(TypeVarType::new("_YieldT")),
        Arc::new(TypeVarType::new("_SendT")),
        Arc::new(TypeVarType::new("_ReturnT")),
    ]);

    // The single-parameter containers. Each gets an `__iter__` returning
    // Generator[_T, None, None] so iteration resolves the element type.
    for name in ["list", "set", "frozenset", "deque"] {
        let element = Arc::new(TypeVarType::new("_T"));
        let class = b.class(name, ClassTypeFlags::BUILT_IN);
        class.add_base_class(Type::Class(object.clone()), true);
        class.set_type_params(vec![element.clone()]);
        let iterator = generator.clone_for_specialization(vec![
            Type::TypeVar(element.clone()),
            Type::None,
            Type::None,
        ]);
        class.add_class_field("__iter__", instance_method([], Type::object(iterator)));
        if name == "list" {
            class.add_class_field(
                "append",
                instance_method(
                    [FunctionParameter::simple("value", Type::TypeVar(element))],
                    Type::None,
                ),
            );
        }
    }

    for name in ["dict", "defaultdict"] {
        let key = Arc::new(TypeVarType::new("_KT"));
        let value = Arc::new(TypeVarType::new("_VT"));
        let class = b.class(name, ClassTypeFlags::BUILT_IN);
        class.add_base_class(Type::Class(object.clone()), true);
        class.set_type_params(vec![key, value]);
    }

    let tuple = b.class("tuple", ClassTypeFlags::BUILT_IN);
    tuple.add_base_class(Type::Class(object.clone()), true);

    // The typing-module aliases forward member lookup to their runtime
    // counterparts.
    let list = lookup_class(&b.scope, "list");
    let set = lookup_class(&b.scope, "set");
    let frozenset = lookup_class(&b.scope, "frozenset");
    let deque = lookup_class(&b.scope, "deque");
    let dict = lookup_class(&b.scope, "dict");
    let defaultdict = lookup_class(&b.scope, "defaultdict");
    b.alias("List", &list);
    b.alias("Set", &set);
    b.alias("FrozenSet", &frozenset);
    b.alias("Deque", &deque);
    b.alias("Dict", &dict);
    b.alias("DefaultDict", &defaultdict);
    b.alias("Tuple", &tuple);

    b.special_form("Callable");
    b.special_form("Optional");
    b.special_form("Union");
    b.special_form("Type");
    b.special_form("ClassVar");
    b.special_form("Generic");
    b.special_form("Protocol");
    b.special_form("TypeVar");
    b.special_form("NamedTuple");
    let chain_map = b.special_form("ChainMap");
    chain_map.set_type_params(vec![
        Arc::new(TypeVarType::new("_KT")),
        Arc::new(TypeVarType::new("_VT")),
    ]);

    b.scope
}

fn lookup_class(scope: &Arc<Scope>, name: &str) -> ClassType {
    match scope.lookup_symbol(name).map(|s| s.effective_type()) {
        Some(Type::Class(class)) => class,
        _ => panic!("builtin class '{name}' missing from fixture"),
    }
}

/// A module scope chained onto a fresh builtins scope.
pub fn create_module_scope() -> Arc<Scope> {
    Scope::new(ScopeKind::Module, Some(create_builtins_scope()))
}

/// Convenience: an instance of the named builtin class.
pub fn builtin_object(scope: &Arc<Scope>, name: &str) -> Type {
    crate::scope::get_builtin_object(scope, name, None)
        .unwrap_or_else(|| panic!("builtin '{name}' missing from fixture"))
}

/// Registers a plain user class in `scope` and returns it.
pub fn define_class(scope: &Arc<Scope>, name: &str, source_id: u32, bases: &[&ClassType]) -> ClassType {
    let class = ClassType::new(name, ClassTypeFlags::empty(), source_id);
    for base in bases {
        class.add_base_class(Type::Class((*base).clone()), true);
    }
    scope.add_symbol(
        Name::new(name),
        Symbol::new(DeclarationCategory::Class, Type::Class(class.clone())),
    );
    class
}
