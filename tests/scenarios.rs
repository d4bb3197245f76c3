//! End-to-end scenarios: hand-built parse trees evaluated against the
//! builtins fixture, checking both result types and emitted diagnostics.

use std::sync::Arc;

use dunlin_python_semantic::ast::{AstFactory, ExpressionNode, TextRange};
use dunlin_python_semantic::name::Name;
use dunlin_python_semantic::program::{DiagnosticLevel, ProgramSettings};
use dunlin_python_semantic::scope::{DeclarationCategory, Scope, Symbol};
use dunlin_python_semantic::testing::{
    builtin_object, create_module_scope, define_class, USER_SOURCE_ID_BASE,
};
use dunlin_python_semantic::types::{
    can_assign_type, combine_types, ClassType, ClassTypeFlags, FunctionParameter, FunctionType,
    FunctionTypeFlags, NodeTypeCache, Type, TypeCheckDiagnostics, TypeEvaluator,
};

fn r(start: u32, end: u32) -> TextRange {
    TextRange::new(start, end)
}

fn evaluate(
    scope: &Arc<Scope>,
    settings: &ProgramSettings,
    node: &ExpressionNode,
) -> (Type, TypeCheckDiagnostics) {
    let cache = NodeTypeCache::new();
    let evaluator = TypeEvaluator::new(scope.clone(), settings, &cache);
    let ty = evaluator.get_type(node);
    (ty, evaluator.finish())
}

fn messages(diagnostics: &TypeCheckDiagnostics) -> Vec<&str> {
    diagnostics
        .iter()
        .map(|diagnostic| diagnostic.message.as_str())
        .collect()
}

/// `x: int = "hello"` reports the mismatch on the right-hand side's range.
#[test]
fn annotated_assignment_mismatch() {
    let scope = create_module_scope();
    let settings = ProgramSettings::default();
    let factory = AstFactory::new();

    let annotation = factory.type_annotation(
        r(0, 6),
        factory.name(r(0, 1), "x"),
        factory.name(r(3, 6), "int"),
    );
    let rhs = factory.string(r(9, 16), "hello");
    let assignment = factory.assignment(r(0, 16), annotation, rhs);

    let (ty, diagnostics) = evaluate(&scope, &settings, &assignment);
    assert!(ty.is_same(&builtin_object(&scope, "int")));
    let [diagnostic] = &diagnostics[..] else {
        panic!("expected exactly one diagnostic, got {diagnostics:?}");
    };
    assert_eq!(
        diagnostic.message,
        "Argument of type 'str' cannot be assigned to parameter of type 'int'"
    );
    assert_eq!(diagnostic.range, r(9, 16));
}

/// `def f(a, b=1, *c, d, **e): ...` accepts `f(1, 2, 3, 4, d=5, e=6)` and
/// produces the declared return type.
#[test]
fn full_parameter_matrix_call() {
    let scope = create_module_scope();
    let settings = ProgramSettings::default();
    let factory = AstFactory::new();

    let int_ty = builtin_object(&scope, "int");
    let str_ty = builtin_object(&scope, "str");
    let mut f = FunctionType::new(FunctionTypeFlags::empty());
    f.add_parameter(FunctionParameter::simple("a", int_ty.clone()));
    f.add_parameter(FunctionParameter::with_default(
        "b",
        int_ty.clone(),
        int_ty.clone(),
    ));
    f.add_parameter(FunctionParameter::var_arg_list(
        Some(Name::new("c")),
        int_ty.clone(),
    ));
    f.add_parameter(FunctionParameter::simple("d", int_ty.clone()));
    f.add_parameter(FunctionParameter::var_arg_dictionary("e", int_ty.clone()));
    f.set_declared_return_type(Some(str_ty.clone()));
    scope.add_symbol(
        Name::new("f"),
        Symbol::new(DeclarationCategory::Function, Type::function(f)),
    );

    let call = factory.call(
        r(0, 24),
        factory.name(r(0, 1), "f"),
        vec![
            factory.positional_arg(factory.integer(r(2, 3), 1)),
            factory.positional_arg(factory.integer(r(5, 6), 2)),
            factory.positional_arg(factory.integer(r(8, 9), 3)),
            factory.positional_arg(factory.integer(r(11, 12), 4)),
            factory.keyword_arg("d", factory.integer(r(16, 17), 5)),
            factory.keyword_arg("e", factory.integer(r(21, 22), 6)),
        ],
    );

    let (ty, diagnostics) = evaluate(&scope, &settings, &call);
    assert_eq!(messages(&diagnostics), Vec::<&str>::new());
    assert!(ty.is_same(&str_ty));
}

/// `def g(a): ...; g()` reports the missing argument on the call node.
#[test]
fn missing_argument_on_call_node() {
    let scope = create_module_scope();
    let settings = ProgramSettings::default();
    let factory = AstFactory::new();

    let mut g = FunctionType::new(FunctionTypeFlags::empty());
    g.add_parameter(FunctionParameter::simple("a", Type::Unknown));
    scope.add_symbol(
        Name::new("g"),
        Symbol::new(DeclarationCategory::Function, Type::function(g)),
    );

    let call = factory.call(r(0, 3), factory.name(r(0, 1), "g"), vec![]);
    let (ty, diagnostics) = evaluate(&scope, &settings, &call);
    assert!(ty.is_unknown());
    let [diagnostic] = &diagnostics[..] else {
        panic!("expected exactly one diagnostic");
    };
    assert_eq!(diagnostic.message, "Argument missing for parameter 'a'");
    assert_eq!(diagnostic.range, r(0, 3));
}

/// `class C: pass; class D(C): pass; x: C = D()` is accepted.
#[test]
fn subclass_instance_assignment() {
    let scope = create_module_scope();
    let settings = ProgramSettings::default();
    let factory = AstFactory::new();

    let c = define_class(&scope, "C", USER_SOURCE_ID_BASE, &[]);
    let d = define_class(&scope, "D", USER_SOURCE_ID_BASE + 1, &[&c]);
    assert!(can_assign_type(
        &Type::object(c.clone()),
        &Type::object(d),
        None
    ));

    let assignment = factory.assignment(
        r(0, 12),
        factory.type_annotation(
            r(0, 4),
            factory.name(r(0, 1), "x"),
            factory.name(r(3, 4), "C"),
        ),
        factory.call(r(7, 12), factory.name(r(7, 8), "D"), vec![]),
    );

    let (ty, diagnostics) = evaluate(&scope, &settings, &assignment);
    assert_eq!(messages(&diagnostics), Vec::<&str>::new());
    assert!(ty.is_same(&Type::object(c)));
}

/// `x: Optional[int] = None; x.bit_length()` emits the configurable
/// optional-member-access diagnostic and still resolves to `int`.
#[test]
fn optional_member_access() {
    let scope = create_module_scope();
    let settings = ProgramSettings {
        report_optional_member_access: DiagnosticLevel::Error,
        ..ProgramSettings::default()
    };
    let factory = AstFactory::new();

    // The annotation side: Optional[int] evaluates to `int | None`.
    let optional_annotation = factory.index(
        r(3, 16),
        factory.name(r(3, 11), "Optional"),
        vec![factory.name(r(12, 15), "int")],
    );
    let (annotation_ty, diagnostics) = evaluate(&scope, &settings, &optional_annotation);
    assert_eq!(messages(&diagnostics), Vec::<&str>::new());
    let int_ty = builtin_object(&scope, "int");
    let Type::Union(union) = &annotation_ty else {
        panic!("expected Optional[int] to evaluate to a union");
    };
    assert!(union.contains(&Type::None));
    assert!(union.contains(&int_ty));

    scope.add_symbol(
        Name::new("x"),
        Symbol::new(
            DeclarationCategory::Variable,
            combine_types([int_ty.clone(), Type::None]),
        ),
    );

    let call = factory.call(
        r(20, 35),
        factory.member_access(r(20, 32), factory.name(r(20, 21), "x"), "bit_length"),
        vec![],
    );
    let (ty, diagnostics) = evaluate(&scope, &settings, &call);
    assert_eq!(
        messages(&diagnostics),
        vec!["'bit_length' is not a known member of 'None'"]
    );
    assert!(ty.is_same(&int_ty));
}

/// Dataclass synthesis: a default-less field after a defaulted one is an
/// error; the surviving fields drive the synthesized constructor.
#[test]
fn dataclass_field_ordering() {
    let scope = create_module_scope();
    let settings = ProgramSettings::default();
    let factory = AstFactory::new();

    let class = ClassType::new("P", ClassTypeFlags::DATA_CLASS, USER_SOURCE_ID_BASE);
    let suite = vec![
        factory.type_annotation(
            r(0, 6),
            factory.name(r(0, 1), "x"),
            factory.name(r(3, 6), "int"),
        ),
        factory.assignment(
            r(8, 18),
            factory.type_annotation(
                r(8, 14),
                factory.name(r(8, 9), "y"),
                factory.name(r(11, 14), "int"),
            ),
            factory.integer(r(17, 18), 0),
        ),
        factory.type_annotation(
            r(20, 26),
            factory.name(r(20, 21), "z"),
            factory.name(r(23, 26), "int"),
        ),
    ];

    let cache = NodeTypeCache::new();
    let evaluator = TypeEvaluator::new(scope.clone(), &settings, &cache);
    evaluator.synthesize_dataclass_methods(&class, &suite);
    let diagnostics = evaluator.finish();

    let [diagnostic] = &diagnostics[..] else {
        panic!("expected exactly one diagnostic");
    };
    assert_eq!(
        diagnostic.message,
        "Data fields without default value cannot appear after data fields with default values"
    );
    assert_eq!(diagnostic.range, r(20, 26));

    // The synthesized __init__ carries self, x, and y (z was rejected).
    let init = class.class_field("__init__").unwrap().effective_type();
    let Type::Function(init) = init else {
        panic!("expected a synthesized __init__");
    };
    let names: Vec<_> = init
        .parameters()
        .iter()
        .map(|p| p.name.as_ref().unwrap().as_str().to_string())
        .collect();
    assert_eq!(names, vec!["self", "x", "y"]);
    assert!(!init.parameters()[1].has_default);
    assert!(init.parameters()[2].has_default);

    // Constructing P(1) then matches the synthesized signature.
    scope.add_symbol(
        Name::new("P"),
        Symbol::new(DeclarationCategory::Class, Type::Class(class.clone())),
    );
    let call = factory.call(
        r(30, 34),
        factory.name(r(30, 31), "P"),
        vec![factory.positional_arg(factory.integer(r(32, 33), 1))],
    );
    let (ty, diagnostics) = evaluate(&scope, &settings, &call);
    assert_eq!(messages(&diagnostics), Vec::<&str>::new());
    assert!(ty.is_same(&Type::object(class)));
}
