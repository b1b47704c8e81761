use crate::ast::{BinaryOp, Expr, GlobalDecl, ModuleDecl, Stmt, TypeAliasDecl, TypeExpr, UnaryOp};
use crate::diagnostics::Diagnostics;
use crate::test_utils::{arg, compile_ok, dump, errors, function, ty};
use crate::{CompileOptions, Compiler};

fn render(errors: &Diagnostics) -> String {
    errors
        .kinds()
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

fn typed(expr: Expr) -> String {
    let mut compiler = Compiler::new(CompileOptions::new());
    match compiler.typecheck(&expr) {
        Ok(ty) => compiler.types().name(ty).to_owned(),
        Err(errors) => render(&errors),
    }
}

fn folded(expr: Expr) -> String {
    let mut compiler = Compiler::new(CompileOptions::new());
    match compiler.const_eval(&expr) {
        Ok((value, ty)) => format!("{value}: {}", compiler.types().name(ty)),
        Err(errors) => render(&errors),
    }
}

fn vec3(lanes: [f32; 3]) -> Expr {
    Expr::call("vec3", lanes.into_iter().map(Expr::float).collect())
}

fn global(name: &str, value: Expr) -> crate::ast::Decl {
    GlobalDecl::new(name, None, value).into()
}

#[test]
fn arithmetic_widens_operands() {
    insta::assert_snapshot!(typed(Expr::binary(BinaryOp::Add, Expr::int(1), Expr::float(2.0))), @"float");
    insta::assert_snapshot!(typed(Expr::binary(BinaryOp::Mul, vec3([1.0; 3]), Expr::float(2.0))), @"vec3");
    insta::assert_snapshot!(typed(Expr::binary(BinaryOp::Lt, Expr::int(1), Expr::int(2))), @"bool");
}

#[test]
fn both_operands_report_errors() {
    let expr = Expr::binary(BinaryOp::Add, Expr::path("missing"), Expr::path("other"));
    insta::assert_snapshot!(typed(expr), @r"
    unknown variable `missing`
    unknown variable `other`
    ");
}

#[test]
fn operators_without_overload() {
    let mixed = Expr::binary(
        BinaryOp::Add,
        Expr::call("vec2", vec![Expr::float(1.0)]),
        vec3([1.0; 3]),
    );
    insta::assert_snapshot!(typed(mixed), @"no operator `+` for `vec2` and `vec3`");
    insta::assert_snapshot!(
        typed(Expr::unary(UnaryOp::Not, Expr::float(1.0))),
        @"no operator `!` for `float`"
    );
}

#[test]
fn vector_fields_and_swizzles() {
    insta::assert_snapshot!(typed(vec3([1.0, 2.0, 3.0]).field("x")), @"float");
    insta::assert_snapshot!(typed(vec3([1.0, 2.0, 3.0]).field("zy")), @"vec2");
    insta::assert_snapshot!(typed(vec3([1.0, 2.0, 3.0]).field("w")), @"type `vec3` has no field `w`");
}

#[test]
fn indexing() {
    let array = || {
        Expr::construct(
            TypeExpr::array(ty("float"), 3),
            vec![Expr::float(1.0), Expr::float(2.0), Expr::float(3.0)],
        )
    };
    insta::assert_snapshot!(typed(array().index(Expr::int(1))), @"float");
    insta::assert_snapshot!(typed(array().index(Expr::float(1.0))), @"index must be `int`, found `float`");
    insta::assert_snapshot!(typed(Expr::float(2.0).index(Expr::int(0))), @"type `float` cannot be indexed");
}

#[test]
fn construction_checks_arguments() {
    let short = Expr::call("vec3", vec![Expr::float(1.0), Expr::float(2.0)]);
    insta::assert_snapshot!(typed(short), @"`vec3` expects 3 arguments, found 2");
}

#[test]
fn unknown_functions() {
    let call = Expr::call("nope", vec![Expr::float(1.0), Expr::int(2)]);
    insta::assert_snapshot!(typed(call), @"no function `nope` accepts (float, int)");
}

#[test]
fn constant_folding() {
    let int = Expr::binary(
        BinaryOp::Add,
        Expr::binary(BinaryOp::Mul, Expr::int(2), Expr::int(3)),
        Expr::int(1),
    );
    insta::assert_snapshot!(folded(int), @"7: int");
    insta::assert_snapshot!(folded(Expr::binary(BinaryOp::Add, Expr::int(1), Expr::float(0.5))), @"1.5: float");
    insta::assert_snapshot!(folded(Expr::unary(UnaryOp::Neg, Expr::float(1.5))), @"-1.5: float");
    insta::assert_snapshot!(
        folded(Expr::binary(BinaryOp::Mul, vec3([1.0, 2.0, 3.0]), Expr::float(2.0))),
        @"<2.0, 4.0, 6.0>: vec3"
    );
    insta::assert_snapshot!(
        folded(Expr::binary(BinaryOp::Ge, Expr::float(1.0), Expr::int(1))),
        @"true: bool"
    );
}

#[test]
fn folding_rejects_runtime_values() {
    insta::assert_snapshot!(
        folded(Expr::binary(BinaryOp::Div, Expr::int(1), Expr::int(0))),
        @"expression is not a compile-time constant"
    );
    insta::assert_snapshot!(
        folded(Expr::call("nope", vec![])),
        @"expression is not a compile-time constant"
    );
    insta::assert_snapshot!(
        folded(vec3([1.0; 3]).field("x")),
        @"expression is not a compile-time constant"
    );
}

#[test]
fn globals_fold_through_earlier_globals() {
    let compiler = compile_ok(vec![
        global("k", Expr::float(2.0)),
        global("k2", Expr::binary(BinaryOp::Mul, Expr::path("k"), Expr::float(3.0))),
        GlobalDecl::new("n", Some(ty("float")), Expr::int(1)).into(),
    ]);

    let init = |name: &str| {
        let global = compiler.module().global(name).unwrap();
        format!("{}: {}", global.init.as_ref().unwrap(), global.ty)
    };
    insta::assert_snapshot!(init("global.k2"), @"6.0: f32");
    insta::assert_snapshot!(init("global.n"), @"1.0: f32");
    assert_eq!(
        compiler.exports().root().variables["k2"].ty,
        "float"
    );
}

#[test]
fn globals_must_be_constant() {
    insta::assert_snapshot!(
        errors(vec![global("x", Expr::call("nope", vec![Expr::float(1.0)]))]),
        @"expression is not a compile-time constant"
    );
}

#[test]
fn functions_read_globals_through_their_address() {
    let compiler = compile_ok(vec![
        global("k", Expr::float(2.0)),
        function("f", vec![], "float", vec![Stmt::ret(Expr::path("k"))]),
    ]);

    insta::assert_snapshot!(dump(&compiler, "global.f()"), @r"
    fn external @global.f()() -> f32 {
      %0 = global @global.k
      %1 = load f32, %0
      ret %1
    }
    ");
}

#[test]
fn qualified_names_resolve_through_modules() {
    let module = ModuleDecl::new(
        "m",
        vec![
            global("tau", Expr::float(6.25)),
            function("half", vec![arg("x", "float")], "float", vec![Stmt::ret(Expr::binary(
                BinaryOp::Div,
                Expr::path("x"),
                Expr::float(2.0),
            ))]),
        ],
    );
    let caller = function(
        "f",
        vec![],
        "float",
        vec![Stmt::ret(Expr::call("m.half", vec![Expr::path("m.tau")]))],
    );
    let compiler = compile_ok(vec![module.into(), caller]);

    let body = dump(&compiler, "global.f()");
    assert!(body.contains("global @global.m.tau"), "{body}");
    assert!(body.contains("call @global.m.half(float)"), "{body}");
}

#[test]
fn type_aliases_name_existing_types() {
    let compiler = compile_ok(vec![
        TypeAliasDecl::new("color", ty("vec3")).into(),
        function("f", vec![arg("c", "color")], "color", vec![Stmt::ret(Expr::path("c"))]),
    ]);
    assert!(compiler.module().function("global.f(vec3)").is_some());
}

#[test]
fn assignment_targets_must_be_places() {
    let f = function(
        "f",
        vec![],
        "void",
        vec![Stmt::assign(Expr::float(1.0), Expr::float(2.0))],
    );
    insta::assert_snapshot!(errors(vec![f]), @"expression cannot be assigned to");
}

#[test]
fn swizzles_cannot_be_assigned() {
    let f = function(
        "f",
        vec![arg("v", "vec3")],
        "void",
        vec![Stmt::assign(Expr::path("v").field("xy"), Expr::call("vec2", vec![Expr::float(0.0)]))],
    );
    insta::assert_snapshot!(errors(vec![f]), @"expression cannot be assigned to");
}

#[test]
fn lanes_can_be_assigned() {
    let f = function(
        "f",
        vec![arg("v", "vec3")],
        "float",
        vec![
            Stmt::assign(Expr::path("v").field("y"), Expr::int(4)),
            Stmt::ret(Expr::path("v").field("y")),
        ],
    );
    let compiler = compile_ok(vec![f]);
    insta::assert_snapshot!(dump(&compiler, "global.f(vec3)"), @r"
    fn external @global.f(vec3)(%0: vec3) -> f32 {
      %1 = alloca vec3
      store vec3 %0, %1
      %2 = const 4
      %3 = member vec3, %1, 1
      %4 = sitofp %2
      store f32 %4, %3
      %5 = load vec3, %1
      %6 = extract %5, 1
      ret %6
    }
    ");
}
