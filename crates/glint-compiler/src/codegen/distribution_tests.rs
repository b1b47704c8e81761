use glint_ir::IrType;
use glint_ir::abi::SCENE_GLOBAL;
use glint_vm::{DistributionHandle, VM, Value};

use crate::ast::{
    Decl, DistributionDecl, Expr, FunctionDecl, FunctionKind, ModuleDecl, ParamDecl, Stmt,
};
use crate::exports::ExportKind;
use crate::test_utils::{
    arg, compile_ok, dump, errors, errors_in, evaluate, function, lambert, out, param, sample, ty,
};
use crate::types::{TYPE_DFUNC, TYPE_FLOAT, TYPE_VEC3};
use crate::{CompileOptions, Compiler};

fn constant_evaluate() -> Decl {
    evaluate(vec![
        Stmt::assign(Expr::path("pdf"), Expr::float(1.0)),
        Stmt::ret(Expr::call("vec4", vec![Expr::path("weight")])),
    ])
}

fn constant_sample() -> Decl {
    sample(vec![Stmt::ret(Expr::path("weight"))])
}

fn constant_sample_without_params() -> Decl {
    sample(vec![Stmt::ret(Expr::float(1.0))])
}

fn weighted(name: &str, extra: Vec<ParamDecl>) -> Decl {
    let mut params = extra;
    params.push(param("weight", "float"));
    DistributionDecl::new(name, params, vec![constant_evaluate(), constant_sample()]).into()
}

#[test]
fn missing_evaluate() {
    let decl = DistributionDecl::new("d", vec![], vec![constant_sample_without_params()]);
    insta::assert_snapshot!(errors(vec![decl.into()]), @"distribution is missing entry point `evaluate`");
}

#[test]
fn missing_sample() {
    let body = vec![evaluate(vec![
        Stmt::assign(Expr::path("pdf"), Expr::float(1.0)),
        Stmt::ret(Expr::call("vec4", vec![Expr::float(1.0)])),
    ])];
    let decl = DistributionDecl::new("d", vec![], body);
    insta::assert_snapshot!(errors(vec![decl.into()]), @"distribution is missing entry point `sample`");
}

#[test]
fn missing_both_entry_points_reports_both() {
    let decl = DistributionDecl::new("d", vec![param("weight", "float")], vec![]);
    insta::assert_snapshot!(errors(vec![decl.into()]), @r"
    distribution is missing entry point `evaluate`
    distribution is missing entry point `sample`
    ");
}

#[test]
fn entry_point_outputs_must_be_out() {
    let by_value = function(
        "evaluate",
        vec![
            arg("P_in", "vec3"),
            arg("w_in", "vec3"),
            arg("P_out", "vec3"),
            arg("w_out", "vec3"),
            arg("pdf", "float"),
        ],
        "vec4",
        vec![Stmt::ret(Expr::call("vec4", vec![Expr::float(1.0)]))],
    );
    let decl = DistributionDecl::new("d", vec![], vec![by_value, constant_sample_without_params()]);

    let mut compiler = Compiler::new(CompileOptions::new());
    let before = compiler.module().function_count();
    insta::assert_snapshot!(
        errors_in(&mut compiler, vec![decl.into()]),
        @"entry point `evaluate` argument `pdf` must be `out`"
    );
    assert_eq!(compiler.module().function_count(), before);
}

#[test]
fn entry_point_inputs_must_not_be_out() {
    let out_input = function(
        "sample",
        vec![
            out("P_out", "vec3"),
            arg("w_out", "vec3"),
            arg("rand_P", "vec2"),
            arg("rand_w", "vec2"),
            out("P_in", "vec3"),
            out("w_in", "vec3"),
        ],
        "float",
        vec![Stmt::ret(Expr::float(1.0))],
    );
    let eval = evaluate(vec![
        Stmt::assign(Expr::path("pdf"), Expr::float(1.0)),
        Stmt::ret(Expr::call("vec4", vec![Expr::float(1.0)])),
    ]);
    let decl = DistributionDecl::new("d", vec![], vec![eval, out_input]);

    insta::assert_snapshot!(
        errors(vec![decl.into()]),
        @"entry point `sample` argument `P_out` must not be `out`"
    );
}

#[test]
fn entry_point_return_type_is_checked() {
    let eval = function(
        "evaluate",
        vec![
            arg("P_in", "vec3"),
            arg("w_in", "vec3"),
            arg("P_out", "vec3"),
            arg("w_out", "vec3"),
            out("pdf", "float"),
        ],
        "float",
        vec![Stmt::ret(Expr::float(1.0))],
    );
    let decl = DistributionDecl::new("d", vec![], vec![eval, constant_sample_without_params()]);

    insta::assert_snapshot!(
        errors(vec![decl.into()]),
        @"entry point `evaluate` must return `vec4`, found `float`"
    );
}

#[test]
fn unknown_parameter_types_are_all_reported() {
    let decl = DistributionDecl::new(
        "d",
        vec![param("a", "colour"), param("b", "float"), param("c", "spectrum")],
        vec![],
    );
    insta::assert_snapshot!(errors(vec![decl.into()]), @r"
    unknown type `colour`
    unknown type `spectrum`
    ");
}

#[test]
fn body_errors_abort_and_leave_no_trace() {
    let broken = evaluate(vec![Stmt::ret(Expr::path("missing"))]);
    let decl = DistributionDecl::new(
        "d",
        vec![param("weight", "float")],
        vec![broken, constant_sample()],
    );

    let mut compiler = Compiler::new(CompileOptions::new());
    let before = compiler.module().function_count();
    insta::assert_snapshot!(errors_in(&mut compiler, vec![decl.into()]), @"unknown variable `missing`");

    assert_eq!(compiler.module().function_count(), before);
    assert_eq!(compiler.scopes().depth(), 1);
    assert!(compiler.scopes().function_candidates("d").is_empty());
    assert!(compiler.scopes().function_candidates("evaluate").is_empty());
    assert!(compiler.exports().functions(ExportKind::Internal).is_empty());
    assert!(compiler.types().nameless().is_empty());
}

#[test]
fn failed_outer_distribution_drops_nested_ones() {
    let broken = evaluate(vec![Stmt::ret(Expr::path("missing"))]);
    let decl = DistributionDecl::new(
        "outer",
        vec![param("weight", "float")],
        vec![lambert(), broken, constant_sample()],
    );

    let mut compiler = Compiler::new(CompileOptions::new());
    let before = compiler.module().function_count();
    insta::assert_snapshot!(errors_in(&mut compiler, vec![decl.into()]), @"unknown variable `missing`");

    assert_eq!(compiler.module().function_count(), before);
    assert!(compiler.module().function("global.outer.lambert.eval").is_none());
    assert!(compiler.exports().functions(ExportKind::Internal).is_empty());
    assert!(compiler.types().nameless().is_empty());

    // the same name compiles cleanly afterwards
    compiler.compile_decls(&[weighted("outer", vec![])]).unwrap();
    assert_eq!(compiler.types().nameless().len(), 1);
    assert!(compiler.module().function("global.outer.eval").is_some());
}

#[test]
fn parameter_block_layout() {
    let compiler = compile_ok(vec![lambert()]);

    let [block] = compiler.types().nameless() else {
        panic!("expected one parameter block type");
    };
    assert_eq!(
        compiler.types().ir_type(*block),
        IrType::Struct(vec![IrType::F32, IrType::Vector(3)])
    );
    let block = compiler.types().get(*block);
    assert_eq!(block.name(), "lambert_params_t");
    assert_eq!(block.type_id(), "global.lambert_params_t(float,vec3)");
}

#[test]
fn constructor_is_registered_in_enclosing_scope() {
    let compiler = compile_ok(vec![lambert()]);

    let candidates = compiler.scopes().function_candidates("lambert");
    let [ctor] = candidates[..] else {
        panic!("expected one constructor");
    };
    assert_eq!(ctor.symbol, "global.lambert(float,vec3)");
    assert_eq!(ctor.return_type, TYPE_DFUNC);
    assert_eq!(ctor.argument_types(), [TYPE_FLOAT, TYPE_VEC3]);
    assert!(!ctor.takes_context());

    // entry points stay private to the distribution
    assert!(compiler.scopes().function_candidates("evaluate").is_empty());

    let exported: Vec<_> = compiler
        .exports()
        .functions(ExportKind::Internal)
        .iter()
        .map(|f| f.full_name.as_str())
        .collect();
    assert_eq!(exported, ["global.lambert"]);
}

#[test]
fn generated_functions() {
    let compiler = compile_ok(vec![lambert()]);

    let mut names: Vec<_> = compiler.module().functions().map(|f| f.name.as_str()).collect();
    names.sort_unstable();
    insta::assert_snapshot!(names.join("\n"), @r"
    global.lambert(float,vec3)
    global.lambert.dtor
    global.lambert.eval
    global.lambert.evaluate(vec3,vec3,vec3,vec3,float)
    global.lambert.sample
    global.lambert.sample(vec3,vec3,vec2,vec2,vec3,vec3)
    ");
}

#[test]
fn evaluator_wrapper() {
    let compiler = compile_ok(vec![lambert()]);
    insta::assert_snapshot!(dump(&compiler, "global.lambert.eval"), @r"
    fn internal @global.lambert.eval(%0: ptr, %1: ptr, %2: ptr, %3: ptr, %4: ptr, %5: ptr, %6: ptr) -> void {
      %7 = load vec3, %1
      %8 = load vec3, %2
      %9 = load vec3, %3
      %10 = load vec3, %4
      %11 = call @global.lambert.evaluate(vec3,vec3,vec3,vec3,float)(%0, %7, %8, %9, %10, %5)
      store vec4 %11, %6
      ret
    }
    ");
}

#[test]
fn sampler_wrapper() {
    let compiler = compile_ok(vec![lambert()]);
    insta::assert_snapshot!(dump(&compiler, "global.lambert.sample"), @r"
    fn internal @global.lambert.sample(%0: ptr, %1: ptr, %2: ptr, %3: ptr, %4: ptr, %5: ptr, %6: ptr) -> f32 {
      %7 = load vec3, %1
      %8 = load vec3, %2
      %9 = load vec2, %3
      %10 = load vec2, %4
      %11 = call @global.lambert.sample(vec3,vec3,vec2,vec2,vec3,vec3)(%0, %7, %8, %9, %10, %5, %6)
      ret %11
    }
    ");
}

#[test]
fn destructor_without_resources_only_returns() {
    let compiler = compile_ok(vec![lambert()]);
    insta::assert_snapshot!(dump(&compiler, "global.lambert.dtor"), @r"
    fn internal @global.lambert.dtor(%0: ptr) -> void {
      ret
    }
    ");
}

#[test]
fn destructor_releases_nested_distributions() {
    let compiler = compile_ok(vec![weighted("layered", vec![param("base", "dfunc")])]);
    insta::assert_snapshot!(dump(&compiler, "global.layered.dtor"), @r"
    fn internal @global.layered.dtor(%0: ptr) -> void {
      %1 = member {opaque(8, 8), f32}, %0, 0
      call @gd_builtin_destroy_dfunc(%1)
      ret
    }
    ");
}

#[test]
fn constructor_shape() {
    let compiler = compile_ok(vec![lambert()]);
    let ctor = compiler
        .module()
        .function("global.lambert(float,vec3)")
        .unwrap();

    assert_eq!(ctor.linkage, glint_ir::Linkage::External);
    assert_eq!(ctor.sig.params, [IrType::F32, IrType::Vector(3)]);
    assert_eq!(ctor.sig.ret, glint_ir::abi::dfunc_handle_type());
    assert!(compiler.module().extern_signature(glint_ir::abi::ALLOC_DFUNC).is_some());
}

#[test]
fn duplicate_distribution_is_rejected() {
    insta::assert_snapshot!(
        errors(vec![lambert(), lambert()]),
        @"function `global.lambert` is already defined in this scope"
    );
}

#[test]
fn distributions_cannot_be_overloaded() {
    insta::assert_snapshot!(
        errors(vec![weighted("d", vec![]), weighted("d", vec![param("tint", "vec3")])]),
        @"function `global.d` is already defined in this scope"
    );
}

fn inner_distribution(evaluate_body: Vec<Stmt>) -> Decl {
    DistributionDecl::new(
        "inner",
        vec![param("b", "vec3")],
        vec![evaluate(evaluate_body), constant_sample_without_params()],
    )
    .into()
}

fn outer_distribution(mut body: Vec<Decl>) -> Decl {
    body.extend([constant_evaluate(), constant_sample()]);
    DistributionDecl::new("outer", vec![param("weight", "float")], body).into()
}

#[test]
fn nested_distributions_read_their_own_parameters() {
    let lane = |name: &str| Expr::path("b").field(name);
    let inner = inner_distribution(vec![
        Stmt::assign(Expr::path("pdf"), lane("y")),
        Stmt::ret(Expr::call(
            "vec4",
            vec![lane("x"), lane("y"), lane("z"), Expr::float(1.0)],
        )),
    ]);
    let compiler = compile_ok(vec![outer_distribution(vec![inner])]);

    let mut nameless: Vec<_> = compiler
        .types()
        .nameless()
        .iter()
        .map(|&t| compiler.types().get(t).type_id().to_owned())
        .collect();
    nameless.sort_unstable();
    assert_eq!(
        nameless,
        ["global.outer.inner_params_t(vec3)", "global.outer_params_t(float)"]
    );

    let mut vm = vm_for(compiler);
    let handle = vm
        .call("global.outer.inner(vec3)", vec![Value::Vector(vec![7.0, 8.0, 9.0])])
        .unwrap();
    let handle = DistributionHandle::from_value(&handle).unwrap();
    let (color, pdf) = vm
        .evaluate(handle, [0.0; 3], [0.0; 3], [0.0; 3], [0.0; 3])
        .unwrap();
    assert_eq!(color, [7.0, 8.0, 9.0, 1.0]);
    assert_eq!(pdf, 8.0);
    vm.release(handle).unwrap();
}

#[test]
fn nested_distributions_cannot_read_enclosing_parameters() {
    let inner = inner_distribution(vec![
        Stmt::assign(Expr::path("pdf"), Expr::path("weight")),
        Stmt::ret(Expr::call("vec4", vec![Expr::float(1.0)])),
    ]);
    insta::assert_snapshot!(
        errors(vec![outer_distribution(vec![inner])]),
        @"`weight` belongs to an enclosing distribution"
    );
}

#[test]
fn nested_distributions_cannot_call_enclosing_helpers() {
    let helper = function("scale", vec![], "float", vec![Stmt::ret(Expr::path("weight"))]);
    let inner = inner_distribution(vec![
        Stmt::assign(Expr::path("pdf"), Expr::call("scale", vec![])),
        Stmt::ret(Expr::call("vec4", vec![Expr::float(1.0)])),
    ]);
    insta::assert_snapshot!(
        errors(vec![outer_distribution(vec![helper, inner])]),
        @"`global.outer.scale` belongs to an enclosing distribution"
    );
}

#[test]
fn distributions_nest_in_modules() {
    let module = ModuleDecl::new("shading", vec![lambert()]);
    let compiler = compile_ok(vec![module.into()]);

    assert!(compiler.module().function("global.shading.lambert.eval").is_some());
    let ctor = compiler
        .scopes()
        .current()
        .module("shading")
        .and_then(|m| m.functions().next())
        .unwrap();
    assert_eq!(ctor.symbol, "global.shading.lambert(float,vec3)");
}

fn vm_for(compiler: Compiler) -> VM {
    let output = compiler.finish().unwrap();
    let mut vm = VM::builder(output.module).build().unwrap();
    let scene = vm.alloc_value(&IrType::I32, &Value::I32(0)).unwrap();
    vm.map_global(SCENE_GLOBAL, Value::Ptr(scene)).unwrap();
    vm
}

#[test]
fn evaluate_through_runtime() {
    let mut vm = vm_for(compile_ok(vec![lambert()]));

    let handle = vm
        .call(
            "global.lambert(float,vec3)",
            vec![Value::F32(0.5), Value::Vector(vec![1.0, 0.0, 0.0])],
        )
        .unwrap();
    let handle = DistributionHandle::from_value(&handle).unwrap();
    assert_eq!(vm.live_distributions(), 1);

    let (color, pdf) = vm
        .evaluate(handle, [0.0; 3], [0.0, 0.0, 1.0], [0.0; 3], [0.0, 1.0, 0.0])
        .unwrap();
    assert_eq!(color, [0.5, 0.0, 0.0, 1.0]);
    assert_eq!(pdf, 0.5);

    let sample = vm
        .sample(handle, [1.0, 2.0, 3.0], [0.0, 0.0, 1.0], [0.25, 0.75], [0.5, 0.5])
        .unwrap();
    assert_eq!(sample.p_in, [1.0, 2.0, 3.0]);
    assert_eq!(sample.w_in, [0.0, 0.0, -1.0]);
    assert_eq!(sample.pdf, 0.5);

    vm.release(handle).unwrap();
    assert_eq!(vm.live_distributions(), 0);
}

#[test]
fn materials_construct_distributions() {
    let material = FunctionDecl::new(
        "matte",
        vec![],
        ty("dfunc"),
        vec![Stmt::ret(Expr::call(
            "lambert",
            vec![
                Expr::float(0.25),
                Expr::call("vec3", vec![Expr::int(0), Expr::int(1), Expr::int(0)]),
            ],
        ))],
    )
    .kind(FunctionKind::Material);
    let compiler = compile_ok(vec![lambert(), material.into()]);

    let materials: Vec<_> = compiler
        .exports()
        .functions(ExportKind::Material)
        .iter()
        .map(|f| f.symbol.clone())
        .collect();
    assert_eq!(materials, ["global.matte()"]);

    let mut vm = vm_for(compiler);
    let handle = vm.call("global.matte()", vec![]).unwrap();
    let handle = DistributionHandle::from_value(&handle).unwrap();
    let (color, pdf) = vm
        .evaluate(handle, [0.0; 3], [0.0; 3], [0.0; 3], [0.0; 3])
        .unwrap();
    assert_eq!(color, [0.0, 0.25, 0.0, 1.0]);
    assert_eq!(pdf, 0.25);

    vm.release(handle).unwrap();
    assert_eq!(vm.live_distributions(), 0);
}

#[test]
fn nested_distribution_parameters_are_released() {
    let compiler = compile_ok(vec![
        lambert(),
        weighted("layered", vec![param("base", "dfunc")]),
    ]);
    let mut vm = vm_for(compiler);

    let inner = vm
        .call(
            "global.lambert(float,vec3)",
            vec![Value::F32(1.0), Value::Vector(vec![1.0, 1.0, 1.0])],
        )
        .unwrap();
    let outer = vm
        .call("global.layered(dfunc,float)", vec![inner.clone(), Value::F32(0.5)])
        .unwrap();
    assert_eq!(vm.live_distributions(), 2);

    // the outer block holds its own reference to the inner distribution
    vm.release(DistributionHandle::from_value(&inner).unwrap()).unwrap();
    assert_eq!(vm.live_distributions(), 2);

    vm.release(DistributionHandle::from_value(&outer).unwrap()).unwrap();
    assert_eq!(vm.live_distributions(), 0);
}
