//! Test utilities: compile helpers and small declaration builders.

use crate::ast::{
    ArgDecl, BinaryOp, Decl, DistributionDecl, Expr, FunctionDecl, ParamDecl, Stmt, TypeExpr,
    UnaryOp,
};
use crate::{CompileOptions, CompileResult, Compiler};

/// Compile `decls` into a fresh compiler, returning it on success.
pub fn compile(decls: Vec<Decl>) -> CompileResult<Compiler> {
    let mut compiler = Compiler::new(CompileOptions::new());
    compiler.compile_decls(&decls)?;
    Ok(compiler)
}

/// Compile `decls`, panicking with the rendered errors on failure.
pub fn compile_ok(decls: Vec<Decl>) -> Compiler {
    match compile(decls) {
        Ok(compiler) => compiler,
        Err(errors) => panic!("expected success, got:\n{}", errors.printer().render()),
    }
}

/// Compile `decls` into `compiler` and render the errors, one per line.
pub fn errors_in(compiler: &mut Compiler, decls: Vec<Decl>) -> String {
    match compiler.compile_decls(&decls) {
        Ok(()) => panic!("expected errors"),
        Err(errors) => errors
            .kinds()
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\n"),
    }
}

/// Compile `decls` into a fresh compiler and render the errors, one per line.
pub fn errors(decls: Vec<Decl>) -> String {
    errors_in(&mut Compiler::new(CompileOptions::new()), decls)
}

/// Textual IR of the function named `symbol`.
pub fn dump(compiler: &Compiler, symbol: &str) -> String {
    let function = compiler
        .module()
        .function(symbol)
        .unwrap_or_else(|| panic!("no function `{symbol}` in module"));
    let mut out = String::new();
    glint_ir::dump::dump_function(&mut out, function);
    out
}

pub fn ty(dotted: &str) -> TypeExpr {
    TypeExpr::named(dotted)
}

pub fn arg(name: &str, dotted: &str) -> ArgDecl {
    ArgDecl::new(name, ty(dotted))
}

pub fn out(name: &str, dotted: &str) -> ArgDecl {
    ArgDecl::out(name, ty(dotted))
}

pub fn param(name: &str, dotted: &str) -> ParamDecl {
    ParamDecl::new(name, ty(dotted))
}

pub fn function(name: &str, args: Vec<ArgDecl>, ret: &str, body: Vec<Stmt>) -> Decl {
    FunctionDecl::new(name, args, ty(ret), body).into()
}

/// `vec4 evaluate(vec3 P_in, vec3 w_in, vec3 P_out, vec3 w_out, out float pdf)`
pub fn evaluate(body: Vec<Stmt>) -> Decl {
    function(
        "evaluate",
        vec![
            arg("P_in", "vec3"),
            arg("w_in", "vec3"),
            arg("P_out", "vec3"),
            arg("w_out", "vec3"),
            out("pdf", "float"),
        ],
        "vec4",
        body,
    )
}

/// `float sample(vec3 P_out, vec3 w_out, vec2 rand_P, vec2 rand_w, out vec3 P_in, out vec3 w_in)`
pub fn sample(body: Vec<Stmt>) -> Decl {
    function(
        "sample",
        vec![
            arg("P_out", "vec3"),
            arg("w_out", "vec3"),
            arg("rand_P", "vec2"),
            arg("rand_w", "vec2"),
            out("P_in", "vec3"),
            out("w_in", "vec3"),
        ],
        "float",
        body,
    )
}

/// A distribution whose `evaluate` returns `vec4(tint * sigma, 1)` and writes
/// `sigma` to the pdf, and whose `sample` mirrors the outgoing direction.
pub fn lambert() -> Decl {
    let lane = |name: &str| Expr::path("c").field(name);
    DistributionDecl::new(
        "lambert",
        vec![param("sigma", "float"), param("tint", "vec3")],
        vec![
            evaluate(vec![
                Stmt::assign(Expr::path("pdf"), Expr::path("sigma")),
                Stmt::let_(
                    "c",
                    None,
                    Some(Expr::binary(
                        BinaryOp::Mul,
                        Expr::path("tint"),
                        Expr::path("sigma"),
                    )),
                ),
                Stmt::ret(Expr::call(
                    "vec4",
                    vec![lane("x"), lane("y"), lane("z"), Expr::float(1.0)],
                )),
            ]),
            sample(vec![
                Stmt::assign(Expr::path("P_in"), Expr::path("P_out")),
                Stmt::assign(
                    Expr::path("w_in"),
                    Expr::unary(UnaryOp::Neg, Expr::path("w_out")),
                ),
                Stmt::ret(Expr::path("sigma")),
            ]),
        ],
    )
    .into()
}
