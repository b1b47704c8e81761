//! Glint compiler core.
//!
//! This crate turns the declaration tree produced by the Glint parser into a
//! `glint_ir::Module`:
//! - `types` - type registry and per-type behavior (casts, layout, construction, access)
//! - `scope` - nested symbol tables for variables, functions, types and modules
//! - `expr` - expression type checking, code generation and operator tables
//! - `codegen` - declarations, statements and the distribution compiler
//! - `exports` - the host-visible symbol directory
//! - `diagnostics` - error collection and rendering

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod ast;
pub mod codegen;
pub mod diagnostics;
pub mod exports;
pub mod expr;
pub mod options;
pub mod scope;
pub mod types;

#[cfg(test)]
mod test_utils;

pub use codegen::{CompileOutput, Compiler};
pub use diagnostics::{CompileError, CompileResult, Diagnostics, DiagnosticsPrinter, ErrorKind, Span};
pub use exports::{ExportKind, ExportTable};
pub use options::CompileOptions;
pub use types::{TypeRef, TypeTable, TypedValue};

/// Errors that end a compilation.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// The module has no scene-context global to hand to distribution constructors.
    #[error("scene context global `{0}` is not declared as a pointer in the module")]
    MissingSceneContext(String),

    #[error("compilation failed with {} errors", .0.len())]
    Compile(Diagnostics),

    #[error("generated module is invalid: {0}")]
    Module(#[from] glint_ir::ModuleError),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Compile a whole program into a fresh module.
pub fn compile_program(decls: &[ast::Decl], options: CompileOptions) -> Result<CompileOutput> {
    let mut compiler = Compiler::new(options);
    compiler.compile(decls)?;
    compiler.finish()
}
