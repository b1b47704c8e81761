//! Declaration compiler.
//!
//! Lowers the declaration tree into a `glint_ir::Module`, one declaration at
//! a time in source order. All state of a compilation lives on [`Compiler`].
//!
//! # Module Organization
//!
//! - `function`: functions and statements
//! - `distribution`: the distribution protocol (parameter block, wrappers, constructor)
//! - `naming`: symbol names of generated functions

mod distribution;
mod function;
pub mod naming;

#[cfg(test)]
mod distribution_tests;

use std::collections::HashMap;

use glint_ir::{Const, IrType, Module};

use crate::ast::{Decl, GlobalDecl, ModuleDecl, TypeAliasDecl, TypeExpr};
use crate::diagnostics::{CompileResult, Diagnostics, ErrorKind};
use crate::exports::{ExportCheckpoint, ExportTable};
use crate::expr::operators::OperatorTable;
use crate::options::CompileOptions;
use crate::scope::{Frame, Scopes, Storage, VariableEntry};
use crate::types::{TypeCheckpoint, TypeRef, TypeTable};
use crate::{Error, Result};

pub use function::FunctionCx;

/// Global through which generated constructors reach the scene.
#[derive(Clone, Debug)]
pub(crate) struct SceneContext {
    pub global: String,
}

/// The distribution whose body is being compiled.
#[derive(Clone, Debug)]
pub(crate) struct DistributionContext {
    /// Layout of the parameter block behind the context pointer.
    pub block: IrType,
}

/// State to return to when a declaration fails after emitting or registering.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Checkpoint {
    module: glint_ir::Checkpoint,
    types: TypeCheckpoint,
    exports: ExportCheckpoint,
}

/// Everything a finished compilation hands to the host.
#[derive(Debug)]
pub struct CompileOutput {
    pub module: Module,
    pub exports: ExportTable,
    pub types: TypeTable,
}

pub struct Compiler {
    pub(crate) types: TypeTable,
    pub(crate) scopes: Scopes,
    pub(crate) exports: ExportTable,
    pub(crate) module: Module,
    pub(crate) operators: OperatorTable,
    pub(crate) options: CompileOptions,
    pub(crate) scene: SceneContext,
    /// Innermost distribution last.
    pub(crate) distributions: Vec<DistributionContext>,
    /// Values of module-level constants by global symbol.
    pub(crate) constants: HashMap<String, (Const, TypeRef)>,
}

impl Compiler {
    /// Create a compiler emitting into a fresh module that declares the scene global.
    pub fn new(options: CompileOptions) -> Self {
        let mut module = Module::new(&options.module_name);
        module.declare_global(&options.scene_global, IrType::Ptr);
        Self::with_module(module, options)
    }

    /// Create a compiler emitting into an existing module.
    ///
    /// The module must already declare the scene global as a pointer.
    pub fn from_module(module: Module, options: CompileOptions) -> Result<Self> {
        match module.global(&options.scene_global) {
            Some(global) if global.ty == IrType::Ptr => Ok(Self::with_module(module, options)),
            _ => Err(Error::MissingSceneContext(options.scene_global)),
        }
    }

    fn with_module(module: Module, options: CompileOptions) -> Self {
        Self {
            types: TypeTable::new(),
            scopes: Scopes::new(&options.root_scope),
            exports: ExportTable::new(&options.root_scope),
            module,
            operators: OperatorTable::builtin(),
            scene: SceneContext {
                global: options.scene_global.clone(),
            },
            options,
            distributions: Vec::new(),
            constants: HashMap::new(),
        }
    }

    pub fn types(&self) -> &TypeTable {
        &self.types
    }

    pub fn scopes(&self) -> &Scopes {
        &self.scopes
    }

    pub fn exports(&self) -> &ExportTable {
        &self.exports
    }

    pub fn module(&self) -> &Module {
        &self.module
    }

    /// Compile declarations into the module, reporting every error found.
    pub fn compile(&mut self, decls: &[Decl]) -> Result<()> {
        self.compile_decls(decls).map_err(Error::Compile)
    }

    /// Verify the module (unless disabled) and hand over the results.
    pub fn finish(self) -> Result<CompileOutput> {
        if self.options.verify {
            self.module.verify()?;
        }
        Ok(CompileOutput {
            module: self.module,
            exports: self.exports,
            types: self.types,
        })
    }

    pub(crate) fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            module: self.module.checkpoint(),
            types: self.types.checkpoint(),
            exports: self.exports.checkpoint(),
        }
    }

    /// Drop the functions, globals, types and exports added after `checkpoint`.
    pub(crate) fn rollback(&mut self, checkpoint: Checkpoint) {
        self.module.rollback(checkpoint.module);
        self.types.rollback(checkpoint.types);
        self.exports.rollback(checkpoint.exports);
        let module = &self.module;
        self.constants.retain(|symbol, _| module.global(symbol).is_some());
    }

    pub(crate) fn compile_decls(&mut self, decls: &[Decl]) -> CompileResult<()> {
        Diagnostics::collect(decls.iter().map(|decl| self.compile_decl(decl))).map(drop)
    }

    fn compile_decl(&mut self, decl: &Decl) -> CompileResult<()> {
        match decl {
            Decl::Function(function) => self.compile_function(function),
            Decl::Distribution(distribution) => self.compile_distribution(distribution),
            Decl::Module(module) => self.compile_module(module),
            Decl::Global(global) => self.compile_global(global),
            Decl::TypeAlias(alias) => self.compile_type_alias(alias),
        }
    }

    /// Run `f` inside a new scope. The scope is popped whatever `f` returns.
    pub(crate) fn with_scope<T>(
        &mut self,
        name: &str,
        f: impl FnOnce(&mut Self) -> CompileResult<T>,
    ) -> CompileResult<(T, Frame)> {
        let token = self.scopes.push(name);
        let result = f(self);
        let popped = self.scopes.pop(token);
        Diagnostics::combine(result, popped)
    }

    pub(crate) fn resolve_type(&mut self, ty: &TypeExpr) -> std::result::Result<TypeRef, ErrorKind> {
        match ty {
            TypeExpr::Named(path) => self.resolve_named_type(path),
            TypeExpr::Array(base, len) => {
                let base = self.resolve_type(base)?;
                Ok(self.types.array_of(base, *len))
            }
            TypeExpr::ArrayRef(base) => {
                let base = self.resolve_type(base)?;
                Ok(self.types.array_ref_of(base))
            }
        }
    }

    pub(crate) fn resolve_named_type(&self, path: &[String]) -> std::result::Result<TypeRef, ErrorKind> {
        match path {
            [name] => self
                .scopes
                .lookup_type(name)
                .map_or_else(|| self.types.lookup(name), Ok),
            [modules @ .., name] => self
                .scopes
                .lookup_module(modules)?
                .ty(name)
                .ok_or_else(|| ErrorKind::UnknownType(path.join("."))),
            [] => Err(ErrorKind::UnknownType(String::new())),
        }
    }

    fn compile_module(&mut self, decl: &ModuleDecl) -> CompileResult<()> {
        tracing::trace!(module = %decl.name, "compiling module");
        self.exports.push_module(&decl.name);
        match self.with_scope(&decl.name, |this| this.compile_decls(&decl.body)) {
            Ok(((), frame)) => {
                self.scopes.add_module(frame);
                self.exports.pop_module();
                Ok(())
            }
            Err(errors) => {
                self.exports.discard_module();
                Err(errors)
            }
        }
    }

    fn compile_global(&mut self, decl: &GlobalDecl) -> CompileResult<()> {
        let (value, found) = self.const_eval(&decl.value)?;
        let ty = match &decl.ty {
            Some(ty) => self.resolve_type(ty).map_err(|e| e.at(decl.span))?,
            None => found,
        };
        let value = self
            .types
            .cast_const(&value, found, ty)
            .map_err(|e| e.at(decl.span))?;

        let symbol = naming::qualified(&self.scopes.scope_name(), &decl.name);
        self.module.define_global(&symbol, value.clone());
        self.constants.insert(symbol.clone(), (value, ty));
        self.scopes.declare_variable(
            &decl.name,
            VariableEntry {
                storage: Storage::Global(symbol),
                ty,
                mutable: false,
            },
        );
        if self.distributions.is_empty() {
            self.exports.add_variable(&decl.name, self.types.name(ty));
        }
        Ok(())
    }

    fn compile_type_alias(&mut self, decl: &TypeAliasDecl) -> CompileResult<()> {
        let ty = self.resolve_type(&decl.ty).map_err(|e| e.at(decl.span))?;
        self.scopes.declare_type(&decl.name, ty);
        Ok(())
    }
}
