//! Functions and statements.

use glint_ir::{FunctionBuilder, IrType, Linkage, Signature, Value};

use crate::ast::{Expr, ExprKind, FunctionDecl, FunctionKind, Stmt};
use crate::diagnostics::{CompileResult, Diagnostics, ErrorKind};
use crate::exports::{ExportKind, FunctionExport};
use crate::scope::{FunctionArgument, FunctionEntry, FunctionKey, Storage, VariableEntry};
use crate::types::{TYPE_VOID, TypeRef, TypedValue};

use super::{Compiler, naming};

/// State of the function whose body is being emitted.
pub struct FunctionCx {
    pub b: FunctionBuilder,
    pub return_type: TypeRef,
    /// Context pointer of the enclosing distribution, if any.
    pub context: Option<Value>,
}

impl FunctionCx {
    pub fn new(b: FunctionBuilder, return_type: TypeRef, takes_context: bool) -> Self {
        let context = takes_context.then(|| b.param(0));
        Self {
            b,
            return_type,
            context,
        }
    }
}

fn export_kind(kind: FunctionKind) -> ExportKind {
    match kind {
        FunctionKind::Plain => ExportKind::Internal,
        FunctionKind::Entry => ExportKind::Entry,
        FunctionKind::Material => ExportKind::Material,
        FunctionKind::Foreign => ExportKind::Foreign,
    }
}

impl Compiler {
    /// IR signature of a compiled function: optional context pointer, then
    /// by-value inputs and by-pointer outputs.
    pub(crate) fn function_signature(&self, entry: &FunctionEntry) -> Signature {
        let context = entry.takes_context().then_some(IrType::Ptr);
        let params = context
            .into_iter()
            .chain(entry.arguments.iter().map(|arg| {
                if arg.output {
                    IrType::Ptr
                } else {
                    self.types.ir_type(arg.ty)
                }
            }))
            .collect();
        Signature::new(params, self.types.ir_type(entry.return_type))
    }

    fn resolve_arguments(&mut self, decl: &FunctionDecl) -> CompileResult<(TypeRef, Vec<FunctionArgument>)> {
        let return_type = self
            .resolve_type(&decl.return_type)
            .map_err(|e| Diagnostics::from(e.at(decl.span)));
        let arguments = Diagnostics::collect(decl.args.iter().map(|arg| -> CompileResult<_> {
            let ty = self
                .resolve_type(&arg.ty)
                .map_err(|e| Diagnostics::from(e.at(decl.span)))?;
            Ok(FunctionArgument {
                name: arg.name.clone(),
                ty,
                output: arg.output,
            })
        }));
        Diagnostics::combine(return_type, arguments)
    }

    pub(crate) fn compile_function(&mut self, decl: &FunctionDecl) -> CompileResult<()> {
        let (return_type, arguments) = self.resolve_arguments(decl)?;
        let foreign = decl.kind == FunctionKind::Foreign;
        let context = if foreign {
            None
        } else {
            self.distributions.len().checked_sub(1)
        };
        let scope = self.scopes.scope_name();
        let arg_types: Vec<TypeRef> = arguments.iter().map(|a| a.ty).collect();

        let symbol = if foreign {
            decl.name.clone()
        } else {
            let names: Vec<&str> = arg_types.iter().map(|&t| self.types.name(t)).collect();
            naming::function_symbol(&scope, &decl.name, &names)
        };
        let entry = FunctionEntry {
            name: naming::qualified(&scope, &decl.name),
            symbol,
            return_type,
            arguments,
            context,
            defined: decl.body.is_some() || foreign,
            foreign,
        };
        let key = FunctionKey::new(&decl.name, arg_types);
        let previous = self.scopes.local_function(&key).cloned();
        self.scopes
            .declare_function(key.clone(), entry.clone())
            .map_err(|e| e.at(decl.span))?;
        tracing::trace!(symbol = %entry.symbol, defined = entry.defined, "function declared");

        if !foreign {
            let Some(body) = &decl.body else {
                return Ok(());
            };
            // declared before the body so it can call itself
            let emitted = self.emit_body(decl, &entry, body).and_then(|function| {
                self.module
                    .add_function(function)
                    .map_err(|_| Diagnostics::from(ErrorKind::DuplicateFunction(entry.name.clone()).at(decl.span)))
            });
            if let Err(errors) = emitted {
                self.scopes.restore_function(&key, previous);
                return Err(errors);
            }
        }

        if self.distributions.is_empty() {
            self.export_function(&decl.name, &entry, export_kind(decl.kind));
        }
        Ok(())
    }

    pub(crate) fn export_function(&mut self, name: &str, entry: &FunctionEntry, kind: ExportKind) {
        let arguments = entry
            .arguments
            .iter()
            .map(|arg| {
                let ty = self.types.name(arg.ty);
                let ty = if arg.output { format!("out {ty}") } else { ty.to_owned() };
                (arg.name.clone(), ty)
            })
            .collect();
        self.exports.add_function(FunctionExport {
            name: name.to_owned(),
            full_name: entry.name.clone(),
            symbol: entry.symbol.clone(),
            kind,
            return_type: self.types.name(entry.return_type).to_owned(),
            arguments,
        });
    }

    fn emit_body(
        &mut self,
        decl: &FunctionDecl,
        entry: &FunctionEntry,
        body: &[Stmt],
    ) -> CompileResult<glint_ir::Function> {
        let linkage = if entry.takes_context() {
            Linkage::Internal
        } else {
            Linkage::External
        };
        let b = FunctionBuilder::new(&entry.symbol, self.function_signature(entry), linkage);
        let mut fx = FunctionCx::new(b, entry.return_type, entry.takes_context());
        let first_arg = usize::from(entry.takes_context());

        self.with_scope(&decl.name, |this| {
            for (i, arg) in entry.arguments.iter().enumerate() {
                let param = fx.b.param(first_arg + i);
                let storage = if arg.output {
                    param
                } else {
                    let slot = this.types.allocate(&mut fx.b, arg.ty);
                    fx.b.store(param, slot);
                    slot
                };
                this.scopes.declare_variable(
                    &arg.name,
                    VariableEntry {
                        storage: Storage::Pointer(storage),
                        ty: arg.ty,
                        mutable: true,
                    },
                );
            }

            Diagnostics::collect(body.iter().map(|stmt| this.compile_stmt(&mut fx, stmt)))?;
            if !fx.b.is_terminated() && entry.return_type != TYPE_VOID {
                return Err(ErrorKind::MissingReturn(entry.name.clone()).at(decl.span).into());
            }
            Ok(())
        })?;

        tracing::trace!(symbol = %entry.symbol, "function emitted");
        Ok(fx.b.finish())
    }

    /// Duplicate a value read from existing storage, so the new binding owns it.
    fn take_ownership(&self, fx: &mut FunctionCx, expr: &Expr, tv: TypedValue) -> TypedValue {
        if expr.is_place() {
            self.types.copy(&mut fx.b, tv)
        } else {
            tv
        }
    }

    pub(crate) fn compile_stmt(&mut self, fx: &mut FunctionCx, stmt: &Stmt) -> CompileResult<()> {
        self.compile_stmt_inner(fx, stmt)
            .map_err(|d| d.located(stmt.span()))
    }

    fn compile_stmt_inner(&mut self, fx: &mut FunctionCx, stmt: &Stmt) -> CompileResult<()> {
        match stmt {
            Stmt::Let {
                name, ty, value, ..
            } => {
                let declared = ty.as_ref().map(|ty| self.resolve_type(ty)).transpose()?;
                let tv = match (value, declared) {
                    (Some(value), declared) => {
                        let tv = self.codegen_expr(fx, value)?;
                        let tv = self.take_ownership(fx, value, tv);
                        self.types.gen_cast(&mut fx.b, tv, declared.unwrap_or(tv.ty))?
                    }
                    (None, Some(declared)) => self.types.initialize(&mut fx.b, declared)?,
                    (None, None) => {
                        return Err(ErrorKind::Message(format!(
                            "`{name}` needs a type or an initial value"
                        ))
                        .into());
                    }
                };
                let slot = self.types.allocate(&mut fx.b, tv.ty);
                self.types.store(&mut fx.b, tv, slot);
                self.scopes.declare_variable(
                    name,
                    VariableEntry {
                        storage: Storage::Pointer(slot),
                        ty: tv.ty,
                        mutable: true,
                    },
                );
                Ok(())
            }
            Stmt::Assign { target, value, .. } => {
                let tv = self.codegen_expr(fx, value)?;
                let tv = self.take_ownership(fx, value, tv);
                let place = self.codegen_ptr(fx, target)?;
                let tv = self.types.gen_cast(&mut fx.b, tv, place.ty)?;
                self.types.destroy_ptr(&mut fx.b, place.ty, place.value);
                self.types.store(&mut fx.b, tv, place.value);
                Ok(())
            }
            Stmt::Return { value: None, .. } => {
                if fx.return_type != TYPE_VOID {
                    return Err(ErrorKind::MissingReturn(fx.b.name().to_owned()).into());
                }
                fx.b.ret(None);
                Ok(())
            }
            Stmt::Return {
                value: Some(value), ..
            } => {
                let tv = self.codegen_expr(fx, value)?;
                let tv = self.take_ownership(fx, value, tv);
                let tv = self.types.gen_cast(&mut fx.b, tv, fx.return_type)?;
                fx.b.ret(Some(tv.value));
                Ok(())
            }
            Stmt::Expr(expr) => {
                let result = match &expr.kind {
                    ExprKind::Call { path, args } if !self.names_type(path) => {
                        self.codegen_call(fx, path, args).map_err(|d| d.located(expr.span))?
                    }
                    _ => Some(self.codegen_expr(fx, expr)?),
                };
                if let Some(tv) = result {
                    if !expr.is_place() {
                        self.types.destroy(&mut fx.b, tv);
                    }
                }
                Ok(())
            }
        }
    }
}
