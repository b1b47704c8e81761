//! Distribution compiler.
//!
//! A `distribution` declaration becomes a runtime object: a parameter block
//! allocated by the host plus three fixed-ABI functions that reach it through
//! an opaque pointer. Compilation runs through these states:
//!
//! 1. resolve parameter types (all errors reported, then abort)
//! 2. lay out the parameter block
//! 3. enter the distribution scope with every parameter bound to its block field
//! 4. compile the body (all errors reported)
//! 5. find `evaluate` and `sample` in the distribution scope only
//! 6. emit the evaluator, sampler and destructor wrappers
//! 7. emit the constructor
//! 8. register the constructor in the enclosing scope and export it
//!
//! The scope is popped on every path. On failure, the functions, types and
//! exports added for the distribution (nested ones included) are rolled back.

use glint_ir::abi::{self, ALLOC_DFUNC};
use glint_ir::{FunctionBuilder, IrType, Linkage, Signature, Value};

use crate::ast::{DistributionDecl, ParamDecl};
use crate::diagnostics::{CompileResult, Diagnostics, ErrorKind};
use crate::exports::ExportKind;
use crate::scope::{FunctionArgument, FunctionEntry, FunctionKey, Storage, VariableEntry};
use crate::types::{
    Field, TYPE_DFUNC, TYPE_FLOAT, TYPE_VEC2, TYPE_VEC3, TYPE_VEC4, Type, TypeRef, TypedValue,
};

use super::naming::{self, WrapperRole};
use super::{Compiler, DistributionContext};

/// Required signature of a distribution entry point.
struct EntryPoint {
    name: &'static str,
    inputs: &'static [TypeRef],
    outputs: &'static [TypeRef],
    returns: TypeRef,
}

const EVALUATE: EntryPoint = EntryPoint {
    name: "evaluate",
    inputs: &[TYPE_VEC3, TYPE_VEC3, TYPE_VEC3, TYPE_VEC3],
    outputs: &[TYPE_FLOAT],
    returns: TYPE_VEC4,
};

const SAMPLE: EntryPoint = EntryPoint {
    name: "sample",
    inputs: &[TYPE_VEC3, TYPE_VEC3, TYPE_VEC2, TYPE_VEC2],
    outputs: &[TYPE_VEC3, TYPE_VEC3],
    returns: TYPE_FLOAT,
};

/// Parameter block layout shared by the wrappers and the constructor.
struct Block {
    fields: Vec<Field>,
    ir: IrType,
    descriptor: Type,
}

impl Compiler {
    #[tracing::instrument(skip(self, decl), fields(distribution = %decl.name))]
    pub(crate) fn compile_distribution(&mut self, decl: &DistributionDecl) -> CompileResult<()> {
        let params = self.resolve_params(&decl.params)?;
        tracing::debug!(count = params.len(), "parameters resolved");

        let scope = self.scopes.scope_name();
        let block = self.layout_block(&scope, &decl.name, params);
        let key = FunctionKey::new(&decl.name, block.fields.iter().map(|f| f.ty).collect());
        // wrapper symbols carry no parameter types, so names cannot be overloaded
        let evaluator = naming::wrapper_symbol(&scope, &decl.name, WrapperRole::Evaluator);
        if self.scopes.local_function(&key).is_some() || self.module.function(&evaluator).is_some() {
            return Err(ErrorKind::DuplicateFunction(naming::qualified(&scope, &decl.name))
                .at(decl.span)
                .into());
        }

        let checkpoint = self.checkpoint();
        let entered = self.with_scope(&decl.name, |this| {
            let depth = this.distributions.len();
            this.bind_params(&block, depth);
            tracing::debug!("scope entered");

            this.distributions.push(DistributionContext {
                block: block.ir.clone(),
            });
            let body = this.compile_decls(&decl.body);
            this.distributions.pop();
            body?;
            tracing::debug!("body compiled");

            let (evaluate, sample) = Diagnostics::combine(
                this.find_entry_point(&EVALUATE),
                this.find_entry_point(&SAMPLE),
            )
            .map_err(|d| d.located(decl.span))?;
            tracing::debug!("entry points validated");
            Ok((evaluate, sample))
        });
        let ((evaluate, sample), _) = match entered {
            Ok(found) => found,
            Err(errors) => {
                self.rollback(checkpoint);
                tracing::debug!(errors = errors.len(), "distribution failed");
                return Err(errors);
            }
        };

        let eval = self.emit_evaluator(&scope, &decl.name, &evaluate);
        let sampler = self.emit_sampler(&scope, &decl.name, &sample);
        let dtor = self.emit_destructor(&scope, &decl.name, &block);
        let ctor = self.emit_constructor(&scope, &decl.name, &block);
        let emitted = [eval, sampler, dtor, ctor]
            .into_iter()
            .try_for_each(|function| self.module.add_function(function));
        if let Err(err) = emitted {
            self.rollback(checkpoint);
            return Err(ErrorKind::Message(err.to_string()).at(decl.span).into());
        }
        tracing::debug!("wrappers synthesized");

        if let Err(err) = self.register_constructor(&scope, decl, block, key) {
            self.rollback(checkpoint);
            return Err(err.at(decl.span).into());
        }
        tracing::debug!("registered");
        Ok(())
    }

    /// Resolve every parameter type, reporting all failures together.
    fn resolve_params(&mut self, params: &[ParamDecl]) -> CompileResult<Vec<Field>> {
        Diagnostics::collect(params.iter().map(|param| -> CompileResult<_> {
            let ty = self
                .resolve_type(&param.ty)
                .map_err(|e| Diagnostics::from(e.at(param.span)))?;
            Ok(Field {
                name: param.name.clone(),
                ty,
            })
        }))
    }

    fn layout_block(&self, scope: &str, name: &str, fields: Vec<Field>) -> Block {
        let ir = IrType::Struct(fields.iter().map(|f| self.types.ir_type(f.ty)).collect());
        let block_name = naming::param_block_name(name);
        let type_names: Vec<&str> = fields.iter().map(|f| self.types.name(f.ty)).collect();
        let descriptor = Type::record(
            block_name.clone(),
            naming::function_symbol(scope, &block_name, &type_names),
            fields.clone(),
        );
        Block {
            fields,
            ir,
            descriptor,
        }
    }

    /// Bind every parameter to its field in the block of the distribution at `depth`.
    fn bind_params(&mut self, block: &Block, depth: usize) {
        for (index, field) in block.fields.iter().enumerate() {
            self.scopes.declare_variable(
                &field.name,
                VariableEntry {
                    storage: Storage::ContextField {
                        depth,
                        index: index as u32,
                    },
                    ty: field.ty,
                    mutable: false,
                },
            );
        }
    }

    /// Find an entry point in the innermost scope by its exact argument types.
    fn find_entry_point(&self, required: &EntryPoint) -> CompileResult<FunctionEntry> {
        let arguments = [required.inputs, required.outputs].concat();
        let key = FunctionKey::new(required.name, arguments);
        let entry = self
            .scopes
            .local_function(&key)
            .ok_or_else(|| ErrorKind::MissingEntryPoint(required.name.to_owned()))?;

        let invalid = |reason: String| ErrorKind::InvalidEntryPointSignature {
            name: required.name.to_owned(),
            reason,
        };
        let (inputs, outputs) = entry.arguments.split_at(required.inputs.len());
        if let Some(arg) = inputs.iter().find(|a| a.output) {
            return Err(invalid(format!("argument `{}` must not be `out`", arg.name)).into());
        }
        if let Some(arg) = outputs.iter().find(|a| !a.output) {
            return Err(invalid(format!("argument `{}` must be `out`", arg.name)).into());
        }
        if entry.return_type != required.returns {
            return Err(invalid(format!(
                "must return `{}`, found `{}`",
                self.types.name(required.returns),
                self.types.name(entry.return_type)
            ))
            .into());
        }
        Ok(entry.clone())
    }

    /// `(ctx, P_in*, w_in*, P_out*, w_out*, pdf*, result*) -> void`
    fn emit_evaluator(
        &self,
        scope: &str,
        name: &str,
        evaluate: &FunctionEntry,
    ) -> glint_ir::Function {
        let symbol = naming::wrapper_symbol(scope, name, WrapperRole::Evaluator);
        let mut b = FunctionBuilder::new(symbol, abi::evaluator_signature(), Linkage::Internal);
        let context = b.param(0);

        let mut args = vec![context];
        for i in 1..=4 {
            let ptr = b.param(i);
            args.push(b.load(IrType::Vector(3), ptr));
        }
        args.push(b.param(5));
        let ret = self.types.ir_type(evaluate.return_type);
        if let Some(color) = b.call(&evaluate.symbol, ret, args) {
            let out = b.param(6);
            b.store(color, out);
        }
        b.finish()
    }

    /// `(ctx, P_out*, w_out*, rand_P*, rand_w*, P_in*, w_in*) -> float`
    fn emit_sampler(&self, scope: &str, name: &str, sample: &FunctionEntry) -> glint_ir::Function {
        let symbol = naming::wrapper_symbol(scope, name, WrapperRole::Sampler);
        let mut b = FunctionBuilder::new(symbol, abi::sampler_signature(), Linkage::Internal);
        let context = b.param(0);

        let mut args = vec![context];
        let inputs = [
            IrType::Vector(3),
            IrType::Vector(3),
            IrType::Vector(2),
            IrType::Vector(2),
        ];
        for (i, ty) in inputs.into_iter().enumerate() {
            let ptr = b.param(i + 1);
            args.push(b.load(ty, ptr));
        }
        args.extend([b.param(5), b.param(6)]);
        let ret = self.types.ir_type(sample.return_type);
        let pdf = b.call(&sample.symbol, ret, args);
        b.ret(pdf);
        b.finish()
    }

    /// `(block*) -> void`, releasing every resource-owning field in order.
    fn emit_destructor(&self, scope: &str, name: &str, block: &Block) -> glint_ir::Function {
        let symbol = naming::wrapper_symbol(scope, name, WrapperRole::Destructor);
        let mut b = FunctionBuilder::new(symbol, abi::destructor_signature(), Linkage::Internal);
        let params = b.param(0);

        for (index, field) in block.fields.iter().enumerate() {
            if self.types.owns_resources(field.ty) {
                let ptr = b.member_ptr(block.ir.clone(), params, index as u32);
                self.types.destroy_ptr(&mut b, field.ty, ptr);
            }
        }
        b.finish()
    }

    /// Public constructor taking the parameters by value and returning a handle.
    fn emit_constructor(&self, scope: &str, name: &str, block: &Block) -> glint_ir::Function {
        let type_names: Vec<&str> = block.fields.iter().map(|f| self.types.name(f.ty)).collect();
        let symbol = naming::function_symbol(scope, name, &type_names);
        let params = block.fields.iter().map(|f| self.types.ir_type(f.ty)).collect();
        let handle_ty = abi::dfunc_handle_type();
        let signature = Signature::new(params, handle_ty.clone());
        let mut b = FunctionBuilder::new(symbol, signature, Linkage::External);

        let scene_ptr = b.global_addr(&self.scene.global);
        let scene = b.load(IrType::Ptr, scene_ptr);
        let handle = b.alloca(handle_ty.clone());
        let size = b.i32_const(block.ir.size() as i32);
        let roles = [
            WrapperRole::Evaluator,
            WrapperRole::Sampler,
            WrapperRole::Destructor,
        ];
        let wrappers: Vec<Value> = roles
            .into_iter()
            .map(|role| b.func_addr(naming::wrapper_symbol(scope, name, role)))
            .collect();

        let mut args = vec![scene, size];
        args.extend(wrappers);
        args.push(handle);
        if let Some(storage) = b.call_extern(ALLOC_DFUNC, abi::alloc_dfunc_signature(), args) {
            for (index, field) in block.fields.iter().enumerate() {
                let arg = TypedValue::new(b.param(index), field.ty);
                let owned = self.types.copy(&mut b, arg);
                let slot = b.member_ptr(block.ir.clone(), storage, index as u32);
                self.types.store(&mut b, owned, slot);
            }
        }
        let result = b.load(handle_ty, handle);
        b.ret(Some(result));
        b.finish()
    }

    fn register_constructor(
        &mut self,
        scope: &str,
        decl: &DistributionDecl,
        block: Block,
        key: FunctionKey,
    ) -> Result<(), ErrorKind> {
        let type_names: Vec<&str> = block.fields.iter().map(|f| self.types.name(f.ty)).collect();
        let entry = FunctionEntry {
            name: naming::qualified(scope, &decl.name),
            symbol: naming::function_symbol(scope, &decl.name, &type_names),
            return_type: TYPE_DFUNC,
            arguments: block
                .fields
                .iter()
                .map(|f| FunctionArgument {
                    name: f.name.clone(),
                    ty: f.ty,
                    output: false,
                })
                .collect(),
            context: None,
            defined: true,
            foreign: false,
        };
        self.scopes.declare_function(key, entry.clone())?;
        self.types.register_nameless(block.descriptor);
        self.export_function(&decl.name, &entry, ExportKind::Internal);
        Ok(())
    }
}
