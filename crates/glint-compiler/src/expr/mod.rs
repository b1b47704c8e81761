//! Expressions.
//!
//! Every expression has three independent passes on [`Compiler`]:
//! - `typecheck`: result type only, emits nothing
//! - `codegen_expr`: emits instructions producing the value
//! - `const_eval`: folds the expression to a constant, for module globals
//!
//! Place expressions (variables, fields, elements) also have `codegen_ptr`,
//! which yields the address of the storage for assignment and `out`
//! arguments. Each pass reports errors as `Diagnostics` tagged with the
//! span of the innermost expression that failed; sibling operands are
//! checked together so both sides of a binary expression report.

pub mod operators;

#[cfg(test)]
mod expr_tests;

use glint_ir::{BinOp, Const, UnOp};

use crate::ast::{BinaryOp, Expr, ExprKind};
use crate::codegen::{Compiler, FunctionCx};
use crate::diagnostics::{CompileResult, Diagnostics, ErrorKind};
use crate::scope::{FunctionEntry, Storage, VariableEntry};
use crate::types::{TYPE_BOOL, TYPE_FLOAT, TYPE_INT, TypeRef, TypedValue};

use operators::Lowering;

impl Compiler {
    /// Whether `path` resolves to a type, making a call with it a construction.
    pub(crate) fn names_type(&self, path: &[String]) -> bool {
        self.resolve_named_type(path).is_ok()
    }

    pub fn typecheck(&mut self, expr: &Expr) -> CompileResult<TypeRef> {
        self.typecheck_inner(expr).map_err(|d| d.located(expr.span))
    }

    fn typecheck_all(&mut self, exprs: &[Expr]) -> CompileResult<Vec<TypeRef>> {
        Diagnostics::collect(exprs.iter().map(|e| self.typecheck(e)))
    }

    fn typecheck_inner(&mut self, expr: &Expr) -> CompileResult<TypeRef> {
        match &expr.kind {
            ExprKind::Float(_) => Ok(TYPE_FLOAT),
            ExprKind::Int(_) => Ok(TYPE_INT),
            ExprKind::Bool(_) => Ok(TYPE_BOOL),
            ExprKind::Path(path) => {
                let entry = self.scopes.lookup_qualified_variable(path)?;
                self.check_context_owner(entry.storage.context_depth(), &path.join("."))?;
                Ok(entry.ty)
            }
            ExprKind::Binary { op, lhs, rhs } => {
                let (l, r) = Diagnostics::combine(self.typecheck(lhs), self.typecheck(rhs))?;
                Ok(self.operators.resolve_binary(&self.types, *op, l, r)?.result)
            }
            ExprKind::Unary { op, operand } => {
                let ty = self.typecheck(operand)?;
                Ok(self.operators.resolve_unary(&self.types, *op, ty)?.result)
            }
            ExprKind::Call { path, args } => {
                let arg_types = self.typecheck_all(args)?;
                if let Ok(ty) = self.resolve_named_type(path) {
                    self.types.check_create(ty, &arg_types)?;
                    return Ok(ty);
                }
                Ok(self.resolve_call(path, &arg_types)?.return_type)
            }
            ExprKind::Construct { ty, args } => {
                let (ty, arg_types) = Diagnostics::combine(
                    self.resolve_type(ty).map_err(Diagnostics::from),
                    self.typecheck_all(args),
                )?;
                self.types.check_create(ty, &arg_types)?;
                Ok(ty)
            }
            ExprKind::Field { base, name } => {
                let base = self.typecheck(base)?;
                Ok(self.types.field_type(base, name)?)
            }
            ExprKind::Index { base, index } => {
                let (base, index) = Diagnostics::combine(self.typecheck(base), self.typecheck(index))?;
                self.types.check_index(index)?;
                Ok(self.types.element_type(base)?)
            }
        }
    }

    /// Pick the overload of `path` with the lowest total argument cast cost.
    ///
    /// `out` arguments accept only their exact type. Ties keep the overload
    /// declared first.
    pub(crate) fn resolve_call(&self, path: &[String], args: &[TypeRef]) -> Result<FunctionEntry, ErrorKind> {
        let mut best: Option<(u32, &FunctionEntry)> = None;
        for candidate in self.scopes.qualified_function_candidates(path)? {
            if candidate.arguments.len() != args.len() {
                continue;
            }
            let mut total = 0u32;
            let mut legal = true;
            for (param, &arg) in candidate.arguments.iter().zip(args) {
                let cast = self.types.can_cast_to(arg, param.ty);
                if !cast.legal || (param.output && cast.cost != 0) {
                    legal = false;
                    break;
                }
                total += cast.cost;
            }
            if legal && best.is_none_or(|(cost, _)| total < cost) {
                best = Some((total, candidate));
            }
        }
        let (_, entry) = best.ok_or_else(|| ErrorKind::NoMatchingFunction {
            name: path.join("."),
            args: self.types.list(args),
        })?;
        self.check_context_owner(entry.context, &entry.name)?;
        Ok(entry.clone())
    }

    /// Distribution state is only reachable from inside the distribution that
    /// owns it, not from a distribution nested in it.
    fn check_context_owner(&self, owner: Option<usize>, name: &str) -> Result<(), ErrorKind> {
        match owner {
            Some(depth) if depth + 1 != self.distributions.len() => {
                Err(ErrorKind::EnclosingDistribution(name.to_owned()))
            }
            _ => Ok(()),
        }
    }

    pub fn codegen_expr(&mut self, fx: &mut FunctionCx, expr: &Expr) -> CompileResult<TypedValue> {
        self.codegen_expr_inner(fx, expr)
            .map_err(|d| d.located(expr.span))
    }

    fn codegen_all(&mut self, fx: &mut FunctionCx, exprs: &[Expr]) -> CompileResult<Vec<TypedValue>> {
        Diagnostics::collect(exprs.iter().map(|e| self.codegen_expr(fx, e)))
    }

    fn codegen_expr_inner(&mut self, fx: &mut FunctionCx, expr: &Expr) -> CompileResult<TypedValue> {
        match &expr.kind {
            ExprKind::Float(v) => Ok(TypedValue::new(fx.b.f32_const(*v), TYPE_FLOAT)),
            ExprKind::Int(v) => Ok(TypedValue::new(fx.b.i32_const(*v), TYPE_INT)),
            ExprKind::Bool(v) => Ok(TypedValue::new(fx.b.constant(Const::Bool(*v)), TYPE_BOOL)),
            ExprKind::Path(path) => {
                let entry = self.scopes.lookup_qualified_variable(path)?.clone();
                self.check_context_owner(entry.storage.context_depth(), &path.join("."))?;
                self.load_variable(fx, &entry)
            }
            ExprKind::Binary { op, lhs, rhs } => {
                let (l, r) = Diagnostics::combine(self.codegen_expr(fx, lhs), self.codegen_expr(fx, rhs))?;
                let overload = self.operators.resolve_binary(&self.types, *op, l.ty, r.ty)?;
                let l = self.types.gen_cast(&mut fx.b, l, overload.lhs)?;
                let r = self.types.gen_cast(&mut fx.b, r, overload.rhs)?;
                Ok(overload.emit(&mut fx.b, l.value, r.value))
            }
            ExprKind::Unary { op, operand } => {
                let v = self.codegen_expr(fx, operand)?;
                let overload = self.operators.resolve_unary(&self.types, *op, v.ty)?;
                let v = self.types.gen_cast(&mut fx.b, v, overload.operand)?;
                Ok(TypedValue::new(fx.b.unary(overload.op, v.value), overload.result))
            }
            ExprKind::Call { path, args } => {
                if let Ok(ty) = self.resolve_named_type(path) {
                    let args = self.codegen_all(fx, args)?;
                    return Ok(self.types.create(&mut fx.b, ty, &args)?);
                }
                self.codegen_call(fx, path, args)?.ok_or_else(|| {
                    ErrorKind::Message(format!("`{}` does not produce a value", path.join("."))).into()
                })
            }
            ExprKind::Construct { ty, args } => {
                let ty = self.resolve_type(ty)?;
                let args = self.codegen_all(fx, args)?;
                Ok(self.types.create(&mut fx.b, ty, &args)?)
            }
            ExprKind::Field { base, name } => {
                let base = self.codegen_expr(fx, base)?;
                Ok(self.types.access_field(&mut fx.b, base, name)?)
            }
            ExprKind::Index { base, index } => {
                let (base, index) =
                    Diagnostics::combine(self.codegen_expr(fx, base), self.codegen_expr(fx, index))?;
                Ok(self.types.access_element(&mut fx.b, base, index)?)
            }
        }
    }

    fn load_variable(&self, fx: &mut FunctionCx, entry: &VariableEntry) -> CompileResult<TypedValue> {
        let ptr = match &entry.storage {
            Storage::Pointer(ptr) => *ptr,
            Storage::ContextField { index, .. } => {
                let (Some(context), Some(distribution)) = (fx.context, self.distributions.last()) else {
                    return Err(ErrorKind::Message(
                        "distribution parameter used outside its distribution".to_owned(),
                    )
                    .into());
                };
                fx.b.member_ptr(distribution.block.clone(), context, *index)
            }
            Storage::Global(symbol) => fx.b.global_addr(symbol),
        };
        Ok(self.types.load(&mut fx.b, entry.ty, ptr))
    }

    /// Emit a call to a function (not a construction). `None` for void functions.
    pub(crate) fn codegen_call(
        &mut self,
        fx: &mut FunctionCx,
        path: &[String],
        args: &[Expr],
    ) -> CompileResult<Option<TypedValue>> {
        let arg_types = self.typecheck_all(args)?;
        let entry = self.resolve_call(path, &arg_types)?;

        let mut values = Vec::with_capacity(args.len() + 1);
        if entry.takes_context() {
            let context = fx.context.ok_or_else(|| {
                ErrorKind::Message(format!("`{}` needs a distribution context", entry.name))
            })?;
            values.push(context);
        }
        let lowered = Diagnostics::collect(entry.arguments.iter().zip(args).map(|(param, arg)| -> CompileResult<_> {
            if param.output {
                let place = self.codegen_ptr(fx, arg)?;
                return Ok(place.value);
            }
            let tv = self.codegen_expr(fx, arg)?;
            let tv = self
                .types
                .gen_cast(&mut fx.b, tv, param.ty)
                .map_err(|e| Diagnostics::from(e.at(arg.span)))?;
            Ok(tv.value)
        }))?;
        values.extend(lowered);

        let signature = self.function_signature(&entry);
        let result = if entry.foreign {
            fx.b.call_extern(&entry.symbol, signature, values)
        } else {
            fx.b.call(&entry.symbol, signature.ret, values)
        };
        tracing::trace!(callee = %entry.symbol, "call emitted");
        Ok(result.map(|value| TypedValue::new(value, entry.return_type)))
    }

    /// Address of the storage named by a place expression; `ty` is the pointee type.
    pub fn codegen_ptr(&mut self, fx: &mut FunctionCx, expr: &Expr) -> CompileResult<TypedValue> {
        self.codegen_ptr_inner(fx, expr)
            .map_err(|d| d.located(expr.span))
    }

    fn codegen_ptr_inner(&mut self, fx: &mut FunctionCx, expr: &Expr) -> CompileResult<TypedValue> {
        match &expr.kind {
            ExprKind::Path(path) => match self.scopes.lookup_qualified_variable(path)? {
                VariableEntry {
                    storage: Storage::Pointer(ptr),
                    ty,
                    mutable: true,
                } => Ok(TypedValue::new(*ptr, *ty)),
                _ => Err(ErrorKind::NotAssignable.into()),
            },
            ExprKind::Field { base, name } => {
                let base = self.codegen_ptr(fx, base)?;
                Ok(self.types.access_field_ptr(&mut fx.b, base.ty, base.value, name)?)
            }
            ExprKind::Index { base, index } => {
                let (base, index) =
                    Diagnostics::combine(self.codegen_ptr(fx, base), self.codegen_expr(fx, index))?;
                Ok(self
                    .types
                    .access_element_ptr(&mut fx.b, base.ty, base.value, index)?)
            }
            _ => Err(ErrorKind::NotAssignable.into()),
        }
    }

    /// Fold an expression to a constant.
    pub fn const_eval(&mut self, expr: &Expr) -> CompileResult<(Const, TypeRef)> {
        self.const_eval_inner(expr).map_err(|d| d.located(expr.span))
    }

    fn const_eval_all(&mut self, exprs: &[Expr]) -> CompileResult<Vec<(Const, TypeRef)>> {
        Diagnostics::collect(exprs.iter().map(|e| self.const_eval(e)))
    }

    fn const_eval_inner(&mut self, expr: &Expr) -> CompileResult<(Const, TypeRef)> {
        match &expr.kind {
            ExprKind::Float(v) => Ok((Const::F32(*v), TYPE_FLOAT)),
            ExprKind::Int(v) => Ok((Const::I32(*v), TYPE_INT)),
            ExprKind::Bool(v) => Ok((Const::Bool(*v), TYPE_BOOL)),
            ExprKind::Path(path) => match &self.scopes.lookup_qualified_variable(path)?.storage {
                Storage::Global(symbol) => self
                    .constants
                    .get(symbol)
                    .cloned()
                    .ok_or_else(|| ErrorKind::NotConstant.into()),
                _ => Err(ErrorKind::NotConstant.into()),
            },
            ExprKind::Binary { op, lhs, rhs } => {
                let ((l, lt), (r, rt)) = Diagnostics::combine(self.const_eval(lhs), self.const_eval(rhs))?;
                self.fold_binary(*op, (l, lt), (r, rt))
            }
            ExprKind::Unary { op, operand } => {
                let (value, ty) = self.const_eval(operand)?;
                let overload = self.operators.resolve_unary(&self.types, *op, ty)?;
                let value = self.types.cast_const(&value, ty, overload.operand)?;
                let folded = fold_unary(overload.op, &value).ok_or(ErrorKind::NotConstant)?;
                Ok((folded, overload.result))
            }
            ExprKind::Call { path, args } => {
                let ty = self.resolve_named_type(path).map_err(|_| ErrorKind::NotConstant)?;
                let args = self.const_eval_all(args)?;
                Ok((self.types.create_const(ty, &args)?, ty))
            }
            ExprKind::Construct { ty, args } => {
                let ty = self.resolve_type(ty)?;
                let args = self.const_eval_all(args)?;
                Ok((self.types.create_const(ty, &args)?, ty))
            }
            ExprKind::Field { .. } | ExprKind::Index { .. } => Err(ErrorKind::NotConstant.into()),
        }
    }

    fn fold_binary(
        &self,
        op: BinaryOp,
        (lhs, lhs_ty): (Const, TypeRef),
        (rhs, rhs_ty): (Const, TypeRef),
    ) -> CompileResult<(Const, TypeRef)> {
        let overload = self.operators.resolve_binary(&self.types, op, lhs_ty, rhs_ty)?;
        let lhs = self.types.cast_const(&lhs, lhs_ty, overload.lhs)?;
        let rhs = self.types.cast_const(&rhs, rhs_ty, overload.rhs)?;
        let (ir, lhs, rhs) = match overload.lowering {
            Lowering::Direct(ir) => (ir, lhs, rhs),
            Lowering::SplatLhs(ir, lanes) => (ir, splat(&lhs, lanes), rhs),
            Lowering::SplatRhs(ir, lanes) => (ir, lhs, splat(&rhs, lanes)),
        };
        let folded = fold(ir, &lhs, &rhs).ok_or(ErrorKind::NotConstant)?;
        Ok((folded, overload.result))
    }
}

fn splat(value: &Const, lanes: u8) -> Const {
    match value {
        Const::F32(v) => Const::Vector(vec![*v; usize::from(lanes)]),
        other => other.clone(),
    }
}

fn fold_unary(op: UnOp, value: &Const) -> Option<Const> {
    Some(match (op, value) {
        (UnOp::Neg, Const::I32(v)) => Const::I32(v.wrapping_neg()),
        (UnOp::Neg, Const::F32(v)) => Const::F32(-v),
        (UnOp::Neg, Const::Vector(lanes)) => Const::Vector(lanes.iter().map(|l| -l).collect()),
        (UnOp::Not, Const::Bool(v)) => Const::Bool(!v),
        _ => return None,
    })
}

fn fold(op: BinOp, lhs: &Const, rhs: &Const) -> Option<Const> {
    Some(match (lhs, rhs) {
        (Const::I32(a), Const::I32(b)) => match op {
            BinOp::Add => Const::I32(a.wrapping_add(*b)),
            BinOp::Sub => Const::I32(a.wrapping_sub(*b)),
            BinOp::Mul => Const::I32(a.wrapping_mul(*b)),
            BinOp::Div => Const::I32(a.checked_div(*b)?),
            _ => Const::Bool(compare(op, a, b)?),
        },
        (Const::F32(a), Const::F32(b)) => match op {
            BinOp::Add => Const::F32(a + b),
            BinOp::Sub => Const::F32(a - b),
            BinOp::Mul => Const::F32(a * b),
            BinOp::Div => Const::F32(a / b),
            _ => Const::Bool(compare(op, a, b)?),
        },
        (Const::Bool(a), Const::Bool(b)) => Const::Bool(match op {
            BinOp::Eq => a == b,
            BinOp::Ne => a != b,
            BinOp::And => *a && *b,
            BinOp::Or => *a || *b,
            _ => return None,
        }),
        (Const::Vector(a), Const::Vector(b)) if a.len() == b.len() => {
            let lane = |x: f32, y: f32| match op {
                BinOp::Add => Some(x + y),
                BinOp::Sub => Some(x - y),
                BinOp::Mul => Some(x * y),
                BinOp::Div => Some(x / y),
                _ => None,
            };
            Const::Vector(
                a.iter()
                    .zip(b)
                    .map(|(&x, &y)| lane(x, y))
                    .collect::<Option<Vec<_>>>()?,
            )
        }
        _ => return None,
    })
}

fn compare<T: PartialOrd>(op: BinOp, a: &T, b: &T) -> Option<bool> {
    Some(match op {
        BinOp::Lt => a < b,
        BinOp::Le => a <= b,
        BinOp::Gt => a > b,
        BinOp::Ge => a >= b,
        BinOp::Eq => a == b,
        BinOp::Ne => a != b,
        _ => return None,
    })
}
