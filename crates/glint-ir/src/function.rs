//! Functions and the builder that emits them.

use indexmap::IndexMap;

use crate::instructions::{BinOp, CastOp, Callee, Const, Inst, UnOp, Value};
use crate::types::IrType;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Signature {
    pub params: Vec<IrType>,
    pub ret: IrType,
}

impl Signature {
    pub fn new(params: Vec<IrType>, ret: IrType) -> Self {
        Self { params, ret }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum Linkage {
    /// Visible to the host by name.
    #[default]
    External,
    /// Only reachable from generated code.
    Internal,
}

/// A finished function body.
#[derive(Clone, Debug)]
pub struct Function {
    pub name: String,
    pub sig: Signature,
    pub linkage: Linkage,
    pub body: Vec<Inst>,
    /// Type of every register, indexed by `Value::index`.
    pub value_types: Vec<IrType>,
    /// External symbols this body calls, with the signature it assumed.
    pub externs: IndexMap<String, Signature>,
}

impl Function {
    pub fn param(&self, index: usize) -> Value {
        debug_assert!(index < self.sig.params.len());
        Value::from_raw(index as u32)
    }

    pub fn value_type(&self, value: Value) -> &IrType {
        &self.value_types[value.index()]
    }
}

/// Emits instructions into a single straight-line function body.
///
/// Register types are tracked as instructions are appended so callers only
/// spell out a type where the instruction cannot infer it (loads, allocas,
/// member pointers).
#[derive(Debug)]
pub struct FunctionBuilder {
    func: Function,
    terminated: bool,
}

impl FunctionBuilder {
    pub fn new(name: impl Into<String>, sig: Signature, linkage: Linkage) -> Self {
        let value_types = sig.params.clone();
        Self {
            func: Function {
                name: name.into(),
                sig,
                linkage,
                body: Vec::new(),
                value_types,
                externs: IndexMap::new(),
            },
            terminated: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.func.name
    }

    pub fn signature(&self) -> &Signature {
        &self.func.sig
    }

    pub fn param(&self, index: usize) -> Value {
        self.func.param(index)
    }

    pub fn value_type(&self, value: Value) -> &IrType {
        self.func.value_type(value)
    }

    /// Whether a `ret` has been emitted. Later instructions are dropped.
    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    fn fresh(&mut self, ty: IrType) -> Value {
        let value = Value::from_raw(self.func.value_types.len() as u32);
        self.func.value_types.push(ty);
        value
    }

    fn push(&mut self, inst: Inst) {
        if self.terminated {
            return;
        }
        if inst.is_terminator() {
            self.terminated = true;
        }
        self.func.body.push(inst);
    }

    pub fn constant(&mut self, value: Const) -> Value {
        let dst = self.fresh(value.ir_type());
        self.push(Inst::Const { dst, value });
        dst
    }

    pub fn i32_const(&mut self, value: i32) -> Value {
        self.constant(Const::I32(value))
    }

    pub fn f32_const(&mut self, value: f32) -> Value {
        self.constant(Const::F32(value))
    }

    pub fn alloca(&mut self, ty: IrType) -> Value {
        let dst = self.fresh(IrType::Ptr);
        self.push(Inst::Alloca { dst, ty });
        dst
    }

    pub fn load(&mut self, ty: IrType, ptr: Value) -> Value {
        let dst = self.fresh(ty.clone());
        self.push(Inst::Load { dst, ty, ptr });
        dst
    }

    pub fn store(&mut self, value: Value, ptr: Value) {
        let ty = self.value_type(value).clone();
        self.push(Inst::Store { ty, value, ptr });
    }

    pub fn member_ptr(&mut self, ty: IrType, ptr: Value, index: u32) -> Value {
        debug_assert!(ty.member_type(index).is_some(), "no member {index} in {ty}");
        let dst = self.fresh(IrType::Ptr);
        self.push(Inst::MemberPtr {
            dst,
            ty,
            ptr,
            index,
        });
        dst
    }

    pub fn element_ptr(&mut self, elem: IrType, ptr: Value, index: Value) -> Value {
        let dst = self.fresh(IrType::Ptr);
        self.push(Inst::ElementPtr {
            dst,
            elem,
            ptr,
            index,
        });
        dst
    }

    pub fn extract(&mut self, aggregate: Value, index: u32) -> Value {
        let ty = self
            .value_type(aggregate)
            .member_type(index)
            .unwrap_or(IrType::Void);
        let dst = self.fresh(ty);
        self.push(Inst::Extract {
            dst,
            aggregate,
            index,
        });
        dst
    }

    pub fn insert(&mut self, aggregate: Value, element: Value, index: u32) -> Value {
        let ty = self.value_type(aggregate).clone();
        let dst = self.fresh(ty);
        self.push(Inst::Insert {
            dst,
            aggregate,
            element,
            index,
        });
        dst
    }

    pub fn binary(&mut self, op: BinOp, lhs: Value, rhs: Value) -> Value {
        let ty = if op.is_comparison() {
            IrType::Bool
        } else {
            self.value_type(lhs).clone()
        };
        let dst = self.fresh(ty);
        self.push(Inst::Binary { dst, op, lhs, rhs });
        dst
    }

    pub fn unary(&mut self, op: UnOp, arg: Value) -> Value {
        let ty = self.value_type(arg).clone();
        let dst = self.fresh(ty);
        self.push(Inst::Unary { dst, op, arg });
        dst
    }

    pub fn cast(&mut self, op: CastOp, arg: Value) -> Value {
        let dst = self.fresh(op.result_type());
        self.push(Inst::Cast { dst, op, arg });
        dst
    }

    /// Call a function defined in the same module.
    pub fn call(&mut self, name: impl Into<String>, ret: IrType, args: Vec<Value>) -> Option<Value> {
        self.emit_call(Callee::Direct(name.into()), ret, args)
    }

    /// Call a symbol the host provides, recording the signature it must have.
    pub fn call_extern(&mut self, name: &str, sig: Signature, args: Vec<Value>) -> Option<Value> {
        debug_assert_eq!(sig.params.len(), args.len());
        let ret = sig.ret.clone();
        self.func.externs.insert(name.to_owned(), sig);
        self.emit_call(Callee::Direct(name.to_owned()), ret, args)
    }

    pub fn call_indirect(&mut self, target: Value, ret: IrType, args: Vec<Value>) -> Option<Value> {
        self.emit_call(Callee::Indirect(target), ret, args)
    }

    fn emit_call(&mut self, callee: Callee, ret: IrType, args: Vec<Value>) -> Option<Value> {
        let dst = (!ret.is_void()).then(|| self.fresh(ret));
        self.push(Inst::Call { dst, callee, args });
        dst
    }

    pub fn func_addr(&mut self, name: impl Into<String>) -> Value {
        let dst = self.fresh(IrType::FnPtr);
        self.push(Inst::FuncAddr {
            dst,
            name: name.into(),
        });
        dst
    }

    pub fn global_addr(&mut self, name: impl Into<String>) -> Value {
        let dst = self.fresh(IrType::Ptr);
        self.push(Inst::GlobalAddr {
            dst,
            name: name.into(),
        });
        dst
    }

    pub fn ret(&mut self, value: Option<Value>) {
        self.push(Inst::Return { value });
    }

    /// Finish the body, appending `ret` for void functions that lack one.
    pub fn finish(mut self) -> Function {
        if !self.terminated && self.func.sig.ret.is_void() {
            self.ret(None);
        }
        self.func
    }
}
