//! Interpreter for IR modules.

use std::collections::HashMap;
use std::rc::Rc;

use indexmap::{IndexMap, IndexSet};

use glint_ir::{Callee, Function, Inst, IrType, Module};

use super::error::RuntimeError;
use super::frame::Frame;
use super::host::{self, Distribution, HostFn};
use super::memory::{Memory, SegmentKind};
use super::ops;
use super::value::Value;

/// Runtime limits for module execution.
#[derive(Clone, Copy, Debug)]
pub struct Limits {
    /// Maximum nesting of calls (default: 256).
    pub(crate) max_call_depth: u32,
    /// Maximum bytes live at once across stack, heap and globals (default: 64 MiB).
    pub(crate) max_memory: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_call_depth: 256,
            max_memory: 64 << 20,
        }
    }
}

impl Limits {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_call_depth(mut self, depth: u32) -> Self {
        self.max_call_depth = depth;
        self
    }

    pub fn max_memory(mut self, bytes: usize) -> Self {
        self.max_memory = bytes;
        self
    }

    pub fn get_max_call_depth(&self) -> u32 {
        self.max_call_depth
    }

    pub fn get_max_memory(&self) -> usize {
        self.max_memory
    }
}

#[derive(Debug)]
struct GlobalSlot {
    ptr: u64,
    ty: IrType,
    bound: bool,
}

/// Executes the functions of one module.
///
/// External symbols resolve to host functions. The distribution ABI symbols
/// are always available; others are registered through [`VMBuilder`].
pub struct VM {
    functions: IndexMap<String, Rc<Function>>,
    /// Every addressable symbol; a function pointer is its index plus one.
    symbols: IndexSet<String>,
    host: HashMap<String, HostFn>,
    globals: HashMap<String, GlobalSlot>,
    pub(crate) memory: Memory,
    pub(crate) distributions: HashMap<u64, Distribution>,
    pub(crate) next_handle: u64,
    depth: u32,
    limits: Limits,
}

/// Builder for VM instances.
pub struct VMBuilder {
    module: Module,
    limits: Limits,
    host: HashMap<String, HostFn>,
}

impl VMBuilder {
    pub fn new(module: Module) -> Self {
        let mut host = HashMap::new();
        host::install_builtins(&mut host);
        Self {
            module,
            limits: Limits::default(),
            host,
        }
    }

    pub fn limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    pub fn max_call_depth(mut self, depth: u32) -> Self {
        self.limits = self.limits.max_call_depth(depth);
        self
    }

    pub fn max_memory(mut self, bytes: usize) -> Self {
        self.limits = self.limits.max_memory(bytes);
        self
    }

    /// Provide the implementation of an external symbol.
    pub fn host_function(mut self, name: impl Into<String>, function: HostFn) -> Self {
        self.host.insert(name.into(), function);
        self
    }

    /// Verify the module, resolve its externals and lay out its globals.
    pub fn build(self) -> Result<VM, RuntimeError> {
        self.module.verify()?;

        let mut symbols = IndexSet::new();
        let mut functions = IndexMap::new();
        for function in self.module.functions() {
            symbols.insert(function.name.clone());
            functions.insert(function.name.clone(), Rc::new(function.clone()));
        }
        for (name, _) in self.module.externs() {
            if !self.host.contains_key(name) {
                return Err(RuntimeError::UnresolvedSymbol(name.to_owned()));
            }
            symbols.insert(name.to_owned());
        }

        let mut memory = Memory::new(self.limits.max_memory);
        let mut globals = HashMap::new();
        for (name, global) in self.module.globals() {
            let ptr = memory.alloc(global.ty.size(), SegmentKind::Global)?;
            if let Some(init) = &global.init {
                memory.write(ptr, &global.ty, &Value::from_const(init))?;
            }
            globals.insert(
                name.to_owned(),
                GlobalSlot {
                    ptr,
                    ty: global.ty.clone(),
                    bound: global.init.is_some(),
                },
            );
        }

        Ok(VM {
            functions,
            symbols,
            host: self.host,
            globals,
            memory,
            distributions: HashMap::new(),
            next_handle: 1,
            depth: 0,
            limits: self.limits,
        })
    }
}

impl VM {
    pub fn builder(module: Module) -> VMBuilder {
        VMBuilder::new(module)
    }

    /// Bind a global the module declared, typically the scene pointer.
    pub fn map_global(&mut self, name: &str, value: Value) -> Result<(), RuntimeError> {
        let slot = self
            .globals
            .get_mut(name)
            .ok_or_else(|| RuntimeError::UnknownGlobal(name.to_owned()))?;
        self.memory.write(slot.ptr, &slot.ty, &value)?;
        slot.bound = true;
        Ok(())
    }

    /// Call a module function by name.
    pub fn call(&mut self, name: &str, args: Vec<Value>) -> Result<Value, RuntimeError> {
        let function = self
            .functions
            .get(name)
            .cloned()
            .ok_or_else(|| RuntimeError::UnknownFunction(name.to_owned()))?;
        self.invoke(&function, args)
    }

    /// Allocate heap memory holding `value`; the host owns the result.
    pub fn alloc_value(&mut self, ty: &IrType, value: &Value) -> Result<u64, RuntimeError> {
        let ptr = self.memory.alloc(ty.size(), SegmentKind::Heap)?;
        self.memory.write(ptr, ty, value)?;
        Ok(ptr)
    }

    pub fn read(&self, ptr: u64, ty: &IrType) -> Result<Value, RuntimeError> {
        self.memory.read(ptr, ty)
    }

    pub fn write(&mut self, ptr: u64, ty: &IrType, value: &Value) -> Result<(), RuntimeError> {
        self.memory.write(ptr, ty, value)
    }

    pub fn free(&mut self, ptr: u64) -> Result<(), RuntimeError> {
        self.memory.free(ptr)
    }

    /// Heap blocks not yet freed, including distribution parameter blocks.
    pub fn live_heap_blocks(&self) -> usize {
        self.memory.live_segments(SegmentKind::Heap)
    }

    pub fn live_stack_slots(&self) -> usize {
        self.memory.live_segments(SegmentKind::Stack)
    }

    pub fn live_bytes(&self) -> usize {
        self.memory.live_bytes()
    }

    pub fn symbol_id(&self, name: &str) -> Result<u32, RuntimeError> {
        self.symbols
            .get_index_of(name)
            .map(|index| index as u32 + 1)
            .ok_or_else(|| RuntimeError::UnknownFunction(name.to_owned()))
    }

    pub(crate) fn call_pointer(&mut self, id: u32, args: Vec<Value>) -> Result<Value, RuntimeError> {
        if id == 0 {
            return Err(RuntimeError::InvalidAddress(0));
        }
        let name = self
            .symbols
            .get_index((id - 1) as usize)
            .cloned()
            .ok_or_else(|| RuntimeError::UnknownFunction(format!("#{id}")))?;
        self.call_symbol(&name, args)
    }

    fn call_symbol(&mut self, name: &str, args: Vec<Value>) -> Result<Value, RuntimeError> {
        if let Some(function) = self.functions.get(name).cloned() {
            return self.invoke(&function, args);
        }
        let host = *self
            .host
            .get(name)
            .ok_or_else(|| RuntimeError::UnresolvedSymbol(name.to_owned()))?;
        tracing::trace!(symbol = name, "host call");
        host(self, &args)
    }

    fn invoke(&mut self, function: &Rc<Function>, args: Vec<Value>) -> Result<Value, RuntimeError> {
        if args.len() != function.sig.params.len() {
            return Err(RuntimeError::ArgumentCount {
                function: function.name.clone(),
                expected: function.sig.params.len(),
                found: args.len(),
            });
        }
        if self.depth >= self.limits.max_call_depth {
            return Err(RuntimeError::CallDepthExceeded(self.limits.max_call_depth));
        }

        tracing::trace!(function = %function.name, depth = self.depth, "call");
        self.depth += 1;
        let mut frame = Frame::new(function.value_types.len(), args);
        let result = self.run(function, &mut frame);
        self.depth -= 1;

        let released = frame
            .into_allocas()
            .into_iter()
            .try_for_each(|ptr| self.memory.free(ptr));
        let value = result?;
        released?;
        Ok(value)
    }

    fn run(&mut self, function: &Function, frame: &mut Frame) -> Result<Value, RuntimeError> {
        for inst in &function.body {
            match inst {
                Inst::Const { dst, value } => frame.set(*dst, Value::from_const(value)),
                Inst::Alloca { dst, ty } => {
                    let ptr = self.memory.alloc(ty.size(), SegmentKind::Stack)?;
                    frame.track_alloca(ptr);
                    frame.set(*dst, Value::Ptr(ptr));
                }
                Inst::Load { dst, ty, ptr } => {
                    let value = self.memory.read(frame.get(*ptr).as_ptr()?, ty)?;
                    frame.set(*dst, value);
                }
                Inst::Store { ty, value, ptr } => {
                    let ptr = frame.get(*ptr).as_ptr()?;
                    self.memory.write(ptr, ty, frame.get(*value))?;
                }
                Inst::MemberPtr {
                    dst,
                    ty,
                    ptr,
                    index,
                } => {
                    let base = frame.get(*ptr).as_ptr()?;
                    let offset = ty
                        .member_offset(*index)
                        .ok_or(RuntimeError::InvalidAddress(base))?;
                    frame.set(*dst, Value::Ptr(Memory::offset(base, i64::from(offset))?));
                }
                Inst::ElementPtr {
                    dst,
                    elem,
                    ptr,
                    index,
                } => {
                    let base = frame.get(*ptr).as_ptr()?;
                    let index = frame.get(*index).as_i32()?;
                    let delta = i64::from(index) * i64::from(elem.stride());
                    frame.set(*dst, Value::Ptr(Memory::offset(base, delta)?));
                }
                Inst::Extract {
                    dst,
                    aggregate,
                    index,
                } => {
                    let value = ops::extract(frame.get(*aggregate), *index)?;
                    frame.set(*dst, value);
                }
                Inst::Insert {
                    dst,
                    aggregate,
                    element,
                    index,
                } => {
                    let element = frame.get(*element).clone();
                    let value = ops::insert(frame.get(*aggregate), element, *index)?;
                    frame.set(*dst, value);
                }
                Inst::Binary { dst, op, lhs, rhs } => {
                    let value = ops::binary(*op, frame.get(*lhs), frame.get(*rhs))?;
                    frame.set(*dst, value);
                }
                Inst::Unary { dst, op, arg } => {
                    let value = ops::unary(*op, frame.get(*arg))?;
                    frame.set(*dst, value);
                }
                Inst::Cast { dst, op, arg } => {
                    let value = ops::cast(*op, frame.get(*arg))?;
                    frame.set(*dst, value);
                }
                Inst::Call { dst, callee, args } => {
                    let args = args.iter().map(|arg| frame.get(*arg).clone()).collect();
                    let result = match callee {
                        Callee::Direct(name) => self.call_symbol(name, args)?,
                        Callee::Indirect(target) => {
                            let id = frame.get(*target).as_fn()?;
                            self.call_pointer(id, args)?
                        }
                    };
                    if let Some(dst) = dst {
                        frame.set(*dst, result);
                    }
                }
                Inst::FuncAddr { dst, name } => {
                    frame.set(*dst, Value::FnPtr(self.symbol_id(name)?));
                }
                Inst::GlobalAddr { dst, name } => {
                    let slot = self
                        .globals
                        .get(name)
                        .ok_or_else(|| RuntimeError::UnknownGlobal(name.clone()))?;
                    if !slot.bound {
                        return Err(RuntimeError::UnboundGlobal(name.clone()));
                    }
                    frame.set(*dst, Value::Ptr(slot.ptr));
                }
                Inst::Return { value } => {
                    return Ok(value.map_or(Value::Void, |value| frame.take(value)));
                }
            }
        }
        Ok(Value::Void)
    }
}
