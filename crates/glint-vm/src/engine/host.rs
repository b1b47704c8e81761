//! Host half of the distribution ABI.
//!
//! A distribution object lives in a heap parameter block allocated by
//! `alloc_dfunc`. Generated code only ever holds an 8-byte handle to it.
//! Handles are reference counted: `copy_dfunc` retains, `destroy_dfunc`
//! releases, and the last release runs the generated destructor on the block
//! before freeing it.

use std::collections::HashMap;

use glint_ir::IrType;
use glint_ir::abi::{ALLOC_DFUNC, COPY_DFUNC, DESTROY_DFUNC, dfunc_handle_type};

use super::error::RuntimeError;
use super::memory::SegmentKind;
use super::value::Value;
use super::vm::VM;

/// Implementation of an external symbol.
pub type HostFn = fn(&mut VM, &[Value]) -> Result<Value, RuntimeError>;

/// A distribution handle as seen by the host. Zero is the empty handle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DistributionHandle(pub u64);

impl DistributionHandle {
    pub fn from_value(value: &Value) -> Result<Self, RuntimeError> {
        match value {
            Value::Opaque(bytes) if bytes.len() == 8 => {
                let mut raw = [0; 8];
                raw.copy_from_slice(bytes);
                Ok(Self(u64::from_le_bytes(raw)))
            }
            other => Err(RuntimeError::TypeMismatch {
                expected: "distribution handle".to_owned(),
                found: other.kind().to_owned(),
            }),
        }
    }

    pub fn to_value(self) -> Value {
        Value::Opaque(self.0.to_le_bytes().to_vec())
    }

    pub fn is_null(self) -> bool {
        self.0 == 0
    }
}

#[derive(Clone, Copy, Debug)]
pub(crate) struct Distribution {
    pub block: u64,
    pub evaluator: u32,
    pub sampler: u32,
    pub destructor: u32,
    pub refs: u32,
}

/// Result of sampling a distribution.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Sample {
    pub p_in: [f32; 3],
    pub w_in: [f32; 3],
    pub pdf: f32,
}

pub(crate) fn install_builtins(host: &mut HashMap<String, HostFn>) {
    host.insert(ALLOC_DFUNC.to_owned(), alloc_dfunc);
    host.insert(COPY_DFUNC.to_owned(), copy_dfunc);
    host.insert(DESTROY_DFUNC.to_owned(), destroy_dfunc);
}

fn expect_args<'a, const N: usize>(
    name: &str,
    args: &'a [Value],
) -> Result<&'a [Value; N], RuntimeError> {
    args.try_into().map_err(|_| RuntimeError::ArgumentCount {
        function: name.to_owned(),
        expected: N,
        found: args.len(),
    })
}

fn alloc_dfunc(vm: &mut VM, args: &[Value]) -> Result<Value, RuntimeError> {
    let [_scene, size, evaluator, sampler, destructor, out] = expect_args::<6>(ALLOC_DFUNC, args)?;
    let size = u32::try_from(size.as_i32()?).unwrap_or(0);
    let block = vm.memory.alloc(size, SegmentKind::Heap)?;
    let handle = DistributionHandle(vm.next_handle);
    vm.next_handle += 1;
    vm.distributions.insert(
        handle.0,
        Distribution {
            block,
            evaluator: evaluator.as_fn()?,
            sampler: sampler.as_fn()?,
            destructor: destructor.as_fn()?,
            refs: 1,
        },
    );
    vm.memory
        .write(out.as_ptr()?, &dfunc_handle_type(), &handle.to_value())?;
    tracing::debug!(handle = handle.0, size, "distribution allocated");
    Ok(Value::Ptr(block))
}

fn copy_dfunc(vm: &mut VM, args: &[Value]) -> Result<Value, RuntimeError> {
    let [src, dst] = expect_args::<2>(COPY_DFUNC, args)?;
    let value = vm.memory.read(src.as_ptr()?, &dfunc_handle_type())?;
    let handle = DistributionHandle::from_value(&value)?;
    if !handle.is_null() {
        vm.retain(handle)?;
    }
    vm.memory.write(dst.as_ptr()?, &dfunc_handle_type(), &value)?;
    Ok(Value::Void)
}

fn destroy_dfunc(vm: &mut VM, args: &[Value]) -> Result<Value, RuntimeError> {
    let [ptr] = expect_args::<1>(DESTROY_DFUNC, args)?;
    let value = vm.memory.read(ptr.as_ptr()?, &dfunc_handle_type())?;
    vm.release(DistributionHandle::from_value(&value)?)?;
    Ok(Value::Void)
}

impl VM {
    fn distribution(&self, handle: DistributionHandle) -> Result<Distribution, RuntimeError> {
        self.distributions
            .get(&handle.0)
            .copied()
            .ok_or(RuntimeError::InvalidHandle(handle.0))
    }

    pub fn retain(&mut self, handle: DistributionHandle) -> Result<(), RuntimeError> {
        let record = self
            .distributions
            .get_mut(&handle.0)
            .ok_or(RuntimeError::InvalidHandle(handle.0))?;
        record.refs += 1;
        Ok(())
    }

    /// Drop one reference; the last one destroys the parameter block.
    pub fn release(&mut self, handle: DistributionHandle) -> Result<(), RuntimeError> {
        if handle.is_null() {
            return Ok(());
        }
        let record = self
            .distributions
            .get_mut(&handle.0)
            .ok_or(RuntimeError::InvalidHandle(handle.0))?;
        record.refs -= 1;
        if record.refs > 0 {
            return Ok(());
        }
        let record = *record;
        self.distributions.remove(&handle.0);
        self.call_pointer(record.destructor, vec![Value::Ptr(record.block)])?;
        self.memory.free(record.block)?;
        tracing::debug!(handle = handle.0, "distribution destroyed");
        Ok(())
    }

    pub fn live_distributions(&self) -> usize {
        self.distributions.len()
    }

    /// Evaluate the distribution for one pair of incoming and outgoing directions.
    ///
    /// Returns the weighted color and the pdf written by the evaluator.
    pub fn evaluate(
        &mut self,
        handle: DistributionHandle,
        p_in: [f32; 3],
        w_in: [f32; 3],
        p_out: [f32; 3],
        w_out: [f32; 3],
    ) -> Result<([f32; 4], f32), RuntimeError> {
        let record = self.distribution(handle)?;
        let mut scratch = Scratch::default();
        let result = (|| -> Result<([f32; 4], f32), RuntimeError> {
            let mut args = vec![Value::Ptr(record.block)];
            for v in [p_in, w_in, p_out, w_out] {
                args.push(Value::Ptr(scratch.alloc(self, &IrType::Vector(3), &vec_value(&v))?));
            }
            let pdf = scratch.alloc(self, &IrType::F32, &Value::F32(0.0))?;
            let out = scratch.alloc(self, &IrType::Vector(4), &Value::zero(&IrType::Vector(4)))?;
            args.extend([Value::Ptr(pdf), Value::Ptr(out)]);
            self.call_pointer(record.evaluator, args)?;

            let color = lanes::<4>(&self.memory.read(out, &IrType::Vector(4))?)?;
            let pdf = self.memory.read(pdf, &IrType::F32)?.as_f32()?;
            Ok((color, pdf))
        })();
        scratch.release(self)?;
        result
    }

    /// Draw an incoming direction for the given outgoing one.
    pub fn sample(
        &mut self,
        handle: DistributionHandle,
        p_out: [f32; 3],
        w_out: [f32; 3],
        rand_p: [f32; 2],
        rand_w: [f32; 2],
    ) -> Result<Sample, RuntimeError> {
        let record = self.distribution(handle)?;
        let mut scratch = Scratch::default();
        let result = (|| -> Result<Sample, RuntimeError> {
            let vec3 = IrType::Vector(3);
            let vec2 = IrType::Vector(2);
            let p_out = scratch.alloc(self, &vec3, &vec_value(&p_out))?;
            let w_out = scratch.alloc(self, &vec3, &vec_value(&w_out))?;
            let rand_p = scratch.alloc(self, &vec2, &vec_value(&rand_p))?;
            let rand_w = scratch.alloc(self, &vec2, &vec_value(&rand_w))?;
            let p_in = scratch.alloc(self, &vec3, &Value::zero(&vec3))?;
            let w_in = scratch.alloc(self, &vec3, &Value::zero(&vec3))?;
            let args = [record.block, p_out, w_out, rand_p, rand_w, p_in, w_in]
                .into_iter()
                .map(Value::Ptr)
                .collect();
            let pdf = self.call_pointer(record.sampler, args)?.as_f32()?;

            Ok(Sample {
                p_in: lanes::<3>(&self.memory.read(p_in, &vec3)?)?,
                w_in: lanes::<3>(&self.memory.read(w_in, &vec3)?)?,
                pdf,
            })
        })();
        scratch.release(self)?;
        result
    }
}

/// Temporary host allocations freed together.
#[derive(Default)]
struct Scratch(Vec<u64>);

impl Scratch {
    fn alloc(&mut self, vm: &mut VM, ty: &IrType, value: &Value) -> Result<u64, RuntimeError> {
        let ptr = vm.memory.alloc(ty.size(), SegmentKind::Stack)?;
        self.0.push(ptr);
        vm.memory.write(ptr, ty, value)?;
        Ok(ptr)
    }

    fn release(self, vm: &mut VM) -> Result<(), RuntimeError> {
        self.0.into_iter().try_for_each(|ptr| vm.memory.free(ptr))
    }
}

fn vec_value(lanes: &[f32]) -> Value {
    Value::Vector(lanes.to_vec())
}

fn lanes<const N: usize>(value: &Value) -> Result<[f32; N], RuntimeError> {
    value
        .as_lanes()?
        .try_into()
        .map_err(|_| RuntimeError::TypeMismatch {
            expected: format!("vec{N}"),
            found: value.kind().to_owned(),
        })
}
