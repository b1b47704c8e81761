//! Activation records.

use glint_ir::Value as Register;

use super::value::Value;

/// Registers and stack allocations of one function invocation.
#[derive(Debug)]
pub struct Frame {
    registers: Vec<Value>,
    /// Stack segments to release when the frame is popped.
    allocas: Vec<u64>,
}

impl Frame {
    pub fn new(register_count: usize, args: Vec<Value>) -> Self {
        let mut registers = args;
        registers.resize(register_count.max(registers.len()), Value::Void);
        Self {
            registers,
            allocas: Vec::new(),
        }
    }

    #[inline]
    pub fn get(&self, register: Register) -> &Value {
        &self.registers[register.index()]
    }

    #[inline]
    pub fn set(&mut self, register: Register, value: Value) {
        self.registers[register.index()] = value;
    }

    pub fn take(&mut self, register: Register) -> Value {
        std::mem::replace(&mut self.registers[register.index()], Value::Void)
    }

    pub fn track_alloca(&mut self, ptr: u64) {
        self.allocas.push(ptr);
    }

    pub fn into_allocas(self) -> Vec<u64> {
        self.allocas
    }
}
