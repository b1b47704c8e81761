//! Low-level IR for the Glint shading language.
//!
//! This crate contains:
//! - IR types with a C-like data layout (`IrType`)
//! - Instructions and constants (`Inst`, `Const`)
//! - A function builder that allocates virtual registers (`FunctionBuilder`)
//! - Modules holding functions, external declarations and globals (`Module`)
//! - The runtime ABI symbol names shared by the compiler and the host (`abi`)
//! - A human-readable dump for debugging and tests (`dump`)

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod abi;
pub mod dump;
mod function;
mod instructions;
mod module;
mod types;

#[cfg(test)]
mod function_tests;
#[cfg(test)]
mod types_tests;

pub use dump::dump;
pub use function::{Function, FunctionBuilder, Linkage, Signature};
pub use instructions::{BinOp, CastOp, Callee, Const, Inst, UnOp, Value};
pub use module::{Checkpoint, Global, Module, ModuleError};
pub use types::IrType;
