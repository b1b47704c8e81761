//! Interpreter, memory model and host functions.

mod error;
mod frame;
mod host;
mod memory;
mod ops;
mod value;
mod vm;


pub use error::RuntimeError;
pub use host::{DistributionHandle, HostFn, Sample};
pub use memory::SegmentKind;
pub use value::Value;
pub use vm::{Limits, VM, VMBuilder};
