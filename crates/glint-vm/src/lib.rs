//! Reference host runtime for Glint IR modules.
//!
//! This crate interprets the modules produced by the compiler and provides the
//! host half of the distribution ABI: allocation, copying and destruction of
//! distribution objects, plus binding of the scene global.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod engine;

pub use engine::{
    DistributionHandle, HostFn, Limits, RuntimeError, Sample, SegmentKind, VM, VMBuilder, Value,
};
