//! Runtime ABI shared between generated code and the host.
//!
//! Generated code never defines these symbols. It only emits calls to them
//! (or reads the scene global), and the host binds matching implementations
//! before running any generated constructor.

use crate::types::IrType;
use crate::Signature;

/// Global holding the current scene pointer.
pub const SCENE_GLOBAL: &str = ".__gd_scene";

/// `alloc_dfunc(scene, param_block_size, evaluator, sampler, destructor, out_handle) -> param_block`
pub const ALLOC_DFUNC: &str = "gd_builtin_alloc_dfunc";

/// `copy_dfunc(src_handle_ptr, dst_handle_ptr)`
pub const COPY_DFUNC: &str = "gd_builtin_copy_dfunc";

/// `destroy_dfunc(handle_ptr)`
pub const DESTROY_DFUNC: &str = "gd_builtin_destroy_dfunc";

/// Size of a distribution handle as stored in generated code.
pub const DFUNC_HANDLE_SIZE: u32 = 8;

/// Byte size of the opaque ray blob.
pub const RAY_SIZE: u32 = 32;

/// Byte size of the opaque intersection blob.
pub const ISECT_SIZE: u32 = 64;

/// IR type of a distribution handle.
pub fn dfunc_handle_type() -> IrType {
    IrType::Opaque {
        size: DFUNC_HANDLE_SIZE,
        align: 8,
    }
}

pub fn alloc_dfunc_signature() -> Signature {
    Signature::new(
        vec![
            IrType::Ptr,
            IrType::I32,
            IrType::FnPtr,
            IrType::FnPtr,
            IrType::FnPtr,
            IrType::Ptr,
        ],
        IrType::Ptr,
    )
}

pub fn copy_dfunc_signature() -> Signature {
    Signature::new(vec![IrType::Ptr, IrType::Ptr], IrType::Void)
}

pub fn destroy_dfunc_signature() -> Signature {
    Signature::new(vec![IrType::Ptr], IrType::Void)
}

/// Evaluator wrapper: `(ctx, P_in*, w_in*, P_out*, w_out*, out pdf*, out result*) -> void`.
pub fn evaluator_signature() -> Signature {
    Signature::new(vec![IrType::Ptr; 7], IrType::Void)
}

/// Sampler wrapper: `(ctx, P_out*, w_out*, rand_P*, rand_w*, out P_in*, out w_in*) -> float`.
pub fn sampler_signature() -> Signature {
    Signature::new(vec![IrType::Ptr; 7], IrType::F32)
}

/// Destructor: `(param_block*) -> void`.
pub fn destructor_signature() -> Signature {
    Signature::new(vec![IrType::Ptr], IrType::Void)
}
