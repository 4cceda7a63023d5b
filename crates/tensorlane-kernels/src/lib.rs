//! Tensorlane Kernels - broadcast elementwise executors and SGEMM microkernels.
//!
//! This crate provides the compute kernels of the tensorlane layer, working
//! on tensors stored in the lane-blocked layout of `tensorlane-core`.
//!
//! # Components
//!
//! - **Broadcast classifier**: names the relationship between operand shapes
//! - **Fast executor**: lane-blocked kernels for Normal, Element, Channel,
//!   HeightWidth, Width and Single relationships
//! - **General executor**: linear fallback for any broadcast-compatible shapes
//! - **Microkernels**: one specialized SGEMM tile routine per descriptor,
//!   generated on first request and cached
//! - **SGEMM driver**: blocked column-major matrix multiply over a routine
//! - **Binary layer**: operator + parameters + constant operand
//!
//! # Examples
//!
//! ```rust
//! use tensorlane_kernels::{ExecutionPath, KernelDispatcher, PackedTensor, PackedTensorMut};
//! use tensorlane_core::compute::cpu::binary_ops::Add;
//! use tensorlane_core::memory::ExecutionContext;
//! use tensorlane_core::{layout, TensorShape};
//!
//! let out_shape = TensorShape::new(vec![1, 4, 2, 2]).unwrap();
//! let bias_shape = TensorShape::new(vec![1, 4, 1, 1]).unwrap();
//! let a = layout::pack(&[1.0; 16], out_shape.packed_geometry(4)).unwrap();
//! let b = layout::pack(&[1.0, 2.0, 3.0, 4.0], bias_shape.packed_geometry(4)).unwrap();
//! let mut out = vec![0.0; 16];
//!
//! let path = KernelDispatcher::global()
//!     .binary(
//!         &Add,
//!         &[PackedTensor::new(&a, &out_shape), PackedTensor::new(&b, &bias_shape)],
//!         PackedTensorMut::new(&mut out, &out_shape),
//!         &ExecutionContext::new(),
//!     )
//!     .unwrap();
//! assert!(matches!(path, ExecutionPath::Fast | ExecutionPath::General));
//! ```

pub mod broadcast;
pub mod dispatch;
pub mod gemm;
pub mod layer;
pub mod microkernel;
pub mod tensor;

// Re-export main entry points for convenience
pub use broadcast::{
    broadcast_init, classify, BroadcastExecutor, BroadcastPlan, GeneralBroadcastExecutor,
};
pub use dispatch::{ExecutionPath, KernelDispatcher};
pub use gemm::{sgemm, GemmEpilogue, MatRef, Sgemm};
#[cfg(feature = "parallel")]
pub use gemm::par_sgemm;
pub use layer::{BinaryLayer, ElementResource, LayerParams, LayerResource};
pub use microkernel::{
    global_kernel_cache, Activation, GeneratedRoutine, KernelCache, MicrokernelDescriptor,
    MicrokernelGenerator,
};
pub use tensor::{PackedTensor, PackedTensorMut};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exports() {
        let _desc = MicrokernelDescriptor::new(8, 6);
        let _epilogue = GemmEpilogue::default();
        let _act = Activation::Relu6;
        let _path = ExecutionPath::General;
    }
}
