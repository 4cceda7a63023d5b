//! Tensorlane - SIMD-blocked broadcast kernels and SGEMM microkernels.
//!
//! This crate re-exports [`tensorlane_core`] and [`tensorlane_kernels`]
//! behind a single prelude.
//!
//! ```rust
//! use tensorlane::prelude::*;
//!
//! let routine = KernelDispatcher::global()
//!     .microkernel(&MicrokernelDescriptor::new(4, 2))
//!     .unwrap();
//! let a = [1.0, 2.0, 3.0, 4.0];
//! let b = [1.0, -1.0];
//! let mut c = [0.0; 8];
//! routine
//!     .invoke(1, &a, 4, &b, 2, &mut c, 4, None, 0, Activation::Relu.as_raw())
//!     .unwrap();
//! assert_eq!(c, [1.0, 2.0, 3.0, 4.0, 0.0, 0.0, 0.0, 0.0]);
//! ```

pub use tensorlane_core;
pub use tensorlane_kernels;

// Re-export the SIMD vector crate used by the lane primitives
pub use wide;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use tensorlane_core::prelude::*;
    pub use tensorlane_core::layout;
    pub use tensorlane_kernels::{
        Activation, BinaryLayer, ElementResource, ExecutionPath, GemmEpilogue,
        GeneratedRoutine, KernelCache, KernelDispatcher, LayerParams, LayerResource, MatRef,
        MicrokernelDescriptor, PackedTensor, PackedTensorMut, Sgemm,
    };
    pub use tensorlane_kernels::layer::{MultidirBroadcastParams, ResourceData};
}
