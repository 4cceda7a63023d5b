//! Core types for the tensorlane kernel layer.
//!
//! This crate holds everything the kernels share: tensor shapes and broadcast
//! relationships, the lane-blocked memory layout, four-lane SIMD primitives,
//! runtime configuration and the scratch memory of an execution context.
//!
//! # Key Concepts
//!
//! - **Blocked layout**: the channel axis is padded to a multiple of
//!   [`LANE_WIDTH`] and four channels are interleaved per spatial position
//! - **Lane group**: one `f32x4` worth of data, the unit every kernel works on
//! - **Binary operator**: a pluggable two-argument operator over lane groups
//! - **Execution context**: caller-owned scratch arena, borrowed per call
//!
//! # Modules
//!
//! - [`compute`]: lane-group SIMD primitives and binary operators
//! - [`config`]: CPU feature detection and kernel configuration
//! - [`error`]: error type and result alias
//! - [`layout`]: linear <-> blocked layout conversion
//! - [`memory`]: execution context scratch and write-once cache
//! - [`types`]: shapes, data types, broadcast relationships

pub mod compute;
pub mod config;
pub mod error;
pub mod layout;
pub mod memory;
pub mod types;
pub mod utils;

// Re-export commonly used items at the crate root
pub use error::{ErrorCode, KernelError, Result};
pub use types::{
    round_up, up_div, BroadcastType, DataType, PackedGeometry, TensorShape, LANE_WIDTH,
};

/// Prelude module for convenient imports.
///
/// # Example
/// ```
/// use tensorlane_core::prelude::*;
///
/// let shape = TensorShape::new(vec![1, 4, 2, 2]).unwrap();
/// assert_eq!(shape.packed_geometry(4).blocked_len(), 16);
/// ```
pub mod prelude {
    pub use crate::compute::cpu::binary_ops::{BinaryOpKind, BinaryOperator};
    pub use crate::compute::cpu::simd::{Float4, SimdLane};
    pub use crate::config::{cpu_features, kernel_config, KernelConfig, KernelConfigBuilder};
    pub use crate::error::{ErrorCode, KernelError, Result};
    pub use crate::layout::{to_blocked, to_linear};
    pub use crate::memory::{ExecutionContext, ScratchGuard, WriteOnceCache};
    pub use crate::types::{
        BroadcastType, DataType, PackedGeometry, TensorShape, LANE_WIDTH,
    };
}
