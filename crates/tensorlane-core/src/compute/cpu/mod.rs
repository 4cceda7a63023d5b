//! CPU lane-group primitives.

pub mod binary_ops;
pub mod simd;

// Re-export all CPU operations
pub use binary_ops::*;
pub use simd::*;
