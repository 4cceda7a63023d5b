//! Computational primitives shared by the kernels.

pub mod cpu;

// Re-export CPU operations
pub use cpu::*;
