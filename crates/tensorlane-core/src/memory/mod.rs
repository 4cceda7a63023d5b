//! Memory management for kernel calls.

pub mod cache;
pub mod workspace;

// Re-export key items
pub use cache::{CacheStats, WriteOnceCache};
pub use workspace::{ExecutionContext, ScratchGuard};
