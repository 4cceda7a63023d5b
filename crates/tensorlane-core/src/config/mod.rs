//! Configuration of the kernel layer.

pub mod features;

// Re-export key items
pub use features::{
    cpu_features, kernel_config, CpuFeatures, KernelConfig, KernelConfigBuilder,
};
