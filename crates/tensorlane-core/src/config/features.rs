//! CPU feature detection and kernel configuration.
//!
//! Feature detection runs once per process. [`KernelConfig`] decides which
//! implementations the dispatcher and the microkernel generator hand out; its
//! process-wide default can be tuned through environment variables.

use once_cell::sync::Lazy;
use std::sync::Arc;

/// Environment variable that forces the scalar microkernels when set to `1`.
pub const ENV_DISABLE_SIMD: &str = "TENSORLANE_DISABLE_SIMD";
/// Environment variable that routes every elementwise op to the general path.
pub const ENV_DISABLE_FAST_PATH: &str = "TENSORLANE_DISABLE_FAST_PATH";
/// Environment variable overriding the SGEMM row block.
pub const ENV_GEMM_ROW_BLOCK: &str = "TENSORLANE_GEMM_ROW_BLOCK";
/// Environment variable overriding the SGEMM column block.
pub const ENV_GEMM_COL_BLOCK: &str = "TENSORLANE_GEMM_COL_BLOCK";

/// Instruction-set extensions relevant to the 4-lane kernels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CpuFeatures {
    /// SSE2 (128-bit, the x86_64 baseline)
    pub sse2: bool,
    /// AVX2 (256-bit)
    pub avx2: bool,
    /// FMA (fused multiply-add)
    pub fma: bool,
    /// NEON (ARM 128-bit)
    pub neon: bool,
    /// WebAssembly simd128
    pub simd128: bool,
}

impl CpuFeatures {
    /// Detect CPU features at runtime.
    pub fn detect() -> Self {
        #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
        {
            Self {
                sse2: is_x86_feature_detected!("sse2"),
                avx2: is_x86_feature_detected!("avx2"),
                fma: is_x86_feature_detected!("fma"),
                neon: false,
                simd128: false,
            }
        }

        #[cfg(target_arch = "aarch64")]
        {
            let neon = std::arch::is_aarch64_feature_detected!("neon");
            Self {
                sse2: false,
                avx2: false,
                // NEON has vfma on every aarch64 core
                fma: neon,
                neon,
                simd128: false,
            }
        }

        #[cfg(target_arch = "wasm32")]
        {
            Self {
                sse2: false,
                avx2: false,
                fma: false,
                neon: false,
                simd128: cfg!(target_feature = "simd128"),
            }
        }

        #[cfg(not(any(
            target_arch = "x86",
            target_arch = "x86_64",
            target_arch = "aarch64",
            target_arch = "wasm32"
        )))]
        {
            Self {
                sse2: false,
                avx2: false,
                fma: false,
                neon: false,
                simd128: false,
            }
        }
    }

    /// Whether a native 128-bit vector unit backs the 4-lane kernels.
    pub fn has_simd(&self) -> bool {
        self.sse2 || self.avx2 || self.neon || self.simd128
    }

    /// Short name of the best vector unit, used in logs and kernel names.
    pub fn vector_isa(&self) -> &'static str {
        if self.avx2 {
            "avx2"
        } else if self.sse2 {
            "sse2"
        } else if self.neon {
            "neon"
        } else if self.simd128 {
            "simd128"
        } else {
            "scalar"
        }
    }
}

/// Global CPU features detected at first use.
pub static CPU_FEATURES: Lazy<Arc<CpuFeatures>> = Lazy::new(|| Arc::new(CpuFeatures::detect()));

/// Get the detected CPU features.
pub fn cpu_features() -> &'static CpuFeatures {
    &CPU_FEATURES
}

/// Runtime configuration of the kernel layer.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct KernelConfig {
    /// Hand out vectorized microkernels. When false the generator returns
    /// the scalar reference routine for every descriptor.
    pub simd_enabled: bool,
    /// Let the dispatcher use the lane-blocked fast path. When false every
    /// elementwise op runs through the general executor.
    pub fast_path_enabled: bool,
    /// Row block used by the SGEMM driver (4, 8 or 16).
    pub gemm_row_block: usize,
    /// Column block used by the SGEMM driver (1..=8).
    pub gemm_col_block: usize,
    /// Minimum number of column panels before the parallel driver splits work.
    pub parallel_min_panels: usize,
}

impl Default for KernelConfig {
    fn default() -> Self {
        let features = cpu_features();
        Self {
            simd_enabled: features.has_simd(),
            fast_path_enabled: true,
            gemm_row_block: 8,
            gemm_col_block: 6,
            parallel_min_panels: num_cpus::get().max(2),
        }
    }
}

impl KernelConfig {
    /// Default configuration with environment overrides applied.
    ///
    /// Unparsable values are ignored with a warning.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if env_flag(ENV_DISABLE_SIMD) {
            config.simd_enabled = false;
        }
        if env_flag(ENV_DISABLE_FAST_PATH) {
            config.fast_path_enabled = false;
        }
        if let Some(row_block) = env_usize(ENV_GEMM_ROW_BLOCK) {
            config.gemm_row_block = row_block;
        }
        if let Some(col_block) = env_usize(ENV_GEMM_COL_BLOCK) {
            config.gemm_col_block = col_block;
        }
        config
    }
}

fn env_flag(name: &str) -> bool {
    matches!(
        std::env::var(name).as_deref(),
        Ok("1") | Ok("true") | Ok("TRUE") | Ok("yes")
    )
}

fn env_usize(name: &str) -> Option<usize> {
    let raw = std::env::var(name).ok()?;
    match raw.trim().parse::<usize>() {
        Ok(value) => Some(value),
        Err(_) => {
            log::warn!("ignoring {}={:?}: not an unsigned integer", name, raw);
            None
        }
    }
}

/// Global kernel configuration, read from the environment on first use.
pub static KERNEL_CONFIG: Lazy<Arc<KernelConfig>> = Lazy::new(|| {
    let config = KernelConfig::from_env();
    log::debug!(
        "kernel config: isa={} simd={} fast_path={} gemm_block={}x{}",
        cpu_features().vector_isa(),
        config.simd_enabled,
        config.fast_path_enabled,
        config.gemm_row_block,
        config.gemm_col_block
    );
    Arc::new(config)
});

/// Get the process-wide kernel configuration.
pub fn kernel_config() -> &'static KernelConfig {
    &KERNEL_CONFIG
}

/// Builder for a custom kernel configuration.
pub struct KernelConfigBuilder {
    config: KernelConfig,
}

impl KernelConfigBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self {
            config: KernelConfig::default(),
        }
    }

    /// Enable or disable vectorized microkernels.
    pub fn simd_enabled(mut self, enabled: bool) -> Self {
        self.config.simd_enabled = enabled;
        self
    }

    /// Enable or disable the elementwise fast path.
    pub fn fast_path_enabled(mut self, enabled: bool) -> Self {
        self.config.fast_path_enabled = enabled;
        self
    }

    /// Set the SGEMM block shape.
    pub fn gemm_block(mut self, row_block: usize, col_block: usize) -> Self {
        self.config.gemm_row_block = row_block;
        self.config.gemm_col_block = col_block;
        self
    }

    /// Set the panel count threshold of the parallel SGEMM driver.
    pub fn parallel_min_panels(mut self, panels: usize) -> Self {
        self.config.parallel_min_panels = panels;
        self
    }

    /// Build the configuration.
    pub fn build(self) -> KernelConfig {
        self.config
    }
}

impl Default for KernelConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
