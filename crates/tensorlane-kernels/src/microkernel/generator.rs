//! Routine generation for microkernel descriptors.
//!
//! A routine is bound to exactly one descriptor. Generation selects the tile
//! body instantiated for the descriptor's block sizes: the vectorized body
//! when SIMD is enabled, otherwise the scalar body with the same contract.

use super::descriptor::{Activation, MicrokernelDescriptor};
use super::routines::{self, RoutineFn, TileArgs};
use std::fmt;
use tensorlane_core::config::KernelConfig;
use tensorlane_core::{KernelError, Result};

/// An executable SGEMM tile routine.
///
/// Routines are immutable once generated and may be invoked from any number
/// of threads at once.
pub struct GeneratedRoutine {
    descriptor: MicrokernelDescriptor,
    name: String,
    vectorized: bool,
    body: RoutineFn,
}

impl GeneratedRoutine {
    /// The descriptor this routine implements.
    pub fn descriptor(&self) -> MicrokernelDescriptor {
        self.descriptor
    }

    /// Symbol-style name, e.g. `sgemm_f32x4_8x6`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the vectorized body was selected.
    pub fn is_vectorized(&self) -> bool {
        self.vectorized
    }

    /// Compute one `row_block x col_block` tile of `act(A * B + bias)`.
    ///
    /// `src_a` is a packed panel of `row_block` values per k step and
    /// `src_b` one of `col_block` values per k step. Both advance by their
    /// block size; `lda` and `ldb` only describe the caller's matrices.
    /// Column `j` of the tile is stored at `dst[j * ldc..][..row_block]`. With `first != 0`
    /// the accumulators start from `dst` and the bias is ignored.
    #[allow(clippy::too_many_arguments)]
    pub fn invoke(
        &self,
        k: usize,
        src_a: &[f32],
        lda: usize,
        src_b: &[f32],
        ldb: usize,
        dst: &mut [f32],
        ldc: usize,
        bias: Option<&[f32]>,
        first: i32,
        activation: i32,
    ) -> Result<()> {
        let args = TileArgs {
            k,
            src_a,
            lda,
            src_b,
            ldb,
            bias,
            first,
            activation,
        };
        self.run(&args, dst, ldc)
    }

    /// [`invoke`](Self::invoke) with the inputs bundled.
    pub fn run(&self, args: &TileArgs<'_>, dst: &mut [f32], ldc: usize) -> Result<()> {
        self.check(args, dst.len(), ldc)?;
        (self.body)(args, dst, ldc);
        Ok(())
    }

    fn check(&self, args: &TileArgs<'_>, dst_len: usize, ldc: usize) -> Result<()> {
        let rows = self.descriptor.row_block();
        let cols = self.descriptor.col_block();

        Activation::from_raw(args.activation)?;
        if ldc < rows {
            return Err(KernelError::param_error(format!(
                "ldc {} is smaller than the row block {}",
                ldc, rows
            )));
        }
        KernelError::check_len("src_a", span(args.k, rows, "src_a")?, args.src_a.len())?;
        KernelError::check_len("src_b", span(args.k, cols, "src_b")?, args.src_b.len())?;
        if let Some(bias) = args.bias {
            KernelError::check_len("bias", cols, bias.len())?;
        }
        let dst_span = (cols - 1)
            .checked_mul(ldc)
            .and_then(|n| n.checked_add(rows))
            .ok_or_else(|| KernelError::param_error(format!("ldc {} overflows the tile", ldc)))?;
        KernelError::check_len("dst", dst_span, dst_len)
    }
}

/// Elements of a packed panel holding `k` steps of `block` values.
fn span(k: usize, block: usize, name: &str) -> Result<usize> {
    k.checked_mul(block)
        .ok_or_else(|| KernelError::param_error(format!("{} panel of depth {} overflows", name, k)))
}

impl fmt::Debug for GeneratedRoutine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeneratedRoutine")
            .field("descriptor", &self.descriptor)
            .field("name", &self.name)
            .field("vectorized", &self.vectorized)
            .finish()
    }
}

/// Produces routines for descriptors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MicrokernelGenerator {
    simd_enabled: bool,
}

impl MicrokernelGenerator {
    /// Generator handing out vectorized routines when `simd_enabled`.
    pub fn new(simd_enabled: bool) -> Self {
        Self { simd_enabled }
    }

    /// Generator following a kernel configuration.
    pub fn from_config(config: &KernelConfig) -> Self {
        Self::new(config.simd_enabled)
    }

    /// Whether vectorized routines are produced.
    pub fn simd_enabled(&self) -> bool {
        self.simd_enabled
    }

    /// Build the routine for `descriptor`.
    pub fn generate(&self, descriptor: &MicrokernelDescriptor) -> Result<GeneratedRoutine> {
        if let Err(err) = descriptor.validate() {
            log::warn!("rejecting microkernel request {}: {}", descriptor, err);
            return Err(err);
        }
        let (row_block, col_block) = (descriptor.row_block(), descriptor.col_block());
        let (vector_body, scalar_body) = routines::lookup(row_block, col_block).ok_or_else(|| {
            KernelError::unsupported_configuration(format!("no routine for {}", descriptor))
        })?;

        let (body, name) = if self.simd_enabled {
            (vector_body, format!("sgemm_f32x4_{}x{}", row_block, col_block))
        } else {
            (scalar_body, format!("sgemm_f32x4_{}x{}_ref", row_block, col_block))
        };
        log::info!("generated microkernel {}", name);

        Ok(GeneratedRoutine {
            descriptor: *descriptor,
            name,
            vectorized: self.simd_enabled,
            body,
        })
    }
}

impl Default for MicrokernelGenerator {
    fn default() -> Self {
        Self::from_config(tensorlane_core::config::kernel_config())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_generate_names() {
        let desc = MicrokernelDescriptor::new(8, 6);
        let routine = MicrokernelGenerator::new(true).generate(&desc).unwrap();
        assert_eq!(routine.name(), "sgemm_f32x4_8x6");
        assert!(routine.is_vectorized());
        assert_eq!(routine.descriptor(), desc);

        let routine = MicrokernelGenerator::new(false).generate(&desc).unwrap();
        assert_eq!(routine.name(), "sgemm_f32x4_8x6_ref");
        assert!(!routine.is_vectorized());
    }

    #[test]
    fn test_generate_rejects_unsupported() {
        let gen = MicrokernelGenerator::new(true);
        assert!(matches!(
            gen.generate(&MicrokernelDescriptor::new(6, 2)),
            Err(KernelError::UnsupportedConfiguration { .. })
        ));
        assert!(matches!(
            gen.generate(&MicrokernelDescriptor::with_element_bytes(4, 2, 8)),
            Err(KernelError::UnsupportedDataType { .. })
        ));
    }

    #[test]
    fn test_invoke_validates_bounds() {
        let routine = MicrokernelGenerator::new(true)
            .generate(&MicrokernelDescriptor::new(4, 2))
            .unwrap();
        let a = [1.0; 8];
        let b = [1.0; 4];
        let mut dst = [0.0; 8];

        assert!(routine.invoke(2, &a, 4, &b, 2, &mut dst, 4, None, 0, 0).is_ok());
        assert_eq!(dst, [2.0; 8]);

        let err = routine.invoke(3, &a, 4, &b, 2, &mut dst, 4, None, 0, 0).unwrap_err();
        assert!(matches!(err, KernelError::BufferTooSmall { name: "src_a", .. }));

        let err = routine.invoke(2, &a, 4, &b[..3], 2, &mut dst, 4, None, 0, 0).unwrap_err();
        assert!(matches!(err, KernelError::BufferTooSmall { name: "src_b", .. }));

        let err = routine.invoke(2, &a, 4, &b, 2, &mut dst, 2, None, 0, 0).unwrap_err();
        assert!(matches!(err, KernelError::ParamError { .. }));

        let err = routine.invoke(usize::MAX, &a, 4, &b, 2, &mut dst, 4, None, 0, 0).unwrap_err();
        assert!(matches!(err, KernelError::ParamError { .. }));

        let err = routine.invoke(2, &a, 4, &b, 2, &mut dst[..6], 4, None, 0, 0).unwrap_err();
        assert!(matches!(err, KernelError::BufferTooSmall { name: "dst", .. }));

        let err = routine.invoke(2, &a, 4, &b, 2, &mut dst, 4, Some(&[1.0]), 0, 0).unwrap_err();
        assert!(matches!(err, KernelError::BufferTooSmall { name: "bias", .. }));

        let err = routine.invoke(2, &a, 4, &b, 2, &mut dst, 4, None, 0, 7).unwrap_err();
        assert!(matches!(err, KernelError::ParamError { .. }));
    }

    #[test]
    fn test_packed_panel_with_wider_leading_dimension() {
        let routine = MicrokernelGenerator::new(true)
            .generate(&MicrokernelDescriptor::new(4, 1))
            .unwrap();
        let a = [1.0, 1.0, 1.0, 1.0, 2.0, 2.0, 2.0, 2.0];
        let mut dst = [0.0; 4];
        routine
            .invoke(2, &a, 8, &[1.0, 1.0], 1, &mut dst, 4, None, 0, 0)
            .unwrap();
        assert_eq!(dst, [3.0; 4]);
    }

    #[test]
    fn test_zero_depth_applies_bias_only() {
        let routine = MicrokernelGenerator::new(true)
            .generate(&MicrokernelDescriptor::new(4, 1))
            .unwrap();
        let mut dst = [0.0; 4];
        routine
            .invoke(0, &[], 4, &[], 1, &mut dst, 4, Some(&[-2.0]), 0, 1)
            .unwrap();
        assert_eq!(dst, [0.0; 4]);
    }
}
