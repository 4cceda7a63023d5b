//! Blocked single-precision matrix multiply on top of the microkernels.
//!
//! Computes `C = act(A * B + bias)` (or `C = act(C + A * B)` when
//! accumulating) for column-major matrices. A is packed into panels of
//! `row_block` rows and B into panels of `col_block` columns, the contiguous
//! layout the routine steps through. Full tiles are written straight into
//! C; edge tiles go through a temporary tile.

use crate::microkernel::{
    Activation, GeneratedRoutine, KernelCache, MicrokernelDescriptor, MAX_COL_BLOCK,
};
use std::sync::Arc;
use tensorlane_core::config::KernelConfig;
use tensorlane_core::{up_div, KernelError, Result};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

const MAX_TILE: usize = 16 * MAX_COL_BLOCK;

/// A column-major matrix operand.
#[derive(Debug, Clone, Copy)]
pub struct MatRef<'a> {
    /// Elements, column `j` starting at `j * ld`
    pub data: &'a [f32],
    /// Leading dimension
    pub ld: usize,
}

impl<'a> MatRef<'a> {
    /// Wrap a column-major buffer.
    pub fn new(data: &'a [f32], ld: usize) -> Self {
        Self { data, ld }
    }
}

/// Epilogue of a GEMM call.
#[derive(Debug, Clone, Copy, Default)]
pub struct GemmEpilogue<'a> {
    /// One value per column of C
    pub bias: Option<&'a [f32]>,
    /// Add into the existing contents of C
    pub accumulate: bool,
    /// Activation applied before storing
    pub activation: Activation,
}

/// SGEMM driver bound to one tile routine.
#[derive(Debug, Clone)]
pub struct Sgemm {
    routine: Arc<GeneratedRoutine>,
    parallel_min_panels: usize,
}

impl Sgemm {
    /// Driver using `routine` for every tile.
    pub fn new(routine: Arc<GeneratedRoutine>) -> Self {
        Self {
            routine,
            parallel_min_panels: 2,
        }
    }

    /// Driver for the tile size configured in `config`, taken from `cache`.
    pub fn from_config(cache: &KernelCache, config: &KernelConfig) -> Result<Self> {
        let descriptor = MicrokernelDescriptor::new(config.gemm_row_block, config.gemm_col_block);
        Ok(Self {
            routine: cache.get_or_generate(&descriptor)?,
            parallel_min_panels: config.parallel_min_panels.max(1),
        })
    }

    /// The tile routine in use.
    pub fn routine(&self) -> &Arc<GeneratedRoutine> {
        &self.routine
    }

    /// `m x n` result of the `m x k` matrix `a` times the `k x n` matrix `b`
    /// into `c` (leading dimension `ldc`).
    #[allow(clippy::too_many_arguments)]
    pub fn run(
        &self,
        m: usize,
        n: usize,
        k: usize,
        a: MatRef<'_>,
        b: MatRef<'_>,
        c: &mut [f32],
        ldc: usize,
        epilogue: &GemmEpilogue<'_>,
    ) -> Result<()> {
        let Some(job) = self.prepare(m, n, k, a, b, c.len(), ldc, epilogue)? else {
            return Ok(());
        };
        let panel_len = job.col_block * ldc;
        for (panel, c_panel) in c.chunks_mut(panel_len).take(job.col_panels).enumerate() {
            job.column_panel(&self.routine, panel, c_panel, ldc, epilogue)?;
        }
        Ok(())
    }

    /// [`run`](Self::run) with column panels spread over the rayon pool.
    ///
    /// Falls back to the serial loop below the configured panel count.
    #[cfg(feature = "parallel")]
    #[allow(clippy::too_many_arguments)]
    pub fn par_run(
        &self,
        m: usize,
        n: usize,
        k: usize,
        a: MatRef<'_>,
        b: MatRef<'_>,
        c: &mut [f32],
        ldc: usize,
        epilogue: &GemmEpilogue<'_>,
    ) -> Result<()> {
        let Some(job) = self.prepare(m, n, k, a, b, c.len(), ldc, epilogue)? else {
            return Ok(());
        };
        let panel_len = job.col_block * ldc;
        if job.col_panels < self.parallel_min_panels {
            for (panel, c_panel) in c.chunks_mut(panel_len).take(job.col_panels).enumerate() {
                job.column_panel(&self.routine, panel, c_panel, ldc, epilogue)?;
            }
            return Ok(());
        }
        log::debug!(
            "parallel sgemm {}x{}x{} over {} column panels",
            m,
            n,
            k,
            job.col_panels
        );
        c.par_chunks_mut(panel_len)
            .take(job.col_panels)
            .enumerate()
            .try_for_each(|(panel, c_panel)| {
                job.column_panel(&self.routine, panel, c_panel, ldc, epilogue)
            })
    }

    #[allow(clippy::too_many_arguments)]
    fn prepare(
        &self,
        m: usize,
        n: usize,
        k: usize,
        a: MatRef<'_>,
        b: MatRef<'_>,
        c_len: usize,
        ldc: usize,
        epilogue: &GemmEpilogue<'_>,
    ) -> Result<Option<PackedProblem>> {
        if m == 0 || n == 0 {
            return Ok(None);
        }
        if a.ld < m || b.ld < k || ldc < m {
            return Err(KernelError::param_error(format!(
                "leading dimensions lda={} ldb={} ldc={} too small for {}x{}x{}",
                a.ld, b.ld, ldc, m, n, k
            )));
        }
        if k > 0 {
            KernelError::check_len("a", (k - 1) * a.ld + m, a.data.len())?;
            KernelError::check_len("b", (n - 1) * b.ld + k, b.data.len())?;
        }
        KernelError::check_len("c", (n - 1) * ldc + m, c_len)?;
        if let Some(bias) = epilogue.bias {
            KernelError::check_len("bias", n, bias.len())?;
        }

        let descriptor = self.routine.descriptor();
        let row_block = descriptor.row_block();
        let col_block = descriptor.col_block();
        Ok(Some(PackedProblem {
            m,
            n,
            k,
            row_block,
            col_block,
            col_panels: up_div(n, col_block),
            packed_a: pack_a(m, k, a, row_block),
            packed_b: pack_b(n, k, b, col_block),
        }))
    }
}

/// Operands repacked into tile panels, shared by every column panel.
struct PackedProblem {
    m: usize,
    n: usize,
    k: usize,
    row_block: usize,
    col_block: usize,
    col_panels: usize,
    packed_a: Vec<f32>,
    packed_b: Vec<f32>,
}

impl PackedProblem {
    /// Compute columns `panel * col_block ..` of C. `c_panel` starts at the
    /// first of those columns.
    fn column_panel(
        &self,
        routine: &GeneratedRoutine,
        panel: usize,
        c_panel: &mut [f32],
        ldc: usize,
        epilogue: &GemmEpilogue<'_>,
    ) -> Result<()> {
        let (mr, nr, k) = (self.row_block, self.col_block, self.k);
        let j0 = panel * nr;
        let cols = nr.min(self.n - j0);
        let b_panel = &self.packed_b[panel * k * nr..][..k * nr];

        let mut bias_tile = [0.0_f32; MAX_COL_BLOCK];
        if let Some(bias) = epilogue.bias {
            bias_tile[..cols].copy_from_slice(&bias[j0..j0 + cols]);
        }
        let bias = epilogue.bias.map(|_| &bias_tile[..nr]);
        let first = i32::from(epilogue.accumulate);
        let activation = epilogue.activation.as_raw();

        for row_panel in 0..up_div(self.m, mr) {
            let i0 = row_panel * mr;
            let rows = mr.min(self.m - i0);
            let a_panel = &self.packed_a[row_panel * k * mr..][..k * mr];

            if rows == mr && cols == nr {
                routine.invoke(
                    k,
                    a_panel,
                    mr,
                    b_panel,
                    nr,
                    &mut c_panel[i0..],
                    ldc,
                    bias,
                    first,
                    activation,
                )?;
                continue;
            }

            let mut tile = [0.0_f32; MAX_TILE];
            if epilogue.accumulate {
                for j in 0..cols {
                    tile[j * mr..][..rows].copy_from_slice(&c_panel[j * ldc + i0..][..rows]);
                }
            }
            routine.invoke(
                k,
                a_panel,
                mr,
                b_panel,
                nr,
                &mut tile[..nr * mr],
                mr,
                bias,
                first,
                activation,
            )?;
            for j in 0..cols {
                c_panel[j * ldc + i0..][..rows].copy_from_slice(&tile[j * mr..][..rows]);
            }
        }
        Ok(())
    }
}

/// Rows of A in panels of `row_block`, `row_block` values per k step,
/// zero-padded past `m`.
fn pack_a(m: usize, k: usize, a: MatRef<'_>, row_block: usize) -> Vec<f32> {
    let panels = up_div(m, row_block);
    let mut packed = vec![0.0; panels * k * row_block];
    for panel in 0..panels {
        let i0 = panel * row_block;
        let rows = row_block.min(m - i0);
        let dst = &mut packed[panel * k * row_block..][..k * row_block];
        for p in 0..k {
            dst[p * row_block..][..rows].copy_from_slice(&a.data[p * a.ld + i0..][..rows]);
        }
    }
    packed
}

/// Columns of B in panels of `col_block`, `col_block` values per k step,
/// zero-padded past `n`.
fn pack_b(n: usize, k: usize, b: MatRef<'_>, col_block: usize) -> Vec<f32> {
    let panels = up_div(n, col_block);
    let mut packed = vec![0.0; panels * k * col_block];
    for panel in 0..panels {
        let j0 = panel * col_block;
        let cols = col_block.min(n - j0);
        let dst = &mut packed[panel * k * col_block..][..k * col_block];
        for p in 0..k {
            for j in 0..cols {
                dst[p * col_block + j] = b.data[(j0 + j) * b.ld + p];
            }
        }
    }
    packed
}

/// `C = act(A * B + bias)` through the process-wide routine cache.
#[allow(clippy::too_many_arguments)]
pub fn sgemm(
    m: usize,
    n: usize,
    k: usize,
    a: MatRef<'_>,
    b: MatRef<'_>,
    c: &mut [f32],
    ldc: usize,
    epilogue: &GemmEpilogue<'_>,
) -> Result<()> {
    let config = tensorlane_core::config::kernel_config();
    Sgemm::from_config(crate::microkernel::global_kernel_cache(), config)?
        .run(m, n, k, a, b, c, ldc, epilogue)
}

/// Parallel [`sgemm`].
#[cfg(feature = "parallel")]
#[allow(clippy::too_many_arguments)]
pub fn par_sgemm(
    m: usize,
    n: usize,
    k: usize,
    a: MatRef<'_>,
    b: MatRef<'_>,
    c: &mut [f32],
    ldc: usize,
    epilogue: &GemmEpilogue<'_>,
) -> Result<()> {
    let config = tensorlane_core::config::kernel_config();
    Sgemm::from_config(crate::microkernel::global_kernel_cache(), config)?
        .par_run(m, n, k, a, b, c, ldc, epilogue)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::microkernel::MicrokernelGenerator;
    use approx::assert_relative_eq;
    use tensorlane_core::utils::test_utils::{max_abs_diff, random_vec, reference_gemm};

    fn driver(row_block: usize, col_block: usize) -> Sgemm {
        let cache = KernelCache::new(MicrokernelGenerator::new(true));
        Sgemm::new(
            cache
                .get_or_generate(&MicrokernelDescriptor::new(row_block, col_block))
                .unwrap(),
        )
    }

    #[test]
    fn test_pack_a_pads_rows() {
        // 3x2 column-major: columns [1, 2, 3] and [4, 5, 6]
        let a = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let packed = pack_a(3, 2, MatRef::new(&a, 3), 4);
        assert_eq!(packed, vec![1.0, 2.0, 3.0, 0.0, 4.0, 5.0, 6.0, 0.0]);
    }

    #[test]
    fn test_pack_b_interleaves_columns() {
        // 2x3 column-major: columns [1, 2], [3, 4], [5, 6]
        let b = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let packed = pack_b(3, 2, MatRef::new(&b, 2), 2);
        assert_eq!(packed, vec![1.0, 3.0, 2.0, 4.0, 5.0, 0.0, 6.0, 0.0]);
    }

    #[test]
    fn test_edge_tiles_match_reference() {
        let (m, n, k) = (13, 7, 5);
        let a = random_vec(m * k, 1);
        let b = random_vec(k * n, 2);
        let bias = random_vec(n, 3);
        let mut c = vec![0.0; m * n];

        driver(8, 3)
            .run(
                m,
                n,
                k,
                MatRef::new(&a, m),
                MatRef::new(&b, k),
                &mut c,
                m,
                &GemmEpilogue {
                    bias: Some(&bias),
                    ..Default::default()
                },
            )
            .unwrap();

        let expected = reference_gemm(m, n, k, &a, &b, Some(&bias));
        assert!(max_abs_diff(&c, &expected) < 1e-4);
    }

    #[test]
    fn test_accumulate_into_c() {
        let (m, n, k) = (5, 3, 2);
        let a = random_vec(m * k, 4);
        let b = random_vec(k * n, 5);
        let mut c = vec![1.0; m * n];

        driver(4, 2)
            .run(
                m,
                n,
                k,
                MatRef::new(&a, m),
                MatRef::new(&b, k),
                &mut c,
                m,
                &GemmEpilogue {
                    accumulate: true,
                    ..Default::default()
                },
            )
            .unwrap();

        let expected = reference_gemm(m, n, k, &a, &b, None);
        for (x, y) in c.iter().zip(&expected) {
            assert_relative_eq!(*x, y + 1.0, epsilon = 1e-4);
        }
    }

    #[test]
    fn test_bad_leading_dimension() {
        let a = [0.0; 4];
        let mut c = [0.0; 4];
        let err = driver(4, 1)
            .run(
                2,
                2,
                2,
                MatRef::new(&a, 1),
                MatRef::new(&a, 2),
                &mut c,
                2,
                &GemmEpilogue::default(),
            )
            .unwrap_err();
        assert!(matches!(err, KernelError::ParamError { .. }));
    }

    #[cfg(feature = "parallel")]
    #[test]
    fn test_parallel_matches_serial() {
        let (m, n, k) = (19, 23, 9);
        let a = random_vec(m * k, 6);
        let b = random_vec(k * n, 7);
        let epilogue = GemmEpilogue {
            activation: Activation::Relu,
            ..Default::default()
        };
        let sgemm = driver(8, 4);

        let mut serial = vec![0.0; m * n];
        let mut parallel = vec![0.0; m * n];
        sgemm
            .run(m, n, k, MatRef::new(&a, m), MatRef::new(&b, k), &mut serial, m, &epilogue)
            .unwrap();
        sgemm
            .par_run(m, n, k, MatRef::new(&a, m), MatRef::new(&b, k), &mut parallel, m, &epilogue)
            .unwrap();
        assert_eq!(serial, parallel);
    }
}
