//! Specialized SGEMM tile bodies.
//!
//! Every supported `(row_block, col_block)` pair is instantiated from the
//! const-generic bodies below, so loop bounds and the accumulator array are
//! fixed at compile time. Bias, accumulate and activation stay runtime
//! branches outside the K loop.

use super::descriptor::RELU6_CEILING;
use tensorlane_core::compute::cpu::simd::{Float4, SimdLane};
use tensorlane_core::LANE_WIDTH;

/// Inputs of one tile invocation. Bounds are checked by the caller.
#[derive(Debug, Clone, Copy)]
pub struct TileArgs<'a> {
    /// Depth of the product
    pub k: usize,
    /// Packed A: `row_block` contiguous values per k step
    pub src_a: &'a [f32],
    /// Leading dimension of the caller's A; not used for stepping
    pub lda: usize,
    /// Packed B: `col_block` contiguous values per k step
    pub src_b: &'a [f32],
    /// Leading dimension of the caller's B; not used for stepping
    pub ldb: usize,
    /// Per-column bias
    pub bias: Option<&'a [f32]>,
    /// Non-zero: start from the existing contents of dst
    pub first: i32,
    /// 0 none, 1 relu, 2 relu6
    pub activation: i32,
}

/// Signature shared by every tile body.
pub type RoutineFn = fn(&TileArgs<'_>, &mut [f32], usize);

/// Vectorized body: `MV` vectors of four rows by `NR` columns.
pub fn sgemm_tile<const MV: usize, const NR: usize>(
    args: &TileArgs<'_>,
    dst: &mut [f32],
    ldc: usize,
) {
    let zero = Float4::splat(0.0);
    let mut acc = [[zero; MV]; NR];

    if let Some(bias) = args.bias {
        for (column, &b) in acc.iter_mut().zip(bias) {
            *column = [Float4::splat(b); MV];
        }
    }
    if args.first != 0 {
        for (j, column) in acc.iter_mut().enumerate() {
            for (v, lane) in column.iter_mut().enumerate() {
                *lane = Float4::from_slice(&dst[j * ldc + v * LANE_WIDTH..]);
            }
        }
    }

    let a_panel = args.src_a.chunks_exact(MV * LANE_WIDTH);
    let b_panel = args.src_b.chunks_exact(NR);
    for (a_step, b_step) in a_panel.zip(b_panel).take(args.k) {
        let mut a = [zero; MV];
        for (v, lane) in a.iter_mut().enumerate() {
            *lane = Float4::from_slice(&a_step[v * LANE_WIDTH..]);
        }
        for (column, &b) in acc.iter_mut().zip(b_step) {
            let b = Float4::splat(b);
            for (lane, &a) in column.iter_mut().zip(a.iter()) {
                *lane = a.mul_add(b, *lane);
            }
        }
    }

    if args.activation != 0 {
        for lane in acc.iter_mut().flatten() {
            *lane = lane.max(zero);
        }
    }
    if args.activation == 2 {
        let ceiling = Float4::splat(RELU6_CEILING);
        for lane in acc.iter_mut().flatten() {
            *lane = lane.min(ceiling);
        }
    }

    for (j, column) in acc.iter().enumerate() {
        for (v, lane) in column.iter().enumerate() {
            lane.store_to_slice(&mut dst[j * ldc + v * LANE_WIDTH..]);
        }
    }
}

/// Scalar body with the same contract, used when SIMD is disabled.
pub fn reference_tile<const MR: usize, const NR: usize>(
    args: &TileArgs<'_>,
    dst: &mut [f32],
    ldc: usize,
) {
    let mut acc = [[0.0_f32; MR]; NR];

    if let Some(bias) = args.bias {
        for (column, &b) in acc.iter_mut().zip(bias) {
            *column = [b; MR];
        }
    }
    if args.first != 0 {
        for (j, column) in acc.iter_mut().enumerate() {
            column.copy_from_slice(&dst[j * ldc..][..MR]);
        }
    }

    let a_panel = args.src_a.chunks_exact(MR);
    let b_panel = args.src_b.chunks_exact(NR);
    for (a_step, b_step) in a_panel.zip(b_panel).take(args.k) {
        for (column, &b) in acc.iter_mut().zip(b_step) {
            for (value, &a) in column.iter_mut().zip(a_step) {
                *value += a * b;
            }
        }
    }

    for value in acc.iter_mut().flatten() {
        if args.activation != 0 {
            *value = value.max(0.0);
        }
        if args.activation == 2 {
            *value = value.min(RELU6_CEILING);
        }
    }

    for (j, column) in acc.iter().enumerate() {
        dst[j * ldc..][..MR].copy_from_slice(column);
    }
}

macro_rules! routine_table {
    ($( ($mr:literal, $nr:literal) ),* $(,)?) => {
        /// Vectorized and scalar bodies for a tile size, if one was instantiated.
        pub fn lookup(row_block: usize, col_block: usize) -> Option<(RoutineFn, RoutineFn)> {
            match (row_block, col_block) {
                $(
                    ($mr, $nr) => Some((
                        sgemm_tile::<{ $mr / LANE_WIDTH }, $nr> as RoutineFn,
                        reference_tile::<$mr, $nr> as RoutineFn,
                    )),
                )*
                _ => None,
            }
        }
    };
}

routine_table!(
    (4, 1), (4, 2), (4, 3), (4, 4), (4, 5), (4, 6), (4, 7), (4, 8),
    (8, 1), (8, 2), (8, 3), (8, 4), (8, 5), (8, 6), (8, 7), (8, 8),
    (16, 1), (16, 2), (16, 3), (16, 4), (16, 5), (16, 6), (16, 7), (16, 8),
);
