//! Fixtures and reference implementations for kernel tests.
//!
//! The references work on linear layouts with plain scalar loops so that
//! vectorized kernels can be checked against something obviously correct.

use crate::compute::cpu::binary_ops::BinaryOperator;
use crate::error::Result;
use crate::layout;
use crate::types::TensorShape;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Deterministic random floats in `[-2, 2)`.
pub fn random_vec(len: usize, seed: u64) -> Vec<f32> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..len).map(|_| rng.gen_range(-2.0..2.0)).collect()
}

/// Deterministic random floats bounded away from zero, for division tests.
pub fn random_nonzero_vec(len: usize, seed: u64) -> Vec<f32> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..len)
        .map(|_| {
            let magnitude: f32 = rng.gen_range(0.5..2.0);
            if rng.gen_bool(0.5) {
                magnitude
            } else {
                -magnitude
            }
        })
        .collect()
}

/// Pack a linear buffer of `shape` for an operation whose output has `rank` axes.
pub fn pack_for_rank(shape: &TensorShape, rank: usize, linear: &[f32]) -> Result<Vec<f32>> {
    layout::pack(linear, shape.packed_geometry(rank))
}

/// Unpack a blocked buffer of `shape` (left-padded to `rank`).
pub fn unpack_for_rank(shape: &TensorShape, rank: usize, blocked: &[f32]) -> Result<Vec<f32>> {
    layout::unpack(blocked, shape.packed_geometry(rank))
}

/// Scalar reference for multi-operand broadcasting in linear layout.
///
/// Operand 0 initializes the result and every later operand is combined as
/// `op(result, operand)`, mirroring the executors' ordering.
pub fn reference_broadcast<O: BinaryOperator>(
    op: &O,
    operands: &[(&TensorShape, &[f32])],
    output: &TensorShape,
) -> Vec<f32> {
    let rank = output.rank();
    let out_dims = output.dims();
    let count = output.count();
    let mut result = vec![0.0_f32; count];

    for (index, (shape, data)) in operands.iter().enumerate() {
        let padded = shape.pad_left(rank);
        let in_dims = padded.dims();
        let mut coords = vec![0usize; rank];
        for (flat, slot) in result.iter_mut().enumerate() {
            let mut rem = flat;
            for axis in (0..rank).rev() {
                coords[axis] = rem % out_dims[axis];
                rem /= out_dims[axis];
            }
            let mut offset = 0;
            for axis in 0..rank {
                let c = if in_dims[axis] == 1 { 0 } else { coords[axis] };
                offset = offset * in_dims[axis] + c;
            }
            let value = data[offset];
            *slot = if index == 0 {
                value
            } else {
                op.apply_scalar(*slot, value)
            };
        }
    }
    result
}

/// Column-major `m x n` reference of `act(A * B + bias)` for microkernel tests.
///
/// `a` is `m x k` and `b` is `k x n`, both column-major.
pub fn reference_gemm(
    m: usize,
    n: usize,
    k: usize,
    a: &[f32],
    b: &[f32],
    bias: Option<&[f32]>,
) -> Vec<f32> {
    let mut c = vec![0.0_f32; m * n];
    for j in 0..n {
        for i in 0..m {
            let mut acc = bias.map_or(0.0, |bias| bias[j]);
            for p in 0..k {
                acc += a[p * m + i] * b[j * k + p];
            }
            c[j * m + i] = acc;
        }
    }
    c
}

/// Largest absolute elementwise difference.
pub fn max_abs_diff(a: &[f32], b: &[f32]) -> f32 {
    assert_eq!(a.len(), b.len(), "buffers must have the same length");
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y).abs())
        .fold(0.0, f32::max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::cpu::binary_ops::{Add, Sub};

    #[test]
    fn test_reference_broadcast_channel() {
        let out = TensorShape::new(vec![1, 2, 2]).unwrap();
        let bias = TensorShape::new(vec![2, 1]).unwrap();
        let a = [1.0, 2.0, 3.0, 4.0];
        let b = [10.0, 20.0];
        let r = reference_broadcast(&Add, &[(&out, &a[..]), (&bias, &b[..])], &out);
        assert_eq!(r, vec![11.0, 12.0, 23.0, 24.0]);
    }

    #[test]
    fn test_reference_broadcast_order() {
        let out = TensorShape::new(vec![1, 1, 2]).unwrap();
        let scalar = TensorShape::new(vec![1]).unwrap();
        let r = reference_broadcast(&Sub, &[(&scalar, &[10.0][..]), (&out, &[1.0, 2.0][..])], &out);
        assert_eq!(r, vec![9.0, 8.0]);
    }

    #[test]
    fn test_reference_gemm() {
        // A = [[1, 2], [3, 4]] column-major, B = identity
        let a = [1.0, 3.0, 2.0, 4.0];
        let b = [1.0, 0.0, 0.0, 1.0];
        let c = reference_gemm(2, 2, 2, &a, &b, Some(&[1.0, -1.0]));
        assert_eq!(c, vec![2.0, 4.0, 1.0, 3.0]);
    }
}
