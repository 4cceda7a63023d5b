//! Four-lane SIMD primitives over the `wide` crate.
//!
//! Every kernel in the workspace works on groups of [`LANE_WIDTH`] floats.
//! `wide::f32x4` lowers to SSE, NEON or simd128 where available and to
//! scalar code elsewhere, so the kernels stay portable.
//!
//! # Example
//!
//! ```rust
//! use tensorlane_core::compute::cpu::simd::{Float4, SimdLane};
//!
//! let a = Float4::from_slice(&[1.0, 2.0, 3.0, 4.0]);
//! let b = Float4::splat(2.0);
//! let mut out = [0.0_f32; 4];
//! a.mul_add(b, Float4::splat(1.0)).store_to_slice(&mut out);
//! assert_eq!(out, [3.0, 5.0, 7.0, 9.0]);
//! ```

use crate::types::LANE_WIDTH;
use wide::f32x4;

/// The lane-group vector type.
pub type Float4 = f32x4;

/// Operations the kernels need from a lane-group vector.
pub trait SimdLane: Copy {
    /// Load the first four values of `slice`.
    fn from_slice(slice: &[f32]) -> Self;

    /// Store into the first four values of `slice`.
    fn store_to_slice(self, slice: &mut [f32]);

    /// Broadcast one value to every lane.
    fn splat(value: f32) -> Self;

    /// `self * mul + add`, fused where the target supports it.
    fn mul_add(self, mul: Self, add: Self) -> Self;

    /// Lane-wise maximum.
    fn max(self, other: Self) -> Self;

    /// Lane-wise minimum.
    fn min(self, other: Self) -> Self;

    /// Copy the lanes out.
    fn to_lanes(self) -> [f32; LANE_WIDTH];
}

impl SimdLane for f32x4 {
    #[inline(always)]
    fn from_slice(slice: &[f32]) -> Self {
        f32x4::from([slice[0], slice[1], slice[2], slice[3]])
    }

    #[inline(always)]
    fn store_to_slice(self, slice: &mut [f32]) {
        slice[..LANE_WIDTH].copy_from_slice(&self.to_array());
    }

    #[inline(always)]
    fn splat(value: f32) -> Self {
        f32x4::splat(value)
    }

    #[inline(always)]
    fn mul_add(self, mul: Self, add: Self) -> Self {
        f32x4::mul_add(self, mul, add)
    }

    #[inline(always)]
    fn max(self, other: Self) -> Self {
        f32x4::max(self, other)
    }

    #[inline(always)]
    fn min(self, other: Self) -> Self {
        f32x4::min(self, other)
    }

    #[inline(always)]
    fn to_lanes(self) -> [f32; LANE_WIDTH] {
        self.to_array()
    }
}

/// Load lane group `group` of a packed buffer.
#[inline(always)]
pub fn load_group(buffer: &[f32], group: usize) -> Float4 {
    Float4::from_slice(&buffer[group * LANE_WIDTH..])
}

/// Store lane group `group` of a packed buffer.
#[inline(always)]
pub fn store_group(buffer: &mut [f32], group: usize, value: Float4) {
    value.store_to_slice(&mut buffer[group * LANE_WIDTH..]);
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_load_store_round_trip() {
        let src = [1.0, -2.0, 3.5, 4.25, 9.0];
        let v = Float4::from_slice(&src[1..]);
        let mut dst = [0.0; 6];
        v.store_to_slice(&mut dst[2..]);
        assert_eq!(dst, [0.0, 0.0, -2.0, 3.5, 4.25, 9.0]);
    }

    #[test]
    fn test_mul_add() {
        let a = Float4::from_slice(&[1.0, 2.0, 3.0, 4.0]);
        let r = SimdLane::mul_add(a, Float4::splat(0.5), Float4::splat(1.0)).to_lanes();
        for (i, &x) in r.iter().enumerate() {
            assert_relative_eq!(x, (i as f32 + 1.0) * 0.5 + 1.0, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_clamp_ops() {
        let v = Float4::from_slice(&[-3.0, 0.5, 9.0, 6.0]);
        let clamped = SimdLane::min(SimdLane::max(v, Float4::splat(0.0)), Float4::splat(6.0));
        assert_eq!(clamped.to_lanes(), [0.0, 0.5, 6.0, 6.0]);
    }

    #[test]
    fn test_group_addressing() {
        let mut buffer = vec![0.0_f32; 12];
        store_group(&mut buffer, 2, Float4::splat(7.0));
        assert_eq!(&buffer[8..], &[7.0; 4]);
        assert_eq!(load_group(&buffer, 2).to_lanes(), [7.0; 4]);
        assert_eq!(load_group(&buffer, 0).to_lanes(), [0.0; 4]);
    }
}
