//! Arbitrary-rank broadcast fallback.
//!
//! Every operand is unpacked to linear layout, combined into a linear result
//! and the result is packed back into the caller's blocked output. The
//! scratch arena of the execution context holds both linear buffers, so one
//! call needs exactly twice the output element count.

use crate::tensor::{PackedTensor, PackedTensorMut};
use tensorlane_core::compute::cpu::binary_ops::BinaryOperator;
use tensorlane_core::compute::cpu::simd::{Float4, SimdLane};
use tensorlane_core::layout::{to_blocked, to_linear};
use tensorlane_core::memory::ExecutionContext;
use tensorlane_core::{KernelError, Result, TensorShape, LANE_WIDTH};

/// Fallback executor for any broadcast-compatible operand set.
#[derive(Debug, Clone, Copy, Default)]
pub struct GeneralBroadcastExecutor;

impl GeneralBroadcastExecutor {
    /// Create an executor.
    pub fn new() -> Self {
        Self
    }

    /// Combine `operands` into `output` in index order.
    ///
    /// Operand 0 initializes the result, operand `i > 0` is combined as
    /// `op(result, operand_i)`.
    pub fn execute<O: BinaryOperator>(
        &self,
        op: &O,
        operands: &[PackedTensor<'_>],
        output: PackedTensorMut<'_>,
        ctx: &ExecutionContext,
    ) -> Result<()> {
        if operands.is_empty() {
            return Err(KernelError::param_error("no operands to combine"));
        }
        let out_shape = output.shape;
        let rank = out_shape.rank();
        let out_geometry = output.geometry();
        let count = out_shape.count();
        KernelError::check_len("output", out_geometry.blocked_len(), output.data.len())?;

        let mut scratch = ctx.acquire_scratch(2 * count)?;
        let (linear_out, linear_in) = scratch.split_at_mut(count);

        for (index, operand) in operands.iter().enumerate() {
            let runs = RunLayout::new(operand.shape, out_shape)?;

            let value_source: &[f32] = if runs.scalar {
                // blocked and linear agree on element 0
                KernelError::check_len("scalar operand", 1, operand.data.len())?;
                &operand.data[..1]
            } else {
                let geometry = operand.geometry(rank);
                let linear = &mut linear_in[..geometry.linear_len()];
                to_linear(
                    operand.data,
                    linear,
                    geometry.batch,
                    geometry.channel,
                    geometry.spatial,
                )?;
                linear
            };

            if index == 0 {
                runs.for_each_run(linear_out, value_source, |run, value| fill_run(run, value));
            } else {
                runs.for_each_run(linear_out, value_source, |run, value| {
                    combine_run(op, run, value)
                });
            }
        }

        to_blocked(
            linear_out,
            output.data,
            out_geometry.batch,
            out_geometry.channel,
            out_geometry.spatial,
        )
    }
}

/// Decomposition of the output into runs that share one operand value.
///
/// The trailing axes where the operand is 1 form the inner run. The leading
/// axes where it is 1 repeat the whole operand. Any 1 between non-1 axes is
/// walked with an odometer over the remaining axes.
#[derive(Debug)]
struct RunLayout {
    scalar: bool,
    outer_size: usize,
    broad_size: usize,
    inner_size: usize,
    /// Output extents of the axes above the inner run
    walk_dims: Vec<usize>,
    /// Operand strides of those axes, 0 where the operand broadcasts
    walk_strides: Vec<usize>,
}

impl RunLayout {
    fn new(operand: &TensorShape, output: &TensorShape) -> Result<Self> {
        let rank = output.rank();
        if operand.rank() > rank {
            return Err(KernelError::shape_mismatch(output, operand));
        }
        let padded = operand.pad_left(rank);
        let in_dims = padded.dims();
        let out_dims = output.dims();

        if in_dims
            .iter()
            .zip(out_dims)
            .any(|(&i, &o)| i != 1 && i != o)
        {
            return Err(KernelError::shape_mismatch(output, operand));
        }

        let count = output.count();
        if padded.is_scalar() {
            return Ok(Self {
                scalar: true,
                outer_size: 1,
                broad_size: 1,
                inner_size: count,
                walk_dims: Vec::new(),
                walk_strides: Vec::new(),
            });
        }

        let leading = in_dims.iter().take_while(|&&d| d == 1).count();
        let trailing = in_dims.iter().rev().take_while(|&&d| d == 1).count();
        let outer_size = out_dims[..leading].iter().product();
        let inner_size = out_dims[rank - trailing..].iter().product();
        let broad_size = padded.count();

        let split = rank - trailing;
        let mut walk_strides = vec![0; split];
        let mut stride = 1;
        for axis in (0..split).rev() {
            if in_dims[axis] != 1 {
                walk_strides[axis] = stride;
                stride *= in_dims[axis];
            }
        }

        Ok(Self {
            scalar: false,
            outer_size,
            broad_size,
            inner_size,
            walk_dims: out_dims[..split].to_vec(),
            walk_strides,
        })
    }

    /// No interior broadcast axes: runs map one-to-one onto operand values.
    fn is_dense(&self) -> bool {
        self.outer_size * self.broad_size * self.inner_size
            == self.walk_dims.iter().product::<usize>() * self.inner_size
    }

    fn for_each_run<F>(&self, output: &mut [f32], values: &[f32], mut visit: F)
    where
        F: FnMut(&mut [f32], f32),
    {
        if self.scalar {
            visit(output, values[0]);
            return;
        }

        let inner = self.inner_size;
        if self.is_dense() {
            for (run_index, run) in output.chunks_exact_mut(inner).enumerate() {
                visit(run, values[run_index % self.broad_size]);
            }
            return;
        }

        let axes = self.walk_dims.len();
        let mut coords = vec![0usize; axes];
        let mut offset = 0;
        for run in output.chunks_exact_mut(inner) {
            visit(run, values[offset]);
            for axis in (0..axes).rev() {
                coords[axis] += 1;
                offset += self.walk_strides[axis];
                if coords[axis] < self.walk_dims[axis] {
                    break;
                }
                offset -= self.walk_strides[axis] * coords[axis];
                coords[axis] = 0;
            }
        }
    }
}

/// Splat `value` across the run.
fn fill_run(run: &mut [f32], value: f32) {
    let splat = Float4::splat(value);
    let mut chunks = run.chunks_exact_mut(LANE_WIDTH);
    for chunk in &mut chunks {
        splat.store_to_slice(chunk);
    }
    chunks.into_remainder().fill(value);
}

/// `run[i] = op(run[i], value)` four lanes at a time.
fn combine_run<O: BinaryOperator>(op: &O, run: &mut [f32], value: f32) {
    let splat = Float4::splat(value);
    let mut chunks = run.chunks_exact_mut(LANE_WIDTH);
    for chunk in &mut chunks {
        op.apply(Float4::from_slice(chunk), splat).store_to_slice(chunk);
    }

    let tail = chunks.into_remainder();
    if !tail.is_empty() {
        let mut lanes = [0.0_f32; LANE_WIDTH];
        lanes[..tail.len()].copy_from_slice(tail);
        let result = op.apply(Float4::from_slice(&lanes), splat).to_lanes();
        tail.copy_from_slice(&result[..tail.len()]);
    }
}
