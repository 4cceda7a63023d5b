//! Lane-blocked broadcast executor.
//!
//! Works directly on blocked buffers one lane group (`f32x4`) at a time. The
//! broadcast operand is addressed through the relationship resolved by
//! [`broadcast_init_at_rank`] at the output rank; the primary operand and the
//! output share the same geometry.

use super::classify::{broadcast_init_at_rank, BroadcastPlan};
use crate::tensor::{PackedTensor, PackedTensorMut};
use tensorlane_core::compute::cpu::binary_ops::BinaryOperator;
use tensorlane_core::compute::cpu::simd::{load_group, store_group, Float4, SimdLane};
use tensorlane_core::{BroadcastType, KernelError, PackedGeometry, Result, LANE_WIDTH};

/// Fast-path executor for the structural broadcast relationships.
#[derive(Debug, Clone, Copy, Default)]
pub struct BroadcastExecutor;

impl BroadcastExecutor {
    /// Create an executor.
    pub fn new() -> Self {
        Self
    }

    /// `output = op(input0, input1)` with the pair's broadcast resolved.
    pub fn binary<O: BinaryOperator>(
        &self,
        op: &O,
        input0: PackedTensor<'_>,
        input1: PackedTensor<'_>,
        output: PackedTensorMut<'_>,
    ) -> Result<()> {
        let plan = broadcast_init_at_rank(input0.shape, input1.shape, output.shape.rank())?;
        check_output_shape(&plan, &output)?;
        let (primary, broadcast) = if plan.swap {
            (input1, input0)
        } else {
            (input0, input1)
        };
        run_plan(op, &plan, Some(primary.data), broadcast.data, output.data)
    }

    /// `output = op(output, input)`, combining in place.
    pub fn binary_in_place<O: BinaryOperator>(
        &self,
        op: &O,
        output: PackedTensorMut<'_>,
        input: PackedTensor<'_>,
    ) -> Result<()> {
        let plan = broadcast_init_at_rank(output.shape, input.shape, output.shape.rank())?;
        if plan.swap {
            return Err(KernelError::layer_error(format!(
                "operand {} is larger than the output {}",
                input.shape, output.shape
            )));
        }
        check_output_shape(&plan, &output)?;
        run_plan(op, &plan, None, input.data, output.data)
    }

    /// Combine every operand into `output` in index order.
    ///
    /// Operands 0 and 1 are combined into the output, each later operand is
    /// folded in place as `op(output, operand)`.
    pub fn execute<O: BinaryOperator>(
        &self,
        op: &O,
        operands: &[PackedTensor<'_>],
        mut output: PackedTensorMut<'_>,
    ) -> Result<()> {
        let (first, rest) = match operands {
            [first, second, rest @ ..] => ((*first, *second), rest),
            _ => {
                return Err(KernelError::param_error(format!(
                    "fast path needs at least two operands, got {}",
                    operands.len()
                )))
            }
        };
        self.binary(op, first.0, first.1, output.reborrow())?;
        for operand in rest {
            self.binary_in_place(op, output.reborrow(), *operand)?;
        }
        Ok(())
    }
}

fn check_output_shape(plan: &BroadcastPlan, output: &PackedTensorMut<'_>) -> Result<()> {
    let padded = output.shape.pad_left(plan.full_shape.rank());
    if padded != plan.full_shape {
        return Err(KernelError::shape_mismatch(&plan.full_shape, output.shape));
    }
    Ok(())
}

/// Elements of the broadcast operand the lane walk will touch.
fn broadcast_len(kind: BroadcastType, geometry: &PackedGeometry, width: usize) -> usize {
    match kind {
        BroadcastType::Normal => geometry.blocked_len(),
        BroadcastType::Single => 1,
        BroadcastType::Channel => geometry.channel_blocks * LANE_WIDTH,
        BroadcastType::Element => geometry.channel_blocks * geometry.spatial * LANE_WIDTH,
        BroadcastType::HeightWidth => geometry.spatial * LANE_WIDTH,
        BroadcastType::Width => width * LANE_WIDTH,
        BroadcastType::Unknown | BroadcastType::General => 0,
    }
}

fn run_plan<O: BinaryOperator>(
    op: &O,
    plan: &BroadcastPlan,
    primary: Option<&[f32]>,
    broadcast: &[f32],
    output: &mut [f32],
) -> Result<()> {
    let rank = plan.full_shape.rank();
    let geometry = plan.full_shape.packed_geometry(rank);
    let width = plan.full_shape.count_from(3);

    if !plan.kind.has_fast_path() {
        return Err(KernelError::layer_error(format!(
            "broadcast type {} has no lane-blocked kernel",
            plan.kind
        )));
    }
    KernelError::check_len("output", geometry.blocked_len(), output.len())?;
    if let Some(primary) = primary {
        KernelError::check_len("primary operand", geometry.blocked_len(), primary.len())?;
    }
    KernelError::check_len(
        "broadcast operand",
        broadcast_len(plan.kind, &geometry, width),
        broadcast.len(),
    )?;

    if plan.swap {
        lane_walk(plan.kind, &geometry, width, primary, broadcast, output, |full, b| {
            op.apply(b, full)
        });
    } else {
        lane_walk(plan.kind, &geometry, width, primary, broadcast, output, |full, b| {
            op.apply(full, b)
        });
    }
    Ok(())
}

fn lane_walk<F>(
    kind: BroadcastType,
    geometry: &PackedGeometry,
    width: usize,
    primary: Option<&[f32]>,
    broadcast: &[f32],
    output: &mut [f32],
    combine: F,
) where
    F: Fn(Float4, Float4) -> Float4,
{
    let groups = geometry.lane_groups();
    let spatial = geometry.spatial;
    let channel_blocks = geometry.channel_blocks;

    match kind {
        BroadcastType::Normal => for_each_group(groups, primary, output, &combine, |n| {
            load_group(broadcast, n)
        }),
        BroadcastType::Single => {
            let value = Float4::splat(broadcast[0]);
            for_each_group(groups, primary, output, &combine, |_| value)
        }
        BroadcastType::Channel => for_each_group(groups, primary, output, &combine, |n| {
            let batch = n / (spatial * channel_blocks);
            let block = n / spatial - batch * channel_blocks;
            load_group(broadcast, block)
        }),
        BroadcastType::Element => {
            let plane = channel_blocks * spatial;
            for_each_group(groups, primary, output, &combine, |n| {
                load_group(broadcast, n % plane)
            })
        }
        BroadcastType::HeightWidth => for_each_group(groups, primary, output, &combine, |n| {
            Float4::splat(broadcast[(n % spatial) * LANE_WIDTH])
        }),
        BroadcastType::Width => for_each_group(groups, primary, output, &combine, |n| {
            Float4::splat(broadcast[(n % width) * LANE_WIDTH])
        }),
        BroadcastType::Unknown | BroadcastType::General => {}
    }
}

#[inline(always)]
fn for_each_group<F, B>(
    groups: usize,
    primary: Option<&[f32]>,
    output: &mut [f32],
    combine: &F,
    broadcast_at: B,
) where
    F: Fn(Float4, Float4) -> Float4,
    B: Fn(usize) -> Float4,
{
    match primary {
        Some(primary) => {
            for n in 0..groups {
                let value = combine(load_group(primary, n), broadcast_at(n));
                store_group(output, n, value);
            }
        }
        None => {
            for n in 0..groups {
                let value = combine(load_group(output, n), broadcast_at(n));
                store_group(output, n, value);
            }
        }
    }
}
