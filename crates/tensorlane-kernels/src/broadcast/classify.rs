//! Classification of broadcast relationships between shapes.
//!
//! [`classify`] names the relationship between one operand and the output,
//! [`broadcast_init`] resolves the relationship between the two operands of a
//! fast-path pair and decides which one is primary.

use tensorlane_core::{BroadcastType, KernelError, Result, TensorShape};

/// Relationship of `input` to `output`. First match wins; never `Unknown`.
///
/// The input is left-padded to the output rank before comparing. An input of
/// higher rank than the output is always `General`.
pub fn classify(output: &TensorShape, input: &TensorShape) -> BroadcastType {
    if input.rank() > output.rank() {
        return BroadcastType::General;
    }
    let input = input.pad_left(output.rank());

    if input == *output {
        BroadcastType::Normal
    } else if input.equal_from(output, 1) {
        BroadcastType::Element
    } else if input.equal_from(output, 2) {
        BroadcastType::HeightWidth
    } else if input.equal_from(output, 3) {
        BroadcastType::Width
    } else {
        let broadcast_count = input.count();
        let channels = output.dim_or_one(1);
        if broadcast_count == 1 {
            BroadcastType::Single
        } else if input.rank() >= 2
            // every element on the channel axis, so every other axis is 1
            && input.dims()[1] == channels
            && broadcast_count == channels
        {
            BroadcastType::Channel
        } else {
            BroadcastType::General
        }
    }
}

/// Whether a relationship can be served lane by lane.
///
/// The structural equalities only compare the trailing axes; the fast path
/// additionally needs the operand to be 1 on every axis it ignores.
pub fn fast_path_eligible(output: &TensorShape, input: &TensorShape, kind: BroadcastType) -> bool {
    if input.rank() > output.rank() {
        return false;
    }
    let input = input.pad_left(output.rank());
    let dims = input.dims();
    let ones_before = |axis: usize| dims.iter().take(axis).all(|&d| d == 1);

    match kind {
        BroadcastType::Normal => input == *output,
        BroadcastType::Element => ones_before(1) && input.equal_from(output, 1),
        BroadcastType::HeightWidth => ones_before(2) && input.equal_from(output, 2),
        BroadcastType::Width => ones_before(3) && input.equal_from(output, 3),
        BroadcastType::Single => input.count() == 1,
        BroadcastType::Channel => {
            dims.len() >= 2
                && dims[1] == output.dims()[1]
                && dims
                    .iter()
                    .enumerate()
                    .all(|(axis, &d)| axis == 1 || d == 1)
        }
        BroadcastType::Unknown | BroadcastType::General => false,
    }
}

/// [`classify`] followed by the eligibility check: relationships the fast
/// path cannot serve are reported as `General`.
pub fn classify_for_execution(output: &TensorShape, input: &TensorShape) -> BroadcastType {
    let kind = classify(output, input);
    if kind.has_fast_path() && !fast_path_eligible(output, input, kind) {
        log::debug!(
            "{} against {} classified {} but not lane-servable, using general path",
            input,
            output,
            kind
        );
        BroadcastType::General
    } else {
        kind
    }
}

/// Resolved relationship between the two operands of a fast-path pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BroadcastPlan {
    /// How the broadcast operand maps onto the primary one
    pub kind: BroadcastType,
    /// Operand 1 is primary and operand 0 is broadcast
    pub swap: bool,
    /// Shape of the combined result (both operands left-padded, maxed)
    pub full_shape: TensorShape,
    /// Shape of the operand that is replicated, once padded
    pub broadcast_shape: TensorShape,
}

impl BroadcastPlan {
    /// Shape of the primary operand.
    pub fn primary_shape(&self) -> &TensorShape {
        &self.full_shape
    }
}

/// Resolve the pairwise relationship between `dims0` and `dims1`.
///
/// The operand with more elements becomes primary; `swap` is set when that is
/// operand 1. Pairs the lane-blocked executor cannot serve are a layer error.
pub fn broadcast_init(dims0: &TensorShape, dims1: &TensorShape) -> Result<BroadcastPlan> {
    broadcast_init_at_rank(dims0, dims1, 1)
}

/// [`broadcast_init`] with both operands padded to at least `rank`.
///
/// The executors pass the output rank here so the plan's geometry matches
/// the blocked buffers, which are packed at that rank.
pub fn broadcast_init_at_rank(
    dims0: &TensorShape,
    dims1: &TensorShape,
    rank: usize,
) -> Result<BroadcastPlan> {
    let rank = dims0.rank().max(dims1.rank()).max(rank);
    let d0 = dims0.pad_left(rank);
    let d1 = dims1.pad_left(rank);
    let full_shape = TensorShape::broadcast_max(&d0, &d1);
    let smaller_first = d0.count() < d1.count();

    let structural = if d0 == d1 {
        Some(BroadcastType::Normal)
    } else if d0.equal_from(&d1, 1) {
        Some(BroadcastType::Element)
    } else if d0.equal_from(&d1, 2) {
        Some(BroadcastType::HeightWidth)
    } else if d0.equal_from(&d1, 3) {
        Some(BroadcastType::Width)
    } else {
        None
    };

    let (kind, swap, broadcast_shape) = match structural {
        Some(BroadcastType::Normal) => (BroadcastType::Normal, false, d1),
        Some(kind) => {
            if smaller_first {
                (kind, true, d0)
            } else {
                (kind, false, d1)
            }
        }
        None => {
            let (swap, broadcast_shape) = if d0 == full_shape {
                (false, d1)
            } else {
                (true, d0)
            };
            let kind = if broadcast_shape.dim_or_one(1) == 1 {
                BroadcastType::Single
            } else {
                BroadcastType::Channel
            };
            (kind, swap, broadcast_shape)
        }
    };

    let primary = if swap { dims1 } else { dims0 };
    if primary.pad_left(rank) != full_shape
        || !fast_path_eligible(&full_shape, &broadcast_shape, kind)
    {
        return Err(KernelError::layer_error(format!(
            "operands {} and {} have no lane-blocked broadcast relationship",
            dims0, dims1
        )));
    }

    Ok(BroadcastPlan {
        kind,
        swap,
        full_shape,
        broadcast_shape,
    })
}
