//! Shapes, data types and broadcast relationships.
//!
//! Axis 0 of a [`TensorShape`] is the batch, axis 1 the channel and every
//! trailing axis is spatial. Packed buffers round the channel axis up to a
//! multiple of [`LANE_WIDTH`].

use crate::error::{KernelError, Result};
use std::fmt;

/// Number of `f32` lanes processed by one vector operation.
pub const LANE_WIDTH: usize = 4;

/// Integer division rounding up.
#[inline]
pub const fn up_div(value: usize, divisor: usize) -> usize {
    (value + divisor - 1) / divisor
}

/// Round `value` up to the next multiple of `multiple`.
#[inline]
pub const fn round_up(value: usize, multiple: usize) -> usize {
    up_div(value, multiple) * multiple
}

/// Ordered dimension extents of a tensor. All extents are non-zero.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TensorShape {
    dims: Vec<usize>,
}

impl TensorShape {
    /// Create a shape, rejecting empty shapes and zero extents.
    pub fn new(dims: impl Into<Vec<usize>>) -> Result<Self> {
        let dims = dims.into();
        if dims.is_empty() {
            return Err(KernelError::param_error("tensor shape must have rank >= 1"));
        }
        if let Some(axis) = dims.iter().position(|&d| d == 0) {
            return Err(KernelError::param_error(format!(
                "tensor shape {:?} has a zero extent on axis {}",
                dims, axis
            )));
        }
        Ok(Self { dims })
    }

    /// Dimension extents.
    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    /// Number of axes.
    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    /// Extent of `axis`, or 1 if the axis does not exist.
    pub fn dim_or_one(&self, axis: usize) -> usize {
        self.dims.get(axis).copied().unwrap_or(1)
    }

    /// Total number of elements.
    pub fn count(&self) -> usize {
        self.dims.iter().product()
    }

    /// Product of the extents from `axis` to the end (1 past the last axis).
    pub fn count_from(&self, axis: usize) -> usize {
        self.dims.iter().skip(axis).product()
    }

    /// Batch extent (axis 0).
    pub fn batch(&self) -> usize {
        self.dims[0]
    }

    /// Channel extent (axis 1, 1 for rank-1 shapes).
    pub fn channel(&self) -> usize {
        self.dim_or_one(1)
    }

    /// Product of the spatial extents (axes 2..).
    pub fn spatial(&self) -> usize {
        self.count_from(2)
    }

    /// Whether every extent is 1.
    pub fn is_scalar(&self) -> bool {
        self.dims.iter().all(|&d| d == 1)
    }

    /// Left-pad with 1s up to `rank`. Shapes already at or above `rank` are
    /// returned unchanged.
    pub fn pad_left(&self, rank: usize) -> Self {
        if self.rank() >= rank {
            return self.clone();
        }
        let mut dims = vec![1; rank - self.rank()];
        dims.extend_from_slice(&self.dims);
        Self { dims }
    }

    /// Whether both shapes have the same rank, the rank exceeds `axis`, and
    /// every extent from `axis` onwards matches.
    pub fn equal_from(&self, other: &TensorShape, axis: usize) -> bool {
        self.rank() == other.rank()
            && self.rank() > axis
            && self.dims[axis..] == other.dims[axis..]
    }

    /// Elementwise maximum of two shapes after left-padding to a common rank.
    pub fn broadcast_max(a: &TensorShape, b: &TensorShape) -> TensorShape {
        let rank = a.rank().max(b.rank());
        let (a, b) = (a.pad_left(rank), b.pad_left(rank));
        let dims = a
            .dims
            .iter()
            .zip(b.dims.iter())
            .map(|(&x, &y)| x.max(y))
            .collect();
        TensorShape { dims }
    }

    /// Blocked geometry of this shape once left-padded to `rank`.
    pub fn packed_geometry(&self, rank: usize) -> PackedGeometry {
        let padded = self.pad_left(rank.max(1));
        PackedGeometry::new(padded.batch(), padded.channel(), padded.spatial())
    }
}

impl fmt::Display for TensorShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.dims)
    }
}

impl TryFrom<&[usize]> for TensorShape {
    type Error = KernelError;

    fn try_from(dims: &[usize]) -> Result<Self> {
        TensorShape::new(dims.to_vec())
    }
}

/// Batch / channel / spatial decomposition of a packed buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PackedGeometry {
    /// Batch extent
    pub batch: usize,
    /// True channel count
    pub channel: usize,
    /// Channel count rounded up to whole lane groups, divided by the lane width
    pub channel_blocks: usize,
    /// Product of spatial extents
    pub spatial: usize,
}

impl PackedGeometry {
    /// Create a geometry for `batch x channel x spatial`.
    pub fn new(batch: usize, channel: usize, spatial: usize) -> Self {
        Self {
            batch,
            channel,
            channel_blocks: up_div(channel, LANE_WIDTH),
            spatial,
        }
    }

    /// Number of lane groups in the packed buffer.
    pub fn lane_groups(&self) -> usize {
        self.batch * self.channel_blocks * self.spatial
    }

    /// Number of `f32` elements in the packed buffer (padding included).
    pub fn blocked_len(&self) -> usize {
        self.lane_groups() * LANE_WIDTH
    }

    /// Number of true elements.
    pub fn linear_len(&self) -> usize {
        self.batch * self.channel * self.spatial
    }
}

/// Element data types known to the runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DataType {
    /// 32-bit IEEE float
    Float,
    /// 16-bit IEEE float
    Half,
    /// bfloat16
    Bfp16,
    /// Signed 8-bit integer
    Int8,
    /// Signed 32-bit integer
    Int32,
}

impl DataType {
    /// Size of one element in bytes.
    pub fn byte_size(self) -> usize {
        match self {
            DataType::Float | DataType::Int32 => 4,
            DataType::Half | DataType::Bfp16 => 2,
            DataType::Int8 => 1,
        }
    }

    /// Fail with `UnsupportedDataType` unless this is `Float`.
    pub fn ensure_float(self) -> Result<()> {
        if self == DataType::Float {
            Ok(())
        } else {
            Err(KernelError::unsupported_data_type(self))
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DataType::Float => "float",
            DataType::Half => "half",
            DataType::Bfp16 => "bfp16",
            DataType::Int8 => "int8",
            DataType::Int32 => "int32",
        };
        f.write_str(name)
    }
}

/// Structural relationship between a broadcast operand and the full shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BroadcastType {
    /// Not classified yet. Never an execution state.
    #[default]
    Unknown,
    /// Identical shapes.
    Normal,
    /// Equal except for the batch axis; repeats per batch.
    Element,
    /// Equal on the spatial axes; one value per spatial position.
    HeightWidth,
    /// Equal on the axes from 3 onwards; one value per width position.
    Width,
    /// A single scalar.
    Single,
    /// One value per channel.
    Channel,
    /// No fast path applies.
    General,
}

impl BroadcastType {
    /// Whether the lane-blocked fast path can serve this relationship.
    pub fn has_fast_path(self) -> bool {
        !matches!(self, BroadcastType::Unknown | BroadcastType::General)
    }
}

impl fmt::Display for BroadcastType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn shape(dims: &[usize]) -> TensorShape {
        TensorShape::new(dims.to_vec()).unwrap()
    }

    #[test]
    fn test_shape_validation() {
        assert!(TensorShape::new(vec![]).is_err());
        assert!(TensorShape::new(vec![1, 0, 2]).is_err());
        assert!(TensorShape::new(vec![1, 3, 2]).is_ok());
    }

    #[test]
    fn test_counts() {
        let s = shape(&[2, 3, 4, 5]);
        assert_eq!(s.count(), 120);
        assert_eq!(s.count_from(2), 20);
        assert_eq!(s.count_from(4), 1);
        assert_eq!(s.spatial(), 20);
        assert_eq!(shape(&[7]).channel(), 1);
    }

    #[test]
    fn test_pad_left() {
        assert_eq!(shape(&[4, 1, 1]).pad_left(4), shape(&[1, 4, 1, 1]));
        assert_eq!(shape(&[2, 3]).pad_left(1), shape(&[2, 3]));
    }

    #[test]
    fn test_equal_from() {
        let a = shape(&[2, 4, 3, 3]);
        let b = shape(&[1, 4, 3, 3]);
        assert!(!a.equal_from(&b, 0));
        assert!(a.equal_from(&b, 1));
        assert!(a.equal_from(&b, 2));
        // rank must exceed the start axis
        assert!(!shape(&[2, 3]).equal_from(&shape(&[5, 3]), 2));
        // ranks must match
        assert!(!shape(&[4, 3, 3]).equal_from(&b, 1));
    }

    #[test]
    fn test_broadcast_max() {
        let max = TensorShape::broadcast_max(&shape(&[1, 4, 1, 1]), &shape(&[3, 5]));
        assert_eq!(max, shape(&[1, 4, 3, 5]));
    }

    #[test]
    fn test_packed_geometry() {
        let g = shape(&[2, 5, 3, 3]).packed_geometry(4);
        assert_eq!(g.channel_blocks, 2);
        assert_eq!(g.blocked_len(), 2 * 8 * 9);
        assert_eq!(g.linear_len(), 2 * 5 * 9);

        let g = shape(&[4, 1, 1]).packed_geometry(4);
        assert_eq!((g.batch, g.channel, g.spatial), (1, 4, 1));
    }

    #[test]
    fn test_data_type() {
        assert_eq!(DataType::Half.byte_size(), 2);
        assert!(DataType::Float.ensure_float().is_ok());
        assert!(matches!(
            DataType::Int8.ensure_float(),
            Err(KernelError::UnsupportedDataType { .. })
        ));
    }

    #[test]
    fn test_round_up() {
        assert_eq!(up_div(5, 4), 2);
        assert_eq!(round_up(5, 4), 8);
        assert_eq!(round_up(8, 4), 8);
    }
}
