//! Borrowed views of packed tensors.

use tensorlane_core::{PackedGeometry, TensorShape};

/// Read-only view of a tensor in blocked layout.
#[derive(Debug, Clone, Copy)]
pub struct PackedTensor<'a> {
    /// Blocked data (a single float is accepted for scalar operands)
    pub data: &'a [f32],
    /// Logical shape
    pub shape: &'a TensorShape,
}

impl<'a> PackedTensor<'a> {
    /// Create a view.
    pub fn new(data: &'a [f32], shape: &'a TensorShape) -> Self {
        Self { data, shape }
    }

    /// Blocked geometry once the shape is left-padded to `rank`.
    pub fn geometry(&self, rank: usize) -> PackedGeometry {
        self.shape.packed_geometry(rank)
    }
}

/// Mutable view of a tensor in blocked layout.
#[derive(Debug)]
pub struct PackedTensorMut<'a> {
    /// Blocked data
    pub data: &'a mut [f32],
    /// Logical shape
    pub shape: &'a TensorShape,
}

impl<'a> PackedTensorMut<'a> {
    /// Create a view.
    pub fn new(data: &'a mut [f32], shape: &'a TensorShape) -> Self {
        Self { data, shape }
    }

    /// Reborrow as a shorter-lived mutable view.
    pub fn reborrow(&mut self) -> PackedTensorMut<'_> {
        PackedTensorMut {
            data: self.data,
            shape: self.shape,
        }
    }

    /// Blocked geometry of the output itself.
    pub fn geometry(&self) -> PackedGeometry {
        self.shape.packed_geometry(self.shape.rank())
    }
}
