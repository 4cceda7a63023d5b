//! Microkernel descriptors and activation kinds.

use std::fmt;
use tensorlane_core::{KernelError, Result, LANE_WIDTH};

/// Row block sizes with a generated routine.
pub const SUPPORTED_ROW_BLOCKS: [usize; 3] = [4, 8, 16];

/// Largest column block with a generated routine.
pub const MAX_COL_BLOCK: usize = 8;

/// Upper clamp of [`Activation::Relu6`].
pub const RELU6_CEILING: f32 = 6.0;

/// Key of a generated routine.
///
/// Descriptors are plain values; whether a routine exists for one is decided
/// by the generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MicrokernelDescriptor {
    row_block: usize,
    col_block: usize,
    element_bytes: usize,
}

impl MicrokernelDescriptor {
    /// Single-precision descriptor for a `row_block x col_block` output tile.
    pub fn new(row_block: usize, col_block: usize) -> Self {
        Self::with_element_bytes(row_block, col_block, std::mem::size_of::<f32>())
    }

    /// Descriptor with an explicit element size.
    pub fn with_element_bytes(row_block: usize, col_block: usize, element_bytes: usize) -> Self {
        Self {
            row_block,
            col_block,
            element_bytes,
        }
    }

    /// Rows of the output tile.
    pub fn row_block(&self) -> usize {
        self.row_block
    }

    /// Columns of the output tile.
    pub fn col_block(&self) -> usize {
        self.col_block
    }

    /// Bytes per element.
    pub fn element_bytes(&self) -> usize {
        self.element_bytes
    }

    /// `f32x4` vectors per tile column.
    pub fn vectors_per_column(&self) -> usize {
        self.row_block / LANE_WIDTH
    }

    /// Check that a routine can be generated for this descriptor.
    pub fn validate(&self) -> Result<()> {
        if self.element_bytes != std::mem::size_of::<f32>() {
            return Err(KernelError::unsupported_data_type(format!(
                "{}-byte elements",
                self.element_bytes
            )));
        }
        if !SUPPORTED_ROW_BLOCKS.contains(&self.row_block) {
            return Err(KernelError::unsupported_configuration(format!(
                "row block {} (supported: {:?})",
                self.row_block, SUPPORTED_ROW_BLOCKS
            )));
        }
        if self.col_block == 0 || self.col_block > MAX_COL_BLOCK {
            return Err(KernelError::unsupported_configuration(format!(
                "column block {} (supported: 1..={})",
                self.col_block, MAX_COL_BLOCK
            )));
        }
        Ok(())
    }

    /// Every descriptor the generator accepts.
    pub fn supported() -> impl Iterator<Item = MicrokernelDescriptor> {
        SUPPORTED_ROW_BLOCKS
            .into_iter()
            .flat_map(|r| (1..=MAX_COL_BLOCK).map(move |c| MicrokernelDescriptor::new(r, c)))
    }
}

impl fmt::Display for MicrokernelDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}x{} ({} bytes)",
            self.row_block, self.col_block, self.element_bytes
        )
    }
}

/// Epilogue applied to the accumulators before they are stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Activation {
    /// Identity
    #[default]
    None,
    /// `max(x, 0)`
    Relu,
    /// `min(max(x, 0), 6)`
    Relu6,
}

impl Activation {
    /// Raw value passed through the routine ABI.
    pub fn as_raw(self) -> i32 {
        match self {
            Activation::None => 0,
            Activation::Relu => 1,
            Activation::Relu6 => 2,
        }
    }

    /// Decode a raw ABI value.
    pub fn from_raw(raw: i32) -> Result<Self> {
        match raw {
            0 => Ok(Activation::None),
            1 => Ok(Activation::Relu),
            2 => Ok(Activation::Relu6),
            other => Err(KernelError::param_error(format!(
                "unknown activation kind {}",
                other
            ))),
        }
    }
}

impl From<Activation> for i32 {
    fn from(activation: Activation) -> Self {
        activation.as_raw()
    }
}
