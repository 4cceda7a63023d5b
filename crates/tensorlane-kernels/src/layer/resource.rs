//! Constant operands and layer parameters.

use once_cell::sync::OnceCell;
use tensorlane_core::layout;
use tensorlane_core::{DataType, KernelError, Result, TensorShape};

/// Raw values of a constant operand.
#[derive(Debug, Clone, PartialEq)]
pub enum ResourceData {
    /// Single precision
    Float(Vec<f32>),
    /// IEEE half precision
    Half(Vec<half::f16>),
    /// bfloat16
    Bfp16(Vec<half::bf16>),
}

impl ResourceData {
    /// Element type of the stored values.
    pub fn data_type(&self) -> DataType {
        match self {
            ResourceData::Float(_) => DataType::Float,
            ResourceData::Half(_) => DataType::Half,
            ResourceData::Bfp16(_) => DataType::Bfp16,
        }
    }

    /// Number of stored values.
    pub fn len(&self) -> usize {
        match self {
            ResourceData::Float(values) => values.len(),
            ResourceData::Half(values) => values.len(),
            ResourceData::Bfp16(values) => values.len(),
        }
    }

    /// Whether nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Values converted to single precision.
    pub fn to_f32(&self) -> Vec<f32> {
        match self {
            ResourceData::Float(values) => values.clone(),
            ResourceData::Half(values) => values.iter().map(|v| v.to_f32()).collect(),
            ResourceData::Bfp16(values) => values.iter().map(|v| v.to_f32()).collect(),
        }
    }
}

#[derive(Debug)]
struct Prepared {
    rank: usize,
    data: Vec<f32>,
}

/// Constant broadcast operand owned by a layer.
///
/// The operand is converted and packed once, on first use, for the rank of
/// the output it is combined into. A scalar stays a single float.
#[derive(Debug)]
pub struct ElementResource {
    shape: TensorShape,
    data: ResourceData,
    prepared: OnceCell<Prepared>,
}

impl ElementResource {
    /// Wrap `data` of logical `shape`.
    pub fn new(shape: TensorShape, data: ResourceData) -> Result<Self> {
        if data.len() != shape.count() {
            return Err(KernelError::param_error(format!(
                "resource of shape {} needs {} values, got {}",
                shape,
                shape.count(),
                data.len()
            )));
        }
        Ok(Self {
            shape,
            data,
            prepared: OnceCell::new(),
        })
    }

    /// Single-precision resource.
    pub fn from_f32(shape: TensorShape, values: Vec<f32>) -> Result<Self> {
        Self::new(shape, ResourceData::Float(values))
    }

    /// Logical shape.
    pub fn shape(&self) -> &TensorShape {
        &self.shape
    }

    /// Stored element type.
    pub fn data_type(&self) -> DataType {
        self.data.data_type()
    }

    /// Whether the operand was already prepared.
    pub fn is_prepared(&self) -> bool {
        self.prepared.get().is_some()
    }

    /// The operand ready for the executors, for an output of `rank` axes.
    ///
    /// Preparation happens once. Asking for a different rank afterwards is a
    /// layer error unless the operand is a scalar.
    pub fn prepare(&self, rank: usize) -> Result<&[f32]> {
        let prepared = self.prepared.get_or_try_init(|| {
            let values = self.data.to_f32();
            let data = if self.shape.is_scalar() {
                vec![values[0]]
            } else {
                layout::pack(&values, self.shape.packed_geometry(rank))?
            };
            log::debug!(
                "prepared {} resource {} for rank {}",
                self.data.data_type(),
                self.shape,
                rank
            );
            Ok::<_, KernelError>(Prepared { rank, data })
        })?;

        if prepared.rank != rank && !self.shape.is_scalar() {
            return Err(KernelError::layer_error(format!(
                "resource {} was prepared for rank {}, requested rank {}",
                self.shape, prepared.rank, rank
            )));
        }
        Ok(&prepared.data)
    }
}

/// Parameters of a multi-directional broadcast layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MultidirBroadcastParams {
    /// Position of the constant operand: 0 puts it first, anything else
    /// puts it after the runtime input
    pub weight_input_index: usize,
}

/// Parameter objects a layer can be built from.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum LayerParams {
    /// Broadcast binary operation
    MultidirBroadcast(MultidirBroadcastParams),
}

/// Resources a layer can own.
#[derive(Debug)]
pub enum LayerResource {
    /// Constant elementwise operand
    Eltwise(ElementResource),
}
