//! Broadcast binary layer.

use super::resource::{ElementResource, LayerParams, LayerResource};
use crate::dispatch::{ExecutionPath, KernelDispatcher};
use crate::tensor::{PackedTensor, PackedTensorMut};
use std::sync::Arc;
use tensorlane_core::compute::cpu::binary_ops::BinaryOpKind;
use tensorlane_core::memory::ExecutionContext;
use tensorlane_core::{DataType, KernelError, Result};

/// Elementwise binary operation over broadcast operands.
///
/// The operator, parameters and resource are resolved once at construction;
/// `forward` only assembles the operand list and dispatches.
#[derive(Debug)]
pub struct BinaryLayer {
    op: BinaryOpKind,
    weight_input_index: usize,
    resource: Option<ElementResource>,
    dispatcher: Option<Arc<KernelDispatcher>>,
}

impl BinaryLayer {
    /// Build a layer. Missing parameters are a parameter error.
    pub fn new(
        op: BinaryOpKind,
        params: Option<LayerParams>,
        resource: Option<LayerResource>,
    ) -> Result<Self> {
        let params = params.ok_or_else(|| {
            KernelError::param_error(format!("{} layer has no parameters", op))
        })?;
        let weight_input_index = match params {
            LayerParams::MultidirBroadcast(params) => params.weight_input_index,
        };
        let resource = resource.map(|resource| match resource {
            LayerResource::Eltwise(resource) => resource,
        });

        Ok(Self {
            op,
            weight_input_index,
            resource,
            dispatcher: None,
        })
    }

    /// Route through `dispatcher` instead of the process-wide one.
    pub fn with_dispatcher(mut self, dispatcher: Arc<KernelDispatcher>) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    /// Operator of this layer.
    pub fn op(&self) -> BinaryOpKind {
        self.op
    }

    /// Position of the constant operand.
    pub fn weight_input_index(&self) -> usize {
        self.weight_input_index
    }

    /// Constant operand, if any.
    pub fn resource(&self) -> Option<&ElementResource> {
        self.resource.as_ref()
    }

    /// Whether outputs of `data_type` can be produced.
    pub fn supports(data_type: DataType) -> bool {
        data_type == DataType::Float
    }

    /// Combine `inputs` (and the constant operand) into `output`.
    pub fn forward(
        &self,
        inputs: &[PackedTensor<'_>],
        output: PackedTensorMut<'_>,
        output_type: DataType,
        ctx: &ExecutionContext,
    ) -> Result<ExecutionPath> {
        if !Self::supports(output_type) {
            return Err(KernelError::unsupported_data_type(output_type));
        }
        let dispatcher = match &self.dispatcher {
            Some(dispatcher) => dispatcher.as_ref(),
            None => KernelDispatcher::global(),
        };

        match &self.resource {
            Some(resource) => {
                let input = inputs.first().ok_or_else(|| {
                    KernelError::param_error(format!("{} layer has no runtime input", self.op))
                })?;
                let constant = PackedTensor::new(
                    resource.prepare(output.shape.rank())?,
                    resource.shape(),
                );
                let operands = if self.weight_input_index == 0 {
                    [constant, *input]
                } else {
                    [*input, constant]
                };
                dispatcher.binary(&self.op, &operands, output, ctx)
            }
            None => dispatcher.binary(&self.op, inputs, output, ctx),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layer::resource::{MultidirBroadcastParams, ResourceData};
    use tensorlane_core::config::KernelConfig;
    use tensorlane_core::layout;
    use tensorlane_core::TensorShape;

    fn shape(dims: &[usize]) -> TensorShape {
        TensorShape::new(dims.to_vec()).unwrap()
    }

    fn params(weight_input_index: usize) -> Option<LayerParams> {
        Some(LayerParams::MultidirBroadcast(MultidirBroadcastParams {
            weight_input_index,
        }))
    }

    #[test]
    fn test_missing_params() {
        let err = BinaryLayer::new(BinaryOpKind::Add, None, None).unwrap_err();
        assert!(matches!(err, KernelError::ParamError { .. }));
    }

    #[test]
    fn test_rejects_non_float_output() {
        let layer = BinaryLayer::new(BinaryOpKind::Add, params(1), None).unwrap();
        let s = shape(&[4]);
        let a = [0.0; 4];
        let mut out = [0.0; 4];
        let err = layer
            .forward(
                &[PackedTensor::new(&a, &s)],
                PackedTensorMut::new(&mut out, &s),
                DataType::Int8,
                &ExecutionContext::new(),
            )
            .unwrap_err();
        assert!(matches!(err, KernelError::UnsupportedDataType { .. }));
    }

    #[test]
    fn test_resource_first_keeps_order() {
        // 10 - x with the constant as operand 0
        let resource = ElementResource::new(
            shape(&[1]),
            ResourceData::Half(vec![half::f16::from_f32(10.0)]),
        )
        .unwrap();
        let layer = BinaryLayer::new(
            BinaryOpKind::Sub,
            params(0),
            Some(LayerResource::Eltwise(resource)),
        )
        .unwrap()
        .with_dispatcher(Arc::new(KernelDispatcher::new(KernelConfig::default())));

        let s = shape(&[1, 2, 2]);
        let geometry = s.packed_geometry(3);
        let x = layout::pack(&[1.0, 2.0, 3.0, 4.0], geometry).unwrap();
        let mut out = vec![0.0; geometry.blocked_len()];
        let path = layer
            .forward(
                &[PackedTensor::new(&x, &s)],
                PackedTensorMut::new(&mut out, &s),
                DataType::Float,
                &ExecutionContext::new(),
            )
            .unwrap();
        assert_eq!(path, ExecutionPath::Fast);
        let linear = layout::unpack(&out, geometry).unwrap();
        assert_eq!(linear, vec![9.0, 8.0, 7.0, 6.0]);
    }

    #[test]
    fn test_single_input_combined_with_itself() {
        let layer = BinaryLayer::new(BinaryOpKind::Mul, params(1), None).unwrap();
        let s = shape(&[1, 4]);
        let a = [1.0, 2.0, 3.0, 4.0];
        let mut out = [0.0; 4];
        layer
            .forward(
                &[PackedTensor::new(&a, &s)],
                PackedTensorMut::new(&mut out, &s),
                DataType::Float,
                &ExecutionContext::new(),
            )
            .unwrap();
        assert_eq!(out, [1.0, 4.0, 9.0, 16.0]);
    }
}
