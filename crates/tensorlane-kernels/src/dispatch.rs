//! Routing of kernel requests.
//!
//! Binary-op requests are classified operand by operand against the output
//! and sent to the lane-blocked executor when every relationship allows it,
//! to the general executor otherwise. Microkernel requests go through the
//! routine cache.

use crate::broadcast::{classify_for_execution, BroadcastExecutor, GeneralBroadcastExecutor};
use crate::microkernel::{GeneratedRoutine, KernelCache, MicrokernelDescriptor};
use crate::tensor::{PackedTensor, PackedTensorMut};
use once_cell::sync::Lazy;
use std::fmt;
use std::sync::Arc;
use tensorlane_core::compute::cpu::binary_ops::BinaryOperator;
use tensorlane_core::config::{kernel_config, KernelConfig};
use tensorlane_core::memory::ExecutionContext;
use tensorlane_core::{BroadcastType, KernelError, Result, TensorShape};

/// Executor chosen for a binary-op request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExecutionPath {
    /// Lane-blocked executor
    Fast,
    /// Linear fallback
    General,
}

impl fmt::Display for ExecutionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionPath::Fast => f.write_str("fast"),
            ExecutionPath::General => f.write_str("general"),
        }
    }
}

/// Front door of the kernel layer.
pub struct KernelDispatcher {
    config: KernelConfig,
    cache: Arc<KernelCache>,
    fast: BroadcastExecutor,
    general: GeneralBroadcastExecutor,
}

impl KernelDispatcher {
    /// Dispatcher with its own routine cache.
    pub fn new(config: KernelConfig) -> Self {
        let cache = Arc::new(KernelCache::from_config(&config));
        Self::with_cache(config, cache)
    }

    /// Dispatcher sharing an existing routine cache.
    pub fn with_cache(config: KernelConfig, cache: Arc<KernelCache>) -> Self {
        Self {
            config,
            cache,
            fast: BroadcastExecutor::new(),
            general: GeneralBroadcastExecutor::new(),
        }
    }

    /// The process-wide dispatcher.
    pub fn global() -> &'static KernelDispatcher {
        &GLOBAL_DISPATCHER
    }

    /// Configuration in use.
    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    /// Routine cache in use.
    pub fn cache(&self) -> &Arc<KernelCache> {
        &self.cache
    }

    /// Decide which executor serves `operands` producing `output`.
    ///
    /// Classification stops at the first operand that needs the general
    /// path. The fast path also needs one of the first two operands to span
    /// the whole output.
    pub fn select_path(
        &self,
        output: &TensorShape,
        operands: &[&TensorShape],
    ) -> Result<ExecutionPath> {
        if operands.is_empty() {
            return Err(KernelError::param_error("no operands to combine"));
        }

        let mut kind = BroadcastType::Unknown;
        for shape in operands {
            kind = classify_for_execution(output, shape);
            if kind == BroadcastType::General {
                break;
            }
        }

        let path = match kind {
            BroadcastType::Unknown => {
                return Err(KernelError::layer_error("unknown broadcast type"));
            }
            BroadcastType::General => ExecutionPath::General,
            _ if !self.config.fast_path_enabled => ExecutionPath::General,
            _ => {
                let rank = output.rank();
                let spans_output = |shape: &TensorShape| shape.pad_left(rank) == *output;
                let pair_primary = operands.len() < 2
                    || spans_output(operands[0])
                    || spans_output(operands[1]);
                if pair_primary {
                    ExecutionPath::Fast
                } else {
                    ExecutionPath::General
                }
            }
        };
        log::debug!(
            "{} operand(s) into {}: {} path (last relationship {})",
            operands.len(),
            output,
            path,
            kind
        );
        Ok(path)
    }

    /// Run a broadcast binary operation.
    ///
    /// A single operand is combined with itself. Returns the executor used.
    pub fn binary<O: BinaryOperator>(
        &self,
        op: &O,
        operands: &[PackedTensor<'_>],
        output: PackedTensorMut<'_>,
        ctx: &ExecutionContext,
    ) -> Result<ExecutionPath> {
        let doubled;
        let operands = match operands {
            [] => return Err(KernelError::param_error("no operands to combine")),
            [only] => {
                doubled = [*only, *only];
                &doubled[..]
            }
            _ => operands,
        };

        let shapes: Vec<&TensorShape> = operands.iter().map(|operand| operand.shape).collect();
        let path = self.select_path(output.shape, &shapes)?;
        match path {
            ExecutionPath::Fast => self.fast.execute(op, operands, output)?,
            ExecutionPath::General => self.general.execute(op, operands, output, ctx)?,
        }
        Ok(path)
    }

    /// Routine for `descriptor` from the cache.
    pub fn microkernel(&self, descriptor: &MicrokernelDescriptor) -> Result<Arc<GeneratedRoutine>> {
        self.cache.get_or_generate(descriptor)
    }

    /// Routine for the configured default tile size.
    pub fn default_microkernel(&self) -> Result<Arc<GeneratedRoutine>> {
        self.microkernel(&MicrokernelDescriptor::new(
            self.config.gemm_row_block,
            self.config.gemm_col_block,
        ))
    }
}

impl fmt::Debug for KernelDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KernelDispatcher")
            .field("config", &self.config)
            .field("cached_routines", &self.cache.len())
            .finish()
    }
}

static GLOBAL_DISPATCHER: Lazy<KernelDispatcher> = Lazy::new(|| {
    KernelDispatcher::with_cache(
        kernel_config().clone(),
        Arc::new(KernelCache::from_config(kernel_config())),
    )
});
