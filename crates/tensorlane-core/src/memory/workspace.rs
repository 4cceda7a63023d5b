//! Scratch memory owned by an execution context.
//!
//! A kernel call borrows the context's scratch arena through a
//! [`ScratchGuard`]. The guard is the only way to reach the memory and
//! releases it when dropped, so scratch contents never outlive one call. The
//! arena is not reentrant: while one guard is alive every other acquisition
//! on the same context fails with [`KernelError::WorkspaceBusy`]. Concurrent
//! callers use independent contexts.

use crate::error::{KernelError, Result};
use crate::types::up_div;
use parking_lot::{Mutex, MutexGuard};
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Caller-owned execution context providing scratch memory to kernels.
#[derive(Debug, Default)]
pub struct ExecutionContext {
    scratch: Mutex<Vec<f32>>,
    /// Largest request served so far, in elements
    peak_elements: AtomicUsize,
}

impl ExecutionContext {
    /// Create a context with an empty arena.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a context whose arena already holds `elements` floats.
    pub fn with_capacity(elements: usize) -> Self {
        Self {
            scratch: Mutex::new(vec![0.0; elements]),
            peak_elements: AtomicUsize::new(0),
        }
    }

    /// Borrow `elements` floats of scratch for the duration of one call.
    ///
    /// The arena grows on demand. Contents are unspecified on entry.
    pub fn acquire_scratch(&self, elements: usize) -> Result<ScratchGuard<'_>> {
        let mut buffer = self.scratch.try_lock().ok_or(KernelError::WorkspaceBusy)?;
        if buffer.len() < elements {
            log::debug!(
                "growing scratch arena from {} to {} elements",
                buffer.len(),
                elements
            );
            buffer.resize(elements, 0.0);
        }
        self.peak_elements.fetch_max(elements, Ordering::Relaxed);
        Ok(ScratchGuard {
            buffer,
            len: elements,
        })
    }

    /// Borrow at least `byte_size` bytes of scratch, rounded up to whole floats.
    pub fn acquire_scratch_bytes(&self, byte_size: usize) -> Result<ScratchGuard<'_>> {
        self.acquire_scratch(up_div(byte_size, std::mem::size_of::<f32>()))
    }

    /// Current arena capacity in elements.
    pub fn capacity(&self) -> usize {
        self.scratch.lock().len()
    }

    /// Largest scratch request served so far, in elements.
    pub fn peak_elements(&self) -> usize {
        self.peak_elements.load(Ordering::Relaxed)
    }

    /// Free the arena memory. Fails if a guard is alive.
    pub fn release_memory(&self) -> Result<()> {
        let mut buffer = self.scratch.try_lock().ok_or(KernelError::WorkspaceBusy)?;
        *buffer = Vec::new();
        Ok(())
    }
}

/// Scoped borrow of an execution context's scratch arena.
pub struct ScratchGuard<'a> {
    buffer: MutexGuard<'a, Vec<f32>>,
    len: usize,
}

impl ScratchGuard<'_> {
    /// Split the scratch into two disjoint regions at `mid`.
    pub fn split_at_mut(&mut self, mid: usize) -> (&mut [f32], &mut [f32]) {
        let len = self.len;
        self.buffer[..len].split_at_mut(mid)
    }
}

impl Deref for ScratchGuard<'_> {
    type Target = [f32];

    fn deref(&self) -> &Self::Target {
        &self.buffer[..self.len]
    }
}

impl DerefMut for ScratchGuard<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        let len = self.len;
        &mut self.buffer[..len]
    }
}
