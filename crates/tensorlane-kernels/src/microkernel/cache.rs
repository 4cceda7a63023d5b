//! Write-once cache of generated routines.

use super::descriptor::MicrokernelDescriptor;
use super::generator::{GeneratedRoutine, MicrokernelGenerator};
use once_cell::sync::Lazy;
use std::sync::Arc;
use tensorlane_core::config::{kernel_config, KernelConfig};
use tensorlane_core::memory::{CacheStats, WriteOnceCache};
use tensorlane_core::Result;

/// Routines keyed by descriptor, generated on first request.
///
/// Concurrent first requests for the same descriptor generate exactly once;
/// every caller receives the same `Arc`. Entries are never evicted.
#[derive(Default)]
pub struct KernelCache {
    generator: MicrokernelGenerator,
    routines: WriteOnceCache<MicrokernelDescriptor, GeneratedRoutine>,
}

impl KernelCache {
    /// Empty cache using `generator`.
    pub fn new(generator: MicrokernelGenerator) -> Self {
        Self {
            generator,
            routines: WriteOnceCache::new(),
        }
    }

    /// Empty cache following a kernel configuration.
    pub fn from_config(config: &KernelConfig) -> Self {
        Self::new(MicrokernelGenerator::from_config(config))
    }

    /// Routine for `descriptor`, generating it if absent.
    ///
    /// A failed generation leaves no entry behind.
    pub fn get_or_generate(&self, descriptor: &MicrokernelDescriptor) -> Result<Arc<GeneratedRoutine>> {
        if let Some(routine) = self.routines.get(descriptor) {
            log::debug!("microkernel cache hit for {}", descriptor);
            return Ok(routine);
        }
        self.routines
            .get_or_try_insert_with(*descriptor, |desc| self.generator.generate(desc))
    }

    /// Previously generated routine, without generating.
    pub fn get(&self, descriptor: &MicrokernelDescriptor) -> Option<Arc<GeneratedRoutine>> {
        self.routines.get(descriptor)
    }

    /// Descriptors with a cached routine, sorted.
    pub fn descriptors(&self) -> Vec<MicrokernelDescriptor> {
        let mut keys = self.routines.keys();
        keys.sort();
        keys
    }

    /// Number of cached routines.
    pub fn len(&self) -> usize {
        self.routines.len()
    }

    /// Whether nothing was generated yet.
    pub fn is_empty(&self) -> bool {
        self.routines.is_empty()
    }

    /// Generation and hit counters.
    pub fn stats(&self) -> CacheStats {
        self.routines.stats()
    }

    /// The generator filling this cache.
    pub fn generator(&self) -> &MicrokernelGenerator {
        &self.generator
    }
}

/// Process-wide cache, configured from the environment on first use.
pub static GLOBAL_KERNEL_CACHE: Lazy<KernelCache> =
    Lazy::new(|| KernelCache::from_config(kernel_config()));

/// The process-wide routine cache.
pub fn global_kernel_cache() -> &'static KernelCache {
    &GLOBAL_KERNEL_CACHE
}

#[cfg(test)]
mod tests {
    use super::*;
    use tensorlane_core::KernelError;

    #[test]
    fn test_same_descriptor_same_routine() {
        let cache = KernelCache::new(MicrokernelGenerator::new(true));
        let desc = MicrokernelDescriptor::new(8, 4);
        let a = cache.get_or_generate(&desc).unwrap();
        let b = cache.get_or_generate(&desc).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(cache.stats().fills, 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_distinct_descriptors() {
        let cache = KernelCache::new(MicrokernelGenerator::new(true));
        let a = cache.get_or_generate(&MicrokernelDescriptor::new(8, 4)).unwrap();
        let b = cache.get_or_generate(&MicrokernelDescriptor::new(4, 8)).unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(
            cache.descriptors(),
            vec![MicrokernelDescriptor::new(4, 8), MicrokernelDescriptor::new(8, 4)]
        );
    }

    #[test]
    fn test_failed_generation_not_cached() {
        let cache = KernelCache::new(MicrokernelGenerator::new(true));
        let desc = MicrokernelDescriptor::new(3, 3);
        assert!(matches!(
            cache.get_or_generate(&desc),
            Err(KernelError::UnsupportedConfiguration { .. })
        ));
        assert!(cache.get(&desc).is_none());
        assert!(cache.is_empty());
    }
}
