//! Specialized SGEMM microkernels.
//!
//! A [`MicrokernelDescriptor`] names a tile size; the [`KernelCache`] hands
//! out the [`GeneratedRoutine`] for it, generating it on first request.
//!
//! ```
//! use tensorlane_kernels::microkernel::{global_kernel_cache, MicrokernelDescriptor};
//!
//! let routine = global_kernel_cache()
//!     .get_or_generate(&MicrokernelDescriptor::new(4, 1))
//!     .unwrap();
//! let a = [1.0, 2.0, 3.0, 4.0];
//! let mut c = [0.0; 4];
//! routine.invoke(1, &a, 4, &[2.0], 1, &mut c, 4, None, 0, 0).unwrap();
//! assert_eq!(c, [2.0, 4.0, 6.0, 8.0]);
//! ```

pub mod cache;
pub mod descriptor;
pub mod generator;
pub mod routines;

pub use cache::{global_kernel_cache, KernelCache};
pub use descriptor::{Activation, MicrokernelDescriptor, MAX_COL_BLOCK, SUPPORTED_ROW_BLOCKS};
pub use generator::{GeneratedRoutine, MicrokernelGenerator};
pub use routines::TileArgs;
