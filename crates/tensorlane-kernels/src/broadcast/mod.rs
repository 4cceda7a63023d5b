//! Broadcast elementwise binary operations over blocked tensors.
//!
//! - [`classify`]: shape relationships and pairwise planning
//! - [`fast`]: lane-blocked executor for the structural relationships
//! - [`general`]: linear fallback for everything else

pub mod classify;
pub mod fast;
pub mod general;

pub use classify::{
    broadcast_init, broadcast_init_at_rank, classify, classify_for_execution, fast_path_eligible,
    BroadcastPlan,
};
pub use fast::BroadcastExecutor;
pub use general::GeneralBroadcastExecutor;
