//! Layer-level entry points.

pub mod binary;
pub mod resource;

pub use binary::BinaryLayer;
pub use resource::{
    ElementResource, LayerParams, LayerResource, MultidirBroadcastParams, ResourceData,
};
