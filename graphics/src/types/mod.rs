//! Common types and descriptors for graphics resources.
//!
//! This module contains format enums, usage flags, and descriptor structs
//! used throughout the graphics system.

mod common;
mod sampler;
mod texture;

pub use common::{ClearValue, Extent3d, LoadOp};
pub use sampler::{AddressMode, FilterMode, SamplerDescriptor};
pub use texture::{TextureDescriptor, TextureDimension, TextureFormat, TextureUsage};
