//! Bindable resource sets.
//!
//! A [`ResourceSet`] binds concrete values to the slots of one
//! [`Effect`](crate::effects::Effect). Raster and compute usage share the
//! type; [`Material`] and [`ComputeUnit`] are aliases that document intent.

mod resource_set;

pub use resource_set::{ComputeUnit, Material, ResourceSet, SharedResourceSet, TextureSource};
