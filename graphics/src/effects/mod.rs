//! Effects: WGSL programs with declared uniform schemas and macro variants.
//!
//! - [`UniformSchema`] lists the value-uniform, texture and sampler slots
//! - [`Effect`] is the immutable compiled program shared by resource sets
//! - [`EffectRegistry`] owns named effects, families and textures
//! - [`builtin`] registers the stock textures and effects

pub mod builtin;
mod compiler;
mod effect;
mod preprocess;
mod registry;
mod uniform;

pub use compiler::{
    CompiledProgram, CompiledStage, ProgramId, ProgramReflection, ReflectedMember, ReflectedSampler,
    ReflectedTexture, ReflectedUniformBlock, ResourceBinding, ShaderStage, StageMask,
};
pub use effect::{Effect, EffectDescriptor, EffectId, EffectKind, EffectSources};
pub use preprocess::{MacroSet, preprocess, specialize};
pub use registry::{EffectGenerator, EffectRegistry};
pub use uniform::{
    SamplerSlotDescriptor, TextureSlotDescriptor, UNIFORM_BINDING, UNIFORM_BLOCK_NAME,
    UNIFORM_GROUP, UniformKind, UniformLayout, UniformSchema, UniformSlotDescriptor, UniformValue,
};
