//! Effect definition.
//!
//! An [`Effect`] is an immutable, shareable shader program plus its declared
//! uniform schema and macro switches. It is built once by the
//! [`EffectRegistry`](super::EffectRegistry) and shared by any number of
//! resource sets.
//!
//! Variants are compiled on demand: one physical program per distinct switch
//! combination, cached by the canonical macro key.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use super::compiler::{CompiledProgram, ShaderStage, compile_program};
use super::preprocess::MacroSet;
use super::uniform::{
    SamplerSlotDescriptor, TextureSlotDescriptor, UniformLayout, UniformSchema,
    UniformSlotDescriptor,
};
use crate::error::{GraphicsError, Result};
use crate::resources::Texture;
use crate::types::TextureDimension;

static NEXT_EFFECT_ID: AtomicU64 = AtomicU64::new(1);

/// Unique identifier of an effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EffectId(u64);

/// Whether an effect renders geometry or runs a compute program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EffectKind {
    Raster,
    Compute,
}

/// Shader sources of an effect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EffectSources {
    Raster { vertex: String, fragment: String },
    Compute { compute: String },
}

impl EffectSources {
    pub fn kind(&self) -> EffectKind {
        match self {
            Self::Raster { .. } => EffectKind::Raster,
            Self::Compute { .. } => EffectKind::Compute,
        }
    }

    fn stages(&self) -> Vec<(ShaderStage, &str)> {
        match self {
            Self::Raster { vertex, fragment } => vec![
                (ShaderStage::Vertex, vertex.as_str()),
                (ShaderStage::Fragment, fragment.as_str()),
            ],
            Self::Compute { compute } => vec![(ShaderStage::Compute, compute.as_str())],
        }
    }
}

/// Declarative definition of an effect.
///
/// Raster effects need vertex and fragment sources, compute effects need the
/// compute source only.
///
/// # Example
///
/// ```ignore
/// let desc = EffectDescriptor::raster("tint", VERTEX_WGSL, FRAGMENT_WGSL)
///     .with_uniform(UniformSlotDescriptor::vec4("u_color", [1.0; 4]))
///     .with_texture(TextureSlotDescriptor::new("u_texture", "white"))
///     .with_sampler(SamplerSlotDescriptor::new("u_sampler", SamplerDescriptor::linear()))
///     .with_macro("USE_TEXCOORD_0", false);
/// let effect = registry.build("tint", desc)?;
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EffectDescriptor {
    pub label: String,
    pub vertex: Option<String>,
    pub fragment: Option<String>,
    pub compute: Option<String>,
    pub schema: UniformSchema,
    /// Declared switches and their default values.
    pub macros: MacroSet,
}

impl EffectDescriptor {
    pub fn raster(
        label: impl Into<String>,
        vertex: impl Into<String>,
        fragment: impl Into<String>,
    ) -> Self {
        Self {
            label: label.into(),
            vertex: Some(vertex.into()),
            fragment: Some(fragment.into()),
            ..Default::default()
        }
    }

    pub fn compute(label: impl Into<String>, compute: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            compute: Some(compute.into()),
            ..Default::default()
        }
    }

    pub fn with_schema(mut self, schema: UniformSchema) -> Self {
        self.schema = schema;
        self
    }

    pub fn with_uniform(mut self, slot: UniformSlotDescriptor) -> Self {
        self.schema.uniforms.push(slot);
        self
    }

    pub fn with_texture(mut self, slot: TextureSlotDescriptor) -> Self {
        self.schema.textures.push(slot);
        self
    }

    pub fn with_sampler(mut self, slot: SamplerSlotDescriptor) -> Self {
        self.schema.samplers.push(slot);
        self
    }

    pub fn with_macro(mut self, name: impl Into<String>, enabled: bool) -> Self {
        self.macros.set(name, enabled);
        self
    }

    fn sources(&self) -> Result<EffectSources> {
        match (&self.vertex, &self.fragment, &self.compute) {
            (Some(vertex), Some(fragment), None) => Ok(EffectSources::Raster {
                vertex: vertex.clone(),
                fragment: fragment.clone(),
            }),
            (None, None, Some(compute)) => Ok(EffectSources::Compute {
                compute: compute.clone(),
            }),
            _ => Err(GraphicsError::InvalidParameter(format!(
                "effect '{}' needs either vertex and fragment sources or a compute source",
                self.label
            ))),
        }
    }
}

/// An immutable compiled effect.
pub struct Effect {
    id: EffectId,
    label: String,
    sources: EffectSources,
    schema: UniformSchema,
    layout: UniformLayout,
    macros: MacroSet,
    /// Resolved default texture per texture slot, `None` for output slots.
    default_textures: Vec<Option<Arc<Texture>>>,
    default_program: Arc<CompiledProgram>,
    variants: Mutex<HashMap<String, Arc<CompiledProgram>>>,
}

impl Effect {
    /// Validate `descriptor`, resolve texture defaults and compile the default variant.
    pub(crate) fn build(
        descriptor: EffectDescriptor,
        resolve_texture: impl Fn(&str) -> Option<Arc<Texture>>,
    ) -> Result<Self> {
        let label = descriptor.label.clone();
        let sources = descriptor.sources()?;
        descriptor.schema.validate(&label)?;
        if sources.kind() == EffectKind::Raster
            && descriptor.schema.output_textures().next().is_some()
        {
            return Err(GraphicsError::Schema {
                effect: label,
                message: "raster effects cannot declare output texture slots".into(),
            });
        }

        let default_textures = descriptor
            .schema
            .textures
            .iter()
            .map(|slot| match &slot.default {
                Some(name) => resolve_texture(name).map(Some).ok_or_else(|| GraphicsError::Schema {
                    effect: label.clone(),
                    message: format!(
                        "default texture '{name}' of slot '{}' is not registered",
                        slot.name
                    ),
                }),
                None => Ok(None),
            })
            .collect::<Result<Vec<_>>>()?;

        let layout = descriptor.schema.layout();
        let program = compile_program(
            &label,
            &sources.stages(),
            &descriptor.schema,
            &layout,
            &descriptor.macros,
        )?;

        for (slot, default) in descriptor.schema.textures.iter().zip(&default_textures) {
            let reflected = program.reflection().textures.get(&slot.name);
            let (Some(reflected), Some(texture)) = (reflected, default) else {
                continue;
            };
            let is_cube = texture.dimension() == TextureDimension::Cube;
            if reflected.cube != is_cube {
                return Err(GraphicsError::Schema {
                    effect: label,
                    message: format!(
                        "slot '{}' is {} in the shader but its default texture is not",
                        slot.name,
                        if reflected.cube { "a cube texture" } else { "a 2D texture" }
                    ),
                });
            }
        }

        let default_program = Arc::new(program);
        let mut variants = HashMap::new();
        variants.insert(default_program.variant_key().to_string(), Arc::clone(&default_program));

        log::info!(
            "Built {:?} effect '{}' ({} uniforms, {} textures, {} samplers)",
            sources.kind(),
            label,
            descriptor.schema.uniforms.len(),
            descriptor.schema.textures.len(),
            descriptor.schema.samplers.len()
        );

        Ok(Self {
            id: EffectId(NEXT_EFFECT_ID.fetch_add(1, Ordering::Relaxed)),
            label,
            sources,
            schema: descriptor.schema,
            layout,
            macros: descriptor.macros,
            default_textures,
            default_program,
            variants: Mutex::new(variants),
        })
    }

    pub fn id(&self) -> EffectId {
        self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn kind(&self) -> EffectKind {
        self.sources.kind()
    }

    pub fn sources(&self) -> &EffectSources {
        &self.sources
    }

    pub fn schema(&self) -> &UniformSchema {
        &self.schema
    }

    pub fn layout(&self) -> &UniformLayout {
        &self.layout
    }

    /// Declared switches with their default values.
    pub fn macros(&self) -> &MacroSet {
        &self.macros
    }

    pub(crate) fn default_texture(&self, index: usize) -> Option<&Arc<Texture>> {
        self.default_textures.get(index).and_then(Option::as_ref)
    }

    /// Program compiled with the declared switch defaults.
    pub fn default_program(&self) -> &Arc<CompiledProgram> {
        &self.default_program
    }

    /// Program for the declared switches with `overrides` applied.
    ///
    /// Compiled on first request, cached afterwards.
    pub fn variant(&self, overrides: &MacroSet) -> Result<Arc<CompiledProgram>> {
        if let Some((name, _)) = overrides.iter().find(|(name, _)| !self.macros.contains(name)) {
            return Err(GraphicsError::UnknownMacro {
                effect: self.label.clone(),
                name: name.to_string(),
            });
        }
        let macros = self.macros.overlaid(overrides);
        let key = macros.key();

        let mut variants = self.variants.lock();
        if let Some(program) = variants.get(&key) {
            return Ok(Arc::clone(program));
        }
        let program = Arc::new(compile_program(
            &self.label,
            &self.sources.stages(),
            &self.schema,
            &self.layout,
            &macros,
        )?);
        variants.insert(key, Arc::clone(&program));
        Ok(program)
    }

    /// Number of variants compiled so far.
    pub fn variant_count(&self) -> usize {
        self.variants.lock().len()
    }
}

impl std::fmt::Debug for Effect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Effect")
            .field("id", &self.id)
            .field("label", &self.label)
            .field("kind", &self.kind())
            .field("uniforms", &self.schema.uniforms.len())
            .field("textures", &self.schema.textures.len())
            .field("samplers", &self.schema.samplers.len())
            .field("variants", &self.variant_count())
            .finish()
    }
}

static_assertions::assert_impl_all!(Effect: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::UniformSlotDescriptor;

    const FILL_CS: &str = r#"
@group(0) @binding(1) var u_output: texture_storage_2d<rgba8unorm, write>;

@compute @workgroup_size(8, 8, 1)
fn cs_main(@builtin(global_invocation_id) id: vec3<u32>) {
#if BRIGHT
    let value = uniforms.u_value * 2.0;
#else
    let value = uniforms.u_value;
#endif
    textureStore(u_output, vec2<i32>(id.xy), vec4<f32>(value));
}
"#;

    fn fill_effect() -> Effect {
        let desc = EffectDescriptor::compute("fill", FILL_CS)
            .with_uniform(UniformSlotDescriptor::scalar("u_value", 0.5))
            .with_texture(TextureSlotDescriptor::output("u_output"))
            .with_macro("BRIGHT", false);
        Effect::build(desc, |_| None).unwrap()
    }

    #[test]
    fn test_mixed_sources_rejected() {
        let mut desc = EffectDescriptor::compute("broken", FILL_CS);
        desc.vertex = Some(String::from("@vertex fn vs_main() {}"));
        assert!(matches!(
            Effect::build(desc, |_| None),
            Err(GraphicsError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_variants_cached_by_key() {
        let effect = fill_effect();
        assert_eq!(effect.kind(), EffectKind::Compute);
        assert_eq!(effect.variant_count(), 1);

        let bright = effect.variant(&MacroSet::new().with("BRIGHT", true)).unwrap();
        let again = effect.variant(&MacroSet::new().with("BRIGHT", true)).unwrap();
        assert!(Arc::ptr_eq(&bright, &again));
        assert_eq!(effect.variant_count(), 2);

        // Overriding with the default value resolves to the default program.
        let default = effect.variant(&MacroSet::new().with("BRIGHT", false)).unwrap();
        assert!(Arc::ptr_eq(&default, effect.default_program()));
    }

    #[test]
    fn test_unknown_macro_rejected() {
        let effect = fill_effect();
        let result = effect.variant(&MacroSet::new().with("USE_FOG", true));
        assert!(matches!(result, Err(GraphicsError::UnknownMacro { .. })));
    }

    #[test]
    fn test_unregistered_default_texture_is_schema_error() {
        let desc = EffectDescriptor::compute("fill", FILL_CS)
            .with_uniform(UniformSlotDescriptor::scalar("u_value", 0.5))
            .with_texture(TextureSlotDescriptor::output("u_output"))
            .with_texture(TextureSlotDescriptor::new("u_input", "missing"))
            .with_macro("BRIGHT", false);
        assert!(matches!(Effect::build(desc, |_| None), Err(GraphicsError::Schema { .. })));
    }
}
