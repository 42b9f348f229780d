//! Resource set: current values for every slot of one effect.
//!
//! Every explicit setter marks its slot, and with it the set, dirty. The
//! upload step reads [`ResourceSet::is_dirty`] to skip unchanged state and
//! clears it with [`ResourceSet::mark_clean`] after submission.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

use crate::backend::{BoundSampler, BoundTexture, ProgramBindings, ResourceSetId};
use crate::effects::{CompiledProgram, Effect, EffectKind, MacroSet, UniformValue};
use crate::error::{GraphicsError, Result, SlotCategory};
use crate::resources::Texture;
use crate::targets::{ChannelView, RenderTexture};
use crate::types::{SamplerDescriptor, TextureDimension, TextureFormat};

static NEXT_SET_ID: AtomicU64 = AtomicU64::new(1);

/// A resource set shared between the scene and the orchestrator.
pub type SharedResourceSet = Arc<RwLock<ResourceSet>>;

/// A resource set bound to a raster effect.
pub type Material = ResourceSet;

/// A resource set bound to a compute effect.
pub type ComputeUnit = ResourceSet;

/// What a texture slot reads from or writes to.
#[derive(Debug, Clone)]
pub enum TextureSource {
    /// A standalone texture.
    Texture(Arc<Texture>),
    /// One channel of a render texture.
    Channel(ChannelView),
}

impl TextureSource {
    pub fn texture_id(&self) -> crate::backend::GpuTextureId {
        match self {
            Self::Texture(texture) => texture.id(),
            Self::Channel(view) => view.texture_id(),
        }
    }

    pub fn format(&self) -> TextureFormat {
        match self {
            Self::Texture(texture) => texture.format(),
            Self::Channel(view) => view.format(),
        }
    }

    pub fn dimension(&self) -> TextureDimension {
        match self {
            Self::Texture(texture) => texture.dimension(),
            Self::Channel(_) => TextureDimension::D2,
        }
    }

    pub fn size(&self) -> (u32, u32) {
        match self {
            Self::Texture(texture) => (texture.width(), texture.height()),
            Self::Channel(view) => (view.width(), view.height()),
        }
    }

    /// Whether the source can be written by a compute program.
    pub fn is_storage(&self) -> bool {
        match self {
            Self::Texture(_) => false,
            Self::Channel(view) => view.is_storage() && view.format().supports_storage(),
        }
    }

    /// `false` for a channel of a destroyed render texture.
    pub fn is_alive(&self) -> bool {
        match self {
            Self::Texture(_) => true,
            Self::Channel(view) => view.is_alive(),
        }
    }

    /// Human-readable origin, used in error messages.
    pub fn describe(&self) -> String {
        match self {
            Self::Texture(texture) => {
                format!("texture {:?}", texture.label().unwrap_or("<unnamed>"))
            }
            Self::Channel(view) => {
                format!("channel '{}' of '{}'", view.channel(), view.target_label())
            }
        }
    }
}

/// Current values for every declared slot of an effect.
pub struct ResourceSet {
    id: ResourceSetId,
    effect: Arc<Effect>,
    program: Arc<CompiledProgram>,
    macros: MacroSet,
    uniforms: Vec<UniformValue>,
    /// `None` only for output slots that have not been bound yet.
    textures: Vec<Option<TextureSource>>,
    samplers: Vec<SamplerDescriptor>,
    dirty_uniforms: Vec<bool>,
    dirty_textures: Vec<bool>,
    dirty_samplers: Vec<bool>,
}

impl ResourceSet {
    /// A set holding the effect's declared defaults, fully dirty.
    pub fn new(effect: Arc<Effect>) -> Self {
        let schema = effect.schema();
        let uniforms: Vec<UniformValue> =
            schema.uniforms.iter().map(|slot| slot.default.clone()).collect();
        let textures: Vec<Option<TextureSource>> = (0..schema.textures.len())
            .map(|index| effect.default_texture(index).cloned().map(TextureSource::Texture))
            .collect();
        let samplers: Vec<SamplerDescriptor> =
            schema.samplers.iter().map(|slot| slot.default.clone()).collect();

        Self {
            id: ResourceSetId(NEXT_SET_ID.fetch_add(1, Ordering::Relaxed)),
            program: Arc::clone(effect.default_program()),
            macros: MacroSet::new(),
            dirty_uniforms: vec![true; uniforms.len()],
            dirty_textures: vec![true; textures.len()],
            dirty_samplers: vec![true; samplers.len()],
            uniforms,
            textures,
            samplers,
            effect,
        }
    }

    /// Wrap into a [`SharedResourceSet`].
    pub fn shared(self) -> SharedResourceSet {
        Arc::new(RwLock::new(self))
    }

    pub fn id(&self) -> ResourceSetId {
        self.id
    }

    pub fn effect(&self) -> &Arc<Effect> {
        &self.effect
    }

    pub fn kind(&self) -> EffectKind {
        self.effect.kind()
    }

    /// Program of the currently selected macro variant.
    pub fn program(&self) -> &Arc<CompiledProgram> {
        &self.program
    }

    /// Macro overrides applied on top of the effect's defaults.
    pub fn macros(&self) -> &MacroSet {
        &self.macros
    }

    fn unknown(&self, category: SlotCategory, name: &str) -> GraphicsError {
        GraphicsError::UnknownSlot {
            effect: self.effect.label().to_string(),
            category,
            name: name.to_string(),
        }
    }

    /// Set a value uniform. The value must carry exactly the slot's float count.
    pub fn set_uniform(&mut self, name: &str, value: impl Into<UniformValue>) -> Result<()> {
        let value = value.into();
        let (index, slot) = self
            .effect
            .schema()
            .uniform(name)
            .ok_or_else(|| self.unknown(SlotCategory::Uniform, name))?;
        if value.len() != slot.float_count() {
            return Err(GraphicsError::TypeMismatch {
                name: name.to_string(),
                expected: slot.shape(),
                actual: format!("{} floats", value.len()),
            });
        }
        self.uniforms[index] = value;
        self.dirty_uniforms[index] = true;
        Ok(())
    }

    /// Bind a standalone texture to a texture slot.
    pub fn set_texture(&mut self, name: &str, texture: Arc<Texture>) -> Result<()> {
        self.bind_texture(name, TextureSource::Texture(texture))
    }

    /// Bind channel `channel` of `target` to a texture slot.
    pub fn set_channel(&mut self, name: &str, target: &RenderTexture, channel: &str) -> Result<()> {
        if self.effect.schema().texture(name).is_none() {
            return Err(self.unknown(SlotCategory::Texture, name));
        }
        let view = target.channel(channel)?;
        self.bind_texture(name, TextureSource::Channel(view))
    }

    /// Bind an already resolved channel view to a texture slot.
    pub fn set_channel_view(&mut self, name: &str, view: ChannelView) -> Result<()> {
        self.bind_texture(name, TextureSource::Channel(view))
    }

    /// Bind the first channel of `target` to a texture slot.
    pub fn set_render_texture(&mut self, name: &str, target: &RenderTexture) -> Result<()> {
        let first = target.channel_names().next().unwrap_or_default().to_string();
        self.set_channel(name, target, &first)
    }

    fn bind_texture(&mut self, name: &str, source: TextureSource) -> Result<()> {
        let (index, _) = self
            .effect
            .schema()
            .texture(name)
            .ok_or_else(|| self.unknown(SlotCategory::Texture, name))?;
        self.textures[index] = Some(source);
        self.dirty_textures[index] = true;
        Ok(())
    }

    pub fn set_sampler(&mut self, name: &str, sampler: SamplerDescriptor) -> Result<()> {
        let (index, _) = self
            .effect
            .schema()
            .sampler(name)
            .ok_or_else(|| self.unknown(SlotCategory::Sampler, name))?;
        self.samplers[index] = sampler;
        self.dirty_samplers[index] = true;
        Ok(())
    }

    /// Override a macro switch, selecting another program variant.
    pub fn set_macro(&mut self, name: &str, enabled: bool) -> Result<()> {
        let macros = self.macros.clone().with(name, enabled);
        let program = self.effect.variant(&macros)?;
        if !Arc::ptr_eq(&program, &self.program) {
            log::debug!(
                "Resource set of '{}' switched to variant [{}]",
                self.effect.label(),
                program.variant_key()
            );
            self.program = program;
            // A new program needs its bindings recreated.
            self.dirty_textures.iter_mut().for_each(|d| *d = true);
            self.dirty_samplers.iter_mut().for_each(|d| *d = true);
        }
        self.macros = macros;
        Ok(())
    }

    /// Assign a value the orchestrator derives, marking it dirty only when it changed.
    ///
    /// Returns `false` when the effect does not declare `name` with that shape.
    pub(crate) fn assign_semantic(&mut self, name: &str, value: UniformValue) -> bool {
        let Some((index, slot)) = self.effect.schema().uniform(name) else {
            return false;
        };
        if slot.float_count() != value.len() {
            log::warn!(
                "Effect '{}' declares '{name}' as {}, expected {} floats; not filled",
                self.effect.label(),
                slot.shape(),
                value.len()
            );
            return false;
        }
        if self.uniforms[index] != value {
            self.uniforms[index] = value;
            self.dirty_uniforms[index] = true;
        }
        true
    }

    pub fn uniform(&self, name: &str) -> Option<&UniformValue> {
        self.effect.schema().uniform(name).map(|(index, _)| &self.uniforms[index])
    }

    pub fn texture(&self, name: &str) -> Option<&TextureSource> {
        self.effect
            .schema()
            .texture(name)
            .and_then(|(index, _)| self.textures[index].as_ref())
    }

    pub fn sampler(&self, name: &str) -> Option<&SamplerDescriptor> {
        self.effect.schema().sampler(name).map(|(index, _)| &self.samplers[index])
    }

    /// Texture slots declared as compute outputs, with their current source.
    pub fn output_slots(&self) -> impl Iterator<Item = (&str, Option<&TextureSource>)> {
        self.effect
            .schema()
            .textures
            .iter()
            .zip(&self.textures)
            .filter(|(slot, _)| slot.as_output)
            .map(|(slot, source)| (slot.name.as_str(), source.as_ref()))
    }

    /// Texture slots read by the program, with their current source.
    pub fn input_slots(&self) -> impl Iterator<Item = (&str, Option<&TextureSource>)> {
        self.effect
            .schema()
            .textures
            .iter()
            .zip(&self.textures)
            .filter(|(slot, _)| !slot.as_output)
            .map(|(slot, source)| (slot.name.as_str(), source.as_ref()))
    }

    /// Packed uniform block bytes for the current values.
    pub fn uniform_payload(&self) -> Vec<u8> {
        self.effect.layout().pack(self.effect.schema(), &self.uniforms)
    }

    pub fn is_dirty(&self) -> bool {
        self.uniforms_dirty()
            || self.dirty_textures.contains(&true)
            || self.dirty_samplers.contains(&true)
    }

    pub fn uniforms_dirty(&self) -> bool {
        self.dirty_uniforms.contains(&true)
    }

    /// Whether the named slot (of any category) changed since the last upload.
    pub fn is_slot_dirty(&self, name: &str) -> bool {
        let schema = self.effect.schema();
        if let Some((index, _)) = schema.uniform(name) {
            return self.dirty_uniforms[index];
        }
        if let Some((index, _)) = schema.texture(name) {
            return self.dirty_textures[index];
        }
        schema.sampler(name).is_some_and(|(index, _)| self.dirty_samplers[index])
    }

    /// Clear every dirty flag.
    pub fn mark_clean(&mut self) {
        for flags in [
            &mut self.dirty_uniforms,
            &mut self.dirty_textures,
            &mut self.dirty_samplers,
        ] {
            flags.iter_mut().for_each(|d| *d = false);
        }
    }

    /// Snapshot of the bindings for one submission.
    ///
    /// Unbound output slots are skipped; callers validate them beforehand.
    pub(crate) fn bindings(&self) -> ProgramBindings {
        let schema = self.effect.schema();
        let reflection = self.program.reflection();

        let textures = schema
            .textures
            .iter()
            .zip(&self.textures)
            .filter_map(|(slot, source)| {
                let source = source.as_ref()?;
                let (width, height) = source.size();
                Some(BoundTexture {
                    slot: slot.name.clone(),
                    binding: reflection.textures.get(&slot.name).map(|t| t.binding),
                    texture: source.texture_id(),
                    format: source.format(),
                    dimension: source.dimension(),
                    width,
                    height,
                    storage: slot.as_output,
                })
            })
            .collect();

        let samplers = schema
            .samplers
            .iter()
            .zip(&self.samplers)
            .map(|(slot, descriptor)| BoundSampler {
                slot: slot.name.clone(),
                binding: reflection.samplers.get(&slot.name).map(|s| s.binding),
                descriptor: descriptor.clone(),
            })
            .collect();

        ProgramBindings {
            set: self.id,
            uniform_payload: self.uniform_payload(),
            uniforms_dirty: self.uniforms_dirty(),
            uniforms: schema
                .uniforms
                .iter()
                .zip(&self.uniforms)
                .map(|(slot, value)| (slot.name.clone(), value.clone()))
                .collect(),
            textures,
            samplers,
        }
    }
}

impl std::fmt::Debug for ResourceSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceSet")
            .field("id", &self.id)
            .field("effect", &self.effect.label())
            .field("variant", &self.program.variant_key())
            .field("dirty", &self.is_dirty())
            .finish()
    }
}

static_assertions::assert_impl_all!(ResourceSet: Send, Sync);
