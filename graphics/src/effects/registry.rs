//! Named effects and textures.
//!
//! The [`EffectRegistry`] is the explicit context that owns every effect,
//! parametric effect family and named texture of a renderer. Textures that
//! effects name as slot defaults must be registered before those effects
//! are built.

use std::collections::HashMap;
use std::sync::Arc;

use super::effect::{Effect, EffectDescriptor};
use crate::device::GraphicsDevice;
use crate::error::{GraphicsError, Result};
use crate::resources::Texture;

/// Generator of a parametric effect family.
pub type EffectGenerator = Box<dyn Fn(u32) -> Result<EffectDescriptor> + Send + Sync>;

struct EffectFamily {
    generator: EffectGenerator,
    instances: HashMap<u32, Arc<Effect>>,
}

/// Owner of named effects, effect families and textures.
pub struct EffectRegistry {
    device: Arc<GraphicsDevice>,
    textures: HashMap<String, Arc<Texture>>,
    effects: HashMap<String, Arc<Effect>>,
    families: HashMap<String, EffectFamily>,
}

impl EffectRegistry {
    pub fn new(device: Arc<GraphicsDevice>) -> Self {
        Self {
            device,
            textures: HashMap::new(),
            effects: HashMap::new(),
            families: HashMap::new(),
        }
    }

    pub fn device(&self) -> &Arc<GraphicsDevice> {
        &self.device
    }

    /// Register a texture under `name` so effects can use it as a slot default.
    pub fn register_texture(
        &mut self,
        name: impl Into<String>,
        texture: Texture,
    ) -> Result<Arc<Texture>> {
        let name = name.into();
        if self.textures.contains_key(&name) {
            return Err(GraphicsError::InvalidParameter(format!(
                "texture '{name}' is already registered"
            )));
        }
        let texture = Arc::new(texture);
        log::debug!("Registered texture '{name}' ({}x{})", texture.width(), texture.height());
        self.textures.insert(name, Arc::clone(&texture));
        Ok(texture)
    }

    pub fn texture(&self, name: &str) -> Option<Arc<Texture>> {
        self.textures.get(name).cloned()
    }

    /// Compile `descriptor` and register the effect under `name`.
    pub fn build(
        &mut self,
        name: impl Into<String>,
        descriptor: EffectDescriptor,
    ) -> Result<Arc<Effect>> {
        let name = name.into();
        if self.effects.contains_key(&name) {
            return Err(GraphicsError::InvalidParameter(format!(
                "effect '{name}' is already registered"
            )));
        }
        let effect = Arc::new(Effect::build(descriptor, |texture| self.texture(texture))?);
        self.effects.insert(name, Arc::clone(&effect));
        Ok(effect)
    }

    pub fn effect(&self, name: &str) -> Result<Arc<Effect>> {
        self.effects
            .get(name)
            .cloned()
            .ok_or_else(|| GraphicsError::InvalidParameter(format!("no effect named '{name}'")))
    }

    pub fn effect_names(&self) -> impl Iterator<Item = &str> {
        self.effects.keys().map(String::as_str)
    }

    /// Register a parametric family. `generator` builds a descriptor for one
    /// parameter value, usually by specialising its shader source.
    pub fn register_family(
        &mut self,
        name: impl Into<String>,
        generator: impl Fn(u32) -> Result<EffectDescriptor> + Send + Sync + 'static,
    ) -> Result<()> {
        let name = name.into();
        if self.families.contains_key(&name) {
            return Err(GraphicsError::InvalidParameter(format!(
                "effect family '{name}' is already registered"
            )));
        }
        self.families.insert(
            name,
            EffectFamily {
                generator: Box::new(generator),
                instances: HashMap::new(),
            },
        );
        Ok(())
    }

    /// Effect of family `name` built for `parameter`.
    ///
    /// Each parameter value is compiled once; the instance label is
    /// `name@parameter`.
    pub fn family(&mut self, name: &str, parameter: u32) -> Result<Arc<Effect>> {
        let family = self
            .families
            .get(name)
            .ok_or_else(|| {
                GraphicsError::InvalidParameter(format!("no effect family named '{name}'"))
            })?;
        if let Some(effect) = family.instances.get(&parameter) {
            return Ok(Arc::clone(effect));
        }

        let mut descriptor = (family.generator)(parameter)?;
        descriptor.label = format!("{name}@{parameter}");
        let textures = &self.textures;
        let effect = Arc::new(Effect::build(descriptor, |texture| textures.get(texture).cloned())?);

        if let Some(family) = self.families.get_mut(name) {
            family.instances.insert(parameter, Arc::clone(&effect));
        }
        Ok(effect)
    }
}

impl std::fmt::Debug for EffectRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EffectRegistry")
            .field("textures", &self.textures.len())
            .field("effects", &self.effects.len())
            .field("families", &self.families.len())
            .finish()
    }
}

#[cfg(all(test, feature = "dummy"))]
mod tests {
    use super::*;
    use crate::backend::BackendType;
    use crate::device::DeviceParameters;
    use crate::effects::{TextureSlotDescriptor, UniformSlotDescriptor, specialize};

    const SCALE_CS: &str = r#"
@group(0) @binding(1) var u_output: texture_storage_2d<rgba8unorm, write>;

const SCALE: f32 = ${SCALE};

@compute @workgroup_size(8, 8, 1)
fn cs_main(@builtin(global_invocation_id) id: vec3<u32>) {
    textureStore(u_output, vec2<i32>(id.xy), vec4<f32>(uniforms.u_base * SCALE));
}
"#;

    fn registry() -> EffectRegistry {
        let device =
            GraphicsDevice::new(DeviceParameters::new().with_backend(BackendType::Dummy)).unwrap();
        EffectRegistry::new(device)
    }

    fn scale_descriptor(scale: u32) -> Result<EffectDescriptor> {
        if scale == 0 {
            return Err(GraphicsError::InvalidParameter("scale must be positive".into()));
        }
        let source = specialize(SCALE_CS, &[("SCALE", format!("{scale}.0"))]).unwrap();
        Ok(EffectDescriptor::compute("scale", source)
            .with_uniform(UniformSlotDescriptor::scalar("u_base", 0.1))
            .with_texture(TextureSlotDescriptor::output("u_output")))
    }

    #[test]
    fn test_duplicate_effect_rejected() {
        let mut registry = registry();
        registry.build("scale", scale_descriptor(1).unwrap()).unwrap();
        assert!(matches!(
            registry.build("scale", scale_descriptor(2).unwrap()),
            Err(GraphicsError::InvalidParameter(_))
        ));
        assert!(registry.effect("scale").is_ok());
        assert!(registry.effect("missing").is_err());
    }

    #[test]
    fn test_family_instances_cached() {
        let mut registry = registry();
        registry.register_family("scale", scale_descriptor).unwrap();
        let a = registry.family("scale", 3).unwrap();
        let b = registry.family("scale", 3).unwrap();
        let c = registry.family("scale", 4).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(a.label(), "scale@3");
        assert!(registry.family("blur", 1).is_err());
    }

    #[test]
    fn test_family_generator_error_propagates() {
        let mut registry = registry();
        registry.register_family("scale", scale_descriptor).unwrap();
        assert!(matches!(
            registry.family("scale", 0),
            Err(GraphicsError::InvalidParameter(_))
        ));
        // A failed parameter is not cached.
        assert!(registry.family("scale", 0).is_err());
        assert!(registry.family("scale", 1).is_ok());
    }
}
