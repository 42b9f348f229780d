//! Well-known uniforms the orchestrator fills from the camera, lights and target.

use lumen_core::math::{Mat4, Vec4};
use lumen_core::{Camera, Light, LightKind};

use crate::effects::UniformValue;
use crate::materials::ResourceSet;

pub const U_WORLD: &str = "u_world";
pub const U_VIEW: &str = "u_view";
pub const U_PROJ: &str = "u_proj";
pub const U_VP: &str = "u_vp";
pub const U_SKY_VP: &str = "u_skyVP";
pub const U_CAMERA_POS: &str = "u_cameraPos";
pub const U_SCREEN_SIZE: &str = "u_screenSize";
pub const U_LIGHT_POS: &str = "u_lightPos";
pub const U_LIGHT_DIR: &str = "u_lightDir";
pub const U_LIGHT_COLOR: &str = "u_lightColor";

/// Inputs semantic uniforms are derived from.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SemanticInputs<'a> {
    pub world: Option<&'a Mat4>,
    pub camera: Option<&'a Camera>,
    pub lights: &'a [Light],
    pub screen_size: (u32, u32),
}

/// Fill every semantic uniform `set` declares. Unchanged values stay clean.
///
/// Returns the number of uniforms filled.
pub(crate) fn apply(set: &mut ResourceSet, inputs: &SemanticInputs<'_>) -> usize {
    let mut values: Vec<(&str, UniformValue)> = Vec::with_capacity(10);

    if let Some(world) = inputs.world {
        values.push((U_WORLD, world.into()));
    }
    if let Some(camera) = inputs.camera {
        values.push((U_VIEW, camera.view().into()));
        values.push((U_PROJ, camera.projection_matrix().into()));
        values.push((U_VP, camera.view_projection().into()));
        values.push((U_SKY_VP, camera.sky_view_projection().into()));
        values.push((U_CAMERA_POS, camera.position.into()));
    }
    let (width, height) = inputs.screen_size;
    values.push((U_SCREEN_SIZE, [width as f32, height as f32].into()));

    if let Some(light) = inputs.lights.first() {
        let w = match light.kind {
            LightKind::Point => 1.0,
            LightKind::Directional => 0.0,
        };
        let p = light.position;
        // vec4 slots carry the light kind in w; vec3 slots get the position only.
        let declared = set
            .effect()
            .schema()
            .uniform(U_LIGHT_POS)
            .map(|(_, slot)| slot.float_count());
        let position = match declared {
            Some(3) => UniformValue::from(p),
            _ => Vec4::new(p.x, p.y, p.z, w).into(),
        };
        values.push((U_LIGHT_POS, position));
        values.push((U_LIGHT_DIR, light.direction.into()));
        values.push((U_LIGHT_COLOR, light.radiance().into()));
    }

    values
        .into_iter()
        .filter(|(name, value)| set.assign_semantic(name, value.clone()))
        .count()
}

#[cfg(all(test, feature = "dummy"))]
mod tests {
    use super::*;
    use crate::backend::BackendType;
    use crate::device::{DeviceParameters, GraphicsDevice};
    use crate::effects::{
        EffectDescriptor, EffectRegistry, TextureSlotDescriptor, UniformSlotDescriptor, builtin,
    };
    use lumen_core::math::Vec3;

    const LIGHT_POS_CS: &str = r#"
@group(0) @binding(1) var u_output: texture_storage_2d<rgba8unorm, write>;

@compute @workgroup_size(8, 8, 1)
fn cs_main(@builtin(global_invocation_id) id: vec3<u32>) {
    textureStore(u_output, vec2<i32>(id.xy), vec4<f32>(uniforms.u_lightPos, 1.0));
}
"#;

    fn registry() -> EffectRegistry {
        let device =
            GraphicsDevice::new(DeviceParameters::new().with_backend(BackendType::Dummy)).unwrap();
        let mut registry = EffectRegistry::new(device);
        builtin::register_builtin_textures(&mut registry).unwrap();
        builtin::register_builtin_effects(&mut registry).unwrap();
        registry
    }

    #[test]
    fn test_fills_declared_semantics_only() {
        let registry = registry();
        let mut set = ResourceSet::new(registry.effect(builtin::GREEN).unwrap());
        let camera =
            Camera::perspective(1.0, 1.0, 0.1, 10.0).with_position(Vec3::new(0.0, 0.0, 3.0));
        let world = Mat4::new_translation(&Vec3::new(1.0, 2.0, 3.0));
        let inputs = SemanticInputs {
            world: Some(&world),
            camera: Some(&camera),
            lights: &[],
            screen_size: (4, 4),
        };
        // green declares u_world and u_vp.
        assert_eq!(apply(&mut set, &inputs), 2);
        assert_eq!(set.uniform(U_VP), Some(&UniformValue::from(camera.view_projection())));
    }

    #[test]
    fn test_unchanged_values_stay_clean() {
        let registry = registry();
        let mut set = ResourceSet::new(registry.effect(builtin::RT_SHADE).unwrap());
        let light = Light::point(Vec3::new(0.0, 5.0, 0.0)).with_intensity(2.0);
        let inputs = SemanticInputs {
            world: None,
            camera: None,
            lights: std::slice::from_ref(&light),
            screen_size: (8, 8),
        };
        apply(&mut set, &inputs);
        assert_eq!(set.uniform(U_LIGHT_POS).unwrap().as_slice(), &[0.0, 5.0, 0.0, 1.0]);
        assert_eq!(set.uniform(U_LIGHT_COLOR).unwrap().as_slice(), &[2.0, 2.0, 2.0]);

        set.mark_clean();
        apply(&mut set, &inputs);
        assert!(!set.is_dirty());

        let moved = SemanticInputs {
            screen_size: (16, 8),
            ..inputs
        };
        apply(&mut set, &moved);
        assert!(set.is_slot_dirty(U_SCREEN_SIZE));
        assert!(!set.is_slot_dirty(U_LIGHT_POS));
    }

    #[test]
    fn test_vec3_light_position_filled() {
        let mut registry = registry();
        registry
            .build(
                "light_pos",
                EffectDescriptor::compute("light_pos", LIGHT_POS_CS)
                    .with_uniform(UniformSlotDescriptor::vec3("u_lightPos", [0.0; 3]))
                    .with_texture(TextureSlotDescriptor::output("u_output")),
            )
            .unwrap();
        let mut set = ResourceSet::new(registry.effect("light_pos").unwrap());
        let light = Light::point(Vec3::new(1.0, 2.0, 3.0));
        let inputs = SemanticInputs {
            world: None,
            camera: None,
            lights: std::slice::from_ref(&light),
            screen_size: (8, 8),
        };
        assert_eq!(apply(&mut set, &inputs), 1);
        assert_eq!(set.uniform(U_LIGHT_POS).unwrap().as_slice(), &[1.0, 2.0, 3.0]);
    }
}
