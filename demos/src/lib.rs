//! # Lumen Demos
//!
//! Shared scene setup for the demo binaries.
//!
//! ## Available Demos
//!
//! - `ray_tracing_demo` - headless deferred ray-tracing frames with stats

use std::sync::Arc;

use lumen_core::math::Vec3;
use lumen_core::mesh::{generate_cube, generate_plane, generate_sphere};
use lumen_core::{Camera, Light, Transform};
use lumen_graphics::backend::Texel;
use lumen_graphics::{EffectRegistry, Mesh, ResourceSet, Result, Scene, SceneNode, builtin};
use rand::Rng;

/// Demos library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// A row of cubes and a sphere on a ground plane, lit by one point light.
///
/// Cube heights and colours are drawn from `rng`.
pub fn build_demo_scene(
    registry: &EffectRegistry,
    cubes: usize,
    rng: &mut impl Rng,
) -> Result<Scene> {
    let unlit = registry.effect(builtin::UNLIT)?;

    let mut ground = ResourceSet::new(Arc::clone(&unlit));
    ground.set_uniform("u_color", [0.6f32, 0.6, 0.6, 1.0])?;
    let mut root = SceneNode::new("root").with_child(
        SceneNode::new("ground")
            .with_transform(Transform::identity().with_translation(Vec3::new(0.0, -0.5, 0.0)))
            .with_drawable(Mesh::new(generate_plane(8.0)), ground.shared()),
    );

    let cube = Mesh::new(generate_cube(0.5));
    let spacing = 1.6;
    let offset = (cubes.saturating_sub(1)) as f32 * spacing * 0.5;
    for index in 0..cubes {
        let mut material = ResourceSet::new(Arc::clone(&unlit));
        let color: [f32; 4] = [
            rng.gen_range(0.2..1.0),
            rng.gen_range(0.2..1.0),
            rng.gen_range(0.2..1.0),
            1.0,
        ];
        material.set_uniform("u_color", color)?;
        let height = rng.gen_range(0.5f32..2.0);
        let transform = Transform::identity()
            .with_translation(Vec3::new(index as f32 * spacing - offset, height * 0.5 - 0.5, 0.0))
            .with_scale(Vec3::new(1.0, height, 1.0));
        root.add_child(
            SceneNode::new(format!("cube_{index}"))
                .with_transform(transform)
                .with_drawable(Arc::clone(&cube), material.shared()),
        );
    }

    let mut sphere = ResourceSet::new(unlit);
    sphere.set_uniform("u_color", [0.9f32, 0.9, 0.95, 1.0])?;
    root.add_child(
        SceneNode::new("sphere")
            .with_transform(Transform::identity().with_translation(Vec3::new(0.0, 0.3, 2.0)))
            .with_drawable(Mesh::new(generate_sphere(0.8, 24, 16)), sphere.shared()),
    );

    Ok(Scene::new(root)
        .with_camera(demo_camera(16.0 / 9.0))
        .with_light(Light::point(Vec3::new(3.0, 6.0, 4.0)).with_intensity(1.0)))
}

/// Camera looking at the cube row from the front and above.
pub fn demo_camera(aspect: f32) -> Camera {
    Camera::perspective(50f32.to_radians(), aspect, 0.1, 100.0)
        .with_name("main")
        .with_position(Vec3::new(0.0, 3.0, 8.0))
        .with_target(Vec3::new(0.0, 0.5, 0.0))
        .with_clear_color([0.05, 0.05, 0.08, 1.0])
}

/// Mean colour of `texels`, `None` when empty.
pub fn average_color(texels: &[Texel]) -> Option<Texel> {
    if texels.is_empty() {
        return None;
    }
    let mut sum = [0.0f64; 4];
    for texel in texels {
        for (acc, value) in sum.iter_mut().zip(texel) {
            *acc += f64::from(*value);
        }
    }
    let count = texels.len() as f64;
    Some(sum.map(|value| (value / count) as f32))
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumen_graphics::{BackendType, DeviceParameters, GraphicsDevice};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_average_color() {
        assert_eq!(average_color(&[]), None);
        let average = average_color(&[[0.0, 0.5, 1.0, 1.0], [1.0, 0.5, 0.0, 1.0]]).unwrap();
        assert_eq!(average, [0.5, 0.5, 0.5, 1.0]);
    }

    #[test]
    fn test_demo_scene_layout() {
        let device =
            GraphicsDevice::new(DeviceParameters::new().with_backend(BackendType::Dummy)).unwrap();
        let mut registry = EffectRegistry::new(device);
        builtin::register_builtin_textures(&mut registry).unwrap();
        builtin::register_builtin_effects(&mut registry).unwrap();

        let scene = build_demo_scene(&registry, 4, &mut StdRng::seed_from_u64(1)).unwrap();
        assert_eq!(scene.all_items().len(), 6);
        assert_eq!(scene.lights.len(), 1);
        assert_eq!(scene.cameras.len(), 1);
    }
}
