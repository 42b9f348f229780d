//! Ray-tracing manager that shades the G-buffer in screen space.

use std::sync::Arc;

use lumen_core::math::{Mat4, Vec3};
use lumen_core::mesh::generate_cube;
use lumen_core::{Aabb, CpuMesh};

use super::RayTracingManager;
use crate::effects::{EffectRegistry, builtin};
use crate::error::Result;
use crate::materials::{ResourceSet, SharedResourceSet};
use crate::resources::Mesh;
use crate::scene::DrawItem;
use crate::targets::RenderTexture;

/// Colour of the bounds overlay.
const DEBUG_COLOR: [f32; 4] = [0.2, 1.0, 0.3, 1.0];

/// Edge thickness of the bounds overlay, relative to the box diagonal.
const DEBUG_EDGE_SCALE: f32 = 0.005;

/// Flattens the processed items into one world-space mesh rendered into the
/// G-buffer, and shades the G-buffer with the `rt_shade` compute unit.
pub struct ScreenSpaceTracer {
    g_buffer_material: SharedResourceSet,
    debug_material: SharedResourceSet,
    unit: SharedResourceSet,
    g_buffer_mesh: Option<DrawItem>,
    bvh_debug_mesh: Option<DrawItem>,
    bounds: Option<Aabb>,
    process_count: u64,
}

impl ScreenSpaceTracer {
    pub fn new(registry: &EffectRegistry) -> Result<Self> {
        let mut debug = ResourceSet::new(registry.effect(builtin::UNLIT)?);
        debug.set_uniform("u_color", DEBUG_COLOR)?;
        Ok(Self {
            g_buffer_material: ResourceSet::new(registry.effect(builtin::RT_GBUFFER)?).shared(),
            debug_material: debug.shared(),
            unit: ResourceSet::new(registry.effect(builtin::RT_SHADE)?).shared(),
            g_buffer_mesh: None,
            bvh_debug_mesh: None,
            bounds: None,
            process_count: 0,
        })
    }

    /// Material the G-buffer mesh is drawn with.
    pub fn g_buffer_material(&self) -> &SharedResourceSet {
        &self.g_buffer_material
    }

    /// World-space bounds of the processed geometry.
    pub fn bounds(&self) -> Option<Aabb> {
        self.bounds
    }

    /// Number of times [`RayTracingManager::process`] ran.
    pub fn process_count(&self) -> u64 {
        self.process_count
    }
}

/// Twelve thin boxes along the edges of `bounds`.
fn bounds_wireframe(bounds: &Aabb) -> CpuMesh {
    let size = bounds.extents();
    let thickness = (size.norm() * DEBUG_EDGE_SCALE).max(1e-3);
    let unit_cube = generate_cube(0.5);
    let mut mesh = CpuMesh::new(Vec::new(), Vec::new()).with_label("bvh_debug");

    for axis in 0..3 {
        let (a, b) = ((axis + 1) % 3, (axis + 2) % 3);
        for corner in 0..4 {
            let mut center = bounds.center();
            center[a] = if corner & 1 == 0 { bounds.min[a] } else { bounds.max[a] };
            center[b] = if corner & 2 == 0 { bounds.min[b] } else { bounds.max[b] };
            let mut scale = Vec3::repeat(thickness);
            scale[axis] = size[axis] + thickness;
            let edge = Mat4::new_translation(&center) * Mat4::new_nonuniform_scaling(&scale);
            mesh.append(&unit_cube.transformed(&edge));
        }
    }
    mesh
}

impl RayTracingManager for ScreenSpaceTracer {
    fn process(&mut self, items: &[DrawItem], output: &RenderTexture) -> Result<()> {
        let mut scene = CpuMesh::new(Vec::new(), Vec::new()).with_label("rt_scene");
        for item in items {
            if let crate::backend::DrawGeometry::Mesh(mesh) = &item.geometry {
                scene.append(&mesh.data().transformed(&item.world));
            }
        }

        self.bounds = scene.bounds();
        self.g_buffer_mesh = (!scene.is_empty())
            .then(|| {
                DrawItem::mesh(
                    Mesh::new(scene),
                    Arc::clone(&self.g_buffer_material),
                    Mat4::identity(),
                )
            });
        self.bvh_debug_mesh = self.bounds.as_ref().map(|bounds| {
            DrawItem::mesh(
                Mesh::new(bounds_wireframe(bounds)),
                Arc::clone(&self.debug_material),
                Mat4::identity(),
            )
        });

        self.unit.write().set_render_texture("u_output", output)?;
        self.process_count += 1;
        log::debug!(
            "Processed {} item(s) for ray tracing, bounds {:?}",
            items.len(),
            self.bounds.map(|b| (b.min, b.max))
        );
        Ok(())
    }

    fn g_buffer_mesh(&self) -> Option<&DrawItem> {
        self.g_buffer_mesh.as_ref()
    }

    fn rt_unit(&self) -> &SharedResourceSet {
        &self.unit
    }

    fn bvh_debug_mesh(&self) -> Option<&DrawItem> {
        self.bvh_debug_mesh.as_ref()
    }
}

impl std::fmt::Debug for ScreenSpaceTracer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScreenSpaceTracer")
            .field("bounds", &self.bounds)
            .field("process_count", &self.process_count)
            .finish()
    }
}

#[cfg(all(test, feature = "dummy"))]
mod tests {
    use super::*;
    use crate::backend::BackendType;
    use crate::device::{DeviceParameters, GraphicsDevice};
    use crate::targets::RenderTextureDescriptor;
    use crate::types::TextureFormat;

    fn registry() -> EffectRegistry {
        let device =
            GraphicsDevice::new(DeviceParameters::new().with_backend(BackendType::Dummy)).unwrap();
        let mut registry = EffectRegistry::new(device);
        builtin::register_builtin_textures(&mut registry).unwrap();
        builtin::register_builtin_effects(&mut registry).unwrap();
        registry
    }

    #[test]
    fn test_process_flattens_items_and_wires_output() {
        let registry = registry();
        let mut tracer = ScreenSpaceTracer::new(&registry).unwrap();
        assert!(tracer.g_buffer_mesh().is_none());

        let material = ResourceSet::new(registry.effect(builtin::GREEN).unwrap()).shared();
        let cube = Mesh::new(generate_cube(0.5));
        let items = vec![
            DrawItem::mesh(
                Arc::clone(&cube),
                Arc::clone(&material),
                Mat4::new_translation(&Vec3::new(-2.0, 0.0, 0.0)),
            ),
            DrawItem::mesh(cube, material, Mat4::new_translation(&Vec3::new(2.0, 0.0, 0.0))),
        ];
        let output = RenderTexture::new(
            registry.device(),
            RenderTextureDescriptor::new("rt_output", 4, 4)
                .with_color("color", TextureFormat::Rgba8Unorm)
                .for_compute(),
        )
        .unwrap();

        tracer.process(&items, &output).unwrap();
        let mesh = tracer.g_buffer_mesh().unwrap();
        let crate::backend::DrawGeometry::Mesh(mesh) = &mesh.geometry else {
            panic!("expected a mesh item");
        };
        assert_eq!(mesh.data().vertex_count(), 48);
        let bounds = tracer.bounds().unwrap();
        assert_eq!(bounds.min, Vec3::new(-2.5, -0.5, -0.5));
        assert_eq!(bounds.max, Vec3::new(2.5, 0.5, 0.5));
        assert!(tracer.bvh_debug_mesh().is_some());

        let unit = tracer.rt_unit().read();
        let bound = unit.texture("u_output").unwrap();
        assert_eq!(bound.texture_id(), output.channel("color").unwrap().texture_id());
    }

    #[test]
    fn test_wireframe_has_twelve_edges() {
        let mesh = bounds_wireframe(&Aabb::new(Vec3::zeros(), Vec3::new(1.0, 2.0, 3.0)));
        assert_eq!(mesh.vertex_count(), 12 * 24);
    }
}
