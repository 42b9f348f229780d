//! Node hierarchy with frustum culling.

use std::sync::Arc;

use lumen_core::math::Mat4;
use lumen_core::{Camera, Light, Transform};

use super::draw_item::DrawItem;
use crate::materials::SharedResourceSet;
use crate::resources::Mesh;

/// A mesh and the resource set it is shaded with.
#[derive(Debug, Clone)]
pub struct Drawable {
    pub mesh: Arc<Mesh>,
    pub material: SharedResourceSet,
}

/// A node with a local transform, an optional drawable and children.
#[derive(Debug, Clone)]
pub struct SceneNode {
    pub name: String,
    pub transform: Transform,
    pub drawable: Option<Drawable>,
    pub children: Vec<SceneNode>,
    /// Hidden nodes are skipped together with their subtree.
    pub visible: bool,
}

impl SceneNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            transform: Transform::identity(),
            drawable: None,
            children: Vec::new(),
            visible: true,
        }
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    pub fn with_drawable(mut self, mesh: Arc<Mesh>, material: SharedResourceSet) -> Self {
        self.drawable = Some(Drawable { mesh, material });
        self
    }

    pub fn with_child(mut self, child: SceneNode) -> Self {
        self.children.push(child);
        self
    }

    pub fn with_visible(mut self, visible: bool) -> Self {
        self.visible = visible;
        self
    }

    pub fn add_child(&mut self, child: SceneNode) {
        self.children.push(child);
    }

    /// Depth-first search by name, this node included.
    pub fn find(&self, name: &str) -> Option<&SceneNode> {
        if self.name == name {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(name))
    }

    pub fn find_mut(&mut self, name: &str) -> Option<&mut SceneNode> {
        if self.name == name {
            return Some(self);
        }
        self.children.iter_mut().find_map(|child| child.find_mut(name))
    }

    /// Number of nodes in this subtree.
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(SceneNode::node_count).sum::<usize>()
    }

    fn collect(
        &self,
        parent: &Mat4,
        filter: &dyn Fn(&Arc<Mesh>, &Mat4) -> bool,
        out: &mut Vec<DrawItem>,
    ) {
        if !self.visible {
            return;
        }
        let world = parent * self.transform.matrix();
        if let Some(drawable) = &self.drawable {
            if filter(&drawable.mesh, &world) {
                out.push(DrawItem::mesh(
                    Arc::clone(&drawable.mesh),
                    Arc::clone(&drawable.material),
                    world,
                ));
            }
        }
        for child in &self.children {
            child.collect(&world, filter, out);
        }
    }
}

/// A loaded scene: node graph, cameras and lights.
#[derive(Debug, Clone)]
pub struct Scene {
    pub root: SceneNode,
    pub cameras: Vec<Camera>,
    pub lights: Vec<Light>,
}

impl Scene {
    pub fn new(root: SceneNode) -> Self {
        Self {
            root,
            cameras: Vec::new(),
            lights: Vec::new(),
        }
    }

    pub fn with_camera(mut self, camera: Camera) -> Self {
        self.cameras.push(camera);
        self
    }

    pub fn with_light(mut self, light: Light) -> Self {
        self.lights.push(light);
        self
    }

    /// Items whose world-space bounds intersect the camera frustum, in
    /// depth-first traversal order.
    pub fn cull(&self, camera: &Camera) -> Vec<DrawItem> {
        let frustum = camera.frustum();
        let mut items = Vec::new();
        self.root.collect(
            &Mat4::identity(),
            &|mesh, world| {
                mesh.bounds()
                    .is_some_and(|bounds| frustum.intersects_aabb(&bounds.transformed(world)))
            },
            &mut items,
        );
        log::trace!("Culled scene for camera '{}': {} visible item(s)", camera.name, items.len());
        items
    }

    /// Every non-empty drawable, ignoring the camera.
    pub fn all_items(&self) -> Vec<DrawItem> {
        let mut items = Vec::new();
        self.root
            .collect(&Mat4::identity(), &|mesh, _| mesh.bounds().is_some(), &mut items);
        items
    }
}

#[cfg(all(test, feature = "dummy"))]
mod tests {
    use super::*;
    use crate::backend::BackendType;
    use crate::device::{DeviceParameters, GraphicsDevice};
    use crate::effects::{EffectRegistry, builtin};
    use crate::materials::ResourceSet;
    use lumen_core::math::Vec3;
    use lumen_core::mesh::generate_cube;

    fn material() -> SharedResourceSet {
        let device =
            GraphicsDevice::new(DeviceParameters::new().with_backend(BackendType::Dummy)).unwrap();
        let mut registry = EffectRegistry::new(device);
        builtin::register_builtin_textures(&mut registry).unwrap();
        builtin::register_builtin_effects(&mut registry).unwrap();
        ResourceSet::new(registry.effect(builtin::GREEN).unwrap()).shared()
    }

    fn cube_at(name: &str, x: f32, material: &SharedResourceSet) -> SceneNode {
        SceneNode::new(name)
            .with_transform(Transform::identity().with_translation(Vec3::new(x, 0.0, 0.0)))
            .with_drawable(Mesh::new(generate_cube(0.5)), Arc::clone(material))
    }

    #[test]
    fn test_cull_keeps_traversal_order_and_skips_outside() {
        let material = material();
        let root = SceneNode::new("root")
            .with_child(
                cube_at("left", -1.0, &material).with_child(cube_at("child", 0.5, &material)),
            )
            .with_child(cube_at("far_away", 1000.0, &material))
            .with_child(cube_at("right", 1.0, &material));
        let scene = Scene::new(root);
        let camera = Camera::perspective(std::f32::consts::FRAC_PI_2, 1.0, 0.1, 100.0)
            .with_position(Vec3::new(0.0, 0.0, 5.0));

        let items = scene.cull(&camera);
        let xs: Vec<f32> = items.iter().map(|item| item.world[(0, 3)]).collect();
        assert_eq!(xs, vec![-1.0, -0.5, 1.0]);
    }

    #[test]
    fn test_hidden_subtree_skipped() {
        let material = material();
        let root = SceneNode::new("root")
            .with_child(
                cube_at("hidden", 0.0, &material)
                    .with_visible(false)
                    .with_child(cube_at("c", 0.0, &material)),
            );
        let scene = Scene::new(root);
        let camera = Camera::perspective(1.0, 1.0, 0.1, 100.0);
        assert!(scene.cull(&camera).is_empty());
        assert_eq!(scene.root.node_count(), 3);
        assert!(scene.root.find("c").is_some());
    }
}
