//! Immutable meshes shared between drawables.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use lumen_core::{Aabb, CpuMesh};

static NEXT_MESH_ID: AtomicU64 = AtomicU64::new(1);

/// Identifier backends key uploaded vertex/index buffers by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MeshId(u64);

/// Triangle mesh with precomputed object-space bounds.
#[derive(Debug)]
pub struct Mesh {
    id: MeshId,
    data: CpuMesh,
    bounds: Option<Aabb>,
}

impl Mesh {
    pub fn new(data: CpuMesh) -> Arc<Self> {
        let bounds = data.bounds();
        Arc::new(Self {
            id: MeshId(NEXT_MESH_ID.fetch_add(1, Ordering::Relaxed)),
            data,
            bounds,
        })
    }

    pub fn id(&self) -> MeshId {
        self.id
    }

    pub fn data(&self) -> &CpuMesh {
        &self.data
    }

    pub fn label(&self) -> Option<&str> {
        self.data.label.as_deref()
    }

    /// Object-space bounds, `None` for an empty mesh.
    pub fn bounds(&self) -> Option<&Aabb> {
        self.bounds.as_ref()
    }

    pub fn index_count(&self) -> u32 {
        self.data.index_count()
    }
}
