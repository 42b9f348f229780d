//! Texture access tracking for barrier insertion.
//!
//! The tracker remembers the last access of every texture, across frames,
//! and turns the accesses a pass declares into the barriers it needs.
//! Only a read following a read goes without a barrier.

use std::collections::HashMap;

use crate::backend::{GpuTextureId, TextureAccessMode, TextureBarrier};

/// Accesses one pass makes, deduplicated per texture.
#[derive(Debug, Default, Clone)]
pub(crate) struct PassUsage {
    accesses: Vec<(GpuTextureId, TextureAccessMode)>,
}

impl PassUsage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare an access. A write replaces an earlier read of the same texture.
    pub fn add(&mut self, texture: GpuTextureId, access: TextureAccessMode) {
        match self.accesses.iter_mut().find(|(id, _)| *id == texture) {
            Some((_, existing)) => {
                if access.is_write() {
                    *existing = access;
                }
            }
            None => self.accesses.push((texture, access)),
        }
    }

    pub fn read(&mut self, texture: GpuTextureId) {
        self.add(texture, TextureAccessMode::ShaderRead);
    }

    pub fn accesses(&self) -> &[(GpuTextureId, TextureAccessMode)] {
        &self.accesses
    }

    /// Textures the pass writes.
    pub fn writes(&self) -> impl Iterator<Item = GpuTextureId> + '_ {
        self.accesses
            .iter()
            .filter(|(_, access)| access.is_write())
            .map(|(id, _)| *id)
    }
}

/// Last known access of every texture the orchestrator has touched.
#[derive(Debug, Default)]
pub(crate) struct ResourceTracker {
    last_access: HashMap<GpuTextureId, TextureAccessMode>,
}

impl ResourceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Barriers needed before `usage`, updating the tracked state.
    pub fn transition(&mut self, usage: &PassUsage) -> Vec<TextureBarrier> {
        let mut barriers = Vec::new();
        for &(texture, after) in usage.accesses() {
            let before = self.last_access.insert(texture, after);
            let needed = match before {
                None => true,
                Some(before) => before.is_write() || after.is_write(),
            };
            if needed {
                barriers.push(TextureBarrier { texture, before, after });
            }
        }
        barriers
    }

    /// Last access of `texture`, `None` if it was never used.
    #[cfg(test)]
    pub fn last_access(&self, texture: GpuTextureId) -> Option<TextureAccessMode> {
        self.last_access.get(&texture).copied()
    }

    /// Forget textures for which `is_alive` returns `false`.
    pub fn retain_alive(&mut self, is_alive: impl Fn(GpuTextureId) -> bool) {
        self.last_access.retain(|id, _| is_alive(*id));
    }

    pub fn len(&self) -> usize {
        self.last_access.len()
    }
}
