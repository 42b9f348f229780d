//! Pass encoding for the wgpu backend.

use crate::effects::CompiledProgram;

use super::super::{
    BackendError, ComputeDispatch, DrawGeometry, GpuTextureId, ProgramBindings, RasterPass,
};
use super::conversion::{
    convert_depth_load_op, convert_load_op, convert_stencil_load_op, convert_texture_format,
};
use super::{PipelineHandle, PipelineKey, WgpuBackend};

/// Everything one draw needs, resolved before the render pass borrows the encoder.
struct PreparedDraw {
    pipeline: wgpu::RenderPipeline,
    bind_groups: Vec<(u32, wgpu::BindGroup)>,
    /// Vertex buffer, index buffer and index count; `None` for full-screen draws.
    geometry: Option<(wgpu::Buffer, wgpu::Buffer, u32)>,
}

/// Owned resource for one bind group entry.
enum BoundResource {
    Buffer(wgpu::Buffer),
    View(wgpu::TextureView),
    Sampler(wgpu::Sampler),
}

impl WgpuBackend {
    pub(super) fn encode_raster_pass(&mut self, pass: &RasterPass) -> Result<(), BackendError> {
        let colors: Vec<wgpu::TextureFormat> = pass
            .colors
            .iter()
            .map(|attachment| convert_texture_format(attachment.format))
            .collect();
        let depth = pass.depth.as_ref().map(|attachment| convert_texture_format(attachment.format));

        let mut draws = Vec::with_capacity(pass.draws.len());
        for draw in &pass.draws {
            let mesh = match &draw.geometry {
                DrawGeometry::Mesh(mesh) => Some(mesh),
                DrawGeometry::FullScreen => None,
            };
            let key = PipelineKey {
                program: draw.program.id(),
                colors: colors.clone(),
                depth,
                vertex_input: mesh.is_some(),
            };
            let (pipeline, layouts) = {
                let cached = self.pipeline(&draw.program, key)?;
                let PipelineHandle::Render(pipeline) = &cached.pipeline else {
                    return Err(BackendError::InvalidParameter(format!(
                        "program '{}' is not a raster program",
                        draw.program.effect_label()
                    )));
                };
                (pipeline.clone(), cached.bind_group_layouts.clone())
            };
            let bind_groups = self.create_bind_groups(&draw.program, &draw.bindings, &layouts)?;
            let geometry = mesh.map(|mesh| self.mesh_buffers(mesh));
            draws.push(PreparedDraw {
                pipeline,
                bind_groups,
                geometry,
            });
        }

        let color_views = pass
            .colors
            .iter()
            .map(|attachment| self.view(attachment.texture))
            .collect::<Result<Vec<_>, _>>()?;
        let depth_view = pass
            .depth
            .as_ref()
            .map(|attachment| self.view(attachment.texture))
            .transpose()?;

        let color_attachments: Vec<Option<wgpu::RenderPassColorAttachment>> = pass
            .colors
            .iter()
            .zip(&color_views)
            .map(|(attachment, view)| {
                Some(wgpu::RenderPassColorAttachment {
                    view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: convert_load_op(&attachment.load),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })
            })
            .collect();
        let depth_stencil_attachment =
            pass.depth
                .as_ref()
                .zip(depth_view.as_ref())
                .map(|(attachment, view)| wgpu::RenderPassDepthStencilAttachment {
                    view,
                    depth_ops: Some(wgpu::Operations {
                        load: convert_depth_load_op(&attachment.load),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: attachment.format.has_stencil().then(|| wgpu::Operations {
                        load: convert_stencil_load_op(&attachment.load),
                        store: wgpu::StoreOp::Store,
                    }),
                });

        let (width, height) = (pass.width, pass.height);
        let encoder = self.encoder();
        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(&pass.label),
            color_attachments: &color_attachments,
            depth_stencil_attachment,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        render_pass.set_viewport(0.0, 0.0, width as f32, height as f32, 0.0, 1.0);

        for draw in &draws {
            render_pass.set_pipeline(&draw.pipeline);
            for (group, bind_group) in &draw.bind_groups {
                render_pass.set_bind_group(*group, bind_group, &[]);
            }
            match &draw.geometry {
                Some((vertices, indices, index_count)) => {
                    render_pass.set_vertex_buffer(0, vertices.slice(..));
                    render_pass.set_index_buffer(indices.slice(..), wgpu::IndexFormat::Uint32);
                    render_pass.draw_indexed(0..*index_count, 0, 0..1);
                }
                None => render_pass.draw(0..3, 0..1),
            }
        }
        Ok(())
    }

    pub(super) fn encode_dispatch(
        &mut self,
        dispatch: &ComputeDispatch,
    ) -> Result<(), BackendError> {
        let key = PipelineKey {
            program: dispatch.program.id(),
            colors: Vec::new(),
            depth: None,
            vertex_input: false,
        };
        let (pipeline, layouts) = {
            let cached = self.pipeline(&dispatch.program, key)?;
            let PipelineHandle::Compute(pipeline) = &cached.pipeline else {
                return Err(BackendError::InvalidParameter(format!(
                    "program '{}' is not a compute program",
                    dispatch.program.effect_label()
                )));
            };
            (pipeline.clone(), cached.bind_group_layouts.clone())
        };
        let bind_groups = self.create_bind_groups(&dispatch.program, &dispatch.bindings, &layouts)?;

        let [x, y, z] = dispatch.workgroups;
        let encoder = self.encoder();
        let mut compute_pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some(&dispatch.label),
            timestamp_writes: None,
        });
        compute_pass.set_pipeline(&pipeline);
        for (group, bind_group) in &bind_groups {
            compute_pass.set_bind_group(*group, bind_group, &[]);
        }
        compute_pass.dispatch_workgroups(x, y, z);
        Ok(())
    }

    fn view(&self, id: GpuTextureId) -> Result<wgpu::TextureView, BackendError> {
        self.textures
            .get(&id)
            .map(|texture| texture.view.clone())
            .ok_or(BackendError::UnknownTexture(id.raw()))
    }

    /// One bind group per layout, filled from the set's bindings.
    fn create_bind_groups(
        &mut self,
        program: &CompiledProgram,
        bindings: &ProgramBindings,
        layouts: &[(u32, wgpu::BindGroupLayout)],
    ) -> Result<Vec<(u32, wgpu::BindGroup)>, BackendError> {
        let mut resources: Vec<(u32, u32, BoundResource)> = Vec::new();

        if let Some(block) = &program.reflection().uniform_block {
            if let Some(buffer) = self.uniform_buffer(bindings) {
                resources.push((
                    block.binding.group,
                    block.binding.binding,
                    BoundResource::Buffer(buffer),
                ));
            }
        }
        for bound in &bindings.textures {
            let Some(binding) = bound.binding else {
                continue;
            };
            let view = self.view(bound.texture)?;
            resources.push((binding.group, binding.binding, BoundResource::View(view)));
        }
        for bound in &bindings.samplers {
            let Some(binding) = bound.binding else {
                continue;
            };
            resources.push((
                binding.group,
                binding.binding,
                BoundResource::Sampler(self.sampler(&bound.descriptor)),
            ));
        }

        Ok(layouts
            .iter()
            .map(|(group, layout)| {
                let entries: Vec<wgpu::BindGroupEntry> = resources
                    .iter()
                    .filter(|(g, _, _)| g == group)
                    .map(|(_, binding, resource)| wgpu::BindGroupEntry {
                        binding: *binding,
                        resource: match resource {
                            BoundResource::Buffer(buffer) => buffer.as_entire_binding(),
                            BoundResource::View(view) => wgpu::BindingResource::TextureView(view),
                            BoundResource::Sampler(sampler) => {
                                wgpu::BindingResource::Sampler(sampler)
                            }
                        },
                    })
                    .collect();
                let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some(program.effect_label()),
                    layout,
                    entries: &entries,
                });
                (*group, bind_group)
            })
            .collect())
    }
}
