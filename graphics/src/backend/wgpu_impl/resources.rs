//! Resource and pipeline creation for the wgpu backend.

use std::borrow::Cow;
use std::collections::BTreeMap;

use wgpu::util::DeviceExt;

use lumen_core::Vertex;

use crate::effects::{CompiledProgram, ShaderStage};
use crate::resources::Mesh;
use crate::types::{SamplerDescriptor, TextureDescriptor};

use super::super::{BackendError, ProgramBindings};
use super::conversion::{
    convert_sampler, convert_shader_stages, convert_texture_binding, convert_texture_format,
    convert_texture_usage, convert_view_dimension,
};
use super::{CachedPipeline, PipelineHandle, PipelineKey, WgpuBackend};

pub(crate) struct WgpuTexture {
    pub(crate) texture: wgpu::Texture,
    pub(crate) view: wgpu::TextureView,
    pub(crate) descriptor: TextureDescriptor,
}

pub(crate) struct MeshBuffers {
    pub(crate) vertices: wgpu::Buffer,
    pub(crate) indices: wgpu::Buffer,
    pub(crate) index_count: u32,
    pub(crate) last_used: u64,
}

/// Vertex input locations and their formats inside [`Vertex`].
const VERTEX_ATTRIBUTES: [wgpu::VertexAttribute; 3] = [
    wgpu::VertexAttribute {
        format: wgpu::VertexFormat::Float32x3,
        offset: 0,
        shader_location: 0,
    },
    wgpu::VertexAttribute {
        format: wgpu::VertexFormat::Float32x3,
        offset: 12,
        shader_location: 1,
    },
    wgpu::VertexAttribute {
        format: wgpu::VertexFormat::Float32x2,
        offset: 24,
        shader_location: 2,
    },
];

impl WgpuBackend {
    pub(super) fn create_native_texture(
        &self,
        descriptor: &TextureDescriptor,
    ) -> Result<WgpuTexture, BackendError> {
        if descriptor.size.texel_count() == 0 {
            return Err(BackendError::ResourceCreationFailed(format!(
                "texture {:?} has zero size",
                descriptor.label
            )));
        }
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: descriptor.label.as_deref(),
            size: wgpu::Extent3d {
                width: descriptor.size.width,
                height: descriptor.size.height,
                depth_or_array_layers: descriptor.size.depth,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: convert_texture_format(descriptor.format),
            usage: convert_texture_usage(descriptor.usage),
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor {
            dimension: Some(convert_view_dimension(descriptor.dimension)),
            ..Default::default()
        });
        Ok(WgpuTexture {
            texture,
            view,
            descriptor: descriptor.clone(),
        })
    }

    pub(super) fn sampler(&mut self, descriptor: &SamplerDescriptor) -> wgpu::Sampler {
        let device = &self.device;
        self.samplers
            .entry(descriptor.clone())
            .or_insert_with(|| device.create_sampler(&convert_sampler(descriptor)))
            .clone()
    }

    /// Vertex and index buffers of `mesh`, uploaded on first use.
    pub(super) fn mesh_buffers(&mut self, mesh: &Mesh) -> (wgpu::Buffer, wgpu::Buffer, u32) {
        let device = &self.device;
        let frame_index = self.frame_index;
        let buffers = self.meshes.entry(mesh.id()).or_insert_with(|| {
            let data = mesh.data();
            log::debug!(
                "wgpu: uploading mesh {:?} ({} vertices)",
                mesh.label(),
                data.vertices.len()
            );
            MeshBuffers {
                vertices: device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: mesh.label(),
                    contents: bytemuck::cast_slice::<Vertex, u8>(&data.vertices),
                    usage: wgpu::BufferUsages::VERTEX,
                }),
                indices: device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: mesh.label(),
                    contents: bytemuck::cast_slice::<u32, u8>(&data.indices),
                    usage: wgpu::BufferUsages::INDEX,
                }),
                index_count: mesh.index_count(),
                last_used: frame_index,
            }
        });
        buffers.last_used = frame_index;
        (buffers.vertices.clone(), buffers.indices.clone(), buffers.index_count)
    }

    /// Uniform buffer for the next use of `bindings.set` this frame.
    ///
    /// The first use of a set reuses last frame's buffer and only uploads a
    /// changed payload; further uses get their own buffers.
    pub(super) fn uniform_buffer(&mut self, bindings: &ProgramBindings) -> Option<wgpu::Buffer> {
        if bindings.uniform_payload.is_empty() {
            return None;
        }
        let uses = self.uniform_uses.entry(bindings.set).or_insert(0);
        let key = (bindings.set, *uses);
        *uses += 1;

        let size = bindings.uniform_payload.len() as u64;
        let mut upload = bindings.uniforms_dirty || key.1 > 0;
        let device = &self.device;
        let buffer = self.uniform_buffers.entry(key).or_insert_with(|| {
            upload = true;
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("Lumen Uniforms"),
                size,
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            })
        });
        if buffer.size() != size {
            *buffer = device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("Lumen Uniforms"),
                size,
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            });
            upload = true;
        }
        if upload {
            self.queue.write_buffer(buffer, 0, &bindings.uniform_payload);
        }
        Some(buffer.clone())
    }

    /// Bind group layouts of `program`, one per reflected group.
    fn bind_group_layouts(&self, program: &CompiledProgram) -> Vec<(u32, wgpu::BindGroupLayout)> {
        let reflection = program.reflection();
        let mut groups: BTreeMap<u32, Vec<wgpu::BindGroupLayoutEntry>> = BTreeMap::new();

        if let Some(block) = &reflection.uniform_block {
            groups.entry(block.binding.group).or_default().push(wgpu::BindGroupLayoutEntry {
                binding: block.binding.binding,
                visibility: convert_shader_stages(block.stages),
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            });
        }
        for texture in reflection.textures.values() {
            groups.entry(texture.binding.group).or_default().push(wgpu::BindGroupLayoutEntry {
                binding: texture.binding.binding,
                visibility: convert_shader_stages(texture.stages),
                ty: convert_texture_binding(texture),
                count: None,
            });
        }
        for sampler in reflection.samplers.values() {
            groups.entry(sampler.binding.group).or_default().push(wgpu::BindGroupLayoutEntry {
                binding: sampler.binding.binding,
                visibility: convert_shader_stages(sampler.stages),
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            });
        }

        // Pipeline layouts address groups by position, so gaps get empty layouts.
        let group_count = groups.keys().next_back().map_or(0, |group| group + 1);
        (0..group_count)
            .map(|group| {
                let entries = groups.remove(&group).unwrap_or_default();
                let layout = self.device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                    label: Some(program.effect_label()),
                    entries: &entries,
                });
                (group, layout)
            })
            .collect()
    }

    fn shader_module(
        &self,
        program: &CompiledProgram,
        stage: ShaderStage,
    ) -> Result<(wgpu::ShaderModule, String), BackendError> {
        let compiled = program.stage(stage).ok_or_else(|| {
            BackendError::InvalidParameter(format!(
                "program '{}' has no {stage} stage",
                program.effect_label()
            ))
        })?;
        let module = self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(program.effect_label()),
            source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(&compiled.source)),
        });
        Ok((module, compiled.entry_point.clone()))
    }

    /// Pipeline for `key`, created on first use.
    pub(super) fn pipeline(
        &mut self,
        program: &CompiledProgram,
        key: PipelineKey,
    ) -> Result<&CachedPipeline, BackendError> {
        if !self.pipelines.contains_key(&key) {
            let created = self.create_pipeline(program, &key)?;
            log::debug!(
                "wgpu: created pipeline for '{}' [{}]",
                program.effect_label(),
                program.variant_key()
            );
            self.pipelines.insert(key.clone(), created);
        }
        self.pipelines
            .get(&key)
            .ok_or_else(|| BackendError::Internal("pipeline cache miss".to_string()))
    }

    fn create_pipeline(
        &self,
        program: &CompiledProgram,
        key: &PipelineKey,
    ) -> Result<CachedPipeline, BackendError> {
        let bind_group_layouts = self.bind_group_layouts(program);
        let ordered: Vec<&wgpu::BindGroupLayout> =
            bind_group_layouts.iter().map(|(_, layout)| layout).collect();
        let layout = self.device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(program.effect_label()),
            bind_group_layouts: &ordered,
            push_constant_ranges: &[],
        });

        let pipeline = if program.is_compute() {
            let (module, entry_point) = self.shader_module(program, ShaderStage::Compute)?;
            let pipeline = self.device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some(program.effect_label()),
                layout: Some(&layout),
                module: &module,
                entry_point: Some(&entry_point),
                compilation_options: Default::default(),
                cache: None,
            });
            PipelineHandle::Compute(pipeline)
        } else {
            let (vertex_module, vertex_entry) = self.shader_module(program, ShaderStage::Vertex)?;
            let (fragment_module, fragment_entry) =
                self.shader_module(program, ShaderStage::Fragment)?;

            let reflection = program.reflection();
            let attributes: Vec<wgpu::VertexAttribute> = VERTEX_ATTRIBUTES
                .iter()
                .filter(|attribute| reflection.vertex_inputs.contains(&attribute.shader_location))
                .copied()
                .collect();
            let vertex_layout = [wgpu::VertexBufferLayout {
                array_stride: Vertex::STRIDE,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes: &attributes,
            }];
            let buffers: &[wgpu::VertexBufferLayout] = if key.vertex_input {
                &vertex_layout
            } else {
                &[]
            };

            // Attachments the fragment stage does not write stay untouched.
            let targets: Vec<Option<wgpu::ColorTargetState>> = key
                .colors
                .iter()
                .enumerate()
                .map(|(location, format)| {
                    Some(wgpu::ColorTargetState {
                        format: *format,
                        blend: Some(wgpu::BlendState::REPLACE),
                        write_mask: if (location as u32) < reflection.color_outputs {
                            wgpu::ColorWrites::ALL
                        } else {
                            wgpu::ColorWrites::empty()
                        },
                    })
                })
                .collect();

            let pipeline = self.device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(program.effect_label()),
                layout: Some(&layout),
                vertex: wgpu::VertexState {
                    module: &vertex_module,
                    entry_point: Some(&vertex_entry),
                    buffers,
                    compilation_options: Default::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: &fragment_module,
                    entry_point: Some(&fragment_entry),
                    targets: &targets,
                    compilation_options: Default::default(),
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    cull_mode: None,
                    ..Default::default()
                },
                depth_stencil: key.depth.map(|format| wgpu::DepthStencilState {
                    format,
                    depth_write_enabled: true,
                    depth_compare: wgpu::CompareFunction::LessEqual,
                    stencil: wgpu::StencilState::default(),
                    bias: wgpu::DepthBiasState::default(),
                }),
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
                cache: None,
            });
            PipelineHandle::Render(pipeline)
        };

        Ok(CachedPipeline {
            pipeline,
            bind_group_layouts,
        })
    }
}
