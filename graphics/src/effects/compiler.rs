//! WGSL compilation and reflection via naga.
//!
//! Every stage of an effect variant goes through the same steps:
//!
//! 1. macro preprocessing against the variant's switch set
//! 2. the generated uniform block is prepended
//! 3. naga parses and validates the module
//! 4. global resources are reflected and cross-checked against the schema
//!
//! The resulting [`CompiledProgram`] carries the final WGSL per stage (what
//! native backends hand to the driver) and the reflected binding layout.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use bitflags::bitflags;

use super::preprocess::{MacroSet, preprocess};
use super::uniform::{
    UNIFORM_BINDING, UNIFORM_BLOCK_NAME, UNIFORM_GROUP, UniformLayout, UniformSchema,
};
use crate::error::{GraphicsError, Result};
use crate::types::TextureFormat;

static NEXT_PROGRAM_ID: AtomicU64 = AtomicU64::new(1);

/// Pipeline stage of a shader source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
    Compute,
}

impl ShaderStage {
    fn to_naga(self) -> naga::ShaderStage {
        match self {
            Self::Vertex => naga::ShaderStage::Vertex,
            Self::Fragment => naga::ShaderStage::Fragment,
            Self::Compute => naga::ShaderStage::Compute,
        }
    }

    fn mask(self) -> StageMask {
        match self {
            Self::Vertex => StageMask::VERTEX,
            Self::Fragment => StageMask::FRAGMENT,
            Self::Compute => StageMask::COMPUTE,
        }
    }
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Vertex => "vertex",
            Self::Fragment => "fragment",
            Self::Compute => "compute",
        })
    }
}

bitflags! {
    /// Stages that reference a resource.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct StageMask: u32 {
        const VERTEX = 1 << 0;
        const FRAGMENT = 1 << 1;
        const COMPUTE = 1 << 2;
    }
}

/// Bind group and binding index of a shader resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceBinding {
    pub group: u32,
    pub binding: u32,
}

/// Reflected member of the generated uniform block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReflectedMember {
    pub name: String,
    pub offset: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReflectedUniformBlock {
    pub binding: ResourceBinding,
    pub members: Vec<ReflectedMember>,
    pub stages: StageMask,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReflectedTexture {
    pub binding: ResourceBinding,
    /// Storage texture format, `None` for sampled textures.
    pub storage_format: Option<TextureFormat>,
    pub cube: bool,
    pub stages: StageMask,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReflectedSampler {
    pub binding: ResourceBinding,
    pub stages: StageMask,
}

/// Binding layout of a compiled program, merged across stages.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProgramReflection {
    pub uniform_block: Option<ReflectedUniformBlock>,
    pub textures: BTreeMap<String, ReflectedTexture>,
    pub samplers: BTreeMap<String, ReflectedSampler>,
    /// Vertex input locations consumed by the vertex stage.
    pub vertex_inputs: Vec<u32>,
    /// Number of colour outputs of the fragment stage.
    pub color_outputs: u32,
    pub workgroup_size: [u32; 3],
}

/// One compiled stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledStage {
    pub stage: ShaderStage,
    pub entry_point: String,
    /// Final WGSL after preprocessing, including the uniform block.
    pub source: String,
}

/// Identifier of a compiled program; backends cache pipelines by it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProgramId(u64);

/// A validated shader program for one macro variant of an effect.
#[derive(Debug)]
pub struct CompiledProgram {
    id: ProgramId,
    effect: String,
    variant_key: String,
    stages: Vec<CompiledStage>,
    reflection: ProgramReflection,
}

impl CompiledProgram {
    pub fn id(&self) -> ProgramId {
        self.id
    }

    /// Label of the effect this program belongs to.
    pub fn effect_label(&self) -> &str {
        &self.effect
    }

    /// Canonical macro key of the variant.
    pub fn variant_key(&self) -> &str {
        &self.variant_key
    }

    pub fn stages(&self) -> &[CompiledStage] {
        &self.stages
    }

    pub fn stage(&self, stage: ShaderStage) -> Option<&CompiledStage> {
        self.stages.iter().find(|s| s.stage == stage)
    }

    pub fn reflection(&self) -> &ProgramReflection {
        &self.reflection
    }

    pub fn is_compute(&self) -> bool {
        self.stage(ShaderStage::Compute).is_some()
    }
}

/// Compile every `(stage, source)` pair of one variant.
pub(crate) fn compile_program(
    effect: &str,
    sources: &[(ShaderStage, &str)],
    schema: &UniformSchema,
    layout: &UniformLayout,
    macros: &MacroSet,
) -> Result<CompiledProgram> {
    let compile_error = |message: String| GraphicsError::Compile {
        effect: effect.to_string(),
        message,
    };

    let block = schema.wgsl_block();
    let mut reflection = ProgramReflection::default();
    let mut stages = Vec::with_capacity(sources.len());

    for (stage, source) in sources {
        let body = preprocess(source, macros)
            .map_err(|e| compile_error(format!("{stage} stage: {e}")))?;
        let full = format!("{block}{body}");

        let module = naga::front::wgsl::parse_str(&full)
            .map_err(|e| compile_error(format!("{stage} stage: {}", e.emit_to_string(&full))))?;

        let mut validator = naga::valid::Validator::new(
            naga::valid::ValidationFlags::all(),
            naga::valid::Capabilities::default(),
        );
        validator
            .validate(&module)
            .map_err(|e| compile_error(format!("{stage} stage failed validation: {e}")))?;

        let entry = module
            .entry_points
            .iter()
            .find(|ep| ep.stage == stage.to_naga())
            .ok_or_else(|| compile_error(format!("no @{stage} entry point")))?;

        reflect_stage(effect, *stage, &module, entry, &mut reflection)?;
        stages.push(CompiledStage {
            stage: *stage,
            entry_point: entry.name.clone(),
            source: full,
        });
    }

    check_against_schema(effect, &reflection, schema, layout)?;

    let variant_key = macros.key();
    log::debug!("Compiled effect '{effect}' variant [{variant_key}]");
    Ok(CompiledProgram {
        id: ProgramId(NEXT_PROGRAM_ID.fetch_add(1, Ordering::Relaxed)),
        effect: effect.to_string(),
        variant_key,
        stages,
        reflection,
    })
}

fn reflect_stage(
    effect: &str,
    stage: ShaderStage,
    module: &naga::Module,
    entry: &naga::EntryPoint,
    reflection: &mut ProgramReflection,
) -> Result<()> {
    let schema_error = |message: String| GraphicsError::Schema {
        effect: effect.to_string(),
        message,
    };
    let mask = stage.mask();

    for (_, var) in module.global_variables.iter() {
        let Some(name) = var.name.as_deref() else {
            continue;
        };
        let binding = var.binding.as_ref().map(|b| ResourceBinding {
            group: b.group,
            binding: b.binding,
        });

        match var.space {
            naga::AddressSpace::Uniform => {
                if name != UNIFORM_BLOCK_NAME {
                    return Err(schema_error(format!(
                        "'var<uniform> {name}' is not in the schema; declare it as a schema uniform"
                    )));
                }
                let binding =
                    binding.ok_or_else(|| schema_error(format!("'{name}' has no binding")))?;
                let members = match &module.types[var.ty].inner {
                    naga::TypeInner::Struct { members, .. } => members
                        .iter()
                        .filter_map(|m| {
                            m.name.as_ref().map(|name| ReflectedMember {
                                name: name.clone(),
                                offset: m.offset,
                            })
                        })
                        .collect(),
                    _ => Vec::new(),
                };
                match &mut reflection.uniform_block {
                    Some(block) => block.stages |= mask,
                    None => {
                        reflection.uniform_block = Some(ReflectedUniformBlock {
                            binding,
                            members,
                            stages: mask,
                        })
                    }
                }
            }
            naga::AddressSpace::Handle => {
                let binding = binding
                    .ok_or_else(|| schema_error(format!("resource '{name}' has no binding")))?;
                match &module.types[var.ty].inner {
                    naga::TypeInner::Image { dim, class, .. } => {
                        let storage_format = match class {
                            naga::ImageClass::Storage { format, .. } => {
                                Some(storage_format(*format).ok_or_else(|| {
                                    schema_error(format!(
                                        "storage texture '{name}' uses an unsupported format"
                                    ))
                                })?)
                            }
                            _ => None,
                        };
                        let texture = ReflectedTexture {
                            binding,
                            storage_format,
                            cube: matches!(dim, naga::ImageDimension::Cube),
                            stages: mask,
                        };
                        merge_texture(effect, name, texture, reflection)?;
                    }
                    naga::TypeInner::Sampler { .. } => {
                        let entry = reflection
                            .samplers
                            .entry(name.to_string())
                            .or_insert(ReflectedSampler { binding, stages: mask });
                        if entry.binding != binding {
                            return Err(schema_error(format!(
                                "sampler '{name}' bound differently across stages"
                            )));
                        }
                        entry.stages |= mask;
                    }
                    _ => {}
                }
            }
            naga::AddressSpace::Storage { .. } => {
                return Err(schema_error(format!("storage buffer '{name}' is not supported")));
            }
            _ => {}
        }
    }

    match stage {
        ShaderStage::Vertex => reflection.vertex_inputs = vertex_input_locations(module, entry),
        ShaderStage::Fragment => reflection.color_outputs = color_output_count(module, entry),
        ShaderStage::Compute => reflection.workgroup_size = entry.workgroup_size,
    }
    Ok(())
}

fn merge_texture(
    effect: &str,
    name: &str,
    texture: ReflectedTexture,
    reflection: &mut ProgramReflection,
) -> Result<()> {
    match reflection.textures.get_mut(name) {
        Some(existing) => {
            if existing.binding != texture.binding
                || existing.storage_format != texture.storage_format
            {
                return Err(GraphicsError::Schema {
                    effect: effect.to_string(),
                    message: format!("texture '{name}' declared differently across stages"),
                });
            }
            existing.stages |= texture.stages;
        }
        None => {
            reflection.textures.insert(name.to_string(), texture);
        }
    }
    Ok(())
}

fn storage_format(format: naga::StorageFormat) -> Option<TextureFormat> {
    match format {
        naga::StorageFormat::Rgba8Unorm => Some(TextureFormat::Rgba8Unorm),
        naga::StorageFormat::Rgba16Float => Some(TextureFormat::Rgba16Float),
        naga::StorageFormat::Rgba32Float => Some(TextureFormat::Rgba32Float),
        naga::StorageFormat::R32Float => Some(TextureFormat::R32Float),
        _ => None,
    }
}

fn location_of(binding: Option<&naga::Binding>) -> Option<u32> {
    match binding {
        Some(naga::Binding::Location { location, .. }) => Some(*location),
        _ => None,
    }
}

/// Locations of `binding`, or of the members of a struct-typed value.
fn locations(
    module: &naga::Module,
    ty: naga::Handle<naga::Type>,
    binding: Option<&naga::Binding>,
) -> Vec<u32> {
    if let Some(location) = location_of(binding) {
        return vec![location];
    }
    match &module.types[ty].inner {
        naga::TypeInner::Struct { members, .. } => members
            .iter()
            .filter_map(|m| location_of(m.binding.as_ref()))
            .collect(),
        _ => Vec::new(),
    }
}

fn vertex_input_locations(module: &naga::Module, entry: &naga::EntryPoint) -> Vec<u32> {
    let mut inputs: Vec<u32> = entry
        .function
        .arguments
        .iter()
        .flat_map(|arg| locations(module, arg.ty, arg.binding.as_ref()))
        .collect();
    inputs.sort_unstable();
    inputs
}

fn color_output_count(module: &naga::Module, entry: &naga::EntryPoint) -> u32 {
    entry
        .function
        .result
        .as_ref()
        .map_or(0, |result| locations(module, result.ty, result.binding.as_ref()).len() as u32)
}

fn check_against_schema(
    effect: &str,
    reflection: &ProgramReflection,
    schema: &UniformSchema,
    layout: &UniformLayout,
) -> Result<()> {
    let schema_error = |message: String| GraphicsError::Schema {
        effect: effect.to_string(),
        message,
    };
    let block_binding = ResourceBinding {
        group: UNIFORM_GROUP,
        binding: UNIFORM_BINDING,
    };

    if let Some(block) = &reflection.uniform_block {
        for member in &block.members {
            let (index, _) = schema
                .uniform(&member.name)
                .ok_or_else(|| {
                    schema_error(format!("uniform block member '{}' is not declared", member.name))
                })?;
            if layout.offsets[index] != member.offset {
                return Err(schema_error(format!(
                    "uniform '{}' is at offset {} in the shader but packed at {}",
                    member.name, member.offset, layout.offsets[index]
                )));
            }
        }
    }

    let mut used: BTreeMap<ResourceBinding, &str> = BTreeMap::new();
    if reflection.uniform_block.is_some() {
        used.insert(block_binding, UNIFORM_BLOCK_NAME);
    }
    let resources = reflection
        .textures
        .iter()
        .map(|(name, t)| (name, t.binding))
        .chain(reflection.samplers.iter().map(|(name, s)| (name, s.binding)));
    for (name, binding) in resources {
        if let Some(other) = used.insert(binding, name) {
            return Err(schema_error(format!(
                "'{name}' and '{other}' share @group({}) @binding({})",
                binding.group, binding.binding
            )));
        }
    }

    for (name, texture) in &reflection.textures {
        let Some((_, slot)) = schema.texture(name) else {
            let hint = if schema.sampler(name).is_some() {
                "it is declared as a sampler"
            } else if schema.uniform(name).is_some() {
                "it is declared as a value uniform"
            } else {
                "it is not declared"
            };
            return Err(schema_error(format!(
                "shader texture '{name}' does not match the schema: {hint}"
            )));
        };
        match (slot.as_output, texture.storage_format.is_some()) {
            (true, false) => {
                return Err(schema_error(format!(
                    "output slot '{name}' must be a storage texture in the shader"
                )));
            }
            (false, true) => {
                return Err(schema_error(format!(
                    "'{name}' is a storage texture in the shader but not an output slot"
                )));
            }
            _ => {}
        }
    }

    for name in reflection.samplers.keys() {
        if schema.sampler(name).is_none() {
            let hint = if schema.texture(name).is_some() {
                "it is declared as a texture"
            } else {
                "it is not declared"
            };
            return Err(schema_error(format!(
                "shader sampler '{name}' does not match the schema: {hint}"
            )));
        }
    }
    Ok(())
}
