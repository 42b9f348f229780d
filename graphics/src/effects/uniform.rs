//! Slot descriptors, uniform values and the uniform-block layout.
//!
//! An effect declares three independent slot lists: value uniforms, textures
//! and samplers. Value uniforms are packed into a single uniform block using
//! WGSL uniform-address-space layout rules, so the payload produced by a
//! resource set can be uploaded as-is.

use std::fmt;

use lumen_core::math::{Mat4, Vec2, Vec3, Vec4, mat4_to_cols_array};

use crate::error::{GraphicsError, Result};
use crate::types::SamplerDescriptor;

/// Shape of a value uniform (per array element).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UniformKind {
    Scalar,
    Vec2,
    Vec3,
    Vec4,
    Mat4,
}

impl UniformKind {
    /// Number of floats in one element.
    pub fn components(&self) -> usize {
        match self {
            Self::Scalar => 1,
            Self::Vec2 => 2,
            Self::Vec3 => 3,
            Self::Vec4 => 4,
            Self::Mat4 => 16,
        }
    }

    /// Alignment in the uniform address space, in bytes.
    pub fn align(&self) -> u32 {
        match self {
            Self::Scalar => 4,
            Self::Vec2 => 8,
            Self::Vec3 | Self::Vec4 | Self::Mat4 => 16,
        }
    }

    /// Size of one element, in bytes.
    pub fn size(&self) -> u32 {
        match self {
            Self::Scalar => 4,
            Self::Vec2 => 8,
            Self::Vec3 => 12,
            Self::Vec4 => 16,
            Self::Mat4 => 64,
        }
    }

    pub fn wgsl_type(&self) -> &'static str {
        match self {
            Self::Scalar => "f32",
            Self::Vec2 => "vec2<f32>",
            Self::Vec3 => "vec3<f32>",
            Self::Vec4 => "vec4<f32>",
            Self::Mat4 => "mat4x4<f32>",
        }
    }
}

impl fmt::Display for UniformKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Scalar => "scalar",
            Self::Vec2 => "vec2",
            Self::Vec3 => "vec3",
            Self::Vec4 => "vec4",
            Self::Mat4 => "mat4",
        })
    }
}

/// Flat float data for a value uniform.
///
/// Matrices are column-major. Array uniforms hold `components * arity` floats.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct UniformValue(Vec<f32>);

impl UniformValue {
    pub fn new(data: Vec<f32>) -> Self {
        Self(data)
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<f32> for UniformValue {
    fn from(value: f32) -> Self {
        Self(vec![value])
    }
}

impl<const N: usize> From<[f32; N]> for UniformValue {
    fn from(value: [f32; N]) -> Self {
        Self(value.to_vec())
    }
}

impl From<&[f32]> for UniformValue {
    fn from(value: &[f32]) -> Self {
        Self(value.to_vec())
    }
}

impl From<Vec<f32>> for UniformValue {
    fn from(value: Vec<f32>) -> Self {
        Self(value)
    }
}

impl From<Vec2> for UniformValue {
    fn from(value: Vec2) -> Self {
        Self(vec![value.x, value.y])
    }
}

impl From<Vec3> for UniformValue {
    fn from(value: Vec3) -> Self {
        Self(vec![value.x, value.y, value.z])
    }
}

impl From<Vec4> for UniformValue {
    fn from(value: Vec4) -> Self {
        Self(vec![value.x, value.y, value.z, value.w])
    }
}

impl From<&Mat4> for UniformValue {
    fn from(value: &Mat4) -> Self {
        Self(mat4_to_cols_array(value).to_vec())
    }
}

impl From<Mat4> for UniformValue {
    fn from(value: Mat4) -> Self {
        Self::from(&value)
    }
}

/// A named value-uniform slot.
#[derive(Debug, Clone, PartialEq)]
pub struct UniformSlotDescriptor {
    pub name: String,
    pub kind: UniformKind,
    /// Element count for array uniforms, `None` for plain values.
    pub array_len: Option<u32>,
    pub default: UniformValue,
}

impl UniformSlotDescriptor {
    pub fn new(
        name: impl Into<String>,
        kind: UniformKind,
        default: impl Into<UniformValue>,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            array_len: None,
            default: default.into(),
        }
    }

    pub fn scalar(name: impl Into<String>, default: f32) -> Self {
        Self::new(name, UniformKind::Scalar, default)
    }

    pub fn vec2(name: impl Into<String>, default: [f32; 2]) -> Self {
        Self::new(name, UniformKind::Vec2, default)
    }

    pub fn vec3(name: impl Into<String>, default: [f32; 3]) -> Self {
        Self::new(name, UniformKind::Vec3, default)
    }

    pub fn vec4(name: impl Into<String>, default: [f32; 4]) -> Self {
        Self::new(name, UniformKind::Vec4, default)
    }

    /// A mat4 slot defaulting to identity.
    pub fn mat4(name: impl Into<String>) -> Self {
        Self::new(name, UniformKind::Mat4, &Mat4::identity())
    }

    /// An array slot of `len` elements.
    pub fn array(
        name: impl Into<String>,
        kind: UniformKind,
        len: u32,
        default: impl Into<UniformValue>,
    ) -> Self {
        Self {
            array_len: Some(len),
            ..Self::new(name, kind, default)
        }
    }

    /// Number of elements (1 for plain values).
    pub fn arity(&self) -> u32 {
        self.array_len.unwrap_or(1)
    }

    /// Number of floats a value for this slot must carry.
    pub fn float_count(&self) -> usize {
        self.kind.components() * self.arity() as usize
    }

    /// Human-readable shape, used in mismatch errors.
    pub fn shape(&self) -> String {
        match self.array_len {
            Some(len) => format!("array<{}, {len}> ({} floats)", self.kind, self.float_count()),
            None => format!("{} ({} floats)", self.kind, self.float_count()),
        }
    }

    pub fn wgsl_type(&self) -> String {
        match self.array_len {
            Some(len) => format!("array<{}, {len}>", self.kind.wgsl_type()),
            None => self.kind.wgsl_type().to_string(),
        }
    }

    fn align(&self) -> u32 {
        match self.array_len {
            Some(_) => self.kind.align().max(16),
            None => self.kind.align(),
        }
    }

    fn stride(&self) -> u32 {
        round_up(self.kind.size(), self.kind.align())
    }

    fn size(&self) -> u32 {
        match self.array_len {
            Some(len) => self.stride() * len,
            None => self.kind.size(),
        }
    }
}

/// A named texture slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureSlotDescriptor {
    pub name: String,
    /// Registry name of the texture bound when nothing else is set.
    pub default: Option<String>,
    /// Slot is written by a compute program and must be bound to a
    /// compute-writable render texture channel before dispatch.
    pub as_output: bool,
}

impl TextureSlotDescriptor {
    /// A sampled input slot with a named default texture.
    pub fn new(name: impl Into<String>, default: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            default: Some(default.into()),
            as_output: false,
        }
    }

    /// A storage output slot.
    pub fn output(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            default: None,
            as_output: true,
        }
    }
}

/// A named sampler slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SamplerSlotDescriptor {
    pub name: String,
    pub default: SamplerDescriptor,
}

impl SamplerSlotDescriptor {
    pub fn new(name: impl Into<String>, default: SamplerDescriptor) -> Self {
        Self {
            name: name.into(),
            default,
        }
    }
}

/// The three slot lists of an effect, in declaration order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct UniformSchema {
    pub uniforms: Vec<UniformSlotDescriptor>,
    pub textures: Vec<TextureSlotDescriptor>,
    pub samplers: Vec<SamplerSlotDescriptor>,
}

impl UniformSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_uniform(mut self, slot: UniformSlotDescriptor) -> Self {
        self.uniforms.push(slot);
        self
    }

    pub fn with_texture(mut self, slot: TextureSlotDescriptor) -> Self {
        self.textures.push(slot);
        self
    }

    pub fn with_sampler(mut self, slot: SamplerSlotDescriptor) -> Self {
        self.samplers.push(slot);
        self
    }

    pub fn uniform(&self, name: &str) -> Option<(usize, &UniformSlotDescriptor)> {
        self.uniforms.iter().enumerate().find(|(_, slot)| slot.name == name)
    }

    pub fn texture(&self, name: &str) -> Option<(usize, &TextureSlotDescriptor)> {
        self.textures.iter().enumerate().find(|(_, slot)| slot.name == name)
    }

    pub fn sampler(&self, name: &str) -> Option<(usize, &SamplerSlotDescriptor)> {
        self.samplers.iter().enumerate().find(|(_, slot)| slot.name == name)
    }

    /// Texture slots written by compute programs.
    pub fn output_textures(&self) -> impl Iterator<Item = &TextureSlotDescriptor> {
        self.textures.iter().filter(|slot| slot.as_output)
    }

    /// Check name uniqueness per namespace, default shapes and array element kinds.
    pub fn validate(&self, effect: &str) -> Result<()> {
        let schema_error = |message: String| GraphicsError::Schema {
            effect: effect.to_string(),
            message,
        };

        check_unique(self.uniforms.iter().map(|s| s.name.as_str()), "uniform")
            .map_err(schema_error)?;
        check_unique(self.textures.iter().map(|s| s.name.as_str()), "texture")
            .map_err(schema_error)?;
        check_unique(self.samplers.iter().map(|s| s.name.as_str()), "sampler")
            .map_err(schema_error)?;

        for slot in &self.uniforms {
            if slot.array_len == Some(0) {
                return Err(schema_error(format!("array uniform '{}' has no elements", slot.name)));
            }
            if slot.array_len.is_some()
                && !matches!(slot.kind, UniformKind::Vec4 | UniformKind::Mat4)
            {
                return Err(schema_error(format!(
                    "array uniform '{}' must use vec4 or mat4 elements, not {}",
                    slot.name, slot.kind
                )));
            }
            if slot.default.len() != slot.float_count() {
                return Err(schema_error(format!(
                    "default of '{}' has {} floats, {} expected",
                    slot.name,
                    slot.default.len(),
                    slot.float_count()
                )));
            }
        }

        for slot in &self.textures {
            if !slot.as_output && slot.default.is_none() {
                return Err(schema_error(format!("input texture '{}' has no default", slot.name)));
            }
        }
        Ok(())
    }

    /// Byte offsets of every value uniform and the total block size.
    pub fn layout(&self) -> UniformLayout {
        let mut offsets = Vec::with_capacity(self.uniforms.len());
        let mut cursor = 0u32;
        let mut max_align = 0u32;
        for slot in &self.uniforms {
            let align = slot.align();
            cursor = round_up(cursor, align);
            offsets.push(cursor);
            cursor += slot.size();
            max_align = max_align.max(align);
        }
        let size = if self.uniforms.is_empty() {
            0
        } else {
            round_up(round_up(cursor, max_align), 16)
        };
        UniformLayout { offsets, size }
    }

    /// WGSL declaration of the uniform block, empty when there are no value uniforms.
    pub fn wgsl_block(&self) -> String {
        if self.uniforms.is_empty() {
            return String::new();
        }
        let mut block = String::from("struct EffectUniforms {\n");
        for slot in &self.uniforms {
            block.push_str(&format!("    {}: {},\n", slot.name, slot.wgsl_type()));
        }
        block.push_str("}\n\n");
        block.push_str(&format!(
            "@group({UNIFORM_GROUP}) @binding({UNIFORM_BINDING}) \
             var<uniform> {UNIFORM_BLOCK_NAME}: EffectUniforms;\n\n"
        ));
        block
    }
}

/// Name of the generated uniform block variable in WGSL.
pub const UNIFORM_BLOCK_NAME: &str = "uniforms";
/// Bind group of the generated uniform block.
pub const UNIFORM_GROUP: u32 = 0;
/// Binding of the generated uniform block; author resources use higher bindings.
pub const UNIFORM_BINDING: u32 = 0;

/// Byte layout of an effect's uniform block.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UniformLayout {
    pub offsets: Vec<u32>,
    pub size: u32,
}

impl UniformLayout {
    /// Pack values (one per uniform slot, in declaration order) into block bytes.
    ///
    /// Padding bytes are always zero, so equal values give equal payloads.
    pub fn pack(&self, schema: &UniformSchema, values: &[UniformValue]) -> Vec<u8> {
        let mut floats = vec![0.0f32; self.size as usize / 4];
        for ((slot, offset), value) in schema.uniforms.iter().zip(&self.offsets).zip(values) {
            let components = slot.kind.components();
            let stride = slot.stride() as usize / 4;
            let base = *offset as usize / 4;
            for (element, chunk) in value.as_slice().chunks(components).enumerate() {
                let start = base + element * stride;
                floats[start..start + chunk.len()].copy_from_slice(chunk);
            }
        }
        bytemuck::cast_slice(&floats).to_vec()
    }
}

fn check_unique<'a>(
    names: impl Iterator<Item = &'a str>,
    category: &str,
) -> std::result::Result<(), String> {
    let mut seen = std::collections::HashSet::new();
    for name in names {
        if !seen.insert(name) {
            return Err(format!("duplicate {category} slot '{name}'"));
        }
    }
    Ok(())
}

fn round_up(value: u32, align: u32) -> u32 {
    value.div_ceil(align) * align
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raytrace_schema() -> UniformSchema {
        UniformSchema::new()
            .with_uniform(UniformSlotDescriptor::vec2("u_screenSize", [1.0, 1.0]))
            .with_uniform(UniformSlotDescriptor::vec4("u_randomSeed", [0.0; 4]))
            .with_uniform(UniformSlotDescriptor::mat4("u_view"))
            .with_uniform(UniformSlotDescriptor::vec3("u_lightPos", [0.0; 3]))
            .with_uniform(UniformSlotDescriptor::vec3("u_lightColor", [1.0; 3]))
            .with_uniform(UniformSlotDescriptor::scalar("u_exposure", 1.0))
    }

    #[test]
    fn test_layout_follows_wgsl_alignment() {
        let layout = raytrace_schema().layout();
        assert_eq!(layout.offsets, vec![0, 16, 32, 96, 112, 124]);
        assert_eq!(layout.size, 128);
    }

    #[test]
    fn test_array_layout_uses_vec4_stride() {
        let schema = UniformSchema::new()
            .with_uniform(UniformSlotDescriptor::scalar("u_factor", 0.0))
            .with_uniform(UniformSlotDescriptor::array(
                "u_kernel",
                UniformKind::Vec4,
                7,
                vec![1.0; 28],
            ));
        let layout = schema.layout();
        assert_eq!(layout.offsets, vec![0, 16]);
        assert_eq!(layout.size, 16 + 7 * 16);
    }

    #[test]
    fn test_pack_places_vec3_and_zero_pads() {
        let schema = UniformSchema::new()
            .with_uniform(UniformSlotDescriptor::vec3("u_a", [1.0, 2.0, 3.0]))
            .with_uniform(UniformSlotDescriptor::vec3("u_b", [4.0, 5.0, 6.0]));
        let layout = schema.layout();
        let values: Vec<UniformValue> = schema.uniforms.iter().map(|s| s.default.clone()).collect();
        let bytes = layout.pack(&schema, &values);
        let floats: &[f32] = bytemuck::cast_slice(&bytes);
        assert_eq!(floats, &[1.0, 2.0, 3.0, 0.0, 4.0, 5.0, 6.0, 0.0]);
    }

    #[test]
    fn test_validate_rejects_duplicates_per_namespace() {
        let schema = UniformSchema::new()
            .with_uniform(UniformSlotDescriptor::scalar("u_x", 0.0))
            .with_uniform(UniformSlotDescriptor::scalar("u_x", 1.0));
        assert!(matches!(schema.validate("fx"), Err(GraphicsError::Schema { .. })));

        // The same name in different namespaces is fine.
        let schema = UniformSchema::new()
            .with_uniform(UniformSlotDescriptor::scalar("u_x", 0.0))
            .with_texture(TextureSlotDescriptor::new("u_x", "white"));
        assert!(schema.validate("fx").is_ok());
    }

    #[test]
    fn test_validate_rejects_scalar_arrays_and_bad_defaults() {
        let scalar_array = UniformSchema::new().with_uniform(UniformSlotDescriptor::array(
            "u_weights",
            UniformKind::Scalar,
            4,
            vec![0.0; 4],
        ));
        assert!(scalar_array.validate("fx").is_err());

        let bad_default = UniformSchema::new().with_uniform(UniformSlotDescriptor::new(
            "u_color",
            UniformKind::Vec4,
            [1.0, 1.0, 1.0],
        ));
        assert!(bad_default.validate("fx").is_err());
    }

    #[test]
    fn test_wgsl_block_lists_members_in_order() {
        let block = raytrace_schema().wgsl_block();
        let view = block.find("u_view: mat4x4<f32>").unwrap();
        let light = block.find("u_lightPos: vec3<f32>").unwrap();
        assert!(view < light);
        assert!(block.contains("var<uniform> uniforms: EffectUniforms;"));
        assert!(UniformSchema::new().wgsl_block().is_empty());
    }
}
