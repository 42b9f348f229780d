//! Graphics error types.

use std::fmt;

use thiserror::Error;

use crate::backend::BackendError;

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, GraphicsError>;

/// Namespace a slot name was looked up in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlotCategory {
    Uniform,
    Texture,
    Sampler,
}

impl fmt::Display for SlotCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Uniform => "uniform",
            Self::Texture => "texture",
            Self::Sampler => "sampler",
        })
    }
}

/// Errors that can occur in the graphics system.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphicsError {
    /// Shader source failed to parse or validate.
    #[error("failed to compile effect '{effect}': {message}")]
    Compile { effect: String, message: String },
    /// Declared schema disagrees with itself or with the shader source.
    #[error("schema error in effect '{effect}': {message}")]
    Schema { effect: String, message: String },
    /// A resource set was addressed with a name its effect does not declare.
    #[error("effect '{effect}' has no {category} slot named '{name}'")]
    UnknownSlot {
        effect: String,
        category: SlotCategory,
        name: String,
    },
    /// A render texture was asked for a channel it does not have.
    #[error("render texture '{target}' has no channel named '{channel}'")]
    UnknownChannel { target: String, channel: String },
    /// A value does not have the shape its slot declares.
    #[error("uniform '{name}' expects {expected}, got {actual}")]
    TypeMismatch {
        name: String,
        expected: String,
        actual: String,
    },
    /// A macro override names a switch the effect does not declare.
    #[error("effect '{effect}' has no macro switch named '{name}'")]
    UnknownMacro { effect: String, name: String },
    /// Frame lifecycle misuse.
    #[error("invalid frame state: {0}")]
    InvalidFrameState(String),
    /// A pass was recorded with a missing, dead or conflicting binding.
    #[error("invalid binding: {0}")]
    InvalidBinding(String),
    /// An invalid parameter was provided.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    /// The GPU backend rejected an operation.
    #[error(transparent)]
    Backend(#[from] BackendError),
}
