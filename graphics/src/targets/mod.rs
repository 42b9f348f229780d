//! Off-screen render targets with named colour channels.

mod render_texture;

pub use render_texture::{
    ChannelView, ColorChannelDescriptor, DepthStencilDescriptor, RenderTexture,
    RenderTextureDescriptor,
};
pub(crate) use render_texture::TargetAttachments;
