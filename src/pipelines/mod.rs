//! Render pipeline construction for the batched passes.

pub mod glow;
pub mod lines;
pub mod normals;
pub mod shadow;
pub mod solid;
pub mod transparent;

pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;
