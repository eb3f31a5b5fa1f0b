//! batch-ngin
//!
//! A batched draw-call engine for real-time scene rendering on wgpu. Each
//! frame it culls a scene of nodes against the camera, shadow and reflective
//! shadow map frusta, classifies surviving mesh buffers into per-pass
//! buckets, keeps their GPU buffers resident and in sync, and rebuilds the
//! indirect command buffers the passes are submitted from. Submission
//! degrades gracefully with hardware capability, from one multidraw per
//! shader type down to a per-object loop.
//!
//! High-level modules
//! - `camera`: camera, projection, uniforms and frustum extraction/testing
//! - `context`: central GPU context owning device/queue/capabilities
//! - `data_structures`: scene data models (meshes, materials, nodes, instances)
//! - `buckets`: per-frame pass bucket storage
//! - `visibility`: frustum culling and pass classification
//! - `sync`: GPU mesh residency, the shared vertex pool and dynamic uploads
//! - `commands`: per-pass indirect command buffers
//! - `draw`: frame orchestration and pass submission
//! - `pipelines`: render pipelines for the solid, shadow, glow and
//!   transparent passes
//!

pub mod buckets;
pub mod camera;
pub mod commands;
pub mod context;
pub mod data_structures;
pub mod draw;
pub mod pipelines;
pub mod sync;
pub mod visibility;

// Re-exports commonly used types for convenience in downstream code.
pub use cgmath::*;
pub use wgpu::*;
