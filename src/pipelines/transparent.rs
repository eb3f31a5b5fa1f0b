use crate::{
    data_structures::{
        instance::InstanceData,
        mesh::{MeshVertex, TransparencyKind, Vertex},
    },
    pipelines::{DEPTH_FORMAT, solid::mk_render_pipeline},
};

/// Blend pipeline for the immediate transparent path; one per
/// [`TransparencyKind`], depth-tested without depth writes so overlapping
/// transparents never punch holes into each other.
pub fn mk_transparent_pipeline(
    device: &wgpu::Device,
    color_format: wgpu::TextureFormat,
    camera_bind_group_layout: &wgpu::BindGroupLayout,
    kind: TransparencyKind,
) -> wgpu::RenderPipeline {
    let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("Transparent Pipeline Layout"),
        bind_group_layouts: &[camera_bind_group_layout],
        push_constant_ranges: &[],
    });

    let shader = wgpu::ShaderModuleDescriptor {
        label: Some("Transparent Shader"),
        source: wgpu::ShaderSource::Wgsl(include_str!("transparent.wgsl").into()),
    };

    let blend = match kind {
        TransparencyKind::Additive => wgpu::BlendState {
            color: wgpu::BlendComponent {
                src_factor: wgpu::BlendFactor::One,
                dst_factor: wgpu::BlendFactor::One,
                operation: wgpu::BlendOperation::Add,
            },
            alpha: wgpu::BlendComponent::OVER,
        },
        TransparencyKind::Blend | TransparencyKind::Translucent => wgpu::BlendState::ALPHA_BLENDING,
    };

    mk_render_pipeline(
        device,
        &layout,
        color_format,
        Some(blend),
        Some(DEPTH_FORMAT),
        false,
        &[MeshVertex::desc(), InstanceData::desc()],
        shader,
    )
}
