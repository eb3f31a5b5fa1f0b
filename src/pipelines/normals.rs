use crate::{
    data_structures::{
        instance::InstanceData,
        mesh::{MeshVertex, Vertex},
    },
    pipelines::{DEPTH_FORMAT, solid::mk_render_pipeline},
};

/// Debug pipeline visualizing world-space normals as color, drawn over the
/// same solid command spans as the regular passes.
pub fn mk_normals_pipeline(
    device: &wgpu::Device,
    color_format: wgpu::TextureFormat,
    camera_bind_group_layout: &wgpu::BindGroupLayout,
) -> wgpu::RenderPipeline {
    let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("Normals Pipeline Layout"),
        bind_group_layouts: &[camera_bind_group_layout],
        push_constant_ranges: &[],
    });

    let shader = wgpu::ShaderModuleDescriptor {
        label: Some("Normals Shader"),
        source: wgpu::ShaderSource::Wgsl(include_str!("normals.wgsl").into()),
    };

    mk_render_pipeline(
        device,
        &layout,
        color_format,
        Some(wgpu::BlendState {
            alpha: wgpu::BlendComponent::REPLACE,
            color: wgpu::BlendComponent::REPLACE,
        }),
        Some(DEPTH_FORMAT),
        true,
        &[MeshVertex::desc(), InstanceData::desc()],
        shader,
    )
}
