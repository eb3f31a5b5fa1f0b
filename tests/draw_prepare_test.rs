//! Device-backed round trip of prepare and submission. Needs a GPU adapter,
//! so everything is gated behind the `integration-tests` feature.
#![cfg(feature = "integration-tests")]

mod common;

use batch_ngin::{
    buckets::FrameBuckets,
    camera::camera_frustum,
    context::Context,
    data_structures::{
        mesh::{MeshId, RenderInfo, ShaderType},
        node::NodeRenderInfo,
    },
    draw::DrawCalls,
    pipelines::{DEPTH_FORMAT, solid::mk_solid_pipeline},
    visibility::PassFrusta,
};
use cgmath::EuclideanSpace;

use crate::common::test_utils::{solid_node, test_registry};

#[test]
fn prepare_and_submit_round_trip() {
    let ctx = futures::executor::block_on(Context::new(640, 480))
        .expect("no GPU adapter available for integration test");

    let registry = test_registry();
    let mut nodes = vec![
        solid_node("a", 1, (0.0, 0.0, 0.0)),
        solid_node("b", 1, (3.0, 0.0, 0.0)),
        solid_node("c", 2, (-3.0, 0.0, 0.0)),
        solid_node("glass", 3, (0.0, 2.0, 0.0)),
    ];
    nodes[3].render_info = Some(NodeRenderInfo::Static(RenderInfo::new(0.0, true)));

    let frustum = camera_frustum(&ctx.camera.camera, &ctx.projection);
    let frusta = PassFrusta {
        camera: &frustum,
        camera_position: ctx.camera.camera.position.to_vec(),
        shadow: None,
        rsm: None,
    };

    let mut draw_calls = DrawCalls::new(1 << 16, 1 << 17);
    draw_calls.prepare_draw_calls(&ctx, &mut nodes, &frusta, &registry);

    assert_eq!(draw_calls.arena().len(), 3);
    assert_eq!(draw_calls.buckets().solid_len(), 3);
    assert_eq!(draw_calls.buckets().transparent.len(), 1);
    assert_eq!(draw_calls.transparent_instance_count(), 1);

    let color_format = wgpu::TextureFormat::Rgba8UnormSrgb;
    let color = ctx.device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Test Color Target"),
        size: wgpu::Extent3d {
            width: 640,
            height: 480,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: color_format,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    let depth = ctx.device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Test Depth Target"),
        size: wgpu::Extent3d {
            width: 640,
            height: 480,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: DEPTH_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    let color_view = color.create_view(&wgpu::TextureViewDescriptor::default());
    let depth_view = depth.create_view(&wgpu::TextureViewDescriptor::default());

    let pipeline = mk_solid_pipeline(&ctx.device, color_format, &ctx.camera.bind_group_layout);

    let mut encoder = ctx
        .device
        .create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Test Encoder"),
        });
    {
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Test Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &color_view,
                depth_slice: None,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &depth_view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            occlusion_query_set: None,
            timestamp_writes: None,
        });
        pass.set_pipeline(&pipeline);
        pass.set_bind_group(0, &ctx.camera.bind_group, &[]);
        for shader in ShaderType::ALL {
            draw_calls.submit_solid(&mut pass, shader, &ctx.caps);
        }
        draw_calls.submit_transparent(&mut pass);
    }
    let index = ctx.queue.submit(std::iter::once(encoder.finish()));
    draw_calls.set_fence(index);

    // Second frame exercises the fence wait and the idempotent residency
    // path.
    draw_calls.prepare_draw_calls(&ctx, &mut nodes, &frusta, &registry);
    assert_eq!(draw_calls.arena().len(), 3);
    assert_eq!(draw_calls.pool().assigned_len(), if ctx.caps.base_instance { 3 } else { 0 });
}

fn bucket_membership(buckets: &FrameBuckets) -> (Vec<Vec<MeshId>>, Vec<MeshId>, Vec<MeshId>) {
    let solid = ShaderType::ALL
        .iter()
        .map(|s| buckets.solid_bucket(*s).iter().map(|r| r.id).collect())
        .collect();
    let transparent = buckets.transparent.iter().map(|t| t.id).collect();
    let glow = buckets.glow.iter().map(|r| r.id).collect();
    (solid, transparent, glow)
}

#[test]
fn capability_toggle_keeps_bucket_membership() {
    let mut ctx = futures::executor::block_on(Context::new(640, 480))
        .expect("no GPU adapter available for integration test");

    let registry = test_registry();
    let mut nodes = vec![
        solid_node("a", 1, (0.0, 0.0, 0.0)),
        solid_node("b", 2, (3.0, 0.0, 0.0)),
        solid_node("glass", 3, (0.0, 2.0, 0.0)),
    ];
    nodes[2].render_info = Some(NodeRenderInfo::Static(RenderInfo::new(0.0, true)));

    let frustum = camera_frustum(&ctx.camera.camera, &ctx.projection);
    let frusta = PassFrusta {
        camera: &frustum,
        camera_position: ctx.camera.camera.position.to_vec(),
        shadow: None,
        rsm: None,
    };

    let mut draw_calls = DrawCalls::new(1 << 16, 1 << 17);

    // Instanced path: shared pool with base offsets.
    ctx.caps.base_instance = true;
    draw_calls.prepare_draw_calls(&ctx, &mut nodes, &frusta, &registry);
    let instanced = bucket_membership(draw_calls.buckets());
    assert_eq!(draw_calls.transparent_instance_count(), 1);

    // Fallback path on the next frame: same scene, same buckets.
    ctx.caps.base_instance = false;
    ctx.caps.multi_draw_indirect = false;
    draw_calls.prepare_draw_calls(&ctx, &mut nodes, &frusta, &registry);

    assert_eq!(bucket_membership(draw_calls.buckets()), instanced);
    assert_eq!(draw_calls.transparent_instance_count(), 1);
}
