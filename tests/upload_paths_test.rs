//! Device-backed coverage of the two dynamic-upload paths. Needs a GPU
//! adapter, so everything is gated behind the `integration-tests` feature.
#![cfg(feature = "integration-tests")]

mod common;

use batch_ngin::{
    camera::camera_frustum, context::Context, draw::DrawCalls, sync::VertexPool,
    visibility::PassFrusta,
};
use cgmath::EuclideanSpace;

use crate::common::test_utils::{
    SOLID_TEXTURE, cube_mesh, init_test_logging, solid_node, test_registry,
};

fn device_context() -> Context {
    futures::executor::block_on(Context::new(640, 480))
        .expect("no GPU adapter available for integration test")
}

#[test]
fn mapped_and_persistent_paths_stage_identical_bytes() {
    let ctx = device_context();

    // Same updated geometry pushed through both paths.
    let updated = {
        let mut mesh = cube_mesh(1, SOLID_TEXTURE);
        for v in &mut mesh.vertices {
            v.position[1] += 2.0;
        }
        mesh
    };
    let base = cube_mesh(1, SOLID_TEXTURE);

    let mut persistent = VertexPool::new(64, 256);
    let slot_p = persistent.assign(&base).unwrap();
    persistent.ensure_buffers(&ctx.device);
    persistent.write_into_staging(slot_p, updated.vertex_bytes());
    persistent.flush(&ctx.queue);

    let mut mapped = VertexPool::new(64, 256);
    let slot_m = mapped.assign(&base).unwrap();
    mapped.ensure_buffers(&ctx.device);
    mapped
        .upload_mapped(&ctx.device, &ctx.queue, slot_m, updated.vertex_bytes())
        .unwrap();

    assert_eq!(persistent.staged_bytes(slot_p), mapped.staged_bytes(slot_m));
    assert_ne!(mapped.staged_bytes(slot_m), base.vertex_bytes());
}

#[test]
fn mapped_upload_requires_device_buffers() {
    let ctx = device_context();
    let mesh = cube_mesh(1, SOLID_TEXTURE);
    let mut pool = VertexPool::new(64, 256);
    let slot = pool.assign(&mesh).unwrap();

    assert!(
        pool.upload_mapped(&ctx.device, &ctx.queue, slot, mesh.vertex_bytes())
            .is_err()
    );
}

#[test]
fn first_frame_dynamic_upload_succeeds_on_explicit_path() {
    init_test_logging();
    let mut ctx = device_context();
    // Shared pool with the explicit map/copy/unmap upload path, the
    // combination a first frame must already handle.
    ctx.caps.base_instance = true;
    ctx.caps.async_upload = false;

    let registry = test_registry();
    let mut nodes = vec![solid_node("kart", 1, (0.0, 0.0, 0.0))];
    nodes[0].animated = true;
    nodes[0].meshes[0].dynamic = true;

    let frustum = camera_frustum(&ctx.camera.camera, &ctx.projection);
    let frusta = PassFrusta {
        camera: &frustum,
        camera_position: ctx.camera.camera.position.to_vec(),
        shadow: None,
        rsm: None,
    };

    let mut draw_calls = DrawCalls::new(1 << 12, 1 << 13);
    draw_calls.prepare_draw_calls(&ctx, &mut nodes, &frusta, &registry);

    assert_eq!(draw_calls.buckets().deferred_update, vec![0]);
    assert_eq!(draw_calls.dynamic_upload_failures(), 0);
    assert!(draw_calls.pool().vertex_buffer().is_some());
}
