mod common;

use batch_ngin::{
    buckets::FrameBuckets,
    commands::{GlowCommandBuffer, RsmCommandBuffer, ShadowCommandBuffer, SolidCommandBuffer},
    data_structures::{
        mesh::{MeshId, ShaderType},
        node::SceneNode,
    },
    sync::{GpuMeshArena, VertexPool},
    visibility::{PassFrusta, classify_scene},
};
use cgmath::Vector3;

use crate::common::test_utils::{
    VEGETATION_TEXTURE, solid_node, test_registry, textured_node, view_frustum,
};

/// Classify and make everything pool-resident, CPU only.
fn prepared(nodes: &[SceneNode]) -> (FrameBuckets, GpuMeshArena, VertexPool) {
    let registry = test_registry();
    let mut arena = GpuMeshArena::new();
    let mut pool = VertexPool::new(1024, 4096);
    for node in nodes {
        arena.init_node_materials(node, &registry);
        arena.assign_pool_offsets(&mut pool, node);
    }
    let frustum = view_frustum();
    let frusta = PassFrusta {
        camera: &frustum,
        camera_position: Vector3::new(0.0, 0.0, 0.0),
        shadow: None,
        rsm: None,
    };
    let mut buckets = FrameBuckets::new();
    classify_scene(nodes, &frusta, &registry, &mut buckets, false);
    (buckets, arena, pool)
}

#[test]
fn shared_mesh_collapses_into_one_instanced_command() {
    // Two nodes draw the same mesh buffer, a third draws its own.
    let nodes = vec![
        solid_node("a", 1, (0.0, 0.0, -10.0)),
        solid_node("b", 1, (3.0, 0.0, -10.0)),
        solid_node("c", 2, (-3.0, 0.0, -10.0)),
    ];
    let (buckets, arena, pool) = prepared(&nodes);

    let mut cmds = SolidCommandBuffer::new();
    cmds.fill(&buckets, &arena, &nodes, 0.0);

    let span = cmds.span(ShaderType::Solid);
    assert_eq!(span.count, 2);
    assert_eq!(cmds.instances().len(), 3);

    let shared = &cmds.commands()[span.first as usize];
    assert_eq!(shared.instance_count, 2);
    assert_eq!(shared.index_count, 36);
    let slot = pool.slot(MeshId(1)).unwrap();
    assert_eq!(shared.first_index, slot.base_index);
    assert_eq!(shared.base_vertex, slot.base_vertex as i32);

    let own = &cmds.commands()[span.first as usize + 1];
    assert_eq!(own.instance_count, 1);
    assert_eq!(own.first_instance, 2);
}

#[test]
fn spans_partition_commands_by_shader_type() {
    let nodes = vec![
        solid_node("rock", 1, (0.0, 0.0, -10.0)),
        textured_node("grass", 2, VEGETATION_TEXTURE, (2.0, 0.0, -10.0)),
        textured_node("bush", 3, VEGETATION_TEXTURE, (-2.0, 0.0, -10.0)),
    ];
    let (buckets, arena, _pool) = prepared(&nodes);

    let mut cmds = SolidCommandBuffer::new();
    cmds.fill(&buckets, &arena, &nodes, 0.0);

    assert_eq!(cmds.span(ShaderType::Solid).count, 1);
    assert_eq!(cmds.span(ShaderType::Vegetation).count, 2);
    for shader in ShaderType::ALL {
        if shader != ShaderType::Solid && shader != ShaderType::Vegetation {
            assert_eq!(cmds.span(shader).count, 0, "{shader:?}");
        }
    }
    // Spans cover the command array without gaps.
    let veg = cmds.span(ShaderType::Vegetation);
    assert_eq!(veg.first, cmds.span(ShaderType::Solid).count);
    assert_eq!((veg.first + veg.count) as usize, cmds.commands().len());
}

#[test]
fn wind_weight_applies_to_vegetation_only() {
    let nodes = vec![
        solid_node("rock", 1, (0.0, 0.0, -10.0)),
        textured_node("grass", 2, VEGETATION_TEXTURE, (2.0, 0.0, -10.0)),
    ];
    let (buckets, arena, _pool) = prepared(&nodes);

    let mut cmds = SolidCommandBuffer::new();
    cmds.fill(&buckets, &arena, &nodes, 0.75);

    let solid_cmd = cmds.commands()[cmds.span(ShaderType::Solid).first as usize];
    let veg_cmd = cmds.commands()[cmds.span(ShaderType::Vegetation).first as usize];
    assert_eq!(cmds.instances()[solid_cmd.first_instance as usize].extra()[3], 0.0);
    assert_eq!(cmds.instances()[veg_cmd.first_instance as usize].extra()[3], 0.75);
}

#[test]
fn non_resident_mesh_is_left_out() {
    let nodes = vec![solid_node("cube", 1, (0.0, 0.0, -10.0))];
    let registry = test_registry();
    let mut arena = GpuMeshArena::new();
    // Material init without pool assignment: handle exists, not resident.
    arena.init_node_materials(&nodes[0], &registry);

    let frustum = view_frustum();
    let frusta = PassFrusta {
        camera: &frustum,
        camera_position: Vector3::new(0.0, 0.0, 0.0),
        shadow: None,
        rsm: None,
    };
    let mut buckets = FrameBuckets::new();
    classify_scene(&nodes, &frusta, &registry, &mut buckets, false);

    let mut cmds = SolidCommandBuffer::new();
    cmds.fill(&buckets, &arena, &nodes, 0.0);
    assert_eq!(cmds.span(ShaderType::Solid).count, 0);
    assert!(cmds.instances().is_empty());
}

#[test]
fn shadow_commands_repeat_per_cascade() {
    let nodes = vec![solid_node("cube", 1, (0.0, 0.0, -10.0))];
    let registry = test_registry();
    let mut arena = GpuMeshArena::new();
    let mut pool = VertexPool::new(1024, 4096);
    arena.init_node_materials(&nodes[0], &registry);
    arena.assign_pool_offsets(&mut pool, &nodes[0]);

    let frustum = view_frustum();
    let shadow = std::array::from_fn(|_| view_frustum());
    let frusta = PassFrusta {
        camera: &frustum,
        camera_position: Vector3::new(0.0, 0.0, 0.0),
        shadow: Some(&shadow),
        rsm: None,
    };
    let mut buckets = FrameBuckets::new();
    classify_scene(&nodes, &frusta, &registry, &mut buckets, false);

    let mut cmds = ShadowCommandBuffer::new();
    cmds.fill(&buckets, &arena, &nodes, 0.0);
    for cascade in 0..4 {
        assert_eq!(cmds.span(cascade, ShaderType::Solid).count, 1);
    }
    assert_eq!(cmds.commands().len(), 4);
}

#[test]
fn glow_and_rsm_buffers_fill_from_their_buckets() {
    let mut glowing = solid_node("ring", 1, (0.0, 0.0, -10.0));
    glowing.glow = Some([1.0, 0.0, 0.0]);
    glowing.in_rsm = true;
    let nodes = vec![glowing];

    let registry = test_registry();
    let mut arena = GpuMeshArena::new();
    let mut pool = VertexPool::new(1024, 4096);
    arena.init_node_materials(&nodes[0], &registry);
    arena.assign_pool_offsets(&mut pool, &nodes[0]);

    let frustum = view_frustum();
    let rsm = view_frustum();
    let frusta = PassFrusta {
        camera: &frustum,
        camera_position: Vector3::new(0.0, 0.0, 0.0),
        shadow: None,
        rsm: Some(&rsm),
    };
    let mut buckets = FrameBuckets::new();
    classify_scene(&nodes, &frusta, &registry, &mut buckets, false);

    let mut glow = GlowCommandBuffer::new();
    glow.fill(&buckets, &arena, &nodes);
    assert_eq!(glow.span().count, 1);

    let mut rsm_cmds = RsmCommandBuffer::new();
    rsm_cmds.fill(&buckets, &arena, &nodes);
    assert_eq!(rsm_cmds.span(ShaderType::Solid).count, 1);
}

#[test]
fn refill_replaces_previous_frame() {
    let nodes = vec![solid_node("cube", 1, (0.0, 0.0, -10.0))];
    let (buckets, arena, _pool) = prepared(&nodes);

    let mut cmds = SolidCommandBuffer::new();
    cmds.fill(&buckets, &arena, &nodes, 0.0);
    cmds.fill(&buckets, &arena, &nodes, 0.0);

    assert_eq!(cmds.commands().len(), 1);
    assert_eq!(cmds.instances().len(), 1);
}
