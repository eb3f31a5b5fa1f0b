//! Visibility testing and pass classification.
//!
//! Walks the scene slice once per frame, routes non-batchable node kinds to
//! their immediate lists, frustum-tests everything else with the precise
//! eight-corner box test and sorts surviving mesh buffers into the per-pass
//! buckets. Classification errors are recovered locally: a mesh with an
//! unrecognized material is skipped with a diagnostic, never a frame abort.
//!
//! Shadow and reflective-shadow-map buckets are tested against their light
//! frusta independently of the camera, so a mesh behind the camera can still
//! cast into the scene.

use cgmath::InnerSpace;

use crate::{
    buckets::{CASCADE_COUNT, FrameBuckets, MeshRef, TransparentRef},
    camera::Frustum,
    data_structures::{
        mesh::{MaterialRegistry, TransparencyKind},
        node::{NodeKind, NodeRenderInfo, SceneNode},
    },
};

/// The frusta one frame is classified against. Shadow and RSM frusta are
/// optional; passes without a frustum produce empty buckets.
pub struct PassFrusta<'a> {
    pub camera: &'a Frustum,
    pub camera_position: cgmath::Vector3<f32>,
    pub shadow: Option<&'a [Frustum; CASCADE_COUNT]>,
    pub rsm: Option<&'a Frustum>,
}

/// Cull and classify all nodes into `buckets`. `debug_viz` additionally
/// collects the bounding-box edges of camera-culled nodes.
pub fn classify_scene(
    nodes: &[SceneNode],
    frusta: &PassFrusta,
    registry: &MaterialRegistry,
    buckets: &mut FrameBuckets,
    debug_viz: bool,
) {
    for (node_idx, node) in nodes.iter().enumerate() {
        if !node.visible {
            continue;
        }

        let corners = node.world_corners();
        let camera_visible = !frusta.camera.culls_box(&corners);

        match node.kind {
            NodeKind::Billboard => {
                if camera_visible {
                    buckets.billboards.push(node_idx);
                }
                continue;
            }
            NodeKind::Particle => {
                if camera_visible {
                    buckets.particles.push(node_idx);
                }
                continue;
            }
            NodeKind::Custom => {
                if camera_visible {
                    buckets.immediate_nodes.push(node_idx);
                }
                continue;
            }
            NodeKind::Standard => {}
        }

        if !camera_visible && debug_viz {
            let world = node.transform.to_matrix();
            for (p0, p1) in node.bounds.transformed_edges(&world) {
                buckets.push_box_edge(p0, p1);
            }
        }

        let shadow_visible: [bool; CASCADE_COUNT] = match frusta.shadow {
            Some(shadow) if node.casts_shadow => {
                std::array::from_fn(|cascade| !shadow[cascade].culls_box(&corners))
            }
            _ => [false; CASCADE_COUNT],
        };
        let rsm_visible = match frusta.rsm {
            Some(rsm) if node.in_rsm => !rsm.culls_box(&corners),
            _ => false,
        };

        let any_visible = camera_visible || rsm_visible || shadow_visible.iter().any(|&v| v);
        if !any_visible {
            continue;
        }

        if node.animated {
            buckets.deferred_update.push(node_idx);
        }

        classify_node_meshes(
            node_idx,
            node,
            camera_visible,
            &shadow_visible,
            rsm_visible,
            frusta,
            registry,
            buckets,
        );
    }
}

fn classify_node_meshes(
    node_idx: usize,
    node: &SceneNode,
    camera_visible: bool,
    shadow_visible: &[bool; CASCADE_COUNT],
    rsm_visible: bool,
    frusta: &PassFrusta,
    registry: &MaterialRegistry,
    buckets: &mut FrameBuckets,
) {
    let render_info_transparent = matches!(
        &node.render_info,
        Some(NodeRenderInfo::Static(ri)) if ri.transparent
    );

    for (mesh_idx, mesh) in node.meshes.iter().enumerate() {
        let Some(desc) = registry.material_for(mesh.texture, mesh) else {
            log::warn!(
                "Unhandled material type {} on mesh '{}', skipping for this frame",
                mesh.material_id,
                mesh.name
            );
            continue;
        };

        let mesh_ref = MeshRef {
            node: node_idx,
            mesh: mesh_idx,
            id: mesh.id,
        };

        if let Some(kind) = desc.transparent {
            // Material-level transparency always goes through the immediate
            // path; ordering is decided at submission time.
            if camera_visible {
                buckets.transparent.push(transparent_ref(
                    mesh_ref,
                    kind,
                    node,
                    frusta.camera_position,
                ));
            }
            continue;
        }

        // Glow wins over render-info transparency: a glow-flagged mesh is
        // drawn solid plus glow, never translucent.
        let glow = node.glow.is_some();
        if !glow && render_info_transparent {
            if camera_visible {
                buckets.transparent.push(transparent_ref(
                    mesh_ref,
                    TransparencyKind::Translucent,
                    node,
                    frusta.camera_position,
                ));
            }
            continue;
        }

        let triangles = mesh.indices.len() as u32 / 3;
        if camera_visible {
            buckets.solid[desc.shader.index()].push(mesh_ref);
            buckets.solid_poly_count += triangles;
            if glow {
                buckets.glow.push(mesh_ref);
            }
        }
        for (cascade, visible) in shadow_visible.iter().enumerate() {
            if *visible {
                buckets.shadow[cascade][desc.shader.index()].push(mesh_ref);
                buckets.shadow_poly_count += triangles;
            }
        }
        if rsm_visible {
            buckets.rsm[desc.shader.index()].push(mesh_ref);
        }
    }
}

fn transparent_ref(
    mesh_ref: MeshRef,
    kind: TransparencyKind,
    node: &SceneNode,
    camera_position: cgmath::Vector3<f32>,
) -> TransparentRef {
    TransparentRef {
        node: mesh_ref.node,
        mesh: mesh_ref.mesh,
        id: mesh_ref.id,
        kind,
        depth: (node.transform.position - camera_position).magnitude(),
    }
}

/// Back-to-front order for the immediate transparent path. Stable so that
/// meshes at equal depth keep their classification order.
pub fn sort_transparent(transparent: &mut [TransparentRef]) {
    transparent.sort_by(|a, b| b.depth.total_cmp(&a.depth));
}
