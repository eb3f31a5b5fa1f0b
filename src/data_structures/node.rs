//! Scene nodes as seen by the draw call engine.
//!
//! The engine does not own a scene graph. The scene collaborator hands over a
//! flat slice of nodes per frame; inheritance hierarchies are replaced by a
//! capability tag ([`NodeKind`]) dispatched with a plain match.

use crate::data_structures::{bounds::Aabb, instance::Instance, mesh::MeshBuffer, mesh::RenderInfo};

/// What kind of drawing a node needs. Everything that is not `Standard`
/// bypasses culling-bucket classification and goes through a dedicated
/// immediate path.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeKind {
    /// Batchable mesh node, classified into pass buckets.
    Standard,
    /// Camera-facing quad, rendered through the billboard list.
    Billboard,
    /// Particle system proxy, rendered through the particle list.
    Particle,
    /// Node with its own draw logic, rendered through the immediate list.
    Custom,
}

/// Node-level colorization info. `Dynamic` carries one hue per mesh buffer
/// and is converted to static per-buffer infos at material initialization.
#[derive(Clone, Debug)]
pub enum NodeRenderInfo {
    Static(RenderInfo),
    Dynamic(Vec<f32>),
}

/// A positioned, boundable, drawable entity. Owned by the scene collaborator;
/// this engine only reads it, except for the bounding-box refresh of animated
/// nodes during the deferred update.
#[derive(Debug)]
pub struct SceneNode {
    pub kind: NodeKind,
    pub name: String,
    pub transform: Instance,
    /// Local-space bounds; kept at the last valid value when an animated
    /// node produces no geometry for a frame.
    pub bounds: Aabb,
    pub meshes: Vec<MeshBuffer>,
    pub render_info: Option<NodeRenderInfo>,
    pub all_parts_colorized: bool,
    pub casts_shadow: bool,
    /// Contributes to indirect lighting via the reflective shadow map.
    pub in_rsm: bool,
    /// Glow-emissive nodes are drawn in the glow pass with this colour.
    pub glow: Option<[f32; 3]>,
    pub visible: bool,
    /// Animated nodes need a CPU-side skin recompute and a per-frame upload.
    pub animated: bool,
    /// Whether the animation system produced geometry for the current frame.
    pub frame_ready: bool,
}

impl SceneNode {
    pub fn new(kind: NodeKind, name: impl Into<String>) -> Self {
        let zero = cgmath::Vector3::new(0.0, 0.0, 0.0);
        Self {
            kind,
            name: name.into(),
            transform: Instance::default(),
            bounds: Aabb::new(zero, zero),
            meshes: Vec::new(),
            render_info: None,
            all_parts_colorized: false,
            casts_shadow: true,
            in_rsm: false,
            glow: None,
            visible: true,
            animated: false,
            frame_ready: true,
        }
    }

    /// World-space corners of the bounding volume for the precise cull test.
    pub fn world_corners(&self) -> [cgmath::Vector3<f32>; 8] {
        self.bounds.transformed_corners(&self.transform.to_matrix())
    }

    /// Recompute local bounds from the current vertex data. Used by the
    /// deferred update of animated nodes.
    pub fn refresh_bounds(&mut self) {
        let mut merged: Option<Aabb> = None;
        for mesh in &self.meshes {
            if mesh.vertices.is_empty() {
                continue;
            }
            let positions: Vec<[f32; 3]> = mesh.vertices.iter().map(|v| v.position).collect();
            let aabb = Aabb::from_points(&positions);
            merged = Some(match merged {
                Some(prev) => prev.union(&aabb),
                None => aabb,
            });
        }
        if let Some(aabb) = merged {
            self.bounds = aabb;
        }
    }
}
