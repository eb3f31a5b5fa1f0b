//! Per-frame pass buckets.
//!
//! All classification output lives in one [`FrameBuckets`] value that is
//! cleared at frame start and handed through the prepare/fill/submit
//! pipeline. Nothing in here survives a frame, which rules out
//! stale-visibility bugs by construction.

use crate::data_structures::mesh::{MeshId, ShaderType, TransparencyKind};

/// Number of shadow cascades, one light frustum each.
pub const CASCADE_COUNT: usize = 4;

/// Reference into the scene slice: node index, mesh index within the node,
/// and the stable mesh identity for GPU handle lookup.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MeshRef {
    pub node: usize,
    pub mesh: usize,
    pub id: MeshId,
}

/// A transparent mesh queued for the immediate path, with the view depth
/// used for back-to-front ordering at submission time.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TransparentRef {
    pub node: usize,
    pub mesh: usize,
    pub id: MeshId,
    pub kind: TransparencyKind,
    pub depth: f32,
}

/// Ordered per-pass mesh buckets, populated fresh every frame.
#[derive(Debug)]
pub struct FrameBuckets {
    /// Solid pass, keyed by shader type.
    pub solid: [Vec<MeshRef>; ShaderType::COUNT],
    /// Shadow passes, one bucket set per cascade.
    pub shadow: [[Vec<MeshRef>; ShaderType::COUNT]; CASCADE_COUNT],
    /// Reflective shadow map, keyed by shader type.
    pub rsm: [Vec<MeshRef>; ShaderType::COUNT],
    /// Glow pass, independent of shader type.
    pub glow: Vec<MeshRef>,
    /// Transparent meshes drawn through the immediate path.
    pub transparent: Vec<TransparentRef>,
    /// Nodes with their own draw logic.
    pub immediate_nodes: Vec<usize>,
    pub billboards: Vec<usize>,
    pub particles: Vec<usize>,
    /// Animated nodes needing a CPU skin recompute before draw submission.
    pub deferred_update: Vec<usize>,
    /// Line-pair vertex positions of culled bounding boxes for debug
    /// visualization.
    pub bounding_boxes: Vec<f32>,
    pub solid_poly_count: u32,
    pub shadow_poly_count: u32,
}

impl FrameBuckets {
    pub fn new() -> Self {
        Self {
            solid: std::array::from_fn(|_| Vec::new()),
            shadow: std::array::from_fn(|_| std::array::from_fn(|_| Vec::new())),
            rsm: std::array::from_fn(|_| Vec::new()),
            glow: Vec::new(),
            transparent: Vec::new(),
            immediate_nodes: Vec::new(),
            billboards: Vec::new(),
            particles: Vec::new(),
            deferred_update: Vec::new(),
            bounding_boxes: Vec::new(),
            solid_poly_count: 0,
            shadow_poly_count: 0,
        }
    }

    /// Reset for the next frame. Keeps allocations.
    pub fn clear(&mut self) {
        for bucket in &mut self.solid {
            bucket.clear();
        }
        for cascade in &mut self.shadow {
            for bucket in cascade {
                bucket.clear();
            }
        }
        for bucket in &mut self.rsm {
            bucket.clear();
        }
        self.glow.clear();
        self.transparent.clear();
        self.immediate_nodes.clear();
        self.billboards.clear();
        self.particles.clear();
        self.deferred_update.clear();
        self.bounding_boxes.clear();
        self.solid_poly_count = 0;
        self.shadow_poly_count = 0;
    }

    pub fn solid_bucket(&self, shader: ShaderType) -> &[MeshRef] {
        &self.solid[shader.index()]
    }

    pub fn shadow_bucket(&self, cascade: usize, shader: ShaderType) -> &[MeshRef] {
        &self.shadow[cascade][shader.index()]
    }

    pub fn rsm_bucket(&self, shader: ShaderType) -> &[MeshRef] {
        &self.rsm[shader.index()]
    }

    /// Total solid-bucket entries across all shader types.
    pub fn solid_len(&self) -> usize {
        self.solid.iter().map(Vec::len).sum()
    }

    pub fn push_box_edge(&mut self, p0: cgmath::Vector3<f32>, p1: cgmath::Vector3<f32>) {
        self.bounding_boxes
            .extend_from_slice(&[p0.x, p0.y, p0.z, p1.x, p1.y, p1.z]);
    }
}

impl Default for FrameBuckets {
    fn default() -> Self {
        Self::new()
    }
}
