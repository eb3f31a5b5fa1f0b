//! Mesh buffer synchronization: GPU handle lifetime and per-frame uploads.
//!
//! Every mesh buffer that reaches a pass bucket needs a GPU-resident
//! counterpart. [`GpuMeshArena`] owns those handles keyed by mesh identity,
//! [`VertexPool`] is the central allocator handing out base-vertex offsets in
//! one shared vertex/index buffer for the instanced path. Nodes without
//! base-instance support fall back to private per-mesh buffers.
//!
//! Dynamic (skinned) meshes re-upload their vertex bytes every frame through
//! one of two paths selected by capability: a write into the pool's
//! persistent staging mirror flushed in bulk, or an explicit
//! map/copy/unmap cycle through a transient staging buffer. Both paths write
//! byte-identical data for identical input.

use std::collections::HashMap;
use std::iter;

use wgpu::util::DeviceExt;

use crate::{
    context::GpuCaps,
    data_structures::{
        mesh::{
            MaterialRegistry, MeshBuffer, MeshId, RenderInfo, ShaderType, TransparencyKind,
        },
        node::{NodeRenderInfo, SceneNode},
    },
};

/// Cached pass classification of a mesh, decided exactly once per mesh-data
/// change at material initialization.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MeshPass {
    Solid(ShaderType),
    Transparent(TransparencyKind),
}

/// GPU-resident representation of one mesh buffer.
///
/// A handle with neither a private vertex buffer nor a pool offset is
/// considered not yet uploaded and must never be drawn.
#[derive(Debug)]
pub struct GpuMesh {
    /// Private buffers, used when base-instance indirect draws are missing.
    pub vertex_buffer: Option<wgpu::Buffer>,
    pub index_buffer: Option<wgpu::Buffer>,
    /// Offsets into the shared pool, used on the instanced path.
    pub base_vertex: Option<u32>,
    pub base_index: Option<u32>,
    pub element_count: u32,
    pub vertex_count: u32,
    pub pass: MeshPass,
    /// Static colorization info resolved at material initialization.
    pub render_info: Option<RenderInfo>,
    /// Texture-matrix translation, refreshed every frame without
    /// reclassification.
    pub texture_trans: [f32; 2],
    pub label: String,
}

impl GpuMesh {
    pub fn is_uploaded(&self) -> bool {
        self.vertex_buffer.is_some() || self.base_vertex.is_some()
    }

    pub fn hue(&self) -> f32 {
        self.render_info.map(|ri| ri.hue).unwrap_or(0.0)
    }
}

/// A mesh's slice of the shared pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PoolSlot {
    pub base_vertex: u32,
    pub base_index: u32,
    pub vertex_count: u32,
    pub index_count: u32,
}

/**
 * Central vertex/index buffer allocator for the instanced path.
 *
 * Offsets are bump-allocated and never compacted; a released slot is only
 * forgotten, not reused, matching the lifetime of track-scoped geometry.
 * The CPU staging mirror always holds the bytes last scheduled for upload,
 * so the persistent-write path and tests can inspect it directly.
 */
#[derive(Debug)]
pub struct VertexPool {
    capacity_vertices: u32,
    capacity_indices: u32,
    next_vertex: u32,
    next_index: u32,
    assignments: HashMap<MeshId, PoolSlot>,
    staging_vertices: Vec<u8>,
    staging_indices: Vec<u32>,
    dirty_vertex_ranges: Vec<(u64, u64)>,
    indices_dirty: bool,
    vertex_buffer: Option<wgpu::Buffer>,
    index_buffer: Option<wgpu::Buffer>,
}

impl VertexPool {
    pub fn new(capacity_vertices: u32, capacity_indices: u32) -> Self {
        let stride = MeshBuffer::stride() as usize;
        Self {
            capacity_vertices,
            capacity_indices,
            next_vertex: 0,
            next_index: 0,
            assignments: HashMap::new(),
            staging_vertices: vec![0; capacity_vertices as usize * stride],
            staging_indices: vec![0; capacity_indices as usize],
            dirty_vertex_ranges: Vec::new(),
            indices_dirty: false,
            vertex_buffer: None,
            index_buffer: None,
        }
    }

    /// Assign (or look up) the mesh's slot and stage its current geometry.
    /// Fails when the pool is exhausted; the mesh then stays unallocated and
    /// is excluded from drawing until an explicit reinitialization.
    pub fn assign(&mut self, mesh: &MeshBuffer) -> anyhow::Result<PoolSlot> {
        if let Some(slot) = self.assignments.get(&mesh.id) {
            return Ok(*slot);
        }
        let vertex_count = mesh.vertices.len() as u32;
        let index_count = mesh.indices.len() as u32;
        if self.next_vertex + vertex_count > self.capacity_vertices
            || self.next_index + index_count > self.capacity_indices
        {
            anyhow::bail!(
                "vertex pool exhausted: mesh '{}' needs {}v/{}i, {}v/{}i free",
                mesh.name,
                vertex_count,
                index_count,
                self.capacity_vertices - self.next_vertex,
                self.capacity_indices - self.next_index,
            );
        }
        let slot = PoolSlot {
            base_vertex: self.next_vertex,
            base_index: self.next_index,
            vertex_count,
            index_count,
        };
        self.next_vertex += vertex_count;
        self.next_index += index_count;

        let stride = MeshBuffer::stride() as usize;
        let offset = slot.base_vertex as usize * stride;
        let bytes = mesh.vertex_bytes();
        self.staging_vertices[offset..offset + bytes.len()].copy_from_slice(bytes);
        self.mark_dirty(offset as u64, bytes.len() as u64);
        let index_offset = slot.base_index as usize;
        self.staging_indices[index_offset..index_offset + mesh.indices.len()]
            .copy_from_slice(&mesh.indices);
        self.indices_dirty = true;

        self.assignments.insert(mesh.id, slot);
        Ok(slot)
    }

    pub fn slot(&self, id: MeshId) -> Option<PoolSlot> {
        self.assignments.get(&id).copied()
    }

    /// Forget a mesh's slot. Safe to call twice; the second call is a no-op.
    pub fn release(&mut self, id: MeshId) -> bool {
        self.assignments.remove(&id).is_some()
    }

    pub fn assigned_len(&self) -> usize {
        self.assignments.len()
    }

    pub fn allocated_vertices(&self) -> u32 {
        self.next_vertex
    }

    /// Persistent-write path: copy the mesh's current bytes into the staging
    /// mirror at its slot; flushed in bulk by [`VertexPool::flush`].
    pub fn write_into_staging(&mut self, slot: PoolSlot, bytes: &[u8]) {
        let stride = MeshBuffer::stride() as usize;
        let offset = slot.base_vertex as usize * stride;
        self.staging_vertices[offset..offset + bytes.len()].copy_from_slice(bytes);
        self.mark_dirty(offset as u64, bytes.len() as u64);
    }

    /// The bytes currently staged for a slot.
    pub fn staged_bytes(&self, slot: PoolSlot) -> &[u8] {
        let stride = MeshBuffer::stride() as usize;
        let offset = slot.base_vertex as usize * stride;
        let len = slot.vertex_count as usize * stride;
        &self.staging_vertices[offset..offset + len]
    }

    fn mark_dirty(&mut self, offset: u64, len: u64) {
        self.dirty_vertex_ranges.push((offset, len));
    }

    /// Create the device-side buffers. Called lazily on first draw request.
    pub fn ensure_buffers(&mut self, device: &wgpu::Device) {
        if self.vertex_buffer.is_none() {
            self.vertex_buffer = Some(device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("Pool Vertex Buffer"),
                size: self.staging_vertices.len() as u64,
                usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            }));
        }
        if self.index_buffer.is_none() {
            self.index_buffer = Some(device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("Pool Index Buffer"),
                size: (self.staging_indices.len() * std::mem::size_of::<u32>()) as u64,
                usage: wgpu::BufferUsages::INDEX | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            }));
        }
    }

    /// Upload all staged ranges. No-op without device buffers.
    pub fn flush(&mut self, queue: &wgpu::Queue) {
        if let Some(buffer) = &self.vertex_buffer {
            for (offset, len) in self.dirty_vertex_ranges.drain(..) {
                let range = offset as usize..(offset + len) as usize;
                queue.write_buffer(buffer, offset, &self.staging_vertices[range]);
            }
        }
        if self.indices_dirty {
            if let Some(buffer) = &self.index_buffer {
                queue.write_buffer(buffer, 0, bytemuck::cast_slice(&self.staging_indices));
                self.indices_dirty = false;
            }
        }
    }

    /// Explicit upload path: map a transient staging buffer, copy, unmap and
    /// schedule the device copy. The mapping is always released, even when
    /// the copy is abandoned early.
    pub fn upload_mapped(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        slot: PoolSlot,
        bytes: &[u8],
    ) -> anyhow::Result<()> {
        let Some(vertex_buffer) = &self.vertex_buffer else {
            anyhow::bail!("vertex pool has no device buffer yet");
        };
        let staging = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Pool Upload Staging"),
            size: bytes.len() as u64,
            usage: wgpu::BufferUsages::MAP_WRITE | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: true,
        });
        {
            let mut view = staging.slice(..).get_mapped_range_mut();
            view.copy_from_slice(bytes);
        }
        staging.unmap();

        let stride = MeshBuffer::stride() as u64;
        let offset = slot.base_vertex as u64 * stride;
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Pool Upload Encoder"),
        });
        encoder.copy_buffer_to_buffer(&staging, 0, vertex_buffer, offset, bytes.len() as u64);
        queue.submit(iter::once(encoder.finish()));

        // Keep the mirror coherent so later persistent writes and reads see
        // the same bytes.
        let mirror_offset = slot.base_vertex as usize * MeshBuffer::stride() as usize;
        self.staging_vertices[mirror_offset..mirror_offset + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }

    pub fn vertex_buffer(&self) -> Option<&wgpu::Buffer> {
        self.vertex_buffer.as_ref()
    }

    pub fn index_buffer(&self) -> Option<&wgpu::Buffer> {
        self.index_buffer.as_ref()
    }
}

/// Arena of GPU mesh handles indexed by mesh identity. Owned process-wide for
/// the renderer's lifetime and mutated only by the rendering thread.
#[derive(Debug, Default)]
pub struct GpuMeshArena {
    meshes: HashMap<MeshId, GpuMesh>,
}

impl GpuMeshArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: MeshId) -> Option<&GpuMesh> {
        self.meshes.get(&id)
    }

    pub fn len(&self) -> usize {
        self.meshes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.meshes.is_empty()
    }

    /// Material initialization: allocate handles and classify each mesh into
    /// its pass exactly once. Re-running on an unchanged node is a no-op, so
    /// per-frame calls neither leak nor reclassify.
    pub fn init_node_materials(&mut self, node: &SceneNode, registry: &MaterialRegistry) {
        for (mesh_idx, mesh) in node.meshes.iter().enumerate() {
            if self.meshes.contains_key(&mesh.id) {
                continue;
            }
            let Some(desc) = registry.material_for(mesh.texture, mesh) else {
                log::warn!(
                    "Unhandled material type {} on mesh '{}', not allocating a GPU handle",
                    mesh.material_id,
                    mesh.name
                );
                continue;
            };

            let render_info = resolve_render_info(node, mesh_idx, desc.colorizable);
            let pass = if let Some(kind) = desc.transparent {
                MeshPass::Transparent(kind)
            } else if node.glow.is_none() && render_info.is_some_and(|ri| ri.transparent) {
                MeshPass::Transparent(TransparencyKind::Translucent)
            } else {
                MeshPass::Solid(desc.shader)
            };

            self.meshes.insert(
                mesh.id,
                GpuMesh {
                    vertex_buffer: None,
                    index_buffer: None,
                    base_vertex: None,
                    base_index: None,
                    element_count: mesh.indices.len() as u32,
                    vertex_count: mesh.vertices.len() as u32,
                    pass,
                    render_info,
                    texture_trans: mesh.texture_translation(),
                    label: format!("{}/{}", node.name, mesh.name),
                },
            );
        }
    }

    /// Instanced path: fetch shared base offsets from the pool for every
    /// handle that is not resident yet.
    pub fn assign_pool_offsets(&mut self, pool: &mut VertexPool, node: &SceneNode) {
        for mesh in &node.meshes {
            let Some(entry) = self.meshes.get_mut(&mesh.id) else {
                continue;
            };
            if entry.is_uploaded() {
                continue;
            }
            match pool.assign(mesh) {
                Ok(slot) => {
                    entry.base_vertex = Some(slot.base_vertex);
                    entry.base_index = Some(slot.base_index);
                }
                Err(e) => {
                    // Fatal for this mesh: stays unallocated, never drawn,
                    // not retried until an explicit reinitialization.
                    log::error!("GPU residency failed for '{}': {}", entry.label, e);
                }
            }
        }
    }

    /// Fallback path: private vertex/index buffers per mesh.
    pub fn create_private_buffers(&mut self, device: &wgpu::Device, node: &SceneNode) {
        for mesh in &node.meshes {
            let Some(entry) = self.meshes.get_mut(&mesh.id) else {
                continue;
            };
            if entry.is_uploaded() {
                continue;
            }
            entry.vertex_buffer = Some(device.create_buffer_init(
                &wgpu::util::BufferInitDescriptor {
                    label: Some(&format!("{} Vertex Buffer", entry.label)),
                    contents: mesh.vertex_bytes(),
                    usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
                },
            ));
            entry.index_buffer = Some(device.create_buffer_init(
                &wgpu::util::BufferInitDescriptor {
                    label: Some(&format!("{} Index Buffer", entry.label)),
                    contents: bytemuck::cast_slice(&mesh.indices),
                    usage: wgpu::BufferUsages::INDEX | wgpu::BufferUsages::COPY_DST,
                },
            ));
        }
    }

    /// Per-frame refresh of texture-matrix translation. Independent of the
    /// one-time material classification.
    pub fn refresh_texture_trans(&mut self, node: &SceneNode) {
        for mesh in &node.meshes {
            if let Some(entry) = self.meshes.get_mut(&mesh.id) {
                entry.texture_trans = mesh.texture_translation();
            }
        }
    }

    /// Re-upload the current vertex bytes of every dynamic mesh on the node,
    /// choosing the path by capability. Returns the number of meshes whose
    /// upload failed.
    pub fn upload_dynamic(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        caps: &GpuCaps,
        pool: &mut VertexPool,
        node: &SceneNode,
    ) -> u32 {
        let mut failures = 0;
        for mesh in &node.meshes {
            if !mesh.dynamic {
                continue;
            }
            let Some(entry) = self.meshes.get(&mesh.id) else {
                continue;
            };
            if !entry.is_uploaded() {
                continue;
            }
            let bytes = mesh.vertex_bytes();
            if let Some(slot) = pool.slot(mesh.id) {
                if caps.async_upload {
                    pool.write_into_staging(slot, bytes);
                } else if let Err(e) = pool.upload_mapped(device, queue, slot, bytes) {
                    log::error!("dynamic upload failed for '{}': {}", entry.label, e);
                    failures += 1;
                }
            } else if let Some(buffer) = &entry.vertex_buffer {
                queue.write_buffer(buffer, 0, bytes);
            }
        }
        failures
    }

    /// Release one handle, freeing its buffers and pool slot exactly once.
    /// Calling release twice never double-frees.
    pub fn release(&mut self, id: MeshId, pool: &mut VertexPool) -> bool {
        match self.meshes.remove(&id) {
            Some(entry) => {
                // Dropping the wgpu buffers frees them; the pool forgets the
                // slot. A repeated call finds no entry and does nothing.
                drop(entry);
                pool.release(id);
                true
            }
            None => false,
        }
    }

    /// Release every handle owned by a node. Used on node destruction and
    /// mesh reassignment, after which material init runs fresh.
    pub fn release_node(&mut self, node: &SceneNode, pool: &mut VertexPool) {
        for mesh in &node.meshes {
            self.release(mesh.id, pool);
        }
    }
}

/// Resolve the static render info a mesh buffer is drawn with, converting a
/// node-level dynamic hue set into per-buffer static infos.
fn resolve_render_info(
    node: &SceneNode,
    mesh_idx: usize,
    colorizable: bool,
) -> Option<RenderInfo> {
    match &node.render_info {
        Some(NodeRenderInfo::Dynamic(hues)) => {
            let hue = hues.get(mesh_idx).copied().unwrap_or(0.0);
            (hue > 0.0).then(|| RenderInfo::new(hue, false))
        }
        Some(NodeRenderInfo::Static(ri)) => {
            (colorizable || node.all_parts_colorized || ri.transparent).then_some(*ri)
        }
        None => None,
    }
}
