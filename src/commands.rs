//! GPU-side command buffers for indirect/instanced draw submission.
//!
//! One specialization per pass, each wrapping the same staging-mirror
//! machinery: a CPU vector of indexed-indirect arguments plus the matching
//! per-instance attribute array, both fully rewritten every frame and
//! uploaded as a whole. Per-shader-type spans record which slice of the
//! command array a pass submission consumes.

use crate::{
    buckets::{CASCADE_COUNT, FrameBuckets, MeshRef},
    data_structures::{
        instance::InstanceData,
        mesh::ShaderType,
        node::SceneNode,
    },
    sync::{GpuMeshArena, MeshPass},
};

/// Matches wgpu's indexed indirect argument layout.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct DrawIndexedIndirectArgs {
    pub index_count: u32,
    pub instance_count: u32,
    pub first_index: u32,
    pub base_vertex: i32,
    pub first_instance: u32,
}

pub const INDIRECT_STRIDE: u64 = std::mem::size_of::<DrawIndexedIndirectArgs>() as u64;

/// A contiguous run of commands belonging to one bucket.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DrawSpan {
    pub first: u32,
    pub count: u32,
}

/// Staging mirror plus device buffers for one pass family.
#[derive(Debug, Default)]
struct CommandStorage {
    commands: Vec<DrawIndexedIndirectArgs>,
    instances: Vec<InstanceData>,
    spans: Vec<DrawSpan>,
    command_buffer: Option<wgpu::Buffer>,
    command_capacity: usize,
    instance_buffer: Option<wgpu::Buffer>,
    instance_capacity: usize,
}

impl CommandStorage {
    fn clear(&mut self) {
        self.commands.clear();
        self.instances.clear();
        self.spans.clear();
    }

    /// Pack one bucket into a span. Meshes shared by several nodes collapse
    /// into a single command with an instance count, which is why the bucket
    /// is ordered by mesh identity first.
    fn push_bucket(
        &mut self,
        bucket: &[MeshRef],
        arena: &GpuMeshArena,
        nodes: &[SceneNode],
        wind: f32,
    ) {
        let first = self.commands.len() as u32;

        let mut ordered: Vec<&MeshRef> = bucket.iter().collect();
        ordered.sort_by_key(|r| r.id);

        let mut i = 0;
        while i < ordered.len() {
            let id = ordered[i].id;
            let Some(entry) = arena.get(id) else {
                i += 1;
                continue;
            };
            let (Some(base_vertex), Some(base_index)) = (entry.base_vertex, entry.base_index)
            else {
                // Not pool-resident: drawn through the per-object fallback.
                i += 1;
                continue;
            };

            let first_instance = self.instances.len() as u32;
            let mut instance_count = 0;
            while i < ordered.len() && ordered[i].id == id {
                let node = &nodes[ordered[i].node];
                let wind_weight = match entry.pass {
                    MeshPass::Solid(ShaderType::Vegetation) => wind,
                    _ => 0.0,
                };
                self.instances.push(InstanceData::pack(
                    &node.transform,
                    entry.texture_trans,
                    entry.hue(),
                    wind_weight,
                ));
                instance_count += 1;
                i += 1;
            }

            self.commands.push(DrawIndexedIndirectArgs {
                index_count: entry.element_count,
                instance_count,
                first_index: base_index,
                base_vertex: base_vertex as i32,
                first_instance,
            });
        }

        self.spans.push(DrawSpan {
            first,
            count: self.commands.len() as u32 - first,
        });
    }

    /// Upload the staging mirror, growing the device buffers when the frame
    /// needs more room than any frame before.
    fn upload(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, label: &str) {
        if self.commands.is_empty() {
            return;
        }
        if self.command_buffer.is_none() || self.command_capacity < self.commands.len() {
            self.command_capacity = self.commands.len().next_power_of_two();
            self.command_buffer = Some(device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(&format!("{label} Command Buffer")),
                size: self.command_capacity as u64 * INDIRECT_STRIDE,
                usage: wgpu::BufferUsages::INDIRECT | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            }));
        }
        if self.instance_buffer.is_none() || self.instance_capacity < self.instances.len() {
            self.instance_capacity = self.instances.len().next_power_of_two();
            self.instance_buffer = Some(device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(&format!("{label} Instance Buffer")),
                size: (self.instance_capacity * std::mem::size_of::<InstanceData>()) as u64,
                usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            }));
        }
        if let Some(buffer) = &self.command_buffer {
            queue.write_buffer(buffer, 0, bytemuck::cast_slice(&self.commands));
        }
        if let Some(buffer) = &self.instance_buffer {
            queue.write_buffer(buffer, 0, bytemuck::cast_slice(&self.instances));
        }
    }
}

/// Command buffer for the solid first/second pass, spans keyed by shader
/// type.
#[derive(Debug, Default)]
pub struct SolidCommandBuffer {
    storage: CommandStorage,
}

impl SolidCommandBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fill(
        &mut self,
        buckets: &FrameBuckets,
        arena: &GpuMeshArena,
        nodes: &[SceneNode],
        wind: f32,
    ) {
        self.storage.clear();
        for bucket in &buckets.solid {
            self.storage.push_bucket(bucket, arena, nodes, wind);
        }
    }

    /// Empty span before the first fill.
    pub fn span(&self, shader: ShaderType) -> DrawSpan {
        self.storage.spans.get(shader.index()).copied().unwrap_or_default()
    }

    pub fn commands(&self) -> &[DrawIndexedIndirectArgs] {
        &self.storage.commands
    }

    pub fn instances(&self) -> &[InstanceData] {
        &self.storage.instances
    }

    pub fn upload(&mut self, device: &wgpu::Device, queue: &wgpu::Queue) {
        self.storage.upload(device, queue, "Solid");
    }

    pub fn command_buffer(&self) -> Option<&wgpu::Buffer> {
        self.storage.command_buffer.as_ref()
    }

    pub fn instance_buffer(&self) -> Option<&wgpu::Buffer> {
        self.storage.instance_buffer.as_ref()
    }
}

/// Command buffer for the four shadow cascades, spans keyed by cascade and
/// shader type.
#[derive(Debug, Default)]
pub struct ShadowCommandBuffer {
    storage: CommandStorage,
}

impl ShadowCommandBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fill(
        &mut self,
        buckets: &FrameBuckets,
        arena: &GpuMeshArena,
        nodes: &[SceneNode],
        wind: f32,
    ) {
        self.storage.clear();
        for cascade in &buckets.shadow {
            for bucket in cascade {
                self.storage.push_bucket(bucket, arena, nodes, wind);
            }
        }
    }

    pub fn span(&self, cascade: usize, shader: ShaderType) -> DrawSpan {
        debug_assert!(cascade < CASCADE_COUNT);
        self.storage
            .spans
            .get(cascade * ShaderType::COUNT + shader.index())
            .copied()
            .unwrap_or_default()
    }

    pub fn commands(&self) -> &[DrawIndexedIndirectArgs] {
        &self.storage.commands
    }

    pub fn upload(&mut self, device: &wgpu::Device, queue: &wgpu::Queue) {
        self.storage.upload(device, queue, "Shadow");
    }

    pub fn command_buffer(&self) -> Option<&wgpu::Buffer> {
        self.storage.command_buffer.as_ref()
    }

    pub fn instance_buffer(&self) -> Option<&wgpu::Buffer> {
        self.storage.instance_buffer.as_ref()
    }
}

/// Command buffer for the reflective shadow map pass.
#[derive(Debug, Default)]
pub struct RsmCommandBuffer {
    storage: CommandStorage,
}

impl RsmCommandBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fill(&mut self, buckets: &FrameBuckets, arena: &GpuMeshArena, nodes: &[SceneNode]) {
        self.storage.clear();
        for bucket in &buckets.rsm {
            self.storage.push_bucket(bucket, arena, nodes, 0.0);
        }
    }

    pub fn span(&self, shader: ShaderType) -> DrawSpan {
        self.storage.spans.get(shader.index()).copied().unwrap_or_default()
    }

    pub fn commands(&self) -> &[DrawIndexedIndirectArgs] {
        &self.storage.commands
    }

    pub fn upload(&mut self, device: &wgpu::Device, queue: &wgpu::Queue) {
        self.storage.upload(device, queue, "RSM");
    }

    pub fn command_buffer(&self) -> Option<&wgpu::Buffer> {
        self.storage.command_buffer.as_ref()
    }

    pub fn instance_buffer(&self) -> Option<&wgpu::Buffer> {
        self.storage.instance_buffer.as_ref()
    }
}

/// Command buffer for the glow pass; one span, shader type independent.
#[derive(Debug, Default)]
pub struct GlowCommandBuffer {
    storage: CommandStorage,
}

impl GlowCommandBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fill(&mut self, buckets: &FrameBuckets, arena: &GpuMeshArena, nodes: &[SceneNode]) {
        self.storage.clear();
        self.storage.push_bucket(&buckets.glow, arena, nodes, 0.0);
    }

    pub fn span(&self) -> DrawSpan {
        self.storage.spans.first().copied().unwrap_or_default()
    }

    pub fn commands(&self) -> &[DrawIndexedIndirectArgs] {
        &self.storage.commands
    }

    pub fn upload(&mut self, device: &wgpu::Device, queue: &wgpu::Queue) {
        self.storage.upload(device, queue, "Glow");
    }

    pub fn command_buffer(&self) -> Option<&wgpu::Buffer> {
        self.storage.command_buffer.as_ref()
    }

    pub fn instance_buffer(&self) -> Option<&wgpu::Buffer> {
        self.storage.instance_buffer.as_ref()
    }
}
