//! Frame orchestration: prepare, then per-pass submission.
//!
//! [`DrawCalls`] owns everything with frame lifetime or longer that the
//! command pipeline needs: the pass buckets, the GPU mesh arena, the shared
//! vertex pool, the per-pass command buffers and the end-of-frame fence.
//! [`DrawCalls::prepare_draw_calls`] runs the whole CPU side of a frame;
//! the `submit_*` methods then encode the actual draws into render passes
//! whose pipelines the caller has already bound.
//!
//! Three submission tiers, chosen by [`GpuCaps`]:
//! multidraw (one `multi_draw_indexed_indirect` per shader type), an
//! indirect loop (one `draw_indexed_indirect` per command), and a
//! per-object fallback using private mesh buffers.

use crate::{
    buckets::{CASCADE_COUNT, FrameBuckets, MeshRef},
    commands::{
        GlowCommandBuffer, INDIRECT_STRIDE, RsmCommandBuffer, ShadowCommandBuffer,
        SolidCommandBuffer,
    },
    context::{Context, GpuCaps},
    data_structures::{
        instance::InstanceData,
        mesh::{MaterialRegistry, ShaderType},
        node::SceneNode,
    },
    sync::{GpuMeshArena, MeshPass, VertexPool},
    visibility::{PassFrusta, classify_scene, sort_transparent},
};

/// Per-frame instance attribute array with its device buffer.
#[derive(Debug, Default)]
struct InstanceStrip {
    instances: Vec<InstanceData>,
    buffer: Option<wgpu::Buffer>,
    capacity: usize,
}

impl InstanceStrip {
    fn clear(&mut self) {
        self.instances.clear();
    }

    fn push(&mut self, instance: InstanceData) {
        self.instances.push(instance);
    }

    fn len(&self) -> u32 {
        self.instances.len() as u32
    }

    fn upload(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, label: &str) {
        if self.instances.is_empty() {
            return;
        }
        if self.buffer.is_none() || self.capacity < self.instances.len() {
            self.capacity = self.instances.len().next_power_of_two();
            self.buffer = Some(device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(label),
                size: (self.capacity * std::mem::size_of::<InstanceData>()) as u64,
                usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            }));
        }
        if let Some(buffer) = &self.buffer {
            queue.write_buffer(buffer, 0, bytemuck::cast_slice(&self.instances));
        }
    }

    fn buffer(&self) -> Option<&wgpu::Buffer> {
        self.buffer.as_ref()
    }
}

/// Bucket count of the per-object fallback: solid and RSM per shader type,
/// shadows per cascade and shader type, one glow bucket.
const FALLBACK_BUCKETS: usize = ShaderType::COUNT * (2 + CASCADE_COUNT) + 1;

fn fallback_solid(shader: ShaderType) -> usize {
    shader.index()
}

fn fallback_shadow(cascade: usize, shader: ShaderType) -> usize {
    ShaderType::COUNT + cascade * ShaderType::COUNT + shader.index()
}

fn fallback_rsm(shader: ShaderType) -> usize {
    ShaderType::COUNT * (1 + CASCADE_COUNT) + shader.index()
}

const FALLBACK_GLOW: usize = FALLBACK_BUCKETS - 1;

/// Instance data for the per-object fallback path, one strip shared by all
/// passes with recorded per-bucket start offsets. Fill and submission walk
/// the buckets in the same order and skip the same entries, so a running
/// counter at submission lands on the right instance.
#[derive(Debug)]
struct FallbackInstances {
    strip: InstanceStrip,
    starts: [u32; FALLBACK_BUCKETS],
}

impl FallbackInstances {
    fn new() -> Self {
        Self {
            strip: InstanceStrip::default(),
            starts: [0; FALLBACK_BUCKETS],
        }
    }

    fn fill(&mut self, buckets: &FrameBuckets, arena: &GpuMeshArena, nodes: &[SceneNode], wind: f32) {
        self.strip.clear();
        for shader in ShaderType::ALL {
            self.fill_bucket(fallback_solid(shader), buckets.solid_bucket(shader), arena, nodes, wind);
        }
        for cascade in 0..CASCADE_COUNT {
            for shader in ShaderType::ALL {
                self.fill_bucket(
                    fallback_shadow(cascade, shader),
                    buckets.shadow_bucket(cascade, shader),
                    arena,
                    nodes,
                    wind,
                );
            }
        }
        for shader in ShaderType::ALL {
            self.fill_bucket(fallback_rsm(shader), buckets.rsm_bucket(shader), arena, nodes, wind);
        }
        self.fill_bucket(FALLBACK_GLOW, &buckets.glow, arena, nodes, wind);
    }

    fn fill_bucket(
        &mut self,
        bucket_idx: usize,
        bucket: &[MeshRef],
        arena: &GpuMeshArena,
        nodes: &[SceneNode],
        wind: f32,
    ) {
        self.starts[bucket_idx] = self.strip.len();
        for r in bucket {
            let Some(entry) = arena.get(r.id) else {
                continue;
            };
            if entry.vertex_buffer.is_none() || entry.index_buffer.is_none() {
                continue;
            }
            let wind_weight = match entry.pass {
                MeshPass::Solid(ShaderType::Vegetation) => wind,
                _ => 0.0,
            };
            self.strip.push(InstanceData::pack(
                &nodes[r.node].transform,
                entry.texture_trans,
                entry.hue(),
                wind_weight,
            ));
        }
    }
}

#[derive(Debug)]
pub struct DrawCalls {
    buckets: FrameBuckets,
    arena: GpuMeshArena,
    pool: VertexPool,
    solid_cmds: SolidCommandBuffer,
    shadow_cmds: ShadowCommandBuffer,
    rsm_cmds: RsmCommandBuffer,
    glow_cmds: GlowCommandBuffer,
    fallback: FallbackInstances,
    transparent_instances: InstanceStrip,
    box_lines_buffer: Option<wgpu::Buffer>,
    box_lines_capacity: usize,
    box_lines_count: u32,
    upload_failures: u32,
    fence: Option<wgpu::SubmissionIndex>,
    wind: f32,
    debug_viz: bool,
}

impl DrawCalls {
    pub fn new(pool_vertices: u32, pool_indices: u32) -> Self {
        Self {
            buckets: FrameBuckets::new(),
            arena: GpuMeshArena::new(),
            pool: VertexPool::new(pool_vertices, pool_indices),
            solid_cmds: SolidCommandBuffer::new(),
            shadow_cmds: ShadowCommandBuffer::new(),
            rsm_cmds: RsmCommandBuffer::new(),
            glow_cmds: GlowCommandBuffer::new(),
            fallback: FallbackInstances::new(),
            transparent_instances: InstanceStrip::default(),
            box_lines_buffer: None,
            box_lines_capacity: 0,
            box_lines_count: 0,
            upload_failures: 0,
            fence: None,
            wind: 0.0,
            debug_viz: false,
        }
    }

    /// Record the submission the GPU must finish before the next frame's
    /// buffer rewrites may start.
    pub fn set_fence(&mut self, index: wgpu::SubmissionIndex) {
        self.fence = Some(index);
    }

    pub fn set_wind(&mut self, wind: f32) {
        self.wind = wind;
    }

    /// Derive the vegetation sway strength from elapsed time.
    pub fn update_wind(&mut self, time_secs: f32) {
        self.wind = 0.57 + 0.5 * time_secs.sin();
    }

    /// Collect bounding boxes of camera-culled nodes for line rendering.
    pub fn set_debug_viz(&mut self, enabled: bool) {
        self.debug_viz = enabled;
    }

    pub fn buckets(&self) -> &FrameBuckets {
        &self.buckets
    }

    pub fn arena(&self) -> &GpuMeshArena {
        &self.arena
    }

    pub fn pool(&self) -> &VertexPool {
        &self.pool
    }

    pub fn solid_poly_count(&self) -> u32 {
        self.buckets.solid_poly_count
    }

    pub fn shadow_poly_count(&self) -> u32 {
        self.buckets.shadow_poly_count
    }

    /// Dynamic-mesh uploads that failed during the last prepare.
    pub fn dynamic_upload_failures(&self) -> u32 {
        self.upload_failures
    }

    /// Instances staged for the transparent pass during the last prepare.
    pub fn transparent_instance_count(&self) -> u32 {
        self.transparent_instances.len()
    }

    /// Line-pair positions of culled bounding boxes, filled when debug
    /// visualization is on.
    pub fn bounding_boxes(&self) -> &[f32] {
        &self.buckets.bounding_boxes
    }

    /// Nodes routed past batching: drawn by the embedder after the batched
    /// passes.
    pub fn immediate_nodes(&self) -> &[usize] {
        &self.buckets.immediate_nodes
    }

    pub fn billboards(&self) -> &[usize] {
        &self.buckets.billboards
    }

    pub fn particles(&self) -> &[usize] {
        &self.buckets.particles
    }

    /// Drop all GPU state owned by a node's meshes. Idempotent.
    pub fn discard_node(&mut self, node: &SceneNode) {
        self.arena.release_node(node, &mut self.pool);
    }

    /// The whole CPU side of a frame: wait on the previous frame's fence,
    /// classify, ensure GPU residency, re-upload dynamic geometry and
    /// rebuild the per-pass command and instance buffers.
    pub fn prepare_draw_calls(
        &mut self,
        ctx: &Context,
        nodes: &mut [SceneNode],
        frusta: &PassFrusta,
        registry: &MaterialRegistry,
    ) {
        self.wait_fence(&ctx.device);
        self.buckets.clear();

        for node in nodes.iter() {
            if !node.visible {
                continue;
            }
            self.arena.init_node_materials(node, registry);
            if ctx.caps.base_instance {
                self.arena.assign_pool_offsets(&mut self.pool, node);
            } else {
                self.arena.create_private_buffers(&ctx.device, node);
            }
        }

        classify_scene(nodes, frusta, registry, &mut self.buckets, self.debug_viz);

        // The explicit dynamic-upload path schedules device copies into the
        // pool buffer, so it must exist before the deferred updates run.
        if ctx.caps.base_instance {
            self.pool.ensure_buffers(&ctx.device);
        }

        // Animated nodes recompute their skinned vertices between frames;
        // pick up the result and push it to the GPU before command fill.
        self.upload_failures = 0;
        let deferred = self.buckets.deferred_update.clone();
        for node_idx in deferred {
            let node = &mut nodes[node_idx];
            if !node.frame_ready {
                log::error!("animated node '{}' returned no mesh to render this frame", node.name);
                continue;
            }
            node.refresh_bounds();
            self.upload_failures += self
                .arena
                .upload_dynamic(&ctx.device, &ctx.queue, &ctx.caps, &mut self.pool, node);
        }

        for node in nodes.iter() {
            if node.visible {
                self.arena.refresh_texture_trans(node);
            }
        }

        if ctx.caps.base_instance {
            self.solid_cmds.fill(&self.buckets, &self.arena, nodes, self.wind);
            self.shadow_cmds.fill(&self.buckets, &self.arena, nodes, self.wind);
            self.rsm_cmds.fill(&self.buckets, &self.arena, nodes);
            self.glow_cmds.fill(&self.buckets, &self.arena, nodes);
            self.solid_cmds.upload(&ctx.device, &ctx.queue);
            self.shadow_cmds.upload(&ctx.device, &ctx.queue);
            self.rsm_cmds.upload(&ctx.device, &ctx.queue);
            self.glow_cmds.upload(&ctx.device, &ctx.queue);
            self.pool.flush(&ctx.queue);
        } else {
            self.fallback.fill(&self.buckets, &self.arena, nodes, self.wind);
            self.fallback
                .strip
                .upload(&ctx.device, &ctx.queue, "Fallback Instance Buffer");
        }

        // Back-to-front order decided here, once per frame, so submission
        // can walk the list straight through.
        sort_transparent(&mut self.buckets.transparent);
        self.transparent_instances.clear();
        for r in self.buckets.transparent.iter() {
            let Some(entry) = self.arena.get(r.id) else {
                continue;
            };
            if !entry.is_uploaded() {
                continue;
            }
            self.transparent_instances.push(InstanceData::pack(
                &nodes[r.node].transform,
                entry.texture_trans,
                entry.hue(),
                0.0,
            ));
        }
        self.transparent_instances
            .upload(&ctx.device, &ctx.queue, "Transparent Instance Buffer");

        self.upload_box_lines(&ctx.device, &ctx.queue);
    }

    fn upload_box_lines(&mut self, device: &wgpu::Device, queue: &wgpu::Queue) {
        let lines = &self.buckets.bounding_boxes;
        self.box_lines_count = (lines.len() / 3) as u32;
        if lines.is_empty() {
            return;
        }
        if self.box_lines_buffer.is_none() || self.box_lines_capacity < lines.len() {
            self.box_lines_capacity = lines.len().next_power_of_two();
            self.box_lines_buffer = Some(device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("Bounding Box Line Buffer"),
                size: (self.box_lines_capacity * std::mem::size_of::<f32>()) as u64,
                usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            }));
        }
        if let Some(buffer) = &self.box_lines_buffer {
            queue.write_buffer(buffer, 0, bytemuck::cast_slice(lines));
        }
    }

    fn wait_fence(&mut self, device: &wgpu::Device) {
        if let Some(index) = self.fence.take() {
            if let Err(e) = device.poll(wgpu::PollType::Wait {
                submission_index: Some(index),
                timeout: None,
            }) {
                log::warn!("fence wait failed: {e}");
            }
        }
    }

    /// Solid pass submission for one shader type. The matching pipeline must
    /// already be bound on `pass`.
    pub fn submit_solid(&self, pass: &mut wgpu::RenderPass<'_>, shader: ShaderType, caps: &GpuCaps) {
        if caps.base_instance {
            self.submit_span_indirect(
                pass,
                self.solid_cmds.span(shader),
                self.solid_cmds.command_buffer(),
                self.solid_cmds.instance_buffer(),
                caps,
            );
        } else {
            self.submit_bucket_fallback(
                pass,
                self.buckets.solid_bucket(shader),
                fallback_solid(shader),
            );
        }
    }

    /// Deferred solid first pass (geometry attributes). Identical command
    /// spans to [`DrawCalls::submit_solid`]; only the bound pipeline differs.
    pub fn submit_solid_first_pass(
        &self,
        pass: &mut wgpu::RenderPass<'_>,
        shader: ShaderType,
        caps: &GpuCaps,
    ) {
        self.submit_solid(pass, shader, caps);
    }

    /// Deferred solid second pass (lighting combination), re-walking the
    /// first pass spans.
    pub fn submit_solid_second_pass(
        &self,
        pass: &mut wgpu::RenderPass<'_>,
        shader: ShaderType,
        caps: &GpuCaps,
    ) {
        self.submit_solid(pass, shader, caps);
    }

    /// Normals visualization: every solid span, shader type irrelevant.
    pub fn submit_normals(&self, pass: &mut wgpu::RenderPass<'_>, caps: &GpuCaps) {
        for shader in ShaderType::ALL {
            self.submit_solid(pass, shader, caps);
        }
    }

    /// Shadow pass submission for one cascade and shader type.
    pub fn submit_shadow(
        &self,
        pass: &mut wgpu::RenderPass<'_>,
        cascade: usize,
        shader: ShaderType,
        caps: &GpuCaps,
    ) {
        if caps.base_instance {
            self.submit_span_indirect(
                pass,
                self.shadow_cmds.span(cascade, shader),
                self.shadow_cmds.command_buffer(),
                self.shadow_cmds.instance_buffer(),
                caps,
            );
        } else {
            self.submit_bucket_fallback(
                pass,
                self.buckets.shadow_bucket(cascade, shader),
                fallback_shadow(cascade, shader),
            );
        }
    }

    /// Reflective shadow map submission for one shader type.
    pub fn submit_rsm(&self, pass: &mut wgpu::RenderPass<'_>, shader: ShaderType, caps: &GpuCaps) {
        if caps.base_instance {
            self.submit_span_indirect(
                pass,
                self.rsm_cmds.span(shader),
                self.rsm_cmds.command_buffer(),
                self.rsm_cmds.instance_buffer(),
                caps,
            );
        } else {
            self.submit_bucket_fallback(pass, self.buckets.rsm_bucket(shader), fallback_rsm(shader));
        }
    }

    /// Glow pass submission.
    pub fn submit_glow(&self, pass: &mut wgpu::RenderPass<'_>, caps: &GpuCaps) {
        if caps.base_instance {
            self.submit_span_indirect(
                pass,
                self.glow_cmds.span(),
                self.glow_cmds.command_buffer(),
                self.glow_cmds.instance_buffer(),
                caps,
            );
        } else {
            self.submit_bucket_fallback(pass, &self.buckets.glow, FALLBACK_GLOW);
        }
    }

    /// Transparent submission: per-mesh draws in the back-to-front order
    /// fixed by [`DrawCalls::prepare_draw_calls`]. The caller binds the
    /// blend pipeline for each [`crate::data_structures::mesh::TransparencyKind`]
    /// it submits; use [`FrameBuckets::transparent`] to partition.
    pub fn submit_transparent(&self, pass: &mut wgpu::RenderPass<'_>) {
        let Some(instance_buffer) = self.transparent_instances.buffer() else {
            return;
        };
        pass.set_vertex_buffer(1, instance_buffer.slice(..));

        let mut instance = 0u32;
        for r in self.buckets.transparent.iter() {
            let Some(entry) = self.arena.get(r.id) else {
                continue;
            };
            if !entry.is_uploaded() {
                continue;
            }
            // Every entry past this point owns one slot in the instance
            // strip; the skip conditions above match the prepare-side fill
            // exactly, so the counter advances even when a draw is dropped.
            if let (Some(base_vertex), Some(base_index)) = (entry.base_vertex, entry.base_index) {
                if let (Some(vb), Some(ib)) = (self.pool.vertex_buffer(), self.pool.index_buffer())
                {
                    pass.set_vertex_buffer(0, vb.slice(..));
                    pass.set_index_buffer(ib.slice(..), wgpu::IndexFormat::Uint32);
                    pass.draw_indexed(
                        base_index..base_index + entry.element_count,
                        base_vertex as i32,
                        instance..instance + 1,
                    );
                }
            } else if let (Some(vb), Some(ib)) = (&entry.vertex_buffer, &entry.index_buffer) {
                pass.set_vertex_buffer(0, vb.slice(..));
                pass.set_index_buffer(ib.slice(..), wgpu::IndexFormat::Uint32);
                pass.draw_indexed(0..entry.element_count, 0, instance..instance + 1);
            }
            instance += 1;
        }
    }

    /// Draw the culled bounding boxes collected while debug visualization is
    /// on. The caller binds [`crate::pipelines::lines::mk_lines_pipeline`].
    pub fn render_bounding_boxes(&self, pass: &mut wgpu::RenderPass<'_>) {
        if self.box_lines_count == 0 {
            return;
        }
        let Some(buffer) = &self.box_lines_buffer else {
            return;
        };
        pass.set_vertex_buffer(0, buffer.slice(..));
        pass.draw(0..self.box_lines_count, 0..1);
    }

    /// Walk the immediate list in classification order, handing each node
    /// index to the caller's draw routine. These nodes own their own draw
    /// logic and never enter the batched buffers.
    pub fn render_immediate_list(&self, mut draw: impl FnMut(usize)) {
        for &idx in &self.buckets.immediate_nodes {
            draw(idx);
        }
    }

    /// Walk the visible billboards in classification order.
    pub fn render_billboard_list(&self, mut draw: impl FnMut(usize)) {
        for &idx in &self.buckets.billboards {
            draw(idx);
        }
    }

    /// Walk the visible particle systems in classification order.
    pub fn render_particles_list(&self, mut draw: impl FnMut(usize)) {
        for &idx in &self.buckets.particles {
            draw(idx);
        }
    }

    fn submit_span_indirect(
        &self,
        pass: &mut wgpu::RenderPass<'_>,
        span: crate::commands::DrawSpan,
        commands: Option<&wgpu::Buffer>,
        instances: Option<&wgpu::Buffer>,
        caps: &GpuCaps,
    ) {
        if span.count == 0 {
            return;
        }
        let (Some(commands), Some(instances)) = (commands, instances) else {
            return;
        };
        let (Some(vb), Some(ib)) = (self.pool.vertex_buffer(), self.pool.index_buffer()) else {
            return;
        };
        pass.set_vertex_buffer(0, vb.slice(..));
        pass.set_vertex_buffer(1, instances.slice(..));
        pass.set_index_buffer(ib.slice(..), wgpu::IndexFormat::Uint32);
        if caps.multi_draw_indirect {
            pass.multi_draw_indexed_indirect(commands, span.first as u64 * INDIRECT_STRIDE, span.count);
        } else {
            for i in span.first..span.first + span.count {
                pass.draw_indexed_indirect(commands, i as u64 * INDIRECT_STRIDE);
            }
        }
    }

    fn submit_bucket_fallback(
        &self,
        pass: &mut wgpu::RenderPass<'_>,
        bucket: &[MeshRef],
        bucket_idx: usize,
    ) {
        let Some(instance_buffer) = self.fallback.strip.buffer() else {
            return;
        };
        pass.set_vertex_buffer(1, instance_buffer.slice(..));

        // Same walk and skip conditions as the fill, so the counter stays
        // aligned with the instance strip.
        let mut instance = self.fallback.starts[bucket_idx];
        for r in bucket {
            let Some(entry) = self.arena.get(r.id) else {
                continue;
            };
            let (Some(vb), Some(ib)) = (&entry.vertex_buffer, &entry.index_buffer) else {
                continue;
            };
            pass.set_vertex_buffer(0, vb.slice(..));
            pass.set_index_buffer(ib.slice(..), wgpu::IndexFormat::Uint32);
            pass.draw_indexed(0..entry.element_count, 0, instance..instance + 1);
            instance += 1;
        }
    }
}
