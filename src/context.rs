//! Central GPU context: device, queue, detected capabilities and the camera
//! bind group shared by all pipelines.
//!
//! Windowing and surface management stay with the embedding application;
//! the engine only needs a device, a queue and the capability flags that
//! select between the instanced and the fallback submission paths.

use wgpu::util::DeviceExt;

use crate::camera::{Camera, CameraUniform, Projection};

/// Capability flags consulted to select code paths. Queried once at startup,
/// never mutated mid-frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GpuCaps {
    /// One `multi_draw_indexed_indirect` per shader type instead of a loop
    /// of single indirect draws.
    pub multi_draw_indirect: bool,
    /// Base-instance aware indirect draws; enables the shared vertex pool
    /// with per-mesh base offsets instead of private buffers.
    pub base_instance: bool,
    /// Direct writes into a persistently mapped staging region instead of an
    /// explicit map/copy/unmap cycle per dynamic mesh.
    pub async_upload: bool,
}

impl GpuCaps {
    pub fn from_features(features: wgpu::Features) -> Self {
        Self {
            multi_draw_indirect: features.contains(wgpu::Features::MULTI_DRAW_INDIRECT),
            base_instance: features.contains(wgpu::Features::INDIRECT_FIRST_INSTANCE),
            async_upload: features.contains(wgpu::Features::MAPPABLE_PRIMARY_BUFFERS),
        }
    }

    /// Everything off; forces the per-object fallback paths.
    pub fn disabled() -> Self {
        Self {
            multi_draw_indirect: false,
            base_instance: false,
            async_upload: false,
        }
    }

    fn requested() -> wgpu::Features {
        wgpu::Features::MULTI_DRAW_INDIRECT
            | wgpu::Features::INDIRECT_FIRST_INSTANCE
            | wgpu::Features::MAPPABLE_PRIMARY_BUFFERS
    }
}

/// Camera GPU resources shared by every pass pipeline.
#[derive(Debug)]
pub struct CameraResources {
    pub camera: Camera,
    pub uniform: CameraUniform,
    pub buffer: wgpu::Buffer,
    pub bind_group: wgpu::BindGroup,
    pub bind_group_layout: wgpu::BindGroupLayout,
}

#[derive(Debug)]
pub struct Context {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub caps: GpuCaps,
    pub camera: CameraResources,
    pub projection: Projection,
}

impl Context {
    /// Set up a headless context on the primary backends, requesting the
    /// indirect-draw features the adapter actually offers.
    pub async fn new(width: u32, height: u32) -> anyhow::Result<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .map_err(|e| anyhow::anyhow!("no suitable GPU adapter: {e}"))?;

        let required_features = GpuCaps::requested() & adapter.features();
        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: None,
                required_features,
                required_limits: wgpu::Limits::default(),
                memory_hints: Default::default(),
                trace: wgpu::Trace::Off,
            })
            .await
            .map_err(|e| anyhow::anyhow!("device request failed: {e}"))?;

        Ok(Self::from_device(device, queue, width, height))
    }

    /// Wrap an existing device/queue pair, e.g. one owned by the embedding
    /// application. Capabilities are read off the device's features.
    pub fn from_device(device: wgpu::Device, queue: wgpu::Queue, width: u32, height: u32) -> Self {
        let caps = GpuCaps::from_features(device.features());

        let camera = Camera::new((0.0, 30.0, 20.0), cgmath::Deg(-90.0), cgmath::Deg(-60.0));
        let projection = Projection::new(width, height, cgmath::Deg(45.0), 0.1, 500.0);

        let mut uniform = CameraUniform::new();
        uniform.update_view_proj(&camera, &projection);

        let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Camera Buffer"),
            contents: bytemuck::cast_slice(&[uniform]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                entries: &[wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                }],
                label: Some("camera_bind_group_layout"),
            });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            }],
            label: Some("camera_bind_group"),
        });

        Self {
            device,
            queue,
            caps,
            camera: CameraResources {
                camera,
                uniform,
                buffer,
                bind_group,
                bind_group_layout,
            },
            projection,
        }
    }

    /// Push the current camera state to the GPU.
    pub fn write_camera_buffer(&mut self) {
        self.camera
            .uniform
            .update_view_proj(&self.camera.camera, &self.projection);
        self.queue.write_buffer(
            &self.camera.buffer,
            0,
            bytemuck::cast_slice(&[self.camera.uniform]),
        );
    }
}
