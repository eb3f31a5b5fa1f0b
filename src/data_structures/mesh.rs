//! Mesh buffers, shader-type classification and material lookup.
//!
//! A [`MeshBuffer`] is a batch of vertices and indices with one material
//! association. Static meshes keep their vertex data immutable; dynamic
//! (skinned) meshes have their vertices recomputed by the animation system
//! every frame and re-uploaded by the mesh synchronizer.

use std::collections::HashMap;

/// Anything with a GPU vertex layout description.
pub trait Vertex {
    fn desc() -> wgpu::VertexBufferLayout<'static>;
}

/// Stable identity of a mesh buffer, used to key GPU-side handles.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MeshId(pub u64);

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct MeshVertex {
    pub position: [f32; 3],
    pub tex_coords: [f32; 2],
    pub normal: [f32; 3],
    pub tangent: [f32; 3],
    pub bitangent: [f32; 3],
}

impl Vertex for MeshVertex {
    fn desc() -> wgpu::VertexBufferLayout<'static> {
        use std::mem;
        wgpu::VertexBufferLayout {
            array_stride: mem::size_of::<MeshVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 3]>() as wgpu::BufferAddress,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x2,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 5]>() as wgpu::BufferAddress,
                    shader_location: 2,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 8]>() as wgpu::BufferAddress,
                    shader_location: 3,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 11]>() as wgpu::BufferAddress,
                    shader_location: 4,
                    format: wgpu::VertexFormat::Float32x3,
                },
            ],
        }
    }
}

/// Shader families the solid, shadow and RSM passes bucket by.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ShaderType {
    Solid,
    AlphaTest,
    Unlit,
    NormalMap,
    DetailMap,
    Vegetation,
    SphereMap,
    Splatting,
}

impl ShaderType {
    pub const COUNT: usize = 8;

    pub const ALL: [ShaderType; Self::COUNT] = [
        ShaderType::Solid,
        ShaderType::AlphaTest,
        ShaderType::Unlit,
        ShaderType::NormalMap,
        ShaderType::DetailMap,
        ShaderType::Vegetation,
        ShaderType::SphereMap,
        ShaderType::Splatting,
    ];

    pub fn index(self) -> usize {
        match self {
            ShaderType::Solid => 0,
            ShaderType::AlphaTest => 1,
            ShaderType::Unlit => 2,
            ShaderType::NormalMap => 3,
            ShaderType::DetailMap => 4,
            ShaderType::Vegetation => 5,
            ShaderType::SphereMap => 6,
            ShaderType::Splatting => 7,
        }
    }
}

/// How a transparent mesh blends in the immediate path.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TransparencyKind {
    Additive,
    Blend,
    /// Render-info driven translucency, independent of the base material.
    Translucent,
}

/// Per-mesh metadata controlling colorization and transparency independent
/// of the base material.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct RenderInfo {
    pub hue: f32,
    pub transparent: bool,
}

impl RenderInfo {
    pub fn new(hue: f32, transparent: bool) -> Self {
        Self { hue, transparent }
    }
}

/// Classification result the material registry hands out for a mesh buffer.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MaterialDesc {
    pub shader: ShaderType,
    /// `Some` for material-level transparency; render-info transparency is
    /// carried separately on the mesh.
    pub transparent: Option<TransparencyKind>,
    pub colorizable: bool,
}

impl MaterialDesc {
    pub fn solid(shader: ShaderType) -> Self {
        Self {
            shader,
            transparent: None,
            colorizable: false,
        }
    }

    pub fn transparent(kind: TransparencyKind) -> Self {
        Self {
            shader: ShaderType::Solid,
            transparent: Some(kind),
            colorizable: false,
        }
    }
}

/**
 * Read-only lookup from texture handle and mesh buffer to a material
 * descriptor. Queried during classification, never mutated mid-frame.
 *
 * Texture-specific overrides win over the per-material-type default, which
 * mirrors how game assets override the look of individual textures.
 */
#[derive(Debug, Default)]
pub struct MaterialRegistry {
    by_texture: HashMap<u32, MaterialDesc>,
    by_material: HashMap<u32, MaterialDesc>,
}

impl MaterialRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_texture(&mut self, texture: u32, desc: MaterialDesc) {
        self.by_texture.insert(texture, desc);
    }

    pub fn register_material(&mut self, material_id: u32, desc: MaterialDesc) {
        self.by_material.insert(material_id, desc);
    }

    /// `None` means the material type is unrecognized; the caller skips the
    /// mesh for the frame with a diagnostic instead of failing.
    pub fn material_for(&self, texture: u32, mesh: &MeshBuffer) -> Option<&MaterialDesc> {
        self.by_texture
            .get(&texture)
            .or_else(|| self.by_material.get(&mesh.material_id))
    }
}

/// A batch of vertices/indices with one material association.
#[derive(Clone, Debug)]
pub struct MeshBuffer {
    pub id: MeshId,
    pub name: String,
    pub vertices: Vec<MeshVertex>,
    pub indices: Vec<u32>,
    /// Texture handle consumed by the material registry.
    pub texture: u32,
    /// Driver-level material type, resolved through the registry.
    pub material_id: u32,
    /// Dynamic meshes get their vertex bytes re-uploaded every frame.
    pub dynamic: bool,
    /// Texture matrix; only the translation components vary per frame.
    pub texture_matrix: cgmath::Matrix4<f32>,
}

impl MeshBuffer {
    pub fn new(id: MeshId, name: impl Into<String>) -> Self {
        use cgmath::SquareMatrix;
        Self {
            id,
            name: name.into(),
            vertices: Vec::new(),
            indices: Vec::new(),
            texture: 0,
            material_id: 0,
            dynamic: false,
            texture_matrix: cgmath::Matrix4::identity(),
        }
    }

    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    pub fn stride() -> u32 {
        std::mem::size_of::<MeshVertex>() as u32
    }

    /// Translation components of the texture matrix, or zero when the
    /// matrix is identity.
    pub fn texture_translation(&self) -> [f32; 2] {
        use cgmath::SquareMatrix;
        if self.texture_matrix.is_identity() {
            [0.0, 0.0]
        } else {
            [self.texture_matrix.w.x, self.texture_matrix.w.y]
        }
    }
}
