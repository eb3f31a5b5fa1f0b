//! Shared scene builders for the culling/classification/command tests.
#![allow(dead_code)]

use batch_ngin::{
    camera::{Camera, Frustum, Projection, camera_frustum},
    data_structures::{
        mesh::{MaterialDesc, MaterialRegistry, MeshBuffer, MeshId, MeshVertex, ShaderType},
        node::{NodeKind, SceneNode},
    },
};
use cgmath::Deg;

/// Capture engine diagnostics in test output.
pub fn init_test_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub const SOLID_TEXTURE: u32 = 1;
pub const VEGETATION_TEXTURE: u32 = 2;

fn vertex(position: [f32; 3]) -> MeshVertex {
    MeshVertex {
        position,
        tex_coords: [0.0, 0.0],
        normal: [0.0, 1.0, 0.0],
        tangent: [1.0, 0.0, 0.0],
        bitangent: [0.0, 0.0, 1.0],
    }
}

/// Unit cube centered at the origin: 8 vertices, 12 triangles.
pub fn cube_mesh(id: u64, texture: u32) -> MeshBuffer {
    let mut mesh = MeshBuffer::new(MeshId(id), format!("cube-{id}"));
    mesh.texture = texture;
    let h = 0.5;
    mesh.vertices = vec![
        vertex([-h, -h, -h]),
        vertex([h, -h, -h]),
        vertex([h, h, -h]),
        vertex([-h, h, -h]),
        vertex([-h, -h, h]),
        vertex([h, -h, h]),
        vertex([h, h, h]),
        vertex([-h, h, h]),
    ];
    mesh.indices = vec![
        0, 1, 2, 2, 3, 0, // back
        4, 6, 5, 6, 4, 7, // front
        0, 3, 7, 7, 4, 0, // left
        1, 5, 6, 6, 2, 1, // right
        3, 2, 6, 6, 7, 3, // top
        0, 4, 5, 5, 1, 0, // bottom
    ];
    mesh
}

/// Standard node with one solid cube, bounds refreshed from its vertices.
pub fn solid_node(name: &str, mesh_id: u64, position: (f32, f32, f32)) -> SceneNode {
    textured_node(name, mesh_id, SOLID_TEXTURE, position)
}

pub fn textured_node(
    name: &str,
    mesh_id: u64,
    texture: u32,
    position: (f32, f32, f32),
) -> SceneNode {
    let mut node = SceneNode::new(NodeKind::Standard, name);
    node.meshes.push(cube_mesh(mesh_id, texture));
    node.refresh_bounds();
    node.transform.position = cgmath::Vector3::new(position.0, position.1, position.2);
    node
}

/// Registry with the two test textures mapped to solid shader families.
pub fn test_registry() -> MaterialRegistry {
    let mut registry = MaterialRegistry::new();
    registry.register_texture(SOLID_TEXTURE, MaterialDesc::solid(ShaderType::Solid));
    registry.register_texture(
        VEGETATION_TEXTURE,
        MaterialDesc::solid(ShaderType::Vegetation),
    );
    registry
}

/// Frustum of a camera at the origin looking down negative z,
/// 45 degree vertical fov, depth range 0.1..100.
pub fn view_frustum() -> Frustum {
    let camera = Camera::new((0.0, 0.0, 0.0), Deg(-90.0), Deg(0.0));
    let projection = Projection::new(800, 600, Deg(45.0), 0.1, 100.0);
    camera_frustum(&camera, &projection)
}
