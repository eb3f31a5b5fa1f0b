//! Camera, projection and view frusta.
//!
//! Besides the usual view/projection plumbing this module owns the frustum
//! representation used by the visibility engine: six planes with
//! inward-pointing normals, extracted from a view-projection matrix, plus the
//! precise eight-corner box test. Shadow cascades and the reflective shadow
//! map reuse the same [`Frustum`] type built from their light matrices.

use cgmath::{InnerSpace, Matrix, Rad, perspective};

#[rustfmt::skip]
pub const OPENGL_TO_WGPU_MATRIX: cgmath::Matrix4<f32> = cgmath::Matrix4::new(
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 0.5, 0.0,
    0.0, 0.0, 0.5, 1.0,
);

#[derive(Clone, Debug)]
pub struct Camera {
    pub position: cgmath::Point3<f32>,
    pub yaw: Rad<f32>,
    pub pitch: Rad<f32>,
}

impl Camera {
    pub fn new<V: Into<cgmath::Point3<f32>>, Y: Into<Rad<f32>>, P: Into<Rad<f32>>>(
        position: V,
        yaw: Y,
        pitch: P,
    ) -> Self {
        Self {
            position: position.into(),
            yaw: yaw.into(),
            pitch: pitch.into(),
        }
    }

    pub fn calc_matrix(&self) -> cgmath::Matrix4<f32> {
        let (sin_pitch, cos_pitch) = self.pitch.0.sin_cos();
        let (sin_yaw, cos_yaw) = self.yaw.0.sin_cos();

        cgmath::Matrix4::look_to_rh(
            self.position,
            cgmath::Vector3::new(cos_pitch * cos_yaw, sin_pitch, cos_pitch * sin_yaw).normalize(),
            cgmath::Vector3::unit_y(),
        )
    }
}

#[derive(Clone, Debug)]
pub struct Projection {
    pub aspect: f32,
    pub fovy: Rad<f32>,
    pub znear: f32,
    pub zfar: f32,
}

impl Projection {
    pub fn new<F: Into<Rad<f32>>>(width: u32, height: u32, fovy: F, znear: f32, zfar: f32) -> Self {
        Self {
            aspect: width as f32 / height as f32,
            fovy: fovy.into(),
            znear,
            zfar,
        }
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.aspect = width as f32 / height as f32;
    }

    pub fn calc_matrix(&self) -> cgmath::Matrix4<f32> {
        OPENGL_TO_WGPU_MATRIX * perspective(self.fovy, self.aspect, self.znear, self.zfar)
    }
}

/// Uniform buffer contents for the camera bind group.
#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CameraUniform {
    view_position: [f32; 4],
    view_proj: [[f32; 4]; 4],
}

impl CameraUniform {
    pub fn new() -> Self {
        use cgmath::SquareMatrix;
        Self {
            view_position: [0.0; 4],
            view_proj: cgmath::Matrix4::identity().into(),
        }
    }

    pub fn update_view_proj(&mut self, camera: &Camera, projection: &Projection) {
        self.view_position = camera.position.to_homogeneous().into();
        self.view_proj = (projection.calc_matrix() * camera.calc_matrix()).into();
    }
}

impl Default for CameraUniform {
    fn default() -> Self {
        Self::new()
    }
}

/// A plane in constant-normal form. Points with a positive distance lie on
/// the inner half-space.
#[derive(Clone, Copy, Debug)]
pub struct Plane {
    pub normal: cgmath::Vector3<f32>,
    pub d: f32,
}

impl Plane {
    pub fn new(normal: cgmath::Vector3<f32>, d: f32) -> Self {
        Self { normal, d }
    }

    pub fn distance(&self, point: cgmath::Vector3<f32>) -> f32 {
        self.normal.dot(point) + self.d
    }

    fn normalized(self) -> Self {
        let len = self.normal.magnitude();
        if len > 0.0 {
            Self {
                normal: self.normal / len,
                d: self.d / len,
            }
        } else {
            self
        }
    }
}

/// Six frustum planes with normals pointing inside the volume.
#[derive(Clone, Debug)]
pub struct Frustum {
    pub planes: [Plane; 6],
}

impl Frustum {
    /// Extract planes from a wgpu-style view-projection matrix (clip z in
    /// `0..1`). Left/right/bottom/top come from the w row combined with the
    /// x/y rows, near from the z row alone, far from w minus z.
    pub fn from_view_proj(view_proj: &cgmath::Matrix4<f32>) -> Self {
        let r0 = view_proj.row(0);
        let r1 = view_proj.row(1);
        let r2 = view_proj.row(2);
        let r3 = view_proj.row(3);

        let plane = |v: cgmath::Vector4<f32>| Plane::new(v.truncate(), v.w).normalized();

        Self {
            planes: [
                plane(r3 + r0),
                plane(r3 - r0),
                plane(r3 + r1),
                plane(r3 - r1),
                plane(r2),
                plane(r3 - r2),
            ],
        }
    }

    pub fn from_planes(planes: [Plane; 6]) -> Self {
        Self { planes }
    }

    /// Precise cull test: a box is culled only if for *some* plane all eight
    /// corners lie strictly on the outer half-space. Exact for axis-aligned
    /// and rotated boxes, never reports a visible box as culled.
    pub fn culls_box(&self, corners: &[cgmath::Vector3<f32>; 8]) -> bool {
        self.planes
            .iter()
            .any(|plane| corners.iter().all(|&corner| plane.distance(corner) < 0.0))
    }
}

/// Frustum of a view-projection combined from camera and projection, the
/// common case for the solid passes.
pub fn camera_frustum(camera: &Camera, projection: &Projection) -> Frustum {
    Frustum::from_view_proj(&(projection.calc_matrix() * camera.calc_matrix()))
}
