mod common;

use batch_ngin::data_structures::bounds::Aabb;
use cgmath::{Deg, Matrix4, Vector3};

use crate::common::test_utils::view_frustum;

fn unit_box_at(x: f32, y: f32, z: f32) -> [Vector3<f32>; 8] {
    let aabb = Aabb::new(Vector3::new(-0.5, -0.5, -0.5), Vector3::new(0.5, 0.5, 0.5));
    aabb.transformed_corners(&Matrix4::from_translation(Vector3::new(x, y, z)))
}

#[test]
fn box_in_front_of_camera_survives() {
    let frustum = view_frustum();
    assert!(!frustum.culls_box(&unit_box_at(0.0, 0.0, -10.0)));
}

#[test]
fn box_behind_camera_is_culled() {
    let frustum = view_frustum();
    assert!(frustum.culls_box(&unit_box_at(0.0, 0.0, 10.0)));
}

#[test]
fn box_far_off_axis_is_culled() {
    let frustum = view_frustum();
    // At z = -10 the half-width of a 45 degree frustum is ~5.5 units.
    assert!(frustum.culls_box(&unit_box_at(50.0, 0.0, -10.0)));
    assert!(frustum.culls_box(&unit_box_at(0.0, 50.0, -10.0)));
}

#[test]
fn box_beyond_far_plane_is_culled() {
    let frustum = view_frustum();
    assert!(frustum.culls_box(&unit_box_at(0.0, 0.0, -200.0)));
}

#[test]
fn box_straddling_near_plane_survives() {
    let frustum = view_frustum();
    let aabb = Aabb::new(Vector3::new(-1.0, -1.0, -5.0), Vector3::new(1.0, 1.0, 5.0));
    let corners = aabb.corners();
    assert!(!frustum.culls_box(&corners));
}

#[test]
fn box_enclosing_whole_frustum_survives() {
    // Every plane has corners on its positive side, so the precise test must
    // keep it even though the box center is at the camera.
    let frustum = view_frustum();
    let aabb = Aabb::new(
        Vector3::new(-1000.0, -1000.0, -1000.0),
        Vector3::new(1000.0, 1000.0, 1000.0),
    );
    assert!(!frustum.culls_box(&aabb.corners()));
}

#[test]
fn rotated_box_is_tested_on_world_corners() {
    let frustum = view_frustum();
    let aabb = Aabb::new(Vector3::new(-2.0, -0.1, -0.1), Vector3::new(2.0, 0.1, 0.1));
    // Elongated box rotated 45 degrees around y; the swung corners reach
    // into the frustum.
    let world = Matrix4::from_translation(Vector3::new(-5.0, 0.0, -10.0))
        * Matrix4::from_angle_y(Deg(45.0));
    let corners = aabb.transformed_corners(&world);
    assert!(!frustum.culls_box(&corners));

    // Same box without the rotation stays fully outside.
    let world = Matrix4::from_translation(Vector3::new(-8.0, 0.0, -10.0));
    let corners = aabb.transformed_corners(&world);
    assert!(frustum.culls_box(&corners));
}
