//! Axis-aligned bounding boxes for visibility testing.

/// Local-space axis-aligned box. World-space queries transform the eight
/// corners instead of the extents, which keeps the precise frustum test
/// exact under rotation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Aabb {
    pub min: cgmath::Vector3<f32>,
    pub max: cgmath::Vector3<f32>,
}

impl Aabb {
    pub fn new(min: cgmath::Vector3<f32>, max: cgmath::Vector3<f32>) -> Self {
        Self { min, max }
    }

    /// Smallest box containing all points. Collapses to a point box for a
    /// single input; empty input yields a degenerate box at the origin.
    pub fn from_points(points: &[[f32; 3]]) -> Self {
        let mut min = cgmath::Vector3::new(f32::MAX, f32::MAX, f32::MAX);
        let mut max = cgmath::Vector3::new(f32::MIN, f32::MIN, f32::MIN);
        for p in points {
            min.x = min.x.min(p[0]);
            min.y = min.y.min(p[1]);
            min.z = min.z.min(p[2]);
            max.x = max.x.max(p[0]);
            max.y = max.y.max(p[1]);
            max.z = max.z.max(p[2]);
        }
        if points.is_empty() {
            let zero = cgmath::Vector3::new(0.0, 0.0, 0.0);
            return Self::new(zero, zero);
        }
        Self { min, max }
    }

    pub fn union(&self, other: &Aabb) -> Aabb {
        Aabb {
            min: cgmath::Vector3::new(
                self.min.x.min(other.min.x),
                self.min.y.min(other.min.y),
                self.min.z.min(other.min.z),
            ),
            max: cgmath::Vector3::new(
                self.max.x.max(other.max.x),
                self.max.y.max(other.max.y),
                self.max.z.max(other.max.z),
            ),
        }
    }

    pub fn corners(&self) -> [cgmath::Vector3<f32>; 8] {
        let (min, max) = (self.min, self.max);
        [
            cgmath::Vector3::new(min.x, min.y, min.z),
            cgmath::Vector3::new(max.x, min.y, min.z),
            cgmath::Vector3::new(min.x, max.y, min.z),
            cgmath::Vector3::new(max.x, max.y, min.z),
            cgmath::Vector3::new(min.x, min.y, max.z),
            cgmath::Vector3::new(max.x, min.y, max.z),
            cgmath::Vector3::new(min.x, max.y, max.z),
            cgmath::Vector3::new(max.x, max.y, max.z),
        ]
    }

    /// The eight corners carried into world space.
    pub fn transformed_corners(&self, world: &cgmath::Matrix4<f32>) -> [cgmath::Vector3<f32>; 8] {
        self.corners()
            .map(|corner| (world * corner.extend(1.0)).truncate())
    }

    /// The twelve box edges in world space, as line endpoint pairs for debug
    /// visualization.
    pub fn transformed_edges(
        &self,
        world: &cgmath::Matrix4<f32>,
    ) -> [(cgmath::Vector3<f32>, cgmath::Vector3<f32>); 12] {
        let c = self.transformed_corners(world);
        // Corner indexing: bit 0 = x, bit 1 = y, bit 2 = z.
        [
            (c[0], c[1]),
            (c[2], c[3]),
            (c[4], c[5]),
            (c[6], c[7]),
            (c[0], c[2]),
            (c[1], c[3]),
            (c[4], c[6]),
            (c[5], c[7]),
            (c[0], c[4]),
            (c[1], c[5]),
            (c[2], c[6]),
            (c[3], c[7]),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgmath::{Deg, Matrix4, Vector3};

    #[test]
    fn from_points_covers_all_inputs() {
        let aabb = Aabb::from_points(&[[1.0, -2.0, 0.5], [-1.0, 3.0, 0.0], [0.0, 0.0, -4.0]]);
        assert_eq!(aabb.min, Vector3::new(-1.0, -2.0, -4.0));
        assert_eq!(aabb.max, Vector3::new(1.0, 3.0, 0.5));
    }

    #[test]
    fn union_encloses_both() {
        let a = Aabb::new(Vector3::new(0.0, 0.0, 0.0), Vector3::new(1.0, 1.0, 1.0));
        let b = Aabb::new(Vector3::new(-2.0, 0.5, 0.0), Vector3::new(0.0, 3.0, 0.5));
        let u = a.union(&b);
        assert_eq!(u.min, Vector3::new(-2.0, 0.0, 0.0));
        assert_eq!(u.max, Vector3::new(1.0, 3.0, 1.0));
    }

    #[test]
    fn rotation_moves_corners_off_axis() {
        let aabb = Aabb::new(Vector3::new(-1.0, -1.0, -1.0), Vector3::new(1.0, 1.0, 1.0));
        let corners = aabb.transformed_corners(&Matrix4::from_angle_y(Deg(45.0)));
        let max_x = corners.iter().map(|c| c.x).fold(f32::MIN, f32::max);
        assert!((max_x - 2.0f32.sqrt()).abs() < 1e-5);
    }
}
