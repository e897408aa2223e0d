use glam::{Mat4, Vec3, Vec4};

use crate::bounds::Aabb;

/// Plane stored as `normal · p + distance = 0` with the normal pointing into the kept half-space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane {
    pub normal: Vec3,
    pub distance: f32,
}

impl Plane {
    pub fn from_coefficients(coefficients: Vec4) -> Self {
        let normal = coefficients.truncate();
        let length = normal.length();
        if length <= f32::EPSILON {
            return Self { normal: Vec3::Y, distance: 0.0 };
        }
        Self { normal: normal / length, distance: coefficients.w / length }
    }

    pub fn signed_distance(&self, point: Vec3) -> f32 {
        self.normal.dot(point) + self.distance
    }
}

impl Default for Plane {
    fn default() -> Self {
        Self { normal: Vec3::Y, distance: 0.0 }
    }
}

/// Six inward-facing planes: left, right, bottom, top, near, far.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FrustumPlanes {
    pub planes: [Plane; 6],
}

impl FrustumPlanes {
    pub const LEFT: usize = 0;
    pub const RIGHT: usize = 1;
    pub const BOTTOM: usize = 2;
    pub const TOP: usize = 3;
    pub const NEAR: usize = 4;
    pub const FAR: usize = 5;

    /// Gribb/Hartmann extraction for a clip space with depth in `[0, 1]`.
    pub fn from_view_projection(view_proj: &Mat4) -> Self {
        let mut planes = Self::default();
        planes.update(view_proj);
        planes
    }

    /// Re-extracts the planes in place.
    pub fn update(&mut self, view_proj: &Mat4) {
        let row0 = view_proj.row(0);
        let row1 = view_proj.row(1);
        let row2 = view_proj.row(2);
        let row3 = view_proj.row(3);
        self.planes[Self::LEFT] = Plane::from_coefficients(row3 + row0);
        self.planes[Self::RIGHT] = Plane::from_coefficients(row3 - row0);
        self.planes[Self::BOTTOM] = Plane::from_coefficients(row3 + row1);
        self.planes[Self::TOP] = Plane::from_coefficients(row3 - row1);
        self.planes[Self::NEAR] = Plane::from_coefficients(row2);
        self.planes[Self::FAR] = Plane::from_coefficients(row3 - row2);
    }

    /// Conservative test: false only when the box lies entirely behind at least one plane.
    ///
    /// Pure function of its inputs, safe to call from any thread.
    pub fn intersects_aabb(&self, aabb: &Aabb) -> bool {
        self.planes.iter().all(|plane| {
            let positive = Vec3::new(
                if plane.normal.x >= 0.0 { aabb.max.x } else { aabb.min.x },
                if plane.normal.y >= 0.0 { aabb.max.y } else { aabb.min.y },
                if plane.normal.z >= 0.0 { aabb.max.z } else { aabb.min.z },
            );
            plane.signed_distance(positive) >= 0.0
        })
    }
}
