use glam::{Mat4, Vec3};

/// Axis-aligned bounding box stored as min/max corners.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub const ZERO: Self = Self { min: Vec3::ZERO, max: Vec3::ZERO };

    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min: min.min(max), max: min.max(max) }
    }

    pub fn from_center_size(center: Vec3, size: Vec3) -> Self {
        let half = size.abs() * 0.5;
        Self { min: center - half, max: center + half }
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    pub fn extents(&self) -> Vec3 {
        self.size() * 0.5
    }

    pub fn encapsulate_point(&mut self, point: Vec3) {
        self.min = self.min.min(point);
        self.max = self.max.max(point);
    }

    pub fn encapsulate(&mut self, other: &Aabb) {
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
    }

    /// Writes the 8 corners into `out`. The first two entries are `max` and `min`.
    pub fn write_corners(&self, out: &mut [Vec3; 8]) {
        let (min, max) = (self.min, self.max);
        out[0] = max;
        out[1] = min;
        out[2] = Vec3::new(min.x, max.y, min.z);
        out[3] = Vec3::new(min.x, max.y, max.z);
        out[4] = Vec3::new(max.x, max.y, min.z);
        out[5] = Vec3::new(min.x, min.y, max.z);
        out[6] = Vec3::new(max.x, min.y, max.z);
        out[7] = Vec3::new(max.x, min.y, min.z);
    }

    pub fn corners(&self) -> [Vec3; 8] {
        let mut corners = [Vec3::ZERO; 8];
        self.write_corners(&mut corners);
        corners
    }

    /// Bounds of this box after transforming its corners by `matrix`. `scratch` holds the corners
    /// between calls so the per-frame path does not allocate.
    pub fn transformed_with(&self, matrix: &Mat4, scratch: &mut [Vec3; 8]) -> Aabb {
        self.write_corners(scratch);
        encapsulate_transformed(scratch, matrix)
    }

    pub fn transformed(&self, matrix: &Mat4) -> Aabb {
        let mut scratch = [Vec3::ZERO; 8];
        self.transformed_with(matrix, &mut scratch)
    }

    pub fn is_finite(&self) -> bool {
        self.min.is_finite() && self.max.is_finite()
    }
}

/// Affine-transforms every corner and returns the box enclosing the results.
pub fn encapsulate_transformed(corners: &[Vec3; 8], matrix: &Mat4) -> Aabb {
    let first = matrix.transform_point3(corners[0]);
    let mut bounds = Aabb { min: first, max: first };
    for corner in &corners[1..] {
        bounds.encapsulate_point(matrix.transform_point3(*corner));
    }
    bounds
}

/// Encapsulates every box yielded by `boxes`; an empty iterator yields [`Aabb::ZERO`].
pub fn encapsulate_all<I>(boxes: I) -> Aabb
where
    I: IntoIterator<Item = Aabb>,
{
    let mut iter = boxes.into_iter();
    let Some(mut bounds) = iter.next() else {
        return Aabb::ZERO;
    };
    for next in iter {
        bounds.encapsulate(&next);
    }
    bounds
}
