//! Transform helpers for per-object shadow slices.
//!
//! Spaces used throughout the crate:
//!
//! - **World**: scene space.
//! - **Shadow view**: origin at the near-face center of an object's bounds, axes aligned with the
//!   light. Light travels along +Z, so depth grows away from the light.
//! - **Shadow clip**: orthographic clip space, x/y in `[-1, 1]`, depth in `[0, 1]`.
//! - **Atlas UV**: texture coordinates of the shared atlas, origin top-left.

use glam::{Mat4, Quat, UVec2, Vec3, Vec4};

use crate::bounds::Aabb;
use crate::camera3d::ViewerCamera;

/// Half-extent floor applied before building projections; flat or empty bounds would otherwise
/// produce a singular orthographic matrix.
pub const MIN_HALF_EXTENT: f32 = 1.0e-4;

/// Corners of the unit frustum proxy: x/y in `[-0.5, 0.5]`, z in `[0, 1]` with the near face at
/// `z = 0`.
pub const FRUSTUM_PROXY_CORNERS: [Vec3; 8] = [
    Vec3::new(-0.5, 0.5, 1.0),
    Vec3::new(-0.5, 0.5, 0.0),
    Vec3::new(-0.5, -0.5, 0.0),
    Vec3::new(-0.5, -0.5, 1.0),
    Vec3::new(0.5, 0.5, 1.0),
    Vec3::new(0.5, 0.5, 0.0),
    Vec3::new(0.5, -0.5, 0.0),
    Vec3::new(0.5, -0.5, 1.0),
];

/// Flat-shaded cuboid with four vertices per face, counter-clockwise when seen from outside.
#[derive(Debug, Clone, PartialEq)]
pub struct FrustumProxyMesh {
    pub positions: [[f32; 3]; 24],
    pub indices: [u32; 36],
}

impl FrustumProxyMesh {
    pub fn new() -> Self {
        const FACES: [[[f32; 3]; 4]; 6] = [
            // left
            [[-0.5, -0.5, 0.0], [-0.5, -0.5, 1.0], [-0.5, 0.5, 1.0], [-0.5, 0.5, 0.0]],
            // right
            [[0.5, -0.5, 1.0], [0.5, -0.5, 0.0], [0.5, 0.5, 0.0], [0.5, 0.5, 1.0]],
            // top
            [[-0.5, 0.5, 1.0], [0.5, 0.5, 1.0], [0.5, 0.5, 0.0], [-0.5, 0.5, 0.0]],
            // bottom
            [[-0.5, -0.5, 0.0], [0.5, -0.5, 0.0], [0.5, -0.5, 1.0], [-0.5, -0.5, 1.0]],
            // near
            [[0.5, -0.5, 0.0], [-0.5, -0.5, 0.0], [-0.5, 0.5, 0.0], [0.5, 0.5, 0.0]],
            // far
            [[-0.5, -0.5, 1.0], [0.5, -0.5, 1.0], [0.5, 0.5, 1.0], [-0.5, 0.5, 1.0]],
        ];
        let mut positions = [[0.0; 3]; 24];
        let mut indices = [0u32; 36];
        for (face_index, face) in FACES.iter().enumerate() {
            let base = (face_index * 4) as u32;
            positions[face_index * 4..face_index * 4 + 4].copy_from_slice(face);
            indices[face_index * 6..face_index * 6 + 6]
                .copy_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
        }
        Self { positions, indices }
    }
}

impl Default for FrustumProxyMesh {
    fn default() -> Self {
        Self::new()
    }
}

/// World to shadow-view transform for a frame centered at `center` and oriented like the light.
pub fn world_to_shadow_view(center: Vec3, light_rotation: Quat) -> Mat4 {
    Mat4::from_quat(light_rotation.inverse()) * Mat4::from_translation(-center)
}

/// Center of the face of `bounds` nearest to the light (minimum Z in shadow-view space).
pub fn near_face_center(bounds: &Aabb) -> Vec3 {
    bounds.center() - Vec3::Z * bounds.extents().z
}

/// Clamps every half extent to [`MIN_HALF_EXTENT`].
pub fn safe_half_extents(bounds: &Aabb) -> Vec3 {
    bounds.extents().max(Vec3::splat(MIN_HALF_EXTENT))
}

/// Orthographic projection for a slice.
///
/// `half_extents` sizes the frustum around the shadow-view origin. `padding` widens x/y so that
/// filtered lookups near the border stay inside the slice. Depth covers the object plus
/// `far_extend`, mapped to `[0, 1]`.
pub fn shadow_projection(half_extents: Vec3, padding: f32, far_extend: f32) -> Mat4 {
    let half = half_extents.max(Vec3::splat(MIN_HALF_EXTENT));
    let half_x = half.x + padding.max(0.0);
    let half_y = half.y + padding.max(0.0);
    let depth = half.z * 2.0 + far_extend.max(0.0);
    Mat4::orthographic_lh(-half_x, half_x, -half_y, half_y, 0.0, depth)
}

/// Model matrix placing the unit frustum proxy over a slice's frustum.
pub fn frustum_local_to_world(shadow_view: &Mat4, half_extents: Vec3, far_extend: f32) -> Mat4 {
    let half = half_extents.max(Vec3::splat(MIN_HALF_EXTENT));
    let scale = Vec3::new(half.x * 2.0, half.y * 2.0, half.z * 2.0 + far_extend.max(0.0));
    shadow_view.inverse() * Mat4::from_scale(scale)
}

/// Clip space to atlas UV: `u = 0.5 x + 0.5`, `v = 0.5 - 0.5 y`. Depth passes through.
pub fn ndc_to_uv() -> Mat4 {
    Mat4::from_cols(
        Vec4::new(0.5, 0.0, 0.0, 0.0),
        Vec4::new(0.0, -0.5, 0.0, 0.0),
        Vec4::new(0.0, 0.0, 1.0, 0.0),
        Vec4::new(0.5, 0.5, 0.0, 1.0),
    )
}

/// UV offset (`xy`) and extent (`zw`) of a slice rectangle inside the atlas.
pub fn slice_uv_rect(offset: UVec2, resolution: UVec2, atlas_resolution: UVec2) -> Vec4 {
    let atlas = atlas_resolution.max(UVec2::ONE).as_vec2();
    let offset = offset.as_vec2() / atlas;
    let extent = resolution.as_vec2() / atlas;
    Vec4::new(offset.x, offset.y, extent.x, extent.y)
}

/// World to atlas UV for one slice: slice placement × clip-to-UV × projection × view.
pub fn world_to_atlas_uv(shadow_view: &Mat4, shadow_proj: &Mat4, uv_rect: Vec4) -> Mat4 {
    let place = Mat4::from_translation(Vec3::new(uv_rect.x, uv_rect.y, 0.0))
        * Mat4::from_scale(Vec3::new(uv_rect.z, uv_rect.w, 1.0));
    place * ndc_to_uv() * *shadow_proj * *shadow_view
}

/// Fraction of the viewer's screen covered by the viewport rectangle of `bounds`' corners.
///
/// Visibility is ignored on purpose: an object behind the camera still casts shadows that can
/// cover the screen.
pub fn screen_coverage(bounds: &Aabb, camera: &ViewerCamera, scratch: &mut [Vec3; 8]) -> f32 {
    bounds.write_corners(scratch);
    let mut min = glam::Vec2::splat(f32::INFINITY);
    let mut max = glam::Vec2::splat(f32::NEG_INFINITY);
    for corner in scratch.iter() {
        let point = camera.world_to_viewport(*corner);
        min = min.min(point);
        max = max.max(point);
    }
    let min = min.clamp(glam::Vec2::ZERO, glam::Vec2::ONE);
    let max = max.clamp(glam::Vec2::ZERO, glam::Vec2::ONE);
    let size = (max - min).max(glam::Vec2::ZERO);
    let coverage = size.x * size.y;
    if coverage.is_finite() {
        coverage
    } else {
        0.0
    }
}

/// Quantized resolution tier for the longer slice axis.
///
/// The coverage is inverted, squared `remap_factor` times and re-inverted, which keeps small
/// objects at higher tiers. The result is split into `max / min` equal segments so that the
/// resolution changes in discrete steps instead of following the camera continuously.
pub fn quantized_resolution(coverage: f32, min_resolution: u32, max_resolution: u32, remap_factor: u32) -> u32 {
    if min_resolution >= max_resolution {
        return max_resolution;
    }
    let mut inverse = 1.0 - coverage.clamp(0.0, 1.0);
    for _ in 0..remap_factor {
        inverse *= inverse;
    }
    let remapped = 1.0 - inverse;
    let segment_count = max_resolution / min_resolution;
    let mut segment = (remapped * segment_count as f32) as u32;
    if segment >= segment_count {
        segment = segment_count - 1;
    }
    segment * min_resolution + min_resolution
}

/// Splits a longer-axis resolution into width/height using the x/y aspect of the slice bounds,
/// then applies `scale`. Each axis is at least one pixel.
pub fn aspect_resolution(longer: u32, half_extents: Vec3, scale: f32) -> UVec2 {
    let half = half_extents.max(Vec3::splat(MIN_HALF_EXTENT));
    let aspect = half.x / half.y;
    let longer_f = longer as f32;
    let (width, height) = if aspect >= 1.0 {
        (longer_f, (longer_f / aspect).floor())
    } else {
        ((longer_f * aspect).floor(), longer_f)
    };
    let scale = scale.clamp(0.0, 1.0);
    UVec2::new(((width * scale) as u32).max(1), ((height * scale) as u32).max(1))
}
