use glam::{Mat4, UVec2, Vec3, Vec4};

use crate::bounds::Aabb;
use crate::scene::{CastingSurfaces, ObjectId, ShadowScene, SurfaceId};

/// Per-frame results for one slice. Every field is overwritten by the next pipeline run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SliceFrame {
    pub bounds_world: Aabb,
    /// Inverse of the bounds-centered light frame the shadow-view bounds were measured in.
    pub shadow_view_to_world: Mat4,
    pub shadow_view: Mat4,
    pub shadow_proj: Mat4,
    pub bounds_shadow_view: Aabb,
    pub near_plane_center_world: Vec3,
    pub frustum_local_to_world: Mat4,
    pub slice_resolution: UVec2,
    pub disabled: bool,
    pub slice_offset: UVec2,
    pub world_to_atlas_uv: Mat4,
    /// `xy` min UV, `zw` UV extent.
    pub slice_uv_rect: Vec4,
}

impl Default for SliceFrame {
    fn default() -> Self {
        Self {
            bounds_world: Aabb::ZERO,
            shadow_view_to_world: Mat4::IDENTITY,
            shadow_view: Mat4::IDENTITY,
            shadow_proj: Mat4::IDENTITY,
            bounds_shadow_view: Aabb::ZERO,
            near_plane_center_world: Vec3::ZERO,
            frustum_local_to_world: Mat4::IDENTITY,
            slice_resolution: UVec2::ONE,
            disabled: true,
            slice_offset: UVec2::ZERO,
            world_to_atlas_uv: Mat4::IDENTITY,
            slice_uv_rect: Vec4::ZERO,
        }
    }
}

/// One slot of the engine's fixed pool.
#[derive(Debug, Clone, Default)]
pub struct SliceRecord {
    tracked: Option<ObjectId>,
    surfaces: CastingSurfaces,
    pub frame: SliceFrame,
}

impl SliceRecord {
    pub fn tracked_object(&self) -> Option<ObjectId> {
        self.tracked
    }

    pub fn casting_surfaces(&self) -> &[SurfaceId] {
        &self.surfaces
    }

    /// Tracked object is alive and active in its hierarchy.
    pub fn is_valid<S: ShadowScene + ?Sized>(&self, scene: &S) -> bool {
        self.tracked.map(|object| scene.is_active_in_hierarchy(object)).unwrap_or(false)
    }

    /// Has an object and survived this frame's validation and culling.
    pub fn should_render(&self) -> bool {
        self.tracked.is_some() && !self.frame.disabled
    }

    pub(crate) fn assign(&mut self, object: ObjectId, surfaces: CastingSurfaces) {
        self.tracked = Some(object);
        self.surfaces = surfaces;
        self.frame = SliceFrame::default();
    }

    pub(crate) fn invalidate(&mut self) {
        self.tracked = None;
        self.surfaces.clear();
        self.frame.disabled = true;
    }
}
