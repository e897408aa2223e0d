use glam::{Mat4, Vec2, Vec3};


const DEFAULT_UP: Vec3 = Vec3::Y;

/// Simple look-at perspective camera. Projections use a `[0, 1]` depth range.
#[derive(Debug, Clone)]
pub struct Camera3D {
    pub position: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    pub fov_y_radians: f32,
    pub near: f32,
    pub far: f32,
}

impl Camera3D {
    pub fn new(position: Vec3, target: Vec3, fov_y_radians: f32, near: f32, far: f32) -> Self {
        Self { position, target, up: DEFAULT_UP, fov_y_radians, near, far }
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.target, self.up)
    }

    pub fn projection_matrix(&self, aspect: f32) -> Mat4 {
        Mat4::perspective_rh(self.fov_y_radians, aspect.max(0.0001), self.near.max(0.0001), self.far)
    }

    /// Snapshot of this camera for one pipeline run.
    pub fn viewer(&self, viewport_width: u32, viewport_height: u32) -> ViewerCamera {
        let aspect =
            if viewport_height > 0 { viewport_width as f32 / viewport_height as f32 } else { 1.0 };
        ViewerCamera::new(self.view_matrix(), self.projection_matrix(aspect))
    }
}

/// The viewer camera handed to the pipeline: world-to-view transform plus projection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewerCamera {
    pub view: Mat4,
    pub projection: Mat4,
    view_projection: Mat4,
}

impl ViewerCamera {
    pub fn new(view: Mat4, projection: Mat4) -> Self {
        Self { view, projection, view_projection: projection * view }
    }

    pub fn view_projection(&self) -> Mat4 {
        self.view_projection
    }

    /// Maps a world point to viewport space, `(0, 0)` bottom-left and `(1, 1)` top-right.
    ///
    /// Points behind the camera still produce a value (mirrored through the eye) so that an
    /// object right behind the viewer counts as covering the screen.
    pub fn world_to_viewport(&self, point: Vec3) -> Vec2 {
        let clip = self.view_projection * point.extend(1.0);
        let w = if clip.w.abs() < f32::EPSILON { f32::EPSILON.copysign(clip.w) } else { clip.w };
        let ndc = Vec2::new(clip.x / w, clip.y / w);
        ndc * 0.5 + Vec2::splat(0.5)
    }
}
