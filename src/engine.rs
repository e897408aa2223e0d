use glam::{Mat4, Quat, UVec2, Vec2, Vec3, Vec4};
use std::fmt;

use crate::bounds::{encapsulate_all, encapsulate_transformed};
use crate::camera3d::ViewerCamera;
use crate::config::{LightSource, ObjectDiscovery, ShadowSettings};
use crate::error::ShadowError;
use crate::frustum::FrustumPlanes;
use crate::renderable::ShadowCaster;
use crate::scene::{ObjectId, ShadowScene};
use crate::shadow_math::{
    aspect_resolution, frustum_local_to_world, near_face_center, quantized_resolution, safe_half_extents, screen_coverage,
    shadow_projection, slice_uv_rect, world_to_atlas_uv, world_to_shadow_view, FRUSTUM_PROXY_CORNERS,
};
use crate::slice::{SliceFrame, SliceRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterOutcome {
    Registered(usize),
    AlreadyRegistered(usize),
    /// Every slot holds a valid object; the request was dropped.
    PoolFull,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SliceStats {
    pub slot: usize,
    pub object: ObjectId,
    pub name: Option<String>,
    pub resolution: UVec2,
    pub offset: UVec2,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ShadowStats {
    pub atlas_resolution: UVec2,
    pub capacity: usize,
    pub registered: usize,
    pub active: usize,
    pub slices: Vec<SliceStats>,
}

impl fmt::Display for ShadowStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "-- Per Object Shadow --")?;
        writeln!(f, "AtlasRes: {}x{}", self.atlas_resolution.x, self.atlas_resolution.y)?;
        writeln!(f, "Slots: {}/{} registered", self.registered, self.capacity)?;
        writeln!(f, "ObjectCount: {}", self.active)?;
        for slice in &self.slices {
            let name = slice.name.as_deref().unwrap_or("<unnamed>");
            writeln!(
                f,
                " - [{}] {name}, res: {}x{}, offset: {}x{}",
                slice.slot, slice.resolution.x, slice.resolution.y, slice.offset.x, slice.offset.y
            )?;
        }
        Ok(())
    }
}

/// Owns the slice pool and runs the per-frame slice pipeline.
///
/// The engine keeps scratch buffers between runs, so a single instance must not be driven from
/// two places at once; `run_pipeline` taking `&mut self` enforces that.
pub struct ShadowEngine {
    settings: ShadowSettings,
    slices: Vec<SliceRecord>,
    atlas_resolution: UVec2,
    corner_scratch: [Vec3; 8],
    frustum_planes: FrustumPlanes,
    world_to_atlas_uv: Vec<Mat4>,
    frustum_models: Vec<Mat4>,
    uv_rects: Vec<Vec4>,
}

impl ShadowEngine {
    pub fn new(settings: ShadowSettings) -> Self {
        let capacity = settings.max_objects_clamped();
        if capacity != settings.max_objects {
            log::warn!("Shadow max_objects {} clamped to {capacity}", settings.max_objects);
        }
        let slices = vec![SliceRecord::default(); capacity];
        Self {
            settings,
            slices,
            atlas_resolution: UVec2::ZERO,
            corner_scratch: [Vec3::ZERO; 8],
            frustum_planes: FrustumPlanes::default(),
            world_to_atlas_uv: Vec::new(),
            frustum_models: Vec::new(),
            uv_rects: Vec::new(),
        }
    }

    pub fn settings(&self) -> &ShadowSettings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut ShadowSettings {
        &mut self.settings
    }

    pub fn capacity(&self) -> usize {
        self.slices.len()
    }

    pub fn slices(&self) -> &[SliceRecord] {
        &self.slices
    }

    pub fn slice(&self, slot: usize) -> Option<&SliceRecord> {
        self.slices.get(slot)
    }

    pub fn registered_count(&self) -> usize {
        self.slices.iter().filter(|slice| slice.tracked_object().is_some()).count()
    }

    pub fn slot_of(&self, object: ObjectId) -> Option<usize> {
        self.slices.iter().position(|slice| slice.tracked_object() == Some(object))
    }

    /// Slices that produced atlas content in the last run, in slot order.
    pub fn active_slices(&self) -> impl Iterator<Item = (usize, &SliceRecord)> + '_ {
        self.slices.iter().enumerate().filter(|(_, slice)| slice.should_render())
    }

    pub fn active_slice_count(&self) -> usize {
        self.active_slices().count()
    }

    /// Empties every slot.
    pub fn clear(&mut self) {
        for slice in &mut self.slices {
            slice.invalidate();
        }
        self.clear_aggregates();
    }

    /// Tracks `object` in the first free slot. Objects already tracked are left alone and a full
    /// pool drops the request.
    pub fn register<S: ShadowScene + ?Sized>(
        &mut self,
        scene: &S,
        object: ObjectId,
    ) -> Result<RegisterOutcome, ShadowError> {
        if !scene.contains(object) {
            return Err(ShadowError::InvalidObject(object));
        }
        if let Some(slot) = self.slot_of(object) {
            return Ok(RegisterOutcome::AlreadyRegistered(slot));
        }
        let Some(slot) = self.slices.iter().position(|slice| !slice.is_valid(scene)) else {
            log::debug!("Shadow slice pool full ({} slots), ignoring object {object:?}", self.slices.len());
            return Ok(RegisterOutcome::PoolFull);
        };
        self.slices[slot].assign(object, scene.casting_surfaces(object));
        Ok(RegisterOutcome::Registered(slot))
    }

    /// Registers every object carrying `tag`. Lookup failures are ignored. Returns the number of
    /// newly tracked objects.
    pub fn register_by_tag<S: ShadowScene + ?Sized>(&mut self, scene: &S, tag: &str) -> usize {
        let objects = match scene.find_objects_with_tag(tag) {
            Ok(objects) => objects,
            Err(err) => {
                log::debug!("Shadow tag discovery for '{tag}' failed: {err:#}");
                return 0;
            }
        };
        objects
            .into_iter()
            .filter(|object| matches!(self.register(scene, *object), Ok(RegisterOutcome::Registered(_))))
            .count()
    }

    /// Runs the configured discovery policy. Returns the number of newly tracked objects.
    pub fn register_objects<S: ShadowScene + ?Sized>(&mut self, scene: &S) -> usize {
        match self.settings.object_discovery {
            ObjectDiscovery::ByTag => {
                let tag = self.settings.tag.clone();
                self.register_by_tag(scene, &tag)
            }
            ObjectDiscovery::Manual => 0,
        }
    }

    /// Stops tracking `object`. Returns false when it was not tracked.
    pub fn remove(&mut self, object: ObjectId) -> bool {
        match self.slot_of(object) {
            Some(slot) => {
                self.slices[slot].invalidate();
                true
            }
            None => false,
        }
    }

    /// Sizes the atlas for the whole pool at max resolution, laid out as one horizontal strip.
    pub fn setup_atlas_layout(&mut self) {
        let max = self.settings.max_resolution();
        self.atlas_resolution = UVec2::new(max.saturating_mul(self.slices.len() as u32), max);
    }

    pub fn atlas_resolution(&self) -> UVec2 {
        self.atlas_resolution
    }

    pub fn texel_size(&self) -> Vec2 {
        Vec2::ONE / self.atlas_resolution.max(UVec2::ONE).as_vec2()
    }

    /// False when the pool is empty or the atlas has not been laid out.
    pub fn should_render(&self) -> bool {
        !self.slices.is_empty() && self.atlas_resolution != UVec2::ZERO
    }

    pub fn light_rotation<S: ShadowScene + ?Sized>(&self, scene: &S) -> Quat {
        let rotation = match self.settings.light_source {
            LightSource::EulerAngles => self.settings.euler_rotation(),
            LightSource::MainDirectionalLight => scene.main_light_rotation().unwrap_or(Quat::IDENTITY),
        };
        rotation.normalize()
    }

    /// World-space direction the light travels in.
    pub fn light_direction<S: ShadowScene + ?Sized>(&self, scene: &S) -> Vec3 {
        self.light_rotation(scene) * Vec3::Z
    }

    /// Recomputes every slice for this frame.
    ///
    /// Stages run in a fixed order over the pool: bounds, frustum, culling, resolution, packing,
    /// resolve matrices. A settings error disables every slice and is returned to the caller.
    pub fn run_pipeline<S: ShadowScene + ?Sized>(
        &mut self,
        scene: &S,
        camera: &ViewerCamera,
    ) -> Result<(), ShadowError> {
        if let Err(err) = self.settings.validate() {
            self.invalidate_frame();
            return Err(err);
        }
        if self.atlas_resolution == UVec2::ZERO {
            self.setup_atlas_layout();
        }
        if self.settings.frustum_culling {
            self.frustum_planes.update(&camera.view_projection());
        }

        let light_rotation = self.light_rotation(scene);
        let padding = self.settings.padding_clamped();
        let extend = self.settings.frustum_extend_clamped();
        for slice in &mut self.slices {
            if !slice.is_valid(scene) {
                slice.frame.disabled = true;
                continue;
            }
            slice.frame.disabled = false;
            retrieve_bounds(slice, scene);
            build_frustum(&mut slice.frame, light_rotation, padding, extend, &mut self.corner_scratch);
        }
        self.cull();
        self.assign_resolutions(camera);
        self.pack_atlas();
        self.prepare_resolve_data();
        self.rebuild_aggregates();
        Ok(())
    }

    fn cull(&mut self) {
        if !self.settings.frustum_culling {
            return;
        }
        let planes = self.frustum_planes;
        for slice in self.slices.iter_mut().filter(|slice| slice.should_render()) {
            let proxy_bounds = encapsulate_transformed(&FRUSTUM_PROXY_CORNERS, &slice.frame.frustum_local_to_world);
            slice.frame.disabled = !planes.intersects_aabb(&proxy_bounds);
        }
    }

    fn assign_resolutions(&mut self, camera: &ViewerCamera) {
        let max = self.settings.max_resolution();
        let min = self.settings.min_resolution();
        let remap = self.settings.remap_factor_clamped();
        let scale = self.settings.global_res_scale_clamped();
        let adaptive = self.settings.adaptive_res;
        for slice in self.slices.iter_mut().filter(|slice| slice.should_render()) {
            let longer = if adaptive && min != max {
                let coverage = screen_coverage(&slice.frame.bounds_world, camera, &mut self.corner_scratch);
                quantized_resolution(coverage, min, max, remap)
            } else {
                max
            };
            let half = safe_half_extents(&slice.frame.bounds_shadow_view);
            slice.frame.slice_resolution = aspect_resolution(longer, half, scale);
        }
    }

    /// Linear strip along X in slot order. Culled slices take no space.
    fn pack_atlas(&mut self) {
        let mut cursor = 0u32;
        for slice in self.slices.iter_mut().filter(|slice| slice.should_render()) {
            slice.frame.slice_offset = UVec2::new(cursor, 0);
            cursor += slice.frame.slice_resolution.x;
        }
    }

    fn prepare_resolve_data(&mut self) {
        let atlas = self.atlas_resolution;
        for slice in self.slices.iter_mut().filter(|slice| slice.should_render()) {
            let frame = &mut slice.frame;
            frame.slice_uv_rect = slice_uv_rect(frame.slice_offset, frame.slice_resolution, atlas);
            frame.world_to_atlas_uv = world_to_atlas_uv(&frame.shadow_view, &frame.shadow_proj, frame.slice_uv_rect);
        }
    }

    fn rebuild_aggregates(&mut self) {
        let count = self.active_slice_count();
        if self.world_to_atlas_uv.len() != count {
            self.world_to_atlas_uv.resize(count, Mat4::IDENTITY);
            self.frustum_models.resize(count, Mat4::IDENTITY);
            self.uv_rects.resize(count, Vec4::ZERO);
        }
        for (index, slice) in self.slices.iter().filter(|slice| slice.should_render()).enumerate() {
            self.world_to_atlas_uv[index] = slice.frame.world_to_atlas_uv;
            self.frustum_models[index] = slice.frame.frustum_local_to_world;
            self.uv_rects[index] = slice.frame.slice_uv_rect;
        }
    }

    /// Disables every slice and empties the aggregate arrays until the next successful run.
    /// Registrations are kept.
    pub fn invalidate_frame(&mut self) {
        for slice in &mut self.slices {
            slice.frame.disabled = true;
        }
        self.clear_aggregates();
    }

    fn clear_aggregates(&mut self) {
        self.world_to_atlas_uv.clear();
        self.frustum_models.clear();
        self.uv_rects.clear();
    }

    /// World to atlas UV matrix per active slice, slot order.
    pub fn world_to_atlas_uv_matrices(&self) -> &[Mat4] {
        &self.world_to_atlas_uv
    }

    /// Frustum proxy model matrix per active slice, slot order.
    pub fn frustum_local_to_world_matrices(&self) -> &[Mat4] {
        &self.frustum_models
    }

    /// UV offset/extent per active slice, slot order.
    pub fn slice_uv_rects(&self) -> &[Vec4] {
        &self.uv_rects
    }

    pub fn stats<S: ShadowScene + ?Sized>(&self, scene: &S) -> ShadowStats {
        let slices = self
            .active_slices()
            .filter_map(|(slot, slice)| {
                let object = slice.tracked_object()?;
                Some(SliceStats {
                    slot,
                    object,
                    name: scene.object_name(object).map(str::to_string),
                    resolution: slice.frame.slice_resolution,
                    offset: slice.frame.slice_offset,
                })
            })
            .collect::<Vec<_>>();
        ShadowStats {
            atlas_resolution: self.atlas_resolution,
            capacity: self.capacity(),
            registered: self.registered_count(),
            active: slices.len(),
            slices,
        }
    }
}

fn retrieve_bounds<S: ShadowScene + ?Sized>(slice: &mut SliceRecord, scene: &S) {
    slice.frame.bounds_world = encapsulate_all(
        slice
            .casting_surfaces()
            .iter()
            .filter_map(|surface| scene.renderable(*surface))
            .map(|renderable| renderable.world_bounds()),
    );
}

/// Measures the bounds in a light frame centered on them, then moves the view origin to the
/// center of the near face so depth starts at zero.
fn build_frustum(frame: &mut SliceFrame, light_rotation: Quat, padding: f32, extend: f32, scratch: &mut [Vec3; 8]) {
    let bounds_frame = world_to_shadow_view(frame.bounds_world.center(), light_rotation);
    frame.shadow_view_to_world = bounds_frame.inverse();
    frame.bounds_shadow_view = frame.bounds_world.transformed_with(&bounds_frame, scratch);

    let half = safe_half_extents(&frame.bounds_shadow_view);
    let near_center = near_face_center(&frame.bounds_shadow_view);
    frame.near_plane_center_world = frame.shadow_view_to_world.transform_point3(near_center);
    frame.shadow_view = world_to_shadow_view(frame.near_plane_center_world, light_rotation);
    frame.shadow_proj = shadow_projection(half, padding, extend);
    frame.frustum_local_to_world = frustum_local_to_world(&frame.shadow_view, half, extend);
}
