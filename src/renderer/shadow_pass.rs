use glam::Vec4;

use super::commands::{
    ClearFlags, CommandSink, RenderTargetAllocator, RenderTargetDesc, RenderTargetId, ViewportRect,
};
use super::{DEPTH_FORMAT, PER_OBJECT_SHADOW_ATLAS};
use crate::camera3d::ViewerCamera;
use crate::config::UpdateMethod;
use crate::engine::ShadowEngine;
use crate::error::ShadowError;
use crate::renderable::ShadowCaster;
use crate::scene::ShadowScene;

/// Rasterizes every active slice into the shared depth atlas.
#[derive(Debug, Default)]
pub struct ShadowPass {
    atlas_target: Option<RenderTargetId>,
}

pub struct ShadowPassParams<'a, S: ShadowScene + ?Sized> {
    pub engine: &'a mut ShadowEngine,
    pub scene: &'a S,
    pub camera: &'a ViewerCamera,
    pub sink: &'a mut dyn CommandSink,
}

impl ShadowPass {
    pub fn new<S: ShadowScene + ?Sized>(engine: &mut ShadowEngine, scene: &S) -> Self {
        if engine.settings().update_method == UpdateMethod::OnInit {
            let registered = engine.register_objects(scene);
            log::debug!("Per-object shadow pass registered {registered} object(s) on init");
        }
        Self::default()
    }

    /// Atlas bound during the last `configure`, if allocation succeeded.
    pub fn atlas_target(&self) -> Option<RenderTargetId> {
        self.atlas_target
    }

    pub fn configure<S: ShadowScene + ?Sized>(
        &mut self,
        engine: &mut ShadowEngine,
        scene: &S,
        targets: &mut dyn RenderTargetAllocator,
        sink: &mut dyn CommandSink,
    ) {
        self.atlas_target = None;
        if engine.capacity() == 0 {
            return;
        }
        engine.setup_atlas_layout();
        let atlas = engine.atlas_resolution();
        let desc = RenderTargetDesc {
            label: "Per Object Shadow Atlas",
            width: atlas.x,
            height: atlas.y,
            format: DEPTH_FORMAT,
            filter: wgpu::FilterMode::Linear,
            depth_bits: 32,
        };
        match targets.request_render_target(&desc) {
            Ok(target) => {
                sink.set_render_target(target, ClearFlags::ALL, Vec4::new(0.0, 0.0, 0.0, 1.0));
                self.atlas_target = Some(target);
            }
            Err(err) => {
                log::warn!("Per-object shadow atlas allocation failed, skipping shadows this frame: {err:#}");
            }
        }
        if engine.settings().update_method == UpdateMethod::PerFrame {
            engine.register_objects(scene);
        }
    }

    /// Runs the engine pipeline and draws every active slice. Returns the number of slices drawn.
    pub fn execute<S: ShadowScene + ?Sized>(&mut self, params: ShadowPassParams<'_, S>) -> Result<usize, ShadowError> {
        let ShadowPassParams { engine, scene, camera, sink } = params;
        if !engine.should_render() {
            return Ok(0);
        }
        let Some(atlas) = self.atlas_target else {
            engine.invalidate_frame();
            return Ok(0);
        };
        engine.run_pipeline(scene, camera)?;
        sink.set_global_texture(PER_OBJECT_SHADOW_ATLAS, atlas);

        let depth_pass = engine.settings().depth_pass;
        let mut drawn = 0;
        for (_, slice) in engine.active_slices() {
            let frame = &slice.frame;
            sink.set_viewport(ViewportRect::from_offset_size(frame.slice_offset, frame.slice_resolution));
            sink.set_view_projection(frame.shadow_view, frame.shadow_proj);
            sink.flush();
            for &surface in slice.casting_surfaces() {
                let Some(renderable) = scene.renderable(surface) else {
                    continue;
                };
                for submesh in 0..renderable.submesh_count() {
                    renderable.submit_draw(sink, surface, submesh, depth_pass);
                }
            }
            drawn += 1;
        }
        sink.set_view_projection(camera.view, camera.projection);
        Ok(drawn)
    }
}
