use bytemuck::{Pod, Zeroable};
use glam::{UVec2, Vec4};

use super::commands::{ClearFlags, CommandSink, PropertyBlock, RenderTargetAllocator, RenderTargetDesc, RenderTargetId};
use super::{
    PER_OBJECT_SHADOW_ATLAS_TEXEL_SIZE, SCREEN_SPACE_SHADOW_MAP, SLICE_UV_OFFSET_EXTEND, WORLD_TO_UV_MATRIX,
};
use crate::config::ResolveConfig;
use crate::engine::ShadowEngine;
use crate::renderable::MaterialId;
use crate::shadow_math::FrustumProxyMesh;

/// One packed instance for backends that upload a single storage buffer.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct ResolveInstanceGpu {
    pub model: [[f32; 4]; 4],
    pub world_to_uv: [[f32; 4]; 4],
    pub uv_offset_extent: [f32; 4],
}

/// Composites the atlas into screen space with one instanced draw of the frustum proxies.
#[derive(Debug)]
pub struct ResolvePass {
    config: ResolveConfig,
    material: Option<MaterialId>,
    proxy_mesh: FrustumProxyMesh,
    properties: PropertyBlock,
    screen_target: Option<RenderTargetId>,
}

impl ResolvePass {
    pub fn new(config: ResolveConfig, material: Option<MaterialId>) -> Self {
        Self {
            config,
            material,
            proxy_mesh: FrustumProxyMesh::new(),
            properties: PropertyBlock::new(),
            screen_target: None,
        }
    }

    pub fn config(&self) -> &ResolveConfig {
        &self.config
    }

    pub fn set_material(&mut self, material: Option<MaterialId>) {
        self.material = material;
    }

    pub fn screen_target(&self) -> Option<RenderTargetId> {
        self.screen_target
    }

    pub fn configure(&mut self, targets: &mut dyn RenderTargetAllocator, sink: &mut dyn CommandSink, viewport: UVec2) {
        self.screen_target = None;
        if !self.config.resolve_to_texture {
            return;
        }
        let desc = RenderTargetDesc {
            label: "Screen Space Shadow Map",
            width: viewport.x,
            height: viewport.y,
            format: self.config.texture_format.texture_format(),
            filter: wgpu::FilterMode::Linear,
            depth_bits: 0,
        };
        match targets.request_render_target(&desc) {
            Ok(target) => {
                sink.set_render_target(target, ClearFlags::COLOR, Vec4::ONE);
                self.screen_target = Some(target);
            }
            Err(err) => log::warn!("Screen space shadow map allocation failed: {err:#}"),
        }
    }

    /// Returns the number of instances drawn.
    pub fn execute(&mut self, engine: &ShadowEngine, sink: &mut dyn CommandSink) -> usize {
        let Some(material) = self.material else {
            log::debug!("Per-object shadow resolve skipped: no resolve material");
            return 0;
        };
        if !engine.should_render() {
            return 0;
        }
        if let Some(target) = self.screen_target {
            sink.set_global_texture(SCREEN_SPACE_SHADOW_MAP, target);
        }
        let models = engine.frustum_local_to_world_matrices();
        if models.is_empty() {
            return 0;
        }
        self.properties.set_matrix_array(WORLD_TO_UV_MATRIX, engine.world_to_atlas_uv_matrices());
        self.properties.set_vector_array(SLICE_UV_OFFSET_EXTEND, engine.slice_uv_rects());
        let texel = engine.texel_size();
        let atlas = engine.atlas_resolution().as_vec2();
        sink.set_global_vector(PER_OBJECT_SHADOW_ATLAS_TEXEL_SIZE, Vec4::new(texel.x, texel.y, atlas.x, atlas.y));
        sink.draw_mesh_instanced(&self.proxy_mesh, material, models, &self.properties);
        models.len()
    }

    pub fn pack_instances(engine: &ShadowEngine) -> Vec<ResolveInstanceGpu> {
        engine
            .frustum_local_to_world_matrices()
            .iter()
            .zip(engine.world_to_atlas_uv_matrices())
            .zip(engine.slice_uv_rects())
            .map(|((model, world_to_uv), rect)| ResolveInstanceGpu {
                model: model.to_cols_array_2d(),
                world_to_uv: world_to_uv.to_cols_array_2d(),
                uv_offset_extent: rect.to_array(),
            })
            .collect()
    }
}
