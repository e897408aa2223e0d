//! Host-facing passes for the per-object shadow atlas.
//!
//! The passes never touch a GPU directly: they record into a [`CommandSink`] and request targets
//! from a [`RenderTargetAllocator`]. [`GpuTargetPool`] backs the allocator with wgpu textures.

mod commands;
mod gpu_targets;
mod resolve_pass;
mod shadow_pass;

pub use commands::{
    ClearFlags, CommandRecorder, CommandSink, PropertyBlock, RecordedCommand, RenderTargetAllocator,
    RenderTargetDesc, RenderTargetId, ViewportRect, VirtualTargetPool,
};
pub use gpu_targets::{GpuTarget, GpuTargetPool};
pub use resolve_pass::{ResolveInstanceGpu, ResolvePass};
pub use shadow_pass::{ShadowPass, ShadowPassParams};

pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

/// Shader-visible name plus its fixed binding slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShaderSymbol {
    pub name: &'static str,
    pub slot: u32,
}

pub const PER_OBJECT_SHADOW_ATLAS: ShaderSymbol = ShaderSymbol { name: "_PerObjectShadowAtlas", slot: 0 };
pub const WORLD_TO_UV_MATRIX: ShaderSymbol = ShaderSymbol { name: "_WorldToUVMatrix", slot: 1 };
pub const SLICE_UV_OFFSET_EXTEND: ShaderSymbol = ShaderSymbol { name: "_SliceUVOffsetExtend", slot: 2 };
pub const PER_OBJECT_SHADOW_ATLAS_TEXEL_SIZE: ShaderSymbol =
    ShaderSymbol { name: "_PerObjectShadowAtlasTexelSize", slot: 3 };
pub const SCREEN_SPACE_SHADOW_MAP: ShaderSymbol = ShaderSymbol { name: "_ScreenSpaceShadowMap", slot: 4 };

pub const SHADER_SYMBOLS: [ShaderSymbol; 5] = [
    PER_OBJECT_SHADOW_ATLAS,
    WORLD_TO_UV_MATRIX,
    SLICE_UV_OFFSET_EXTEND,
    PER_OBJECT_SHADOW_ATLAS_TEXEL_SIZE,
    SCREEN_SPACE_SHADOW_MAP,
];
