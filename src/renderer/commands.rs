use anyhow::{bail, Result};
use bitflags::bitflags;
use glam::{Mat4, UVec2, Vec4};

use super::ShaderSymbol;
use crate::renderable::MaterialId;
use crate::scene::SurfaceId;
use crate::shadow_math::FrustumProxyMesh;

bitflags! {
    /// Buffers cleared when a render target is bound.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct ClearFlags: u8 {
        const COLOR   = 1 << 0;
        const DEPTH   = 1 << 1;
        const STENCIL = 1 << 2;
        const ALL = Self::COLOR.bits() | Self::DEPTH.bits() | Self::STENCIL.bits();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RenderTargetId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderTargetDesc {
    pub label: &'static str,
    pub width: u32,
    pub height: u32,
    pub format: wgpu::TextureFormat,
    pub filter: wgpu::FilterMode,
    /// Zero for color targets.
    pub depth_bits: u32,
}

impl RenderTargetDesc {
    pub fn size(&self) -> UVec2 {
        UVec2::new(self.width, self.height)
    }
}

/// Pixel rectangle, origin top-left.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl ViewportRect {
    pub fn from_offset_size(offset: UVec2, size: UVec2) -> Self {
        Self { x: offset.x as f32, y: offset.y as f32, width: size.x as f32, height: size.y as f32 }
    }
}

/// Per-draw shader arrays keyed by symbol.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropertyBlock {
    matrices: Vec<(ShaderSymbol, Vec<Mat4>)>,
    vectors: Vec<(ShaderSymbol, Vec<Vec4>)>,
}

impl PropertyBlock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_matrix_array(&mut self, symbol: ShaderSymbol, values: &[Mat4]) {
        match self.matrices.iter_mut().find(|(existing, _)| *existing == symbol) {
            Some((_, slot)) => {
                slot.clear();
                slot.extend_from_slice(values);
            }
            None => self.matrices.push((symbol, values.to_vec())),
        }
    }

    pub fn set_vector_array(&mut self, symbol: ShaderSymbol, values: &[Vec4]) {
        match self.vectors.iter_mut().find(|(existing, _)| *existing == symbol) {
            Some((_, slot)) => {
                slot.clear();
                slot.extend_from_slice(values);
            }
            None => self.vectors.push((symbol, values.to_vec())),
        }
    }

    pub fn matrix_array(&self, symbol: ShaderSymbol) -> Option<&[Mat4]> {
        self.matrices.iter().find(|(existing, _)| *existing == symbol).map(|(_, values)| values.as_slice())
    }

    pub fn vector_array(&self, symbol: ShaderSymbol) -> Option<&[Vec4]> {
        self.vectors.iter().find(|(existing, _)| *existing == symbol).map(|(_, values)| values.as_slice())
    }

    pub fn clear(&mut self) {
        self.matrices.clear();
        self.vectors.clear();
    }
}

/// Host command buffer the passes record into.
pub trait CommandSink {
    fn set_render_target(&mut self, target: RenderTargetId, clear: ClearFlags, clear_color: Vec4);

    fn set_global_texture(&mut self, symbol: ShaderSymbol, target: RenderTargetId);

    fn set_global_vector(&mut self, symbol: ShaderSymbol, value: Vec4);

    fn set_viewport(&mut self, rect: ViewportRect);

    fn set_view_projection(&mut self, view: Mat4, projection: Mat4);

    fn draw_renderer(&mut self, surface: SurfaceId, material: MaterialId, submesh: u32, pass: u32);

    fn draw_mesh_instanced(
        &mut self,
        mesh: &FrustumProxyMesh,
        material: MaterialId,
        models: &[Mat4],
        properties: &PropertyBlock,
    );

    /// Submits everything recorded so far.
    fn flush(&mut self);
}

/// Hands out frame-owned render targets.
pub trait RenderTargetAllocator {
    fn request_render_target(&mut self, desc: &RenderTargetDesc) -> Result<RenderTargetId>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum RecordedCommand {
    SetRenderTarget { target: RenderTargetId, clear: ClearFlags, clear_color: Vec4 },
    SetGlobalTexture { symbol: ShaderSymbol, target: RenderTargetId },
    SetGlobalVector { symbol: ShaderSymbol, value: Vec4 },
    SetViewport(ViewportRect),
    SetViewProjection { view: Mat4, projection: Mat4 },
    DrawRenderer { surface: SurfaceId, material: MaterialId, submesh: u32, pass: u32 },
    DrawMeshInstanced { material: MaterialId, index_count: u32, models: Vec<Mat4>, properties: PropertyBlock },
    Flush,
}

/// Sink that stores commands instead of executing them. Used by the report tool and tests.
#[derive(Debug, Clone, Default)]
pub struct CommandRecorder {
    commands: Vec<RecordedCommand>,
}

impl CommandRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn commands(&self) -> &[RecordedCommand] {
        &self.commands
    }

    pub fn take(&mut self) -> Vec<RecordedCommand> {
        std::mem::take(&mut self.commands)
    }

    pub fn clear(&mut self) {
        self.commands.clear();
    }

    pub fn renderer_draw_count(&self) -> usize {
        self.commands.iter().filter(|command| matches!(command, RecordedCommand::DrawRenderer { .. })).count()
    }

    pub fn instanced_draw_count(&self) -> usize {
        self.commands.iter().filter(|command| matches!(command, RecordedCommand::DrawMeshInstanced { .. })).count()
    }

    pub fn viewports(&self) -> Vec<ViewportRect> {
        self.commands
            .iter()
            .filter_map(|command| match command {
                RecordedCommand::SetViewport(rect) => Some(*rect),
                _ => None,
            })
            .collect()
    }
}

impl CommandSink for CommandRecorder {
    fn set_render_target(&mut self, target: RenderTargetId, clear: ClearFlags, clear_color: Vec4) {
        self.commands.push(RecordedCommand::SetRenderTarget { target, clear, clear_color });
    }

    fn set_global_texture(&mut self, symbol: ShaderSymbol, target: RenderTargetId) {
        self.commands.push(RecordedCommand::SetGlobalTexture { symbol, target });
    }

    fn set_global_vector(&mut self, symbol: ShaderSymbol, value: Vec4) {
        self.commands.push(RecordedCommand::SetGlobalVector { symbol, value });
    }

    fn set_viewport(&mut self, rect: ViewportRect) {
        self.commands.push(RecordedCommand::SetViewport(rect));
    }

    fn set_view_projection(&mut self, view: Mat4, projection: Mat4) {
        self.commands.push(RecordedCommand::SetViewProjection { view, projection });
    }

    fn draw_renderer(&mut self, surface: SurfaceId, material: MaterialId, submesh: u32, pass: u32) {
        self.commands.push(RecordedCommand::DrawRenderer { surface, material, submesh, pass });
    }

    fn draw_mesh_instanced(
        &mut self,
        mesh: &FrustumProxyMesh,
        material: MaterialId,
        models: &[Mat4],
        properties: &PropertyBlock,
    ) {
        self.commands.push(RecordedCommand::DrawMeshInstanced {
            material,
            index_count: mesh.indices.len() as u32,
            models: models.to_vec(),
            properties: properties.clone(),
        });
    }

    fn flush(&mut self) {
        self.commands.push(RecordedCommand::Flush);
    }
}

/// Allocator that only hands out ids. Requests larger than `max_dimension` fail, like a device
/// limit would.
#[derive(Debug, Clone)]
pub struct VirtualTargetPool {
    max_dimension: u32,
    targets: Vec<RenderTargetDesc>,
}

impl VirtualTargetPool {
    pub const DEFAULT_MAX_DIMENSION: u32 = 16384;

    pub fn new() -> Self {
        Self::with_max_dimension(Self::DEFAULT_MAX_DIMENSION)
    }

    pub fn with_max_dimension(max_dimension: u32) -> Self {
        Self { max_dimension, targets: Vec::new() }
    }

    pub fn target(&self, id: RenderTargetId) -> Option<&RenderTargetDesc> {
        self.targets.get(id.0 as usize)
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Releases every target; ids handed out earlier become invalid.
    pub fn release_all(&mut self) {
        self.targets.clear();
    }
}

impl Default for VirtualTargetPool {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderTargetAllocator for VirtualTargetPool {
    fn request_render_target(&mut self, desc: &RenderTargetDesc) -> Result<RenderTargetId> {
        if desc.width == 0 || desc.height == 0 {
            bail!("{} has an empty size {}x{}", desc.label, desc.width, desc.height);
        }
        if desc.width > self.max_dimension || desc.height > self.max_dimension {
            bail!(
                "{} size {}x{} exceeds the {} texel limit",
                desc.label,
                desc.width,
                desc.height,
                self.max_dimension
            );
        }
        let id = RenderTargetId(self.targets.len() as u32);
        self.targets.push(*desc);
        Ok(id)
    }
}
