use anyhow::{bail, Result};

use super::commands::{RenderTargetAllocator, RenderTargetDesc, RenderTargetId};

pub struct GpuTarget {
    pub desc: RenderTargetDesc,
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub sampler: wgpu::Sampler,
}

/// Render targets backed by wgpu textures. Targets live until `release_all`, which the host calls
/// once the frame has been submitted.
pub struct GpuTargetPool<'a> {
    device: &'a wgpu::Device,
    targets: Vec<GpuTarget>,
}

impl<'a> GpuTargetPool<'a> {
    pub fn new(device: &'a wgpu::Device) -> Self {
        Self { device, targets: Vec::new() }
    }

    pub fn target(&self, id: RenderTargetId) -> Option<&GpuTarget> {
        self.targets.get(id.0 as usize)
    }

    pub fn release_all(&mut self) {
        self.targets.clear();
    }
}

impl RenderTargetAllocator for GpuTargetPool<'_> {
    fn request_render_target(&mut self, desc: &RenderTargetDesc) -> Result<RenderTargetId> {
        let max_dimension = self.device.limits().max_texture_dimension_2d;
        if desc.width == 0 || desc.height == 0 || desc.width > max_dimension || desc.height > max_dimension {
            bail!(
                "{} size {}x{} is outside the device limit of {}",
                desc.label,
                desc.width,
                desc.height,
                max_dimension
            );
        }
        let is_depth = desc.format.is_depth_stencil_format();
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(desc.label),
            size: wgpu::Extent3d { width: desc.width, height: desc.height, depth_or_array_layers: 1 },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: desc.format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some(desc.label),
            format: Some(desc.format),
            dimension: Some(wgpu::TextureViewDimension::D2),
            ..Default::default()
        });
        // Depth targets are read through a comparison sampler so linear filtering stays valid.
        let sampler = self.device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some(desc.label),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: desc.filter,
            min_filter: desc.filter,
            mipmap_filter: wgpu::FilterMode::Nearest,
            lod_min_clamp: 0.0,
            lod_max_clamp: 0.0,
            compare: is_depth.then_some(wgpu::CompareFunction::LessEqual),
            anisotropy_clamp: 1,
            border_color: None,
        });
        let id = RenderTargetId(self.targets.len() as u32);
        self.targets.push(GpuTarget { desc: *desc, texture, view, sampler });
        Ok(id)
    }
}
