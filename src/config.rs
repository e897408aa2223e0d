use anyhow::{Context, Result};
use glam::{EulerRot, Quat, Vec3};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;

use crate::error::ShadowError;
use crate::scene::Vec3Data;

/// Power-of-two slice resolutions accepted by the atlas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum SliceResolution {
    R16 = 16,
    R32 = 32,
    R64 = 64,
    R128 = 128,
    R256 = 256,
    R512 = 512,
    R1024 = 1024,
    R2048 = 2048,
    R4096 = 4096,
}

impl SliceResolution {
    pub const ALL: [SliceResolution; 9] = [
        SliceResolution::R16,
        SliceResolution::R32,
        SliceResolution::R64,
        SliceResolution::R128,
        SliceResolution::R256,
        SliceResolution::R512,
        SliceResolution::R1024,
        SliceResolution::R2048,
        SliceResolution::R4096,
    ];

    pub const fn pixels(self) -> u32 {
        self as u32
    }
}

impl TryFrom<u32> for SliceResolution {
    type Error = String;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        SliceResolution::ALL
            .into_iter()
            .find(|res| res.pixels() == value)
            .ok_or_else(|| format!("slice resolution must be a power of two in 16..=4096, got {value}"))
    }
}

impl From<SliceResolution> for u32 {
    fn from(value: SliceResolution) -> Self {
        value.pixels()
    }
}

impl fmt::Display for SliceResolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.pixels())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateMethod {
    /// The host registers objects itself.
    Manual,
    /// Tag discovery runs once when the generating pass is created.
    OnInit,
    /// Tag discovery runs every frame.
    #[default]
    PerFrame,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectDiscovery {
    Manual,
    #[default]
    ByTag,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LightSource {
    MainDirectionalLight,
    #[default]
    EulerAngles,
}

/// Engine settings. May be edited between frames, except `max_objects`, which only takes effect
/// when a new engine is constructed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShadowSettings {
    #[serde(default = "ShadowSettings::default_max_objects")]
    pub max_objects: usize,
    #[serde(default = "ShadowSettings::default_slice_max_resolution")]
    pub slice_max_resolution: SliceResolution,
    #[serde(default = "ShadowSettings::default_slice_min_resolution")]
    pub slice_min_resolution: SliceResolution,
    #[serde(default)]
    pub object_discovery: ObjectDiscovery,
    #[serde(default = "ShadowSettings::default_tag")]
    pub tag: String,
    #[serde(default)]
    pub update_method: UpdateMethod,
    #[serde(default)]
    pub light_source: LightSource,
    #[serde(default = "ShadowSettings::default_euler_angles")]
    pub euler_angles: Vec3Data,
    /// Extra depth past the far face of the bounds, in world units.
    #[serde(default = "ShadowSettings::default_frustum_extend")]
    pub frustum_extend: f32,
    /// Pass index used when drawing casters into the atlas.
    #[serde(default = "ShadowSettings::default_depth_pass")]
    pub depth_pass: u32,
    #[serde(default = "ShadowSettings::default_global_res_scale_factor")]
    pub global_res_scale_factor: f32,
    #[serde(default = "ShadowSettings::default_true")]
    pub frustum_culling: bool,
    #[serde(default = "ShadowSettings::default_true")]
    pub adaptive_res: bool,
    /// World-space margin around each slice frustum.
    #[serde(default = "ShadowSettings::default_padding")]
    pub padding: f32,
    #[serde(default = "ShadowSettings::default_adaptive_res_remap_factor")]
    pub adaptive_res_remap_factor: u32,
}

impl ShadowSettings {
    pub const MAX_OBJECTS: usize = 16;
    pub const MAX_REMAP_FACTOR: u32 = 4;
    pub const MAX_PADDING: f32 = 0.1;

    const fn default_max_objects() -> usize {
        4
    }

    const fn default_slice_max_resolution() -> SliceResolution {
        SliceResolution::R512
    }

    const fn default_slice_min_resolution() -> SliceResolution {
        SliceResolution::R128
    }

    fn default_tag() -> String {
        "PerObjectShadow".to_string()
    }

    fn default_euler_angles() -> Vec3Data {
        Vec3Data { x: 50.0, y: -30.0, z: 0.0 }
    }

    const fn default_frustum_extend() -> f32 {
        3.0
    }

    const fn default_depth_pass() -> u32 {
        3
    }

    const fn default_global_res_scale_factor() -> f32 {
        1.0
    }

    const fn default_true() -> bool {
        true
    }

    const fn default_padding() -> f32 {
        0.01
    }

    const fn default_adaptive_res_remap_factor() -> u32 {
        3
    }

    pub fn max_resolution(&self) -> u32 {
        self.slice_max_resolution.pixels()
    }

    pub fn min_resolution(&self) -> u32 {
        self.slice_min_resolution.pixels()
    }

    /// Resolution bounds must be ordered; this is never clamped.
    pub fn validate(&self) -> Result<(), ShadowError> {
        if self.slice_min_resolution > self.slice_max_resolution {
            return Err(ShadowError::InvalidResolutionRange {
                min: self.min_resolution(),
                max: self.max_resolution(),
            });
        }
        Ok(())
    }

    /// Pool capacity used by a new engine.
    pub fn max_objects_clamped(&self) -> usize {
        self.max_objects.min(Self::MAX_OBJECTS)
    }

    pub fn padding_clamped(&self) -> f32 {
        self.padding.clamp(0.0, Self::MAX_PADDING)
    }

    pub fn frustum_extend_clamped(&self) -> f32 {
        self.frustum_extend.max(0.0)
    }

    pub fn remap_factor_clamped(&self) -> u32 {
        self.adaptive_res_remap_factor.min(Self::MAX_REMAP_FACTOR)
    }

    pub fn global_res_scale_clamped(&self) -> f32 {
        self.global_res_scale_factor.clamp(0.1, 1.0)
    }

    /// Light orientation from the configured Euler angles.
    pub fn euler_rotation(&self) -> Quat {
        euler_degrees_to_rotation(self.euler_angles.into())
    }
}

impl Default for ShadowSettings {
    fn default() -> Self {
        Self {
            max_objects: Self::default_max_objects(),
            slice_max_resolution: Self::default_slice_max_resolution(),
            slice_min_resolution: Self::default_slice_min_resolution(),
            object_discovery: ObjectDiscovery::default(),
            tag: Self::default_tag(),
            update_method: UpdateMethod::default(),
            light_source: LightSource::default(),
            euler_angles: Self::default_euler_angles(),
            frustum_extend: Self::default_frustum_extend(),
            depth_pass: Self::default_depth_pass(),
            global_res_scale_factor: Self::default_global_res_scale_factor(),
            frustum_culling: Self::default_true(),
            adaptive_res: Self::default_true(),
            padding: Self::default_padding(),
            adaptive_res_remap_factor: Self::default_adaptive_res_remap_factor(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScreenShadowFormat {
    #[default]
    R8,
    Rgba8,
}

impl ScreenShadowFormat {
    pub fn texture_format(self) -> wgpu::TextureFormat {
        match self {
            ScreenShadowFormat::R8 => wgpu::TextureFormat::R8Unorm,
            ScreenShadowFormat::Rgba8 => wgpu::TextureFormat::Rgba8Unorm,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResolveConfig {
    /// Composite into a separate screen-space shadow buffer instead of the current target.
    #[serde(default)]
    pub resolve_to_texture: bool,
    #[serde(default)]
    pub texture_format: ScreenShadowFormat,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObjectShadowConfig {
    #[serde(default)]
    pub shadow: ShadowSettings,
    #[serde(default)]
    pub resolve: ResolveConfig,
}

impl ObjectShadowConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes =
            fs::read(path).with_context(|| format!("Failed to read config file {}", path.display()))?;
        let cfg = serde_json::from_slice(&bytes)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(cfg)
    }

    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        match Self::load(path) {
            Ok(cfg) => cfg,
            Err(err) => {
                log::warn!("Config load error: {err:?}. Falling back to defaults.");
                Self::default()
            }
        }
    }
}

/// Euler angles in degrees applied Z, then X, then Y (roll, pitch, yaw).
pub fn euler_degrees_to_rotation(degrees: Vec3) -> Quat {
    Quat::from_euler(EulerRot::YXZ, degrees.y.to_radians(), degrees.x.to_radians(), degrees.z.to_radians())
}
