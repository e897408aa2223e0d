pub mod bounds;
pub mod camera3d;
pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod frustum;
pub mod renderable;
pub mod renderer;
pub mod scene;
pub mod shadow_math;
pub mod slice;

pub use config::{ObjectShadowConfig, ShadowSettings};
pub use engine::{RegisterOutcome, ShadowEngine, ShadowStats};
pub use error::ShadowError;
pub use scene::{ObjectId, SceneGraph, ShadowScene, SurfaceId};
