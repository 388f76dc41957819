//! Fatal engine errors

use thiserror::Error;

use crate::gpu::GpuInitError;
use crate::renderer::{ShaderError, TextureError};

use super::config::ConfigError;

/// Failures that stop the engine from starting
///
/// Everything else (missing model, missing texture, no audio device) is
/// logged and replaced by a fallback.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to create event loop: {0}")]
    EventLoop(#[from] winit::error::EventLoopError),
    #[error("failed to create window: {0}")]
    Window(#[from] winit::error::OsError),
    #[error("failed to initialise GPU: {0}")]
    Gpu(#[from] GpuInitError),
    #[error("failed to create shader program: {0}")]
    Shader(#[from] ShaderError),
    #[error("failed to create fallback texture: {0}")]
    FallbackTexture(#[from] TextureError),
    #[error("failed to build the cube model")]
    CubeUnavailable,
}
