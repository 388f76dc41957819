//! Miracle, a minimal real-time 3D engine
//!
//! This engine provides:
//! - Model, texture and shader loading drawn through wgpu
//! - A fly camera driven by keyboard and mouse
//! - Rigid boxes simulated with rapier3d
//! - Positional audio with rodio

pub mod audio;
pub mod core;
pub mod gpu;
pub mod input;
pub mod physics;
pub mod renderer;

// Re-exports for convenience
pub use glam;
pub use rapier3d;
pub use wgpu;
pub use winit;

/// Prelude module for common imports
pub mod prelude {
    pub use crate::audio::{AudioManager, SoundId, SourceId};
    pub use crate::core::{
        ActiveModel, Engine, EngineConfig, EngineContext, EngineError, FrameStats, Time,
    };
    pub use crate::gpu::{GpuBackend, HeadlessGpu, WgpuBackend};
    pub use crate::input::Input;
    pub use crate::physics::{BodyHandle, BodyTransform, PhysicsWorld, RapierWorld, StubWorld};
    pub use crate::renderer::{
        Camera, Light, MeshBuffer, Model, Renderer, ShaderProgram, Texture, TextureCache, Vertex,
    };
    pub use glam::{Mat4, Quat, Vec2, Vec3, Vec4};
    pub use winit::keyboard::KeyCode;
}
