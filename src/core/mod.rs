//! Core engine module
//!
//! Configuration, the engine context that owns the scene, and the window
//! loop that drives it.

mod config;
mod context;
mod debug;
mod engine;
mod error;
mod time;

pub use config::{ConfigError, DEFAULT_CONFIG_FILE, EngineConfig};
pub use context::{
    ActiveModel, CUBE_MASS, CUBE_SIZE, CUBE_START, EngineContext, GROUND_POSITION, GROUND_SIZE,
    LISTENER_INTERVAL, ListenerThrottle, MODEL_OFFSET, MODEL_SPIN_DEGREES,
};
pub use debug::{FrameStats, REPORT_INTERVAL};
pub use engine::Engine;
pub use error::EngineError;
pub use time::Time;
