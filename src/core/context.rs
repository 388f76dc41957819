//! Engine state shared by update and render

use std::path::PathBuf;

use glam::{Mat4, Vec3};
use winit::keyboard::KeyCode;

use crate::audio::{AudioManager, SoundId};
use crate::gpu::GpuBackend;
use crate::input::Input;
use crate::physics::{BodyHandle, PhysicsWorld, TeardownReport};
use crate::renderer::{Camera, Model, Renderer, ShaderProgram, Texture, TextureCache};

use super::config::EngineConfig;
use super::error::EngineError;

/// Seconds between audio listener updates
pub const LISTENER_INTERVAL: f32 = 0.1;
/// Spin of the loaded model about +Y, degrees per second
pub const MODEL_SPIN_DEGREES: f32 = 30.0;
/// The loaded model is lowered onto the ground by this offset
pub const MODEL_OFFSET: Vec3 = Vec3::new(0.0, -1.0, 0.0);

/// Falling box of the demo scene
pub const CUBE_START: Vec3 = Vec3::new(0.0, 5.0, 0.0);
pub const CUBE_SIZE: Vec3 = Vec3::ONE;
pub const CUBE_MASS: f32 = 1.0;
/// Static ground of the demo scene
pub const GROUND_POSITION: Vec3 = Vec3::new(0.0, -1.0, 0.0);
pub const GROUND_SIZE: Vec3 = Vec3::new(10.0, 0.1, 10.0);

/// Which model is drawn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActiveModel {
    /// The procedural cube, placed by its physics body
    Cube,
    /// The model loaded from the configured scene file
    Loaded,
}

/// Rate limiter for spatial audio listener updates
///
/// Fires when strictly more than the interval has passed since it last
/// fired, independent of frame rate.
#[derive(Debug, Clone, Copy)]
pub struct ListenerThrottle {
    interval: f32,
    since_update: f32,
}

impl ListenerThrottle {
    pub const fn new(interval: f32) -> Self {
        Self {
            interval,
            since_update: 0.0,
        }
    }

    /// Advance by `dt` and report whether the listener should be updated
    pub fn tick(&mut self, dt: f32) -> bool {
        self.since_update += dt.max(0.0);
        if self.since_update > self.interval {
            self.since_update = 0.0;
            true
        } else {
            false
        }
    }
}

impl Default for ListenerThrottle {
    fn default() -> Self {
        Self::new(LISTENER_INTERVAL)
    }
}

/// Everything the frame loop owns
///
/// Created once the GPU exists, updated and rendered once per frame, then
/// torn down in reverse order by [`EngineContext::shutdown`].
#[derive(Debug)]
pub struct EngineContext<P: PhysicsWorld> {
    camera: Camera,
    renderer: Renderer,
    shader: ShaderProgram,
    fallback: Texture,
    cube: Model,
    loaded: Model,
    textures: TextureCache,
    active: ActiveModel,
    physics: P,
    cube_body: Option<BodyHandle>,
    audio: Option<AudioManager>,
    track: SoundId,
    listener: ListenerThrottle,
    elapsed: f32,
    should_quit: bool,
}

impl<P: PhysicsWorld> EngineContext<P> {
    /// Build the demo scene
    ///
    /// `audio` is `None` when no output device could be opened; the engine
    /// then runs silent.
    ///
    /// # Errors
    ///
    /// Returns an error if the shader program, the fallback texture or the
    /// cube cannot be created
    pub fn init(
        gpu: &mut impl GpuBackend,
        config: &EngineConfig,
        mut audio: Option<AudioManager>,
    ) -> Result<Self, EngineError> {
        let track = match (&mut audio, &config.audio_track) {
            (Some(audio), Some(path)) => audio.load(path).unwrap_or_else(|e| {
                log::warn!("Failed to load audio track: {e}");
                SoundId::NONE
            }),
            _ => SoundId::NONE,
        };

        let mut physics = P::create();
        let cube_body = physics.add_box(CUBE_START, CUBE_SIZE, CUBE_MASS);
        physics.add_box(GROUND_POSITION, GROUND_SIZE, 0.0);

        let camera = Camera::new(config.camera_position);

        let shader =
            ShaderProgram::from_files(gpu, &config.vertex_shader, &config.fragment_shader)?;

        let fallback = match Texture::white(gpu) {
            Ok(texture) => texture,
            Err(e) => {
                shader.release(gpu);
                return Err(e.into());
            }
        };

        let cube = Model::cube(gpu);
        if cube.is_empty() {
            shader.release(gpu);
            fallback.release(gpu);
            return Err(EngineError::CubeUnavailable);
        }

        let mut textures = TextureCache::new();
        let loaded = match &config.model {
            Some(path) => {
                let mut model = Model::load(gpu, path);
                if config.resolve_textures && !model.is_empty() {
                    let dir = config.texture_search_dir().unwrap_or_else(PathBuf::new);
                    model.resolve_textures(gpu, &mut textures, &dir);
                    log::info!("Resolved {} material textures", textures.len());
                }
                model
            }
            None => Model::empty(),
        };

        let active = if loaded.is_empty() {
            if config.model.is_some() {
                log::warn!("Model unavailable, showing the cube instead");
            }
            ActiveModel::Cube
        } else {
            ActiveModel::Loaded
        };

        let mut renderer = Renderer::new();
        renderer.set_clear_color(config.clear_color);
        renderer.set_light(config.light);
        renderer.set_fallback_texture(fallback.id());

        log::info!("Engine initialised, showing {active:?}");

        Ok(Self {
            camera,
            renderer,
            shader,
            fallback,
            cube,
            loaded,
            textures,
            active,
            physics,
            cube_body: Some(cube_body),
            audio,
            track,
            listener: ListenerThrottle::default(),
            elapsed: 0.0,
            should_quit: false,
        })
    }

    /// Handle keys, move the camera, step physics and update the listener
    pub fn update(&mut self, gpu: &mut impl GpuBackend, input: &Input, dt: f32) {
        self.process_keys(gpu, input);

        self.camera.process_input(input, dt);
        self.physics.step(dt);
        self.elapsed += dt.max(0.0);

        if self.listener.tick(dt) {
            if let Some(audio) = &mut self.audio {
                audio.set_listener(self.camera.position, self.camera.front(), self.camera.up());
                audio.prune_finished();
            }
        }
    }

    fn process_keys(&mut self, gpu: &mut impl GpuBackend, input: &Input) {
        if input.is_key_pressed(KeyCode::Escape) {
            self.should_quit = true;
        }

        if input.is_key_just_pressed(KeyCode::F1) {
            let enabled = !self.renderer.wireframe();
            self.renderer.set_wireframe(gpu, enabled);
            log::info!("Wireframe mode {}", if enabled { "ON" } else { "OFF" });
        }

        if input.is_key_just_pressed(KeyCode::KeyM) {
            self.toggle_model();
        }

        if input.is_key_just_pressed(KeyCode::Digit1) {
            self.play_track();
        }
    }

    /// Switch between the cube and the loaded model
    ///
    /// Switching to the loaded model is refused when it failed to load.
    pub fn toggle_model(&mut self) {
        self.active = match self.active {
            ActiveModel::Loaded => ActiveModel::Cube,
            ActiveModel::Cube if self.loaded.is_empty() => {
                log::warn!("No model loaded, staying on the cube");
                ActiveModel::Cube
            }
            ActiveModel::Cube => ActiveModel::Loaded,
        };
        log::info!("Switched to {:?}", self.active);
    }

    fn play_track(&mut self) {
        match &mut self.audio {
            Some(audio) if self.track.is_some() => {
                audio.play(self.track);
            }
            _ => log::warn!("No audio track to play"),
        }
    }

    /// Model matrix of the active model
    pub fn model_transform(&self) -> Mat4 {
        match self.active {
            ActiveModel::Loaded => {
                Mat4::from_translation(MODEL_OFFSET)
                    * Mat4::from_rotation_y((self.elapsed * MODEL_SPIN_DEGREES).to_radians())
            }
            ActiveModel::Cube => self.physics.transform(self.cube_body).to_model_matrix(),
        }
    }

    /// Draw the active model; returns the number of meshes submitted
    pub fn render(&mut self, gpu: &mut impl GpuBackend, aspect: f32) -> usize {
        let projection = self.camera.projection_matrix(aspect);
        self.renderer.begin_frame(gpu, &self.camera, projection);

        let transform = self.model_transform();
        let model = match self.active {
            ActiveModel::Loaded => &self.loaded,
            ActiveModel::Cube => &self.cube,
        };
        self.renderer.submit(gpu, model, transform, &self.shader);
        self.renderer.end_frame()
    }

    /// Release models, textures, the shader, physics and audio, in that order
    pub fn shutdown(self, gpu: &mut impl GpuBackend) -> TeardownReport {
        self.cube.free(gpu);
        self.loaded.free(gpu);
        self.textures.release(gpu);
        self.shader.release(gpu);
        self.fallback.release(gpu);

        let report = self.physics.destroy();
        log::info!("Physics released {} bodies", report.bodies_released());

        if let Some(mut audio) = self.audio {
            audio.delete_buffer(self.track);
            audio.shutdown();
        }
        report
    }

    pub const fn camera(&self) -> &Camera {
        &self.camera
    }

    pub const fn renderer(&self) -> &Renderer {
        &self.renderer
    }

    pub const fn physics(&self) -> &P {
        &self.physics
    }

    pub const fn active_model(&self) -> ActiveModel {
        self.active
    }

    pub const fn loaded_model(&self) -> &Model {
        &self.loaded
    }

    /// Body driving the cube
    pub const fn cube_body(&self) -> Option<BodyHandle> {
        self.cube_body
    }

    /// Simulated seconds since init
    pub const fn elapsed(&self) -> f32 {
        self.elapsed
    }

    pub const fn has_audio(&self) -> bool {
        self.audio.is_some()
    }

    /// Check if the engine should quit
    pub const fn should_quit(&self) -> bool {
        self.should_quit
    }

    /// Request engine shutdown
    pub fn quit(&mut self) {
        self.should_quit = true;
    }
}
