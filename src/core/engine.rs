//! Window, event loop and frame pacing

use std::sync::Arc;

use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::{DeviceEvent, DeviceId, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    keyboard::PhysicalKey,
    window::{CursorGrabMode, Window, WindowId},
};

use crate::audio::AudioManager;
use crate::gpu::{GpuBackend, WgpuBackend};
use crate::input::Input;
use crate::physics::RapierWorld;
use crate::renderer::Vertex;

use super::config::EngineConfig;
use super::context::EngineContext;
use super::debug::FrameStats;
use super::error::EngineError;
use super::time::Time;

/// State that exists while the window is open
struct Running {
    window: Arc<Window>,
    gpu: WgpuBackend,
    context: EngineContext<RapierWorld>,
}

/// Main engine struct
pub struct Engine {
    config: EngineConfig,
    time: Time,
    input: Input,
    stats: FrameStats,
    running: Option<Running>,
    /// First fatal error, returned from [`Engine::run`]
    error: Option<EngineError>,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            time: Time::new(),
            input: Input::new(),
            stats: FrameStats::new(),
            running: None,
            error: None,
        }
    }

    /// Run the engine until the window closes
    ///
    /// # Errors
    ///
    /// Returns the error that stopped startup, or an event loop failure
    pub fn run(mut self) -> Result<(), EngineError> {
        log::info!("Starting engine: {}", self.config.title);
        log::info!("Controls: M toggle model, 1 play track, F1 wireframe, Escape quit");

        let event_loop = EventLoop::new()?;
        event_loop.set_control_flow(ControlFlow::Poll);
        event_loop.run_app(&mut self)?;

        match self.error.take() {
            Some(e) => Err(e),
            None => {
                log::info!("Engine shutdown complete");
                Ok(())
            }
        }
    }

    fn start(&self, event_loop: &ActiveEventLoop) -> Result<Running, EngineError> {
        let window_attrs = Window::default_attributes()
            .with_title(&self.config.title)
            .with_inner_size(PhysicalSize::new(self.config.width, self.config.height));
        let window = Arc::new(event_loop.create_window(window_attrs)?);

        capture_cursor(&window);

        let mut gpu = pollster::block_on(WgpuBackend::new(
            Arc::clone(&window),
            self.config.vsync,
            Vertex::LAYOUT,
        ))?;

        let audio = match AudioManager::init() {
            Ok(audio) => Some(audio),
            Err(e) => {
                log::warn!("Audio disabled: {e}");
                None
            }
        };

        let context = EngineContext::init(&mut gpu, &self.config, audio)?;
        Ok(Running {
            window,
            gpu,
            context,
        })
    }

    /// Tear down the scene once; later calls do nothing
    fn shutdown(&mut self) {
        if let Some(Running {
            window,
            mut gpu,
            context,
        }) = self.running.take()
        {
            context.shutdown(&mut gpu);
            drop(gpu);
            drop(window);
        }
    }

    fn frame(&mut self, event_loop: &ActiveEventLoop) {
        self.time.update();
        self.stats.record_frame(self.time.delta());
        let dt = self.time.delta_seconds();

        let Some(running) = &mut self.running else {
            return;
        };

        running.context.update(&mut running.gpu, &self.input, dt);
        if running.context.should_quit() {
            log::info!("Quit requested, shutting down");
            self.shutdown();
            event_loop.exit();
            return;
        }

        let size = running.window.inner_size();
        let aspect = size.width.max(1) as f32 / size.height.max(1) as f32;
        running.context.render(&mut running.gpu, aspect);
        running.gpu.present();

        // Clear per-frame input state
        self.input.update();
        running.window.request_redraw();
    }
}

/// Grab and hide the cursor so mouse motion only turns the camera
fn capture_cursor(window: &Window) {
    let grabbed = window
        .set_cursor_grab(CursorGrabMode::Locked)
        .or_else(|_| window.set_cursor_grab(CursorGrabMode::Confined));
    if let Err(e) = grabbed {
        log::warn!("Could not grab the cursor: {e}");
    }
    window.set_cursor_visible(false);
}

impl ApplicationHandler for Engine {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.running.is_some() || self.error.is_some() {
            return;
        }

        match self.start(event_loop) {
            Ok(running) => {
                self.running = Some(running);
                self.time = Time::new();
                log::info!("Engine initialized successfully");
            }
            Err(e) => {
                log::error!("Failed to initialize engine: {e}");
                self.error = Some(e);
                event_loop.exit();
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested => {
                log::info!("Close requested, shutting down");
                self.shutdown();
                event_loop.exit();
            }

            WindowEvent::Resized(new_size) => {
                if new_size.width > 0 && new_size.height > 0 {
                    if let Some(running) = &mut self.running {
                        running.gpu.resize(new_size.width, new_size.height);
                    }
                }
            }

            WindowEvent::KeyboardInput { event, .. } => {
                if let PhysicalKey::Code(key_code) = event.physical_key {
                    self.input.process_keyboard(key_code, event.state);
                }
            }

            WindowEvent::Focused(false) => self.input.release_all(),

            WindowEvent::RedrawRequested => self.frame(event_loop),

            _ => {}
        }
    }

    fn device_event(
        &mut self,
        _event_loop: &ActiveEventLoop,
        _device_id: DeviceId,
        event: DeviceEvent,
    ) {
        if let DeviceEvent::MouseMotion { delta: (dx, dy) } = event {
            self.input
                .process_mouse_delta(glam::Vec2::new(dx as f32, dy as f32));
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(running) = &self.running {
            running.window.request_redraw();
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        self.shutdown();
    }
}
