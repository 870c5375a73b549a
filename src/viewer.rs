//! Interactive window that plays a [`VfxEngine`].
//!
//! | Input | Action |
//! |-------|--------|
//! | Left drag | orbit the camera |
//! | Wheel | zoom |
//! | `F` | launch a firework |
//! | `R` | restart emitters and clear pools |
//! | `Space` | pause / resume |
//! | `Esc` | quit |

use std::sync::Arc;

use glam::Vec3;
use winit::{
    application::ApplicationHandler,
    event::{ElementState, MouseButton, MouseScrollDelta, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::{Window, WindowId},
};

use crate::engine::VfxEngine;
use crate::error::ViewerError;
use crate::gpu::GpuState;
use crate::time::Clock;

/// Where `F` launches rockets from.
const LAUNCH_ORIGIN: Vec3 = Vec3::new(0.0, -1.0, 0.0);

/// What a key press does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Fire a rocket from the launch origin.
    LaunchFirework,
    /// Restart every emitter and clear every pool.
    Reset,
    /// Pause or resume the clock.
    TogglePause,
    /// Close the window.
    Quit,
}

impl Action {
    /// Map a physical key to an action.
    pub fn from_key(key: KeyCode) -> Option<Self> {
        match key {
            KeyCode::KeyF => Some(Action::LaunchFirework),
            KeyCode::KeyR => Some(Action::Reset),
            KeyCode::Space => Some(Action::TogglePause),
            KeyCode::Escape => Some(Action::Quit),
            _ => None,
        }
    }
}

/// Open a window and run `engine` until it is closed.
pub fn run(engine: VfxEngine, title: impl Into<String>) -> Result<(), ViewerError> {
    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App::new(engine, title.into());
    event_loop.run_app(&mut app)?;
    match app.error.take() {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

struct App {
    engine: VfxEngine,
    clock: Clock,
    title: String,
    window: Option<Arc<Window>>,
    gpu_state: Option<GpuState>,
    mouse_pressed: bool,
    last_mouse_pos: Option<(f64, f64)>,
    error: Option<ViewerError>,
}

impl App {
    fn new(engine: VfxEngine, title: String) -> Self {
        Self {
            engine,
            clock: Clock::new(),
            title,
            window: None,
            gpu_state: None,
            mouse_pressed: false,
            last_mouse_pos: None,
            error: None,
        }
    }

    fn init(&mut self, event_loop: &ActiveEventLoop) -> Result<(), ViewerError> {
        let window_attrs = Window::default_attributes()
            .with_title(self.title.clone())
            .with_inner_size(winit::dpi::LogicalSize::new(1280, 720));

        let window = Arc::new(event_loop.create_window(window_attrs)?);
        let gpu_state = pollster::block_on(GpuState::new(window.clone(), self.engine.registry()))?;
        self.window = Some(window);
        self.gpu_state = Some(gpu_state);
        // don't count startup time as the first frame
        self.clock = Clock::new();
        Ok(())
    }

    fn apply(&mut self, action: Action, event_loop: &ActiveEventLoop) {
        match action {
            Action::LaunchFirework => {
                self.engine.launch_firework(LAUNCH_ORIGIN, self.clock.elapsed());
            }
            Action::Reset => self.engine.reset(),
            Action::TogglePause => self.clock.toggle_pause(),
            Action::Quit => event_loop.exit(),
        }
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        let Some(gpu_state) = &mut self.gpu_state else {
            return;
        };

        let frame = self.clock.update();
        let report = self.engine.frame(frame);
        gpu_state.upload(self.engine.registry(), &report);

        match gpu_state.render(self.engine.registry(), frame.time) {
            Ok(_) => {}
            Err(wgpu::SurfaceError::Lost) => gpu_state.resize(winit::dpi::PhysicalSize {
                width: gpu_state.config.width,
                height: gpu_state.config.height,
            }),
            Err(wgpu::SurfaceError::OutOfMemory) => {
                log::error!("GPU out of memory");
                event_loop.exit();
            }
            Err(e) => log::error!("render error: {:?}", e),
        }

        if let Some(window) = &self.window {
            if self.clock.frame() % 30 == 0 {
                window.set_title(&format!("{} - {:.0} fps", self.title, self.clock.fps()));
            }
            window.request_redraw();
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_none() {
            if let Err(err) = self.init(event_loop) {
                log::error!("viewer startup failed: {}", err);
                self.error = Some(err);
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                event_loop.exit();
            }
            WindowEvent::Resized(physical_size) => {
                if let Some(gpu_state) = &mut self.gpu_state {
                    gpu_state.resize(physical_size);
                }
            }
            WindowEvent::KeyboardInput { event, .. } => {
                if event.state == ElementState::Pressed && !event.repeat {
                    if let PhysicalKey::Code(code) = event.physical_key {
                        if let Some(action) = Action::from_key(code) {
                            self.apply(action, event_loop);
                        }
                    }
                }
            }
            WindowEvent::MouseInput { state, button, .. } => {
                if button == MouseButton::Left {
                    self.mouse_pressed = state == ElementState::Pressed;
                    if !self.mouse_pressed {
                        self.last_mouse_pos = None;
                    }
                }
            }
            WindowEvent::CursorMoved { position, .. } => {
                if self.mouse_pressed {
                    if let Some((last_x, last_y)) = self.last_mouse_pos {
                        if let Some(gpu_state) = &mut self.gpu_state {
                            gpu_state
                                .camera
                                .orbit((position.x - last_x) as f32, (position.y - last_y) as f32);
                        }
                    }
                    self.last_mouse_pos = Some((position.x, position.y));
                }
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let scroll = match delta {
                    MouseScrollDelta::LineDelta(_, y) => y,
                    MouseScrollDelta::PixelDelta(pos) => pos.y as f32 * 0.1,
                };
                if let Some(gpu_state) = &mut self.gpu_state {
                    gpu_state.camera.zoom(scroll);
                }
            }
            WindowEvent::RedrawRequested => self.redraw(event_loop),
            _ => {}
        }
    }
}
