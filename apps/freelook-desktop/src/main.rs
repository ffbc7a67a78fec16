use anyhow::Result;
use clap::Parser;
use freelook_common::Viewport;
use freelook_input::{InputEvent, Key, KeyAction};
use freelook_render::{LoopState, MotionMode, RenderLoop, ScenePreset, SessionConfig};
use freelook_render_wgpu::WgpuBackend;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::{DeviceEvent, DeviceId, ElementState, KeyEvent, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{CursorGrabMode, Window, WindowId};

#[derive(Parser)]
#[command(name = "freelook-desktop", about = "Free-look camera demo window")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Session config file (YAML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Scene preset: triangle, two_triangles or floor
    #[arg(long)]
    scene: Option<ScenePreset>,

    /// Move by elapsed time while keys are held
    #[arg(long)]
    timed: bool,
}

fn map_key(code: KeyCode) -> Option<Key> {
    let key = match code {
        KeyCode::ArrowUp => Key::Up,
        KeyCode::ArrowDown => Key::Down,
        KeyCode::ArrowLeft => Key::Left,
        KeyCode::ArrowRight => Key::Right,
        KeyCode::KeyW => Key::W,
        KeyCode::KeyA => Key::A,
        KeyCode::KeyS => Key::S,
        KeyCode::KeyD => Key::D,
        KeyCode::Escape => Key::Escape,
        _ => return None,
    };
    Some(key)
}

fn key_action(state: ElementState, repeat: bool) -> KeyAction {
    match (state, repeat) {
        (ElementState::Pressed, false) => KeyAction::Press,
        (ElementState::Pressed, true) => KeyAction::Repeat,
        (ElementState::Released, _) => KeyAction::Release,
    }
}

/// Unbounded pointer position built from raw mouse motion, so look input
/// keeps flowing when the real cursor is pinned at the window edge.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
struct VirtualCursor {
    x: f64,
    y: f64,
}

impl VirtualCursor {
    fn apply(&mut self, dx: f64, dy: f64) -> InputEvent {
        self.x += dx;
        self.y += dy;
        InputEvent::CursorMoved { x: self.x, y: self.y }
    }
}

struct App {
    config: SessionConfig,
    window: Option<Arc<Window>>,
    render_loop: Option<RenderLoop<WgpuBackend>>,
    cursor: VirtualCursor,
    focused: bool,
    failure: Option<anyhow::Error>,
}

impl App {
    fn new(config: SessionConfig) -> Self {
        Self {
            config,
            window: None,
            render_loop: None,
            cursor: VirtualCursor::default(),
            focused: true,
            failure: None,
        }
    }

    fn start(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let attrs = Window::default_attributes()
            .with_title(self.config.window.title.clone())
            .with_inner_size(PhysicalSize::new(self.config.window.width, self.config.window.height));
        let window = Arc::new(event_loop.create_window(attrs)?);

        let grabbed = window
            .set_cursor_grab(CursorGrabMode::Locked)
            .or_else(|_| window.set_cursor_grab(CursorGrabMode::Confined));
        if let Err(e) = grabbed {
            tracing::warn!("cursor grab unavailable: {e}");
        }
        window.set_cursor_visible(false);

        let size = window.inner_size();
        let viewport = Viewport::new(i64::from(size.width), i64::from(size.height)).unwrap_or_default();
        let backend = WgpuBackend::new(window.clone())?;
        let render_loop = RenderLoop::new(backend, &self.config, viewport)?;

        window.request_redraw();
        self.window = Some(window);
        self.render_loop = Some(render_loop);
        Ok(())
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, error: anyhow::Error) {
        tracing::error!("{error:#}");
        self.failure = Some(error);
        self.render_loop = None;
        event_loop.exit();
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        if let Err(e) = self.start(event_loop) {
            self.fail(event_loop, e);
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        let Some(render_loop) = self.render_loop.as_mut() else {
            return;
        };

        match event {
            WindowEvent::CloseRequested => render_loop.push_event(InputEvent::CloseRequested),
            WindowEvent::Resized(size) => render_loop.push_event(InputEvent::FramebufferResized {
                width: i64::from(size.width),
                height: i64::from(size.height),
            }),
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(code),
                        state,
                        repeat,
                        ..
                    },
                ..
            } => {
                if let Some(key) = map_key(code) {
                    render_loop.push_event(InputEvent::Key {
                        key,
                        action: key_action(state, repeat),
                    });
                }
            }
            WindowEvent::Focused(focused) => {
                self.focused = focused;
                if focused {
                    render_loop.reset_cursor();
                }
            }
            WindowEvent::RedrawRequested => match render_loop.render_frame() {
                Ok(LoopState::Running) => {
                    render_loop.backend_mut().present();
                    if let Some(window) = &self.window {
                        window.request_redraw();
                    }
                }
                Ok(LoopState::Terminating) => {
                    render_loop.shutdown();
                    event_loop.exit();
                }
                Err(e) => self.fail(event_loop, e.into()),
            },
            _ => {}
        }
    }

    fn device_event(&mut self, _event_loop: &ActiveEventLoop, _device_id: DeviceId, event: DeviceEvent) {
        if let DeviceEvent::MouseMotion { delta } = event {
            if !self.focused {
                return;
            }
            if let Some(render_loop) = self.render_loop.as_mut() {
                render_loop.push_event(self.cursor.apply(delta.0, delta.1));
            }
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        // Release GPU resources while the window and device are still alive.
        self.render_loop = None;
        self.window = None;
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    let mut config = match &cli.config {
        Some(path) => SessionConfig::load(path)?,
        None => SessionConfig::default(),
    };
    if let Some(scene) = cli.scene {
        config.scene = scene;
    }
    if cli.timed {
        config.motion = MotionMode::Timed;
    }

    tracing::info!(scene = %config.scene, motion = ?config.motion, "freelook-desktop starting");

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App::new(config);
    event_loop.run_app(&mut app)?;

    match app.failure {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
