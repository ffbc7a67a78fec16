//! The per-frame driver: drains input, updates the camera, stages uniforms and
//! issues the draw.
//!
//! # Invariants
//! - Input is applied before the frame that follows it is built; camera
//!   mutation and `view_matrix()` never interleave.
//! - The viewport is read at the start of every frame, never cached by the backend.
//! - Once `Terminating`, no further frames are drawn.
//! - Program and geometry are released exactly once, on `shutdown()` or drop.

use crate::camera::Camera;
use crate::config::SessionConfig;
use crate::error::RenderError;
use crate::geometry::{GeometryBuffer, MeshData};
use crate::renderer::{Frame, FrameCommand, GraphicsBackend};
use crate::shader::{ShaderProgram, UniformLocation};
use crate::transform::{Animation, FrameTransforms, REFERENCE_FRAME_RATE};
use freelook_common::{Rgba, Viewport};
use freelook_input::{Action, Direction, InputEvent, InputMapper, InputQueue, KeyPhase};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::Instant;

/// Longest frame interval fed to timed motion, in seconds.
pub const MAX_FRAME_DT: f32 = 0.1;

/// How movement and animation are scaled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MotionMode {
    /// One `speed` step per key press or repeat; phase advances a fixed step per frame.
    #[default]
    PerEvent,
    /// Held keys move `speed` per reference frame of elapsed time; phase advances likewise.
    Timed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Running,
    Terminating,
}

/// Uniform locations resolved once at startup.
#[derive(Debug, Clone, Copy)]
struct SceneUniforms {
    model: UniformLocation,
    view: UniformLocation,
    projection: UniformLocation,
    color: UniformLocation,
}

impl SceneUniforms {
    fn resolve<P>(program: &ShaderProgram<P>) -> Self {
        let resolve = |name: &str| {
            let loc = program.uniform_location(name);
            if !loc.is_found() {
                tracing::debug!(uniform = name, "uniform not found, writes will be ignored");
            }
            loc
        };
        Self {
            model: resolve("model"),
            view: resolve("view"),
            projection: resolve("projection"),
            color: resolve("color"),
        }
    }
}

pub struct RenderLoop<B: GraphicsBackend> {
    backend: B,
    program: Option<ShaderProgram<B::Program>>,
    geometry: Option<GeometryBuffer<B::Geometry>>,
    uniforms: SceneUniforms,
    camera: Camera,
    mapper: InputMapper,
    queue: InputQueue,
    viewport: Viewport,
    animation: Animation,
    motion: MotionMode,
    held: BTreeSet<Direction>,
    /// Directions pressed during the current drain, moved at least one frame
    /// even if released before the frame is built.
    tapped: BTreeSet<Direction>,
    clear_color: Rgba,
    state: LoopState,
    last_frame: Option<Instant>,
    transforms: FrameTransforms,
    frames: u64,
}

impl<B: GraphicsBackend> RenderLoop<B> {
    /// Build the loop for the configured scene preset.
    pub fn new(backend: B, config: &SessionConfig, viewport: Viewport) -> Result<Self, RenderError> {
        let (vertex, fragment) = config.scene.shader_sources();
        Self::from_parts(backend, vertex, fragment, &config.scene.mesh(), config, viewport)
    }

    /// Build the loop from an explicit shader pair and mesh. On failure every
    /// resource created so far is released before the error is returned.
    pub fn from_parts(
        mut backend: B,
        vertex_source: &str,
        fragment_source: &str,
        mesh: &MeshData,
        config: &SessionConfig,
        viewport: Viewport,
    ) -> Result<Self, RenderError> {
        let program = ShaderProgram::create(&mut backend, vertex_source, fragment_source)?;
        let geometry = match GeometryBuffer::upload(&mut backend, mesh) {
            Ok(g) => g,
            Err(e) => {
                backend.release_program(program.into_handle());
                return Err(e);
            }
        };
        let wanted = program.interface().position_components;
        let provided = geometry.layout().components();
        if wanted != provided {
            backend.release_program(program.into_handle());
            backend.release_geometry(geometry.into_handle());
            return Err(RenderError::LayoutMismatch {
                program: wanted,
                geometry: provided,
            });
        }

        let uniforms = SceneUniforms::resolve(&program);
        tracing::info!(
            scene = %config.scene,
            motion = ?config.motion,
            width = viewport.width(),
            height = viewport.height(),
            "render loop ready"
        );
        Ok(Self {
            backend,
            program: Some(program),
            geometry: Some(geometry),
            uniforms,
            camera: config.build_camera(),
            mapper: config.build_mapper(),
            queue: InputQueue::new(),
            viewport,
            animation: Animation::default(),
            motion: config.motion,
            held: BTreeSet::new(),
            tapped: BTreeSet::new(),
            clear_color: config.clear_color,
            state: LoopState::Running,
            last_frame: None,
            transforms: FrameTransforms::default(),
            frames: 0,
        })
    }

    /// Queue a raw event; it is applied at the start of the next frame.
    pub fn push_event(&mut self, event: InputEvent) {
        self.queue.push(event);
    }

    pub fn pending_events(&self) -> usize {
        self.queue.len()
    }

    /// Re-arm cursor seeding, e.g. after the host re-captures the pointer.
    /// Queued behind pending events, so earlier samples are still applied
    /// against the old reference.
    pub fn reset_cursor(&mut self) {
        self.queue.push(InputEvent::CursorReset);
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn motion(&self) -> MotionMode {
        self.motion
    }

    pub fn set_motion(&mut self, motion: MotionMode) {
        self.motion = motion;
        self.held.clear();
        self.tapped.clear();
    }

    pub fn animation(&self) -> &Animation {
        &self.animation
    }

    /// Transforms pushed by the most recent frame.
    pub fn transforms(&self) -> &FrameTransforms {
        &self.transforms
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn program(&self) -> Option<&ShaderProgram<B::Program>> {
        self.program.as_ref()
    }

    pub fn geometry(&self) -> Option<&GeometryBuffer<B::Geometry>> {
        self.geometry.as_ref()
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Render one frame, measuring elapsed time with the loop's own clock.
    pub fn render_frame(&mut self) -> Result<LoopState, RenderError> {
        let now = Instant::now();
        let dt = self
            .last_frame
            .map(|t| now.duration_since(t).as_secs_f32())
            .unwrap_or(0.0);
        self.last_frame = Some(now);
        self.render_frame_elapsed(dt)
    }

    /// Render one frame with an explicit elapsed time in seconds.
    pub fn render_frame_elapsed(&mut self, dt: f32) -> Result<LoopState, RenderError> {
        if self.state == LoopState::Terminating {
            return Ok(LoopState::Terminating);
        }

        self.apply_input();
        if self.state == LoopState::Terminating {
            tracing::info!(frames = self.frames, "close signal received");
            return Ok(LoopState::Terminating);
        }

        let scale = match self.motion {
            MotionMode::PerEvent => 1.0,
            MotionMode::Timed => dt.clamp(0.0, MAX_FRAME_DT) * REFERENCE_FRAME_RATE,
        };
        if self.motion == MotionMode::Timed {
            let step = self.camera.speed() * scale;
            for &direction in self.held.union(&self.tapped) {
                self.camera.move_in(direction, step);
            }
        }
        self.tapped.clear();

        let (Some(program), Some(geometry)) = (self.program.as_mut(), self.geometry.as_ref()) else {
            return Err(RenderError::ContextUnavailable(
                "render loop resources were already released".into(),
            ));
        };

        let transforms = FrameTransforms::compute(&self.animation, &self.camera, self.viewport);
        program.set_mat4(self.uniforms.model, &transforms.model);
        program.set_mat4(self.uniforms.view, &transforms.view);
        program.set_mat4(self.uniforms.projection, &transforms.projection);
        program.set_vec3(self.uniforms.color, transforms.color);

        let mut frame = Frame::new();
        frame.push(FrameCommand::Clear {
            color: self.clear_color,
            depth: 1.0,
        });
        frame.push(FrameCommand::SetViewport(self.viewport));
        frame.push(FrameCommand::UseProgram(program.handle()));
        frame.push(FrameCommand::WriteUniforms(program.uniforms().bytes()));
        frame.push(FrameCommand::DrawIndexed {
            geometry: geometry.handle(),
            index_count: geometry.index_count(),
        });
        self.backend.execute(&frame)?;

        self.animation.advance(scale);
        self.transforms = transforms;
        self.frames += 1;
        tracing::debug!(frame = self.frames, phase = self.animation.phase(), "frame drawn");
        Ok(LoopState::Running)
    }

    fn apply_input(&mut self) {
        let events: Vec<InputEvent> = self.queue.drain().collect();
        for event in events {
            let action = self.mapper.map(event);
            self.apply(action);
            if self.state == LoopState::Terminating {
                break;
            }
        }
    }

    fn apply(&mut self, action: Action) {
        match action {
            Action::Move { direction, phase } => match (self.motion, phase) {
                (MotionMode::PerEvent, KeyPhase::Press | KeyPhase::Repeat) => {
                    self.camera.step(direction);
                }
                (MotionMode::PerEvent, KeyPhase::Release) => {}
                (MotionMode::Timed, KeyPhase::Press) => {
                    self.held.insert(direction);
                    self.tapped.insert(direction);
                }
                (MotionMode::Timed, KeyPhase::Release) => {
                    self.held.remove(&direction);
                }
                (MotionMode::Timed, KeyPhase::Repeat) => {}
            },
            Action::Look {
                pitch_delta,
                yaw_delta,
            } => self.camera.update_orientation(pitch_delta, yaw_delta),
            Action::Resize { width, height } => {
                if self.viewport.resize(width, height) {
                    tracing::debug!(width, height, "viewport resized");
                } else if Viewport::new(width, height).is_none() {
                    tracing::debug!(width, height, "ignoring non-positive resize");
                }
            }
            Action::Close => self.state = LoopState::Terminating,
            Action::Noop => {}
        }
    }

    /// Release the program and geometry. Safe to call more than once.
    pub fn shutdown(&mut self) {
        let program = self.program.take();
        let geometry = self.geometry.take();
        if program.is_none() && geometry.is_none() {
            return;
        }
        if let Some(p) = program {
            self.backend.release_program(p.into_handle());
        }
        if let Some(g) = geometry {
            self.backend.release_geometry(g.into_handle());
        }
        self.state = LoopState::Terminating;
        tracing::info!(frames = self.frames, "render loop shut down");
    }
}

impl<B: GraphicsBackend> Drop for RenderLoop<B> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::DebugTextBackend;
    use crate::scene::ScenePreset;
    use crate::shaders::{COLOR_FRAGMENT_SHADER, FLAT_VERTEX_SHADER};
    use freelook_input::Key;
    use glam::{Mat4, Vec3};

    const EPS: f32 = 1e-4;

    fn viewport() -> Viewport {
        Viewport::new(800, 600).unwrap()
    }

    fn floor_loop() -> RenderLoop<DebugTextBackend> {
        RenderLoop::new(DebugTextBackend::new(), &SessionConfig::default(), viewport()).unwrap()
    }

    fn timed_loop() -> RenderLoop<DebugTextBackend> {
        let config = SessionConfig {
            motion: MotionMode::Timed,
            ..SessionConfig::default()
        };
        RenderLoop::new(DebugTextBackend::new(), &config, viewport()).unwrap()
    }

    #[test]
    fn frame_commands_run_in_order() {
        let mut rl = floor_loop();
        rl.backend_mut().take_log();
        assert_eq!(rl.render_frame().unwrap(), LoopState::Running);

        let log = rl.backend().log();
        assert_eq!(log.len(), 5);
        assert!(log[0].starts_with("clear"));
        assert_eq!(log[1], "viewport 800x600");
        assert!(log[2].starts_with("use program"));
        assert_eq!(log[3], "write uniforms 208 bytes");
        assert!(log[4].ends_with("indices=6"));
    }

    #[test]
    fn forward_key_moves_camera_one_step() {
        let mut rl = floor_loop();
        rl.push_event(InputEvent::press(Key::Up));
        rl.render_frame().unwrap();
        assert!(rl.camera().position().abs_diff_eq(Vec3::new(0.0, 0.0, 2.3), EPS));

        // Release does not move in per-event mode.
        rl.push_event(InputEvent::release(Key::Up));
        rl.render_frame().unwrap();
        assert!(rl.camera().position().abs_diff_eq(Vec3::new(0.0, 0.0, 2.3), EPS));
    }

    #[test]
    fn uniforms_carry_frame_transforms() {
        let mut rl = floor_loop();
        rl.push_event(InputEvent::press(Key::Right));
        rl.render_frame().unwrap();

        let program = rl.program().unwrap();
        let block = program.uniforms();
        let view = block.mat4(program.uniform_location("view")).unwrap();
        assert_eq!(view, rl.camera().view_matrix());
        let model = block.mat4(program.uniform_location("model")).unwrap();
        assert_eq!(model, Mat4::IDENTITY);
        let color = block.vec3(program.uniform_location("color")).unwrap();
        assert_eq!(color, Vec3::new(0.5, 0.0, 1.0));
        assert_eq!(rl.transforms().view, view);
    }

    #[test]
    fn phase_advances_each_frame() {
        let mut rl = floor_loop();
        for _ in 0..4 {
            rl.render_frame().unwrap();
        }
        assert!((rl.animation().phase() - 0.2).abs() < 1e-6);
        assert_eq!(rl.frames(), 4);
    }

    #[test]
    fn invalid_resize_keeps_previous_viewport() {
        let mut rl = RenderLoop::new(
            DebugTextBackend::new(),
            &SessionConfig::default(),
            Viewport::new(640, 480).unwrap(),
        )
        .unwrap();
        rl.push_event(InputEvent::FramebufferResized {
            width: 0,
            height: 600,
        });
        rl.render_frame().unwrap();
        assert_eq!((rl.viewport().width(), rl.viewport().height()), (640, 480));

        rl.push_event(InputEvent::FramebufferResized {
            width: 800,
            height: 600,
        });
        rl.backend_mut().take_log();
        rl.render_frame().unwrap();
        assert_eq!((rl.viewport().width(), rl.viewport().height()), (800, 600));
        assert_eq!(rl.backend().log()[1], "viewport 800x600");
        assert_eq!(rl.transforms().projection, crate::transform::projection(rl.viewport()));
    }

    #[test]
    fn escape_terminates_without_drawing() {
        let mut rl = floor_loop();
        rl.render_frame().unwrap();
        rl.push_event(InputEvent::press(Key::Escape));
        rl.push_event(InputEvent::press(Key::Up));
        assert_eq!(rl.render_frame().unwrap(), LoopState::Terminating);
        assert_eq!(rl.render_frame().unwrap(), LoopState::Terminating);
        assert_eq!(rl.backend().frames(), 1);
        // Events after the close signal are dropped.
        assert!(rl.camera().position().abs_diff_eq(Vec3::new(0.0, 0.0, 3.0), EPS));
    }

    #[test]
    fn close_request_terminates() {
        let mut rl = floor_loop();
        rl.push_event(InputEvent::CloseRequested);
        assert_eq!(rl.render_frame().unwrap(), LoopState::Terminating);
        assert_eq!(rl.state(), LoopState::Terminating);
    }

    #[test]
    fn first_cursor_event_does_not_jump() {
        let mut rl = floor_loop();
        let front = rl.camera().front();
        rl.push_event(InputEvent::CursorMoved { x: 700.0, y: 50.0 });
        rl.render_frame().unwrap();
        assert_eq!(rl.camera().front(), front);

        rl.push_event(InputEvent::CursorMoved { x: 710.0, y: 50.0 });
        rl.render_frame().unwrap();
        assert!((rl.camera().yaw() - 271.0).abs() < EPS);
        assert!((rl.camera().front().length() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn timed_motion_scales_with_elapsed_time() {
        let mut rl = timed_loop();
        rl.push_event(InputEvent::press(Key::W));
        for _ in 0..6 {
            rl.render_frame_elapsed(1.0 / 60.0).unwrap();
        }
        let z = rl.camera().position().z;
        assert!((z - (3.0 - 0.7 * 6.0)).abs() < EPS, "z = {z}");
        assert!((rl.animation().phase() - 0.3).abs() < 1e-5);

        rl.push_event(InputEvent::release(Key::W));
        rl.render_frame_elapsed(1.0 / 60.0).unwrap();
        assert!((rl.camera().position().z - z).abs() < EPS);
    }

    #[test]
    fn timed_tap_within_one_drain_still_moves() {
        let mut rl = timed_loop();
        rl.push_event(InputEvent::press(Key::W));
        rl.push_event(InputEvent::release(Key::W));
        rl.render_frame_elapsed(1.0 / 60.0).unwrap();
        assert!(rl.camera().position().abs_diff_eq(Vec3::new(0.0, 0.0, 2.3), EPS));

        // The tap does not carry into the next frame.
        rl.render_frame_elapsed(1.0 / 60.0).unwrap();
        assert!(rl.camera().position().abs_diff_eq(Vec3::new(0.0, 0.0, 2.3), EPS));
    }

    #[test]
    fn timed_held_key_moves_once_per_frame() {
        let mut rl = timed_loop();
        rl.push_event(InputEvent::press(Key::W));
        rl.push_event(InputEvent::press(Key::Up));
        rl.render_frame_elapsed(1.0 / 60.0).unwrap();
        assert!(rl.camera().position().abs_diff_eq(Vec3::new(0.0, 0.0, 2.3), EPS));
    }

    #[test]
    fn cursor_reset_keeps_queue_order() {
        let mut rl = floor_loop();
        rl.push_event(InputEvent::CursorMoved { x: 100.0, y: 100.0 });
        rl.render_frame().unwrap();

        // A sample queued before the reset is still a delta from the old seed.
        rl.push_event(InputEvent::CursorMoved { x: 110.0, y: 100.0 });
        rl.reset_cursor();
        rl.push_event(InputEvent::CursorMoved { x: 600.0, y: 400.0 });
        rl.push_event(InputEvent::CursorMoved { x: 610.0, y: 400.0 });
        rl.render_frame().unwrap();
        assert!((rl.camera().yaw() - 272.0).abs() < EPS);
        assert!(rl.camera().pitch().abs() < EPS);
    }

    #[test]
    fn timed_motion_caps_long_frames() {
        let mut rl = timed_loop();
        rl.push_event(InputEvent::press(Key::S));
        rl.render_frame_elapsed(5.0).unwrap();
        let moved = rl.camera().position().z - 3.0;
        assert!((moved - 0.7 * MAX_FRAME_DT * REFERENCE_FRAME_RATE).abs() < EPS);
    }

    #[test]
    fn shutdown_releases_once() {
        let mut rl = floor_loop();
        assert_eq!(rl.backend().live_programs(), 1);
        assert_eq!(rl.backend().live_geometries(), 1);
        rl.shutdown();
        rl.shutdown();
        assert_eq!(rl.backend().live_programs(), 0);
        assert_eq!(rl.backend().live_geometries(), 0);
        let releases = rl
            .backend()
            .log()
            .iter()
            .filter(|l| l.starts_with("release"))
            .count();
        assert_eq!(releases, 2);
        assert!(rl.render_frame().is_ok());
        assert_eq!(rl.state(), LoopState::Terminating);
    }

    #[test]
    fn layout_mismatch_releases_partial_resources() {
        let backend = DebugTextBackend::new();
        let live = backend.live_counts();
        let result = RenderLoop::from_parts(
            backend,
            FLAT_VERTEX_SHADER,
            COLOR_FRAGMENT_SHADER,
            &MeshData::floor(),
            &SessionConfig::default(),
            viewport(),
        );
        match result {
            Err(RenderError::LayoutMismatch { program, geometry }) => {
                assert_eq!((program, geometry), (2, 3));
            }
            Err(e) => panic!("unexpected error {e}"),
            Ok(_) => panic!("expected layout mismatch"),
        }
        assert_eq!((live.programs(), live.geometries()), (0, 0));
    }

    #[test]
    fn geometry_failure_releases_program() {
        let backend = DebugTextBackend::new();
        let live = backend.live_counts();
        let mut mesh = MeshData::triangle();
        mesh.indices = vec![0, 1, 7];
        let result = RenderLoop::from_parts(
            backend,
            FLAT_VERTEX_SHADER,
            COLOR_FRAGMENT_SHADER,
            &mesh,
            &SessionConfig::default(),
            viewport(),
        );
        assert!(result.is_err());
        assert_eq!((live.programs(), live.geometries()), (0, 0));
    }

    #[test]
    fn drop_releases_everything() {
        let rl = floor_loop();
        let live = rl.backend().live_counts();
        assert_eq!((live.programs(), live.geometries()), (1, 1));
        drop(rl);
        assert_eq!((live.programs(), live.geometries()), (0, 0));
    }

    #[test]
    fn bad_shader_halts_startup() {
        let result = RenderLoop::from_parts(
            DebugTextBackend::new(),
            "",
            COLOR_FRAGMENT_SHADER,
            &MeshData::triangle(),
            &SessionConfig::default(),
            viewport(),
        );
        assert!(matches!(result, Err(RenderError::ShaderCompile(_))));
    }

    #[test]
    fn missing_context_halts_startup() {
        let result = RenderLoop::new(DebugTextBackend::without_context(), &SessionConfig::default(), viewport());
        assert!(matches!(result, Err(RenderError::ContextUnavailable(_))));
    }

    #[test]
    fn every_preset_renders() {
        for scene in ScenePreset::ALL {
            let config = SessionConfig {
                scene,
                ..SessionConfig::default()
            };
            let mut rl = RenderLoop::new(DebugTextBackend::new(), &config, viewport()).unwrap();
            assert_eq!(rl.render_frame().unwrap(), LoopState::Running);
        }
    }
}
