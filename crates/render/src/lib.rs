//! Free-look rendering core: camera, shader programs, geometry buffers and the
//! per-frame loop, independent of any GPU API.
//!
//! # Invariants
//! - Camera `front` is unit length and pitch stays within [-89, 89] degrees.
//! - A shader program is only handed out after both stages compile and link.
//! - Geometry is validated before any backend allocation.
//! - Frame commands run clear, viewport, program, uniforms, draw, in that order.
//!
//! Backends implement [`GraphicsBackend`]. [`DebugTextBackend`] records calls as
//! text so the whole loop runs without a GPU.

pub mod camera;
pub mod config;
pub mod error;
pub mod geometry;
pub mod render_loop;
pub mod renderer;
pub mod scene;
pub mod shader;
pub mod shaders;
pub mod transform;

pub use camera::Camera;
pub use config::{CameraConfig, SessionConfig, WindowConfig};
pub use error::{ConfigError, RenderError, ShaderCompileError, ShaderStage};
pub use geometry::{AttributeLayout, GeometryBuffer, MeshData};
pub use render_loop::{LoopState, MotionMode, RenderLoop};
pub use renderer::{DebugHandle, DebugTextBackend, Frame, FrameCommand, GraphicsBackend, LiveCounts};
pub use scene::{ScenePreset, UnknownScene};
pub use shader::{link, LinkedProgram, ProgramInterface, ShaderProgram, UniformKind, UniformLayout, UniformLocation};
pub use transform::{Animation, FrameTransforms};

pub fn crate_info() -> &'static str {
    "freelook-render v0.1.0"
}
