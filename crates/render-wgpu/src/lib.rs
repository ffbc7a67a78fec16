//! wgpu graphics backend for the freelook render loop.
//!
//! Programs become render pipelines with one uniform bind group; geometry
//! becomes static vertex and `u32` index buffers.
//!
//! # Invariants
//! - The surface and depth texture always match the last viewport drawn.
//! - A lost or outdated surface skips the frame instead of failing it.

mod gpu;

pub use gpu::{WgpuBackend, WgpuGeometry, WgpuProgram};
