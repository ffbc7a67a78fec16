use crate::error::RenderError;
use crate::geometry::MeshData;
use crate::shader::LinkedProgram;
use freelook_common::{Rgba, Viewport};
use std::cell::Cell;
use std::rc::Rc;

/// One step of a frame, in submission order.
#[derive(Debug)]
pub enum FrameCommand<'a, P, G> {
    Clear { color: Rgba, depth: f32 },
    SetViewport(Viewport),
    UseProgram(&'a P),
    /// Staged uniform block bytes for the program in use.
    WriteUniforms(&'a [u8]),
    DrawIndexed { geometry: &'a G, index_count: u32 },
}

/// Ordered command list for one frame.
#[derive(Debug)]
pub struct Frame<'a, P, G> {
    pub commands: Vec<FrameCommand<'a, P, G>>,
}

impl<'a, P, G> Frame<'a, P, G> {
    pub fn new() -> Self {
        Self {
            commands: Vec::new(),
        }
    }

    pub fn push(&mut self, command: FrameCommand<'a, P, G>) {
        self.commands.push(command);
    }

    pub fn clear_color(&self) -> Option<Rgba> {
        self.commands.iter().find_map(|c| match c {
            FrameCommand::Clear { color, .. } => Some(*color),
            _ => None,
        })
    }

    pub fn viewport(&self) -> Option<Viewport> {
        self.commands.iter().find_map(|c| match c {
            FrameCommand::SetViewport(vp) => Some(*vp),
            _ => None,
        })
    }
}

impl<P, G> Default for Frame<'_, P, G> {
    fn default() -> Self {
        Self::new()
    }
}

/// Graphics-context seam. All backends implement this trait.
///
/// Resource creation happens once at startup; `execute` runs once per frame.
/// Backends own every handle they hand out until it is released.
pub trait GraphicsBackend {
    type Program;
    type Geometry;

    /// Build a GPU program from a linked source pair.
    fn create_program(&mut self, linked: &LinkedProgram) -> Result<Self::Program, RenderError>;

    /// Allocate and fill static vertex and index buffers.
    fn upload_geometry(&mut self, mesh: &MeshData) -> Result<Self::Geometry, RenderError>;

    /// Run one frame's commands in order.
    fn execute(&mut self, frame: &Frame<'_, Self::Program, Self::Geometry>) -> Result<(), RenderError>;

    fn release_program(&mut self, program: Self::Program);

    fn release_geometry(&mut self, geometry: Self::Geometry);
}

/// Handle issued by the debug backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DebugHandle(pub u32);

/// Live-handle counters of a [`DebugTextBackend`].
///
/// Clones share the same counters, so a handle taken before the backend is
/// moved away still observes releases made after it is dropped.
#[derive(Debug, Clone, Default)]
pub struct LiveCounts {
    programs: Rc<Cell<usize>>,
    geometries: Rc<Cell<usize>>,
}

impl LiveCounts {
    pub fn programs(&self) -> usize {
        self.programs.get()
    }

    pub fn geometries(&self) -> usize {
        self.geometries.get()
    }

    fn bump(counter: &Cell<usize>) {
        counter.set(counter.get() + 1);
    }

    fn drop_one(counter: &Cell<usize>) {
        counter.set(counter.get().saturating_sub(1));
    }
}

/// Text backend: records every call as a line of text instead of drawing.
///
/// Stands in for a GPU in tests and in the headless CLI.
#[derive(Debug, Default)]
pub struct DebugTextBackend {
    log: Vec<String>,
    next_id: u32,
    live: LiveCounts,
    frames: u64,
    no_context: bool,
}

impl DebugTextBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// A backend whose context is never current; every allocation fails.
    pub fn without_context() -> Self {
        Self {
            no_context: true,
            ..Self::default()
        }
    }

    pub fn log(&self) -> &[String] {
        &self.log
    }

    pub fn take_log(&mut self) -> Vec<String> {
        std::mem::take(&mut self.log)
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn live_programs(&self) -> usize {
        self.live.programs()
    }

    pub fn live_geometries(&self) -> usize {
        self.live.geometries()
    }

    /// Shared handle on the live counters.
    pub fn live_counts(&self) -> LiveCounts {
        self.live.clone()
    }

    fn require_context(&self) -> Result<(), RenderError> {
        if self.no_context {
            return Err(RenderError::ContextUnavailable(
                "debug backend created without a context".into(),
            ));
        }
        Ok(())
    }

    fn issue(&mut self) -> DebugHandle {
        self.next_id += 1;
        DebugHandle(self.next_id)
    }
}

impl GraphicsBackend for DebugTextBackend {
    type Program = DebugHandle;
    type Geometry = DebugHandle;

    fn create_program(&mut self, linked: &LinkedProgram) -> Result<DebugHandle, RenderError> {
        self.require_context()?;
        let id = self.issue();
        LiveCounts::bump(&self.live.programs);
        self.log.push(format!(
            "create program #{} ({} -> {}, {} uniform bytes)",
            id.0,
            linked.interface.vertex_entry,
            linked.interface.fragment_entry,
            linked.interface.uniforms.size
        ));
        Ok(id)
    }

    fn upload_geometry(&mut self, mesh: &MeshData) -> Result<DebugHandle, RenderError> {
        self.require_context()?;
        let id = self.issue();
        LiveCounts::bump(&self.live.geometries);
        self.log.push(format!(
            "upload geometry #{} ({} vertices, {} indices)",
            id.0,
            mesh.vertex_count(),
            mesh.indices.len()
        ));
        Ok(id)
    }

    fn execute(&mut self, frame: &Frame<'_, DebugHandle, DebugHandle>) -> Result<(), RenderError> {
        self.require_context()?;
        self.frames += 1;
        for command in &frame.commands {
            let line = match command {
                FrameCommand::Clear { color, depth } => format!(
                    "clear color=({:.2}, {:.2}, {:.2}, {:.2}) depth={depth:.1}",
                    color.r(),
                    color.g(),
                    color.b(),
                    color.a()
                ),
                FrameCommand::SetViewport(vp) => format!("viewport {}x{}", vp.width(), vp.height()),
                FrameCommand::UseProgram(p) => format!("use program #{}", p.0),
                FrameCommand::WriteUniforms(bytes) => format!("write uniforms {} bytes", bytes.len()),
                FrameCommand::DrawIndexed {
                    geometry,
                    index_count,
                } => format!("draw geometry #{} indices={index_count}", geometry.0),
            };
            self.log.push(line);
        }
        Ok(())
    }

    fn release_program(&mut self, program: DebugHandle) {
        LiveCounts::drop_one(&self.live.programs);
        self.log.push(format!("release program #{}", program.0));
    }

    fn release_geometry(&mut self, geometry: DebugHandle) {
        LiveCounts::drop_one(&self.live.geometries);
        self.log.push(format!("release geometry #{}", geometry.0));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::MeshData;

    #[test]
    fn records_frame_commands_in_order() {
        let mut backend = DebugTextBackend::new();
        let geo = backend.upload_geometry(&MeshData::triangle()).unwrap();
        let prog = DebugHandle(99);
        let uniforms = [0u8; 16];

        let mut frame = Frame::new();
        frame.push(FrameCommand::Clear {
            color: Rgba::default(),
            depth: 1.0,
        });
        frame.push(FrameCommand::SetViewport(Viewport::new(800, 600).unwrap()));
        frame.push(FrameCommand::UseProgram(&prog));
        frame.push(FrameCommand::WriteUniforms(&uniforms));
        frame.push(FrameCommand::DrawIndexed {
            geometry: &geo,
            index_count: 3,
        });
        assert_eq!(frame.viewport().map(|v| v.width()), Some(800));
        assert_eq!(frame.clear_color(), Some(Rgba::default()));

        backend.take_log();
        backend.execute(&frame).unwrap();
        let log = backend.log();
        assert!(log[0].starts_with("clear color=(0.20, 0.10, 0.50, 0.00)"));
        assert_eq!(log[1], "viewport 800x600");
        assert_eq!(log[2], "use program #99");
        assert_eq!(log[3], "write uniforms 16 bytes");
        assert_eq!(log[4], format!("draw geometry #{} indices=3", geo.0));
        assert_eq!(backend.frames(), 1);
    }

    #[test]
    fn release_tracks_live_handles() {
        let mut backend = DebugTextBackend::new();
        let geo = backend.upload_geometry(&MeshData::floor()).unwrap();
        assert_eq!(backend.live_geometries(), 1);
        backend.release_geometry(geo);
        assert_eq!(backend.live_geometries(), 0);
        assert!(backend.log().last().unwrap().starts_with("release geometry"));
    }

    #[test]
    fn live_counts_outlive_the_backend() {
        let mut backend = DebugTextBackend::new();
        let counts = backend.live_counts();
        let geo = backend.upload_geometry(&MeshData::triangle()).unwrap();
        assert_eq!(counts.geometries(), 1);
        backend.release_geometry(geo);
        backend.upload_geometry(&MeshData::floor()).unwrap();
        drop(backend);
        assert_eq!((counts.programs(), counts.geometries()), (0, 1));
    }

    #[test]
    fn no_context_rejects_everything() {
        let mut backend = DebugTextBackend::without_context();
        assert!(backend.upload_geometry(&MeshData::triangle()).is_err());
        let frame: Frame<'_, DebugHandle, DebugHandle> = Frame::new();
        assert!(backend.execute(&frame).is_err());
    }
}
