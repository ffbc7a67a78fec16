//! Shader program lifecycle: per-stage WGSL compilation, interface linking,
//! uniform reflection and uniform staging.
//!
//! # Invariants
//! - A `ShaderProgram` only exists for a pair that compiled and linked.
//! - Per-stage compiler state is scope-owned and dropped on every exit path.
//! - Unknown uniform names resolve to `UniformLocation::NOT_FOUND`; writes to it
//!   are no-ops.

use crate::error::{RenderError, ShaderCompileError, ShaderStage};
use crate::renderer::GraphicsBackend;
use glam::{Mat4, Vec3};
use naga::valid::{Capabilities, ValidationFlags, Validator};
use naga::{AddressSpace, Binding, Handle, Module, ScalarKind, Type, TypeInner, VectorSize};

/// Only uniform block slot the core binds.
pub const UNIFORM_GROUP: u32 = 0;
pub const UNIFORM_BINDING: u32 = 0;

/// Reflected type of a uniform block member.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniformKind {
    Scalar,
    Vec2,
    Vec3,
    Vec4,
    Mat4,
    Other,
}

impl UniformKind {
    /// Bytes written for a value of this kind.
    pub fn byte_len(&self) -> Option<usize> {
        match self {
            Self::Scalar => Some(4),
            Self::Vec2 => Some(8),
            Self::Vec3 => Some(12),
            Self::Vec4 => Some(16),
            Self::Mat4 => Some(64),
            Self::Other => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformField {
    pub name: String,
    pub offset: u32,
    pub kind: UniformKind,
}

/// Layout of the uniform block at `@group(0) @binding(0)`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UniformLayout {
    /// Total block size in bytes, including trailing padding.
    pub size: u32,
    pub fields: Vec<UniformField>,
}

impl UniformLayout {
    pub fn location(&self, name: &str) -> UniformLocation {
        UniformLocation(self.fields.iter().position(|f| f.name == name))
    }

    pub fn field(&self, location: UniformLocation) -> Option<&UniformField> {
        location.0.and_then(|i| self.fields.get(i))
    }
}

/// Handle to a uniform block member, or the "not found" sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UniformLocation(Option<usize>);

impl UniformLocation {
    pub const NOT_FOUND: Self = Self(None);

    pub fn is_found(&self) -> bool {
        self.0.is_some()
    }
}

/// CPU-side copy of the uniform block, pushed to the backend each frame.
#[derive(Debug, Clone)]
pub struct UniformBlock {
    layout: UniformLayout,
    bytes: Vec<u8>,
}

impl UniformBlock {
    pub fn new(layout: UniformLayout) -> Self {
        let bytes = vec![0; layout.size as usize];
        Self { layout, bytes }
    }

    pub fn layout(&self) -> &UniformLayout {
        &self.layout
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn set_mat4(&mut self, location: UniformLocation, value: &Mat4) {
        self.write(location, UniformKind::Mat4, bytemuck::cast_slice(&value.to_cols_array()));
    }

    pub fn set_vec3(&mut self, location: UniformLocation, value: Vec3) {
        self.write(location, UniformKind::Vec3, bytemuck::cast_slice(&value.to_array()));
    }

    /// Read back a written `mat4x4<f32>` member.
    pub fn mat4(&self, location: UniformLocation) -> Option<Mat4> {
        let data = self.read(location, UniformKind::Mat4)?;
        let cols: [f32; 16] = bytemuck::pod_read_unaligned(data);
        Some(Mat4::from_cols_array(&cols))
    }

    /// Read back a written `vec3<f32>` member.
    pub fn vec3(&self, location: UniformLocation) -> Option<Vec3> {
        let data = self.read(location, UniformKind::Vec3)?;
        let xyz: [f32; 3] = bytemuck::pod_read_unaligned(data);
        Some(Vec3::from_array(xyz))
    }

    fn write(&mut self, location: UniformLocation, kind: UniformKind, data: &[u8]) {
        let Some(field) = self.layout.field(location) else {
            return;
        };
        if field.kind != kind {
            tracing::debug!(uniform = %field.name, expected = ?field.kind, got = ?kind, "uniform kind mismatch, write ignored");
            return;
        }
        let start = field.offset as usize;
        if let Some(dst) = self.bytes.get_mut(start..start + data.len()) {
            dst.copy_from_slice(data);
        }
    }

    fn read(&self, location: UniformLocation, kind: UniformKind) -> Option<&[u8]> {
        let field = self.layout.field(location)?;
        if field.kind != kind {
            return None;
        }
        let start = field.offset as usize;
        self.bytes.get(start..start + kind.byte_len()?)
    }
}

/// Everything a backend needs to build a GPU program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramInterface {
    pub vertex_entry: String,
    pub fragment_entry: String,
    /// Float components read from `@location(0)` (2 or 3).
    pub position_components: u32,
    pub uniforms: UniformLayout,
}

/// Linked source pair plus its reflected interface.
#[derive(Debug, Clone)]
pub struct LinkedProgram {
    pub vertex_source: String,
    pub fragment_source: String,
    pub interface: ProgramInterface,
}

/// Reflection of one compiled stage.
#[derive(Debug)]
struct StageInterface {
    entry: String,
    /// `(location, float components)` of entry-point inputs.
    inputs: Vec<(u32, Option<u32>)>,
    /// Locations written by the entry point's result.
    outputs: Vec<u32>,
    uniforms: Option<UniformLayout>,
    /// Resource bindings other than the uniform block slot.
    stray_bindings: Vec<(u32, u32)>,
}

fn compile_stage(stage: ShaderStage, source: &str) -> Result<StageInterface, ShaderCompileError> {
    let module = naga::front::wgsl::parse_str(source)
        .map_err(|e| ShaderCompileError::new(stage, e.emit_to_string(source)))?;
    Validator::new(ValidationFlags::all(), Capabilities::empty())
        .validate(&module)
        .map_err(|e| ShaderCompileError::new(stage, e.emit_to_string(source)))?;

    let wanted = match stage {
        ShaderStage::Vertex => naga::ShaderStage::Vertex,
        _ => naga::ShaderStage::Fragment,
    };
    let entry = module
        .entry_points
        .iter()
        .find(|ep| ep.stage == wanted)
        .ok_or_else(|| {
            ShaderCompileError::new(stage, format!("no @{stage} entry point found in module"))
        })?;

    let mut inputs = Vec::new();
    for arg in &entry.function.arguments {
        collect_locations(&module, arg.ty, arg.binding.as_ref(), &mut |loc, ty| {
            inputs.push((loc, float_components(&module, ty)));
        });
    }
    let mut outputs = Vec::new();
    if let Some(result) = &entry.function.result {
        collect_locations(&module, result.ty, result.binding.as_ref(), &mut |loc, _| {
            outputs.push(loc);
        });
    }

    let mut uniforms = None;
    let mut stray_bindings = Vec::new();
    for (_, var) in module.global_variables.iter() {
        let Some(rb) = &var.binding else { continue };
        if var.space == AddressSpace::Uniform
            && rb.group == UNIFORM_GROUP
            && rb.binding == UNIFORM_BINDING
        {
            uniforms = Some(reflect_block(&module, var.ty).ok_or_else(|| {
                ShaderCompileError::new(stage, "uniform block at @group(0) @binding(0) must be a struct")
            })?);
        } else {
            stray_bindings.push((rb.group, rb.binding));
        }
    }

    Ok(StageInterface {
        entry: entry.name.clone(),
        inputs,
        outputs,
        uniforms,
        stray_bindings,
    })
}

/// Visit every `@location` binding reachable from an argument or result,
/// descending one level into structs.
fn collect_locations(
    module: &Module,
    ty: Handle<Type>,
    binding: Option<&Binding>,
    visit: &mut dyn FnMut(u32, Handle<Type>),
) {
    match binding {
        Some(Binding::Location { location, .. }) => visit(*location, ty),
        Some(Binding::BuiltIn(_)) => {}
        None => {
            if let TypeInner::Struct { members, .. } = &module.types[ty].inner {
                for m in members {
                    if let Some(Binding::Location { location, .. }) = &m.binding {
                        visit(*location, m.ty);
                    }
                }
            }
        }
    }
}

fn float_components(module: &Module, ty: Handle<Type>) -> Option<u32> {
    match &module.types[ty].inner {
        TypeInner::Scalar(s) if s.kind == ScalarKind::Float => Some(1),
        TypeInner::Vector { size, scalar } if scalar.kind == ScalarKind::Float => {
            Some(*size as u32)
        }
        _ => None,
    }
}

fn reflect_block(module: &Module, ty: Handle<Type>) -> Option<UniformLayout> {
    let TypeInner::Struct { members, span } = &module.types[ty].inner else {
        return None;
    };
    let fields = members
        .iter()
        .map(|m| UniformField {
            name: m.name.clone().unwrap_or_default(),
            offset: m.offset,
            kind: uniform_kind(&module.types[m.ty].inner),
        })
        .collect();
    Some(UniformLayout {
        size: *span,
        fields,
    })
}

fn uniform_kind(inner: &TypeInner) -> UniformKind {
    let is_f32 = |kind: ScalarKind, width: u8| kind == ScalarKind::Float && width == 4;
    match inner {
        TypeInner::Scalar(s) if is_f32(s.kind, s.width) => UniformKind::Scalar,
        TypeInner::Vector { size, scalar } if is_f32(scalar.kind, scalar.width) => match size {
            VectorSize::Bi => UniformKind::Vec2,
            VectorSize::Tri => UniformKind::Vec3,
            VectorSize::Quad => UniformKind::Vec4,
        },
        TypeInner::Matrix {
            columns: VectorSize::Quad,
            rows: VectorSize::Quad,
            scalar,
        } if is_f32(scalar.kind, scalar.width) => UniformKind::Mat4,
        _ => UniformKind::Other,
    }
}

/// Compile both stages and link their interfaces.
pub fn link(vertex_source: &str, fragment_source: &str) -> Result<LinkedProgram, ShaderCompileError> {
    let vs = compile_stage(ShaderStage::Vertex, vertex_source)?;
    let fs = compile_stage(ShaderStage::Fragment, fragment_source)?;

    let link_err = |log: String| ShaderCompileError::new(ShaderStage::Link, log);

    if let Some((group, binding)) = vs.stray_bindings.iter().chain(&fs.stray_bindings).next() {
        return Err(link_err(format!(
            "resource at @group({group}) @binding({binding}) is not supported; \
             only a uniform block at @group(0) @binding(0) can be bound"
        )));
    }

    let uniforms = match (vs.uniforms, fs.uniforms) {
        (Some(a), Some(b)) if a != b => {
            return Err(link_err(
                "uniform block at @group(0) @binding(0) differs between vertex and fragment stages"
                    .to_string(),
            ));
        }
        (Some(a), _) => a,
        (None, Some(b)) => b,
        (None, None) => UniformLayout::default(),
    };

    for (location, _) in &fs.inputs {
        if !vs.outputs.contains(location) {
            return Err(link_err(format!(
                "fragment input @location({location}) is not written by the vertex stage"
            )));
        }
    }

    let position_components = match vs.inputs.iter().find(|(loc, _)| *loc == 0) {
        Some((_, Some(n @ (2 | 3)))) => *n,
        Some(_) => {
            return Err(link_err(
                "vertex input @location(0) must be vec2<f32> or vec3<f32>".to_string(),
            ));
        }
        None => {
            return Err(link_err(
                "vertex stage does not read a position at @location(0)".to_string(),
            ));
        }
    };

    Ok(LinkedProgram {
        vertex_source: vertex_source.to_string(),
        fragment_source: fragment_source.to_string(),
        interface: ProgramInterface {
            vertex_entry: vs.entry,
            fragment_entry: fs.entry,
            position_components,
            uniforms,
        },
    })
}

/// A linked, backend-resident shader program.
#[derive(Debug)]
pub struct ShaderProgram<P> {
    handle: P,
    interface: ProgramInterface,
    uniforms: UniformBlock,
}

impl<P> ShaderProgram<P> {
    /// Compile, link and upload a vertex/fragment pair.
    pub fn create<B>(backend: &mut B, vertex_source: &str, fragment_source: &str) -> Result<Self, RenderError>
    where
        B: GraphicsBackend<Program = P>,
    {
        let linked = link(vertex_source, fragment_source)?;
        let handle = backend.create_program(&linked)?;
        tracing::info!(
            vertex_entry = %linked.interface.vertex_entry,
            fragment_entry = %linked.interface.fragment_entry,
            uniform_bytes = linked.interface.uniforms.size,
            "shader program linked"
        );
        let uniforms = UniformBlock::new(linked.interface.uniforms.clone());
        Ok(Self {
            handle,
            interface: linked.interface,
            uniforms,
        })
    }

    pub fn handle(&self) -> &P {
        &self.handle
    }

    pub fn interface(&self) -> &ProgramInterface {
        &self.interface
    }

    pub fn uniform_location(&self, name: &str) -> UniformLocation {
        self.interface.uniforms.location(name)
    }

    pub fn uniforms(&self) -> &UniformBlock {
        &self.uniforms
    }

    pub fn set_mat4(&mut self, location: UniformLocation, value: &Mat4) {
        self.uniforms.set_mat4(location, value);
    }

    pub fn set_vec3(&mut self, location: UniformLocation, value: Vec3) {
        self.uniforms.set_vec3(location, value);
    }

    pub fn into_handle(self) -> P {
        self.handle
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::DebugTextBackend;
    use crate::shaders::{COLOR_FRAGMENT_SHADER, FLAT_VERTEX_SHADER, SPATIAL_VERTEX_SHADER};

    #[test]
    fn bundled_pair_links() {
        let linked = link(FLAT_VERTEX_SHADER, COLOR_FRAGMENT_SHADER).unwrap();
        let iface = &linked.interface;
        assert_eq!(iface.vertex_entry, "vs_main");
        assert_eq!(iface.fragment_entry, "fs_main");
        assert_eq!(iface.position_components, 2);
        // 3 * mat4 + vec3, rounded up to 16-byte alignment.
        assert_eq!(iface.uniforms.size, 208);

        let spatial = link(SPATIAL_VERTEX_SHADER, COLOR_FRAGMENT_SHADER).unwrap();
        assert_eq!(spatial.interface.position_components, 3);
    }

    #[test]
    fn pair_without_uniform_block_links_empty() {
        let vertex = r#"
            @vertex
            fn vs_main(@location(0) p: vec2<f32>) -> @builtin(position) vec4<f32> {
                return vec4<f32>(p, 0.0, 1.0);
            }
        "#;
        let fragment = r#"
            @fragment
            fn fs_main() -> @location(0) vec4<f32> {
                return vec4<f32>(1.0, 1.0, 1.0, 1.0);
            }
        "#;
        let linked = link(vertex, fragment).unwrap();
        assert_eq!(linked.interface.uniforms.size, 0);
        assert!(linked.interface.uniforms.fields.is_empty());
    }

    #[test]
    fn reflected_uniform_offsets() {
        let linked = link(FLAT_VERTEX_SHADER, COLOR_FRAGMENT_SHADER).unwrap();
        let u = &linked.interface.uniforms;
        let offset = |name: &str| u.field(u.location(name)).map(|f| (f.offset, f.kind));
        assert_eq!(offset("model"), Some((0, UniformKind::Mat4)));
        assert_eq!(offset("view"), Some((64, UniformKind::Mat4)));
        assert_eq!(offset("projection"), Some((128, UniformKind::Mat4)));
        assert_eq!(offset("color"), Some((192, UniformKind::Vec3)));
    }

    #[test]
    fn empty_source_fails_with_diagnostic() {
        let err = link("", COLOR_FRAGMENT_SHADER).unwrap_err();
        assert_eq!(err.stage, ShaderStage::Vertex);
        assert!(!err.log.is_empty());
    }

    #[test]
    fn malformed_source_fails_with_diagnostic() {
        let err = link(FLAT_VERTEX_SHADER, "@fragment fn fs_main( -> {").unwrap_err();
        assert_eq!(err.stage, ShaderStage::Fragment);
        assert!(!err.log.trim().is_empty());
    }

    #[test]
    fn type_error_is_a_compile_error() {
        let bad = r#"
            @vertex
            fn vs_main(@location(0) p: vec2<f32>) -> @builtin(position) vec4<f32> {
                let x: f32 = p;
                return vec4<f32>(p, 0.0, 1.0);
            }
        "#;
        let err = link(bad, COLOR_FRAGMENT_SHADER).unwrap_err();
        assert_eq!(err.stage, ShaderStage::Vertex);
    }

    #[test]
    fn mismatched_uniform_blocks_fail_to_link() {
        let fragment = r#"
            struct Other {
                color: vec3<f32>,
            };
            @group(0) @binding(0)
            var<uniform> u: Other;

            @fragment
            fn fs_main() -> @location(0) vec4<f32> {
                return vec4<f32>(u.color, 1.0);
            }
        "#;
        let err = link(FLAT_VERTEX_SHADER, fragment).unwrap_err();
        assert_eq!(err.stage, ShaderStage::Link);
        assert!(err.log.contains("differs"));
    }

    #[test]
    fn unwritten_fragment_input_fails_to_link() {
        let fragment = r#"
            @fragment
            fn fs_main(@location(3) tint: vec3<f32>) -> @location(0) vec4<f32> {
                return vec4<f32>(tint, 1.0);
            }
        "#;
        let err = link(FLAT_VERTEX_SHADER, fragment).unwrap_err();
        assert_eq!(err.stage, ShaderStage::Link);
        assert!(err.log.contains("@location(3)"));
    }

    #[test]
    fn unknown_uniform_is_silently_ignored() {
        let mut backend = DebugTextBackend::new();
        let mut program =
            ShaderProgram::create(&mut backend, FLAT_VERTEX_SHADER, COLOR_FRAGMENT_SHADER).unwrap();

        let missing = program.uniform_location("colour");
        assert_eq!(missing, UniformLocation::NOT_FOUND);

        let before = program.uniforms().bytes().to_vec();
        program.set_vec3(missing, Vec3::ONE);
        program.set_mat4(missing, &Mat4::IDENTITY);
        assert_eq!(program.uniforms().bytes(), &before[..]);
    }

    #[test]
    fn uniform_writes_land_at_reflected_offsets() {
        let mut backend = DebugTextBackend::new();
        let mut program =
            ShaderProgram::create(&mut backend, FLAT_VERTEX_SHADER, COLOR_FRAGMENT_SHADER).unwrap();

        let view = program.uniform_location("view");
        let color = program.uniform_location("color");
        let m = Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0));
        program.set_mat4(view, &m);
        program.set_vec3(color, Vec3::new(0.5, 0.25, 1.0));

        assert_eq!(program.uniforms().mat4(view), Some(m));
        assert_eq!(program.uniforms().vec3(color), Some(Vec3::new(0.5, 0.25, 1.0)));
        // Kind mismatch is ignored.
        program.set_vec3(view, Vec3::ZERO);
        assert_eq!(program.uniforms().mat4(view), Some(m));
    }

    #[test]
    fn create_reports_compile_errors_before_touching_backend() {
        let mut backend = DebugTextBackend::new();
        let err = ShaderProgram::create(&mut backend, "not wgsl", COLOR_FRAGMENT_SHADER).unwrap_err();
        assert!(matches!(err, RenderError::ShaderCompile(_)));
        assert_eq!(backend.live_programs(), 0);
    }
}
