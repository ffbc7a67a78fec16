use crate::error::RenderError;
use crate::renderer::GraphicsBackend;

/// Position attribute shape at `@location(0)`: 2 or 3 tightly packed floats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AttributeLayout {
    components: u32,
}

impl AttributeLayout {
    pub const FLAT: Self = Self { components: 2 };
    pub const SPATIAL: Self = Self { components: 3 };

    pub fn new(components: u32) -> Result<Self, RenderError> {
        match components {
            2 | 3 => Ok(Self { components }),
            n => Err(RenderError::InvalidGeometry(format!(
                "position must have 2 or 3 components, got {n}"
            ))),
        }
    }

    pub fn components(&self) -> u32 {
        self.components
    }

    /// Byte distance between consecutive vertices.
    pub fn stride(&self) -> u64 {
        u64::from(self.components) * std::mem::size_of::<f32>() as u64
    }
}

/// CPU-side mesh: raw positions plus triangle-list indices.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshData {
    pub vertices: Vec<f32>,
    pub indices: Vec<u32>,
    pub layout: AttributeLayout,
}

impl MeshData {
    pub fn new(vertices: Vec<f32>, indices: Vec<u32>, layout: AttributeLayout) -> Self {
        Self {
            vertices,
            indices,
            layout,
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len() / self.layout.components as usize
    }

    /// Check the upload invariants: whole vertices, whole triangles, and every
    /// index in range.
    pub fn validate(&self) -> Result<(), RenderError> {
        let n = self.layout.components as usize;
        if self.vertices.is_empty() || self.vertices.len() % n != 0 {
            return Err(RenderError::InvalidGeometry(format!(
                "{} floats do not form whole {n}-component vertices",
                self.vertices.len()
            )));
        }
        if self.indices.is_empty() || self.indices.len() % 3 != 0 {
            return Err(RenderError::InvalidGeometry(format!(
                "{} indices do not form whole triangles",
                self.indices.len()
            )));
        }
        let count = self.vertex_count();
        if let Some(bad) = self.indices.iter().find(|&&i| i as usize >= count) {
            return Err(RenderError::InvalidGeometry(format!(
                "index {bad} out of range for {count} vertices"
            )));
        }
        Ok(())
    }

    /// Single triangle `{(0,0), (0.5,1), (1,0)}`.
    pub fn triangle() -> Self {
        Self::new(
            vec![0.0, 0.0, 0.5, 1.0, 1.0, 0.0],
            vec![0, 1, 2],
            AttributeLayout::FLAT,
        )
    }

    /// Two triangles mirrored through the origin.
    pub fn two_triangles() -> Self {
        #[rustfmt::skip]
        let vertices = vec![
            0.0, 0.0,
            0.5, 1.0,
            1.0, 0.0,

            0.0, 0.0,
            -0.5, -1.0,
            -1.0, 0.0,
        ];
        Self::new(vertices, vec![0, 1, 2, 3, 4, 5], AttributeLayout::FLAT)
    }

    /// 10x10 floor quad half a unit below the origin.
    pub fn floor() -> Self {
        #[rustfmt::skip]
        let vertices = vec![
            -5.0, -0.5,  5.0, // 0
             5.0, -0.5,  5.0, // 1
             5.0, -0.5, -5.0, // 2
            -5.0, -0.5, -5.0, // 3
        ];
        Self::new(vertices, vec![0, 1, 3, 3, 1, 2], AttributeLayout::SPATIAL)
    }
}

/// Uploaded, immutable geometry ready to bind and draw.
#[derive(Debug)]
pub struct GeometryBuffer<G> {
    handle: G,
    layout: AttributeLayout,
    vertex_count: u32,
    index_count: u32,
}

impl<G> GeometryBuffer<G> {
    pub fn upload<B>(backend: &mut B, mesh: &MeshData) -> Result<Self, RenderError>
    where
        B: GraphicsBackend<Geometry = G>,
    {
        mesh.validate()?;
        let handle = backend.upload_geometry(mesh)?;
        let buffer = Self {
            handle,
            layout: mesh.layout,
            vertex_count: mesh.vertex_count() as u32,
            index_count: mesh.indices.len() as u32,
        };
        tracing::info!(
            vertices = buffer.vertex_count,
            indices = buffer.index_count,
            components = buffer.layout.components,
            "geometry uploaded"
        );
        Ok(buffer)
    }

    pub fn handle(&self) -> &G {
        &self.handle
    }

    pub fn layout(&self) -> AttributeLayout {
        self.layout
    }

    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }

    pub fn index_count(&self) -> u32 {
        self.index_count
    }

    pub fn into_handle(self) -> G {
        self.handle
    }
}
