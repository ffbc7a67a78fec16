use crate::geometry::MeshData;
use crate::shaders::{COLOR_FRAGMENT_SHADER, FLAT_VERTEX_SHADER, SPATIAL_VERTEX_SHADER};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A mesh plus the shader pair that draws it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenePreset {
    Triangle,
    TwoTriangles,
    #[default]
    Floor,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown scene {0:?} (expected triangle, two_triangles or floor)")]
pub struct UnknownScene(pub String);

impl ScenePreset {
    pub const ALL: [ScenePreset; 3] = [Self::Triangle, Self::TwoTriangles, Self::Floor];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Triangle => "triangle",
            Self::TwoTriangles => "two_triangles",
            Self::Floor => "floor",
        }
    }

    pub fn mesh(&self) -> MeshData {
        match self {
            Self::Triangle => MeshData::triangle(),
            Self::TwoTriangles => MeshData::two_triangles(),
            Self::Floor => MeshData::floor(),
        }
    }

    /// `(vertex, fragment)` WGSL sources.
    pub fn shader_sources(&self) -> (&'static str, &'static str) {
        match self {
            Self::Triangle | Self::TwoTriangles => (FLAT_VERTEX_SHADER, COLOR_FRAGMENT_SHADER),
            Self::Floor => (SPATIAL_VERTEX_SHADER, COLOR_FRAGMENT_SHADER),
        }
    }
}

impl fmt::Display for ScenePreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ScenePreset {
    type Err = UnknownScene;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let norm = s.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|p| p.name() == norm)
            .ok_or_else(|| UnknownScene(s.to_string()))
    }
}
