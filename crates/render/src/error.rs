use std::fmt;

/// Pipeline step a shader diagnostic came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
    Link,
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ShaderStage::Vertex => "vertex",
            ShaderStage::Fragment => "fragment",
            ShaderStage::Link => "link",
        })
    }
}

/// Compile or link failure with the compiler's diagnostic text. `log` is never empty.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{stage} stage failed:\n{log}")]
pub struct ShaderCompileError {
    pub stage: ShaderStage,
    pub log: String,
}

impl ShaderCompileError {
    pub fn new(stage: ShaderStage, log: impl Into<String>) -> Self {
        let log = log.into();
        let log = if log.trim().is_empty() {
            format!("{stage} stage failed without a diagnostic")
        } else {
            log
        };
        Self { stage, log }
    }
}

/// Errors from building or driving the render core.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error(transparent)]
    ShaderCompile(#[from] ShaderCompileError),
    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),
    #[error(
        "program reads {program}-component positions but geometry provides {geometry}-component positions"
    )]
    LayoutMismatch { program: u32, geometry: u32 },
    #[error("graphics context unavailable: {0}")]
    ContextUnavailable(String),
    #[error("surface error: {0}")]
    Surface(String),
}

/// Errors from loading or validating a session configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}
