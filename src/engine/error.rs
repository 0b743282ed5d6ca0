use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ImportError {
    #[error("failed to read '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("glTF error: {0}")]
    Gltf(#[from] gltf::Error),
    #[error("no importer registered for '{0}'")]
    UnsupportedFormat(PathBuf),
    #[error("invalid scene: {0}")]
    InvalidScene(String),
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum SkeletonError {
    #[error("bone '{0}' is not part of the skeleton")]
    UnknownBone(String),
    #[error("bone '{0}' is already part of the skeleton")]
    DuplicateBone(String),
}

#[derive(Error, Debug)]
pub enum TextureError {
    #[error("failed to read texture '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to decode texture: {0}")]
    Decode(#[from] image::ImageError),
    #[error("texel buffer holds {actual} bytes, {expected} expected")]
    TexelSize { expected: usize, actual: usize },
    #[error(transparent)]
    Upload(#[from] RenderError),
}

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("failed to create {object}: {message}")]
    ObjectCreation { object: &'static str, message: String },
    #[error("shader compile error: {0}")]
    ShaderCompile(String),
    #[error("shader program link error: {0}")]
    ProgramLink(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("error loading model '{path}': {source}")]
    Import {
        path: PathBuf,
        #[source]
        source: ImportError,
    },
    #[error(transparent)]
    Render(#[from] RenderError),
}
