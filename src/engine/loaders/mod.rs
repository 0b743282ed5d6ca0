pub mod gltf_loader;
pub mod post_process;
pub mod scene;

use std::path::Path;

use crate::engine::config::ImportSettings;
use crate::engine::error::ImportError;

pub use gltf_loader::GltfImporter;
pub use scene::*;

/// Reads a model file into an [`ImportedScene`].
///
/// Implementations run the configured post-processing steps before returning.
pub trait SceneImporter {
    fn read_file(&self, path: &Path, settings: &ImportSettings) -> Result<ImportedScene, ImportError>;
}

/// Picks an importer from the file extension.
pub fn importer_for_path(path: &Path) -> Result<Box<dyn SceneImporter>, ImportError> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);

    match extension.as_deref() {
        Some("gltf") | Some("glb") => Ok(Box::new(GltfImporter)),
        _ => Err(ImportError::UnsupportedFormat(path.to_path_buf())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gltf_extensions_are_recognised() {
        assert!(importer_for_path(Path::new("models/fox.gltf")).is_ok());
        assert!(importer_for_path(Path::new("models/FOX.GLB")).is_ok());
    }

    #[test]
    fn unknown_extension_is_rejected() {
        match importer_for_path(Path::new("models/fox.fbx")) {
            Err(ImportError::UnsupportedFormat(path)) => assert_eq!(path, Path::new("models/fox.fbx")),
            other => panic!("unexpected result: {:?}", other.map(|_| ())),
        }
    }
}
