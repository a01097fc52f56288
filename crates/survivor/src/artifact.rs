//! Artifact resolution and deserialization.
//!
//! Names are resolved under a trusted models directory. Containment is checked
//! on canonical paths, so `..` segments, absolute names and symlinks pointing
//! outside the directory are all rejected.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::models::ModelSpec;
use crate::predictor::LoadedModel;

#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("Model '{name}' resolves outside the models directory")]
    PathTraversal { name: String },

    #[error("Model '{name}' not found")]
    NotFound { name: String },

    #[error("Corrupt artifact {}: {reason}", path.display())]
    CorruptArtifact { path: PathBuf, reason: String },

    #[error("Failed to read artifact {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ArtifactError {
    /// True for failures that mean "no such artifact" rather than "bad artifact".
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::PathTraversal { .. } | Self::NotFound { .. })
    }
}

/// Turns an artifact file into a loaded model.
pub trait ArtifactFormat: Send + Sync + 'static {
    fn deserialize(&self, name: &str, path: &Path) -> Result<LoadedModel, ArtifactError>;
}

/// JSON documents describing one of the built-in model families.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonArtifactFormat;

impl ArtifactFormat for JsonArtifactFormat {
    fn deserialize(&self, name: &str, path: &Path) -> Result<LoadedModel, ArtifactError> {
        let corrupt = |reason: String| ArtifactError::CorruptArtifact {
            path: path.to_path_buf(),
            reason,
        };

        let bytes = fs::read(path).map_err(|source| ArtifactError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let spec: ModelSpec =
            serde_json::from_slice(&bytes).map_err(|e| corrupt(e.to_string()))?;
        spec.build(name).map_err(corrupt)
    }
}

/// Resolves artifact names under a trusted root and deserializes them.
#[derive(Clone)]
pub struct ArtifactLoader {
    root: PathBuf,
    format: Arc<dyn ArtifactFormat>,
}

impl std::fmt::Debug for ArtifactLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArtifactLoader")
            .field("root", &self.root)
            .finish_non_exhaustive()
    }
}

impl ArtifactLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            format: Arc::new(JsonArtifactFormat),
        }
    }

    pub fn with_format(mut self, format: Arc<dyn ArtifactFormat>) -> Self {
        self.format = format;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve `name` to a canonical path inside the root.
    ///
    /// The root is canonicalized on every call so a models directory created
    /// or replaced after startup is picked up.
    pub fn resolve(&self, name: &str) -> Result<PathBuf, ArtifactError> {
        let not_found = || ArtifactError::NotFound {
            name: name.to_string(),
        };

        let root = self.root.canonicalize().map_err(|e| {
            tracing::warn!(root = %self.root.display(), error = %e, "Models directory is not accessible");
            not_found()
        })?;

        let candidate = root.join(name);
        let resolved = match candidate.canonicalize() {
            Ok(p) => p,
            Err(_) => {
                // Report escapes even when the target does not exist.
                if !lexically_contained(&root, &candidate) {
                    return Err(ArtifactError::PathTraversal {
                        name: name.to_string(),
                    });
                }
                return Err(not_found());
            }
        };

        if !resolved.starts_with(&root) {
            return Err(ArtifactError::PathTraversal {
                name: name.to_string(),
            });
        }
        if !resolved.is_file() {
            return Err(not_found());
        }

        Ok(resolved)
    }

    /// Deserialize the artifact at `path`. Blocking; run it on the worker pool.
    pub fn load(&self, name: &str, path: &Path) -> Result<LoadedModel, ArtifactError> {
        self.format.deserialize(name, path)
    }
}

/// Containment check for paths that cannot be canonicalized, folding `.` and
/// `..` segments without touching the filesystem.
fn lexically_contained(root: &Path, candidate: &Path) -> bool {
    use std::path::Component;

    let mut normalized = PathBuf::new();
    for component in candidate.components() {
        match component {
            Component::ParentDir => {
                normalized.pop();
            }
            Component::CurDir => {}
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized.starts_with(root)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const CONSTANT: &str = r#"{"kind": "Constant", "label": 1, "scores": [0.1, 0.9]}"#;

    /// Layout: <tmp>/models/fake.json and <tmp>/secrets outside the root.
    fn setup() -> (TempDir, ArtifactLoader) {
        let tmp = TempDir::new().unwrap();
        let models = tmp.path().join("models");
        fs::create_dir(&models).unwrap();
        fs::write(models.join("fake.json"), CONSTANT).unwrap();
        fs::write(tmp.path().join("secrets"), CONSTANT).unwrap();
        let loader = ArtifactLoader::new(&models);
        (tmp, loader)
    }

    #[test]
    fn resolves_file_inside_root() {
        let (_tmp, loader) = setup();
        let path = loader.resolve("fake.json").unwrap();
        assert!(path.is_absolute());
        assert!(path.starts_with(loader.root().canonicalize().unwrap()));
    }

    #[test]
    fn rejects_parent_escape() {
        let (_tmp, loader) = setup();
        let err = loader.resolve("../secrets").unwrap_err();
        assert!(matches!(err, ArtifactError::PathTraversal { .. }), "{err:?}");
        assert!(err.is_not_found());
    }

    #[test]
    fn rejects_escape_to_missing_file() {
        let (_tmp, loader) = setup();
        let err = loader.resolve("../../nowhere.json").unwrap_err();
        assert!(matches!(err, ArtifactError::PathTraversal { .. }), "{err:?}");
    }

    #[test]
    fn rejects_absolute_name() {
        let (tmp, loader) = setup();
        let absolute = tmp.path().join("secrets");
        let err = loader.resolve(absolute.to_str().unwrap()).unwrap_err();
        assert!(matches!(err, ArtifactError::PathTraversal { .. }), "{err:?}");
    }

    #[cfg(unix)]
    #[test]
    fn rejects_symlink_out_of_root() {
        let (tmp, loader) = setup();
        std::os::unix::fs::symlink(tmp.path().join("secrets"), loader.root().join("link.json"))
            .unwrap();
        let err = loader.resolve("link.json").unwrap_err();
        assert!(matches!(err, ArtifactError::PathTraversal { .. }), "{err:?}");
    }

    #[test]
    fn missing_file_is_not_found() {
        let (_tmp, loader) = setup();
        let err = loader.resolve("missing.bin").unwrap_err();
        assert!(matches!(err, ArtifactError::NotFound { .. }), "{err:?}");
        assert_eq!(err.to_string(), "Model 'missing.bin' not found");
    }

    #[test]
    fn directory_is_not_an_artifact() {
        let (_tmp, loader) = setup();
        fs::create_dir(loader.root().join("nested")).unwrap();
        assert!(matches!(
            loader.resolve("nested"),
            Err(ArtifactError::NotFound { .. })
        ));
        assert!(matches!(
            loader.resolve("."),
            Err(ArtifactError::NotFound { .. })
        ));
    }

    #[test]
    fn missing_root_is_not_found() {
        let tmp = TempDir::new().unwrap();
        let loader = ArtifactLoader::new(tmp.path().join("absent"));
        assert!(matches!(
            loader.resolve("fake.json"),
            Err(ArtifactError::NotFound { .. })
        ));
    }

    #[test]
    fn loads_valid_artifact() {
        let (_tmp, loader) = setup();
        let path = loader.resolve("fake.json").unwrap();
        let model = loader.load("fake.json", &path).unwrap();
        assert_eq!(model.name(), "fake.json");
        assert_eq!(model.kind(), "Constant");
        assert!(model.predictor().has_confidence());
    }

    #[test]
    fn garbage_is_corrupt() {
        let (_tmp, loader) = setup();
        fs::write(loader.root().join("broken.json"), b"\x00not json").unwrap();
        let path = loader.resolve("broken.json").unwrap();
        let err = loader.load("broken.json", &path).unwrap_err();
        assert!(matches!(err, ArtifactError::CorruptArtifact { .. }), "{err:?}");
        assert!(!err.is_not_found());
    }

    #[test]
    fn invalid_parameters_are_corrupt() {
        let (_tmp, loader) = setup();
        fs::write(
            loader.root().join("bad.json"),
            r#"{"kind": "Constant", "label": 7}"#,
        )
        .unwrap();
        let path = loader.resolve("bad.json").unwrap();
        let err = loader.load("bad.json", &path).unwrap_err();
        assert!(err.to_string().contains("constant label must be 0 or 1"));
    }

    #[test]
    fn custom_format_is_used() {
        struct Rejecting;
        impl ArtifactFormat for Rejecting {
            fn deserialize(&self, _name: &str, path: &Path) -> Result<LoadedModel, ArtifactError> {
                Err(ArtifactError::CorruptArtifact {
                    path: path.to_path_buf(),
                    reason: "unsupported".to_string(),
                })
            }
        }

        let (_tmp, loader) = setup();
        let loader = loader.with_format(Arc::new(Rejecting));
        let path = loader.resolve("fake.json").unwrap();
        assert!(loader.load("fake.json", &path).is_err());
    }
}
