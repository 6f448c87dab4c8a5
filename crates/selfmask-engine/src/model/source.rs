use std::collections::HashMap;
use std::path::{Path, PathBuf};

use super::description::ModelDescription;
use super::error::ModelLoadError;

/// Resolves a description-source identifier into a robot description.
pub trait ModelSource {
    fn resolve(&self, id: &str) -> Result<ModelDescription, ModelLoadError>;
}

impl<T: ModelSource + ?Sized> ModelSource for &T {
    fn resolve(&self, id: &str) -> Result<ModelDescription, ModelLoadError> {
        (**self).resolve(id)
    }
}

/// Descriptions held in memory, keyed by identifier.
#[derive(Debug, Default, Clone)]
pub struct InMemoryModelSource {
    models: HashMap<String, ModelDescription>,
}

impl InMemoryModelSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, id: impl Into<String>, description: ModelDescription) -> Self {
        self.insert(id, description);
        self
    }

    pub fn insert(&mut self, id: impl Into<String>, description: ModelDescription) {
        self.models.insert(id.into(), description);
    }
}

impl ModelSource for InMemoryModelSource {
    fn resolve(&self, id: &str) -> Result<ModelDescription, ModelLoadError> {
        self.models
            .get(id)
            .cloned()
            .ok_or_else(|| ModelLoadError::NotFound(id.to_string()))
    }
}

/// Reads `<root>/<id>.toml` for each identifier.
#[derive(Debug, Clone)]
pub struct DirectoryModelSource {
    root: PathBuf,
}

impl DirectoryModelSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path_for(&self, id: &str) -> PathBuf {
        self.root.join(format!("{id}.toml"))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl ModelSource for DirectoryModelSource {
    fn resolve(&self, id: &str) -> Result<ModelDescription, ModelLoadError> {
        let path = self.path_for(id);
        let content = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ModelLoadError::NotFound(id.to_string()));
            }
            Err(source) => return Err(ModelLoadError::Io { path, source }),
        };
        ModelDescription::from_toml_str(&content).map_err(|e| ModelLoadError::Parse {
            model: id.to_string(),
            message: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_memory_reports_missing_ids() {
        let src = InMemoryModelSource::new().with("robot", ModelDescription::default());
        assert!(src.resolve("robot").is_ok());
        assert!(matches!(src.resolve("other"), Err(ModelLoadError::NotFound(id)) if id == "other"));
    }

    #[test]
    fn directory_source_reads_and_parses_files() {
        let dir = std::env::temp_dir().join(format!("selfmask-models-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join("arm.toml"),
            "[[links]]\nname = \"base\"\n[[links.visuals]]\ngeometry = { type = \"sphere\", radius = 0.1 }\n",
        )
        .unwrap();
        std::fs::write(dir.join("broken.toml"), "links = 3").unwrap();

        let src = DirectoryModelSource::new(&dir);
        let d = src.resolve("arm").unwrap();
        assert_eq!(d.links[0].name, "base");
        assert!(matches!(src.resolve("broken"), Err(ModelLoadError::Parse { .. })));
        assert!(matches!(src.resolve("missing"), Err(ModelLoadError::NotFound(_))));

        std::fs::remove_dir_all(&dir).ok();
    }
}
