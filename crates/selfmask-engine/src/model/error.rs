use std::fmt;
use std::path::PathBuf;

/// Why a model could not be loaded. Never fatal: the model is skipped.
#[derive(Debug)]
pub enum ModelLoadError {
    /// The source has no description under this identifier.
    NotFound(String),
    Io { path: PathBuf, source: std::io::Error },
    Parse { model: String, message: String },
    /// The description resolved but contains no renderable geometry.
    Empty(String),
    InvalidMesh { model: String, link: String, reason: String },
}

impl fmt::Display for ModelLoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelLoadError::NotFound(id) => write!(f, "no robot description found for '{id}'"),
            ModelLoadError::Io { path, source } => {
                write!(f, "cannot read robot description {}: {source}", path.display())
            }
            ModelLoadError::Parse { model, message } => {
                write!(f, "robot description '{model}' is malformed: {message}")
            }
            ModelLoadError::Empty(id) => write!(f, "robot description '{id}' is empty"),
            ModelLoadError::InvalidMesh { model, link, reason } => {
                write!(f, "model '{model}', link '{link}': invalid mesh: {reason}")
            }
        }
    }
}

impl std::error::Error for ModelLoadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ModelLoadError::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}
