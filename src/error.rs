use std::path::PathBuf;

use thiserror::Error;

use crate::datatypes::TagKind;

pub type Result<T> = std::result::Result<T, FemkitError>;

#[derive(Debug, Error)]
pub enum FemkitError {
    #[error("Mesh format `{format}` not recognized. {hint}")]
    UnsupportedFormat { format: String, hint: &'static str },

    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("Dataset `{dataset}` not found in {}", file.display())]
    DatasetNotFound { file: PathBuf, dataset: String },

    #[error("Parse error in {}: {message}", file.display())]
    Parse { file: PathBuf, message: String },

    /// Only surfaces where a tag source is required; the lenient readers
    /// fall back to zero tags instead.
    #[error("Missing companion file {}", .0.display())]
    MissingCompanionFile(PathBuf),

    #[error("Tag type mismatch in {}: expected {expected}, found `{found}`", file.display())]
    TagTypeMismatch {
        file: PathBuf,
        expected: TagKind,
        found: String,
    },

    #[error("Missing parameter `{0}`")]
    MissingParameter(String),

    #[error("Invalid mesh: {0}")]
    InvalidMesh(String),

    #[error("Mesher error: {0}")]
    Mesher(String),

    #[error("Git error: {0}")]
    Git(String),

    #[error("Invalid path {}: {reason}", path.display())]
    InvalidPath { path: PathBuf, reason: String },

    #[error(transparent)]
    Regex(#[from] regex::Error),

    #[error(transparent)]
    Hdf5(#[from] hdf5::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Xml(#[from] quick_xml::Error),
}

impl FemkitError {
    pub(crate) fn unsupported_format(format: impl Into<String>, hint: &'static str) -> Self {
        FemkitError::UnsupportedFormat {
            format: format.into(),
            hint,
        }
    }

    pub(crate) fn parse(file: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        FemkitError::Parse {
            file: file.into(),
            message: message.into(),
        }
    }

    pub(crate) fn dataset_not_found(file: impl Into<PathBuf>, dataset: impl Into<String>) -> Self {
        FemkitError::DatasetNotFound {
            file: file.into(),
            dataset: dataset.into(),
        }
    }
}
