use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NutriWaveError {
    #[error("could not access '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not parse JSON '{}': {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("could not serialize record: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("could not read table: {0}")]
    Csv(#[from] csv::Error),

    #[error("invalid record: {0}")]
    InvalidRecord(String),

    #[error("catalog has no {0}")]
    EmptyCatalog(&'static str),

    #[error("unknown record kind '{0}'")]
    UnknownKind(String),
}

impl NutriWaveError {
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    pub fn json(path: impl AsRef<Path>, source: serde_json::Error) -> Self {
        Self::Json {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}

pub type Result<T, E = NutriWaveError> = std::result::Result<T, E>;
