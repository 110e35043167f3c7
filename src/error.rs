use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoryworldError {
    #[error("character not found: {0}")]
    CharacterNotFound(String),

    #[error("remote unavailable ({target}): {source}")]
    RemoteUnavailable {
        target: String,
        source: reqwest::Error,
    },

    #[error("remote rejected request ({target}): HTTP {status}")]
    RemoteRejected { target: String, status: u16 },

    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid description file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_yaml_ng::Error,
    },

    #[error("config error: {0}")]
    Config(String),

    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl StoryworldError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// True for failures talking to a remote source (listing, snapshot, download).
    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            Self::RemoteUnavailable { .. } | Self::RemoteRejected { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, StoryworldError>;
