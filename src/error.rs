use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlayerError {
    /// No usable audio output engine. There is no degraded mode without one.
    #[error("audio engine unavailable: {0}")]
    EngineUnavailable(#[from] rodio::StreamError),

    #[error("failed to create playback sink: {0}")]
    Sink(#[from] rodio::PlayError),

    #[error("output device not found: {0}")]
    DeviceNotFound(String),

    #[error("failed to open {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to decode {path:?}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: rodio::decoder::DecoderError,
    },

    #[error("failed to probe {path:?}: {source}")]
    Probe {
        path: PathBuf,
        #[source]
        source: symphonia::core::errors::Error,
    },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("no track loaded")]
    NoTrack,
}

impl From<serde_json::Error> for PlayerError {
    fn from(err: serde_json::Error) -> Self {
        PlayerError::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PlayerError>;
