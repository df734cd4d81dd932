//! Error type shared by the music crate.

#[derive(Debug, thiserror::Error)]
pub enum MusicError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("failed to parse config: {0}")]
    ConfigParse(#[from] toml::de::Error),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("audio output unavailable: {0}")]
    AudioDevice(String),
}

pub type Result<T> = std::result::Result<T, MusicError>;
