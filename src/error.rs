use thiserror::Error;

#[derive(Debug, Error)]
pub enum FilecryptError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid encrypted file: {reason}")]
    Format { reason: String },

    /// Wrong password, tampering and corruption are reported identically.
    #[error("MAC hash is corrupt: wrong password or damaged file")]
    Authentication,

    #[error("Crypto error: {0}")]
    Crypto(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("TOML serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("TOML deserialization error: {0}")]
    TomlDe(#[from] toml::de::Error),
}

/// Coarse classification of a [`FilecryptError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Format,
    Authentication,
    Io,
    Other,
}

impl FilecryptError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            FilecryptError::Format { .. } => ErrorKind::Format,
            FilecryptError::Authentication => ErrorKind::Authentication,
            FilecryptError::Io(_) => ErrorKind::Io,
            _ => ErrorKind::Other,
        }
    }

    pub(crate) fn format(reason: impl Into<String>) -> Self {
        FilecryptError::Format {
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, FilecryptError>;
