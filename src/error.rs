use std::{fmt::Display, path::PathBuf};

#[derive(Debug)]
pub enum Error {
    /// Audio input that cannot be used, e.g. an unsupported sample width.
    Format(String),
    Io {
        path: Option<PathBuf>,
        error: std::io::Error,
    },
    Json {
        path: Option<PathBuf>,
        error: serde_json::Error,
    },
    /// A VMD container that could not be decoded.
    InvalidVmd(String),
    /// Option values that make the pipeline meaningless.
    Config(String),
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, error: std::io::Error) -> Self {
        Self::Io {
            path: Some(path.into()),
            error,
        }
    }

    pub(crate) fn json(path: impl Into<PathBuf>, error: serde_json::Error) -> Self {
        Self::Json {
            path: Some(path.into()),
            error,
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Format(v) => write!(f, "Unsupported audio format: {v}"),
            Self::Io {
                path: Some(path),
                error,
            } => write!(f, "I/O failure on {}: {error}", path.display()),
            Self::Io { path: None, error } => write!(f, "I/O failure: {error}"),
            Self::Json {
                path: Some(path),
                error,
            } => write!(f, "Invalid JSON in {}: {error}", path.display()),
            Self::Json { path: None, error } => write!(f, "Invalid JSON: {error}"),
            Self::InvalidVmd(v) => write!(f, "Invalid VMD data: {v}"),
            Self::Config(v) => write!(f, "Invalid configuration: {v}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { error, .. } => Some(error),
            Self::Json { error, .. } => Some(error),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Self {
        Self::Io { path: None, error }
    }
}

impl From<serde_json::Error> for Error {
    fn from(error: serde_json::Error) -> Self {
        Self::Json { path: None, error }
    }
}

impl From<hound::Error> for Error {
    fn from(value: hound::Error) -> Self {
        match value {
            hound::Error::IoError(error) => Self::Io { path: None, error },
            e => Self::Format(e.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
