use thiserror::Error;

/// Status reported by the storage engine alongside an [`Error::Engine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    InvalidArgument,
    NoSuchObject,
    InvalidOperation,
    KeyTooLong,
    CorruptData,
}

/// Main error type for index column operations
#[derive(Error, Debug)]
pub enum Error {
    /// A scratch buffer or other per-column resource could not be allocated.
    #[error("setup failed: {0}")]
    Setup(String),

    /// A source or object reference did not resolve to a live object.
    #[error("cannot resolve {reference}: {message}")]
    Resolution { reference: String, message: String },

    /// The storage engine rejected a call.
    #[error("engine error ({code:?}): {message}")]
    Engine { code: ErrorCode, message: String },

    #[error("invalid argument {name}: {message}")]
    Argument { name: String, message: String },

    #[error("context has been closed")]
    ContextClosed,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("snapshot error: {0}")]
    Snapshot(String),
}

/// Result type alias for index column operations
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn engine(code: ErrorCode, message: impl Into<String>) -> Self {
        Error::Engine {
            code,
            message: message.into(),
        }
    }

    pub fn argument(name: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Argument {
            name: name.into(),
            message: message.into(),
        }
    }

    pub fn resolution(reference: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Resolution {
            reference: reference.into(),
            message: message.into(),
        }
    }

    /// Engine status code, if this error came from the engine.
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            Error::Engine { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Errors detected on the caller side before any engine call was made.
    pub fn is_caller_error(&self) -> bool {
        matches!(self, Error::Resolution { .. } | Error::Argument { .. })
    }
}
