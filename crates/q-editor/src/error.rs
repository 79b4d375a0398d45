//! Error types for loading, saving, and configuring buffers.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors from a [`Codec`](crate::codec::Codec) transform.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The key material does not open the stream.
    #[error("invalid password")]
    InvalidPassword,

    /// The stream decoded but its content is damaged.
    #[error("corrupt stream: {0}")]
    Corrupt(String),

    /// The textual armor around the payload could not be parsed.
    #[error("malformed armor: {0}")]
    Armor(String),

    #[error("codec I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Errors surfaced by buffer load and save.
#[derive(Debug, Error)]
pub enum BufferError {
    /// Reading or writing the file failed.
    #[error("I/O error on {path}: {error}")]
    Io {
        /// The file involved.
        path: PathBuf,
        /// The underlying error.
        error: io::Error,
    },

    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// Directories cannot be opened as buffers.
    #[error("{} is a directory", .0.display())]
    IsDirectory(PathBuf),

    /// `save` on a buffer that was never bound to a file.
    #[error("buffer has no file name")]
    NoPath,

    /// A history snapshot could not be encoded.
    #[error("snapshot error: {0}")]
    Snapshot(#[from] serde_json::Error),
}

impl BufferError {
    pub(crate) fn io(path: impl Into<PathBuf>, error: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            error,
        }
    }
}

/// Errors from applying a `:set` directive to buffer options.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OptionError {
    #[error("unknown option: {0}")]
    Unknown(String),

    /// The value does not parse for this option.
    #[error("invalid value for option '{option}': {value}")]
    InvalidValue {
        option: String,
        value: String,
    },

    /// A boolean-only form (`no…`, `…!`) was used on a valued option, or
    /// the reverse.
    #[error("wrong kind of directive for option '{0}'")]
    WrongKind(String),
}

pub type Result<T> = std::result::Result<T, BufferError>;
