use thiserror::Error;

/// Errors originated by the protocol core, or passed through unchanged from a
/// [`crate::storage::StorageDriver`] implementation.
#[derive(Error, Debug)]
pub enum Error {
    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("assertion failed: unknown filter type '{0}'")]
    Assert(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("int conversion error: {0}")]
    Parsing(#[from] std::num::TryFromIntError),

    #[error("value coercion error: expected {expected}, found {found}")]
    Coercion {
        expected: &'static str,
        found: &'static str,
    },

    #[error("file open error: {0}")]
    FileOpen(String),

    #[error("file read error: {0}")]
    FileRead(String),

    #[error("file write error: {0}")]
    FileWrite(String),

    #[error("path missing: {0}")]
    PathMissing(String),

    #[error("path open error: {0}")]
    PathOpen(String),

    #[error("driver does not implement path_exists")]
    PathExistsUnsupported,

    #[error("unknown command '{0}'")]
    UnknownCommand(String),
}

pub type Result<T> = std::result::Result<T, Error>;
