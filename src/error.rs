use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SealtarError {
    #[error("{0}")]
    Usage(String),

    #[error("required tool `{0}` was not found on PATH")]
    ToolMissing(String),

    #[error("`{0}` could not reach the object store; check credentials and permissions")]
    Credential(String),

    #[error("aborted: {0}")]
    Aborted(String),

    #[error("no such file or directory: {0:?}")]
    PathNotFound(PathBuf),

    #[error("{0:?} is absolute; paths must be relative when uploading more than one")]
    RelativePathRequired(PathBuf),

    #[error("unexpected extra argument: {0}")]
    ExtraArgument(String),

    #[error("failed to create directory {path:?}: {source}")]
    DirectoryCreateFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to generate key and certificate request {0:?}")]
    CsrGenerationFailed(PathBuf),

    #[error("failed to self-sign certificate {0:?}")]
    CertSigningFailed(PathBuf),

    #[error("failed to create bucket {0}")]
    BucketCreateFailed(String),

    #[error("transfer failed for {0}")]
    TransferFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SealtarError>;
