//! Frontend error types.

use thiserror::Error;

pub type ServerResult<T> = Result<T, ServerError>;

#[derive(Debug, Error)]
pub enum ServerError {
    /// Malformed HTTP request: bad request line, missing headers, or a
    /// body shorter than `Content-Length`.
    #[error("malformed HTTP request: {0}")]
    MalformedRequest(String),

    /// Multipart body had no file part, or its boundary couldn't be
    /// located.
    #[error("malformed upload: {0}")]
    MalformedUpload(String),

    #[error(transparent)]
    Replicate(#[from] haystack_replicate::ReplicateError),

    #[error(transparent)]
    Store(#[from] haystack_store::StoreError),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}
