use crate::codec::Encoding;
use http::Method;
use std::io;

/// Failure while decompressing a precompressed response body.
///
/// Returned from the body wrapped in an [`io::Error`]; recover it with
/// [`io::Error::get_ref`] and `downcast_ref`.
#[derive(Debug, thiserror::Error)]
#[error("failed to decode {encoding} response body for {method} {path}")]
pub struct DecodeError {
    /// Encoding of the stored bytes.
    pub encoding: Encoding,
    /// Method of the request being served.
    pub method: Method,
    /// Path of the request being served.
    pub path: String,
    /// Underlying codec or transport error.
    #[source]
    pub source: io::Error,
}

/// Failure while compressing a response body.
#[derive(Debug, thiserror::Error)]
#[error("failed to encode response body as {encoding}")]
pub struct EncodeError {
    /// The negotiated encoding.
    pub encoding: Encoding,
    /// Underlying codec error.
    #[source]
    pub source: io::Error,
}

impl From<DecodeError> for io::Error {
    fn from(err: DecodeError) -> Self {
        io::Error::other(err)
    }
}

impl From<EncodeError> for io::Error {
    fn from(err: EncodeError) -> Self {
        io::Error::other(err)
    }
}
