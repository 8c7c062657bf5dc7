//! HTTP response encoding middleware for Tower.
//!
//! This crate provides a Tower layer that, per request, compresses a response
//! body on the fly, decompresses a precompressed asset on the fly, or passes
//! the body through, based on the client's `Accept-Encoding` header and the
//! suffix of the requested path.
//!
//! # Example
//!
//! ```ignore
//! use http_response_encoding::EncodingLayer;
//! use tower::ServiceBuilder;
//!
//! let service = ServiceBuilder::new()
//!     .layer(EncodingLayer::new())
//!     .service(my_service);
//! ```
//!
//! # Selection Rules
//!
//! Only `GET`, `POST`, `DELETE`, `OPTIONS` and `PATCH` requests are
//! considered; responses to any other method are left untouched.
//!
//! A path ending in `.gz` or `.br` names a precompressed asset:
//! - if the client lists that encoding in `Accept-Encoding` (at any weight),
//!   the stored bytes are served as-is with `Content-Encoding` set
//! - otherwise the body is decompressed and `Content-Encoding` is removed
//!
//! In both cases `Content-Type` is set from the path without the suffix.
//!
//! Any other path is compressed with the client's most preferred encoding
//! among `gzip`, `deflate` and `br`, or passed through when none is accepted.
//!
//! # Response Modifications
//!
//! When the body is encoded or decoded:
//! - `Content-Length` header is removed (transformed size is unknown)
//! - `Accept-Ranges` header is removed
//!
//! Whenever the response depends on `Accept-Encoding`, `Vary` includes it.
//!
//! # Runtime
//!
//! Decompression runs on a Tokio task, so decoded bodies must be polled
//! within a Tokio runtime.

#![deny(missing_docs)]

mod body;
mod classify;
mod codec;
mod config;
mod decode;
mod error;
mod future;
mod layer;
mod negotiate;
mod select;
mod service;

pub use body::EncodingBody;
pub use classify::{Classification, classify};
pub use codec::Encoding;
pub use compression_core::Level;
pub use config::{Config, ConfigError};
pub use error::{DecodeError, EncodeError};
pub use future::ResponseFuture;
pub use layer::EncodingLayer;
pub use negotiate::{Preference, Quality, negotiate};
pub use select::{Transformation, is_eligible, select};
pub use service::EncodingService;
