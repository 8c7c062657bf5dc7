use crate::config::Config;
use compression_codecs::{
    DecodeV2, EncodeV2,
    brotli::{BrotliDecoder, BrotliEncoder, params::EncoderParams as BrotliParams},
    gzip::{GzipDecoder, GzipEncoder},
    zlib::{ZlibDecoder, ZlibEncoder},
};
use std::fmt;

/// Content codings handled by the middleware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Encoding {
    /// Gzip compression.
    Gzip,
    /// Zlib-wrapped deflate compression.
    Deflate,
    /// Brotli compression.
    Brotli,
}

impl Encoding {
    /// Looks up a content-coding token. Matching is exact; negotiated tokens
    /// are already lowercased.
    pub fn from_token(token: &str) -> Option<Encoding> {
        match token {
            "gzip" => Some(Encoding::Gzip),
            "deflate" => Some(Encoding::Deflate),
            "br" => Some(Encoding::Brotli),
            _ => None,
        }
    }

    /// Returns the Content-Encoding header value for this codec.
    pub fn content_encoding(&self) -> &'static str {
        match self {
            Encoding::Gzip => "gzip",
            Encoding::Deflate => "deflate",
            Encoding::Brotli => "br",
        }
    }

    /// Creates a new encoder for this codec at the configured level.
    pub(crate) fn encoder(&self, config: &Config) -> Box<dyn EncodeV2 + Send> {
        match self {
            Encoding::Gzip => Box::new(GzipEncoder::new(config.gzip_level.into())),
            Encoding::Deflate => Box::new(ZlibEncoder::new(config.deflate_level.into())),
            Encoding::Brotli => Box::new(BrotliEncoder::new(
                BrotliParams::default().quality(config.brotli_level),
            )),
        }
    }

    /// Creates a new decoder for this codec.
    pub(crate) fn decoder(&self) -> Box<dyn DecodeV2 + Send> {
        match self {
            Encoding::Gzip => Box::new(GzipDecoder::new()),
            Encoding::Deflate => Box::new(ZlibDecoder::new()),
            Encoding::Brotli => Box::new(BrotliDecoder::new()),
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.content_encoding())
    }
}
