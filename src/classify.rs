//! Detection of precompressed assets by file suffix.

use crate::codec::Encoding;

/// Suffixes of precompressed assets. Deflate has no file convention.
const PRECOMPRESSED_SUFFIXES: [(&str, Encoding); 2] =
    [(".gz", Encoding::Gzip), (".br", Encoding::Brotli)];

const OCTET_STREAM: &str = "application/octet-stream";

/// How a resource is stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// Stored as-is.
    Plain,
    /// Stored compressed; the logical resource is the name without the suffix.
    Precompressed {
        /// Encoding of the stored bytes.
        encoding: Encoding,
        /// Content type of the decompressed resource.
        content_type: String,
    },
}

impl Classification {
    /// Returns `true` for precompressed resources.
    pub fn is_precompressed(&self) -> bool {
        matches!(self, Classification::Precompressed { .. })
    }

    /// Returns the encoding of the stored bytes, if any.
    pub fn stored_encoding(&self) -> Option<Encoding> {
        match self {
            Classification::Plain => None,
            Classification::Precompressed { encoding, .. } => Some(*encoding),
        }
    }
}

/// Classifies a request path by the suffix of its final segment.
///
/// `/assets/site.css.gz` is the gzip form of `site.css` and has the logical
/// content type `text/css`. Unknown logical extensions fall back to
/// `application/octet-stream`.
pub fn classify(path: &str) -> Classification {
    let name = base_name(path);
    let Some(ext) = extension(name) else {
        return Classification::Plain;
    };

    let Some((_, encoding)) = PRECOMPRESSED_SUFFIXES
        .iter()
        .find(|(suffix, _)| *suffix == ext)
    else {
        return Classification::Plain;
    };

    let logical = &name[..name.len() - ext.len()];
    let content_type = extension(logical)
        .and_then(|ext| mime_guess::from_ext(&ext[1..]).first())
        .map(|mime| mime.to_string())
        .unwrap_or_else(|| OCTET_STREAM.to_owned());

    Classification::Precompressed {
        encoding: *encoding,
        content_type,
    }
}

/// Final path segment, ignoring trailing slashes.
fn base_name(path: &str) -> &str {
    let path = path.trim_end_matches('/');
    path.rsplit('/').next().unwrap_or(path)
}

/// Extension of a file name including the leading dot.
fn extension(name: &str) -> Option<&str> {
    name.rfind('.').map(|i| &name[i..])
}
