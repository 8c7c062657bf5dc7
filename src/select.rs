use crate::classify::Classification;
use crate::codec::Encoding;
use crate::negotiate::Preference;
use http::{HeaderMap, HeaderValue, Method, header};

/// How a response body is rewritten. Exactly one is chosen per request.
#[derive(Debug, Clone, PartialEq)]
pub enum Transformation {
    /// Forward the body unchanged, overlaying `overrides` on the headers.
    Passthrough {
        /// Headers that replace whatever the inner service set.
        overrides: HeaderMap,
    },
    /// Decompress a precompressed body the client cannot accept.
    Decode {
        /// Encoding of the stored bytes.
        encoding: Encoding,
        /// Headers that replace whatever the inner service set.
        overrides: HeaderMap,
    },
    /// Compress the body with the negotiated encoding.
    Encode {
        /// The negotiated encoding.
        encoding: Encoding,
    },
}

impl Transformation {
    /// Passthrough without header changes.
    pub fn identity() -> Self {
        Transformation::Passthrough {
            overrides: HeaderMap::new(),
        }
    }

    /// Returns `true` if the response representation depends on
    /// `Accept-Encoding`.
    pub(crate) fn varies_by_encoding(&self) -> bool {
        match self {
            Transformation::Passthrough { overrides } => !overrides.is_empty(),
            Transformation::Decode { .. } | Transformation::Encode { .. } => true,
        }
    }
}

/// Returns `true` for methods whose responses may be transformed.
pub fn is_eligible(method: &Method) -> bool {
    matches!(
        *method,
        Method::GET | Method::POST | Method::DELETE | Method::OPTIONS | Method::PATCH
    )
}

/// Chooses the transformation for a resource given the client preferences.
///
/// Precompressed resources are served as stored when the client lists their
/// encoding at all, whatever its weight, and decoded otherwise. Plain
/// resources are encoded with the first supported, acceptable preference.
///
/// Unlike stored assets, dynamic encoding skips entries with `q=0`: the
/// client rejected that coding, so it is never produced on the fly.
pub fn select(classification: &Classification, preferences: &[Preference]) -> Transformation {
    match classification {
        Classification::Precompressed {
            encoding,
            content_type,
        } => {
            let mut overrides = HeaderMap::new();
            overrides.insert(header::CONTENT_TYPE, content_type_value(content_type));

            let accepted = preferences
                .iter()
                .any(|p| p.token == encoding.content_encoding());
            if accepted {
                overrides.insert(
                    header::CONTENT_ENCODING,
                    HeaderValue::from_static(encoding.content_encoding()),
                );
                Transformation::Passthrough { overrides }
            } else {
                Transformation::Decode {
                    encoding: *encoding,
                    overrides,
                }
            }
        }
        Classification::Plain => preferences
            .iter()
            .filter(|p| !p.quality.is_zero())
            .find_map(|p| Encoding::from_token(&p.token))
            .map(|encoding| Transformation::Encode { encoding })
            .unwrap_or_else(Transformation::identity),
    }
}

fn content_type_value(content_type: &str) -> HeaderValue {
    HeaderValue::from_str(content_type)
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"))
}
