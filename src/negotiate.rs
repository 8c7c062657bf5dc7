//! Accept-Encoding parsing.

use std::fmt;

/// A quality value (`q=`) in thousandths, `0..=1000`.
///
/// Stored as an integer so that ordering between entries is total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Quality(u16);

impl Quality {
    /// The weight of an entry without a `q` parameter.
    pub const MAX: Quality = Quality(1000);

    /// An explicitly rejected entry.
    pub const ZERO: Quality = Quality(0);

    /// Returns the weight in thousandths.
    pub fn as_millis(&self) -> u16 {
        self.0
    }

    /// Returns `true` if the weight marks the entry as not acceptable.
    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Parses a qvalue: `0[.ddd]` or `1[.000]`.
    fn parse(s: &str) -> Option<Quality> {
        let (int, frac) = match s.split_once('.') {
            Some((int, frac)) => (int, frac),
            None => (s, ""),
        };
        if frac.len() > 3 || !frac.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }

        let mut millis = 0u16;
        for (i, b) in frac.bytes().enumerate() {
            millis += u16::from(b - b'0') * [100, 10, 1][i];
        }

        match int {
            "0" => Some(Quality(millis)),
            "1" if millis == 0 => Some(Quality::MAX),
            _ => None,
        }
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:03}", self.0 / 1000, self.0 % 1000)
    }
}

/// One entry of an `Accept-Encoding` declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preference {
    /// The content-coding token, ASCII-lowercased.
    pub token: String,
    /// The declared weight.
    pub quality: Quality,
    /// Index of the entry among the valid entries of the declaration.
    pub position: usize,
}

/// Parses an `Accept-Encoding` value into preferences, highest weight first.
///
/// Entries with equal weight keep their declaration order. Malformed entries
/// are dropped individually; an empty or entirely malformed value yields an
/// empty list.
pub fn negotiate(header: &str) -> Vec<Preference> {
    let mut preferences: Vec<Preference> = header
        .split(',')
        .filter_map(parse_entry)
        .enumerate()
        .map(|(position, (token, quality))| Preference {
            token,
            quality,
            position,
        })
        .collect();

    // sort_by is stable, so ties stay in declaration order.
    preferences.sort_by(|a, b| b.quality.cmp(&a.quality));
    preferences
}

/// Parses an entry like "gzip" or "br;q=0.8" into (token, quality).
fn parse_entry(s: &str) -> Option<(String, Quality)> {
    let mut parts = s.split(';');
    let token = parts.next().unwrap_or("").trim();
    if token.is_empty() || !token.bytes().all(is_tchar) {
        return None;
    }

    let mut quality = Quality::MAX;
    for param in parts {
        if param.trim().is_empty() {
            continue;
        }
        let (name, value) = param.split_once('=')?;
        if name.trim().eq_ignore_ascii_case("q") {
            quality = Quality::parse(value.trim())?;
        }
    }

    Some((token.to_ascii_lowercase(), quality))
}

/// RFC 9110 `tchar`.
fn is_tchar(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b)
}
