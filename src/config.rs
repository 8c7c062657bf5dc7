use crate::codec::Encoding;
use compression_core::Level;
use std::ops::RangeInclusive;

const FLATE_LEVELS: RangeInclusive<i32> = 0..=9;
const BROTLI_LEVELS: RangeInclusive<i32> = 0..=11;

/// Per-codec compression levels used when encoding responses.
#[derive(Debug, Clone, Copy)]
pub struct Config {
    /// Gzip level, `0..=9` when precise.
    pub gzip_level: Level,
    /// Deflate (zlib) level, `0..=9` when precise.
    pub deflate_level: Level,
    /// Brotli quality, `0..=11` when precise.
    pub brotli_level: Level,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            gzip_level: Level::Default,
            deflate_level: Level::Default,
            brotli_level: Level::Default,
        }
    }
}

impl Config {
    /// Checks every precise level against the legal range of its codec.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check(Encoding::Gzip, self.gzip_level, FLATE_LEVELS)?;
        check(Encoding::Deflate, self.deflate_level, FLATE_LEVELS)?;
        check(Encoding::Brotli, self.brotli_level, BROTLI_LEVELS)
    }
}

fn check(encoding: Encoding, level: Level, range: RangeInclusive<i32>) -> Result<(), ConfigError> {
    match level {
        Level::Precise(level) if !range.contains(&level) => Err(ConfigError::InvalidLevel {
            encoding,
            level,
            min: *range.start(),
            max: *range.end(),
        }),
        _ => Ok(()),
    }
}

/// Error returned for an invalid [`Config`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// A precise level outside the codec's range.
    #[error("invalid {encoding} compression level {level}, expected {min}..={max}")]
    InvalidLevel {
        /// The codec the level was configured for.
        encoding: Encoding,
        /// The rejected level.
        level: i32,
        /// Lowest legal level.
        min: i32,
        /// Highest legal level.
        max: i32,
    },
}
