use crate::config::{Config, ConfigError};
use crate::service::EncodingService;
use tower::Layer;

/// A Tower layer that encodes, decodes or passes through response bodies.
///
/// This layer wraps services and picks a transformation per request from the
/// request path and the client's Accept-Encoding header.
#[derive(Debug, Clone)]
pub struct EncodingLayer {
    config: Config,
}

impl EncodingLayer {
    /// Creates a new layer using each codec's default level.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    /// Creates a new layer with the given compression levels.
    ///
    /// Fails if any level is outside its codec's range.
    pub fn with_config(config: Config) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Returns the configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }
}

impl Default for EncodingLayer {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> Layer<S> for EncodingLayer {
    type Service = EncodingService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        EncodingService::new(inner, self.config)
    }
}
