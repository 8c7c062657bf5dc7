use crate::classify::classify;
use crate::config::Config;
use crate::decode::RequestContext;
use crate::future::ResponseFuture;
use crate::negotiate::negotiate;
use crate::select::{is_eligible, select};
use http::Request;
use std::task::{Context, Poll};
use tower::Service;
use tracing::debug;

/// A Tower service that encodes, decodes or passes through response bodies.
#[derive(Debug, Clone)]
pub struct EncodingService<S> {
    inner: S,
    config: Config,
}

impl<S> EncodingService<S> {
    /// Creates a new service wrapping the given inner service.
    ///
    /// The configuration must already be validated; see
    /// [`EncodingLayer::with_config`](crate::EncodingLayer::with_config).
    pub(crate) fn new(inner: S, config: Config) -> Self {
        Self { inner, config }
    }

    /// Returns a reference to the inner service.
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Returns a mutable reference to the inner service.
    pub fn inner_mut(&mut self) -> &mut S {
        &mut self.inner
    }

    /// Consumes this service, returning the inner service.
    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for EncodingService<S>
where
    S: Service<Request<ReqBody>, Response = http::Response<ResBody>>,
{
    type Response = http::Response<crate::body::EncodingBody<ResBody>>;
    type Error = S::Error;
    type Future = ResponseFuture<S::Future>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<ReqBody>) -> Self::Future {
        let context = RequestContext {
            method: req.method().clone(),
            path: req.uri().path().to_owned(),
        };

        let transformation = is_eligible(req.method()).then(|| {
            let preferences = req
                .headers()
                .get(http::header::ACCEPT_ENCODING)
                .and_then(|v| v.to_str().ok())
                .map(negotiate)
                .unwrap_or_default();

            select(&classify(&context.path), &preferences)
        });

        debug!(
            method = %context.method,
            path = %context.path,
            ?transformation,
            "selected response transformation",
        );

        let inner = self.inner.call(req);

        ResponseFuture::new(inner, transformation, self.config, context)
    }
}
