use crate::body::EncodingBody;
use crate::config::Config;
use crate::decode::{DecodedBody, RequestContext};
use crate::select::Transformation;
use http::{HeaderMap, Response, header};
use pin_project_lite::pin_project;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

pin_project! {
    /// Future for encoding service responses.
    pub struct ResponseFuture<F> {
        #[pin]
        inner: F,
        transformation: Option<Transformation>,
        config: Config,
        context: RequestContext,
    }
}

impl<F> ResponseFuture<F> {
    pub(crate) fn new(
        inner: F,
        transformation: Option<Transformation>,
        config: Config,
        context: RequestContext,
    ) -> Self {
        Self {
            inner,
            transformation,
            config,
            context,
        }
    }
}

impl<F, B, E> Future for ResponseFuture<F>
where
    F: Future<Output = Result<Response<B>, E>>,
{
    type Output = Result<Response<EncodingBody<B>>, E>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();

        match this.inner.poll(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Err(e)) => Poll::Ready(Err(e)),
            Poll::Ready(Ok(response)) => {
                let response = match this.transformation.take() {
                    Some(transformation) => {
                        wrap_response(response, transformation, this.config, this.context)
                    }
                    // Ineligible method
                    None => response.map(EncodingBody::passthrough),
                };
                Poll::Ready(Ok(response))
            }
        }
    }
}

/// Rewrites the response headers for the transformation and wraps the body.
fn wrap_response<B>(
    response: Response<B>,
    transformation: Transformation,
    config: &Config,
    context: &RequestContext,
) -> Response<EncodingBody<B>> {
    let (mut parts, body) = response.into_parts();

    if transformation.varies_by_encoding() {
        add_vary_accept_encoding(&mut parts.headers);
    }

    let body = match transformation {
        Transformation::Passthrough { overrides } => {
            merge_overrides(&mut parts.headers, overrides);
            EncodingBody::passthrough(body)
        }
        Transformation::Encode { encoding } => {
            parts.headers.insert(
                header::CONTENT_ENCODING,
                header::HeaderValue::from_static(encoding.content_encoding()),
            );

            // Encoded size is unknown and ranges no longer apply
            parts.headers.remove(header::CONTENT_LENGTH);
            parts.headers.remove(header::ACCEPT_RANGES);

            EncodingBody::encoded(body, encoding, config)
        }
        Transformation::Decode {
            encoding,
            overrides,
        } => {
            merge_overrides(&mut parts.headers, overrides);

            parts.headers.remove(header::CONTENT_LENGTH);
            parts.headers.remove(header::ACCEPT_RANGES);
            parts.headers.remove(header::CONTENT_ENCODING);

            EncodingBody::decoded(body, DecodedBody::new(encoding, context.clone()))
        }
    };

    Response::from_parts(parts, body)
}

/// Replaces every value of each overridden header.
fn merge_overrides(headers: &mut HeaderMap, overrides: HeaderMap) {
    let mut current = None;
    for (name, value) in overrides {
        // `None` names continue the previous header
        if let Some(name) = name {
            headers.remove(&name);
            current = Some(name);
        }
        if let Some(name) = &current {
            headers.append(name.clone(), value);
        }
    }
}

/// Adds Accept-Encoding to the Vary header if not already present.
fn add_vary_accept_encoding(headers: &mut HeaderMap) {
    for vary in headers.get_all(header::VARY) {
        if let Ok(vary_str) = vary.to_str() {
            let covered = vary_str.split(',').any(|v| {
                let v = v.trim();
                v.eq_ignore_ascii_case("*") || v.eq_ignore_ascii_case("accept-encoding")
            });
            if covered {
                return;
            }
        }
    }

    headers.append(
        header::VARY,
        header::HeaderValue::from_static("accept-encoding"),
    );
}
