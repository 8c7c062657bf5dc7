use crate::codec::Encoding;
use crate::config::Config;
use crate::decode::DecodedBody;
use crate::error::EncodeError;
use bytes::{Buf, Bytes, BytesMut};
use compression_codecs::EncodeV2;
use compression_core::util::{PartialBuffer, WriteBuffer};
use http_body::{Body, Frame};
use pin_project_lite::pin_project;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

pub(crate) const OUTPUT_BUFFER_SIZE: usize = 8 * 1024; // 8KB output buffer

pin_project! {
    /// A response body that may be encoded or decoded.
    ///
    /// This type wraps an inner body and either compresses it, decompresses
    /// it, or passes it through unchanged.
    #[project = EncodingBodyProj]
    #[allow(missing_docs)]
    pub enum EncodingBody<B> {
        /// Body compressed on the fly.
        Encoded {
            #[pin]
            inner: B,
            state: EncodedBody,
        },
        /// Precompressed body decompressed on the fly.
        Decoded {
            #[pin]
            inner: B,
            state: DecodedBody,
        },
        /// Body forwarded unchanged.
        Passthrough {
            #[pin]
            inner: B,
        },
    }
}

/// State and buffers for an actively encoded body.
pub(crate) struct EncodedBody {
    encoding: Encoding,
    encoder: Box<dyn EncodeV2 + Send>,
    output_buffer: Vec<u8>,
    state: EncodeState,
    pending_trailers: Option<http::HeaderMap>,
}

/// State machine for encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EncodeState {
    /// Reading data from inner body and compressing.
    Reading,
    /// Finishing compression after inner body is done.
    Finishing,
    /// Emitting buffered trailers.
    Trailers,
    /// Compression is complete.
    Done,
}

impl EncodedBody {
    fn new(encoding: Encoding, config: &Config) -> Self {
        Self {
            encoding,
            encoder: encoding.encoder(config),
            output_buffer: vec![0u8; OUTPUT_BUFFER_SIZE],
            state: EncodeState::Reading,
            pending_trailers: None,
        }
    }

    pub(crate) fn state(&self) -> EncodeState {
        self.state
    }

    fn error(&mut self, source: io::Error) -> Poll<Option<Result<Frame<Bytes>, io::Error>>> {
        self.state = EncodeState::Done;
        let err = EncodeError {
            encoding: self.encoding,
            source,
        };
        Poll::Ready(Some(Err(err.into())))
    }

    fn poll_encoded<B>(
        &mut self,
        cx: &mut Context<'_>,
        mut inner: Pin<&mut B>,
    ) -> Poll<Option<Result<Frame<Bytes>, io::Error>>>
    where
        B: Body,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        loop {
            match self.state {
                EncodeState::Done => return Poll::Ready(None),

                EncodeState::Trailers => {
                    self.state = EncodeState::Done;
                    if let Some(trailers) = self.pending_trailers.take() {
                        return Poll::Ready(Some(Ok(Frame::trailers(trailers))));
                    }
                }

                EncodeState::Finishing => {
                    // Emit the codec footer
                    let mut output =
                        WriteBuffer::new_initialized(self.output_buffer.as_mut_slice());

                    match self.encoder.finish(&mut output) {
                        Ok(done) => {
                            let written = output.written_len();
                            if done {
                                self.state = EncodeState::Trailers;
                            }
                            if written > 0 {
                                let data = Bytes::copy_from_slice(&self.output_buffer[..written]);
                                return Poll::Ready(Some(Ok(Frame::data(data))));
                            }
                        }
                        Err(e) => return self.error(e),
                    }
                }

                EncodeState::Reading => match inner.as_mut().poll_frame(cx) {
                    Poll::Pending => return Poll::Pending,
                    Poll::Ready(None) => {
                        self.state = EncodeState::Finishing;
                    }
                    Poll::Ready(Some(Err(e))) => {
                        self.state = EncodeState::Done;
                        return Poll::Ready(Some(Err(io::Error::other(e.into()))));
                    }
                    Poll::Ready(Some(Ok(frame))) => match frame.into_data() {
                        Ok(mut data) => {
                            let input = data.copy_to_bytes(data.remaining());
                            match self.encode_chunk(&input) {
                                Ok(Some(output)) => {
                                    return Poll::Ready(Some(Ok(Frame::data(output))));
                                }
                                // The codec buffered everything; read on.
                                Ok(None) => {}
                                Err(e) => return self.error(e),
                            }
                        }
                        Err(frame) => {
                            if let Ok(trailers) = frame.into_trailers() {
                                // Trailers go out after the codec footer
                                self.pending_trailers = Some(trailers);
                                self.state = EncodeState::Finishing;
                            }
                        }
                    },
                },
            }
        }
    }

    /// Compresses a chunk of input data, returning whatever output the codec
    /// produced.
    fn encode_chunk(&mut self, input: &[u8]) -> io::Result<Option<Bytes>> {
        let mut input_buf = PartialBuffer::new(input);
        let mut all_output = BytesMut::new();

        loop {
            let mut output = WriteBuffer::new_initialized(self.output_buffer.as_mut_slice());
            self.encoder.encode(&mut input_buf, &mut output)?;

            let written = output.written_len();
            if written > 0 {
                all_output.extend_from_slice(&self.output_buffer[..written]);
            }

            if input_buf.written_len() >= input.len() {
                break;
            }

            // No progress means the codec cannot take more input
            if written == 0 && input_buf.written_len() == 0 {
                break;
            }
        }

        if all_output.is_empty() {
            Ok(None)
        } else {
            Ok(Some(all_output.freeze()))
        }
    }
}

impl<B> EncodingBody<B> {
    /// Creates a body compressed with the given encoding.
    pub(crate) fn encoded(inner: B, encoding: Encoding, config: &Config) -> Self {
        Self::Encoded {
            inner,
            state: EncodedBody::new(encoding, config),
        }
    }

    /// Creates a body decompressed from the given encoding.
    pub(crate) fn decoded(inner: B, state: DecodedBody) -> Self {
        Self::Decoded { inner, state }
    }

    /// Creates a passthrough body.
    pub fn passthrough(inner: B) -> Self {
        Self::Passthrough { inner }
    }
}

impl<B> Body for EncodingBody<B>
where
    B: Body,
    B::Data: Buf,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    type Data = Bytes;
    type Error = io::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        match self.project() {
            EncodingBodyProj::Passthrough { inner } => match inner.poll_frame(cx) {
                Poll::Pending => Poll::Pending,
                Poll::Ready(None) => Poll::Ready(None),
                Poll::Ready(Some(Ok(frame))) => {
                    let frame = frame.map_data(|mut data| data.copy_to_bytes(data.remaining()));
                    Poll::Ready(Some(Ok(frame)))
                }
                Poll::Ready(Some(Err(e))) => Poll::Ready(Some(Err(io::Error::other(e.into())))),
            },
            EncodingBodyProj::Encoded { inner, state } => state.poll_encoded(cx, inner),
            EncodingBodyProj::Decoded { inner, state } => state.poll_decoded(cx, inner),
        }
    }

    fn is_end_stream(&self) -> bool {
        match self {
            EncodingBody::Passthrough { inner } => inner.is_end_stream(),
            EncodingBody::Encoded { state, .. } => state.state() == EncodeState::Done,
            EncodingBody::Decoded { state, .. } => state.is_done(),
        }
    }

    fn size_hint(&self) -> http_body::SizeHint {
        match self {
            EncodingBody::Passthrough { inner } => inner.size_hint(),
            // Transformed size is unknown
            EncodingBody::Encoded { .. } | EncodingBody::Decoded { .. } => {
                http_body::SizeHint::default()
            }
        }
    }
}

impl<B> std::fmt::Debug for EncodingBody<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EncodingBody::Encoded { state, .. } => f
                .debug_struct("Encoded")
                .field("encoding", &state.encoding)
                .field("state", &state.state)
                .finish_non_exhaustive(),
            EncodingBody::Decoded { state, .. } => f
                .debug_struct("Decoded")
                .field("encoding", &state.encoding())
                .finish_non_exhaustive(),
            EncodingBody::Passthrough { .. } => f.debug_struct("Passthrough").finish_non_exhaustive(),
        }
    }
}
