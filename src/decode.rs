//! Streaming decompression of precompressed bodies.
//!
//! The codec runs on a background task started by the first non-empty data
//! frame. Compressed chunks reach it through a capacity-one channel whose
//! producer is the body's poll loop, so the inner body is never read further
//! ahead than the decoder has consumed. Decoded output comes back through a
//! second capacity-one channel. End of stream is reported only after the
//! task has been joined.

use crate::body::OUTPUT_BUFFER_SIZE;
use crate::codec::Encoding;
use crate::error::DecodeError;
use bytes::{Buf, Bytes};
use compression_codecs::DecodeV2;
use compression_core::util::{PartialBuffer, WriteBuffer};
use http::{HeaderMap, Method};
use http_body::{Body, Frame};
use std::future::Future;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll, ready};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::PollSender;
use tracing::{debug, trace};

/// The request a decoded body is served for.
#[derive(Debug, Clone)]
pub(crate) struct RequestContext {
    pub(crate) method: Method,
    pub(crate) path: String,
}

/// State of a body being decoded on a background task.
pub(crate) struct DecodedBody {
    encoding: Encoding,
    context: RequestContext,
    state: DecodeState,
    worker: Option<Worker>,
    pending: Option<Bytes>,
    pending_trailers: Option<HeaderMap>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DecodeState {
    /// Handing inner data to the worker and forwarding its output.
    Streaming,
    /// Input closed; forwarding the remaining decoded output.
    Draining,
    /// Waiting for the worker to finish.
    Joining,
    /// Emitting buffered trailers.
    Trailers,
    Done,
}

/// The background decoder and the body's ends of its channels.
struct Worker {
    /// Producer side of the rendezvous; dropped to signal end of input.
    input: Option<PollSender<Bytes>>,
    output: mpsc::Receiver<Bytes>,
    handle: JoinHandle<io::Result<()>>,
}

impl Worker {
    fn spawn(encoding: Encoding) -> Self {
        let (input_tx, input_rx) = mpsc::channel(1);
        let (output_tx, output_rx) = mpsc::channel(1);
        let handle = tokio::spawn(run(encoding.decoder(), input_rx, output_tx));

        Self {
            input: Some(PollSender::new(input_tx)),
            output: output_rx,
            handle,
        }
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        // No-op once joined; stops the task if the body is dropped mid-stream.
        self.handle.abort();
    }
}

impl DecodedBody {
    pub(crate) fn new(encoding: Encoding, context: RequestContext) -> Self {
        Self {
            encoding,
            context,
            state: DecodeState::Streaming,
            worker: None,
            pending: None,
            pending_trailers: None,
        }
    }

    pub(crate) fn encoding(&self) -> Encoding {
        self.encoding
    }

    pub(crate) fn is_done(&self) -> bool {
        self.state == DecodeState::Done
    }

    pub(crate) fn poll_decoded<B>(
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
                DecodeState::Done => return Poll::Ready(None),

                DecodeState::Trailers => {
                    self.state = DecodeState::Done;
                    if let Some(trailers) = self.pending_trailers.take() {
                        return Poll::Ready(Some(Ok(Frame::trailers(trailers))));
                    }
                }

                DecodeState::Streaming => {
                    if let Some(worker) = &mut self.worker {
                        match worker.output.poll_recv(cx) {
                            Poll::Ready(Some(data)) => {
                                return Poll::Ready(Some(Ok(Frame::data(data))));
                            }
                            // The worker only stops early when it failed
                            Poll::Ready(None) => {
                                self.state = DecodeState::Joining;
                                continue;
                            }
                            Poll::Pending => {}
                        }

                        if let Some(chunk) = self.pending.take() {
                            let Some(input) = worker.input.as_mut() else {
                                self.state = DecodeState::Draining;
                                continue;
                            };
                            match input.poll_reserve(cx) {
                                Poll::Ready(Ok(())) => {
                                    if input.send_item(chunk).is_err() {
                                        self.state = DecodeState::Joining;
                                        continue;
                                    }
                                }
                                Poll::Ready(Err(_)) => {
                                    self.state = DecodeState::Joining;
                                    continue;
                                }
                                Poll::Pending => {
                                    self.pending = Some(chunk);
                                    return Poll::Pending;
                                }
                            }
                        }
                    }

                    match inner.as_mut().poll_frame(cx) {
                        Poll::Pending => return Poll::Pending,
                        Poll::Ready(None) => self.close_input(),
                        Poll::Ready(Some(Err(e))) => {
                            self.state = DecodeState::Done;
                            return Poll::Ready(Some(Err(io::Error::other(e.into()))));
                        }
                        Poll::Ready(Some(Ok(frame))) => match frame.into_data() {
                            Ok(mut data) => {
                                if data.has_remaining() {
                                    if self.worker.is_none() {
                                        trace!(encoding = %self.encoding, "starting decoder");
                                        self.worker = Some(Worker::spawn(self.encoding));
                                    }
                                    self.pending = Some(data.copy_to_bytes(data.remaining()));
                                }
                            }
                            Err(frame) => {
                                if let Ok(trailers) = frame.into_trailers() {
                                    self.pending_trailers = Some(trailers);
                                    self.close_input();
                                }
                            }
                        },
                    }
                }

                DecodeState::Draining => {
                    let Some(worker) = &mut self.worker else {
                        self.state = DecodeState::Trailers;
                        continue;
                    };
                    match ready!(worker.output.poll_recv(cx)) {
                        Some(data) => return Poll::Ready(Some(Ok(Frame::data(data)))),
                        None => self.state = DecodeState::Joining,
                    }
                }

                DecodeState::Joining => {
                    let Some(worker) = &mut self.worker else {
                        self.state = DecodeState::Trailers;
                        continue;
                    };
                    let result = ready!(Pin::new(&mut worker.handle).poll(cx));
                    self.worker = None;

                    match result {
                        Ok(Ok(())) => {
                            trace!(encoding = %self.encoding, "decoder finished");
                            self.state = DecodeState::Trailers;
                        }
                        Ok(Err(e)) => return self.error(e),
                        Err(e) => return self.error(io::Error::other(e)),
                    }
                }
            }
        }
    }

    /// Signals end of input to the worker.
    fn close_input(&mut self) {
        if let Some(worker) = &mut self.worker {
            worker.input = None;
        }
        self.state = DecodeState::Draining;
    }

    fn error(&mut self, source: io::Error) -> Poll<Option<Result<Frame<Bytes>, io::Error>>> {
        self.state = DecodeState::Done;
        self.pending = None;
        self.pending_trailers = None;

        debug!(
            encoding = %self.encoding,
            method = %self.context.method,
            path = %self.context.path,
            error = %source,
            "failed to decode response body",
        );

        let err = DecodeError {
            encoding: self.encoding,
            method: self.context.method.clone(),
            path: self.context.path.clone(),
            source,
        };
        Poll::Ready(Some(Err(err.into())))
    }
}

/// Decodes chunks from `input` until it closes, sending output to `output`.
async fn run(
    mut decoder: Box<dyn DecodeV2 + Send>,
    mut input: mpsc::Receiver<Bytes>,
    output: mpsc::Sender<Bytes>,
) -> io::Result<()> {
    let mut buffer = vec![0u8; OUTPUT_BUFFER_SIZE];
    let mut done = false;

    while let Some(chunk) = input.recv().await {
        let mut input_buf = PartialBuffer::new(&chunk[..]);

        loop {
            let exhausted = input_buf.written_len() >= chunk.len();
            if done {
                if exhausted {
                    break;
                }
                // Another member follows, as in concatenated gzip files
                decoder.reinit()?;
                done = false;
            }

            let consumed = input_buf.written_len();
            let written = {
                let mut out = WriteBuffer::new_initialized(buffer.as_mut_slice());
                done = decoder.decode(&mut input_buf, &mut out)?;
                out.written_len()
            };
            send(&output, &buffer[..written]).await?;

            // A full buffer may leave output in the codec even once the
            // chunk is consumed
            if done || written == buffer.len() {
                continue;
            }
            if input_buf.written_len() >= chunk.len() {
                break;
            }
            if written == 0 && input_buf.written_len() == consumed {
                break;
            }
        }

        loop {
            let (flushed, written) = {
                let mut out = WriteBuffer::new_initialized(buffer.as_mut_slice());
                let flushed = decoder.flush(&mut out)?;
                (flushed, out.written_len())
            };
            send(&output, &buffer[..written]).await?;
            if flushed {
                break;
            }
        }
    }

    loop {
        let (finished, written) = {
            let mut out = WriteBuffer::new_initialized(buffer.as_mut_slice());
            let finished = decoder.finish(&mut out)?;
            (finished, out.written_len())
        };
        send(&output, &buffer[..written]).await?;
        if finished {
            break;
        }
    }

    if !done {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "compressed stream ended early",
        ));
    }
    Ok(())
}

async fn send(output: &mpsc::Sender<Bytes>, data: &[u8]) -> io::Result<()> {
    if data.is_empty() {
        return Ok(());
    }
    output
        .send(Bytes::copy_from_slice(data))
        .await
        .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "response body dropped"))
}
