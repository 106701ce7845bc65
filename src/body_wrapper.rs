//! Body streaming and capture utilities.
//!
//! This module provides the bounded duplicators that sit between a body producer
//! and its consumer. Every byte is forwarded unchanged and in order; at most a
//! configured number of bytes is copied aside for logging.

use axum::body::{Body, Bytes};
use bytes::BytesMut;
use futures::{stream, StreamExt};
use http_body::{Body as HttpBody, Frame, SizeHint};
use std::{
    fmt::Display,
    pin::Pin,
    task::{Context, Poll},
};
use tracing::warn;

/// Append-only byte buffer that stops growing at a fixed limit.
///
/// Bytes pushed past the limit are discarded, not rejected, so the buffer never
/// holds more than `limit` bytes.
#[derive(Debug)]
pub struct CaptureBuffer {
    buf: BytesMut,
    limit: usize,
}

impl CaptureBuffer {
    pub fn new(limit: usize) -> Self {
        Self {
            buf: BytesMut::new(),
            limit,
        }
    }

    /// Copy as much of `chunk` as still fits.
    pub fn push(&mut self, chunk: &[u8]) {
        let room = self.limit.saturating_sub(self.buf.len());
        if room > 0 {
            self.buf.extend_from_slice(&chunk[..room.min(chunk.len())]);
        }
    }

    pub fn is_full(&self) -> bool {
        self.buf.len() >= self.limit
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn into_bytes(self) -> Bytes {
        self.buf.freeze()
    }
}

/// What a [`tap_body`] observed by the time its body finished or was dropped.
#[derive(Debug, Clone, Default)]
pub struct TapSummary {
    /// Total bytes forwarded to the consumer
    pub bytes_written: u64,
    /// Captured prefix of the body, if capture was enabled
    pub captured: Option<Bytes>,
    /// First error raised by the underlying body stream
    pub error: Option<String>,
}

type OnComplete = Box<dyn FnOnce(TapSummary) + Send>;

/// Observation state owned by a [`TapBody`]. Reports once, when dropped.
struct Tap {
    bytes_written: u64,
    capture: Option<CaptureBuffer>,
    error: Option<String>,
    on_complete: Option<OnComplete>,
}

impl Tap {
    fn record_data(&mut self, chunk: &[u8]) {
        self.bytes_written += chunk.len() as u64;
        if let Some(capture) = self.capture.as_mut() {
            capture.push(chunk);
        }
    }

    fn record_error(&mut self, error: &dyn Display) {
        if self.error.is_none() {
            self.error = Some(error.to_string());
        }
    }
}

impl Drop for Tap {
    fn drop(&mut self) {
        if let Some(on_complete) = self.on_complete.take() {
            on_complete(TapSummary {
                bytes_written: self.bytes_written,
                captured: self.capture.take().map(CaptureBuffer::into_bytes),
                error: self.error.take(),
            });
        }
    }
}

/// Body wrapper that observes data frames as they are forwarded.
///
/// Frames are moved through untouched, trailers included, and the inner body's
/// `size_hint` and `is_end_stream` are reported as-is, so wrapping a body never
/// changes how it is framed on the wire.
pub struct TapBody<B> {
    inner: B,
    tap: Tap,
}

impl<B> TapBody<B> {
    pub fn new<F>(inner: B, capture_limit: Option<usize>, on_complete: F) -> Self
    where
        F: FnOnce(TapSummary) + Send + 'static,
    {
        Self {
            inner,
            tap: Tap {
                bytes_written: 0,
                capture: capture_limit.map(CaptureBuffer::new),
                error: None,
                on_complete: Some(Box::new(on_complete)),
            },
        }
    }
}

impl<B> HttpBody for TapBody<B>
where
    B: HttpBody<Data = Bytes> + Unpin,
    B::Error: Display,
{
    type Data = Bytes;
    type Error = B::Error;

    fn poll_frame(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = &mut *self;
        match Pin::new(&mut this.inner).poll_frame(cx) {
            Poll::Ready(Some(Ok(frame))) => {
                if let Some(data) = frame.data_ref() {
                    this.tap.record_data(data);
                }
                Poll::Ready(Some(Ok(frame)))
            }
            Poll::Ready(Some(Err(e))) => {
                this.tap.record_error(&e);
                Poll::Ready(Some(Err(e)))
            }
            other => other,
        }
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

/// Wraps a body so that its frames are observed as they stream through.
///
/// The returned body yields exactly the frames of `body`, in order, with the same
/// size hint. All data bytes are counted; when `capture_limit` is `Some`, up to
/// that many bytes are also copied aside. `on_complete` runs exactly once with
/// the [`TapSummary`], when the returned body is dropped, which happens after it
/// has been fully written or once the consumer gives up on it (e.g. client
/// disconnect).
///
/// # Examples
///
/// ```rust
/// use response_logger::body_wrapper::tap_body;
/// use axum::body::Body;
/// use http_body_util::BodyExt;
/// use std::sync::{Arc, Mutex};
///
/// # #[tokio::main]
/// # async fn main() {
/// let seen = Arc::new(Mutex::new(None));
/// let slot = seen.clone();
/// let body = tap_body(Body::from("Hello, World!"), Some(5), move |summary| {
///     *slot.lock().unwrap() = Some(summary);
/// });
///
/// let forwarded = body.collect().await.unwrap().to_bytes();
/// assert_eq!(forwarded, "Hello, World!");
///
/// let summary = seen.lock().unwrap().take().unwrap();
/// assert_eq!(summary.bytes_written, 13);
/// assert_eq!(summary.captured.unwrap(), "Hello");
/// # }
/// ```
pub fn tap_body<F>(body: Body, capture_limit: Option<usize>, on_complete: F) -> Body
where
    F: FnOnce(TapSummary) + Send + 'static,
{
    Body::new(TapBody::new(body, capture_limit, on_complete))
}

/// Eagerly captures up to `limit` bytes of a request body.
///
/// Chunks are read until `limit` bytes have been captured or the body ends. The
/// returned body replays every chunk already read followed by the unread rest of
/// the original, so the downstream handler always receives the full body, even
/// when it is larger than `limit`.
///
/// A read error does not fail the request: it is logged, and the bytes read so
/// far are substituted as the whole body.
///
/// # Examples
///
/// ```rust
/// use response_logger::body_wrapper::capture_request_body;
/// use axum::body::Body;
/// use http_body_util::BodyExt;
///
/// # #[tokio::main]
/// # async fn main() {
/// let (body, captured) = capture_request_body(Body::from("abcdef"), 3).await;
/// assert_eq!(captured, "abc");
/// assert_eq!(body.collect().await.unwrap().to_bytes(), "abcdef");
/// # }
/// ```
pub async fn capture_request_body(body: Body, limit: usize) -> (Body, Bytes) {
    let mut rest = body.into_data_stream();
    let mut read = Vec::new();
    let mut capture = CaptureBuffer::new(limit);

    while !capture.is_full() {
        match rest.next().await {
            Some(Ok(chunk)) => {
                capture.push(&chunk);
                read.push(chunk);
            }
            Some(Err(e)) => {
                warn!(
                    error = %e,
                    captured = capture.len(),
                    "Failed to read request body for capture; forwarding partial body"
                );
                let partial = stream::iter(read.into_iter().map(Ok::<_, axum::Error>));
                return (Body::from_stream(partial), capture.into_bytes());
            }
            None => {
                let whole = stream::iter(read.into_iter().map(Ok::<_, axum::Error>));
                return (Body::from_stream(whole), capture.into_bytes());
            }
        }
    }

    let replay = stream::iter(read.into_iter().map(Ok::<_, axum::Error>)).chain(rest);
    (Body::from_stream(replay), capture.into_bytes())
}
