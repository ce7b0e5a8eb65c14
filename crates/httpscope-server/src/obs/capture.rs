//! Response capture: observes status and body bytes on their way out.
//!
//! The wrapper forwards every frame as soon as the inner body yields it and
//! never buffers, so the bytes on the wire are identical to the
//! uninstrumented path. Completion fires exactly once: at end of stream, on a
//! body error, or when the body is dropped before finishing (client gone).

use std::pin::Pin;
use std::task::{Context, Poll};

use axum::http::StatusCode;
use bytes::Bytes;
use http_body::{Body, Frame, SizeHint};

/// Status and byte count seen for one response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseCapture {
    status: StatusCode,
    bytes_written: u64,
}

impl Default for ResponseCapture {
    fn default() -> Self {
        Self {
            status: StatusCode::OK,
            bytes_written: 0,
        }
    }
}

impl ResponseCapture {
    /// Status defaults to 200 until set.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    pub fn record_write(&mut self, n: usize) {
        self.bytes_written += n as u64;
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }
}

/// Body wrapper that counts data bytes into a [`ResponseCapture`] and hands
/// the final capture to `on_complete`.
pub struct CaptureBody<B, F>
where
    F: FnOnce(&ResponseCapture),
{
    inner: B,
    capture: ResponseCapture,
    on_complete: Option<F>,
}

impl<B, F> CaptureBody<B, F>
where
    F: FnOnce(&ResponseCapture),
{
    pub fn new(inner: B, capture: ResponseCapture, on_complete: F) -> Self {
        Self {
            inner,
            capture,
            on_complete: Some(on_complete),
        }
    }

    pub fn capture(&self) -> &ResponseCapture {
        &self.capture
    }

    fn complete(&mut self) {
        if let Some(f) = self.on_complete.take() {
            f(&self.capture);
        }
    }
}

impl<B, F> Drop for CaptureBody<B, F>
where
    F: FnOnce(&ResponseCapture),
{
    fn drop(&mut self) {
        self.complete();
    }
}

impl<B, F> Body for CaptureBody<B, F>
where
    B: Body<Data = Bytes> + Unpin,
    F: FnOnce(&ResponseCapture) + Unpin,
{
    type Data = Bytes;
    type Error = B::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();
        match Pin::new(&mut this.inner).poll_frame(cx) {
            Poll::Ready(Some(Ok(frame))) => {
                if let Some(data) = frame.data_ref() {
                    this.capture.record_write(data.len());
                }
                Poll::Ready(Some(Ok(frame)))
            }
            // Bytes already forwarded stay counted; the error goes out as is.
            Poll::Ready(Some(Err(e))) => {
                this.complete();
                Poll::Ready(Some(Err(e)))
            }
            Poll::Ready(None) => {
                this.complete();
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}
