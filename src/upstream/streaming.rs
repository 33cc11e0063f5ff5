//! Buffer-pooled response streaming.
//!
//! Response bodies are moved to the client through a fixed-size buffer borrowed
//! from a shared pool, so memory per in-flight response stays bounded no matter
//! how large the upstream's frames are.

use bytes::{Buf, Bytes, BytesMut};
use http_body::{Body, Frame, SizeHint};
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{ready, Context, Poll};

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Bounded pool of reusable fixed-size buffers.
#[derive(Debug)]
pub struct BufferPool {
    free: Mutex<Vec<BytesMut>>,
    buffer_size: usize,
    max_idle: usize,
}

impl BufferPool {
    /// `max_idle` caps how many returned buffers are kept for reuse.
    pub fn new(buffer_size: usize, max_idle: usize) -> Self {
        Self {
            free: Mutex::new(Vec::new()),
            buffer_size,
            max_idle,
        }
    }

    /// Borrow a buffer. It goes back to the pool when the guard drops.
    pub fn get(self: &Arc<Self>) -> PooledBuffer {
        let reused = self.free.lock().ok().and_then(|mut free| free.pop());
        let buf = reused.unwrap_or_else(|| BytesMut::with_capacity(self.buffer_size));
        PooledBuffer {
            buf: Some(buf),
            pool: Arc::clone(self),
        }
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    /// Buffers currently parked in the pool.
    pub fn idle(&self) -> usize {
        self.free.lock().map(|free| free.len()).unwrap_or(0)
    }

    fn put(&self, mut buf: BytesMut) {
        buf.clear();
        if let Ok(mut free) = self.free.lock() {
            if free.len() < self.max_idle {
                free.push(buf);
            }
        }
    }
}

/// A buffer on loan from a [`BufferPool`].
#[derive(Debug)]
pub struct PooledBuffer {
    buf: Option<BytesMut>,
    pool: Arc<BufferPool>,
}

impl PooledBuffer {
    /// Copy up to one buffer's worth of `src` and hand it out as a frozen chunk.
    ///
    /// The chunk shares the buffer's allocation; once the chunk is dropped the
    /// next `fill` reclaims that space instead of allocating.
    fn fill(&mut self, src: &mut Bytes) -> Bytes {
        let size = self.pool.buffer_size;
        let buf = self.buf.get_or_insert_with(|| BytesMut::with_capacity(size));
        buf.clear();
        buf.reserve(size);
        let n = src.len().min(size);
        buf.extend_from_slice(&src[..n]);
        src.advance(n);
        buf.split().freeze()
    }
}

impl Drop for PooledBuffer {
    fn drop(&mut self) {
        if let Some(buf) = self.buf.take() {
            self.pool.put(buf);
        }
    }
}

/// Response body that relays an upstream body through a pooled buffer.
///
/// `L` is whatever must stay alive while the body streams (admission permit,
/// host slot). The buffer and `L` are released when the upstream ends, when
/// it fails, or when the client goes away and the body is dropped.
pub struct StreamingBody<B, L> {
    upstream: B,
    buffer: Option<PooledBuffer>,
    lease: Option<L>,
    pending: Bytes,
    done: bool,
}

impl<B, L> StreamingBody<B, L> {
    pub fn new(upstream: B, buffer: PooledBuffer, lease: L) -> Self {
        Self {
            upstream,
            buffer: Some(buffer),
            lease: Some(lease),
            pending: Bytes::new(),
            done: false,
        }
    }

    fn release(&mut self) {
        self.done = true;
        self.buffer = None;
        self.lease = None;
    }
}

impl<B, L> Body for StreamingBody<B, L>
where
    B: Body<Data = Bytes> + Unpin,
    B::Error: Into<BoxError>,
    L: Unpin,
{
    type Data = Bytes;
    type Error = BoxError;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();
        loop {
            if !this.pending.is_empty() {
                if let Some(buffer) = this.buffer.as_mut() {
                    let chunk = buffer.fill(&mut this.pending);
                    return Poll::Ready(Some(Ok(Frame::data(chunk))));
                }
                // Buffer already released: pass the rest through as is.
                let rest = std::mem::take(&mut this.pending);
                return Poll::Ready(Some(Ok(Frame::data(rest))));
            }
            if this.done {
                return Poll::Ready(None);
            }

            match ready!(Pin::new(&mut this.upstream).poll_frame(cx)) {
                Some(Ok(frame)) => match frame.into_data() {
                    Ok(data) => this.pending = data,
                    Err(trailers) => return Poll::Ready(Some(Ok(trailers))),
                },
                Some(Err(e)) => {
                    tracing::debug!("upstream body error, abandoning copy");
                    this.release();
                    return Poll::Ready(Some(Err(e.into())));
                }
                None => {
                    this.release();
                    return Poll::Ready(None);
                }
            }
        }
    }

    fn is_end_stream(&self) -> bool {
        self.pending.is_empty() && (self.done || self.upstream.is_end_stream())
    }

    fn size_hint(&self) -> SizeHint {
        let upstream = self.upstream.size_hint();
        let pending = self.pending.len() as u64;
        let mut hint = SizeHint::new();
        hint.set_lower(upstream.lower() + pending);
        if let Some(upper) = upstream.upper() {
            hint.set_upper(upper + pending);
        }
        hint
    }
}
