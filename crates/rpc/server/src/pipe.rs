//! Bounded single-producer/single-consumer byte pipe.
//!
//! Bridges the inbound chunk loop of a store call to the engine's payload
//! reader. The writer pushes whole chunks and blocks once `depth` chunks
//! are in flight; the reader implements [`AsyncRead`] and drains chunks in
//! arrival order. A normal close lets the reader drain buffered chunks
//! before end-of-stream; an error close makes the very next read fail,
//! buffered data or not.

use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::io::{AsyncRead, ReadBuf};
use tokio::sync::mpsc;

/// Create a pipe holding at most `depth` in-flight chunks.
pub(crate) fn chunk_pipe(depth: usize) -> (PipeWriter, PipeReader) {
    let (tx, rx) = mpsc::channel(depth);
    let fault = Arc::new(Fault::default());
    (
        PipeWriter {
            tx,
            fault: fault.clone(),
            closed: false,
        },
        PipeReader {
            rx,
            pending: Bytes::new(),
            fault,
        },
    )
}

/// Error slot shared by both halves.
///
/// Set at most once, and always before the writer's channel handle drops,
/// so a reader woken by channel closure observes the fault.
#[derive(Default)]
struct Fault(Mutex<Option<(io::ErrorKind, String)>>);

impl Fault {
    fn set(&self, err: io::Error) {
        let mut slot = self.0.lock();
        if slot.is_none() {
            *slot = Some((err.kind(), err.to_string()));
        }
    }

    fn get(&self) -> Option<io::Error> {
        self.0
            .lock()
            .as_ref()
            .map(|(kind, message)| io::Error::new(*kind, message.clone()))
    }
}

/// Write half of a chunk pipe. Exactly one exists per pipe.
pub(crate) struct PipeWriter {
    tx: mpsc::Sender<Bytes>,
    fault: Arc<Fault>,
    closed: bool,
}

impl PipeWriter {
    /// Queue one chunk, waiting until the reader makes room.
    ///
    /// Fails with [`io::ErrorKind::BrokenPipe`] once the reader is gone.
    pub(crate) async fn write(&mut self, chunk: Bytes) -> io::Result<()> {
        self.tx.send(chunk).await.map_err(|_| {
            io::Error::new(io::ErrorKind::BrokenPipe, "chunk pipe reader dropped")
        })
    }

    /// Close normally: the reader drains buffered chunks, then sees EOF.
    pub(crate) fn close(mut self) {
        self.closed = true;
    }

    /// Close with an error surfaced by the very next read.
    pub(crate) fn close_with_error(mut self, err: io::Error) {
        self.fault.set(err);
        self.closed = true;
    }
}

impl Drop for PipeWriter {
    fn drop(&mut self) {
        // An abandoned writer must not read as clean end-of-input.
        if !self.closed {
            self.fault.set(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "chunk stream aborted",
            ));
        }
    }
}

/// Read half of a chunk pipe; handed to the engine as its payload source.
pub(crate) struct PipeReader {
    rx: mpsc::Receiver<Bytes>,
    pending: Bytes,
    fault: Arc<Fault>,
}

impl AsyncRead for PipeReader {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        if let Some(err) = this.fault.get() {
            return Poll::Ready(Err(err));
        }
        loop {
            if !this.pending.is_empty() {
                let n = this.pending.len().min(buf.remaining());
                buf.put_slice(&this.pending.split_to(n));
                return Poll::Ready(Ok(()));
            }
            match this.rx.poll_recv(cx) {
                Poll::Ready(Some(chunk)) => this.pending = chunk,
                Poll::Ready(None) => {
                    // Closure races with the fault slot; prefer the fault.
                    return match this.fault.get() {
                        Some(err) => Poll::Ready(Err(err)),
                        None => Poll::Ready(Ok(())),
                    };
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::FutureExt;
    use std::time::Duration;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn bytes_arrive_in_order() {
        let (mut writer, mut reader) = chunk_pipe(4);
        writer.write(Bytes::from_static(b"ab")).await.unwrap();
        writer.write(Bytes::from_static(b"cd")).await.unwrap();
        writer.close();

        let mut out = Vec::new();
        reader.read_to_end(&mut out).await.unwrap();
        assert_eq!(out, b"abcd");
    }

    #[tokio::test]
    async fn write_blocks_when_pipe_is_full() {
        let (mut writer, mut reader) = chunk_pipe(1);
        writer.write(Bytes::from_static(b"a")).await.unwrap();

        // The pipe is at depth; the next write must not complete yet.
        assert!(writer.write(Bytes::from_static(b"b")).now_or_never().is_none());

        let mut buf = [0u8; 1];
        reader.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"a");
        writer.write(Bytes::from_static(b"b")).await.unwrap();
    }

    #[tokio::test]
    async fn short_reads_split_large_chunks() {
        let (mut writer, mut reader) = chunk_pipe(1);
        writer.write(Bytes::from_static(b"abcd")).await.unwrap();
        writer.close();

        let mut buf = [0u8; 3];
        reader.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"abc");
        let mut rest = Vec::new();
        reader.read_to_end(&mut rest).await.unwrap();
        assert_eq!(rest, b"d");
    }

    #[tokio::test]
    async fn error_close_preempts_buffered_chunks() {
        let (mut writer, mut reader) = chunk_pipe(4);
        writer.write(Bytes::from_static(b"abc")).await.unwrap();
        writer.close_with_error(io::Error::new(io::ErrorKind::TimedOut, "deadline"));

        let mut buf = [0u8; 8];
        let err = reader.read(&mut buf).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::TimedOut);

        // The fault is sticky: later reads keep failing.
        let err = reader.read(&mut buf).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::TimedOut);
    }

    #[tokio::test]
    async fn dropped_writer_breaks_the_pipe() {
        let (writer, mut reader) = chunk_pipe(4);
        drop(writer);

        let mut buf = [0u8; 8];
        let err = reader.read(&mut buf).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }

    #[tokio::test]
    async fn dropped_reader_fails_writes() {
        let (mut writer, reader) = chunk_pipe(4);
        drop(reader);

        let err = writer.write(Bytes::from_static(b"a")).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }

    #[tokio::test]
    async fn close_unblocks_a_pending_read() {
        let (writer, mut reader) = chunk_pipe(4);
        let pending = tokio::spawn(async move {
            let mut buf = [0u8; 8];
            reader.read(&mut buf).await
        });

        tokio::task::yield_now().await;
        writer.close();

        let n = tokio::time::timeout(Duration::from_secs(1), pending)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(n, 0);
    }
}
