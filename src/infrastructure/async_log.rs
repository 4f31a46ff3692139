//! Asynchronous Log Sink
//!
//! Bounded, non-blocking writer for access-log lines. Producers enqueue
//! without ever waiting; a single background thread drains the queue into
//! the destination in FIFO order. When the queue is full the line is
//! dropped and the producer is told so.

use parking_lot::{Mutex, RwLock};
use std::io::{self, Write};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use tokio::sync::mpsc;

/// Default queue capacity (lines in flight).
pub const DEFAULT_LOG_BACKLOG: usize = 1000;

/// Errors returned by [`AsyncLogSink::write`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum LogSinkError {
    #[error("async log buffer full")]
    BufferFull,
    #[error("async log sink closed")]
    Closed,
}

/// Handle to a bounded asynchronous log writer.
///
/// Cheap to clone; all clones feed the same queue and worker.
#[derive(Clone)]
pub struct AsyncLogSink {
    inner: Arc<Inner>,
}

struct Inner {
    /// `None` once the sink is closed
    tx: RwLock<Option<mpsc::Sender<Vec<u8>>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    capacity: usize,
    dropped: AtomicU64,
}

impl AsyncLogSink {
    /// Create a sink of `capacity` queued payloads draining into `destination`.
    ///
    /// Starts the drain thread immediately. Fails if `capacity` is zero or
    /// the thread cannot be spawned.
    pub fn new<W>(destination: W, capacity: usize) -> io::Result<Self>
    where
        W: Write + Send + 'static,
    {
        if capacity == 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "log buffer capacity must be positive",
            ));
        }

        let (tx, rx) = mpsc::channel(capacity);
        let worker = std::thread::Builder::new()
            .name("async-log".to_string())
            .spawn(move || drain(rx, destination))?;

        Ok(Self {
            inner: Arc::new(Inner {
                tx: RwLock::new(Some(tx)),
                worker: Mutex::new(Some(worker)),
                capacity,
                dropped: AtomicU64::new(0),
            }),
        })
    }

    /// Enqueue `payload` without waiting.
    ///
    /// Returns the number of bytes accepted, or `BufferFull` when the queue
    /// has no free slot. A rejected payload is discarded.
    pub fn write(&self, payload: &[u8]) -> Result<usize, LogSinkError> {
        let guard = self.inner.tx.read();
        let tx = guard.as_ref().ok_or(LogSinkError::Closed)?;

        // Bound to a local so the permit's borrow of `guard` ends first.
        #[allow(clippy::let_and_return)]
        let result = match tx.try_reserve() {
            Ok(permit) => {
                permit.send(payload.to_vec());
                Ok(payload.len())
            }
            Err(mpsc::error::TrySendError::Full(())) => {
                self.inner.dropped.fetch_add(1, Ordering::Relaxed);
                Err(LogSinkError::BufferFull)
            }
            Err(mpsc::error::TrySendError::Closed(())) => Err(LogSinkError::Closed),
        };
        result
    }

    /// Number of payloads rejected with `BufferFull` so far.
    pub fn dropped(&self) -> u64 {
        self.inner.dropped.load(Ordering::Relaxed)
    }

    pub fn is_closed(&self) -> bool {
        self.inner.tx.read().is_none()
    }

    /// Stop accepting payloads, drain what is queued and join the worker.
    ///
    /// Blocks until the destination has received every accepted payload.
    /// Idempotent; returns `false` if the worker panicked.
    pub fn close(&self) -> bool {
        // Dropping the last sender ends the worker loop once the queue is empty.
        drop(self.inner.tx.write().take());

        let worker = self.inner.worker.lock().take();
        match worker {
            Some(handle) => match handle.join() {
                Ok(()) => true,
                Err(_) => {
                    tracing::error!("async log worker panicked");
                    false
                }
            },
            None => true,
        }
    }
}

impl Write for AsyncLogSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        AsyncLogSink::write(self, buf).map_err(|e| match e {
            LogSinkError::BufferFull => io::Error::new(io::ErrorKind::WouldBlock, e),
            LogSinkError::Closed => io::Error::new(io::ErrorKind::BrokenPipe, e),
        })
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl std::fmt::Debug for AsyncLogSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncLogSink")
            .field("capacity", &self.inner.capacity)
            .field("dropped", &self.dropped())
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Worker loop: oldest payload first, one synchronous write each.
fn drain<W: Write>(mut rx: mpsc::Receiver<Vec<u8>>, mut destination: W) {
    while let Some(payload) = rx.blocking_recv() {
        if let Err(e) = destination.write_all(&payload) {
            tracing::warn!("failed to write access log line: {}", e);
            continue;
        }
        if let Err(e) = destination.flush() {
            tracing::warn!("failed to flush access log: {}", e);
        }
    }
    tracing::debug!("async log worker stopped");
}
