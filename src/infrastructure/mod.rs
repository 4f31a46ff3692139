//! Infrastructure Layer
//!
//! Cross-cutting concerns: access logging and graceful shutdown.

pub mod access_log;
pub mod async_log;
pub mod shutdown;

pub use access_log::{AccessEntry, AccessLogger};
pub use async_log::{AsyncLogSink, LogSinkError, DEFAULT_LOG_BACKLOG};
pub use shutdown::{shutdown_signal, RequestGuard, ShutdownController};
