//! Access Log
//!
//! One line per HTTP request in Apache Common Log Format, written either
//! straight to stdout or through an [`AsyncLogSink`] backed by a file.

use crate::infrastructure::async_log::{AsyncLogSink, LogSinkError};
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::net::SocketAddr;
use time::macros::format_description;
use time::OffsetDateTime;

/// Fields of one access-log line.
#[derive(Debug, Clone)]
pub struct AccessEntry {
    pub remote: Option<SocketAddr>,
    pub time: OffsetDateTime,
    pub method: String,
    pub uri: String,
    pub version: String,
    pub status: u16,
    pub size: u64,
}

impl AccessEntry {
    /// Render as a Common Log Format line, newline included.
    ///
    /// `host - - [10/Oct/2000:13:55:36 +0000] "GET /v1/metadata HTTP/1.1" 200 2326`
    pub fn to_common_log(&self) -> String {
        let host = self
            .remote
            .map(|addr| addr.ip().to_string())
            .unwrap_or_else(|| "-".to_string());
        let timestamp = self
            .time
            .format(format_description!(
                "[day]/[month repr:short]/[year]:[hour]:[minute]:[second] [offset_hour sign:mandatory][offset_minute]"
            ))
            .unwrap_or_else(|_| "-".to_string());

        format!(
            "{} - - [{}] \"{} {} {}\" {} {}\n",
            host, timestamp, self.method, self.uri, self.version, self.status, self.size
        )
    }
}

#[derive(Clone, Debug)]
enum Target {
    Stdout,
    Sink(AsyncLogSink),
}

/// Destination for access-log lines.
#[derive(Clone, Debug)]
pub struct AccessLogger {
    target: Target,
}

impl AccessLogger {
    /// Log to stdout, synchronously.
    pub fn stdout() -> Self {
        Self {
            target: Target::Stdout,
        }
    }

    /// Log through an existing asynchronous sink.
    pub fn with_sink(sink: AsyncLogSink) -> Self {
        Self {
            target: Target::Sink(sink),
        }
    }

    /// Open `path` for appending (created if missing) and log to it
    /// through a sink of `backlog` queued lines.
    pub fn open_file(path: &str, backlog: usize) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let sink = AsyncLogSink::new(file, backlog)?;
        Ok(Self::with_sink(sink))
    }

    /// The asynchronous sink, when logging to a file.
    pub fn sink(&self) -> Option<&AsyncLogSink> {
        match &self.target {
            Target::Sink(sink) => Some(sink),
            Target::Stdout => None,
        }
    }

    /// Record one entry. Never fails; a dropped line is only traced.
    pub fn record(&self, entry: &AccessEntry) {
        let line = entry.to_common_log();
        match &self.target {
            Target::Stdout => {
                if let Err(e) = io::stdout().lock().write_all(line.as_bytes()) {
                    tracing::debug!("failed to write access log to stdout: {}", e);
                }
            }
            Target::Sink(sink) => match sink.write(line.as_bytes()) {
                Ok(_) => {}
                Err(LogSinkError::BufferFull) => {
                    tracing::debug!(
                        dropped = sink.dropped(),
                        "access log buffer full, line dropped"
                    );
                }
                Err(LogSinkError::Closed) => {
                    tracing::debug!("access log closed, line dropped");
                }
            },
        }
    }

    /// Flush and stop the asynchronous sink, if any.
    pub fn close(&self) -> bool {
        match &self.target {
            Target::Sink(sink) => sink.close(),
            Target::Stdout => true,
        }
    }
}
