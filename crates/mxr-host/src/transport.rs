//! Sources of raw transport messages.

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, Lines};
use tokio::sync::mpsc;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A source of raw message bodies.
///
/// `recv` resolves to `Ok(None)` once the source is closed for good.
#[async_trait]
pub trait Transport: Send {
    async fn recv(&mut self) -> Result<Option<String>, TransportError>;
}

/// In-process transport fed through an mpsc channel.
#[derive(Debug)]
pub struct ChannelTransport {
    rx: mpsc::Receiver<String>,
}

impl ChannelTransport {
    pub fn new(capacity: usize) -> (mpsc::Sender<String>, Self) {
        let (tx, rx) = mpsc::channel(capacity);
        (tx, Self { rx })
    }
}

#[async_trait]
impl Transport for ChannelTransport {
    async fn recv(&mut self) -> Result<Option<String>, TransportError> {
        Ok(self.rx.recv().await)
    }
}

/// One raw message per line of an async reader. Blank lines are skipped.
pub struct LineTransport<R> {
    lines: Lines<R>,
}

impl<R: AsyncBufRead + Unpin + Send> LineTransport<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
        }
    }
}

#[async_trait]
impl<R: AsyncBufRead + Unpin + Send> Transport for LineTransport<R> {
    async fn recv(&mut self) -> Result<Option<String>, TransportError> {
        while let Some(line) = self.lines.next_line().await? {
            if !line.trim().is_empty() {
                return Ok(Some(line));
            }
        }
        Ok(None)
    }
}
