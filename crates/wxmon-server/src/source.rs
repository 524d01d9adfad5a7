//! Inbound transport for weather envelopes.
//!
//! A [`MessageSource`] yields raw envelope bytes one message at a time. It
//! knows nothing about the envelope format; decoding happens in the
//! dispatcher so a malformed message never looks like a transport failure.

use crate::config::SourceConfig;
use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::sync::mpsc;
use wxmon_common::envelope::MAX_ENVELOPE_BYTES;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Transport: stream closed")]
    Closed,

    #[error("Transport: {0}")]
    Io(#[from] std::io::Error),
}

/// Blocking (async) receive of the next raw message.
#[async_trait]
pub trait MessageSource: Send {
    /// Waits for the next message. There is no timeout; an error is fatal to
    /// the consuming loop.
    async fn recv(&mut self) -> Result<Vec<u8>, TransportError>;
}

/// In-process source fed through a tokio mpsc channel.
pub struct ChannelSource {
    rx: mpsc::Receiver<Vec<u8>>,
}

impl ChannelSource {
    /// Returns the producer half together with the source.
    pub fn new(capacity: usize) -> (mpsc::Sender<Vec<u8>>, Self) {
        let (tx, rx) = mpsc::channel(capacity);
        (tx, Self { rx })
    }
}

#[async_trait]
impl MessageSource for ChannelSource {
    async fn recv(&mut self) -> Result<Vec<u8>, TransportError> {
        self.rx.recv().await.ok_or(TransportError::Closed)
    }
}

/// Newline-delimited messages from any buffered reader (stdin, a file, a TCP
/// stream). Blank lines are skipped.
///
/// At most `max_line + 1` bytes of a line are buffered. Longer lines are
/// yielded as that prefix with the remainder discarded, so the decoder sees
/// them as oversized.
pub struct LineSource<R> {
    reader: R,
    buf: Vec<u8>,
    max_line: usize,
}

impl<R> LineSource<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    pub fn new(reader: R) -> Self {
        Self::with_max_line(reader, MAX_ENVELOPE_BYTES)
    }

    pub fn with_max_line(reader: R, max_line: usize) -> Self {
        Self {
            reader,
            buf: Vec::with_capacity(4096),
            max_line,
        }
    }

    /// Drops input up to and including the next newline.
    async fn discard_line(&mut self) -> Result<(), TransportError> {
        loop {
            let available = self.reader.fill_buf().await?;
            if available.is_empty() {
                return Ok(());
            }
            match available.iter().position(|&b| b == b'\n') {
                Some(i) => {
                    self.reader.consume(i + 1);
                    return Ok(());
                }
                None => {
                    let len = available.len();
                    self.reader.consume(len);
                }
            }
        }
    }
}

#[async_trait]
impl<R> MessageSource for LineSource<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    async fn recv(&mut self) -> Result<Vec<u8>, TransportError> {
        loop {
            self.buf.clear();
            let cap = self.max_line as u64 + 1;
            let n = (&mut self.reader)
                .take(cap)
                .read_until(b'\n', &mut self.buf)
                .await?;
            if n == 0 {
                return Err(TransportError::Closed);
            }
            if self.buf.len() as u64 == cap && self.buf.last() != Some(&b'\n') {
                self.discard_line().await?;
                tracing::warn!(max_line = self.max_line, "Discarding remainder of overlong line");
                return Ok(self.buf.clone());
            }
            let line = self.buf.trim_ascii();
            if !line.is_empty() {
                return Ok(line.to_vec());
            }
        }
    }
}

/// Opens the source named by the server configuration.
pub async fn open(config: &SourceConfig) -> Result<Box<dyn MessageSource>, TransportError> {
    let source: Box<dyn MessageSource> = match config {
        SourceConfig::Stdin => Box::new(LineSource::new(BufReader::new(tokio::io::stdin()))),
        SourceConfig::File { path } => {
            let file = tokio::fs::File::open(path).await?;
            Box::new(LineSource::new(BufReader::new(file)))
        }
        SourceConfig::Tcp { addr } => {
            let stream = tokio::net::TcpStream::connect(addr.as_str()).await?;
            Box::new(LineSource::new(BufReader::new(stream)))
        }
    };
    tracing::info!(source = %config, "Message source opened");
    Ok(source)
}
