//! Newline-delimited framing over a pair of byte streams
//!
//! A frame is every byte up to and including `\n`. Reads and writes are
//! serialized by independent locks, so a pending read never holds up a
//! write and two writers can never interleave partial frames.

use crate::error::{Result, TransportError};
use crate::traits::Transport;
use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Default maximum frame size (1 MiB)
pub const DEFAULT_MAX_FRAME_SIZE: usize = 1024 * 1024;

/// Boxed read half
pub type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;

/// Boxed write half
pub type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

const ACCUMULATION_OP: &str = "json_accumulation";

/// Line-framed transport over arbitrary async streams
pub struct FramedTransport {
    reader: Mutex<Option<BufReader<BoxedReader>>>,
    writer: Mutex<Option<BoxedWriter>>,
    diagnostics: Mutex<Option<BoxedReader>>,
    max_frame_size: usize,
    closed: CancellationToken,
}

impl std::fmt::Debug for FramedTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FramedTransport")
            .field("max_frame_size", &self.max_frame_size)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

impl FramedTransport {
    /// Create a transport; a `max_frame_size` of 0 disables the limit
    pub fn new(reader: BoxedReader, writer: BoxedWriter, max_frame_size: usize) -> Self {
        Self {
            reader: Mutex::new(Some(BufReader::new(reader))),
            writer: Mutex::new(Some(writer)),
            diagnostics: Mutex::new(None),
            max_frame_size,
            closed: CancellationToken::new(),
        }
    }

    /// Attach a diagnostics stream, released together with the others on close
    pub fn with_diagnostics(mut self, diagnostics: BoxedReader) -> Self {
        self.diagnostics = Mutex::new(Some(diagnostics));
        self
    }

    /// Take the diagnostics stream for a dedicated reader
    pub async fn take_diagnostics(&self) -> Option<BoxedReader> {
        self.diagnostics.lock().await.take()
    }

    /// Token cancelled when the transport closes
    pub fn close_signal(&self) -> CancellationToken {
        self.closed.clone()
    }

    /// Configured frame limit
    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }

    /// Whether [`close`](Self::close) has run
    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// Read one frame, or `None` at end of stream
    ///
    /// A final line without a terminator is still returned as a frame.
    pub async fn read(&self, cancel: &CancellationToken) -> Result<Option<Vec<u8>>> {
        let mut guard = tokio::select! {
            biased;
            _ = self.closed.cancelled() => return Err(TransportError::Closed),
            _ = cancel.cancelled() => return Err(TransportError::Cancelled),
            guard = self.reader.lock() => guard,
        };
        let reader = guard.as_mut().ok_or(TransportError::Closed)?;

        tokio::select! {
            biased;
            _ = self.closed.cancelled() => Err(TransportError::Closed),
            _ = cancel.cancelled() => Err(TransportError::Cancelled),
            frame = read_frame(reader, self.max_frame_size) => frame,
        }
    }

    /// Write one frame, appending the terminator
    pub async fn write(&self, cancel: &CancellationToken, frame: &[u8]) -> Result<()> {
        if frame.contains(&b'\n') {
            return Err(TransportError::InvalidFrame(
                "frame must not contain a newline".to_string(),
            ));
        }
        let mut line = Vec::with_capacity(frame.len() + 1);
        line.extend_from_slice(frame);
        line.push(b'\n');

        let mut guard = tokio::select! {
            biased;
            _ = self.closed.cancelled() => return Err(TransportError::Closed),
            _ = cancel.cancelled() => return Err(TransportError::Cancelled),
            guard = self.writer.lock() => guard,
        };
        let writer = guard.as_mut().ok_or(TransportError::Closed)?;

        tokio::select! {
            biased;
            _ = self.closed.cancelled() => Err(TransportError::Closed),
            _ = cancel.cancelled() => Err(TransportError::Cancelled),
            written = async {
                writer.write_all(&line).await?;
                writer.flush().await
            } => written.map_err(TransportError::Write),
        }
    }

    /// Release every stream, returning the first failure
    ///
    /// All streams are released even when an earlier one fails.
    pub async fn close(&self) -> Result<()> {
        self.closed.cancel();
        let mut first_error = None;

        if let Some(mut writer) = self.writer.lock().await.take() {
            if let Err(e) = writer.shutdown().await {
                debug!(error = %e, "stdin shutdown failed");
                first_error.get_or_insert(TransportError::Io(e));
            }
        }
        drop(self.reader.lock().await.take());
        drop(self.diagnostics.lock().await.take());

        debug!("framed transport closed");
        first_error.map_or(Ok(()), Err)
    }
}

async fn read_frame<R>(reader: &mut R, limit: usize) -> Result<Option<Vec<u8>>>
where
    R: AsyncBufRead + Unpin,
{
    let mut frame = Vec::new();

    if limit == 0 {
        let n = reader
            .read_until(b'\n', &mut frame)
            .await
            .map_err(TransportError::Read)?;
        return Ok((n > 0).then_some(frame));
    }

    loop {
        let available = reader.fill_buf().await.map_err(TransportError::Read)?;
        if available.is_empty() {
            return Ok((!frame.is_empty()).then_some(frame));
        }

        let (take, complete) = match available.iter().position(|&b| b == b'\n') {
            Some(pos) => (pos + 1, true),
            None => (available.len(), false),
        };
        if frame.len() + take > limit {
            return Err(TransportError::FrameTooLarge {
                limit,
                actual: limit + 1,
                operation: ACCUMULATION_OP,
            });
        }

        frame.extend_from_slice(&available[..take]);
        reader.consume(take);
        if complete {
            return Ok(Some(frame));
        }
    }
}

#[async_trait]
impl Transport for FramedTransport {
    async fn read_frame(&self, cancel: &CancellationToken) -> Result<Option<Vec<u8>>> {
        self.read(cancel).await
    }

    async fn write_frame(&self, cancel: &CancellationToken, frame: &[u8]) -> Result<()> {
        self.write(cancel, frame).await
    }

    async fn close(&self) -> Result<()> {
        FramedTransport::close(self).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use tokio::io::{AsyncReadExt, duplex};

    fn pair(max: usize) -> (FramedTransport, tokio::io::DuplexStream, tokio::io::DuplexStream) {
        let (ours_in, theirs_out) = duplex(64 * 1024);
        let (theirs_in, ours_out) = duplex(64 * 1024);
        let transport = FramedTransport::new(Box::new(ours_in), Box::new(ours_out), max);
        (transport, theirs_out, theirs_in)
    }

    #[tokio::test]
    async fn test_reads_frames_in_order() {
        let (transport, mut peer, _sink) = pair(DEFAULT_MAX_FRAME_SIZE);
        peer.write_all(b"{\"a\":1}\n{\"b\":2}\n").await.unwrap();
        drop(peer);

        let cancel = CancellationToken::new();
        assert_eq!(transport.read(&cancel).await.unwrap().unwrap(), b"{\"a\":1}\n");
        assert_eq!(transport.read(&cancel).await.unwrap().unwrap(), b"{\"b\":2}\n");
        assert!(transport.read(&cancel).await.unwrap().is_none());
    }

    #[rstest]
    #[case::below_limit(7, true)]
    #[case::exactly_limit(8, true)]
    #[case::one_over(9, false)]
    #[tokio::test]
    async fn test_frame_limit_boundary(#[case] frame_len: usize, #[case] fits: bool) {
        let (transport, mut peer, _sink) = pair(8);
        let mut frame = vec![b'x'; frame_len - 1];
        frame.push(b'\n');
        peer.write_all(&frame).await.unwrap();

        let result = transport.read(&CancellationToken::new()).await;
        if fits {
            assert_eq!(result.unwrap().unwrap().len(), frame_len);
        } else {
            match result.unwrap_err() {
                TransportError::FrameTooLarge {
                    limit,
                    actual,
                    operation,
                } => {
                    assert_eq!(limit, 8);
                    assert_eq!(actual, 9);
                    assert_eq!(operation, "json_accumulation");
                }
                other => panic!("expected FrameTooLarge, got {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn test_unlimited_reads_large_frame() {
        let (transport, mut peer, _sink) = pair(0);
        let mut frame = vec![b'y'; 200_000];
        frame.push(b'\n');
        let writer = tokio::spawn(async move {
            peer.write_all(&frame).await.unwrap();
        });
        let read = transport.read(&CancellationToken::new()).await.unwrap().unwrap();
        writer.await.unwrap();
        assert_eq!(read.len(), 200_001);
    }

    #[tokio::test]
    async fn test_unterminated_final_line_is_a_frame() {
        let (transport, mut peer, _sink) = pair(DEFAULT_MAX_FRAME_SIZE);
        peer.write_all(b"{\"tail\":true}").await.unwrap();
        drop(peer);

        let cancel = CancellationToken::new();
        assert_eq!(transport.read(&cancel).await.unwrap().unwrap(), b"{\"tail\":true}");
        assert!(transport.read(&cancel).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unterminated_final_line_respects_limit() {
        let (transport, mut peer, _sink) = pair(4);
        peer.write_all(b"abcdef").await.unwrap();
        drop(peer);

        let err = transport.read(&CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, TransportError::FrameTooLarge { limit: 4, .. }));
    }

    #[tokio::test]
    async fn test_write_appends_terminator() {
        let (transport, _peer, mut sink) = pair(DEFAULT_MAX_FRAME_SIZE);
        transport
            .write(&CancellationToken::new(), b"{\"type\":\"user\"}")
            .await
            .unwrap();
        transport.close().await.unwrap();

        let mut written = Vec::new();
        sink.read_to_end(&mut written).await.unwrap();
        assert_eq!(written, b"{\"type\":\"user\"}\n");
    }

    #[tokio::test]
    async fn test_write_rejects_embedded_newline() {
        let (transport, _peer, _sink) = pair(DEFAULT_MAX_FRAME_SIZE);
        let err = transport
            .write(&CancellationToken::new(), b"{}\n{}")
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::InvalidFrame(_)));
    }

    #[tokio::test]
    async fn test_cancelled_read_returns_cancelled() {
        let (transport, _peer, _sink) = pair(DEFAULT_MAX_FRAME_SIZE);
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let err = transport.read(&cancel).await.unwrap_err();
        assert!(err.is_cancelled());
    }

    #[tokio::test]
    async fn test_write_proceeds_while_read_pending() {
        let (transport, _peer, mut sink) = pair(DEFAULT_MAX_FRAME_SIZE);
        let transport = std::sync::Arc::new(transport);

        let reader = {
            let transport = transport.clone();
            tokio::spawn(async move { transport.read(&CancellationToken::new()).await })
        };
        tokio::task::yield_now().await;

        transport
            .write(&CancellationToken::new(), b"{}")
            .await
            .unwrap();
        let mut buf = [0u8; 3];
        sink.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"{}\n");

        transport.close().await.unwrap();
        assert!(matches!(
            reader.await.unwrap().unwrap_err(),
            TransportError::Closed
        ));
    }

    #[tokio::test]
    async fn test_close_is_idempotent_and_final() {
        let (transport, _peer, _sink) = pair(DEFAULT_MAX_FRAME_SIZE);
        let transport = transport.with_diagnostics(Box::new(tokio::io::empty()));
        transport.close().await.unwrap();
        transport.close().await.unwrap();
        assert!(transport.is_closed());
        assert!(transport.take_diagnostics().await.is_none());

        let cancel = CancellationToken::new();
        assert!(matches!(
            transport.read(&cancel).await.unwrap_err(),
            TransportError::Closed
        ));
        assert!(matches!(
            transport.write(&cancel, b"{}").await.unwrap_err(),
            TransportError::Closed
        ));
    }

    #[tokio::test]
    async fn test_read_error_surfaces() {
        let mock = tokio_test::io::Builder::new()
            .read(b"{\"partial\":")
            .read_error(std::io::Error::other("pipe reset"))
            .build();
        let transport = FramedTransport::new(
            Box::new(mock),
            Box::new(tokio::io::sink()),
            DEFAULT_MAX_FRAME_SIZE,
        );

        let err = transport.read(&CancellationToken::new()).await.unwrap_err();
        match err {
            TransportError::Read(e) => assert_eq!(e.to_string(), "pipe reset"),
            other => panic!("expected read error, got {other:?}"),
        }
    }
}
