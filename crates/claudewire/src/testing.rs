//! Testing utilities
//!
//! [`mock_pair`] returns an in-memory [`Transport`] and the [`MockPeer`] that
//! plays the CLI on the other end. The peer sees every frame the session
//! writes and scripts what the session reads, including read failures and
//! end of stream.
//!
//! ```no_run
//! # use claudewire::{Session, SessionConfig, testing::mock_pair};
//! # use serde_json::json;
//! # async fn example() -> claudewire::Result<()> {
//! let (transport, mut peer) = mock_pair();
//! let session = Session::with_transport(transport, SessionConfig::default())?;
//!
//! peer.send(&json!({"type": "result", "subtype": "success", "is_error": false,
//!     "uuid": "u1", "session_id": session.session_id()}));
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use claudewire_protocol::{ControlResponse, Outbound, decode_outbound};
use claudewire_transport::{Transport, TransportError};
use serde_json::Value;
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;

/// What the session reads next
#[derive(Debug)]
pub enum PeerEvent {
    /// One frame, without its terminator
    Frame(Vec<u8>),
    /// The read fails with this error
    Fail(TransportError),
    /// End of stream
    Eof,
}

/// In-memory transport driven by a [`MockPeer`]
#[derive(Debug)]
pub struct MockTransport {
    inbound: Mutex<mpsc::UnboundedReceiver<PeerEvent>>,
    outbound: mpsc::UnboundedSender<Vec<u8>>,
    fail_writes: Arc<AtomicBool>,
    ended: AtomicBool,
    closes: AtomicUsize,
    closed: CancellationToken,
}

/// The CLI side of a [`MockTransport`]
#[derive(Debug)]
pub struct MockPeer {
    inbound: mpsc::UnboundedSender<PeerEvent>,
    outbound: mpsc::UnboundedReceiver<Vec<u8>>,
    fail_writes: Arc<AtomicBool>,
    transport: Arc<MockTransport>,
}

/// Create a connected transport and peer
pub fn mock_pair() -> (Arc<MockTransport>, MockPeer) {
    let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
    let fail_writes = Arc::new(AtomicBool::new(false));

    let transport = Arc::new(MockTransport {
        inbound: Mutex::new(inbound_rx),
        outbound: outbound_tx,
        fail_writes: Arc::clone(&fail_writes),
        ended: AtomicBool::new(false),
        closes: AtomicUsize::new(0),
        closed: CancellationToken::new(),
    });
    let peer = MockPeer {
        inbound: inbound_tx,
        outbound: outbound_rx,
        fail_writes,
        transport: Arc::clone(&transport),
    };
    (transport, peer)
}

impl MockTransport {
    /// Number of times `close` was called
    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    async fn next_event(&self) -> claudewire_transport::Result<Option<Vec<u8>>> {
        if self.ended.load(Ordering::SeqCst) {
            return Ok(None);
        }
        match self.inbound.lock().await.recv().await {
            Some(PeerEvent::Frame(frame)) => Ok(Some(frame)),
            Some(PeerEvent::Fail(err)) => Err(err),
            Some(PeerEvent::Eof) | None => {
                self.ended.store(true, Ordering::SeqCst);
                Ok(None)
            }
        }
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn read_frame(
        &self,
        cancel: &CancellationToken,
    ) -> claudewire_transport::Result<Option<Vec<u8>>> {
        tokio::select! {
            biased;
            _ = self.closed.cancelled() => Err(TransportError::Closed),
            _ = cancel.cancelled() => Err(TransportError::Cancelled),
            event = self.next_event() => event,
        }
    }

    async fn write_frame(
        &self,
        cancel: &CancellationToken,
        frame: &[u8],
    ) -> claudewire_transport::Result<()> {
        if self.closed.is_cancelled() {
            return Err(TransportError::Closed);
        }
        if cancel.is_cancelled() {
            return Err(TransportError::Cancelled);
        }
        if frame.contains(&b'\n') {
            return Err(TransportError::InvalidFrame(
                "frame contains a newline".to_string(),
            ));
        }
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(TransportError::Write(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "mock peer rejected the write",
            )));
        }
        self.outbound
            .send(frame.to_vec())
            .map_err(|_| TransportError::Write(io::Error::from(io::ErrorKind::BrokenPipe)))
    }

    async fn close(&self) -> claudewire_transport::Result<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        self.closed.cancel();
        Ok(())
    }
}

impl MockPeer {
    /// Send a JSON value as one frame
    pub fn send(&self, value: &Value) {
        self.send_raw(value.to_string());
    }

    /// Send raw bytes as one frame
    pub fn send_raw(&self, frame: impl Into<Vec<u8>>) {
        let _ = self.inbound.send(PeerEvent::Frame(frame.into()));
    }

    /// Make the session's next read fail
    pub fn fail_read(&self, err: TransportError) {
        let _ = self.inbound.send(PeerEvent::Fail(err));
    }

    /// Signal end of stream
    pub fn end_stream(&self) {
        let _ = self.inbound.send(PeerEvent::Eof);
    }

    /// Make every later write fail, or succeed again
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Whether the transport has been closed
    pub fn is_closed(&self) -> bool {
        self.transport.closed.is_cancelled()
    }

    /// Next frame the session wrote, raw
    pub async fn next_raw(&mut self) -> Option<Vec<u8>> {
        self.outbound.recv().await
    }

    /// Next frame the session wrote, as JSON
    ///
    /// Returns `None` once the session side is gone or the frame is not JSON.
    pub async fn next_frame(&mut self) -> Option<Value> {
        let frame = self.next_raw().await?;
        serde_json::from_slice(&frame).ok()
    }

    /// Next frame the session wrote, decoded as an outbound frame
    pub async fn next_outbound(&mut self) -> Option<Outbound> {
        let frame = self.next_raw().await?;
        decode_outbound(&frame).ok()
    }

    /// Wait for the next control request and answer it
    ///
    /// Frames other than control requests are skipped. Returns the answered
    /// request so callers can inspect it.
    pub async fn answer_control(
        &mut self,
        result: Result<Option<Value>, String>,
    ) -> Option<Value> {
        loop {
            let frame = self.next_frame().await?;
            if frame["type"] != "control_request" {
                continue;
            }
            let request_id = frame["request_id"].as_str()?.to_string();
            let response = match result {
                Ok(payload) => ControlResponse::success(request_id, payload),
                Err(message) => ControlResponse::error(request_id, message),
            };
            self.send(&serde_json::to_value(&response).ok()?);
            return Some(frame);
        }
    }
}
