//! Frame routing for a session
//!
//! One receive loop reads every inbound frame and classifies it:
//!
//! - control responses complete the matching pending request, or are
//!   discarded when nobody is waiting any more;
//! - control requests from the peer are dispatched on their own task, so a
//!   slow callback never stalls ingestion; one whose body cannot be decoded
//!   is answered with an error response;
//! - everything else is published, in order, on the bounded message queue.
//!
//! The pending table and the hook registry live behind one mutex scoped to
//! the session. Critical sections never cross an `.await`.

use crate::error::{Result, SessionError};
use crate::hooks::{HookCallback, HookRegistry};
use crate::permissions::{CanUseTool, ToolPermissionContext};
use crate::session::state::SessionState;
use claudewire_protocol::codec::{self, Inbound};
use claudewire_protocol::control::{
    ControlRequest, ControlRequestBody, ControlResponse, PeerRequest,
};
use claudewire_protocol::{Message, ProtocolError, ResultMessage};
use claudewire_transport::{Transport, TransportError};
use futures::FutureExt;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// State shared by the receive loop, dispatch tasks and callers
#[derive(Default)]
pub(crate) struct Shared {
    pending: HashMap<String, oneshot::Sender<ControlResponse>>,
    pub(crate) hooks: Option<HookRegistry>,
    pub(crate) server_info: Option<Value>,
}

pub(crate) struct Router {
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) session_id: String,
    pub(crate) cancel: CancellationToken,
    pub(crate) state: watch::Sender<SessionState>,
    shared: Mutex<Shared>,
    counter: AtomicU64,
    can_use_tool: Option<CanUseTool>,
}

/// Removes a pending entry when the waiting caller goes away
struct PendingSlot<'a> {
    router: &'a Router,
    request_id: String,
}

impl Drop for PendingSlot<'_> {
    fn drop(&mut self) {
        self.router.shared().pending.remove(&self.request_id);
    }
}

impl Router {
    pub(crate) fn new(
        transport: Arc<dyn Transport>,
        session_id: String,
        can_use_tool: Option<CanUseTool>,
    ) -> Self {
        Self {
            transport,
            session_id,
            cancel: CancellationToken::new(),
            state: watch::Sender::new(SessionState::Starting),
            shared: Mutex::new(Shared::default()),
            counter: AtomicU64::new(0),
            can_use_tool,
        }
    }

    pub(crate) fn shared(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// `req_<counter>_<8 hex chars>`
    pub(crate) fn next_request_id(&self) -> String {
        let n = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        let suffix = Uuid::new_v4().simple().to_string();
        format!("req_{n}_{}", &suffix[..8])
    }

    #[cfg(test)]
    pub(crate) fn pending_count(&self) -> usize {
        self.shared().pending.len()
    }

    /// Encode and write one frame, racing the session's own shutdown
    pub(crate) async fn send<T: Serialize>(
        &self,
        cancel: &CancellationToken,
        value: &T,
    ) -> Result<()> {
        let closing = self.state.borrow().is_closing();
        if closing {
            return Err(SessionError::Closed);
        }
        let frame = codec::encode(value)?;
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(SessionError::Closed),
            written = self.transport.write_frame(cancel, &frame) => {
                written?;
                self.state.send_if_modified(|state| {
                    let starting = *state == SessionState::Starting;
                    if starting {
                        *state = SessionState::Running;
                    }
                    starting
                });
                Ok(())
            }
        }
    }

    /// Send a control request and wait for its response payload
    pub(crate) async fn request(
        &self,
        cancel: &CancellationToken,
        body: ControlRequestBody,
    ) -> Result<Option<Value>> {
        let subtype = body.subtype();
        let request_id = self.next_request_id();
        let (tx, rx) = oneshot::channel();

        self.shared().pending.insert(request_id.clone(), tx);
        let _slot = PendingSlot {
            router: self,
            request_id: request_id.clone(),
        };

        let request =
            ControlRequest::new(request_id.clone(), body).with_session_id(self.session_id.clone());
        self.send(cancel, &request).await?;
        debug!(%request_id, subtype, "control request sent");

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(SessionError::Cancelled),
            _ = self.cancel.cancelled() => return Err(SessionError::Closed),
            response = rx => response.map_err(|_| SessionError::Closed)?,
        };

        response
            .into_result()
            .map_err(|message| SessionError::ControlRequestFailed {
                subtype: subtype.to_string(),
                message,
            })
    }

    fn deliver(&self, response: ControlResponse) {
        let waiter = self.shared().pending.remove(response.request_id());
        match waiter {
            Some(tx) => {
                let _ = tx.send(response);
            }
            None => debug!(
                request_id = response.request_id(),
                "discarding control response with no pending request"
            ),
        }
    }

    fn hook(&self, callback_id: &str) -> Option<HookCallback> {
        self.shared().hooks.as_ref()?.get(callback_id)
    }

    /// Move to `Closing`, stop all tasks, close the transport, then `Closed`
    ///
    /// Only the first caller does the work; later callers wait for it.
    pub(crate) async fn shutdown(&self) -> Result<()> {
        let first = self.state.send_if_modified(|state| {
            if state.is_closing() {
                return false;
            }
            *state = SessionState::Closing;
            true
        });
        if !first {
            let mut closed = self.state.subscribe();
            let _ = closed.wait_for(|state| *state == SessionState::Closed).await;
            return Ok(());
        }

        debug!(session_id = %self.session_id, "closing session");
        self.cancel.cancel();
        let closed = self.transport.close().await;
        self.shared().pending.clear();
        self.state.send_replace(SessionState::Closed);
        info!(session_id = %self.session_id, "session closed");
        closed.map_err(SessionError::from)
    }

    async fn answer(&self, request: PeerRequest) -> Result<Option<Value>> {
        match request {
            PeerRequest::CanUseTool(request) => {
                let callback = self.can_use_tool.clone().ok_or_else(|| {
                    SessionError::callback("can_use_tool", "no permission callback configured")
                })?;
                let (tool_name, input, context) = ToolPermissionContext::from_request(request);
                let decision = callback(tool_name, input, context).await?;
                Ok(Some(decision.to_response()))
            }
            PeerRequest::HookCallback(request) => {
                let callback = self.hook(&request.callback_id).ok_or_else(|| {
                    SessionError::callback(
                        request.callback_id.clone(),
                        "no hook registered with this id",
                    )
                })?;
                let output = callback(request.input, request.tool_use_id).await?;
                let value = serde_json::to_value(&output).map_err(|source| {
                    ProtocolError::Encode {
                        message_type: "HookOutput".to_string(),
                        source,
                    }
                })?;
                Ok(Some(value))
            }
            PeerRequest::McpMessage { server_name, .. } => Err(SessionError::callback(
                "mcp_message",
                format!("no SDK MCP server named `{server_name}`"),
            )),
            PeerRequest::Other { subtype, .. } => Err(SessionError::callback(
                subtype,
                "unsupported control request subtype",
            )),
        }
    }

    async fn dispatch(self: Arc<Self>, request: ControlRequest<PeerRequest>) {
        let request_id = request.request_id;
        let subtype = request.request.subtype().to_string();
        debug!(session_id = %self.session_id, %request_id, %subtype, "dispatching control request");

        let answered = AssertUnwindSafe(self.answer(request.request)).catch_unwind();
        let outcome = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return,
            outcome = answered => outcome,
        };

        let response = match outcome {
            Ok(Ok(payload)) => ControlResponse::success(request_id.clone(), payload),
            Ok(Err(err)) => {
                warn!(%request_id, %subtype, error = %err, "control request failed");
                ControlResponse::error(request_id.clone(), err.to_string())
            }
            Err(_) => {
                warn!(%request_id, %subtype, "control request handler panicked");
                ControlResponse::error(request_id.clone(), format!("{subtype} handler panicked"))
            }
        }
        .with_session_id(self.session_id.clone());

        if let Err(err) = self.send(&self.cancel, &response).await {
            if !matches!(err, SessionError::Closed) {
                warn!(%request_id, error = %err, "failed to answer control request");
            }
        }
    }

    /// Answer a peer request that could not be decoded
    async fn reject(self: Arc<Self>, request_id: String, err: ProtocolError) {
        warn!(session_id = %self.session_id, %request_id, error = %err, "malformed control request");
        let response = ControlResponse::error(request_id.clone(), err.to_string())
            .with_session_id(self.session_id.clone());
        if let Err(err) = self.send(&self.cancel, &response).await {
            if !matches!(err, SessionError::Closed) {
                warn!(%request_id, error = %err, "failed to reject control request");
            }
        }
    }
}

enum LoopExit {
    Finished,
    Failed(SessionError),
}

/// Read, decode and route frames until end of stream, shutdown or failure
///
/// A failure is published once as an error result, after which the session
/// closes itself.
pub(crate) async fn receive_loop(router: Arc<Router>, queue: mpsc::Sender<Message>) {
    let exit = loop {
        let frame = match router.transport.read_frame(&router.cancel).await {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                debug!(session_id = %router.session_id, "end of stream");
                break LoopExit::Finished;
            }
            Err(TransportError::Cancelled | TransportError::Closed) => break LoopExit::Finished,
            Err(err) => break LoopExit::Failed(err.into()),
        };

        match codec::decode_frame(&frame) {
            Ok(Inbound::ControlResponse(response)) => router.deliver(response),
            Ok(Inbound::ControlRequest(request)) => {
                tokio::spawn(Arc::clone(&router).dispatch(request));
            }
            Ok(Inbound::Message(message)) => {
                let published = tokio::select! {
                    biased;
                    _ = router.cancel.cancelled() => false,
                    sent = queue.send(message) => sent.is_ok(),
                };
                if !published {
                    break LoopExit::Finished;
                }
            }
            Err(err) => match err.unanswered_request_id().map(str::to_owned) {
                Some(request_id) => {
                    tokio::spawn(Arc::clone(&router).reject(request_id, err));
                }
                None => break LoopExit::Failed(err.into()),
            },
        }
    };

    if let LoopExit::Failed(err) = exit {
        if router.cancel.is_cancelled() {
            return;
        }
        error!(session_id = %router.session_id, error = %err, "receive loop failed");
        let result = ResultMessage::error_during_execution(
            router.session_id.clone(),
            err.to_stream_error(),
        );
        tokio::select! {
            biased;
            _ = router.cancel.cancelled() => {}
            _ = queue.send(Message::Result(result)) => {}
        }
        drop(queue);
        if let Err(err) = router.shutdown().await {
            debug!(error = %err, "transport close after failure");
        }
    }
}
