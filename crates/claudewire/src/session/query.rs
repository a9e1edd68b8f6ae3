//! Sending user turns and receiving messages

use crate::error::{Result, SessionError};
use crate::session::core::Session;
use claudewire_protocol::{ContentBlock, Message, UserMessage};
use futures::stream::{self, Stream};
use tokio_util::sync::CancellationToken;

impl Session {
    /// Send a user turn holding a single text block
    pub async fn send_user_message(
        &self,
        cancel: &CancellationToken,
        text: impl Into<String>,
    ) -> Result<()> {
        self.send_user_content(cancel, vec![ContentBlock::text(text)])
            .await
    }

    /// Send a user turn made of arbitrary content blocks
    ///
    /// Fails with [`SessionError::Closed`] once `close` has begun.
    pub async fn send_user_content(
        &self,
        cancel: &CancellationToken,
        content: Vec<ContentBlock>,
    ) -> Result<()> {
        let message = UserMessage::new(self.session_id(), content);
        self.router.send(cancel, &message).await
    }

    /// Next message in wire order
    ///
    /// Returns `Ok(None)` once the receive loop has stopped and every queued
    /// message has been read.
    pub async fn next_message(&self, cancel: &CancellationToken) -> Result<Option<Message>> {
        let mut queue = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(SessionError::Cancelled),
            queue = self.queue.lock() => queue,
        };
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(SessionError::Cancelled),
            message = queue.recv() => Ok(message),
        }
    }

    /// Stream over the same queue as [`next_message`](Session::next_message)
    ///
    /// Ends when the queue closes.
    pub fn messages(&self) -> impl Stream<Item = Message> + '_ {
        stream::unfold(self, |session| async move {
            let message = session.queue.lock().await.recv().await?;
            Some((message, session))
        })
    }
}
