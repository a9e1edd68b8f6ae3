//! One-shot queries
//!
//! [`simple_query`] covers the common "ask once, read until the result"
//! pattern: it spawns a session, sends the prompt, yields every message up
//! to and including the first result, then closes the session.

use crate::config::SessionConfig;
use crate::error::{Result, SessionError};
use crate::session::Session;
use claudewire_protocol::{Message, ResultMessage};
use futures::stream::{self, Stream};
use std::future::Future;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

enum Step<F> {
    Connect { connect: F, prompt: String },
    Reading(Session),
    Done,
}

/// Spawn a session, send `prompt`, and stream messages until the result
///
/// Failures never surface as a stream error. A session that cannot start
/// yields a single error result; a session that fails mid-stream has already
/// published its own error result before the stream ends.
pub fn simple_query(
    prompt: impl Into<String>,
    config: SessionConfig,
) -> impl Stream<Item = Message> + Send {
    drive(Session::spawn(config), prompt.into())
}

/// Like [`simple_query`], over a session that is already running
pub fn query_session(session: Session, prompt: impl Into<String>) -> impl Stream<Item = Message> {
    drive(async move { Ok(session) }, prompt.into())
}

fn drive<F>(connect: F, prompt: String) -> impl Stream<Item = Message>
where
    F: Future<Output = Result<Session>>,
{
    stream::unfold(Step::Connect { connect, prompt }, |step| async move {
        match step {
            Step::Connect { connect, prompt } => match start(connect, prompt).await {
                Ok(session) => advance(session).await,
                Err(failure) => Some((failure, Step::Done)),
            },
            Step::Reading(session) => advance(session).await,
            Step::Done => None,
        }
    })
}

async fn start<F>(connect: F, prompt: String) -> std::result::Result<Session, Message>
where
    F: Future<Output = Result<Session>>,
{
    let session = connect
        .await
        .map_err(|err| failure(&Uuid::new_v4().to_string(), &err))?;
    if let Err(err) = session
        .send_user_message(&CancellationToken::new(), prompt)
        .await
    {
        let message = failure(session.session_id(), &err);
        finish(&session).await;
        return Err(message);
    }
    Ok(session)
}

async fn advance<F>(session: Session) -> Option<(Message, Step<F>)> {
    match session.next_message(&CancellationToken::new()).await {
        Ok(Some(message)) if message.is_result() => {
            finish(&session).await;
            Some((message, Step::Done))
        }
        Ok(Some(message)) => Some((message, Step::Reading(session))),
        Ok(None) | Err(_) => {
            finish(&session).await;
            None
        }
    }
}

async fn finish(session: &Session) {
    if let Err(err) = session.close().await {
        debug!(session_id = session.session_id(), error = %err, "close after query");
    }
}

fn failure(session_id: &str, err: &SessionError) -> Message {
    Message::Result(ResultMessage::error_during_execution(
        session_id,
        err.to_stream_error(),
    ))
}
