//! Per-listener signaling loop
//!
//! Transport agnostic: the caller bridges its socket (WebSocket, data
//! channel, test harness) to a pair of text channels and hands them to
//! [`serve_signaling`] together with the listener's session.

use tokio::sync::mpsc;

use super::message::{InboundMessage, OutboundMessage};
use crate::session::{SessionHandle, SessionOutcome};

/// Drive a session's signaling until the listener goes away
///
/// Offers are answered on `outbound`; rejected offers get an `error`
/// message. Unparseable messages and other message types are skipped. The
/// loop ends when `inbound` closes, when `outbound` closes or when the
/// session terminates on its own, and the session is stopped on the way out.
/// Dropping the returned future mid-flight stops the session as well.
pub async fn serve_signaling(
    session: SessionHandle,
    mut inbound: mpsc::Receiver<String>,
    outbound: mpsc::Sender<String>,
) -> SessionOutcome {
    let mut guard = StopOnDrop(Some(session.clone()));

    loop {
        tokio::select! {
            message = inbound.recv() => {
                let Some(text) = message else {
                    tracing::debug!(session_id = session.id(), "Listener disconnected");
                    break;
                };
                let Some(reply) = handle_message(&session, &text).await else {
                    continue;
                };
                if outbound.send(reply).await.is_err() {
                    tracing::debug!(session_id = session.id(), "Signaling channel closed");
                    break;
                }
            }
            outcome = session.terminated() => {
                tracing::debug!(
                    session_id = session.id(),
                    outcome = ?outcome,
                    "Session ended, leaving signaling loop"
                );
                break;
            }
        }
    }

    guard.0 = None;
    session.stop().await;
    session.terminated().await
}

async fn handle_message(session: &SessionHandle, text: &str) -> Option<String> {
    let message: InboundMessage = match serde_json::from_str(text) {
        Ok(message) => message,
        Err(e) => {
            tracing::debug!(
                session_id = session.id(),
                error = %e,
                "Ignoring unparseable signaling message"
            );
            return None;
        }
    };

    if !message.is_offer() {
        tracing::debug!(
            session_id = session.id(),
            kind = %message.kind,
            "Ignoring signaling message"
        );
        return None;
    }

    let sdp = message.sdp.as_deref().unwrap_or_default();
    let reply = match session.handle_offer(sdp, &message.kind).await {
        Ok(answer) => OutboundMessage::Answer { sdp: answer.sdp },
        Err(e) => OutboundMessage::Error {
            message: e.to_string(),
        },
    };

    match reply.to_json() {
        Ok(text) => Some(text),
        Err(e) => {
            tracing::error!(session_id = session.id(), error = %e, "Failed to encode reply");
            None
        }
    }
}

/// Stops the session if the signaling future is dropped before finishing
struct StopOnDrop(Option<SessionHandle>);

impl Drop for StopOnDrop {
    fn drop(&mut self) {
        let Some(session) = self.0.take() else {
            return;
        };
        if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            runtime.spawn(async move { session.stop().await });
        }
    }
}
