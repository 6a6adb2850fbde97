//! Listener sessions
//!
//! One session per connected listener. A session owns a single peer
//! connection, answers exactly one offer, attaches its room subscription as
//! the outbound audio track and tears itself down when the peer connection
//! fails, the room's source ends, or `stop` is called.
//!
//! Every path into teardown goes through `SessionHandle::teardown`. The
//! first caller flips the state to a terminal phase under the state lock and
//! runs the cleanup; later callers find the phase already terminal and do
//! nothing. Cleanup releases the peer connection, the subscription, the
//! active-set entry and the listener permit exactly once.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch, Mutex, OwnedSemaphorePermit};

use super::error::SignalingError;
use super::peer::{PeerConnection, PeerLink, PeerState, SdpType, SessionDescription};
use super::set::ActiveSessionSet;
use super::state::{SessionOutcome, SessionPhase, SessionState};
use crate::registry::{RoomId, SourceClosed, SourceRegistry, Subscription, SubscriptionHandle};
use crate::stats::RelayCounters;

/// Everything a session is built from
pub(crate) struct SessionParts {
    pub id: u64,
    pub room: RoomId,
    pub subscription: Subscription,
    pub link: PeerLink,
    pub registry: Arc<SourceRegistry>,
    pub sessions: Arc<ActiveSessionSet>,
    pub counters: Arc<RelayCounters>,
    pub permit: Option<OwnedSemaphorePermit>,
    pub negotiation_timeout: Duration,
}

struct SessionInner {
    id: u64,
    room: RoomId,
    state: Mutex<SessionState>,
    peer: Arc<dyn PeerConnection>,
    /// Reader waiting to become the outbound track; taken by negotiation or teardown
    subscription: Mutex<Option<Subscription>>,
    subscription_handle: SubscriptionHandle,
    registry: Arc<SourceRegistry>,
    sessions: Arc<ActiveSessionSet>,
    counters: Arc<RelayCounters>,
    permit: Mutex<Option<OwnedSemaphorePermit>>,
    outcome: watch::Sender<Option<SessionOutcome>>,
    negotiation_timeout: Duration,
}

impl SessionInner {
    async fn release_resources(&self, outcome: SessionOutcome) {
        self.subscription.lock().await.take();

        if let Err(e) = self.peer.close().await {
            tracing::debug!(
                session_id = self.id,
                error = %e,
                "Peer connection close reported an error"
            );
        }

        self.registry
            .release(&self.room, &self.subscription_handle)
            .await;
        self.sessions.remove(self.id);
        self.permit.lock().await.take();

        if outcome == SessionOutcome::ConnectionFailed {
            self.counters.session_failed();
        }

        tracing::info!(
            session_id = self.id,
            room = %self.room,
            outcome = ?outcome,
            listeners = self.sessions.listeners_in(&self.room),
            "Listener session ended"
        );

        self.outcome.send_replace(Some(outcome));
    }
}

/// Handle to a live listener session
///
/// Cheap to clone; all clones drive the same session.
#[derive(Clone)]
pub struct SessionHandle {
    inner: Arc<SessionInner>,
}

impl SessionHandle {
    /// Build a session, register it as active and start its monitor task
    pub(crate) fn start(parts: SessionParts) -> Self {
        let SessionParts {
            id,
            room,
            subscription,
            link,
            registry,
            sessions,
            counters,
            permit,
            negotiation_timeout,
        } = parts;

        let subscription_handle = subscription.handle().clone();
        let source_closed = subscription.closed_signal();
        let (outcome, _) = watch::channel(None);

        sessions.insert(id, room.clone());

        let session = Self {
            inner: Arc::new(SessionInner {
                id,
                room: room.clone(),
                state: Mutex::new(SessionState::new(id, room)),
                peer: link.connection,
                subscription: Mutex::new(Some(subscription)),
                subscription_handle,
                registry,
                sessions,
                counters,
                permit: Mutex::new(permit),
                outcome,
                negotiation_timeout,
            }),
        };

        tokio::spawn(monitor(session.clone(), link.events, source_closed));

        session
    }

    /// Unique session ID
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Room the listener joined
    pub fn room(&self) -> &RoomId {
        &self.inner.room
    }

    /// Current phase
    pub async fn phase(&self) -> SessionPhase {
        self.inner.state.lock().await.phase
    }

    /// How the session ended, if it has
    pub fn outcome(&self) -> Option<SessionOutcome> {
        *self.inner.outcome.borrow()
    }

    /// Answer the listener's offer
    ///
    /// Applies the offer, attaches the room's audio as the outbound track and
    /// returns the local answer. Only one offer is accepted per session; a
    /// second one, or one arriving after teardown, is rejected without
    /// changing state. A failed negotiation closes the session.
    pub async fn handle_offer(
        &self,
        sdp: &str,
        sdp_type: &str,
    ) -> Result<SessionDescription, SignalingError> {
        if sdp_type.parse::<SdpType>() != Ok(SdpType::Offer) {
            return Err(SignalingError::UnexpectedType(sdp_type.to_string()));
        }
        validate_offer(sdp)?;

        self.inner.state.lock().await.begin_negotiation()?;

        tracing::debug!(
            session_id = self.inner.id,
            room = %self.inner.room,
            "Offer received, negotiating"
        );

        let timeout = self.inner.negotiation_timeout;
        let result = match tokio::time::timeout(timeout, self.negotiate(sdp)).await {
            Ok(result) => result,
            Err(_) => Err(SignalingError::Timeout(timeout)),
        };

        let answer = match result {
            Ok(answer) => answer,
            Err(e) => {
                let phase = self.phase().await;
                if phase.is_terminal() {
                    return Err(SignalingError::SessionTerminated(phase));
                }

                tracing::warn!(
                    session_id = self.inner.id,
                    room = %self.inner.room,
                    error = %e,
                    "Negotiation failed"
                );
                self.teardown(SessionOutcome::Stopped).await;
                return Err(e);
            }
        };

        self.inner.state.lock().await.complete_negotiation()?;
        self.inner.counters.offer_answered();

        tracing::info!(
            session_id = self.inner.id,
            room = %self.inner.room,
            "Answer sent, listener connected"
        );

        Ok(answer)
    }

    /// Stop the session
    ///
    /// Idempotent and callable from any phase. Returns once the session's
    /// resources are released, even if a concurrent failure got there first.
    pub async fn stop(&self) {
        if !self.teardown(SessionOutcome::Stopped).await {
            self.terminated().await;
        }
    }

    /// Wait for the session to end
    pub async fn terminated(&self) -> SessionOutcome {
        let mut rx = self.inner.outcome.subscribe();
        loop {
            if let Some(outcome) = *rx.borrow_and_update() {
                return outcome;
            }
            if rx.changed().await.is_err() {
                return SessionOutcome::Stopped;
            }
        }
    }

    async fn negotiate(&self, sdp: &str) -> Result<SessionDescription, SignalingError> {
        let peer = &self.inner.peer;

        peer.set_remote_description(SessionDescription::offer(sdp))
            .await?;

        let track = self
            .inner
            .subscription
            .lock()
            .await
            .take()
            .ok_or(SignalingError::SessionTerminated(SessionPhase::Closed))?;
        peer.add_audio_track(track).await?;

        let answer = peer.create_answer().await?;
        Ok(peer.set_local_description(answer).await?)
    }

    /// Move to a terminal phase and release everything, once
    ///
    /// Returns `false` if the session was already terminal.
    async fn teardown(&self, outcome: SessionOutcome) -> bool {
        if !self.inner.state.lock().await.terminate(outcome) {
            return false;
        }

        // Runs detached so a caller dropped mid-teardown can't strand resources
        let inner = Arc::clone(&self.inner);
        let cleanup = tokio::spawn(async move { inner.release_resources(outcome).await });
        if let Err(e) = cleanup.await {
            tracing::error!(session_id = self.inner.id, error = %e, "Session cleanup panicked");
        }

        true
    }
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle")
            .field("id", &self.inner.id)
            .field("room", &self.inner.room)
            .finish_non_exhaustive()
    }
}

/// Watch a session's peer connection and room source until it ends
async fn monitor(
    session: SessionHandle,
    mut events: mpsc::UnboundedReceiver<PeerState>,
    mut source_closed: SourceClosed,
) {
    let mut outcome = session.inner.outcome.subscribe();
    let mut events_open = true;

    loop {
        if outcome.borrow_and_update().is_some() {
            break;
        }

        tokio::select! {
            event = events.recv(), if events_open => match event {
                Some(PeerState::Failed) => {
                    tracing::warn!(
                        session_id = session.id(),
                        room = %session.room(),
                        "Peer connection failed"
                    );
                    session.teardown(SessionOutcome::ConnectionFailed).await;
                    break;
                }
                Some(PeerState::Closed) => {
                    session.teardown(SessionOutcome::Stopped).await;
                    break;
                }
                Some(state) => {
                    tracing::debug!(
                        session_id = session.id(),
                        state = ?state,
                        "Peer connection state changed"
                    );
                }
                None => events_open = false,
            },
            _ = source_closed.wait() => {
                tracing::info!(
                    session_id = session.id(),
                    room = %session.room(),
                    "Room source ended, stopping listener"
                );
                session.teardown(SessionOutcome::Stopped).await;
                break;
            }
            _ = outcome.changed() => {}
        }
    }
}

fn validate_offer(sdp: &str) -> Result<(), SignalingError> {
    if sdp.trim().is_empty() {
        return Err(SignalingError::MalformedSdp("empty offer".into()));
    }
    if sdp.lines().next().map(str::trim) != Some("v=0") {
        return Err(SignalingError::MalformedSdp("missing version line".into()));
    }
    if !sdp.lines().any(|line| line.starts_with("m=audio")) {
        return Err(SignalingError::MalformedSdp(
            "offer has no audio section".into(),
        ));
    }
    Ok(())
}
