//! Fan-out subscriptions
//!
//! A subscription is split in two: the [`Subscription`] reader, which moves
//! into the peer connection as its outbound track, and the small
//! [`SubscriptionHandle`] the listener session keeps for `release`.

use tokio::sync::{broadcast, watch};

use super::room::RoomId;
use crate::media::{AudioFormat, AudioFrame};

/// Identifies one subscription to one incarnation of a room's source
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle {
    room: RoomId,
    id: u64,
    generation: u64,
}

impl SubscriptionHandle {
    pub(super) fn new(room: RoomId, id: u64, generation: u64) -> Self {
        Self {
            room,
            id,
            generation,
        }
    }

    /// Room this subscription belongs to
    pub fn room(&self) -> &RoomId {
        &self.room
    }

    /// Registry-unique subscription id
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Generation of the source this subscription was minted against
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Resolves once a room's source has been torn down
#[derive(Debug, Clone)]
pub struct SourceClosed {
    rx: watch::Receiver<bool>,
}

impl SourceClosed {
    pub(super) fn new(rx: watch::Receiver<bool>) -> Self {
        Self { rx }
    }

    /// Whether the source has already been torn down
    pub fn is_closed(&self) -> bool {
        *self.rx.borrow()
    }

    /// Wait for the source to be torn down
    pub async fn wait(&mut self) {
        loop {
            if *self.rx.borrow_and_update() {
                return;
            }
            // Sender dropped together with the room entry
            if self.rx.changed().await.is_err() {
                return;
            }
        }
    }
}

/// Independent reader into a room's decoded stream
#[derive(Debug)]
pub struct Subscription {
    handle: SubscriptionHandle,
    format: AudioFormat,
    rx: broadcast::Receiver<AudioFrame>,
    closed: SourceClosed,
    lagged: u64,
}

impl Subscription {
    pub(super) fn new(
        handle: SubscriptionHandle,
        format: AudioFormat,
        rx: broadcast::Receiver<AudioFrame>,
        closed: SourceClosed,
    ) -> Self {
        Self {
            handle,
            format,
            rx,
            closed,
            lagged: 0,
        }
    }

    /// Handle used to release this subscription
    pub fn handle(&self) -> &SubscriptionHandle {
        &self.handle
    }

    /// Format of the frames this subscription yields
    pub fn format(&self) -> AudioFormat {
        self.format
    }

    /// Signal that resolves when the room's source is torn down
    pub fn closed_signal(&self) -> SourceClosed {
        self.closed.clone()
    }

    /// Frames skipped so far because this reader fell behind
    pub fn lagged_frames(&self) -> u64 {
        self.lagged
    }

    /// Receive the next frame
    ///
    /// Returns `None` once the source is torn down. A reader that fell more
    /// than the channel capacity behind skips ahead to the oldest retained
    /// frame; other readers are unaffected.
    pub async fn recv(&mut self) -> Option<AudioFrame> {
        loop {
            match self.rx.recv().await {
                Ok(frame) => return Some(frame),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    self.lagged += skipped;
                    tracing::debug!(
                        room = %self.handle.room,
                        subscription = self.handle.id,
                        skipped = skipped,
                        "Subscriber lagging, skipping frames"
                    );
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}
