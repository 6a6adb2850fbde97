//! Room entry and state types
//!
//! This module defines the per-room state stored in the registry and the
//! pump task that plays a room's origin into its broadcast channel.

use std::collections::HashSet;
use std::time::{Duration, Instant};

use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

use super::config::RegistryConfig;
use super::room::RoomId;
use super::subscription::{SourceClosed, Subscription, SubscriptionHandle};
use crate::media::{AudioDecoder, AudioFormat, AudioFrame, OriginRef};

/// Registry slot for one room
///
/// Creation and teardown of a room's source both happen under the slot's
/// lock, which is what serializes them per room.
pub(super) enum RoomSlot {
    /// Inserted by an acquirer that is about to open the origin
    Vacant,
    /// Source is playing
    Live(RoomEntry),
    /// Torn down and unlinked from the map; acquirers must look the room up again
    Retired,
}

/// Entry for a single live room in the registry
pub struct RoomEntry {
    /// Registry-unique incarnation number of this source
    pub generation: u64,

    /// Origin the source was decoded from
    pub origin: OriginRef,

    /// Format of the decoded stream
    pub format: AudioFormat,

    /// When the source was created
    pub created_at: Instant,

    /// Broadcast sender for fan-out to subscribers
    tx: broadcast::Sender<AudioFrame>,

    /// Outstanding subscription ids
    subscribers: HashSet<u64>,

    /// Flipped to `true` when the source is torn down
    closed_tx: watch::Sender<bool>,

    /// Task playing the origin into `tx`
    pump: JoinHandle<()>,
}

impl RoomEntry {
    /// Start playing `decoder` for `room`
    pub(super) fn start(
        room: &RoomId,
        generation: u64,
        origin: OriginRef,
        decoder: Box<dyn AudioDecoder>,
        config: &RegistryConfig,
    ) -> Self {
        let (tx, _) = broadcast::channel(config.broadcast_capacity);
        let (closed_tx, _) = watch::channel(false);
        let format = decoder.format();

        let pump = tokio::spawn(pump_frames(
            room.clone(),
            generation,
            decoder,
            tx.clone(),
            config.loop_playback,
        ));

        Self {
            generation,
            origin,
            format,
            created_at: Instant::now(),
            tx,
            subscribers: HashSet::new(),
            closed_tx,
            pump,
        }
    }

    /// Number of outstanding subscriptions
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Mint a new subscription reading from the current position of the stream
    pub(super) fn subscribe(&mut self, room: &RoomId, id: u64) -> Subscription {
        self.subscribers.insert(id);

        Subscription::new(
            SubscriptionHandle::new(room.clone(), id, self.generation),
            self.format,
            self.tx.subscribe(),
            SourceClosed::new(self.closed_tx.subscribe()),
        )
    }

    /// Detach a subscription, returning whether it was outstanding
    pub(super) fn unsubscribe(&mut self, id: u64) -> bool {
        self.subscribers.remove(&id)
    }

    /// Stop decoding and close every subscriber's stream
    pub(super) fn shutdown(self) {
        self.pump.abort();
        self.closed_tx.send_replace(true);
        // Dropping the last sender ends every subscriber's `recv`
        drop(self.tx);
    }

    pub(super) fn stats(&self) -> RoomStats {
        RoomStats {
            generation: self.generation,
            subscriber_count: self.subscriber_count(),
            format: self.format,
            origin: self.origin.clone(),
            age: self.created_at.elapsed(),
        }
    }
}

/// Statistics for a live room
#[derive(Debug, Clone)]
pub struct RoomStats {
    /// Incarnation number of the source
    pub generation: u64,
    /// Number of outstanding subscriptions
    pub subscriber_count: usize,
    /// Format of the decoded stream
    pub format: AudioFormat,
    /// Origin the source was decoded from
    pub origin: OriginRef,
    /// Time since the source was created
    pub age: Duration,
}

/// Play a decoder into a broadcast channel at real-time pace
///
/// Each frame is decoded once and published once, however many subscribers
/// are attached.
async fn pump_frames(
    room: RoomId,
    generation: u64,
    mut decoder: Box<dyn AudioDecoder>,
    tx: broadcast::Sender<AudioFrame>,
    loop_playback: bool,
) {
    let mut deadline = tokio::time::Instant::now();
    let mut frames_since_rewind = 0u64;

    loop {
        let frame = match decoder.next_frame().await {
            Ok(Some(frame)) => frame,
            Ok(None) if loop_playback && frames_since_rewind > 0 => {
                if let Err(e) = decoder.rewind() {
                    tracing::warn!(room = %room, error = %e, "Failed to rewind origin");
                    break;
                }
                frames_since_rewind = 0;
                tracing::debug!(room = %room, generation = generation, "Origin looped");
                continue;
            }
            Ok(None) => {
                tracing::info!(room = %room, generation = generation, "Origin exhausted");
                break;
            }
            Err(e) => {
                tracing::warn!(room = %room, error = %e, "Origin decode failed");
                break;
            }
        };

        frames_since_rewind += 1;

        tokio::time::sleep_until(deadline).await;
        deadline += frame.duration;

        // Err only means nobody is subscribed right now
        let _ = tx.send(frame);
    }
}
