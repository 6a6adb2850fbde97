//! Source registry implementation
//!
//! The central registry that owns every room's decoded source and mints
//! fan-out subscriptions against it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};

use super::config::RegistryConfig;
use super::entry::{RoomEntry, RoomSlot, RoomStats};
use super::error::RegistryError;
use super::room::RoomId;
use super::subscription::{Subscription, SubscriptionHandle};
use crate::media::{OriginRef, SourceOpener};

type RoomMap = RwLock<HashMap<RoomId, Arc<Mutex<RoomSlot>>>>;

/// Central registry for all live room sources
///
/// The map lock is only held long enough to find or insert a room's slot.
/// Opening an origin happens under the slot's own lock, so a slow decode in
/// one room never blocks acquisition in another, while concurrent acquirers
/// of the same room queue behind the first and reuse its source.
pub struct SourceRegistry {
    /// Map of room id to that room's slot
    rooms: Arc<RoomMap>,

    /// Decoder factory for origins
    opener: Arc<dyn SourceOpener>,

    /// Configuration
    config: RegistryConfig,

    next_generation: AtomicU64,
    next_subscription: AtomicU64,
}

impl SourceRegistry {
    /// Create a new source registry with default configuration
    pub fn new(opener: Arc<dyn SourceOpener>) -> Self {
        Self::with_config(opener, RegistryConfig::default())
    }

    /// Create a new source registry with custom configuration
    pub fn with_config(opener: Arc<dyn SourceOpener>, config: RegistryConfig) -> Self {
        Self {
            rooms: Arc::new(RwLock::new(HashMap::new())),
            opener,
            config,
            next_generation: AtomicU64::new(1),
            next_subscription: AtomicU64::new(1),
        }
    }

    /// Get the registry configuration
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Get a subscription to a room's source, creating the source if needed
    ///
    /// If the room already has a source the origin is not touched. Otherwise
    /// `origin` is opened; on failure `SourceUnavailable` is returned and no
    /// state is left behind.
    pub async fn acquire(
        &self,
        room: &RoomId,
        origin: &OriginRef,
    ) -> Result<Subscription, RegistryError> {
        loop {
            let slot_arc = self.slot(room).await;
            let mut slot = slot_arc.lock().await;

            if let RoomSlot::Live(entry) = &mut *slot {
                return Ok(self.mint(room, entry));
            }

            if matches!(*slot, RoomSlot::Retired) {
                // Lost a race with teardown; the map already points elsewhere
                continue;
            }

            let mut guard = VacantGuard::new(&self.rooms, room, &slot_arc);
            let opened = self.opener.open(origin, self.config.frame_duration).await;
            guard.disarm();

            match opened {
                Ok(decoder) => {
                    let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
                    let mut entry =
                        RoomEntry::start(room, generation, origin.clone(), decoder, &self.config);

                    tracing::info!(
                        room = %room,
                        origin = %origin,
                        generation = generation,
                        format = %entry.format,
                        "Room source created"
                    );

                    let subscription = self.mint(room, &mut entry);
                    *slot = RoomSlot::Live(entry);
                    return Ok(subscription);
                }
                Err(e) => {
                    *slot = RoomSlot::Retired;
                    self.unlink(room, &slot_arc).await;

                    tracing::warn!(
                        room = %room,
                        origin = %origin,
                        error = %e,
                        "Room source unavailable"
                    );

                    return Err(RegistryError::SourceUnavailable {
                        room: room.clone(),
                        source: e,
                    });
                }
            }
        }
    }

    /// Release a subscription
    ///
    /// Releasing the last outstanding subscription of a room tears its source
    /// down. Releasing an unknown, stale or already released subscription is
    /// a no-op. Returns whether anything was released.
    pub async fn release(&self, room: &RoomId, subscription: &SubscriptionHandle) -> bool {
        if subscription.room() != room {
            tracing::warn!(
                room = %room,
                subscription_room = %subscription.room(),
                "Release for mismatched room ignored"
            );
            return false;
        }

        let Some(slot_arc) = self.existing_slot(room).await else {
            return false;
        };
        let mut slot = slot_arc.lock().await;

        let remaining = match &mut *slot {
            RoomSlot::Live(entry) if entry.generation == subscription.generation() => {
                if !entry.unsubscribe(subscription.id()) {
                    return false;
                }
                entry.subscriber_count()
            }
            _ => return false,
        };

        tracing::debug!(
            room = %room,
            subscription = subscription.id(),
            subscribers = remaining,
            "Subscriber removed"
        );

        if remaining == 0 {
            if let RoomSlot::Live(entry) = std::mem::replace(&mut *slot, RoomSlot::Retired) {
                let generation = entry.generation;
                entry.shutdown();
                tracing::info!(
                    room = %room,
                    generation = generation,
                    "Last listener left, room source torn down"
                );
            }
            self.unlink(room, &slot_arc).await;
        }

        true
    }

    /// Tear a room's source down regardless of outstanding subscriptions
    ///
    /// Used when the host ends the room. Subscribers see their stream end and
    /// their later `release` calls become no-ops. Returns whether the room
    /// had a live source.
    pub async fn close_room(&self, room: &RoomId) -> bool {
        let Some(slot_arc) = self.existing_slot(room).await else {
            return false;
        };
        let mut slot = slot_arc.lock().await;

        if !matches!(*slot, RoomSlot::Live(_)) {
            return false;
        }

        if let RoomSlot::Live(entry) = std::mem::replace(&mut *slot, RoomSlot::Retired) {
            tracing::info!(
                room = %room,
                generation = entry.generation,
                subscribers = entry.subscriber_count(),
                "Room closed by host"
            );
            entry.shutdown();
        }
        self.unlink(room, &slot_arc).await;

        true
    }

    /// Check if a room has a live source
    pub async fn has_room(&self, room: &RoomId) -> bool {
        match self.existing_slot(room).await {
            Some(slot) => matches!(*slot.lock().await, RoomSlot::Live(_)),
            None => false,
        }
    }

    /// Get statistics for a room's source
    pub async fn room_stats(&self, room: &RoomId) -> Option<RoomStats> {
        let slot_arc = self.existing_slot(room).await?;
        let slot = slot_arc.lock().await;

        match &*slot {
            RoomSlot::Live(entry) => Some(entry.stats()),
            _ => None,
        }
    }

    /// Get the number of rooms with a live source
    pub async fn room_count(&self) -> usize {
        let slots: Vec<_> = self.rooms.read().await.values().cloned().collect();

        let mut live = 0;
        for slot in slots {
            if matches!(*slot.lock().await, RoomSlot::Live(_)) {
                live += 1;
            }
        }
        live
    }

    /// Find a room's slot, inserting a vacant one if the room is unseen
    async fn slot(&self, room: &RoomId) -> Arc<Mutex<RoomSlot>> {
        if let Some(slot) = self.existing_slot(room).await {
            return slot;
        }

        let mut rooms = self.rooms.write().await;
        Arc::clone(
            rooms
                .entry(room.clone())
                .or_insert_with(|| Arc::new(Mutex::new(RoomSlot::Vacant))),
        )
    }

    async fn existing_slot(&self, room: &RoomId) -> Option<Arc<Mutex<RoomSlot>>> {
        let rooms = self.rooms.read().await;
        rooms.get(room).cloned()
    }

    async fn unlink(&self, room: &RoomId, slot: &Arc<Mutex<RoomSlot>>) {
        unlink_slot(&self.rooms, room, slot).await;
    }

    fn mint(&self, room: &RoomId, entry: &mut RoomEntry) -> Subscription {
        let id = self.next_subscription.fetch_add(1, Ordering::Relaxed);
        let subscription = entry.subscribe(room, id);

        tracing::debug!(
            room = %room,
            subscription = id,
            subscribers = entry.subscriber_count(),
            "Subscriber added"
        );

        subscription
    }
}

/// Remove a retired slot from the map
///
/// Called with the slot's lock held, so acquirers that wake up on a
/// retired slot always find the map already updated.
async fn unlink_slot(rooms: &RoomMap, room: &RoomId, slot: &Arc<Mutex<RoomSlot>>) {
    let mut rooms = rooms.write().await;
    if rooms
        .get(room)
        .is_some_and(|current| Arc::ptr_eq(current, slot))
    {
        rooms.remove(room);
    }
}

/// Retires a room's slot if `acquire` is cancelled while opening its origin
///
/// A cancelled open otherwise leaves the slot `Vacant` in the map.
struct VacantGuard {
    armed: Option<(Arc<RoomMap>, RoomId, Arc<Mutex<RoomSlot>>)>,
}

impl VacantGuard {
    fn new(rooms: &Arc<RoomMap>, room: &RoomId, slot: &Arc<Mutex<RoomSlot>>) -> Self {
        Self {
            armed: Some((Arc::clone(rooms), room.clone(), Arc::clone(slot))),
        }
    }

    fn disarm(&mut self) {
        self.armed = None;
    }
}

impl Drop for VacantGuard {
    fn drop(&mut self) {
        let Some((rooms, room, slot_arc)) = self.armed.take() else {
            return;
        };
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return;
        };
        runtime.spawn(async move {
            let mut slot = slot_arc.lock().await;
            // Another acquirer may have taken over the open in the meantime
            if matches!(*slot, RoomSlot::Vacant) {
                *slot = RoomSlot::Retired;
                unlink_slot(&rooms, &room, &slot_arc).await;
                tracing::debug!(room = %room, "Cancelled open retired");
            }
        });
    }
}
