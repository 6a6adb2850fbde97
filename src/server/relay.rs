//! Relay entry point
//!
//! Ties the source registry, the active session set and the media engine
//! together. Each `open_session` resolves the room's origin, subscribes to
//! its shared source and starts a listener session on a fresh peer
//! connection.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::Semaphore;

use crate::error::{Error, Result};
use crate::media::{FileOpener, SourceOpener};
use crate::registry::{RoomId, SourceRegistry, SubscriptionHandle};
use crate::server::config::RelayConfig;
use crate::server::resolver::{DirectoryResolver, OriginResolver};
use crate::session::listener::SessionParts;
use crate::session::{ActiveSessionSet, PeerConnector, SessionHandle};
use crate::stats::{RelayCounters, RelayStats};

/// Live audio relay
pub struct BarazaRelay {
    config: RelayConfig,
    registry: Arc<SourceRegistry>,
    sessions: Arc<ActiveSessionSet>,
    resolver: Arc<dyn OriginResolver>,
    connector: Arc<dyn PeerConnector>,
    counters: Arc<RelayCounters>,
    next_session_id: AtomicU64,
    listener_semaphore: Option<Arc<Semaphore>>,
}

impl BarazaRelay {
    /// Create a relay serving room audio from the configured upload directory
    pub fn new(config: RelayConfig, connector: impl PeerConnector + 'static) -> Self {
        let resolver = DirectoryResolver::new(config.upload_dir.clone());
        Self::with_parts(
            config,
            Arc::new(FileOpener::new()),
            Arc::new(resolver),
            Arc::new(connector),
        )
    }

    /// Create a relay with custom origin handling
    pub fn with_parts(
        config: RelayConfig,
        opener: Arc<dyn SourceOpener>,
        resolver: Arc<dyn OriginResolver>,
        connector: Arc<dyn PeerConnector>,
    ) -> Self {
        let listener_semaphore = if config.max_listeners > 0 {
            Some(Arc::new(Semaphore::new(config.max_listeners)))
        } else {
            None
        };

        Self {
            registry: Arc::new(SourceRegistry::with_config(
                opener,
                config.registry.clone(),
            )),
            config,
            sessions: Arc::new(ActiveSessionSet::new()),
            resolver,
            connector,
            counters: Arc::new(RelayCounters::new()),
            next_session_id: AtomicU64::new(1),
            listener_semaphore,
        }
    }

    /// Open a listener session for a room
    ///
    /// The returned session is registered as active and waits for the
    /// listener's offer. If anything fails along the way the active set is
    /// left as it was and any subscription taken is released.
    pub async fn open_session(&self, room_id: &str) -> Result<SessionHandle> {
        let room = RoomId::new(room_id)?;

        let permit = match &self.listener_semaphore {
            Some(sem) => match Arc::clone(sem).try_acquire_owned() {
                Ok(permit) => Some(permit),
                Err(_) => {
                    tracing::warn!(room = %room, "Listener rejected: limit reached");
                    return Err(Error::CapacityReached(self.config.max_listeners));
                }
            },
            None => None,
        };

        let origin = self.resolver.resolve(&room).await?;

        let subscription = match self.registry.acquire(&room, &origin).await {
            Ok(subscription) => subscription,
            Err(e) => {
                if e.is_source_unavailable() {
                    self.counters.source_unavailable();
                }
                return Err(e.into());
            }
        };

        let mut guard = AcquireGuard::new(&self.registry, subscription.handle().clone());

        let link = match self.connector.connect().await {
            Ok(link) => link,
            Err(e) => {
                guard.disarm();
                self.registry.release(&room, subscription.handle()).await;
                tracing::warn!(room = %room, error = %e, "Failed to create peer connection");
                return Err(e.into());
            }
        };
        guard.disarm();

        let id = self.next_session_id.fetch_add(1, Ordering::Relaxed);
        self.counters.session_opened();

        let session = SessionHandle::start(SessionParts {
            id,
            room: room.clone(),
            subscription,
            link,
            registry: Arc::clone(&self.registry),
            sessions: Arc::clone(&self.sessions),
            counters: Arc::clone(&self.counters),
            permit,
            negotiation_timeout: self.config.negotiation_timeout,
        });

        tracing::info!(
            session_id = id,
            room = %room,
            listeners = self.sessions.listeners_in(&room),
            "Listener session opened"
        );

        Ok(session)
    }

    /// End a room's source on behalf of its host
    ///
    /// Every session in the room observes the source closing and stops.
    /// Returns whether the room had a live source.
    pub async fn close_room(&self, room_id: &str) -> Result<bool> {
        let room = RoomId::new(room_id)?;
        let closed = self.registry.close_room(&room).await;
        if closed {
            tracing::info!(
                room = %room,
                listeners = self.sessions.listeners_in(&room),
                "Room closed by host"
            );
        }
        Ok(closed)
    }

    /// Current relay statistics
    pub async fn stats(&self) -> RelayStats {
        RelayStats::new(
            self.sessions.len(),
            self.registry.room_count().await,
            &self.counters,
        )
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// Get a reference to the source registry
    pub fn registry(&self) -> &Arc<SourceRegistry> {
        &self.registry
    }

    /// Get a reference to the active session set
    pub fn sessions(&self) -> &Arc<ActiveSessionSet> {
        &self.sessions
    }

    pub fn counters(&self) -> &Arc<RelayCounters> {
        &self.counters
    }
}

impl std::fmt::Debug for BarazaRelay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BarazaRelay")
            .field("config", &self.config)
            .field("active_sessions", &self.sessions.len())
            .finish_non_exhaustive()
    }
}

/// Releases a subscription if `open_session` is cancelled before the
/// session takes it over
struct AcquireGuard<'a> {
    registry: &'a Arc<SourceRegistry>,
    handle: Option<SubscriptionHandle>,
}

impl<'a> AcquireGuard<'a> {
    fn new(registry: &'a Arc<SourceRegistry>, handle: SubscriptionHandle) -> Self {
        Self {
            registry,
            handle: Some(handle),
        }
    }

    fn disarm(&mut self) {
        self.handle = None;
    }
}

impl Drop for AcquireGuard<'_> {
    fn drop(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let registry = Arc::clone(self.registry);
        runtime.spawn(async move {
            registry.release(handle.room(), &handle).await;
        });
    }
}
