//! Room origin lookup
//!
//! Maps a room to the origin its audio is decoded from. The relay asks the
//! resolver once per `open_session`; whether the origin actually exists is
//! left to the registry's opener, which reports `SourceUnavailable`.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;

use crate::media::OriginRef;
use crate::registry::{RegistryError, RoomId};

/// Resolves rooms to origins
#[async_trait]
pub trait OriginResolver: Send + Sync {
    async fn resolve(&self, room: &RoomId) -> Result<OriginRef, RegistryError>;
}

/// Serves each room from the file named after it in an upload directory
#[derive(Debug, Clone)]
pub struct DirectoryResolver {
    root: PathBuf,
}

impl DirectoryResolver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Upload directory
    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl OriginResolver for DirectoryResolver {
    async fn resolve(&self, room: &RoomId) -> Result<OriginRef, RegistryError> {
        let id = room.as_str();

        // The id must name a single entry directly under the root
        let mut components = Path::new(id).components();
        let single_name = matches!(
            (components.next(), components.next()),
            (Some(Component::Normal(name)), None) if name == id
        );
        if !single_name || id.contains(['/', '\\', '\0']) {
            return Err(RegistryError::InvalidRoomId(id.to_string()));
        }

        Ok(OriginRef::file(self.root.join(id)))
    }
}

/// Fixed room-to-origin table
#[derive(Debug, Clone, Default)]
pub struct OriginTable {
    origins: HashMap<RoomId, OriginRef>,
}

impl OriginTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a room's origin
    pub fn insert(&mut self, room: RoomId, origin: OriginRef) -> Option<OriginRef> {
        self.origins.insert(room, origin)
    }

    /// Builder-style [`insert`](Self::insert)
    pub fn with(mut self, room: RoomId, origin: OriginRef) -> Self {
        self.origins.insert(room, origin);
        self
    }

    pub fn len(&self) -> usize {
        self.origins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.origins.is_empty()
    }
}

#[async_trait]
impl OriginResolver for OriginTable {
    async fn resolve(&self, room: &RoomId) -> Result<OriginRef, RegistryError> {
        self.origins
            .get(room)
            .cloned()
            .ok_or_else(|| RegistryError::UnknownRoom(room.clone()))
    }
}
