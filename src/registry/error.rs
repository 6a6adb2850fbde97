//! Registry error types

use thiserror::Error;

use super::room::RoomId;
use crate::media::MediaError;

/// Error type for registry operations
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Room id is blank or otherwise unusable
    #[error("invalid room id: {0:?}")]
    InvalidRoomId(String),

    /// No origin is known for the room
    #[error("unknown room: {0}")]
    UnknownRoom(RoomId),

    /// Origin missing or undecodable; nothing was registered
    #[error("audio source unavailable for room {room}: {source}")]
    SourceUnavailable {
        room: RoomId,
        #[source]
        source: MediaError,
    },
}

impl RegistryError {
    /// Whether this error means the room's audio could not be produced
    pub fn is_source_unavailable(&self) -> bool {
        matches!(self, RegistryError::SourceUnavailable { .. })
    }
}
