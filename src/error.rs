//! Crate-level error type

use thiserror::Error;

use crate::media::MediaError;
use crate::registry::RegistryError;
use crate::server::config::ConfigError;
use crate::session::{PeerError, SignalingError};

/// Any error the relay reports
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Media(#[from] MediaError),

    #[error(transparent)]
    Peer(#[from] PeerError),

    #[error(transparent)]
    Signaling(#[from] SignalingError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Every listener slot is taken
    #[error("listener limit of {0} reached")]
    CapacityReached(usize),
}

impl Error {
    /// Whether the room's audio could not be produced
    pub fn is_source_unavailable(&self) -> bool {
        matches!(self, Error::Registry(e) if e.is_source_unavailable())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
