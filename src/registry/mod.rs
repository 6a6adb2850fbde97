//! Source registry for room audio fan-out
//!
//! The registry owns exactly one decoded source per room and hands out
//! independent subscriptions to it. It uses `tokio::sync::broadcast` for
//! fan-out to any number of listeners.
//!
//! # Architecture
//!
//! ```text
//!                          Arc<SourceRegistry>
//!                     ┌─────────────────────────┐
//!                     │ rooms: HashMap<RoomId,  │
//!                     │   Mutex<RoomSlot {      │
//!                     │     pump task,          │
//!                     │     tx: broadcast::Tx,  │
//!                     │   }>                    │
//!                     │ >                       │
//!                     └───────────┬─────────────┘
//!                                 │
//!         ┌───────────────────────┼───────────────────────┐
//!         │                       │                       │
//!         ▼                       ▼                       ▼
//!    [Pump task]           [Subscription]          [Subscription]
//!    decoder.next_frame()  recv() per listener     recv() per listener
//!         │                       │                       │
//!         └──► tx.send(frame) ────┴──► peer connection track
//! ```
//!
//! # Zero-Copy Design
//!
//! Frames carry `bytes::Bytes` slices of the decoded origin, so every
//! subscriber shares the same allocation. The broadcast channel clones the
//! `AudioFrame`, but the payload is only reference-counted, not copied.

pub mod config;
pub mod entry;
pub mod error;
pub mod room;
pub mod store;
pub mod subscription;

pub use config::RegistryConfig;
pub use entry::RoomStats;
pub use error::RegistryError;
pub use room::RoomId;
pub use store::SourceRegistry;
pub use subscription::{SourceClosed, Subscription, SubscriptionHandle};
