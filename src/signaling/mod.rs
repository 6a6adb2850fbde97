//! Offer/answer signaling over text messages

pub mod driver;
pub mod message;

pub use driver::serve_signaling;
pub use message::{InboundMessage, OutboundMessage};
