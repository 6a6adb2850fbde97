//! Relay server: configuration, origin lookup and the relay itself

pub mod config;
pub mod relay;
pub mod resolver;

pub use config::{ConfigError, RelayConfig};
pub use relay::BarazaRelay;
pub use resolver::{DirectoryResolver, OriginResolver, OriginTable};
