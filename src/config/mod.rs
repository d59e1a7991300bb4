//! Configuration: network selection and deployment context

pub mod context;
pub mod network;

pub use context::{ConfigError, Context};
pub use network::Network;
