pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod lifecycle;
pub mod parser;

pub use config::outbound::{OutboundDescriptor, ProtocolKind};
pub use error::{DecodeError, LifecycleError};
pub use lifecycle::{LifecycleOptions, LifecycleState, ProxyLifecycle};
pub use parser::decode;

pub fn get_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}
