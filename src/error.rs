//! Error types for link decoding and the proxy lifecycle.

use std::time::Duration;

use thiserror::Error;

use crate::config::outbound::ProtocolKind;

/// Boxed error produced by a proxy engine implementation.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can occur while decoding a share link.
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("share link too long: {len} bytes (max {max} bytes)")]
    LinkTooLong { len: usize, max: usize },

    #[error("unsupported protocol: {0}")]
    UnsupportedProtocol(String),

    #[error("missing {field} in {protocol} link")]
    MissingField {
        protocol: ProtocolKind,
        field: &'static str,
    },

    #[error("invalid UUID format in {protocol} link")]
    InvalidUuid { protocol: ProtocolKind },

    #[error("missing public key (pbk) for Reality in VLESS link")]
    MissingPublicKey,

    #[error("invalid base64 encoding in {protocol} link")]
    InvalidBase64 { protocol: ProtocolKind },

    #[error("decoded {protocol} payload is not valid UTF-8")]
    InvalidUtf8 { protocol: ProtocolKind },

    #[error("invalid JSON in {protocol} link: {source}")]
    InvalidJson {
        protocol: ProtocolKind,
        #[source]
        source: serde_json::Error,
    },

    #[error("too many levels of base64 encoding in Shadowsocks link")]
    TooManyEncodingLevels,
}

/// Errors that can occur while driving a proxy lifecycle.
#[derive(Error, Debug)]
pub enum LifecycleError {
    #[error("proxy already running")]
    AlreadyRunning,

    #[error("proxy not running")]
    NotRunning,

    #[error("create proxy engine: {0}")]
    Create(#[source] BoxError),

    #[error("start proxy engine: {0}")]
    Start(#[source] BoxError),

    #[error("close proxy engine: {0}")]
    Close(#[source] BoxError),

    #[error("{phase} cancelled")]
    Cancelled { phase: Phase },

    #[error("{phase} timed out after {timeout:?}")]
    TimedOut { phase: Phase, timeout: Duration },

    #[error("engine task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl LifecycleError {
    /// True for errors caused by giving up on the wait rather than by the engine
    pub fn is_cancellation(&self) -> bool {
        matches!(
            self,
            LifecycleError::Cancelled { .. } | LifecycleError::TimedOut { .. }
        )
    }
}

/// Lifecycle phase an error refers to
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Start,
    Stop,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Start => f.write_str("start"),
            Phase::Stop => f.write_str("stop"),
        }
    }
}

/// Result type alias for decoding.
pub type Result<T> = std::result::Result<T, DecodeError>;
