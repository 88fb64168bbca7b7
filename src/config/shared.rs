//! Shared configuration fields
//!
//! Listen and TLS fields reused by inbounds and outbounds.

use serde::{Deserialize, Serialize};

use crate::config::util::is_false;

// ============================================================================
// Listen Fields
// ============================================================================

/// Listen fields for inbound connections.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct ListenFields {
    /// Listen address, always a literal IP
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub listen: Option<String>,

    /// Listen port
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub listen_port: Option<u16>,
}

// ============================================================================
// TLS Fields
// ============================================================================

/// TLS configuration for outbound (client) connections.
///
/// Reality is carried inside the TLS block, as the engine expects it.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct OutboundTlsConfig {
    /// Enable TLS
    #[serde(default, skip_serializing_if = "is_false")]
    pub enabled: bool,

    /// Server name for verification and SNI
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_name: Option<String>,

    /// Accept any server certificate (insecure)
    #[serde(default, skip_serializing_if = "is_false")]
    pub insecure: bool,

    /// List of supported ALPN protocols
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub alpn: Vec<String>,

    /// uTLS configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub utls: Option<UtlsConfig>,

    /// Reality configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reality: Option<OutboundRealityConfig>,
}

impl OutboundTlsConfig {
    /// Enabled TLS with an optional SNI and nothing else
    pub fn enabled(server_name: Option<String>) -> Self {
        Self {
            enabled: true,
            server_name,
            ..Default::default()
        }
    }

    /// Fingerprint selected through uTLS, if any
    pub fn fingerprint(&self) -> Option<&str> {
        self.utls.as_ref().and_then(|u| u.fingerprint.as_deref())
    }
}

/// uTLS configuration for TLS fingerprint resistance.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct UtlsConfig {
    /// Enable uTLS
    #[serde(default, skip_serializing_if = "is_false")]
    pub enabled: bool,

    /// Fingerprint to use: chrome, firefox, edge, safari, 360, qq, ios, android, random, randomized
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,
}

impl UtlsConfig {
    pub fn fingerprint(fingerprint: impl Into<String>) -> Self {
        Self {
            enabled: true,
            fingerprint: Some(fingerprint.into()),
        }
    }
}

/// Reality configuration for outbound (client).
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct OutboundRealityConfig {
    /// Enable Reality
    #[serde(default, skip_serializing_if = "is_false")]
    pub enabled: bool,

    /// Public key (generated by `sing-box generate reality-keypair`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_key: Option<String>,

    /// Short ID (hex string, 0-8 digits)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub short_id: Option<String>,
}
