use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};

use crate::config::shared::ListenFields;

// ============================================================================
// Inbound Enum
// ============================================================================

/// Inbound configuration enum
///
/// Share links are always served through a single mixed listener, so that
/// is the only inbound type modelled here.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Inbound {
    /// Mixed inbound (SOCKS4/4a/5 and HTTP)
    Mixed(MixedInbound),
}

// ============================================================================
// Mixed Inbound
// ============================================================================

/// Tag of the local mixed listener
pub const MIXED_INBOUND_TAG: &str = "mixed-in";

/// Mixed inbound configuration (SOCKS4/4a/5 and HTTP)
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct MixedInbound {
    /// Tag of the inbound
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,

    /// Listen fields
    #[serde(flatten)]
    pub listen: ListenFields,
}

impl MixedInbound {
    /// Mixed listener bound to `addr`
    pub fn bound_to(addr: SocketAddr) -> Self {
        Self {
            tag: Some(MIXED_INBOUND_TAG.to_string()),
            listen: ListenFields {
                listen: Some(addr.ip().to_string()),
                listen_port: Some(addr.port()),
            },
        }
    }

    /// Socket address the listener binds, if the listen fields are usable.
    pub fn socket_addr(&self) -> Option<SocketAddr> {
        let ip: IpAddr = self.listen.listen.as_deref()?.parse().ok()?;
        Some(SocketAddr::new(ip, self.listen.listen_port?))
    }
}
