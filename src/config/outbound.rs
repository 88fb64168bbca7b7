use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::config::shared::OutboundTlsConfig;
use crate::config::util::is_zero_u32;

// ============================================================================
// Protocol Kind
// ============================================================================

/// The six proxy protocols a share link can describe
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ProtocolKind {
    VLess,
    VMess,
    Shadowsocks,
    Trojan,
    Socks,
    Http,
}

impl ProtocolKind {
    /// Every protocol kind, in dispatch order
    pub const ALL: [ProtocolKind; 6] = [
        ProtocolKind::VLess,
        ProtocolKind::VMess,
        ProtocolKind::Shadowsocks,
        ProtocolKind::Trojan,
        ProtocolKind::Socks,
        ProtocolKind::Http,
    ];

    /// Maps a URI scheme (without `://`) to its protocol.
    ///
    /// `socks` is an alias of `socks5`, and `https` shares the HTTP parser.
    pub fn from_scheme(scheme: &str) -> Option<Self> {
        match scheme {
            "vless" => Some(ProtocolKind::VLess),
            "vmess" => Some(ProtocolKind::VMess),
            "ss" => Some(ProtocolKind::Shadowsocks),
            "trojan" => Some(ProtocolKind::Trojan),
            "socks" | "socks5" => Some(ProtocolKind::Socks),
            "http" | "https" => Some(ProtocolKind::Http),
            _ => None,
        }
    }

    /// Canonical URI scheme of the protocol
    pub fn scheme(&self) -> &'static str {
        match self {
            ProtocolKind::VLess => "vless",
            ProtocolKind::VMess => "vmess",
            ProtocolKind::Shadowsocks => "ss",
            ProtocolKind::Trojan => "trojan",
            ProtocolKind::Socks => "socks5",
            ProtocolKind::Http => "http",
        }
    }

}

impl fmt::Display for ProtocolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProtocolKind::VLess => "VLESS",
            ProtocolKind::VMess => "VMess",
            ProtocolKind::Shadowsocks => "Shadowsocks",
            ProtocolKind::Trojan => "Trojan",
            ProtocolKind::Socks => "SOCKS5",
            ProtocolKind::Http => "HTTP",
        };
        f.write_str(name)
    }
}

// ============================================================================
// Outbound Descriptor
// ============================================================================

/// Default tag used when a link carries no display name
pub const DEFAULT_TAG: &str = "proxy";

/// A decoded share link.
///
/// Serializes to a single engine outbound: the protocol-specific fields are
/// flattened next to the common ones and discriminated by `type`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct OutboundDescriptor {
    /// Display label, also used as the routing target
    pub tag: String,

    /// Hostname or literal IP, never bracketed
    pub server: String,

    /// Always resolved, protocol default applied when absent
    pub server_port: u16,

    /// Protocol and credentials
    #[serde(flatten)]
    pub protocol: ProtocolOptions,

    /// TLS settings, Reality included
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls: Option<OutboundTlsConfig>,

    /// V2Ray transport, plain TCP when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transport: Option<V2RayTransport>,
}

/// Security layer applied on top of the transport
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Security {
    None,
    Tls,
    Reality,
}

impl OutboundDescriptor {
    pub fn kind(&self) -> ProtocolKind {
        self.protocol.kind()
    }

    pub fn security(&self) -> Security {
        match &self.tls {
            Some(tls) if tls.enabled && tls.reality.as_ref().is_some_and(|r| r.enabled) => {
                Security::Reality
            }
            Some(tls) if tls.enabled => Security::Tls,
            _ => Security::None,
        }
    }

    /// XTLS flow control, VLESS only
    pub fn flow(&self) -> Option<&str> {
        match &self.protocol {
            ProtocolOptions::VLess(vless) => vless.flow.as_deref(),
            _ => None,
        }
    }

    /// `host:port` of the remote server, IPv6 literals bracketed
    pub fn address(&self) -> String {
        if self.server.contains(':') {
            format!("[{}]:{}", self.server, self.server_port)
        } else {
            format!("{}:{}", self.server, self.server_port)
        }
    }
}

// ============================================================================
// Protocol Options
// ============================================================================

/// Protocol-specific credentials and options
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ProtocolOptions {
    /// VLESS outbound
    #[serde(rename = "vless")]
    VLess(VLessOptions),
    /// VMess outbound
    #[serde(rename = "vmess")]
    VMess(VMessOptions),
    /// Shadowsocks outbound
    Shadowsocks(ShadowsocksOptions),
    /// Trojan outbound
    Trojan(TrojanOptions),
    /// SOCKS5 outbound
    #[serde(rename = "socks")]
    Socks(SocksOptions),
    /// HTTP CONNECT outbound
    #[serde(rename = "http")]
    Http(HttpOptions),
}

impl ProtocolOptions {
    pub fn kind(&self) -> ProtocolKind {
        match self {
            ProtocolOptions::VLess(_) => ProtocolKind::VLess,
            ProtocolOptions::VMess(_) => ProtocolKind::VMess,
            ProtocolOptions::Shadowsocks(_) => ProtocolKind::Shadowsocks,
            ProtocolOptions::Trojan(_) => ProtocolKind::Trojan,
            ProtocolOptions::Socks(_) => ProtocolKind::Socks,
            ProtocolOptions::Http(_) => ProtocolKind::Http,
        }
    }
}

/// VLESS credentials
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct VLessOptions {
    /// VLESS user id
    pub uuid: String,

    /// Sub-protocol, e.g. `xtls-rprx-vision`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flow: Option<String>,

    /// UDP packet encoding: xudp or packetaddr
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub packet_encoding: Option<String>,
}

/// VMess credentials
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct VMessOptions {
    /// VMess user id
    pub uuid: String,

    /// Encryption method (auto, none, zero, aes-128-gcm, chacha20-poly1305)
    pub security: String,

    /// Legacy alter id, 0 selects AEAD
    #[serde(default, skip_serializing_if = "is_zero_u32")]
    pub alter_id: u32,
}

/// Shadowsocks credentials
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct ShadowsocksOptions {
    /// Encryption method
    pub method: String,

    /// Password, may be empty for `none`
    #[serde(default)]
    pub password: String,

    /// SIP003 plugin name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plugin: Option<String>,

    /// SIP003 plugin options
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plugin_opts: Option<String>,
}

/// Trojan credentials
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct TrojanOptions {
    pub password: String,
}

/// SOCKS credentials
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct SocksOptions {
    /// SOCKS version, always "5" for share links
    pub version: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl Default for SocksOptions {
    fn default() -> Self {
        Self {
            version: "5".to_string(),
            username: None,
            password: None,
        }
    }
}

/// HTTP proxy credentials
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct HttpOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

// ============================================================================
// Transports
// ============================================================================

/// V2Ray transport configuration for outbound
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum V2RayTransport {
    /// HTTP/2 transport
    Http(HttpTransport),
    /// WebSocket transport
    #[serde(rename = "ws")]
    WebSocket(WebSocketTransport),
    /// gRPC transport
    #[serde(rename = "grpc")]
    Grpc(GrpcTransport),
}

/// HTTP/2 transport configuration
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct HttpTransport {
    /// Host domains
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub host: Vec<String>,

    /// HTTP request path
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

/// WebSocket transport configuration
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct WebSocketTransport {
    /// HTTP request path
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// Extra headers
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub headers: HashMap<String, String>,
}

/// gRPC transport configuration
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct GrpcTransport {
    /// gRPC service name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_name: Option<String>,
}

// ============================================================================
// Engine Outbounds
// ============================================================================

/// Outbound entry in the routing configuration
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(untagged)]
pub enum Outbound {
    /// The decoded share link
    Proxy(OutboundDescriptor),
    /// Fixed auxiliary outbounds
    Builtin(BuiltinOutbound),
}

impl Outbound {
    pub fn tag(&self) -> &str {
        match self {
            Outbound::Proxy(descriptor) => &descriptor.tag,
            Outbound::Builtin(BuiltinOutbound::Direct(o)) => &o.tag,
            Outbound::Builtin(BuiltinOutbound::Block(o)) => &o.tag,
        }
    }
}

/// Outbounds the engine provides without a remote server
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BuiltinOutbound {
    /// Send requests directly
    Direct(DirectOutbound),
    /// Drop requests
    Block(BlockOutbound),
}

/// Tag of the built-in direct outbound
pub const DIRECT_TAG: &str = "direct";

/// Tag of the built-in block outbound
pub const BLOCK_TAG: &str = "block";

/// Direct outbound configuration
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct DirectOutbound {
    pub tag: String,
}

impl Default for DirectOutbound {
    fn default() -> Self {
        Self {
            tag: DIRECT_TAG.to_string(),
        }
    }
}

/// Block outbound configuration
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct BlockOutbound {
    pub tag: String,
}

impl Default for BlockOutbound {
    fn default() -> Self {
        Self {
            tag: BLOCK_TAG.to_string(),
        }
    }
}
