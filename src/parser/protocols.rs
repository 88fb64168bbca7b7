//! Protocol parsers module
//!
//! This module contains parsers for the share-link URI formats. Each parser
//! implements the `ProtocolParser` trait; `parser_for` maps a `ProtocolKind`
//! to its parser with an exhaustive match.

mod http;
mod shadowsocks;
mod socks;
mod trojan;
mod vless;
mod vmess;

pub use http::HttpParser;
pub use shadowsocks::ShadowsocksParser;
pub use socks::SocksParser;
pub use trojan::TrojanParser;
pub use vless::VLessParser;
pub use vmess::VMessParser;

use std::collections::HashMap;

use crate::config::outbound::{
    GrpcTransport, HttpTransport, OutboundDescriptor, ProtocolKind, V2RayTransport,
    WebSocketTransport,
};
use crate::error::Result;

// ============================================================================
// Protocol Parser Trait
// ============================================================================

/// Trait for parsing individual protocol URIs
pub trait ProtocolParser: Send + Sync {
    /// The protocol this parser produces
    fn kind(&self) -> ProtocolKind;

    /// Parses a trimmed, size-checked link into an outbound descriptor
    fn parse(&self, link: &str) -> Result<OutboundDescriptor>;
}

/// Returns the parser for `kind`
pub fn parser_for(kind: ProtocolKind) -> &'static dyn ProtocolParser {
    match kind {
        ProtocolKind::VLess => &VLessParser,
        ProtocolKind::VMess => &VMessParser,
        ProtocolKind::Shadowsocks => &ShadowsocksParser,
        ProtocolKind::Trojan => &TrojanParser,
        ProtocolKind::Socks => &SocksParser,
        ProtocolKind::Http => &HttpParser,
    }
}

// ============================================================================
// Transport Helpers
// ============================================================================

/// Transport parameters shared by the URI and JSON link formats
#[derive(Debug, Default)]
pub(crate) struct TransportParams<'a> {
    pub network: Option<&'a str>,
    pub host: Option<&'a str>,
    pub path: Option<&'a str>,
    pub service_name: Option<&'a str>,
}

/// Builds the V2Ray transport selected by `network`.
///
/// `ws` uses `host` as the Host header, `grpc` uses `service_name`, and
/// `http`/`h2` use `host` and `path` when `allow_http` is set. Anything else
/// means plain TCP.
pub(crate) fn build_transport(
    params: &TransportParams<'_>,
    allow_http: bool,
) -> Option<V2RayTransport> {
    match params.network? {
        "ws" => {
            let mut headers = HashMap::new();
            if let Some(host) = params.host {
                headers.insert("Host".to_string(), host.to_string());
            }

            Some(V2RayTransport::WebSocket(WebSocketTransport {
                path: params.path.map(str::to_string),
                headers,
            }))
        }
        "grpc" => Some(V2RayTransport::Grpc(GrpcTransport {
            service_name: params.service_name.map(str::to_string),
        })),
        "http" | "h2" if allow_http => Some(V2RayTransport::Http(HttpTransport {
            host: params.host.map(str::to_string).into_iter().collect(),
            path: params.path.map(str::to_string),
        })),
        _ => None,
    }
}
