//! Trojan protocol parser
//!
//! This module provides parsing for Trojan (trojan://) URIs.
//! Format: trojan://password@host:port?params#tag

use tracing::trace;

use crate::config::outbound::{OutboundDescriptor, ProtocolKind, ProtocolOptions, TrojanOptions};
use crate::config::shared::{OutboundTlsConfig, UtlsConfig};
use crate::error::{DecodeError, Result};
use crate::parser::uri::{ShareUri, percent_decode, port_or_default, split_list};

use super::{ProtocolParser, TransportParams, build_transport};

// ============================================================================
// Trojan Parser
// ============================================================================

/// Parser for Trojan (trojan://) URIs
///
/// Format: trojan://password@host:port?params#tag
pub struct TrojanParser;

impl ProtocolParser for TrojanParser {
    fn kind(&self) -> ProtocolKind {
        ProtocolKind::Trojan
    }

    fn parse(&self, link: &str) -> Result<OutboundDescriptor> {
        trace!("Parsing Trojan URI");
        let missing = |field| DecodeError::MissingField {
            protocol: ProtocolKind::Trojan,
            field,
        };

        let uri = ShareUri::split(link).ok_or(missing("server"))?;

        let password = uri
            .userinfo
            .map(percent_decode)
            .filter(|p| !p.is_empty())
            .ok_or(missing("password"))?
            .into_owned();

        let server = uri.host();
        if server.is_empty() {
            return Err(missing("server"));
        }
        let server_port = port_or_default(uri.host_port, 443);

        // Trojan always runs over TLS; SNI falls back to the server itself
        let tls = OutboundTlsConfig {
            enabled: true,
            server_name: Some(uri.param("sni").unwrap_or(server).to_string()),
            insecure: matches!(uri.param("allowInsecure"), Some("1" | "true")),
            alpn: uri.param("alpn").map(split_list).unwrap_or_default(),
            utls: uri.param("fp").map(|fp| UtlsConfig::fingerprint(fp)),
            ..Default::default()
        };

        let transport = build_transport(
            &TransportParams {
                network: uri.param("type"),
                host: uri.param("host"),
                path: uri.param("path"),
                service_name: uri.param("serviceName"),
            },
            false,
        );

        trace!(
            "Trojan config: server={}:{}, sni={:?}, type={:?}",
            server,
            server_port,
            tls.server_name,
            uri.param("type")
        );

        Ok(OutboundDescriptor {
            tag: uri.tag(),
            server: server.to_string(),
            server_port,
            protocol: ProtocolOptions::Trojan(TrojanOptions { password }),
            tls: Some(tls),
            transport,
        })
    }
}
