//! VLESS protocol parser
//!
//! This module provides parsing for VLESS (vless://) URIs.
//! Format: vless://uuid@host:port?params#tag

use tracing::trace;

use crate::config::outbound::{OutboundDescriptor, ProtocolKind, ProtocolOptions, VLessOptions};
use crate::config::shared::{OutboundRealityConfig, OutboundTlsConfig, UtlsConfig};
use crate::error::{DecodeError, Result};
use crate::parser::uri::{ShareUri, is_valid_uuid, percent_decode, port_or_default, split_list};

use super::{ProtocolParser, TransportParams, build_transport};

/// Fingerprint used for Reality when the link names none
const DEFAULT_REALITY_FINGERPRINT: &str = "chrome";

// ============================================================================
// VLESS Parser
// ============================================================================

/// Parser for VLESS (vless://) URIs
///
/// Format: vless://uuid@host:port?params#tag
pub struct VLessParser;

impl ProtocolParser for VLessParser {
    fn kind(&self) -> ProtocolKind {
        ProtocolKind::VLess
    }

    fn parse(&self, link: &str) -> Result<OutboundDescriptor> {
        trace!("Parsing VLESS URI");
        let missing = |field| DecodeError::MissingField {
            protocol: ProtocolKind::VLess,
            field,
        };

        let uri = ShareUri::split(link).ok_or(missing("server"))?;

        let uuid = uri
            .userinfo
            .map(percent_decode)
            .filter(|u| !u.is_empty())
            .ok_or(missing("UUID"))?
            .into_owned();
        if !is_valid_uuid(&uuid) {
            return Err(DecodeError::InvalidUuid {
                protocol: ProtocolKind::VLess,
            });
        }

        let server = uri.host();
        if server.is_empty() {
            return Err(missing("server"));
        }
        let server_port = port_or_default(uri.host_port, 443);

        let tls = build_tls(&uri)?;

        let transport = build_transport(
            &TransportParams {
                network: uri.param("type"),
                host: uri.param("host"),
                path: uri.param("path"),
                service_name: uri.param("serviceName"),
            },
            true,
        );

        trace!(
            "VLESS config: server={}:{}, security={:?}, type={:?}",
            server,
            server_port,
            uri.param("security"),
            uri.param("type")
        );

        Ok(OutboundDescriptor {
            tag: uri.tag(),
            server: server.to_string(),
            server_port,
            protocol: ProtocolOptions::VLess(VLessOptions {
                uuid,
                flow: uri.param("flow").map(str::to_string),
                packet_encoding: uri.param("packetEncoding").map(str::to_string),
            }),
            tls,
            transport,
        })
    }
}

/// Builds the TLS block for `security=tls` or `security=reality`.
///
/// Reality refuses to build without a public key and always carries a uTLS
/// fingerprint.
fn build_tls(uri: &ShareUri<'_>) -> Result<Option<OutboundTlsConfig>> {
    let security = uri.param("security").unwrap_or("none");
    if security != "tls" && security != "reality" {
        return Ok(None);
    }

    let mut tls = OutboundTlsConfig {
        enabled: true,
        server_name: uri.param("sni").map(str::to_string),
        alpn: uri.param("alpn").map(split_list).unwrap_or_default(),
        utls: uri.param("fp").map(|fp| UtlsConfig::fingerprint(fp)),
        ..Default::default()
    };

    if security == "reality" {
        let public_key = uri.param("pbk").ok_or(DecodeError::MissingPublicKey)?;

        tls.utls = Some(UtlsConfig::fingerprint(
            uri.param("fp").unwrap_or(DEFAULT_REALITY_FINGERPRINT),
        ));
        tls.reality = Some(OutboundRealityConfig {
            enabled: true,
            public_key: Some(public_key.to_string()),
            short_id: uri.param("sid").map(str::to_string),
        });
    }

    Ok(Some(tls))
}
