//! VMess protocol parser
//!
//! This module provides parsing for VMess (vmess://) URIs.
//! VMess URIs are Base64 encoded JSON containing connection details.

use serde::Deserialize;
use tracing::trace;

use crate::config::outbound::{OutboundDescriptor, ProtocolKind, ProtocolOptions, VMessOptions};
use crate::config::shared::{OutboundTlsConfig, UtlsConfig};
use crate::config::util::deserialize_lenient_string;
use crate::error::{DecodeError, Result};
use crate::parser::base64::decode_standard_or_raw;
use crate::parser::uri::{is_valid_uuid, split_list, tag_or_default};

use super::{ProtocolParser, TransportParams, build_transport};

// ============================================================================
// VMess Parser
// ============================================================================

/// Parser for VMess (vmess://) URIs
///
/// VMess URIs are Base64 encoded JSON:
/// vmess://BASE64({ "v": "2", "ps": "name", "add": "host", "port": "443", ... })
pub struct VMessParser;

/// VMess URI JSON structure
///
/// Every field is optional and read leniently: generators emit numbers as
/// either strings or JSON numbers, and some write `null` for empty fields.
#[derive(Deserialize, Debug, Default)]
#[serde(default)]
#[allow(dead_code)]
struct VMessJson {
    /// Version (usually "2")
    #[serde(deserialize_with = "deserialize_lenient_string")]
    v: String,
    /// Remark/name
    #[serde(deserialize_with = "deserialize_lenient_string")]
    ps: String,
    /// Server address
    #[serde(deserialize_with = "deserialize_lenient_string")]
    add: String,
    /// Server port
    #[serde(deserialize_with = "deserialize_lenient_string")]
    port: String,
    /// UUID
    #[serde(deserialize_with = "deserialize_lenient_string")]
    id: String,
    /// Alter ID
    #[serde(deserialize_with = "deserialize_lenient_string")]
    aid: String,
    /// Security/encryption method
    #[serde(deserialize_with = "deserialize_lenient_string")]
    scy: String,
    /// Network type (tcp, ws, grpc, http, h2)
    #[serde(deserialize_with = "deserialize_lenient_string")]
    net: String,
    /// Header type
    #[serde(rename = "type", deserialize_with = "deserialize_lenient_string")]
    header_type: String,
    /// WebSocket/HTTP host
    #[serde(deserialize_with = "deserialize_lenient_string")]
    host: String,
    /// WebSocket/HTTP path, gRPC service name in older links
    #[serde(deserialize_with = "deserialize_lenient_string")]
    path: String,
    /// TLS setting
    #[serde(deserialize_with = "deserialize_lenient_string")]
    tls: String,
    /// SNI
    #[serde(deserialize_with = "deserialize_lenient_string")]
    sni: String,
    /// ALPN
    #[serde(deserialize_with = "deserialize_lenient_string")]
    alpn: String,
    /// Fingerprint
    #[serde(deserialize_with = "deserialize_lenient_string")]
    fp: String,
    /// gRPC service name
    #[serde(rename = "serviceName", deserialize_with = "deserialize_lenient_string")]
    service_name: String,
}

impl ProtocolParser for VMessParser {
    fn kind(&self) -> ProtocolKind {
        ProtocolKind::VMess
    }

    fn parse(&self, link: &str) -> Result<OutboundDescriptor> {
        trace!("Parsing VMess URI");
        let encoded = link.strip_prefix("vmess://").unwrap_or(link);

        let decoded = decode_standard_or_raw(encoded).ok_or(DecodeError::InvalidBase64 {
            protocol: ProtocolKind::VMess,
        })?;

        let json: VMessJson =
            serde_json::from_slice(&decoded).map_err(|source| DecodeError::InvalidJson {
                protocol: ProtocolKind::VMess,
                source,
            })?;

        trace!(
            "VMess config: server={}:{}, net={:?}, tls={:?}",
            json.add, json.port, json.net, json.tls
        );

        if json.add.is_empty() {
            return Err(DecodeError::MissingField {
                protocol: ProtocolKind::VMess,
                field: "server address",
            });
        }
        if json.id.is_empty() {
            return Err(DecodeError::MissingField {
                protocol: ProtocolKind::VMess,
                field: "UUID",
            });
        }
        if !is_valid_uuid(&json.id) {
            return Err(DecodeError::InvalidUuid {
                protocol: ProtocolKind::VMess,
            });
        }

        let server_port = leading_port(&json.port).unwrap_or(443);

        let tls = build_tls(&json);

        let transport = build_transport(
            &TransportParams {
                network: non_empty(&json.net),
                host: non_empty(&json.host),
                path: non_empty(&json.path),
                service_name: non_empty(&json.service_name).or(non_empty(&json.path)),
            },
            true,
        );

        let security = non_empty(&json.scy).unwrap_or("auto").to_string();
        let alter_id = json.aid.trim().parse().unwrap_or(0);

        Ok(OutboundDescriptor {
            tag: tag_or_default(Some(&json.ps)),
            server: json.add,
            server_port,
            protocol: ProtocolOptions::VMess(VMessOptions {
                uuid: json.id,
                security,
                alter_id,
            }),
            tls,
            transport,
        })
    }
}

/// TLS is enabled by `"tls": "tls"`; SNI falls back to the `host` field.
fn build_tls(json: &VMessJson) -> Option<OutboundTlsConfig> {
    if json.tls != "tls" {
        return None;
    }

    Some(OutboundTlsConfig {
        enabled: true,
        server_name: non_empty(&json.sni)
            .or(non_empty(&json.host))
            .map(str::to_string),
        alpn: split_list(&json.alpn),
        utls: non_empty(&json.fp).map(|fp| UtlsConfig::fingerprint(fp)),
        ..Default::default()
    })
}

fn non_empty(s: &str) -> Option<&str> {
    if s.is_empty() { None } else { Some(s) }
}

/// Reads the leading digits of a port field, so `"8443 "` and `"8443abc"`
/// both give 8443. Zero and out-of-range values count as absent.
fn leading_port(raw: &str) -> Option<u16> {
    let raw = raw.trim_start();
    let digits = raw.find(|c: char| !c.is_ascii_digit()).unwrap_or(raw.len());
    raw[..digits].parse::<u16>().ok().filter(|p| *p != 0)
}
