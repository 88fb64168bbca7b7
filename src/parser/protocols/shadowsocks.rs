//! Shadowsocks protocol parser
//!
//! This module provides parsing for Shadowsocks (ss://) URIs.
//! Supports both SIP002 format and legacy format, as well as SIP003 plugins.

use tracing::{trace, warn};

use crate::config::outbound::{
    OutboundDescriptor, ProtocolKind, ProtocolOptions, ShadowsocksOptions,
};
use crate::error::{DecodeError, Result};
use crate::parser::base64::decode_standard_or_url_safe;
use crate::parser::uri::{percent_decode, port_or_default, split_host, tag_or_default};

use super::ProtocolParser;

/// Default Shadowsocks server port
const DEFAULT_PORT: u16 = 8388;

/// Base64 layers a legacy link may be wrapped in
const MAX_ENCODING_DEPTH: usize = 1;

// ============================================================================
// Shadowsocks Parser
// ============================================================================

/// Parser for Shadowsocks (ss://) URIs
///
/// Supports both SIP002 format and legacy format, as well as SIP003 plugins:
/// - SIP002: ss://BASE64(method:password)@host:port#tag
/// - SIP002 with userinfo: ss://method:password@host:port#tag
/// - SIP002 with SIP003 plugin: ss://userinfo@host:port/?plugin=plugin-name;plugin-opts#tag
/// - Legacy: ss://BASE64(method:password@host:port)#tag
pub struct ShadowsocksParser;

impl ProtocolParser for ShadowsocksParser {
    fn kind(&self) -> ProtocolKind {
        ProtocolKind::Shadowsocks
    }

    fn parse(&self, link: &str) -> Result<OutboundDescriptor> {
        trace!("Parsing Shadowsocks URI");
        let without_scheme = link.strip_prefix("ss://").unwrap_or(link);
        parse_with_depth(without_scheme, None, 0)
    }
}

/// Parses the part after `ss://`.
///
/// `outer_tag` is the fragment of the enclosing link when a legacy blob is
/// being unwrapped; it wins over any fragment inside the blob.
fn parse_with_depth(
    content: &str,
    outer_tag: Option<String>,
    depth: usize,
) -> Result<OutboundDescriptor> {
    let (main_part, tag) = match content.split_once('#') {
        Some((main, fragment)) => (main, outer_tag.or(Some(percent_decode(fragment).into_owned()))),
        None => (content, outer_tag),
    };

    if main_part.trim().is_empty() {
        return Err(DecodeError::MissingField {
            protocol: ProtocolKind::Shadowsocks,
            field: "server",
        });
    }

    if let Some(at_pos) = main_part.rfind('@') {
        trace!("Parsing as SIP002 format (found @ separator)");
        return parse_sip002(&main_part[..at_pos], &main_part[at_pos + 1..], tag);
    }

    if depth >= MAX_ENCODING_DEPTH {
        return Err(DecodeError::TooManyEncodingLevels);
    }

    trace!("Parsing as legacy Base64 format");
    let decoded = decode_standard_or_url_safe(main_part).ok_or(DecodeError::InvalidBase64 {
        protocol: ProtocolKind::Shadowsocks,
    })?;
    let decoded = String::from_utf8(decoded).map_err(|_| DecodeError::InvalidUtf8 {
        protocol: ProtocolKind::Shadowsocks,
    })?;

    parse_with_depth(&decoded, tag, depth + 1)
}

/// Parses `userinfo@host:port[/][?plugin=...]`
fn parse_sip002(
    userinfo: &str,
    hostport_and_query: &str,
    tag: Option<String>,
) -> Result<OutboundDescriptor> {
    let missing = |field| DecodeError::MissingField {
        protocol: ProtocolKind::Shadowsocks,
        field,
    };

    let (hostport_raw, query_string) = match hostport_and_query.split_once('?') {
        Some((hostport, query)) => (hostport, Some(query)),
        None => (hostport_and_query, None),
    };

    // Strip trailing slash that may appear before the query string
    let hostport = hostport_raw.trim_end_matches('/');

    let server = split_host(hostport);
    if server.is_empty() {
        return Err(missing("server"));
    }
    let server_port = port_or_default(hostport, DEFAULT_PORT);

    let (method, password) = parse_userinfo(userinfo);
    if method.is_empty() {
        return Err(missing("method"));
    }

    let (plugin, plugin_opts) = parse_plugin_query(query_string);

    trace!(
        "Shadowsocks config: server={}:{}, method={}, plugin={:?}",
        server, server_port, method, plugin
    );

    Ok(OutboundDescriptor {
        tag: tag_or_default(tag.as_deref()),
        server: server.to_string(),
        server_port,
        protocol: ProtocolOptions::Shadowsocks(ShadowsocksOptions {
            method,
            password,
            plugin,
            plugin_opts,
        }),
        tls: None,
        transport: None,
    })
}

/// Parses userinfo which can be Base64(method:password) or method:password.
///
/// A Base64 payload that is not UTF-8 or has no `:` is not treated as
/// credentials; the literal userinfo is used instead.
fn parse_userinfo(userinfo: &str) -> (String, String) {
    if let Some(decoded) = decode_standard_or_url_safe(userinfo)
        && let Ok(decoded_str) = String::from_utf8(decoded)
        && let Some((method, password)) = decoded_str.split_once(':')
    {
        return (method.to_string(), password.to_string());
    }

    let literal = percent_decode(userinfo);
    match literal.split_once(':') {
        Some((method, password)) => (method.to_string(), password.to_string()),
        None => (literal.into_owned(), String::new()),
    }
}

/// Parses the SIP003 `plugin` query parameter.
///
/// The first `;` separates the plugin name from its options:
/// `plugin=obfs-local;obfs=http;obfs-host=example.com`
/// → plugin `obfs-local`, opts `obfs=http;obfs-host=example.com`
fn parse_plugin_query(query_string: Option<&str>) -> (Option<String>, Option<String>) {
    let Some(query) = query_string.filter(|q| !q.is_empty()) else {
        return (None, None);
    };

    let Some(decoded) = url::form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == "plugin")
        .map(|(_, value)| value.into_owned())
        .filter(|value| !value.is_empty())
    else {
        return (None, None);
    };

    match decoded.split_once(';') {
        Some((plugin, opts)) => (
            Some(normalize_plugin(plugin)),
            (!opts.is_empty()).then(|| opts.to_string()),
        ),
        None => (Some(normalize_plugin(&decoded)), None),
    }
}

/// Maps the deprecated `simple-obfs` name to `obfs-local`; warns on plugins
/// other than `obfs-local` and `v2ray-plugin` but keeps them.
fn normalize_plugin(plugin: &str) -> String {
    match plugin {
        "simple-obfs" => {
            warn!(
                deprecated = "simple-obfs",
                replacement = "obfs-local",
                "Deprecated SIP003 plugin substituted with supported alternative"
            );
            "obfs-local".to_string()
        }
        "obfs-local" | "v2ray-plugin" => plugin.to_string(),
        other => {
            warn!(plugin = other, "Unknown SIP003 plugin");
            other.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine;
    use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};

    fn parse(link: &str) -> Result<OutboundDescriptor> {
        ShadowsocksParser.parse(link)
    }

    fn options(descriptor: &OutboundDescriptor) -> &ShadowsocksOptions {
        if let ProtocolOptions::Shadowsocks(ss) = &descriptor.protocol {
            ss
        } else {
            panic!("Expected Shadowsocks options");
        }
    }

    #[test]
    fn test_shadowsocks_plain_userinfo() {
        let descriptor = parse("ss://aes-256-gcm:password@example.com:8388#test-node").unwrap();

        assert_eq!(descriptor.kind(), ProtocolKind::Shadowsocks);
        assert_eq!(descriptor.tag, "test-node");
        assert_eq!(descriptor.server, "example.com");
        assert_eq!(descriptor.server_port, 8388);
        let ss = options(&descriptor);
        assert_eq!(ss.method, "aes-256-gcm");
        assert_eq!(ss.password, "password");
        assert!(ss.plugin.is_none());
        assert!(descriptor.tls.is_none());
    }

    #[test]
    fn test_shadowsocks_sip002_base64_userinfo() {
        let userinfo = STANDARD.encode("chacha20-ietf-poly1305:secret");
        let descriptor = parse(&format!("ss://{userinfo}@1.2.3.4:443#sip002")).unwrap();
        let ss = options(&descriptor);
        assert_eq!(ss.method, "chacha20-ietf-poly1305");
        assert_eq!(ss.password, "secret");
        assert_eq!(descriptor.server_port, 443);
    }

    #[test]
    fn test_shadowsocks_url_safe_userinfo() {
        let userinfo = URL_SAFE_NO_PAD.encode("aes-128-gcm:p?ss>");
        let descriptor = parse(&format!("ss://{userinfo}@example.com:8388")).unwrap();
        assert_eq!(options(&descriptor).password, "p?ss>");
    }

    #[test]
    fn test_shadowsocks_password_with_colon() {
        let descriptor = parse("ss://aes-256-gcm:pa:ss@example.com:8388").unwrap();
        assert_eq!(options(&descriptor).password, "pa:ss");
    }

    #[test]
    fn test_shadowsocks_default_port() {
        let descriptor = parse("ss://aes-256-gcm:pw@host").unwrap();
        assert_eq!(descriptor.server_port, 8388);

        let descriptor = parse("ss://aes-256-gcm:pw@host:99999").unwrap();
        assert_eq!(descriptor.server_port, 8388);
        assert_eq!(descriptor.tag, "proxy");
    }

    #[test]
    fn test_shadowsocks_ipv6() {
        let descriptor = parse("ss://aes-256-gcm:pw@[2001:db8::1]:8443#v6").unwrap();
        assert_eq!(descriptor.server, "2001:db8::1");
        assert_eq!(descriptor.server_port, 8443);

        let descriptor = parse("ss://aes-256-gcm:pw@[::1]").unwrap();
        assert_eq!(descriptor.server, "::1");
        assert_eq!(descriptor.server_port, 8388);
    }

    #[test]
    fn test_shadowsocks_legacy_format() {
        let encoded = STANDARD.encode("aes-256-gcm:password@example.com:8388");
        let descriptor = parse(&format!("ss://{encoded}#legacy-node")).unwrap();
        assert_eq!(descriptor.tag, "legacy-node");
        assert_eq!(descriptor.server, "example.com");
        let ss = options(&descriptor);
        assert_eq!(ss.method, "aes-256-gcm");
        assert_eq!(ss.password, "password");
    }

    #[test]
    fn test_shadowsocks_legacy_inner_tag() {
        let encoded = STANDARD.encode("aes-256-gcm:password@example.com:8388#inner");
        assert_eq!(parse(&format!("ss://{encoded}")).unwrap().tag, "inner");
        assert_eq!(parse(&format!("ss://{encoded}#outer")).unwrap().tag, "outer");
    }

    #[test]
    fn test_shadowsocks_nested_base64_is_bounded() {
        let inner = STANDARD.encode("aes-256-gcm:password@example.com:8388");
        let outer = STANDARD.encode(&inner);
        assert!(matches!(
            parse(&format!("ss://{outer}")),
            Err(DecodeError::TooManyEncodingLevels)
        ));
    }

    #[test]
    fn test_shadowsocks_invalid_base64() {
        assert!(matches!(
            parse("ss://not*valid*base64"),
            Err(DecodeError::InvalidBase64 { .. })
        ));
    }

    #[test]
    fn test_shadowsocks_non_utf8_blob() {
        let encoded = STANDARD.encode([0xff, 0xfe, 0xfd]);
        assert!(matches!(
            parse(&format!("ss://{encoded}")),
            Err(DecodeError::InvalidUtf8 { .. })
        ));
    }

    #[test]
    fn test_shadowsocks_non_utf8_userinfo_falls_back_to_literal() {
        // "////" decodes to 0xff bytes, so it is read literally
        let descriptor = parse("ss://////@example.com:8388").unwrap();
        let ss = options(&descriptor);
        assert_eq!(ss.method, "////");
        assert!(ss.password.is_empty());
    }

    #[test]
    fn test_shadowsocks_missing_fields() {
        assert!(matches!(
            parse("ss://aes-256-gcm:pw@:8388"),
            Err(DecodeError::MissingField { field: "server", .. })
        ));
        assert!(matches!(
            parse("ss://:pw@example.com:8388"),
            Err(DecodeError::MissingField { field: "method", .. })
        ));
    }

    #[test]
    fn test_shadowsocks_with_plugin() {
        let link = "ss://aes-256-gcm:pw@example.com:8388/?plugin=obfs-local%3Bobfs%3Dhttp%3Bobfs-host%3Dexample.com#plugin-node";
        let descriptor = parse(link).unwrap();
        let ss = options(&descriptor);
        assert_eq!(ss.plugin.as_deref(), Some("obfs-local"));
        assert_eq!(ss.plugin_opts.as_deref(), Some("obfs=http;obfs-host=example.com"));
        assert_eq!(descriptor.server_port, 8388);
        assert_eq!(descriptor.tag, "plugin-node");
    }

    #[test]
    fn test_shadowsocks_plugin_without_opts() {
        let descriptor = parse("ss://aes-256-gcm:pw@example.com:8388?plugin=v2ray-plugin").unwrap();
        let ss = options(&descriptor);
        assert_eq!(ss.plugin.as_deref(), Some("v2ray-plugin"));
        assert!(ss.plugin_opts.is_none());
    }

    #[test]
    fn test_shadowsocks_simple_obfs_normalized() {
        let descriptor =
            parse("ss://aes-256-gcm:pw@example.com:8388/?plugin=simple-obfs%3Bobfs%3Dtls").unwrap();
        let ss = options(&descriptor);
        assert_eq!(ss.plugin.as_deref(), Some("obfs-local"));
        assert_eq!(ss.plugin_opts.as_deref(), Some("obfs=tls"));
    }

    #[test]
    fn test_shadowsocks_unicode_tag() {
        let descriptor = parse("ss://aes-256-gcm:pw@example.com:8388#%E9%A6%99%E6%B8%AF").unwrap();
        assert_eq!(descriptor.tag, "香港");
    }

    #[test]
    fn test_shadowsocks_empty_body() {
        for link in ["ss://", "ss://#only-tag", "ss://  "] {
            assert!(
                matches!(
                    parse(link),
                    Err(DecodeError::MissingField { field: "server", .. })
                ),
                "{}",
                link
            );
        }

        // A blob that decodes to nothing is just as empty
        let empty_blob = "ss://IA==";
        assert!(matches!(
            parse(empty_blob),
            Err(DecodeError::MissingField { field: "server", .. })
        ));
    }
}
