//! HTTP proxy parser
//!
//! This module provides parsing for HTTP (http://, https://) proxy URIs.
//! Format: http[s]://[user:pass@]host[:port]

use tracing::trace;

use crate::config::outbound::{
    DEFAULT_TAG, HttpOptions, OutboundDescriptor, ProtocolKind, ProtocolOptions,
};
use crate::config::shared::OutboundTlsConfig;
use crate::error::{DecodeError, Result};
use crate::parser::uri::{ShareUri, port_or_default};

use super::ProtocolParser;

/// Parser for HTTP and HTTPS proxy URIs
///
/// The default port follows the scheme (80 or 443) and `https` attaches an
/// enabled TLS block without SNI.
pub struct HttpParser;

impl ProtocolParser for HttpParser {
    fn kind(&self) -> ProtocolKind {
        ProtocolKind::Http
    }

    fn parse(&self, link: &str) -> Result<OutboundDescriptor> {
        trace!("Parsing HTTP proxy URI");
        let missing = || DecodeError::MissingField {
            protocol: ProtocolKind::Http,
            field: "server",
        };

        let uri = ShareUri::split(link).ok_or_else(missing)?;
        let server = uri.host();
        if server.is_empty() {
            return Err(missing());
        }

        let is_https = uri.scheme.eq_ignore_ascii_case("https");
        let server_port = port_or_default(uri.host_port, if is_https { 443 } else { 80 });

        let (username, password) = match uri.credentials() {
            Some((user, pass)) => (Some(user).filter(|u| !u.is_empty()), pass),
            None => (None, None),
        };

        trace!(
            "HTTP config: server={}:{}, https={}, auth={}",
            server,
            server_port,
            is_https,
            username.is_some()
        );

        Ok(OutboundDescriptor {
            tag: DEFAULT_TAG.to_string(),
            server: server.to_string(),
            server_port,
            protocol: ProtocolOptions::Http(HttpOptions { username, password }),
            tls: is_https.then(|| OutboundTlsConfig::enabled(None)),
            transport: None,
        })
    }
}
