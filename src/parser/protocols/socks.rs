//! SOCKS5 protocol parser
//!
//! This module provides parsing for SOCKS (socks://, socks5://) URIs.
//! Format: socks5://[user[:pass]@]host[:port]

use tracing::trace;

use crate::config::outbound::{
    DEFAULT_TAG, OutboundDescriptor, ProtocolKind, ProtocolOptions, SocksOptions,
};
use crate::error::{DecodeError, Result};
use crate::parser::uri::{ShareUri, port_or_default};

use super::ProtocolParser;

/// Parser for SOCKS5 URIs
///
/// `socks://` is read exactly like `socks5://`. Fragments are ignored and the
/// tag is always the default one.
pub struct SocksParser;

impl ProtocolParser for SocksParser {
    fn kind(&self) -> ProtocolKind {
        ProtocolKind::Socks
    }

    fn parse(&self, link: &str) -> Result<OutboundDescriptor> {
        trace!("Parsing SOCKS URI");
        let missing = || DecodeError::MissingField {
            protocol: ProtocolKind::Socks,
            field: "server",
        };

        let uri = ShareUri::split(link).ok_or_else(missing)?;
        let server = uri.host();
        if server.is_empty() {
            return Err(missing());
        }
        let server_port = port_or_default(uri.host_port, 1080);

        let (username, password) = match uri.credentials() {
            Some((user, pass)) => (Some(user).filter(|u| !u.is_empty()), pass),
            None => (None, None),
        };

        trace!(
            "SOCKS config: server={}:{}, auth={}",
            server,
            server_port,
            username.is_some()
        );

        Ok(OutboundDescriptor {
            tag: DEFAULT_TAG.to_string(),
            server: server.to_string(),
            server_port,
            protocol: ProtocolOptions::Socks(SocksOptions {
                username,
                password,
                ..Default::default()
            }),
            tls: None,
            transport: None,
        })
    }
}
