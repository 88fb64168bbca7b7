//! Share link decoding
//!
//! This module turns a single share link (vless://, vmess://, ss://,
//! trojan://, socks5://, http[s]://) into an `OutboundDescriptor`:
//! - Size and scheme checks on the raw input
//! - Dispatch on `ProtocolKind` to the protocol parser
//! - Newline separated link lists, strict or lossy

pub mod base64;
pub mod protocols;
pub mod uri;

use tracing::{debug, warn};

use crate::config::outbound::{OutboundDescriptor, ProtocolKind};
use crate::error::{DecodeError, Result};

use self::protocols::parser_for;

/// Largest accepted share link, in bytes
pub const MAX_LINK_LENGTH: usize = 64 * 1024;

// ============================================================================
// Link Decoding
// ============================================================================

/// Decodes one share link into an outbound descriptor.
///
/// Surrounding whitespace is ignored. Links longer than `MAX_LINK_LENGTH`
/// are rejected before any parsing happens.
pub fn decode(link: &str) -> Result<OutboundDescriptor> {
    let link = link.trim();
    if link.len() > MAX_LINK_LENGTH {
        return Err(DecodeError::LinkTooLong {
            len: link.len(),
            max: MAX_LINK_LENGTH,
        });
    }

    let scheme = extract_scheme(link);
    let kind = ProtocolKind::from_scheme(scheme)
        .ok_or_else(|| DecodeError::UnsupportedProtocol(scheme.to_string()))?;

    debug!("Decoding {} link", kind);
    let descriptor = parser_for(kind).parse(link)?;
    debug!(
        "Decoded {} outbound '{}' -> {}",
        kind,
        descriptor.tag,
        descriptor.address()
    );

    Ok(descriptor)
}

/// Decodes newline separated links, one result per link.
///
/// Blank lines and lines starting with `#` are skipped.
pub fn decode_list(content: &str) -> Vec<Result<OutboundDescriptor>> {
    let lines: Vec<&str> = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .collect();

    debug!("Decoding {} links from content", lines.len());

    lines.into_iter().map(decode).collect()
}

/// Decodes newline separated links, keeping only the successful ones
pub fn decode_list_lossy(content: &str) -> Vec<OutboundDescriptor> {
    let results = decode_list(content);
    let total = results.len();

    let descriptors: Vec<OutboundDescriptor> = results
        .into_iter()
        .filter_map(|r| match r {
            Ok(descriptor) => Some(descriptor),
            Err(e) => {
                warn!("Failed to decode link: {}", e);
                None
            }
        })
        .collect();

    let success = descriptors.len();
    debug!(
        "Link list decoding complete: {} total, {} successful, {} failed",
        total,
        success,
        total - success
    );

    descriptors
}

/// Scheme in front of `://`, or the whole input when the separator is absent
fn extract_scheme(link: &str) -> &str {
    link.split_once("://").map_or(link, |(scheme, _)| scheme)
}
