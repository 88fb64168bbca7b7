//! Base64 decoding utilities
//!
//! Share links carry base64 payloads in two families of encodings: VMess
//! links use the standard alphabet with or without padding, Shadowsocks
//! links use the standard or the URL-safe alphabet.

use base64::Engine;
use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD, URL_SAFE, URL_SAFE_NO_PAD};
use tracing::trace;

// ============================================================================
// Base64 Decoding
// ============================================================================

/// Decodes standard base64, falling back to the unpadded variant
pub fn decode_standard_or_raw(content: &str) -> Option<Vec<u8>> {
    if let Ok(decoded) = STANDARD.decode(content) {
        trace!("Decoded using standard Base64");
        return Some(decoded);
    }

    if let Ok(decoded) = STANDARD_NO_PAD.decode(content) {
        trace!("Decoded using standard Base64 without padding");
        return Some(decoded);
    }

    None
}

/// Decodes standard base64, falling back to the URL-safe alphabet
///
/// Unpadded URL-safe payloads are accepted too since SIP002 generators
/// routinely strip the padding.
pub fn decode_standard_or_url_safe(content: &str) -> Option<Vec<u8>> {
    if let Ok(decoded) = STANDARD.decode(content) {
        trace!("Decoded using standard Base64");
        return Some(decoded);
    }

    if let Ok(decoded) = URL_SAFE.decode(content) {
        trace!("Decoded using URL-safe Base64");
        return Some(decoded);
    }

    if let Ok(decoded) = URL_SAFE_NO_PAD.decode(content) {
        trace!("Decoded using URL-safe Base64 without padding");
        return Some(decoded);
    }

    None
}
