//! Share URI splitting and field helpers
//!
//! Share links are split by hand instead of through a generic URL parser:
//! ports outside `u16` range must fall back to protocol defaults rather than
//! fail, and hosts keep their original spelling.

use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use tracing::warn;

use crate::config::outbound::DEFAULT_TAG;

/// Canonical UUID shape, dashes optional
static UUID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^[0-9a-fA-F]{8}-?[0-9a-fA-F]{4}-?[0-9a-fA-F]{4}-?[0-9a-fA-F]{4}-?[0-9a-fA-F]{12}$",
    )
    .expect("UUID pattern is a valid regex")
});

// ============================================================================
// Share URI
// ============================================================================

/// The pieces of `scheme://[userinfo@]host[:port][/path][?query][#fragment]`
#[derive(Debug, Default)]
pub struct ShareUri<'a> {
    pub scheme: &'a str,
    /// Raw userinfo, still percent-encoded
    pub userinfo: Option<&'a str>,
    /// Raw `host[:port]` part of the authority
    pub host_port: &'a str,
    /// Decoded query parameters, first occurrence wins
    pub query: HashMap<String, String>,
    /// Decoded fragment
    pub fragment: Option<String>,
}

impl<'a> ShareUri<'a> {
    /// Splits a share link. Returns `None` when `://` is absent.
    pub fn split(link: &'a str) -> Option<Self> {
        let (scheme, rest) = link.split_once("://")?;

        let (rest, fragment) = match rest.split_once('#') {
            Some((before, fragment)) => (before, Some(percent_decode(fragment).into_owned())),
            None => (rest, None),
        };

        let (rest, raw_query) = match rest.split_once('?') {
            Some((before, query)) => (before, Some(query)),
            None => (rest, None),
        };

        let authority = match rest.find('/') {
            Some(pos) => &rest[..pos],
            None => rest,
        };

        let (userinfo, host_port) = match authority.rfind('@') {
            Some(pos) => (Some(&authority[..pos]), &authority[pos + 1..]),
            None => (None, authority),
        };

        let mut query = HashMap::new();
        if let Some(raw_query) = raw_query {
            for (key, value) in url::form_urlencoded::parse(raw_query.as_bytes()) {
                query.entry(key.into_owned()).or_insert_with(|| value.into_owned());
            }
        }

        Some(Self {
            scheme,
            userinfo,
            host_port,
            query,
            fragment,
        })
    }

    /// Host without IPv6 brackets
    pub fn host(&self) -> &'a str {
        split_host(self.host_port)
    }

    /// Non-empty query parameter
    pub fn param(&self, key: &str) -> Option<&str> {
        self.query
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    /// Percent-decoded `(user, password)` from the userinfo
    pub fn credentials(&self) -> Option<(String, Option<String>)> {
        let userinfo = self.userinfo?;
        Some(match userinfo.split_once(':') {
            Some((user, password)) => (
                percent_decode(user).into_owned(),
                Some(percent_decode(password).into_owned()),
            ),
            None => (percent_decode(userinfo).into_owned(), None),
        })
    }

    /// Fragment or the default tag
    pub fn tag(&self) -> String {
        tag_or_default(self.fragment.as_deref())
    }
}

// ============================================================================
// Field Helpers
// ============================================================================

/// Extracts the host from `host[:port]`, stripping IPv6 brackets.
pub fn split_host(host_port: &str) -> &str {
    if let Some(inner) = host_port.strip_prefix('[') {
        return match inner.rfind(']') {
            Some(end) => &inner[..end],
            None => inner,
        };
    }

    // More than one colon without brackets means a bare IPv6 literal
    match host_port.rfind(':') {
        Some(pos) if host_port[..pos].contains(':') => host_port,
        Some(pos) => &host_port[..pos],
        None => host_port,
    }
}

/// Extracts the port from `host:port` or `[host]:port`.
///
/// Returns `default` when the port is absent, malformed, or outside
/// `1..=65535`. Bracketed IPv6 is matched on the last `]:` before any plain
/// colon split so addresses with several colons are not misread.
pub fn port_or_default(host_port: &str, default: u16) -> u16 {
    let port = if host_port.starts_with('[') {
        host_port
            .rfind("]:")
            .map(|idx| &host_port[idx + 2..])
    } else {
        host_port
            .rsplit_once(':')
            .map(|(_, port)| port)
    };

    let Some(port) = port.filter(|p| !p.is_empty()) else {
        return default;
    };

    match port.parse::<u32>().ok().and_then(|p| u16::try_from(p).ok()) {
        Some(p) if p != 0 => p,
        _ => {
            warn!(port, default, "Port outside 1..=65535, using default");
            default
        }
    }
}

/// Whether `s` has the canonical 8-4-4-4-12 hex UUID shape, dashes optional
pub fn is_valid_uuid(s: &str) -> bool {
    UUID_RE.is_match(s)
}

/// Percent-decodes `s`, keeping it unchanged when the result is not UTF-8
pub fn percent_decode(s: &str) -> Cow<'_, str> {
    urlencoding::decode(s).unwrap_or(Cow::Borrowed(s))
}

/// Uses `name` as tag unless it is absent or empty
pub fn tag_or_default(name: Option<&str>) -> String {
    match name {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => DEFAULT_TAG.to_string(),
    }
}

/// Splits a comma separated list, dropping empty items
pub fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
