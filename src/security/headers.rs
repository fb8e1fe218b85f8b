//! Header allowlists for the EHBP handshake.
//!
//! # Responsibilities
//! - Name the headers that must cross the proxy untouched, per direction
//! - Copy allowlisted headers between header maps
//!
//! # Design Decisions
//! - Allowlists are static, named and versioned; membership is the only
//!   criterion for unconditional pass-through
//! - One copy operation serves both directions
//! - Values are copied byte-for-byte, never inspected

use axum::http::{HeaderMap, HeaderName};

/// A named, versioned set of header identifiers.
///
/// Entries are lowercase so they can be turned into [`HeaderName`]s without parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderAllowlist {
    name: &'static str,
    version: u16,
    headers: &'static [&'static str],
}

/// Headers that must travel client → upstream.
pub const EHBP_REQUEST_HEADERS: HeaderAllowlist = HeaderAllowlist {
    name: "ehbp-request",
    version: 1,
    headers: &["ehbp-encapsulated-key"],
};

/// Headers that must travel upstream → client.
pub const EHBP_RESPONSE_HEADERS: HeaderAllowlist = HeaderAllowlist {
    name: "ehbp-response",
    version: 1,
    headers: &["ehbp-response-nonce", "ehbp-fallback"],
};

impl HeaderAllowlist {
    /// Header names in this set.
    pub fn names(&self) -> impl Iterator<Item = HeaderName> + '_ {
        self.headers.iter().map(|h| HeaderName::from_static(h))
    }
}

impl std::fmt::Display for HeaderAllowlist {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.name, self.version)
    }
}

/// Copy every allowlisted header that is present and non-empty in `src`.
///
/// Existing values in `dst` are replaced.
pub fn copy_if_present(dst: &mut HeaderMap, src: &HeaderMap, allowlist: &HeaderAllowlist) {
    for name in allowlist.names() {
        if let Some(value) = src.get(&name).filter(|v| !v.is_empty()) {
            dst.insert(name, value.clone());
        }
    }
}
