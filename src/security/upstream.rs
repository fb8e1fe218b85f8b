//! Upstream host policy.
//!
//! The upstream address arrives in a client-controlled header and the request
//! built from it carries the server credential. The policy decides which
//! targets that credential may be sent to.
//!
//! - `Open`: any target is accepted and concatenated verbatim. The deployment
//!   trusts its clients to name legitimate upstreams.
//! - `Allowlist`: the target must be an absolute URL whose host matches an
//!   entry, either exactly or through a leading `*.` wildcard.

use url::Url;

/// Which upstream hosts may receive forwarded requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpstreamPolicy {
    Open,
    Allowlist(Vec<String>),
}

impl UpstreamPolicy {
    pub fn from_hosts(hosts: &[String]) -> Self {
        if hosts.is_empty() {
            Self::Open
        } else {
            Self::Allowlist(hosts.iter().map(|h| h.trim().to_ascii_lowercase()).collect())
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open)
    }

    /// Check a fully concatenated target.
    pub fn permits(&self, target: &str) -> bool {
        let allowed = match self {
            Self::Open => return true,
            Self::Allowlist(allowed) => allowed,
        };

        let host = match Url::parse(target) {
            Ok(url) => match url.host_str() {
                Some(host) => host.to_ascii_lowercase(),
                None => return false,
            },
            Err(_) => return false,
        };

        allowed.iter().any(|entry| match entry.strip_prefix("*.") {
            Some(suffix) => host
                .strip_suffix(suffix)
                .is_some_and(|prefix| prefix.ends_with('.') && prefix.len() > 1),
            None => *entry == host,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(hosts: &[&str]) -> UpstreamPolicy {
        UpstreamPolicy::from_hosts(&hosts.iter().map(|h| h.to_string()).collect::<Vec<_>>())
    }

    #[test]
    fn open_policy_accepts_anything() {
        let open = policy(&[]);
        assert!(open.is_open());
        assert!(open.permits("not even a url/v1/chat/completions"));
    }

    #[test]
    fn exact_host_match() {
        let p = policy(&["Node.Test"]);
        assert!(p.permits("https://node.test/v1/chat/completions"));
        assert!(p.permits("http://node.test:8443/v1"));
        assert!(!p.permits("https://evil.test/v1"));
        assert!(!p.permits("https://node.test.evil.test/v1"));
    }

    #[test]
    fn wildcard_matches_subdomains_only() {
        let p = policy(&["*.tinfoil.sh"]);
        assert!(p.permits("https://inference.tinfoil.sh/v1"));
        assert!(p.permits("https://a.b.tinfoil.sh/v1"));
        assert!(!p.permits("https://tinfoil.sh/v1"));
        assert!(!p.permits("https://eviltinfoil.sh/v1"));
    }

    #[test]
    fn unparseable_target_is_refused() {
        let p = policy(&["node.test"]);
        assert!(!p.permits("node.test/v1/chat/completions"));
        assert!(!p.permits(""));
    }
}
