//! Server-held credential injected into upstream requests.

use axum::http::header::{InvalidHeaderValue, AUTHORIZATION};
use axum::http::{HeaderMap, HeaderValue};

/// The proxy's own API credential, pre-rendered as a bearer authorization value.
///
/// Never printed: `Debug` is redacted and the header value is marked sensitive.
#[derive(Clone)]
pub struct Credential {
    authorization: HeaderValue,
}

impl Credential {
    pub fn new(secret: &str) -> Result<Self, InvalidHeaderValue> {
        let mut authorization = HeaderValue::from_str(&format!("Bearer {}", secret))?;
        authorization.set_sensitive(true);
        Ok(Self { authorization })
    }

    /// The rendered `Authorization` value.
    pub fn authorization(&self) -> &HeaderValue {
        &self.authorization
    }

    /// Set the authorization header, replacing whatever the client sent.
    pub fn inject(&self, headers: &mut HeaderMap) {
        headers.insert(AUTHORIZATION, self.authorization.clone());
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}
