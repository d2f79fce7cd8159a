use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Strongly typed request identifier backed by ULID.
///
/// One id is minted per inbound request (or adopted from the `x-request-id`
/// header when the caller supplies a valid one) and keys every telemetry span
/// recorded while that request is in flight. ULIDs are unique per in-flight
/// request, which is what keeps concurrent requests from colliding in the
/// telemetry store.
#[derive(Clone, Copy, Eq, PartialEq, Hash, Debug)]
pub struct RequestId(pub ulid::Ulid);

impl RequestId {
    pub fn new() -> Self {
        Self(ulid::Ulid::new())
    }

    /// Attempt to parse from a header string; if invalid, generate a new one.
    pub fn from_header_or_new(header_value: Option<&str>) -> Self {
        header_value
            .and_then(|s| s.parse::<RequestId>().ok())
            .unwrap_or_default()
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for RequestId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RequestId {
    type Err = ulid::DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let id = ulid::Ulid::from_string(s)?;
        Ok(RequestId(id))
    }
}

impl Serialize for RequestId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for RequestId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse::<RequestId>()
            .map_err(|_| serde::de::Error::custom("invalid request id"))
    }
}

/// Per-response nonce for Content-Security-Policy injection.
///
/// 128 bits of ULID material, base64url-encoded without padding so it can be
/// embedded directly in a `'nonce-…'` CSP source expression. A fresh nonce is
/// generated for every response and never reused.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct ResponseNonce(String);

impl ResponseNonce {
    pub fn new() -> Self {
        Self(URL_SAFE_NO_PAD.encode(ulid::Ulid::new().to_bytes()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ResponseNonce {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for ResponseNonce {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Canonical route identity: `method::path`, lower-cased.
///
/// This string keys interceptor and after-render registrations and feeds the
/// route content hash used for telemetry correlation.
#[must_use]
pub fn route_key(method: &http::Method, path: &str) -> String {
    format!("{}::{}", method.as_str(), path).to_lowercase()
}

/// Fast content hash of a route identity for correlation keys.
///
/// First eight bytes of `sha256(route_key)`, hex-encoded. Collisions across a
/// realistic route table are not a concern at 64 bits; the hash is a
/// correlation key, not a security boundary.
#[must_use]
pub fn route_hash(key: &str) -> String {
    let digest = Sha256::digest(key.as_bytes());
    let mut out = String::with_capacity(16);
    for byte in &digest[..8] {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}
