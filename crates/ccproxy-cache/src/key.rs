//! Tenant-scoped cache keys.
//!
//! A cache key is the hex-encoded HMAC-SHA256 of the entity identifier, keyed
//! with the tenant secret. Tenants sharing one store only ever see keys derived
//! from their own secret, and neither the identifier nor the secret can be
//! read back from a key.

use std::fmt;

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// A derived, opaque cache key (64 lowercase hex characters).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Derives the key for `identifier` as seen by the tenant holding `secret`.
    ///
    /// The identifier is taken as raw bytes and need not be UTF-8. An empty
    /// secret is a valid, distinct tenant.
    pub fn derive(identifier: impl AsRef<[u8]>, secret: impl AsRef<[u8]>) -> Self {
        let mut mac = HmacSha256::new_from_slice(secret.as_ref())
            .expect("HMAC accepts keys of any length");
        mac.update(identifier.as_ref());
        Self(hex::encode(mac.finalize().into_bytes()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
