//! Provider credential handling.
//!
//! The bearer key is held in zeroizing storage and never rendered through
//! `Debug`. Operators identify the active key by a truncated SHA-256
//! fingerprint logged at startup.

use std::fmt;

use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

/// Length of the fingerprint in bytes before hex encoding.
const FINGERPRINT_BYTES: usize = 8;

/// Bearer credential for the image edit provider.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(Zeroizing<String>);

impl ApiKey {
    /// Wrap a raw key, returning `None` when it is blank once trimmed.
    ///
    /// # Examples
    /// ```
    /// use backend::outbound::openai::ApiKey;
    ///
    /// assert!(ApiKey::new("  ").is_none());
    /// assert_eq!(ApiKey::new(" sk-test ").map(|key| key.expose().to_owned()), Some("sk-test".to_owned()));
    /// ```
    pub fn new(raw: impl AsRef<str>) -> Option<Self> {
        let trimmed = raw.as_ref().trim();
        (!trimmed.is_empty()).then(|| Self(Zeroizing::new(trimmed.to_owned())))
    }

    /// Raw key material for the `Authorization` header.
    pub fn expose(&self) -> &str {
        self.0.as_str()
    }

    /// Truncated SHA-256 fingerprint as 16 lowercase hex characters.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.0.as_bytes());
        let digest = hasher.finalize();
        hex::encode(&digest[..FINGERPRINT_BYTES])
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ApiKey").field(&"[redacted]").finish()
    }
}
