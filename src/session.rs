//! Session context: the API credential plus the per-session result cache.
//!
//! A [`Session`] is created when the user first supplies a credential and is
//! shared as `Arc<Session>` with the orchestrator and the model adapter.
//! Rotating the credential produces a brand-new session with an empty cache;
//! nothing is persisted beyond the session's lifetime.

use crate::error::ExtractError;
use crate::record::CourseFields;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;
use tracing::{debug, info};

/// An opaque API secret. `Debug` and `Display` never print it.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Wrap a secret. Blank input is [`ExtractError::CredentialMissing`].
    pub fn new(secret: impl Into<String>) -> Result<Self, ExtractError> {
        let secret = secret.into().trim().to_string();
        if secret.is_empty() {
            return Err(ExtractError::CredentialMissing);
        }
        Ok(Self(secret))
    }

    /// The raw secret, for the adapter's request header only.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

/// SHA-256 of an image's raw bytes, hex-encoded.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContentDigest(String);

impl ContentDigest {
    pub fn of(bytes: &[u8]) -> Self {
        Self(format!("{:x}", Sha256::digest(bytes)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Short form is enough to correlate log lines.
        f.write_str(&self.0[..12.min(self.0.len())])
    }
}

/// Content-addressed map of image digest → extracted fields.
///
/// No eviction: a session processes at most a few hundred images.
#[derive(Debug, Default)]
pub struct ResultCache {
    entries: Mutex<HashMap<ContentDigest, CourseFields>>,
}

impl ResultCache {
    pub fn get(&self, digest: &ContentDigest) -> Option<CourseFields> {
        self.entries
            .lock()
            .ok()
            .and_then(|map| map.get(digest).cloned())
    }

    pub fn insert(&self, digest: ContentDigest, fields: CourseFields) {
        if let Ok(mut map) = self.entries.lock() {
            debug!("Caching result for image {}", digest);
            map.insert(digest, fields);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        if let Ok(mut map) = self.entries.lock() {
            map.clear();
        }
    }
}

/// Everything that lives exactly as long as one credential.
#[derive(Debug)]
pub struct Session {
    credential: Credential,
    cache: ResultCache,
}

impl Session {
    /// Open a session. Fails with [`ExtractError::CredentialMissing`] for a
    /// blank secret.
    pub fn new(secret: impl Into<String>) -> Result<Self, ExtractError> {
        let credential = Credential::new(secret)?;
        info!("Session opened");
        Ok(Self::with_credential(credential))
    }

    pub fn with_credential(credential: Credential) -> Self {
        Self {
            credential,
            cache: ResultCache::default(),
        }
    }

    /// Open a session from an optional secret, as read from a CLI flag or an
    /// environment variable.
    pub fn from_optional(secret: Option<String>) -> Result<Self, ExtractError> {
        match secret {
            Some(s) => Self::new(s),
            None => Err(ExtractError::CredentialMissing),
        }
    }

    /// Replace the credential. The returned session starts with an empty
    /// cache; callers swap their `Arc<Session>` for it.
    pub fn rotate(&self, secret: impl Into<String>) -> Result<Session, ExtractError> {
        let next = Session::new(secret)?;
        info!("Credential rotated; cached results dropped");
        Ok(next)
    }

    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    pub fn cache(&self) -> &ResultCache {
        &self.cache
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Field;

    #[test]
    fn blank_credential_is_missing() {
        assert!(matches!(
            Session::new("   "),
            Err(ExtractError::CredentialMissing)
        ));
        assert!(matches!(
            Session::from_optional(None),
            Err(ExtractError::CredentialMissing)
        ));
    }

    #[test]
    fn credential_is_trimmed_and_redacted() {
        let c = Credential::new("  key-123\n").unwrap();
        assert_eq!(c.expose(), "key-123");
        assert!(!format!("{c:?}").contains("key-123"));
        let s = Session::new("key-123").unwrap();
        assert!(!format!("{s:?}").contains("key-123"));
    }

    #[test]
    fn digest_is_stable_hex() {
        let a = ContentDigest::of(b"abc");
        assert_eq!(
            a.as_str(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(a, ContentDigest::of(b"abc"));
        assert_ne!(a, ContentDigest::of(b"abd"));
        assert_eq!(a.to_string().len(), 12);
    }

    #[test]
    fn cache_round_trip() {
        let cache = ResultCache::default();
        let key = ContentDigest::of(b"image");
        assert!(cache.get(&key).is_none());

        let mut fields = CourseFields::empty();
        fields.set(Field::CourseName, Some("Rust".into()));
        cache.insert(key.clone(), fields.clone());

        assert_eq!(cache.get(&key), Some(fields));
        assert_eq!(cache.len(), 1);
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn rotate_drops_cache() {
        let s = Session::new("old").unwrap();
        s.cache()
            .insert(ContentDigest::of(b"x"), CourseFields::empty());
        let next = s.rotate("new").unwrap();
        assert_eq!(next.credential().expose(), "new");
        assert!(next.cache().is_empty());
        assert!(matches!(s.rotate(""), Err(ExtractError::CredentialMissing)));
    }
}
