use base64::{Engine, engine::general_purpose};

use crate::error::CacheError;

/// Separates key from version inside the decoded payload. Inputs containing
/// it are rejected outright so two distinct pairs can never encode to the
/// same identifier.
const DELIMITER: char = '|';

/// The (key, version) identity of a cache entry. Both fields are opaque,
/// caller-supplied and non-empty; identity is the pair, not either field
/// alone.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CacheKey {
    pub key: String,
    pub version: String,
}

impl CacheKey {
    pub fn new(
        key: impl Into<String>,
        version: impl Into<String>,
    ) -> Result<CacheKey, CacheError> {
        let key = key.into();
        let version = version.into();
        if key.is_empty() || version.is_empty() {
            return Err(CacheError::MalformedIdentifier(
                "key and version must be non-empty".to_string(),
            ));
        }
        if key.contains(DELIMITER) || version.contains(DELIMITER) {
            return Err(CacheError::MalformedIdentifier(format!(
                "key and version must not contain `{DELIMITER}`"
            )));
        }
        Ok(CacheKey { key, version })
    }

    /// Encodes the pair into an identifier safe for use as a file name and
    /// as a URL path segment.
    pub fn encode(&self) -> String {
        let payload = format!("{}{DELIMITER}{}", self.key, self.version);
        general_purpose::URL_SAFE_NO_PAD.encode(payload)
    }

    /// Inverts [`CacheKey::encode`]. Round-trips for every pair `new`
    /// accepts; anything else fails without panicking.
    pub fn decode(id: &str) -> Result<CacheKey, CacheError> {
        let raw = general_purpose::URL_SAFE_NO_PAD
            .decode(id)
            .map_err(|e| CacheError::MalformedIdentifier(e.to_string()))?;
        let payload = String::from_utf8(raw).map_err(|_| {
            CacheError::MalformedIdentifier("payload is not valid UTF-8".to_string())
        })?;
        let (key, version) = payload.split_once(DELIMITER).ok_or_else(|| {
            CacheError::MalformedIdentifier("payload has no delimiter".to_string())
        })?;
        CacheKey::new(key, version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let pairs = [
            ("readme-hash", "v1"),
            ("Linux-cargo-7d1e9", "5c3f2a"),
            ("key with spaces", "版本"),
        ];
        for (key, version) in pairs {
            let cache_key = CacheKey::new(key, version).unwrap();
            let id = cache_key.encode();
            assert!(!id.contains('/'));
            assert_eq!(CacheKey::decode(&id).unwrap(), cache_key);
        }
    }

    #[test]
    fn rejects_delimiter_in_fields() {
        assert!(matches!(
            CacheKey::new("a|b", "v1"),
            Err(CacheError::MalformedIdentifier(_))
        ));
        assert!(matches!(
            CacheKey::new("a", "v|1"),
            Err(CacheError::MalformedIdentifier(_))
        ));
    }

    #[test]
    fn rejects_empty_fields() {
        assert!(CacheKey::new("", "v1").is_err());
        assert!(CacheKey::new("a", "").is_err());
    }

    #[test]
    fn decode_rejects_garbage() {
        // Not base64url at all.
        assert!(CacheKey::decode("not/base64!").is_err());
        // Valid base64url but no delimiter inside.
        let id = general_purpose::URL_SAFE_NO_PAD.encode("nodelimiter");
        assert!(matches!(
            CacheKey::decode(&id),
            Err(CacheError::MalformedIdentifier(_))
        ));
        // Valid base64url but not UTF-8.
        let id = general_purpose::URL_SAFE_NO_PAD.encode([0xff, 0xfe, 0x7c]);
        assert!(CacheKey::decode(&id).is_err());
        // Delimiter present but one side empty.
        let id = general_purpose::URL_SAFE_NO_PAD.encode("key|");
        assert!(CacheKey::decode(&id).is_err());
    }
}
