//! On-disk value layout.
//!
//! ```text
//! [expiry: i64 big-endian unix millis, 0 = never][value bytes...]
//! ```

use chrono::Utc;
use runlock_core::StoreError;

const HEADER_LEN: usize = 8;
const NO_EXPIRY: i64 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Envelope<'a> {
    expires_at_ms: i64,
    pub(crate) value: &'a [u8],
}

impl<'a> Envelope<'a> {
    pub(crate) fn decode(key: &str, raw: &'a [u8]) -> Result<Self, StoreError> {
        let (header, value) = raw.split_first_chunk::<HEADER_LEN>().ok_or_else(|| {
            StoreError::Corrupt {
                key: key.to_string(),
                reason: format!("value shorter than {HEADER_LEN}-byte expiry header"),
            }
        })?;
        Ok(Self {
            expires_at_ms: i64::from_be_bytes(*header),
            value,
        })
    }

    pub(crate) fn is_live(&self, now_ms: i64) -> bool {
        self.expires_at_ms == NO_EXPIRY || now_ms < self.expires_at_ms
    }
}

/// Wrap `value` with an expiry `ttl` from now.
pub(crate) fn encode(value: &[u8], ttl: Option<std::time::Duration>) -> Vec<u8> {
    let expires_at_ms = ttl.map_or(NO_EXPIRY, |ttl| {
        let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
        now_ms().saturating_add(ttl_ms.max(1))
    });
    let mut raw = Vec::with_capacity(HEADER_LEN + value.len());
    raw.extend_from_slice(&expires_at_ms.to_be_bytes());
    raw.extend_from_slice(value);
    raw
}

pub(crate) fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn value_without_ttl_never_expires() -> Result<(), StoreError> {
        let raw = encode(b"lock", None);
        let envelope = Envelope::decode("k", &raw)?;
        assert_eq!(envelope.value, b"lock");
        assert!(envelope.is_live(i64::MAX));
        Ok(())
    }

    #[test]
    fn value_with_ttl_expires_after_deadline() -> Result<(), StoreError> {
        let raw = encode(b"lock", Some(Duration::from_secs(60)));
        let envelope = Envelope::decode("k", &raw)?;
        assert!(envelope.is_live(now_ms()));
        assert!(!envelope.is_live(now_ms() + 61_000));
        Ok(())
    }

    #[test]
    fn short_value_is_corrupt() {
        let err = Envelope::decode("pr/x", b"abc");
        assert!(matches!(err, Err(StoreError::Corrupt { key, .. }) if key == "pr/x"));
    }
}
