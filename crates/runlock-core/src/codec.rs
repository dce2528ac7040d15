//! JSON encoding of stored records.

use serde::{de::DeserializeOwned, Serialize};

use crate::error::{Error, Result};

pub(crate) fn encode<T: Serialize>(record: &'static str, value: &T) -> Result<Vec<u8>> {
    serde_json::to_vec(value).map_err(|source| Error::Serialize { record, source })
}

pub(crate) fn decode<T: DeserializeOwned>(record: &'static str, key: &str, bytes: &[u8]) -> Result<T> {
    serde_json::from_slice(bytes).map_err(|source| {
        tracing::warn!(key, record, error = %source, "stored value does not parse");
        Error::Deserialize {
            record,
            key: key.to_string(),
            source,
        }
    })
}
