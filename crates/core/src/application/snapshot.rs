// Snapshot codec - collections <-> opaque blobs

use crate::error::Result;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;

/// Blob key of the registration collection
pub const REGISTRATIONS_KEY: &str = "registrations";

/// Blob key of the driver collection
pub const DRIVERS_KEY: &str = "drivers";

/// Encode a collection as a self-describing JSON array
pub fn encode<T: Serialize>(items: &[T]) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(items)?)
}

/// Decode a collection, treating a missing or corrupt blob as empty
pub fn decode_or_empty<T: DeserializeOwned>(key: &str, data: Option<&[u8]>) -> Vec<T> {
    let Some(bytes) = data else {
        return Vec::new();
    };

    match serde_json::from_slice(bytes) {
        Ok(items) => items,
        Err(e) => {
            warn!(
                key = key,
                size = bytes.len(),
                error = %e,
                "Corrupt snapshot discarded, starting with an empty collection"
            );
            Vec::new()
        }
    }
}
