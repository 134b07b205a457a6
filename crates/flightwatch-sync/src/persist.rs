use std::path::PathBuf;
use std::sync::Arc;

use flightwatch_core::FlightDetail;
use flightwatch_storage::{CacheStore, FileStore, StorageError};
use thiserror::Error;
use tracing::{debug, warn};

pub fn cache_key(flight_id: &str) -> String {
    format!("Flight:{flight_id}")
}

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("decoding detail for {flight_id}: {source}")]
    Decode {
        flight_id: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("flight {flight_id} has no flight history, record cannot be named")]
    MissingHistory { flight_id: String },
    #[error("flight {flight_id} has unusable registration {registration:?}")]
    InvalidRegistration {
        flight_id: String,
        registration: String,
    },
    #[error("encoding detail for {flight_id}: {source}")]
    Encode {
        flight_id: String,
        #[source]
        source: serde_json::Error,
    },
    #[error(transparent)]
    Storage(#[from] StorageError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct PersistedFlight {
    pub flight_id: String,
    pub registration: String,
    pub departure: i64,
    pub path: PathBuf,
    pub cached: bool,
}

/// Writes a fetched detail body to the cache verbatim and, when it can be named, to
/// `<registration>/<first departure>.json` in the file store. A record without a registration
/// lands at the store root.
pub struct PersistenceWriter {
    cache: Arc<dyn CacheStore>,
    files: Arc<dyn FileStore>,
}

impl PersistenceWriter {
    pub fn new(cache: Arc<dyn CacheStore>, files: Arc<dyn FileStore>) -> Self {
        Self { cache, files }
    }

    /// The cache write happens before decoding, so malformed or unnameable records still
    /// leave their raw body behind.
    pub async fn persist(&self, flight_id: &str, raw: &[u8]) -> Result<PersistedFlight, PersistError> {
        let cached = match self.cache.set(&cache_key(flight_id), raw).await {
            Ok(()) => true,
            Err(err) => {
                warn!(flight_id, error = %err, "caching raw detail failed");
                false
            }
        };

        let detail: FlightDetail =
            serde_json::from_slice(raw).map_err(|source| PersistError::Decode {
                flight_id: flight_id.to_string(),
                source,
            })?;

        let mut persisted = self.store_detail(flight_id, &detail).await?;
        persisted.cached = cached;
        Ok(persisted)
    }

    pub async fn store_detail(
        &self,
        flight_id: &str,
        detail: &FlightDetail,
    ) -> Result<PersistedFlight, PersistError> {
        let departure = detail
            .first_departure()
            .ok_or_else(|| PersistError::MissingHistory {
                flight_id: flight_id.to_string(),
            })?;
        let registration = detail.registration();
        if !is_registration_dir(registration) {
            return Err(PersistError::InvalidRegistration {
                flight_id: flight_id.to_string(),
                registration: registration.to_string(),
            });
        }

        self.files.ensure_dir(registration).await?;
        let body = serde_json::to_vec(detail).map_err(|source| PersistError::Encode {
            flight_id: flight_id.to_string(),
            source,
        })?;
        let path = self
            .files
            .write(registration, &format!("{departure}.json"), &body)
            .await?;
        debug!(flight_id, registration, path = %path.display(), "detail stored");

        Ok(PersistedFlight {
            flight_id: flight_id.to_string(),
            registration: registration.to_string(),
            departure,
            path,
            cached: false,
        })
    }
}

/// Empty maps to the store root; anything else must be a single plain path component.
fn is_registration_dir(name: &str) -> bool {
    name != "." && name != ".." && !name.contains(['/', '\\', '\0'])
}
