use std::sync::Arc;

use flightwatch_storage::{HeaderProfile, HttpClient, RetryPolicy, TransportError, Url};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::persist::{PersistError, PersistedFlight, PersistenceWriter};

#[derive(Debug, Error)]
pub enum DetailError {
    #[error("invalid detail url: {0}")]
    InvalidUrl(String),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("gave up on {flight_id} after {attempts} attempts, last status {last_status}")]
    RetriesExhausted {
        flight_id: String,
        attempts: usize,
        last_status: u16,
    },
    #[error("cancelled while fetching {flight_id}")]
    Cancelled { flight_id: String },
    #[error(transparent)]
    Persist(#[from] PersistError),
}

impl DetailError {
    /// The fetch itself gave up; nothing reached the stores.
    pub fn is_abandoned(&self) -> bool {
        matches!(
            self,
            DetailError::Transport(_) | DetailError::RetriesExhausted { .. }
        )
    }
}

/// Fetches one flight's detail record, retrying non-success statuses on a fixed policy, and
/// hands the first successful body to the [`PersistenceWriter`].
pub struct DetailFetcher {
    http: Arc<dyn HttpClient>,
    detail_url: String,
    headers: HeaderProfile,
    retry: RetryPolicy,
    writer: Arc<PersistenceWriter>,
}

impl DetailFetcher {
    pub fn new(
        http: Arc<dyn HttpClient>,
        detail_url: impl Into<String>,
        headers: HeaderProfile,
        retry: RetryPolicy,
        writer: Arc<PersistenceWriter>,
    ) -> Self {
        Self {
            http,
            detail_url: detail_url.into(),
            headers,
            retry,
            writer,
        }
    }

    pub fn request_url(&self, flight_id: &str) -> Result<Url, DetailError> {
        Url::parse_with_params(&self.detail_url, &[("flight", flight_id)])
            .map_err(|err| DetailError::InvalidUrl(format!("{}: {err}", self.detail_url)))
    }

    /// A transport error aborts at once; only non-success statuses are retried.
    pub async fn fetch_detail(
        &self,
        flight_id: &str,
        cancel: &CancellationToken,
    ) -> Result<PersistedFlight, DetailError> {
        let url = self.request_url(flight_id)?;
        let cancelled = || DetailError::Cancelled {
            flight_id: flight_id.to_string(),
        };
        let mut last_status = 0;

        for attempt in 0..self.retry.max_attempts {
            let resp = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(cancelled()),
                resp = self.http.get(url.as_str(), &self.headers) => resp?,
            };

            if resp.status.is_success() {
                debug!(flight_id, attempt = attempt + 1, bytes = resp.body.len(), "detail fetched");
                return Ok(self.writer.persist(flight_id, &resp.body).await?);
            }

            last_status = resp.status.as_u16();
            info!(flight_id, attempt = attempt + 1, status = last_status, "detail not ready, retrying");

            if attempt + 1 < self.retry.max_attempts {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(cancelled()),
                    _ = tokio::time::sleep(self.retry.delay_for_attempt(attempt)) => {}
                }
            }
        }

        Err(DetailError::RetriesExhausted {
            flight_id: flight_id.to_string(),
            attempts: self.retry.max_attempts,
            last_status,
        })
    }
}
