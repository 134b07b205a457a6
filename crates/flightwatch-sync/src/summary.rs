use std::sync::Arc;

use flightwatch_core::{Bound, FeedEnvelope, FlightSummarySet};
use flightwatch_storage::{HeaderProfile, HttpClient, TransportError, Url};
use serde_json::{Map, Value as JsonValue};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum SummaryError {
    #[error("invalid feed url: {0}")]
    InvalidUrl(String),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("http status {status} for {url}")]
    Status { status: u16, url: String },
    #[error("decoding feed response: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Polls the feed endpoint for one bound. Single attempt; the next cycle is the retry.
pub struct SummaryFetcher {
    http: Arc<dyn HttpClient>,
    feed_url: String,
    headers: HeaderProfile,
}

impl SummaryFetcher {
    pub fn new(http: Arc<dyn HttpClient>, feed_url: impl Into<String>, headers: HeaderProfile) -> Self {
        Self {
            http,
            feed_url: feed_url.into(),
            headers,
        }
    }

    pub fn request_url(&self, bound: &Bound) -> Result<Url, SummaryError> {
        Url::parse_with_params(&self.feed_url, &[("bounds", bound.query_value())])
            .map_err(|err| SummaryError::InvalidUrl(format!("{}: {err}", self.feed_url)))
    }

    pub async fn fetch(&self, bound: &Bound) -> Result<FlightSummarySet, SummaryError> {
        let url = self.request_url(bound)?;
        let resp = self.http.get(url.as_str(), &self.headers).await?;
        if !resp.status.is_success() {
            return Err(SummaryError::Status {
                status: resp.status.as_u16(),
                url: resp.final_url,
            });
        }

        let (envelope, flights) = decode_feed(&resp.body)?;
        debug!(
            %bound,
            full_count = envelope.full_count,
            version = envelope.version,
            flights = flights.len(),
            "feed polled"
        );
        Ok(flights)
    }
}

/// The feed mixes metadata and flight entries in one object, so it is decoded twice: once for
/// the envelope and once as a plain map that is then stripped of the metadata keys.
pub fn decode_feed(body: &[u8]) -> Result<(FeedEnvelope, FlightSummarySet), serde_json::Error> {
    let envelope: FeedEnvelope = serde_json::from_slice(body)?;
    let map: Map<String, JsonValue> = serde_json::from_slice(body)?;
    Ok((envelope, FlightSummarySet::from_feed_map(map)))
}
