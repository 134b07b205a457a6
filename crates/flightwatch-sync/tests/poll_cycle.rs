use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use flightwatch_core::{Bound, FlightDetail};
use flightwatch_storage::{
    FsFileStore, HeaderProfile, HttpClient, HttpResponse, MemoryCacheStore, RetryPolicy,
    StatusCode, TransportError,
};
use flightwatch_sync::{
    AbandonPolicy, CycleOrchestrator, DetailFetcher, PersistenceWriter, RegionWorker,
    SummaryFetcher,
};
use tokio_util::sync::CancellationToken;

const FEED: &str = "https://feed.test/zones/fcgi/feed.js";
const DETAIL: &str = "https://detail.test/clickhandler/";

/// Serves fixed bodies per URL and counts requests.
#[derive(Default)]
struct FixedHttp {
    bodies: HashMap<String, (u16, String)>,
    hits: Mutex<HashMap<String, usize>>,
}

impl FixedHttp {
    fn serve(mut self, url: &str, status: u16, body: &str) -> Self {
        self.bodies.insert(url.to_string(), (status, body.to_string()));
        self
    }

    fn hits(&self, url: &str) -> usize {
        self.hits.lock().unwrap().get(url).copied().unwrap_or(0)
    }
}

#[async_trait]
impl HttpClient for FixedHttp {
    async fn get(&self, url: &str, _headers: &HeaderProfile) -> Result<HttpResponse, TransportError> {
        *self.hits.lock().unwrap().entry(url.to_string()).or_default() += 1;
        let (status, body) = self
            .bodies
            .get(url)
            .cloned()
            .ok_or_else(|| TransportError::Connection(format!("no route to {url}")))?;
        Ok(HttpResponse {
            status: StatusCode::from_u16(status).unwrap(),
            final_url: url.to_string(),
            body: body.into_bytes(),
        })
    }
}

fn detail_json(registration: &str, departure: i64) -> String {
    serde_json::json!({
        "identification": {"id": "AAB111", "callsign": "TAP123"},
        "aircraft": {"registration": registration},
        "flightHistory": {"aircraft": [{"time": {"real": {"departure": departure}}}]},
    })
    .to_string()
}

struct Poller {
    http: Arc<FixedHttp>,
    cache: Arc<MemoryCacheStore>,
    orchestrator: CycleOrchestrator,
}

fn poller(http: FixedHttp, data_dir: &std::path::Path, bounds: Vec<Bound>) -> Poller {
    let http = Arc::new(http);
    let cache = Arc::new(MemoryCacheStore::new());
    let writer = Arc::new(PersistenceWriter::new(
        cache.clone(),
        Arc::new(FsFileStore::new(data_dir)),
    ));
    let summary = Arc::new(SummaryFetcher::new(
        http.clone(),
        FEED,
        HeaderProfile::browser("flightwatch-test"),
    ));
    let details = Arc::new(DetailFetcher::new(
        http.clone(),
        DETAIL,
        HeaderProfile::browser("flightwatch-test"),
        RetryPolicy::fixed(3, Duration::ZERO),
        writer,
    ));
    let worker = Arc::new(RegionWorker::new(summary, details, AbandonPolicy::Record));
    Poller {
        http,
        cache,
        orchestrator: CycleOrchestrator::new(bounds, worker),
    }
}

#[tokio::test]
async fn new_flight_is_cached_and_written_once() {
    let tmp = tempfile::tempdir().unwrap();
    let data_dir = tmp.path().join("Data");
    let feed_url = format!("{FEED}?bounds=74.00%2C70.00%2C20.00%2C28.00");
    let detail_url = format!("{DETAIL}?flight=AAB111");
    let body = detail_json("PR-XYZ", 1700000000);

    let http = FixedHttp::default()
        .serve(&feed_url, 200, r#"{"full_count":1,"version":4,"AAB111":["4CA1FA",72.1,24.3]}"#)
        .serve(&detail_url, 200, &body);
    let mut poller = poller(http, &data_dir, vec![Bound::new(20.0, 74.0, 28.0, 70.0)]);
    let cancel = CancellationToken::new();

    let first = poller.orchestrator.run_cycle(&cancel).await;
    assert_eq!(first.new_flights, 1);
    assert_eq!(first.persisted, 1);
    assert_eq!(first.failed_regions, 0);

    assert_eq!(
        poller.cache.get("Flight:AAB111").await,
        Some(body.clone().into_bytes())
    );
    let written = std::fs::read(data_dir.join("PR-XYZ").join("1700000000.json")).unwrap();
    let detail: FlightDetail = serde_json::from_slice(&written).unwrap();
    assert_eq!(detail.registration(), "PR-XYZ");
    assert_eq!(detail.first_departure(), Some(1700000000));

    let second = poller.orchestrator.run_cycle(&cancel).await;
    assert_eq!(second.new_flights, 0);
    assert_eq!(second.observed, 1);
    assert_eq!(poller.http.hits(&detail_url), 1);
    assert_eq!(poller.http.hits(&feed_url), 2);
}

#[tokio::test]
async fn exhausted_detail_leaves_no_trace_in_stores() {
    let tmp = tempfile::tempdir().unwrap();
    let data_dir = tmp.path().join("Data");
    let feed_url = format!("{FEED}?bounds=74.00%2C70.00%2C20.00%2C28.00");
    let detail_url = format!("{DETAIL}?flight=AAB111");

    let http = FixedHttp::default()
        .serve(&feed_url, 200, r#"{"AAB111":[]}"#)
        .serve(&detail_url, 503, "");
    let mut poller = poller(http, &data_dir, vec![Bound::new(20.0, 74.0, 28.0, 70.0)]);

    let summary = poller.orchestrator.run_cycle(&CancellationToken::new()).await;
    assert_eq!(summary.abandoned, 1);
    assert_eq!(poller.http.hits(&detail_url), 3);
    assert!(poller.cache.is_empty().await);
    assert!(!data_dir.join("PR-XYZ").exists());
    assert!(poller.orchestrator.tracker().current().contains("AAB111"));
}

#[tokio::test]
async fn run_exits_after_cancellation() {
    let tmp = tempfile::tempdir().unwrap();
    let feed_url = format!("{FEED}?bounds=74.00%2C70.00%2C20.00%2C28.00");
    let http = FixedHttp::default().serve(&feed_url, 200, r#"{"version":4}"#);
    let mut poller = poller(
        http,
        &tmp.path().join("Data"),
        vec![Bound::new(20.0, 74.0, 28.0, 70.0)],
    );

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let completed = poller.orchestrator.run(cancel).await;
    assert!(completed >= 1);
    assert!(poller.http.hits(&feed_url) as u64 >= completed);
}
