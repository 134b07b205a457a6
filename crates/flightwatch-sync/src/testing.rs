//! Scripted collaborators for unit tests.

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;
use flightwatch_storage::{
    FileStore, HeaderProfile, HttpClient, HttpResponse, StatusCode, StorageError, TransportError,
};

#[derive(Debug, Clone)]
pub enum Reply {
    Status(u16, String),
    TransportFailure,
}

impl Reply {
    pub fn ok(body: impl Into<String>) -> Self {
        Reply::Status(200, body.into())
    }
}

#[derive(Default)]
struct Script {
    queued: VecDeque<Reply>,
    fallback: Option<Reply>,
}

/// HTTP fake answering per exact URL: queued replies first, then the fallback reply.
#[derive(Default)]
pub struct ScriptedHttp {
    scripts: Mutex<HashMap<String, Script>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedHttp {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue(&self, url: &str, replies: impl IntoIterator<Item = Reply>) -> &Self {
        let mut scripts = self.scripts.lock().unwrap();
        scripts
            .entry(url.to_string())
            .or_default()
            .queued
            .extend(replies);
        self
    }

    pub fn always(&self, url: &str, reply: Reply) -> &Self {
        let mut scripts = self.scripts.lock().unwrap();
        scripts.entry(url.to_string()).or_default().fallback = Some(reply);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, url: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|u| *u == url).count()
    }
}

#[async_trait]
impl HttpClient for ScriptedHttp {
    async fn get(&self, url: &str, _headers: &HeaderProfile) -> Result<HttpResponse, TransportError> {
        self.calls.lock().unwrap().push(url.to_string());
        let reply = {
            let mut scripts = self.scripts.lock().unwrap();
            scripts.get_mut(url).and_then(|script| {
                script
                    .queued
                    .pop_front()
                    .or_else(|| script.fallback.clone())
            })
        };
        match reply {
            Some(Reply::Status(status, body)) => Ok(HttpResponse {
                status: StatusCode::from_u16(status).unwrap(),
                final_url: url.to_string(),
                body: body.into_bytes(),
            }),
            Some(Reply::TransportFailure) => {
                Err(TransportError::Connection("connection reset by peer".into()))
            }
            None => Err(TransportError::Connection(format!("nothing scripted for {url}"))),
        }
    }
}

/// File store fake keyed by `(directory, file name)`.
#[derive(Default)]
pub struct MemoryFileStore {
    dirs: Mutex<HashSet<String>>,
    files: Mutex<HashMap<(String, String), Vec<u8>>>,
    writes: Mutex<usize>,
}

impl MemoryFileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn file(&self, key: &str, file_name: &str) -> Option<Vec<u8>> {
        self.files
            .lock()
            .unwrap()
            .get(&(key.to_string(), file_name.to_string()))
            .cloned()
    }

    pub fn has_dir(&self, key: &str) -> bool {
        self.dirs.lock().unwrap().contains(key)
    }

    pub fn write_count(&self) -> usize {
        *self.writes.lock().unwrap()
    }
}

#[async_trait]
impl FileStore for MemoryFileStore {
    async fn ensure_dir(&self, key: &str) -> Result<PathBuf, StorageError> {
        self.dirs.lock().unwrap().insert(key.to_string());
        Ok(PathBuf::from(key))
    }

    async fn write(&self, key: &str, file_name: &str, blob: &[u8]) -> Result<PathBuf, StorageError> {
        if !self.has_dir(key) {
            return Err(StorageError::Io {
                action: "writing",
                path: PathBuf::from(key).join(file_name),
                source: std::io::Error::from(std::io::ErrorKind::NotFound),
            });
        }
        *self.writes.lock().unwrap() += 1;
        self.files
            .lock()
            .unwrap()
            .insert((key.to_string(), file_name.to_string()), blob.to_vec());
        Ok(PathBuf::from(key).join(file_name))
    }
}

pub fn detail_body(registration: &str, departures: &[i64]) -> String {
    let legs: Vec<_> = departures
        .iter()
        .map(|dep| serde_json::json!({"time": {"real": {"departure": dep}}}))
        .collect();
    serde_json::json!({
        "identification": {"id": "fixture", "callsign": "TST1"},
        "aircraft": {"registration": registration, "model": {"code": "A320", "text": "Airbus A320"}},
        "flightHistory": {"aircraft": legs},
        "trail": [{"lat": 71.2, "lng": 24.1, "alt": 35000, "spd": 450, "ts": 1700000500, "hd": 90}]
    })
    .to_string()
}
