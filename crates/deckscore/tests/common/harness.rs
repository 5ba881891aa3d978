//! Test harness for isolated job lifecycle tests.
//!
//! The `TestHarness` struct provides a complete isolated environment:
//! - A temporary upload directory that tests can inspect after a job
//! - An in-memory database, or a file database for reopen tests
//! - A `ScriptedClient` standing in for the completion endpoint

#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;
use tokio::sync::Semaphore;

use deckscore::analysis::{AnalysisError, Completion, CompletionRequest};
use deckscore::{CompletionClient, Config, Database, DeckService, Job, ProgressEvent, Subscription};

use super::builders::ROUND_TRIP_REPLY;

/// Completion client that answers from a script.
///
/// Replies are consumed in order; once the script runs out every call gets
/// the default reply. With a gate, each call waits for one permit first.
pub struct ScriptedClient {
    script: Mutex<VecDeque<Result<String, AnalysisError>>>,
    default_reply: String,
    calls: AtomicUsize,
    gate: Option<Arc<Semaphore>>,
}

impl ScriptedClient {
    pub fn replying(reply: &str) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            default_reply: reply.to_string(),
            calls: AtomicUsize::new(0),
            gate: None,
        }
    }

    /// Queues one reply ahead of the default.
    pub fn then(self, reply: Result<&str, AnalysisError>) -> Self {
        self.script
            .lock()
            .unwrap()
            .push_back(reply.map(str::to_string));
        self
    }

    /// Holds every call until a permit is added to `gate`.
    pub fn gated(mut self, gate: Arc<Semaphore>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CompletionClient for ScriptedClient {
    async fn complete(&self, _request: &CompletionRequest) -> Result<Completion, AnalysisError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.acquire().await.expect("gate closed").forget();
        }

        let next = self.script.lock().unwrap().pop_front();
        let content = match next {
            Some(reply) => reply?,
            None => self.default_reply.clone(),
        };
        Ok(Completion {
            content,
            finish_reason: Some("stop".to_string()),
        })
    }

    fn model(&self) -> &str {
        "scripted-model"
    }
}

/// Test harness providing an isolated service for integration tests.
pub struct TestHarness {
    /// Temporary directory holding uploads (and the database file, if any).
    temp_dir: TempDir,
    /// Where the service writes uploaded documents.
    pub upload_dir: PathBuf,
    pub config: Config,
    pub client: Arc<ScriptedClient>,
    pub service: DeckService,
}

impl TestHarness {
    /// Harness whose client always answers with the round-trip reply.
    pub fn new() -> Self {
        Self::with_client(ScriptedClient::replying(ROUND_TRIP_REPLY))
    }

    pub fn with_client(client: ScriptedClient) -> Self {
        Self::build(client, |_| {}, |_| Database::open_in_memory().expect("in-memory database"))
    }

    /// Harness with config tweaks applied before the service is built.
    pub fn with_config(client: ScriptedClient, configure: impl FnOnce(&mut Config)) -> Self {
        Self::build(client, configure, |_| {
            Database::open_in_memory().expect("in-memory database")
        })
    }

    /// Harness backed by `deckscore.db` inside the temp directory.
    pub fn with_file_database(client: ScriptedClient) -> Self {
        Self::build(client, |_| {}, |dir| {
            Database::open(&dir.join("deckscore.db")).expect("file database")
        })
    }

    fn build(
        client: ScriptedClient,
        configure: impl FnOnce(&mut Config),
        open_db: impl FnOnce(&Path) -> Database,
    ) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let upload_dir = temp_dir.path().join("uploads");

        let mut config = Config {
            upload_directory: upload_dir.to_string_lossy().to_string(),
            max_concurrent_jobs: 4,
            ..Config::default()
        };
        configure(&mut config);

        let client = Arc::new(client);
        let db = open_db(temp_dir.path());
        let service = DeckService::with_client(&config, db, client.clone());

        Self {
            temp_dir,
            upload_dir,
            config,
            client,
            service,
        }
    }

    pub fn temp_path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Opens a second database handle on the harness's database file.
    pub fn reopen_database(&self) -> Database {
        Database::open(&self.temp_dir.path().join("deckscore.db")).expect("reopen database")
    }

    /// Waits until every accepted job has reached a terminal state.
    pub async fn wait_for_jobs(&self) {
        tokio::time::timeout(Duration::from_secs(10), self.service.orchestrator().wait_idle())
            .await
            .expect("jobs did not finish in time");
    }

    pub fn job(&self, job_id: &str) -> Job {
        self.service
            .orchestrator()
            .store()
            .get(job_id)
            .expect("job exists")
    }

    /// Files currently left in the upload directory.
    pub fn uploaded_files(&self) -> Vec<PathBuf> {
        match std::fs::read_dir(&self.upload_dir) {
            Ok(entries) => entries.filter_map(|e| e.ok()).map(|e| e.path()).collect(),
            Err(_) => Vec::new(),
        }
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// Receives events until the subscription ends.
pub async fn collect_events(subscription: &mut Subscription) -> Vec<ProgressEvent> {
    let mut events = Vec::new();
    loop {
        match tokio::time::timeout(Duration::from_secs(10), subscription.recv()).await {
            Ok(Some(event)) => events.push(event),
            Ok(None) => return events,
            Err(_) => panic!("subscription did not end, got {:?}", events),
        }
    }
}
