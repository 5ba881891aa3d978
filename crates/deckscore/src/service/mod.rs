//! Application facade used by the HTTP server.
//!
//! [`DeckService`] wires storage, the analysis pipeline and the job
//! orchestrator together and exposes the operations callers need.

pub mod compare;
pub mod error;
pub mod views;

use std::sync::Arc;

use chrono::Utc;

use crate::analysis::{
    AnalysisEngine, AnalysisResult, ChatCompletionClient, CompletionClient, EngineSettings,
};
use crate::broadcast::{ProgressNotifier, Subscription};
use crate::config::Config;
use crate::db::analysis_repo::{self, AnalysisFilter};
use crate::db::{deck_repo, stats_repo, Database};
use crate::error::ConfigError;
use crate::jobs::{Job, JobStatus, JobStore};
use crate::pipeline::{Pipeline, PipelineConfig};
use crate::reader::ReaderRegistry;
use crate::report::{self, ReportHeader};
use crate::secrets;
use crate::storage::UploadStore;
use crate::worker::{JobOrchestrator, Submission, SubmitReceipt};

pub use compare::{compare_results, DeckComparison, ScoreDifferences};
pub use error::ServiceError;
pub use views::{DashboardMetrics, DeckDetail, DeckSummary, JobStatusView, ReportExport};

const DEFAULT_PAGE_SIZE: u64 = 100;

#[derive(Clone)]
pub struct DeckService {
    orchestrator: JobOrchestrator,
    store: JobStore,
}

impl DeckService {
    /// Opens the configured database and builds the HTTP completion client.
    pub fn from_config(config: &Config) -> crate::Result<Self> {
        let db_path = config.resolved_database_path().ok_or_else(|| ConfigError::Validation {
            message: "Could not determine a database location; set database_path".to_string(),
        })?;
        let db = Database::open(&db_path)?;

        let api_key = secrets::resolve_api_key(&config.ai)?;
        if api_key.is_none() {
            log::warn!(
                "No API key configured for {}, sending unauthenticated requests",
                config.ai.base_url
            );
        }
        let client = ChatCompletionClient::new(&config.ai, api_key)?;
        log::info!("Using model {} at {}", config.ai.model, client.endpoint());

        Ok(Self::with_client(config, db, Arc::new(client)))
    }

    /// Builds the service around an existing database and completion client.
    pub fn with_client(config: &Config, db: Database, client: Arc<dyn CompletionClient>) -> Self {
        let store = JobStore::new(db);
        let engine = AnalysisEngine::new(client, EngineSettings::from(&config.ai));
        let pipeline = Pipeline::new(
            Arc::new(PipelineConfig::from_config(config)),
            Arc::new(ReaderRegistry::new()),
            engine,
            store.clone(),
        );
        let orchestrator = JobOrchestrator::new(
            pipeline,
            UploadStore::new(&config.upload_directory),
            store.clone(),
            ProgressNotifier::new(config.notifier_capacity),
            config.max_concurrent_jobs,
        );

        Self {
            orchestrator,
            store,
        }
    }

    pub fn orchestrator(&self) -> &JobOrchestrator {
        &self.orchestrator
    }

    pub fn notifier(&self) -> &ProgressNotifier {
        self.orchestrator.notifier()
    }

    // ── Analyses ──

    pub fn submit(&self, submission: Submission) -> Result<SubmitReceipt, ServiceError> {
        Ok(self.orchestrator.submit(submission)?)
    }

    pub fn status(&self, job_id: &str) -> Result<JobStatusView, ServiceError> {
        let job = self.store.get(job_id)?;
        Ok(JobStatusView::from(&job))
    }

    /// The stored result of a completed job. Any other status is `InvalidState`.
    pub fn result(&self, job_id: &str) -> Result<AnalysisResult, ServiceError> {
        let job = self.store.get(job_id)?;
        completed_result(job).map(|(_, result)| result)
    }

    pub fn report(&self, job_id: &str) -> Result<ReportExport, ServiceError> {
        let (job, result) = completed_result(self.store.get(job_id)?)?;

        let startup_name = match job.deck_id {
            Some(deck_id) => deck_repo::find_by_id(self.store.database(), deck_id)?
                .and_then(|deck| deck.startup_name),
            None => None,
        };

        let header = ReportHeader {
            job_id: &job.id,
            startup_name: startup_name.as_deref(),
            generated_at: job.completed_at.unwrap_or_else(Utc::now),
        };

        Ok(ReportExport {
            filename: report::report_filename(&job.id),
            body: report::render_text(&header, &result),
        })
    }

    /// Live events for a job. Nothing published before this call is replayed.
    pub fn subscribe(&self, job_id: &str) -> Subscription {
        self.orchestrator.subscribe(job_id)
    }

    // ── Decks ──

    pub fn list_decks(
        &self,
        limit: Option<u64>,
        offset: Option<u64>,
    ) -> Result<Vec<DeckSummary>, ServiceError> {
        let rows = deck_repo::list_with_latest(
            self.store.database(),
            limit.unwrap_or(DEFAULT_PAGE_SIZE),
            offset.unwrap_or(0),
        )?;
        Ok(rows.into_iter().map(DeckSummary::from).collect())
    }

    pub fn get_deck(&self, deck_id: i64) -> Result<DeckDetail, ServiceError> {
        let row = deck_repo::find_by_id(self.store.database(), deck_id)?
            .ok_or_else(|| ServiceError::deck_not_found(deck_id))?;

        let jobs = self.store.list(&AnalysisFilter {
            deck_id: Some(deck_id),
            ..AnalysisFilter::default()
        })?;

        Ok(DeckDetail::new(row, jobs.iter().map(JobStatusView::from).collect()))
    }

    /// Compares the latest completed analyses of two decks.
    pub fn compare_decks(
        &self,
        deck_id_1: i64,
        deck_id_2: i64,
    ) -> Result<DeckComparison, ServiceError> {
        let first = self.latest_result(deck_id_1)?;
        let second = self.latest_result(deck_id_2)?;
        Ok(compare_results(deck_id_1, &first, deck_id_2, &second))
    }

    fn latest_result(&self, deck_id: i64) -> Result<AnalysisResult, ServiceError> {
        let db = self.store.database();
        if deck_repo::find_by_id(db, deck_id)?.is_none() {
            return Err(ServiceError::deck_not_found(deck_id));
        }

        let job_id = analysis_repo::latest_completed_for_deck(db, deck_id)?.ok_or_else(|| {
            ServiceError::InvalidState(format!(
                "Deck {} has no completed analysis; both decks must be analyzed first",
                deck_id
            ))
        })?;

        self.result(&job_id)
    }

    // ── Dashboard ──

    pub fn dashboard(&self) -> Result<DashboardMetrics, ServiceError> {
        let counts = stats_repo::dashboard_counts(self.store.database())?;
        Ok(DashboardMetrics::from(counts))
    }

    /// Stops accepting submissions and waits for running jobs.
    pub async fn shutdown(&self) {
        self.orchestrator.shutdown().await;
    }
}

fn completed_result(job: Job) -> Result<(Job, AnalysisResult), ServiceError> {
    if job.status != JobStatus::Completed {
        return Err(ServiceError::InvalidState(format!(
            "Analysis {} is {}, not completed",
            job.id, job.status
        )));
    }

    match job.result.clone() {
        Some(result) => Ok((job, result)),
        // Completed jobs always carry a result; treat a missing one as absent.
        None => Err(ServiceError::NotFound(format!(
            "Result not found for analysis {}",
            job.id
        ))),
    }
}
