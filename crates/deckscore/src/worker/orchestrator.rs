use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use futures_util::FutureExt;
use tokio::sync::{watch, Semaphore};
use tracing::{info_span, Instrument};

use crate::broadcast::{ProgressNotifier, Subscription};
use crate::db::deck_repo::NewDeck;
use crate::error::WorkerError;
use crate::jobs::{Job, JobStore, Transition};
use crate::pipeline::{NotifierProgress, Pipeline, PipelineContext, PipelineError};
use crate::storage::{StoredDocument, UploadCleanup, UploadStore};

use super::submission::{deck_metadata, Submission, SubmitReceipt};

/// Accepts submissions and runs each one as a background job.
///
/// At most `max_concurrent_jobs` pipelines run at once; further jobs stay
/// `pending` until a slot frees up.
#[derive(Clone)]
pub struct JobOrchestrator {
    inner: Arc<Inner>,
}

struct Inner {
    pipeline: Pipeline,
    uploads: UploadStore,
    store: JobStore,
    notifier: ProgressNotifier,
    permits: Arc<Semaphore>,
    shutdown: AtomicBool,
    in_flight: watch::Sender<usize>,
}

impl JobOrchestrator {
    pub fn new(
        pipeline: Pipeline,
        uploads: UploadStore,
        store: JobStore,
        notifier: ProgressNotifier,
        max_concurrent_jobs: usize,
    ) -> Self {
        let (in_flight, _) = watch::channel(0);
        Self {
            inner: Arc::new(Inner {
                pipeline,
                uploads,
                store,
                notifier,
                permits: Arc::new(Semaphore::new(max_concurrent_jobs.max(1))),
                shutdown: AtomicBool::new(false),
                in_flight,
            }),
        }
    }

    pub fn store(&self) -> &JobStore {
        &self.inner.store
    }

    pub fn notifier(&self) -> &ProgressNotifier {
        &self.inner.notifier
    }

    pub fn subscribe(&self, job_id: &str) -> Subscription {
        self.inner.notifier.subscribe(job_id)
    }

    /// Number of accepted jobs that have not reached a terminal state yet.
    pub fn in_flight(&self) -> usize {
        *self.inner.in_flight.borrow()
    }

    /// Stores the uploads, records the deck and a `pending` job, and starts
    /// the job in the background. Must be called within a Tokio runtime.
    ///
    /// Per-document checks happen later, in the job itself; only an empty
    /// submission or a missing label is refused here.
    pub fn submit(&self, submission: Submission) -> Result<SubmitReceipt, WorkerError> {
        if self.inner.shutdown.load(Ordering::Relaxed) {
            return Err(WorkerError::ShuttingDown);
        }

        let label = submission.label.trim();
        if label.is_empty() {
            return Err(WorkerError::MissingLabel);
        }
        if submission.documents.is_empty() {
            return Err(WorkerError::NoDocuments);
        }

        // Removes already-written files if anything below fails.
        let mut cleanup = UploadCleanup::new();
        let mut stored = Vec::with_capacity(submission.documents.len());
        for doc in &submission.documents {
            let saved =
                self.inner
                    .uploads
                    .save(&doc.filename, doc.content_type.as_deref(), &doc.bytes)?;
            cleanup.track(saved.path.clone());
            stored.push(saved);
        }

        let job = self.record_deck(label, &stored)?;

        tracing::info!(
            job_id = %job.id,
            deck_id = ?job.deck_id,
            documents = stored.len(),
            "Accepted submission"
        );

        self.spawn_job(job.id.clone(), label.to_string(), stored, cleanup);

        Ok(SubmitReceipt::started(&job.id, job.deck_id))
    }

    /// Writes the deck row and its pending job in one transaction.
    fn record_deck(&self, label: &str, stored: &[StoredDocument]) -> Result<Job, WorkerError> {
        let upload_date = Utc::now().to_rfc3339();
        let filenames: Vec<&str> = stored.iter().map(|d| d.filename.as_str()).collect();
        let file_path = stored
            .first()
            .map(|d| d.path.to_string_lossy().to_string())
            .unwrap_or_default();
        let metadata = deck_metadata(label, stored, &upload_date);

        let job = self.inner.store.create_for_deck(&NewDeck {
            filename: &filenames.join(", "),
            file_path: &file_path,
            startup_name: Some(label),
            deck_metadata: &metadata,
            upload_date: &upload_date,
        })?;
        Ok(job)
    }

    fn spawn_job(
        &self,
        job_id: String,
        startup_name: String,
        documents: Vec<StoredDocument>,
        cleanup: UploadCleanup,
    ) {
        let inner = Arc::clone(&self.inner);
        inner.in_flight.send_modify(|n| *n += 1);
        let span = info_span!("job", job_id = %job_id);

        tokio::spawn(
            async move {
                let _in_flight = InFlight(Arc::clone(&inner));
                // Uploads are removed on every exit path, panics included,
                // before the job stops counting as in flight.
                let _cleanup = cleanup;
                let progress = NotifierProgress::new(inner.notifier.clone());

                let _permit = match Arc::clone(&inner.permits).acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => {
                        if let Err(e) = inner.store.transition(&job_id, Transition::Start) {
                            tracing::warn!("Could not start job before failing it: {}", e);
                        }
                        let error =
                            PipelineError::Cancelled("job orchestrator shut down".to_string());
                        inner.pipeline.fail_job(&job_id, &error, &progress);
                        return;
                    }
                };

                let ctx = PipelineContext::new(&job_id, Some(startup_name), documents);
                let outcome = AssertUnwindSafe(inner.pipeline.run(ctx, &progress))
                    .catch_unwind()
                    .await;

                if let Err(panic) = outcome {
                    let error = PipelineError::Panicked(panic_message(panic.as_ref()));
                    inner.pipeline.fail_job(&job_id, &error, &progress);
                }
            }
            .instrument(span),
        );
    }

    /// Refuses new submissions and waits until every accepted job has finished.
    pub async fn shutdown(&self) {
        self.inner.shutdown.store(true, Ordering::Relaxed);
        tracing::info!(in_flight = self.in_flight(), "Waiting for running jobs to finish");
        self.wait_idle().await;
        self.inner.permits.close();
        tracing::info!("Job orchestrator stopped");
    }

    /// Waits until no accepted job is still running.
    pub async fn wait_idle(&self) {
        let mut rx = self.inner.in_flight.subscribe();
        // The sender lives in `inner`, so this only errs if it was dropped.
        let _ = rx.wait_for(|n| *n == 0).await;
    }
}

struct InFlight(Arc<Inner>);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.in_flight.send_modify(|n| *n = n.saturating_sub(1));
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "job panicked".to_string()
    }
}
