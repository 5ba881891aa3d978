use std::sync::Arc;

use tracing::{info_span, Instrument};

use crate::analysis::{AnalysisContext, AnalysisEngine, AnalysisResult};
use crate::broadcast::{ProgressEvent, Stage};
use crate::config::DocumentFormat;
use crate::jobs::{JobStore, JobStoreError, Transition};
use crate::reader::ReaderRegistry;
use crate::sanitize;
use crate::storage::StoredDocument;

use super::config::PipelineConfig;
use super::context::PipelineContext;
use super::error::{PipelineError, PipelineWarning};
use super::progress::ProgressReporter;

/// Placed between the texts of consecutive documents in the corpus.
pub const DOCUMENT_SEPARATOR: &str = "\n\n";

pub struct Pipeline {
    config: Arc<PipelineConfig>,
    readers: Arc<ReaderRegistry>,
    engine: AnalysisEngine,
    store: JobStore,
}

impl Pipeline {
    pub fn new(
        config: Arc<PipelineConfig>,
        readers: Arc<ReaderRegistry>,
        engine: AnalysisEngine,
        store: JobStore,
    ) -> Self {
        Self {
            config,
            readers,
            engine,
            store,
        }
    }

    /// Runs one job to a terminal state.
    ///
    /// The outcome is always written to the job store and announced through
    /// `progress`; the returned value is for the caller's own bookkeeping.
    pub async fn run(
        &self,
        mut ctx: PipelineContext,
        progress: &dyn ProgressReporter,
    ) -> (Result<AnalysisResult, PipelineError>, PipelineContext) {
        let span = info_span!("pipeline",
            job_id = %ctx.job_id,
            documents = ctx.documents.len(),
        );

        async move {
            match self.store.transition(&ctx.job_id, Transition::Start) {
                Ok(_) => {}
                // Another run owns this job; its state and subscribers are not ours to touch.
                Err(e @ JobStoreError::InvalidTransition { .. }) => {
                    tracing::warn!("Job is not pending, skipping run: {}", e);
                    return (Err(PipelineError::Persistence(e)), ctx);
                }
                Err(e) => {
                    let error = PipelineError::Persistence(e);
                    self.fail_job(&ctx.job_id, &error, progress);
                    return (Err(error), ctx);
                }
            }

            progress.report(ProgressEvent::started(&ctx.job_id, ctx.documents.len()));

            match self.execute(&mut ctx, progress).await {
                Ok(result) => {
                    tracing::info!(score = result.overall_score, "Job completed");
                    progress.report(ProgressEvent::completed(&ctx.job_id, result.clone()));
                    (Ok(result), ctx)
                }
                Err(e) => {
                    self.fail_job(&ctx.job_id, &e, progress);
                    (Err(e), ctx)
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Records `error` on the job and emits the terminal error event.
    pub fn fail_job(&self, job_id: &str, error: &PipelineError, progress: &dyn ProgressReporter) {
        let message = error.to_job_message();
        tracing::error!(job_id, code = error.code(), "Job failed: {}", error);

        if let Err(e) = self.store.transition(job_id, Transition::Fail(message.clone())) {
            tracing::error!(job_id, "Failed to record job failure: {}", e);
        }

        progress.report(ProgressEvent::failed(job_id, &message));
    }

    async fn execute(
        &self,
        ctx: &mut PipelineContext,
        progress: &dyn ProgressReporter,
    ) -> Result<AnalysisResult, PipelineError> {
        // Stage 1: Validate documents
        {
            let _step = info_span!("validate").entered();
            progress.report(ProgressEvent::stage(
                &ctx.job_id,
                Stage::Validating,
                format!("Validating {} document(s)", ctx.documents.len()),
            ));
            self.step_validate(ctx);
        }

        let skipped: Vec<String> = ctx.warnings.iter().map(|w| w.to_string()).collect();
        if !skipped.is_empty() {
            progress.report(ProgressEvent::skipped_documents(&ctx.job_id, &skipped));
        }
        if ctx.valid_documents.is_empty() {
            return Err(PipelineError::NoValidInput(skipped));
        }

        // Stage 2: Read documents
        progress.report(ProgressEvent::stage(
            &ctx.job_id,
            Stage::Reading,
            format!("Reading {} document(s)", ctx.valid_documents.len()),
        ));
        let corpus = self
            .step_read(ctx)
            .instrument(info_span!("read_documents"))
            .await?;

        // Stage 3: Analyze
        progress.report(ProgressEvent::stage(
            &ctx.job_id,
            Stage::Analyzing,
            format!("Analyzing pitch deck with {}", self.engine.model()),
        ));
        let context = AnalysisContext {
            startup_name: ctx.startup_name.clone(),
            document_count: ctx.valid_documents.len(),
        };
        let result = self
            .engine
            .analyze(&corpus, &context)
            .instrument(info_span!("analyze", chars = corpus.len()))
            .await?;
        ctx.corpus = Some(corpus);

        if !result.score_in_range() {
            return Err(PipelineError::ScoreOutOfRange(result.overall_score));
        }
        ctx.result = Some(result.clone());

        // Stage 4: Persist
        {
            let _step = info_span!("persist").entered();
            progress.report(ProgressEvent::stage(
                &ctx.job_id,
                Stage::Persisting,
                "Saving analysis results",
            ));
            self.store
                .transition(&ctx.job_id, Transition::Complete(result.clone()))?;
        }

        Ok(result)
    }

    fn step_validate(&self, ctx: &mut PipelineContext) {
        for doc in &ctx.documents {
            match self.check_document(doc) {
                Ok(()) => ctx.valid_documents.push(doc.clone()),
                Err(reason) => {
                    tracing::warn!(
                        file = %sanitize::redact_path(&doc.path),
                        "Skipping document: {}",
                        reason
                    );
                    ctx.warnings.push(PipelineWarning::SkippedDocument {
                        filename: doc.filename.clone(),
                        reason,
                    });
                }
            }
        }
    }

    /// Type and size checks. Never opens the file.
    fn check_document(&self, doc: &StoredDocument) -> Result<(), String> {
        let format = ReaderRegistry::resolve_format(&doc.path, doc.declared_type.as_deref())
            .map_err(|_| match &doc.declared_type {
                Some(ct) => format!("unsupported file type {}", ct),
                None => "unknown file type".to_string(),
            })?;

        let content_type = doc
            .declared_type
            .as_deref()
            .filter(|ct| DocumentFormat::from_content_type(ct) == Some(format))
            .unwrap_or(format.content_type());

        if !self.config.allows(content_type) {
            return Err(format!("file type {} is not allowed", content_type));
        }
        if !self.readers.can_read(format) {
            return Err(format!("{} files cannot be read, convert to PDF or PPTX", format));
        }
        if doc.size == 0 {
            return Err("file is empty".to_string());
        }
        if doc.size > self.config.max_file_size_bytes {
            return Err(format!(
                "file size {} bytes exceeds the limit of {} bytes",
                doc.size, self.config.max_file_size_bytes
            ));
        }
        Ok(())
    }

    async fn step_read(&self, ctx: &PipelineContext) -> Result<String, PipelineError> {
        let readers = Arc::clone(&self.readers);
        let documents = ctx.valid_documents.clone();

        // Parsing is CPU-bound and synchronous.
        tokio::task::spawn_blocking(move || read_corpus(&readers, &documents))
            .await
            .map_err(|e| PipelineError::Panicked(format!("document reader task failed: {}", e)))?
    }
}

/// Concatenates document texts in submission order. The first failure aborts.
fn read_corpus(
    readers: &ReaderRegistry,
    documents: &[StoredDocument],
) -> Result<String, PipelineError> {
    let mut corpus = String::new();

    for doc in documents {
        let text = readers
            .read(&doc.path, doc.declared_type.as_deref())
            .map_err(|source| PipelineError::Extraction {
                filename: doc.filename.clone(),
                source,
            })?;

        tracing::debug!(
            file = %sanitize::redact_path(&doc.path),
            chars = text.len(),
            "Read document"
        );

        if text.trim().is_empty() {
            continue;
        }
        if !corpus.is_empty() {
            corpus.push_str(DOCUMENT_SEPARATOR);
        }
        corpus.push_str(&text);
    }

    Ok(corpus)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{
        AnalysisError, Completion, CompletionClient, CompletionRequest, EngineSettings,
    };
    use crate::broadcast::EventKind;
    use crate::db::Database;
    use crate::jobs::JobStatus;
    use crate::reader::pdf::tests::build_pdf;
    use crate::reader::pptx::tests::build_pptx;
    use crate::storage::UploadStore;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tempfile::TempDir;

    const REPLY: &str = r#"{"overall_score": 72, "pitch_analysis": {"clarity": 8}, "market_research": {}, "financial_analysis": {}}"#;

    struct ScriptedClient {
        reply: Result<Completion, AnalysisError>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedClient {
        fn replying(content: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Ok(Completion {
                    content: content.to_string(),
                    finish_reason: Some("stop".to_string()),
                }),
                prompts: Mutex::new(Vec::new()),
            })
        }

        fn failing(error: AnalysisError) -> Arc<Self> {
            Arc::new(Self {
                reply: Err(error),
                prompts: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> usize {
            self.prompts.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl CompletionClient for ScriptedClient {
        async fn complete(&self, request: &CompletionRequest) -> Result<Completion, AnalysisError> {
            self.prompts.lock().unwrap().push(request.user.clone());
            self.reply.clone()
        }

        fn model(&self) -> &str {
            "scripted"
        }
    }

    #[derive(Default)]
    struct RecordingProgress {
        events: Mutex<Vec<ProgressEvent>>,
    }

    impl RecordingProgress {
        fn kinds(&self) -> Vec<EventKind> {
            self.events.lock().unwrap().iter().map(|e| e.kind).collect()
        }

        fn stages(&self) -> Vec<Stage> {
            self.events.lock().unwrap().iter().map(|e| e.stage).collect()
        }
    }

    impl ProgressReporter for RecordingProgress {
        fn report(&self, event: ProgressEvent) {
            self.events.lock().unwrap().push(event);
        }
    }

    struct Fixture {
        _dir: TempDir,
        uploads: UploadStore,
        store: JobStore,
        client: Arc<ScriptedClient>,
        pipeline: Pipeline,
    }

    fn setup_with(client: Arc<ScriptedClient>, config: PipelineConfig) -> Fixture {
        let dir = TempDir::new().unwrap();
        let uploads = UploadStore::new(dir.path().join("uploads"));
        let store = JobStore::new(Database::open_in_memory().unwrap());
        let engine = AnalysisEngine::new(client.clone(), EngineSettings::default());
        let pipeline = Pipeline::new(
            Arc::new(config),
            Arc::new(ReaderRegistry::new()),
            engine,
            store.clone(),
        );
        Fixture {
            _dir: dir,
            uploads,
            store,
            client,
            pipeline,
        }
    }

    fn setup(client: Arc<ScriptedClient>) -> Fixture {
        setup_with(client, PipelineConfig::default())
    }

    impl Fixture {
        fn context(&self, docs: Vec<StoredDocument>) -> PipelineContext {
            let job = self.store.create(None).unwrap();
            PipelineContext::new(&job.id, Some("Acme".to_string()), docs)
        }

        fn pdf(&self, name: &str, pages: &[&str]) -> StoredDocument {
            self.uploads
                .save(name, Some("application/pdf"), &build_pdf(pages))
                .unwrap()
        }
    }

    #[tokio::test]
    async fn test_successful_run_emits_every_stage() {
        let fx = setup(ScriptedClient::replying(REPLY));
        let ctx = fx.context(vec![fx.pdf("deck.pdf", &["Problem", "Solution"])]);
        let job_id = ctx.job_id.clone();
        let progress = RecordingProgress::default();

        let (result, ctx) = fx.pipeline.run(ctx, &progress).await;

        assert_eq!(result.unwrap().overall_score, 72.0);
        assert!(ctx.corpus.unwrap().contains("Problem"));
        assert_eq!(
            progress.stages(),
            vec![
                Stage::Submitted,
                Stage::Validating,
                Stage::Reading,
                Stage::Analyzing,
                Stage::Persisting,
                Stage::Completed,
            ]
        );

        let job = fx.store.get(&job_id).unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.result.unwrap().pitch_analysis.get("clarity"), Some(&serde_json::json!(8)));
    }

    #[tokio::test]
    async fn test_documents_are_read_in_submission_order() {
        let fx = setup(ScriptedClient::replying(REPLY));
        let pptx = fx
            .uploads
            .save("appendix.pptx", None, &build_pptx(&[&["Appendix slide"][..]]))
            .unwrap();
        let ctx = fx.context(vec![fx.pdf("main.pdf", &["Main deck"]), pptx]);

        let (_, ctx) = fx.pipeline.run(ctx, &RecordingProgress::default()).await;

        let corpus = ctx.corpus.unwrap();
        let main = corpus.find("Main deck").unwrap();
        let appendix = corpus.find("Appendix slide").unwrap();
        assert!(main < appendix);
        assert_eq!(fx.client.calls(), 1);
    }

    #[tokio::test]
    async fn test_partial_validity_warns_and_continues() {
        let fx = setup(ScriptedClient::replying(REPLY));
        let notes = fx.uploads.save("notes.txt", Some("text/plain"), b"hello").unwrap();
        let ctx = fx.context(vec![notes, fx.pdf("deck.pdf", &["Market"])]);
        let job_id = ctx.job_id.clone();
        let progress = RecordingProgress::default();

        let (result, ctx) = fx.pipeline.run(ctx, &progress).await;

        assert!(result.is_ok());
        assert_eq!(ctx.valid_documents.len(), 1);
        assert_eq!(ctx.warnings.len(), 1);
        assert!(progress.kinds().contains(&EventKind::ValidationWarning));
        let warning = progress
            .events
            .lock()
            .unwrap()
            .iter()
            .find(|e| e.kind == EventKind::ValidationWarning)
            .map(|e| e.message.clone())
            .unwrap();
        assert!(warning.starts_with("Some files were skipped:\nnotes.txt:"), "{}", warning);
        assert_eq!(fx.store.get(&job_id).unwrap().status, JobStatus::Completed);
    }

    #[tokio::test]
    async fn test_zero_valid_documents_fails_without_engine_call() {
        let fx = setup(ScriptedClient::replying(REPLY));
        let notes = fx.uploads.save("notes.txt", Some("text/plain"), b"hello").unwrap();
        let legacy = fx
            .uploads
            .save("old.ppt", Some("application/vnd.ms-powerpoint"), b"\xD0\xCF\x11\xE0")
            .unwrap();
        let ctx = fx.context(vec![notes, legacy]);
        let job_id = ctx.job_id.clone();
        let progress = RecordingProgress::default();

        let (result, _) = fx.pipeline.run(ctx, &progress).await;

        assert!(matches!(result, Err(PipelineError::NoValidInput(ref r)) if r.len() == 2));
        assert_eq!(fx.client.calls(), 0);

        let job = fx.store.get(&job_id).unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert!(job.error_message.unwrap().starts_with("NoValidInput:"));
        assert_eq!(progress.kinds().last(), Some(&EventKind::Error));
    }

    #[tokio::test]
    async fn test_oversize_document_is_skipped() {
        let config = PipelineConfig {
            max_file_size_bytes: 16,
            ..PipelineConfig::default()
        };
        let fx = setup_with(ScriptedClient::replying(REPLY), config);
        let ctx = fx.context(vec![fx.pdf("big.pdf", &["Too large for the limit"])]);

        let (result, ctx) = fx.pipeline.run(ctx, &RecordingProgress::default()).await;

        assert!(matches!(result, Err(PipelineError::NoValidInput(_))));
        assert!(ctx.warnings[0].to_string().contains("exceeds the limit"));
    }

    #[tokio::test]
    async fn test_one_unreadable_document_aborts_job() {
        let fx = setup(ScriptedClient::replying(REPLY));
        let broken = fx
            .uploads
            .save("broken.pdf", Some("application/pdf"), b"not a pdf at all")
            .unwrap();
        let ctx = fx.context(vec![fx.pdf("good.pdf", &["Fine"]), broken]);
        let job_id = ctx.job_id.clone();

        let (result, _) = fx.pipeline.run(ctx, &RecordingProgress::default()).await;

        match result {
            Err(PipelineError::Extraction { filename, .. }) => assert_eq!(filename, "broken.pdf"),
            other => panic!("Expected Extraction error, got {:?}", other.map(|_| ())),
        }
        assert_eq!(fx.client.calls(), 0);
        let job = fx.store.get(&job_id).unwrap();
        assert!(job.error_message.unwrap().starts_with("ExtractionError:"));
    }

    #[tokio::test]
    async fn test_upstream_failure_is_recorded() {
        let fx = setup(ScriptedClient::failing(AnalysisError::UpstreamUnavailable(
            "rate limited".to_string(),
        )));
        let ctx = fx.context(vec![fx.pdf("deck.pdf", &["Text"])]);
        let job_id = ctx.job_id.clone();
        let progress = RecordingProgress::default();

        let (result, _) = fx.pipeline.run(ctx, &progress).await;

        assert!(matches!(
            result,
            Err(PipelineError::Analysis(AnalysisError::UpstreamUnavailable(_)))
        ));
        let job = fx.store.get(&job_id).unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert!(job.result.is_none());
        assert!(job.error_message.unwrap().starts_with("UpstreamUnavailable:"));

        let events = progress.events.lock().unwrap();
        let terminal = events.last().unwrap();
        assert_eq!(terminal.kind, EventKind::Error);
        assert!(terminal.error.as_deref().unwrap().contains("rate limited"));
    }

    #[tokio::test]
    async fn test_score_out_of_range_fails_job() {
        let fx = setup(ScriptedClient::replying(r#"{"overall_score": 140}"#));
        let ctx = fx.context(vec![fx.pdf("deck.pdf", &["Text"])]);
        let job_id = ctx.job_id.clone();

        let (result, _) = fx.pipeline.run(ctx, &RecordingProgress::default()).await;

        assert!(matches!(result, Err(PipelineError::ScoreOutOfRange(s)) if s == 140.0));
        let job = fx.store.get(&job_id).unwrap();
        assert!(job.error_message.unwrap().starts_with("ValidationError:"));
    }

    #[tokio::test]
    async fn test_document_without_text_gives_degenerate_result() {
        let fx = setup(ScriptedClient::replying(REPLY));
        let ctx = fx.context(vec![fx.pdf("blank.pdf", &[""])]);

        let (result, _) = fx.pipeline.run(ctx, &RecordingProgress::default()).await;

        let result = result.unwrap();
        assert_eq!(result.overall_score, 0.0);
        assert_eq!(fx.client.calls(), 0);
    }

    #[tokio::test]
    async fn test_job_already_started_is_not_rerun() {
        let fx = setup(ScriptedClient::replying(REPLY));
        let ctx = fx.context(vec![fx.pdf("deck.pdf", &["Text"])]);
        fx.store.transition(&ctx.job_id, Transition::Start).unwrap();

        let progress = RecordingProgress::default();
        let job_id = ctx.job_id.clone();

        let (result, _) = fx.pipeline.run(ctx, &progress).await;

        assert!(matches!(
            result,
            Err(PipelineError::Persistence(JobStoreError::InvalidTransition { .. }))
        ));
        assert_eq!(fx.client.calls(), 0);
        // The other run's job is left alone and nothing is announced.
        let job = fx.store.get(&job_id).unwrap();
        assert_eq!(job.status, JobStatus::Processing);
        assert!(job.error_message.is_none());
        assert!(progress.kinds().is_empty());
    }

    #[tokio::test]
    async fn test_finished_job_is_not_rerun() {
        let fx = setup(ScriptedClient::replying(REPLY));
        let ctx = fx.context(vec![fx.pdf("deck.pdf", &["Text"])]);
        let job_id = ctx.job_id.clone();
        fx.store.transition(&job_id, Transition::Start).unwrap();
        fx.store
            .transition(&job_id, Transition::Fail("InternalError: earlier run".to_string()))
            .unwrap();
        let progress = RecordingProgress::default();

        let (result, _) = fx.pipeline.run(ctx, &progress).await;

        assert!(result.is_err());
        let job = fx.store.get(&job_id).unwrap();
        assert_eq!(job.error_message.as_deref(), Some("InternalError: earlier run"));
        assert!(progress.kinds().is_empty());
    }
}
