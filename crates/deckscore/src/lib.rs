//! Pitch deck analysis as background jobs.
//!
//! Uploaded decks (PDF, PPTX) are reduced to plain text, scored by a language
//! model in JSON mode and persisted. Job progress is pushed to live
//! subscribers while the job runs.

pub mod analysis;
pub mod broadcast;
pub mod config;
pub mod db;
pub mod error;
pub mod jobs;
pub mod pipeline;
pub mod reader;
pub mod report;
pub mod sanitize;
pub mod secrets;
pub mod service;
pub mod storage;
pub mod worker;

pub use analysis::{AnalysisEngine, AnalysisError, AnalysisResult, CompletionClient, Section};
pub use broadcast::{ProgressEvent, ProgressNotifier, Stage, Subscription};
pub use config::{load_config, load_config_or_default, Config, DocumentFormat};
pub use db::Database;
pub use error::{ConfigError, DeckscoreError, ProcessError, Result, StorageError, WorkerError};
pub use jobs::{Job, JobStatus, JobStore, JobStoreError, Transition};
pub use pipeline::{Pipeline, PipelineConfig, PipelineContext, PipelineError};
pub use reader::ReaderRegistry;
pub use service::{DeckService, ServiceError};
pub use worker::{IncomingDocument, JobOrchestrator, Submission, SubmitReceipt};
