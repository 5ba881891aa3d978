use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DeckscoreError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Processing error: {0}")]
    Process(#[from] ProcessError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),

    #[error("Analysis error: {0}")]
    Analysis(#[from] crate::analysis::AnalysisError),

    #[error("Job store error: {0}")]
    JobStore(#[from] crate::jobs::JobStoreError),

    #[error("Secret error: {0}")]
    Secret(#[from] crate::secrets::SecretError),

    #[error("Worker error: {0}")]
    Worker(#[from] WorkerError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Schema validation failed: {errors}")]
    SchemaValidation { errors: String },
}

/// Failures raised while turning a stored document into plain text.
#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("Unsupported document format: {0}")]
    UnsupportedFormat(String),

    #[error("Document not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to read document '{path}': {source}")]
    ReadDocument {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to extract text from {format}: {message}")]
    Extraction {
        format: &'static str,
        message: String,
    },
}

impl ProcessError {
    pub(crate) fn extraction(format: &'static str, message: impl Into<String>) -> Self {
        Self::Extraction {
            format,
            message: message.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to create directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file '{path}': {source}")]
    WriteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid upload filename: {0:?}")]
    InvalidFilename(String),
}

/// Reasons a submission is refused before any job exists.
#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("No files were uploaded")]
    NoDocuments,

    #[error("A startup name is required")]
    MissingLabel,

    #[error("Job orchestrator is shutting down")]
    ShuttingDown,

    #[error("Failed to store upload: {0}")]
    Storage(#[from] StorageError),

    #[error("Failed to create job: {0}")]
    JobStore(#[from] crate::jobs::JobStoreError),
}

pub type Result<T> = std::result::Result<T, DeckscoreError>;
