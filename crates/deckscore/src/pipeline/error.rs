use thiserror::Error;

use crate::analysis::AnalysisError;
use crate::error::ProcessError;
use crate::jobs::JobStoreError;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("No valid documents to analyze ({})", .0.join("; "))]
    NoValidInput(Vec<String>),

    #[error("Failed to read '{filename}': {source}")]
    Extraction {
        filename: String,
        #[source]
        source: ProcessError,
    },

    #[error("{0}")]
    Analysis(#[from] AnalysisError),

    #[error("overall_score {0} is outside 0..=100")]
    ScoreOutOfRange(f64),

    #[error("{0}")]
    Persistence(#[from] JobStoreError),

    #[error("Job execution panicked: {0}")]
    Panicked(String),

    #[error("Job was cancelled: {0}")]
    Cancelled(String),
}

impl PipelineError {
    /// Stable code prefixed to the stored error message.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NoValidInput(_) => "NoValidInput",
            Self::Extraction { source, .. } => match source {
                ProcessError::UnsupportedFormat(_) => "UnsupportedFormat",
                ProcessError::NotFound(_) => "NotFound",
                ProcessError::ReadDocument { .. } | ProcessError::Extraction { .. } => {
                    "ExtractionError"
                }
            },
            Self::Analysis(e) => e.code(),
            Self::ScoreOutOfRange(_) => "ValidationError",
            Self::Persistence(_) => "PersistenceError",
            Self::Panicked(_) | Self::Cancelled(_) => "InternalError",
        }
    }

    /// `<Code>: <message>`, as written to the job record.
    pub fn to_job_message(&self) -> String {
        format!("{}: {}", self.code(), self)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PipelineWarning {
    SkippedDocument { filename: String, reason: String },
}

impl std::fmt::Display for PipelineWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineWarning::SkippedDocument { filename, reason } => {
                write!(f, "{}: {}", filename, reason)
            }
        }
    }
}
