//! Progress events pushed to live subscribers of a job.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::analysis::AnalysisResult;

/// Stage of the job pipeline an event belongs to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Submitted,
    Validating,
    Reading,
    Analyzing,
    Persisting,
    Completed,
    Failed,
}

impl Stage {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Stage::Completed | Stage::Failed)
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Submitted => write!(f, "Submitted"),
            Stage::Validating => write!(f, "Validating documents"),
            Stage::Reading => write!(f, "Reading documents"),
            Stage::Analyzing => write!(f, "Analyzing"),
            Stage::Persisting => write!(f, "Saving results"),
            Stage::Completed => write!(f, "Completed"),
            Stage::Failed => write!(f, "Failed"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    Started,
    Processing,
    Warning,
    Completed,
    Error,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    TaskStarted,
    StageChanged,
    ValidationWarning,
    Completed,
    Error,
}

/// One notification, serialized as a JSON text frame for subscribers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProgressEvent {
    pub job_id: String,
    pub status: EventStatus,
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub stage: Stage,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    /// Set on the completed event.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<AnalysisResult>,
    /// Set on the error event, in `<Code>: <message>` form.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProgressEvent {
    fn new(job_id: &str, status: EventStatus, kind: EventKind, stage: Stage, message: String) -> Self {
        Self {
            job_id: job_id.to_string(),
            status,
            kind,
            stage,
            message,
            timestamp: Utc::now(),
            result: None,
            error: None,
        }
    }

    pub fn started(job_id: &str, document_count: usize) -> Self {
        Self::new(
            job_id,
            EventStatus::Started,
            EventKind::TaskStarted,
            Stage::Submitted,
            format!("Starting analysis of {} document(s)", document_count),
        )
    }

    pub fn stage(job_id: &str, stage: Stage, message: impl Into<String>) -> Self {
        Self::new(
            job_id,
            EventStatus::Processing,
            EventKind::StageChanged,
            stage,
            message.into(),
        )
    }

    /// Lists documents skipped during validation, one per line.
    pub fn skipped_documents(job_id: &str, reasons: &[String]) -> Self {
        Self::new(
            job_id,
            EventStatus::Warning,
            EventKind::ValidationWarning,
            Stage::Validating,
            format!("Some files were skipped:\n{}", reasons.join("\n")),
        )
    }

    pub fn completed(job_id: &str, result: AnalysisResult) -> Self {
        let mut event = Self::new(
            job_id,
            EventStatus::Completed,
            EventKind::Completed,
            Stage::Completed,
            "Analysis completed successfully".to_string(),
        );
        event.result = Some(result);
        event
    }

    pub fn failed(job_id: &str, error: &str) -> Self {
        let mut event = Self::new(
            job_id,
            EventStatus::Error,
            EventKind::Error,
            Stage::Failed,
            format!("Error in pitch deck analysis: {}", error),
        );
        event.error = Some(error.to_string());
        event
    }

    pub fn is_terminal(&self) -> bool {
        self.stage.is_terminal()
    }
}
