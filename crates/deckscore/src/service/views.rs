//! Serializable shapes returned to API callers.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::db::deck_repo::{DeckRow, DeckSummaryRow};
use crate::db::stats_repo::DashboardCounts;
use crate::jobs::{Job, JobStatus};

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct JobStatusView {
    pub job_id: String,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&Job> for JobStatusView {
    fn from(job: &Job) -> Self {
        Self {
            job_id: job.id.clone(),
            status: job.status,
            created_at: job.created_at,
            completed_at: job.completed_at,
            error: job.error_message.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DeckSummary {
    pub id: i64,
    pub filename: String,
    pub startup_name: Option<String>,
    pub upload_date: String,
    pub latest_analysis_id: Option<String>,
    pub latest_status: Option<String>,
    pub overall_score: Option<f64>,
}

impl From<DeckSummaryRow> for DeckSummary {
    fn from(row: DeckSummaryRow) -> Self {
        Self {
            id: row.deck.id,
            filename: row.deck.filename,
            startup_name: row.deck.startup_name,
            upload_date: row.deck.upload_date,
            latest_analysis_id: row.latest_analysis_id,
            latest_status: row.latest_status,
            overall_score: row.overall_score,
        }
    }
}

/// One deck with every analysis run against it, newest first.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DeckDetail {
    pub id: i64,
    pub filename: String,
    pub startup_name: Option<String>,
    pub deck_metadata: Value,
    pub upload_date: String,
    pub analyses: Vec<JobStatusView>,
}

impl DeckDetail {
    pub(crate) fn new(row: DeckRow, analyses: Vec<JobStatusView>) -> Self {
        let deck_metadata = serde_json::from_str(&row.deck_metadata).unwrap_or_else(|e| {
            log::warn!("Deck {} has unreadable metadata: {}", row.id, e);
            Value::Object(Default::default())
        });
        Self {
            id: row.id,
            filename: row.filename,
            startup_name: row.startup_name,
            deck_metadata,
            upload_date: row.upload_date,
            analyses,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DashboardMetrics {
    pub total_decks: i64,
    pub total_analyses: i64,
    /// Every status is present, with zero for statuses that have no jobs.
    pub analyses_by_status: BTreeMap<String, i64>,
    pub average_score: Option<f64>,
}

impl From<DashboardCounts> for DashboardMetrics {
    fn from(counts: DashboardCounts) -> Self {
        let mut analyses_by_status: BTreeMap<String, i64> = [
            JobStatus::Pending,
            JobStatus::Processing,
            JobStatus::Completed,
            JobStatus::Failed,
        ]
        .into_iter()
        .map(|s| (s.as_str().to_string(), 0))
        .collect();
        analyses_by_status.extend(counts.by_status);

        Self {
            total_decks: counts.total_decks,
            total_analyses: counts.total_analyses,
            analyses_by_status,
            average_score: counts.average_score,
        }
    }
}

/// A rendered report ready to be sent as a download.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportExport {
    pub filename: String,
    pub body: String,
}
