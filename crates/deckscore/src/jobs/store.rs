//! Durable job records backed by the `analyses` tables.

use chrono::{DateTime, Utc};
use thiserror::Error;

use super::model::{Job, JobStatus, Transition};
use crate::analysis::{AnalysisResult, Section, SectionMap};
use crate::db::analysis_repo::{self, AnalysisFilter, AnalysisRow, ResultRow, StatusWrite};
use crate::db::deck_repo::{self, NewDeck};
use crate::db::{Database, DatabaseError};

#[derive(Error, Debug)]
pub enum JobStoreError {
    #[error("Job not found: {0}")]
    NotFound(String),

    #[error("Invalid transition for job {job_id}: {from} -> {to}")]
    InvalidTransition {
        job_id: String,
        from: JobStatus,
        to: JobStatus,
    },

    #[error("Persistence error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Failed to encode or decode analysis result: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Stored job {job_id} is unreadable: {reason}")]
    Corrupt { job_id: String, reason: String },
}

/// Single source of truth for job state.
///
/// Every transition is a compare-and-set on the previous status, so two
/// writers racing on the same job cannot both succeed.
#[derive(Clone)]
pub struct JobStore {
    db: Database,
}

impl JobStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Creates a pending job, optionally tied to a deck.
    pub fn create(&self, deck_id: Option<i64>) -> Result<Job, JobStoreError> {
        let now = Utc::now();
        let row = pending_row(deck_id, now);
        analysis_repo::insert(&self.db, &row)?;

        log::debug!("Created job {}", row.id);

        Ok(pending_job(row, now))
    }

    /// Records a deck and its pending job together; neither row exists if
    /// either insert fails.
    pub fn create_for_deck(&self, deck: &NewDeck<'_>) -> Result<Job, JobStoreError> {
        let now = Utc::now();
        let row = self.db.with_conn(|conn| {
            let tx = conn.unchecked_transaction()?;
            let deck_id = deck_repo::insert_on(&tx, deck)?;
            let row = pending_row(Some(deck_id), now);
            analysis_repo::insert_on(&tx, &row)?;
            tx.commit()?;
            Ok(row)
        })?;

        log::debug!("Created job {} for deck {:?}", row.id, row.deck_id);

        Ok(pending_job(row, now))
    }

    /// Moves a job along the state machine and stores the payload.
    pub fn transition(&self, job_id: &str, transition: Transition) -> Result<Job, JobStoreError> {
        let current = self.current_status(job_id)?;
        let target = transition.target();

        if !current.can_transition_to(target) {
            return Err(JobStoreError::InvalidTransition {
                job_id: job_id.to_string(),
                from: current,
                to: target,
            });
        }

        let now = format_timestamp(Utc::now());
        let completed_at = target.is_terminal().then_some(now.as_str());

        let (error, result_row) = match &transition {
            Transition::Start => (None, None),
            Transition::Complete(result) => (None, Some(result_to_row(job_id, result, &now)?)),
            Transition::Fail(message) => {
                let message = if message.trim().is_empty() {
                    "Unknown error".to_string()
                } else {
                    message.clone()
                };
                (Some(message), None)
            }
        };

        let write = StatusWrite {
            id: job_id,
            from_status: current.as_str(),
            to_status: target.as_str(),
            updated_at: &now,
            completed_at,
            error: error.as_deref(),
            result: result_row.as_ref(),
        };

        if !analysis_repo::apply_status_write(&self.db, &write)? {
            // Another writer moved the job between our read and write.
            let actual = self.current_status(job_id)?;
            return Err(JobStoreError::InvalidTransition {
                job_id: job_id.to_string(),
                from: actual,
                to: target,
            });
        }

        log::debug!("Job {} moved {} -> {}", job_id, current, target);

        self.get(job_id)
    }

    /// Loads a job, including its result when completed.
    pub fn get(&self, job_id: &str) -> Result<Job, JobStoreError> {
        let (row, result_row) = analysis_repo::find_with_result(&self.db, job_id)?
            .ok_or_else(|| JobStoreError::NotFound(job_id.to_string()))?;

        job_from_rows(row, result_row)
    }

    /// Lists jobs newest first, without loading results.
    pub fn list(&self, filter: &AnalysisFilter) -> Result<Vec<Job>, JobStoreError> {
        analysis_repo::query(&self.db, filter)?
            .into_iter()
            .map(|row| job_from_rows(row, None))
            .collect()
    }

    fn current_status(&self, job_id: &str) -> Result<JobStatus, JobStoreError> {
        let row = analysis_repo::find_by_id(&self.db, job_id)?
            .ok_or_else(|| JobStoreError::NotFound(job_id.to_string()))?;
        parse_status(&row)
    }
}

// ── Row conversion ──

fn parse_status(row: &AnalysisRow) -> Result<JobStatus, JobStoreError> {
    JobStatus::parse(&row.status).ok_or_else(|| JobStoreError::Corrupt {
        job_id: row.id.clone(),
        reason: format!("unknown status '{}'", row.status),
    })
}

fn parse_timestamp(s: &str, job_id: &str) -> Result<DateTime<Utc>, JobStoreError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| JobStoreError::Corrupt {
            job_id: job_id.to_string(),
            reason: format!("bad timestamp '{}': {}", s, e),
        })
}

fn format_timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

fn job_from_rows(row: AnalysisRow, result_row: Option<ResultRow>) -> Result<Job, JobStoreError> {
    let status = parse_status(&row)?;
    let created_at = parse_timestamp(&row.created_at, &row.id)?;
    let completed_at = row
        .completed_at
        .as_deref()
        .map(|s| parse_timestamp(s, &row.id))
        .transpose()?;

    let result = match (status, result_row) {
        (JobStatus::Completed, Some(r)) => Some(result_from_row(&r)?),
        _ => None,
    };

    Ok(Job {
        id: row.id,
        deck_id: row.deck_id,
        status,
        created_at,
        completed_at,
        error_message: row.error.filter(|_| status == JobStatus::Failed),
        result,
    })
}

fn result_to_row(
    job_id: &str,
    result: &AnalysisResult,
    created_at: &str,
) -> Result<ResultRow, JobStoreError> {
    let section = |s: Section| serde_json::to_string(result.section(s));

    Ok(ResultRow {
        analysis_id: job_id.to_string(),
        overall_score: result.overall_score,
        pitch_analysis: section(Section::PitchAnalysis)?,
        market_research: section(Section::MarketResearch)?,
        financial_analysis: section(Section::FinancialAnalysis)?,
        website_analysis: section(Section::WebsiteAnalysis)?,
        investment_strategy: section(Section::InvestmentStrategy)?,
        due_diligence: section(Section::DueDiligence)?,
        generated_report: result.generated_report.clone(),
        defaulted_sections: serde_json::to_string(&result.defaulted_sections)?,
        created_at: created_at.to_string(),
    })
}

fn result_from_row(row: &ResultRow) -> Result<AnalysisResult, JobStoreError> {
    let section = |json: &str| serde_json::from_str::<SectionMap>(json);

    Ok(AnalysisResult {
        overall_score: row.overall_score,
        pitch_analysis: section(&row.pitch_analysis)?,
        market_research: section(&row.market_research)?,
        financial_analysis: section(&row.financial_analysis)?,
        website_analysis: section(&row.website_analysis)?,
        investment_strategy: section(&row.investment_strategy)?,
        due_diligence: section(&row.due_diligence)?,
        generated_report: row.generated_report.clone(),
        defaulted_sections: serde_json::from_str(&row.defaulted_sections)?,
    })
}

fn pending_row(deck_id: Option<i64>, now: DateTime<Utc>) -> AnalysisRow {
    AnalysisRow {
        id: uuid::Uuid::new_v4().to_string(),
        deck_id,
        status: JobStatus::Pending.as_str().to_string(),
        created_at: format_timestamp(now),
        updated_at: format_timestamp(now),
        completed_at: None,
        error: None,
    }
}

fn pending_job(row: AnalysisRow, created_at: DateTime<Utc>) -> Job {
    Job {
        id: row.id,
        deck_id: row.deck_id,
        status: JobStatus::Pending,
        created_at,
        completed_at: None,
        error_message: None,
        result: None,
    }
}
