//! Analysis repository: rows of the `analyses` and `analysis_results` tables.

use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{Database, DatabaseError};

/// A raw `analyses` row.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisRow {
    pub id: String,
    pub deck_id: Option<i64>,
    pub status: String,
    pub created_at: String,
    pub updated_at: String,
    pub completed_at: Option<String>,
    pub error: Option<String>,
}

impl AnalysisRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            deck_id: row.get("deck_id")?,
            status: row.get("status")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
            completed_at: row.get("completed_at")?,
            error: row.get("error")?,
        })
    }
}

/// A raw `analysis_results` row. Section columns hold JSON objects.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultRow {
    pub analysis_id: String,
    pub overall_score: f64,
    pub pitch_analysis: String,
    pub market_research: String,
    pub financial_analysis: String,
    pub website_analysis: String,
    pub investment_strategy: String,
    pub due_diligence: String,
    pub generated_report: Option<String>,
    pub defaulted_sections: String,
    pub created_at: String,
}

impl ResultRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            analysis_id: row.get("analysis_id")?,
            overall_score: row.get("overall_score")?,
            pitch_analysis: row.get("pitch_analysis")?,
            market_research: row.get("market_research")?,
            financial_analysis: row.get("financial_analysis")?,
            website_analysis: row.get("website_analysis")?,
            investment_strategy: row.get("investment_strategy")?,
            due_diligence: row.get("due_diligence")?,
            generated_report: row.get("generated_report")?,
            defaulted_sections: row.get("defaulted_sections")?,
            created_at: row.get("created_at")?,
        })
    }
}

/// A guarded status change. Applied only while the row still has `from_status`.
#[derive(Debug, Clone)]
pub struct StatusWrite<'a> {
    pub id: &'a str,
    pub from_status: &'a str,
    pub to_status: &'a str,
    pub updated_at: &'a str,
    pub completed_at: Option<&'a str>,
    pub error: Option<&'a str>,
    pub result: Option<&'a ResultRow>,
}

#[derive(Debug, Default, Clone)]
pub struct AnalysisFilter {
    pub deck_id: Option<i64>,
    pub status: Option<String>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

pub fn insert(db: &Database, row: &AnalysisRow) -> Result<(), DatabaseError> {
    db.with_conn(|conn| insert_on(conn, row))
}

/// Inserts on an already locked connection, e.g. inside a caller's transaction.
pub fn insert_on(conn: &Connection, row: &AnalysisRow) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO analyses (id, deck_id, status, created_at, updated_at, completed_at, error)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            row.id,
            row.deck_id,
            row.status,
            row.created_at,
            row.updated_at,
            row.completed_at,
            row.error,
        ],
    )?;
    Ok(())
}

pub fn find_by_id(db: &Database, id: &str) -> Result<Option<AnalysisRow>, DatabaseError> {
    db.with_conn(|conn| {
        let row = conn
            .query_row(
                "SELECT * FROM analyses WHERE id = ?1",
                params![id],
                AnalysisRow::from_row,
            )
            .optional()?;
        Ok(row)
    })
}

/// Loads an analysis together with its result row, under one lock.
pub fn find_with_result(
    db: &Database,
    id: &str,
) -> Result<Option<(AnalysisRow, Option<ResultRow>)>, DatabaseError> {
    db.with_conn(|conn| {
        let analysis = conn
            .query_row(
                "SELECT * FROM analyses WHERE id = ?1",
                params![id],
                AnalysisRow::from_row,
            )
            .optional()?;

        let Some(analysis) = analysis else {
            return Ok(None);
        };

        let result = conn
            .query_row(
                "SELECT * FROM analysis_results WHERE analysis_id = ?1",
                params![id],
                ResultRow::from_row,
            )
            .optional()?;

        Ok(Some((analysis, result)))
    })
}

/// Applies a guarded status change and, for completions, inserts the result
/// row in the same transaction.
///
/// Returns `false` without writing anything when the row is missing or no
/// longer has the expected previous status.
pub fn apply_status_write(db: &Database, write: &StatusWrite<'_>) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let tx = conn.unchecked_transaction()?;

        let changed = tx.execute(
            "UPDATE analyses SET status = ?3, updated_at = ?4, completed_at = ?5, error = ?6
             WHERE id = ?1 AND status = ?2",
            params![
                write.id,
                write.from_status,
                write.to_status,
                write.updated_at,
                write.completed_at,
                write.error,
            ],
        )?;

        if changed == 0 {
            // Dropping the transaction rolls it back.
            return Ok(false);
        }

        if let Some(result) = write.result {
            tx.execute(
                "INSERT INTO analysis_results (analysis_id, overall_score, pitch_analysis,
                 market_research, financial_analysis, website_analysis, investment_strategy,
                 due_diligence, generated_report, defaulted_sections, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                params![
                    result.analysis_id,
                    result.overall_score,
                    result.pitch_analysis,
                    result.market_research,
                    result.financial_analysis,
                    result.website_analysis,
                    result.investment_strategy,
                    result.due_diligence,
                    result.generated_report,
                    result.defaulted_sections,
                    result.created_at,
                ],
            )?;
        }

        tx.commit()?;
        Ok(true)
    })
}

/// Lists analyses, newest first.
pub fn query(db: &Database, filter: &AnalysisFilter) -> Result<Vec<AnalysisRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut conditions = Vec::new();
        let mut param_values: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

        if let Some(deck_id) = filter.deck_id {
            conditions.push(format!("deck_id = ?{}", param_values.len() + 1));
            param_values.push(Box::new(deck_id));
        }
        if let Some(ref status) = filter.status {
            conditions.push(format!("status = ?{}", param_values.len() + 1));
            param_values.push(Box::new(status.clone()));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let limit = filter.limit.unwrap_or(100) as i64;
        let offset = filter.offset.unwrap_or(0) as i64;

        let sql = format!(
            "SELECT * FROM analyses {} ORDER BY created_at DESC, rowid DESC LIMIT {} OFFSET {}",
            where_clause, limit, offset
        );

        let params_ref: Vec<&dyn rusqlite::types::ToSql> =
            param_values.iter().map(|p| p.as_ref()).collect();

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_ref.as_slice(), AnalysisRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// Id of the most recent completed analysis of a deck.
pub fn latest_completed_for_deck(
    db: &Database,
    deck_id: i64,
) -> Result<Option<String>, DatabaseError> {
    db.with_conn(|conn| {
        let id = conn
            .query_row(
                "SELECT id FROM analyses WHERE deck_id = ?1 AND status = 'completed'
                 ORDER BY completed_at DESC, rowid DESC LIMIT 1",
                params![deck_id],
                |r| r.get(0),
            )
            .optional()?;
        Ok(id)
    })
}
