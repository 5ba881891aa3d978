//! Aggregate counts for the dashboard.

use std::collections::BTreeMap;

use super::{Database, DatabaseError};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DashboardCounts {
    pub total_decks: i64,
    pub total_analyses: i64,
    /// Analysis count per status; statuses without rows are absent.
    pub by_status: BTreeMap<String, i64>,
    pub average_score: Option<f64>,
}

pub fn dashboard_counts(db: &Database) -> Result<DashboardCounts, DatabaseError> {
    db.with_conn(|conn| {
        let total_decks: i64 = conn.query_row("SELECT COUNT(*) FROM decks", [], |r| r.get(0))?;

        let mut stmt = conn.prepare("SELECT status, COUNT(*) FROM analyses GROUP BY status")?;
        let by_status = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?
            .collect::<Result<BTreeMap<_, _>, _>>()?;

        let average_score: Option<f64> =
            conn.query_row("SELECT AVG(overall_score) FROM analysis_results", [], |r| {
                r.get(0)
            })?;

        Ok(DashboardCounts {
            total_decks,
            total_analyses: by_status.values().sum(),
            by_status,
            average_score,
        })
    })
}
