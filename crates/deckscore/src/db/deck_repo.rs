//! Deck repository: one row per submission.

use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{Database, DatabaseError};

/// A raw `decks` row. `deck_metadata` holds a JSON object.
#[derive(Debug, Clone, PartialEq)]
pub struct DeckRow {
    pub id: i64,
    pub filename: String,
    pub file_path: String,
    pub startup_name: Option<String>,
    pub deck_metadata: String,
    pub upload_date: String,
}

impl DeckRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            filename: row.get("filename")?,
            file_path: row.get("file_path")?,
            startup_name: row.get("startup_name")?,
            deck_metadata: row.get("deck_metadata")?,
            upload_date: row.get("upload_date")?,
        })
    }
}

/// A deck with the status of its most recent analysis, if any.
#[derive(Debug, Clone, PartialEq)]
pub struct DeckSummaryRow {
    pub deck: DeckRow,
    pub latest_analysis_id: Option<String>,
    pub latest_status: Option<String>,
    pub overall_score: Option<f64>,
}

pub struct NewDeck<'a> {
    pub filename: &'a str,
    pub file_path: &'a str,
    pub startup_name: Option<&'a str>,
    pub deck_metadata: &'a serde_json::Value,
    pub upload_date: &'a str,
}

/// Inserts a deck and returns its id.
pub fn insert(db: &Database, deck: &NewDeck<'_>) -> Result<i64, DatabaseError> {
    db.with_conn(|conn| insert_on(conn, deck))
}

/// Inserts on an already locked connection, e.g. inside a caller's transaction.
pub fn insert_on(conn: &Connection, deck: &NewDeck<'_>) -> Result<i64, DatabaseError> {
    let metadata = serde_json::to_string(deck.deck_metadata).map_err(|e| DatabaseError::Json {
        column: "deck_metadata",
        source: e,
    })?;

    conn.execute(
        "INSERT INTO decks (filename, file_path, startup_name, deck_metadata, upload_date)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            deck.filename,
            deck.file_path,
            deck.startup_name,
            metadata,
            deck.upload_date,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn find_by_id(db: &Database, id: i64) -> Result<Option<DeckRow>, DatabaseError> {
    db.with_conn(|conn| {
        let row = conn
            .query_row(
                "SELECT * FROM decks WHERE id = ?1",
                params![id],
                DeckRow::from_row,
            )
            .optional()?;
        Ok(row)
    })
}

/// Lists decks newest first, each with its latest analysis.
pub fn list_with_latest(
    db: &Database,
    limit: u64,
    offset: u64,
) -> Result<Vec<DeckSummaryRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT d.*, a.id AS analysis_id, a.status AS analysis_status,
                    r.overall_score AS overall_score
             FROM decks d
             LEFT JOIN analyses a ON a.id = (
                 SELECT id FROM analyses WHERE deck_id = d.id
                 ORDER BY created_at DESC, rowid DESC LIMIT 1
             )
             LEFT JOIN analysis_results r ON r.analysis_id = a.id
             ORDER BY d.upload_date DESC, d.id DESC
             LIMIT ?1 OFFSET ?2",
        )?;

        let rows = stmt
            .query_map(params![limit as i64, offset as i64], |row| {
                Ok(DeckSummaryRow {
                    deck: DeckRow::from_row(row)?,
                    latest_analysis_id: row.get("analysis_id")?,
                    latest_status: row.get("analysis_status")?,
                    overall_score: row.get("overall_score")?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}
