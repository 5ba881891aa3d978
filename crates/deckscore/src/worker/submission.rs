use serde::Serialize;
use serde_json::{json, Value};

use crate::storage::StoredDocument;

/// One uploaded file as received from a client.
#[derive(Debug, Clone)]
pub struct IncomingDocument {
    pub filename: String,
    /// Content type declared by the client, if any.
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl IncomingDocument {
    pub fn new(filename: impl Into<String>, content_type: Option<&str>, bytes: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            content_type: content_type.map(str::to_string),
            bytes,
        }
    }
}

/// A request to analyze one deck made of one or more documents.
#[derive(Debug, Clone)]
pub struct Submission {
    /// Startup name, also used as the deck label.
    pub label: String,
    pub documents: Vec<IncomingDocument>,
}

/// Returned as soon as a job is accepted; the analysis runs in the background.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SubmitReceipt {
    pub job_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deck_id: Option<i64>,
    pub status: &'static str,
    pub message: String,
    pub websocket_url: String,
}

impl SubmitReceipt {
    pub(crate) fn started(job_id: &str, deck_id: Option<i64>) -> Self {
        Self {
            job_id: job_id.to_string(),
            deck_id,
            status: "started",
            message: "Analysis started".to_string(),
            websocket_url: websocket_path(job_id),
        }
    }
}

/// Path of the live progress channel for a job.
pub fn websocket_path(job_id: &str) -> String {
    format!("/ws/{}", job_id)
}

/// Builds the `deck_metadata` object stored with a deck.
pub(crate) fn deck_metadata(label: &str, documents: &[StoredDocument], upload_date: &str) -> Value {
    let files: Vec<Value> = documents
        .iter()
        .map(|doc| {
            json!({
                "filename": doc.filename,
                "content_type": doc.declared_type,
                "size": doc.size,
            })
        })
        .collect();

    json!({
        "startup_name": label,
        "documents": files,
        "upload_date": upload_date,
    })
}
