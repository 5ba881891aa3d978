use crate::analysis::AnalysisResult;
use crate::storage::StoredDocument;

use super::error::PipelineWarning;

pub struct PipelineContext {
    // Input
    pub job_id: String,
    pub startup_name: Option<String>,
    pub documents: Vec<StoredDocument>,

    // Validating result, in submission order
    pub valid_documents: Vec<StoredDocument>,

    // Reading result
    pub corpus: Option<String>,

    // Analyzing result
    pub result: Option<AnalysisResult>,

    // Non-fatal warnings
    pub warnings: Vec<PipelineWarning>,
}

impl PipelineContext {
    pub fn new(job_id: &str, startup_name: Option<String>, documents: Vec<StoredDocument>) -> Self {
        Self {
            job_id: job_id.to_string(),
            startup_name,
            documents,
            valid_documents: Vec::new(),
            corpus: None,
            result: None,
            warnings: Vec::new(),
        }
    }
}
