use thiserror::Error;

/// Failures of a single analysis request.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalysisError {
    /// The completion endpoint could not be reached or answered with an error status.
    #[error("Analysis service unavailable: {0}")]
    UpstreamUnavailable(String),

    /// The model answered, but not with the expected JSON shape.
    #[error("Malformed analysis response: {0}")]
    MalformedResponse(String),

    /// The model answered with JSON that lacks required content.
    #[error("Incomplete analysis response: {0}")]
    IncompleteResponse(String),
}

impl AnalysisError {
    /// Stable identifier used in stored error messages and API payloads.
    pub fn code(&self) -> &'static str {
        match self {
            Self::UpstreamUnavailable(_) => "UpstreamUnavailable",
            Self::MalformedResponse(_) => "MalformedResponse",
            Self::IncompleteResponse(_) => "IncompleteResponse",
        }
    }
}
