pub mod orchestrator;
pub mod submission;

pub use orchestrator::JobOrchestrator;
pub use submission::{websocket_path, IncomingDocument, Submission, SubmitReceipt};
