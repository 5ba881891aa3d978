//! LLM-backed pitch deck analysis.
//!
//! [`AnalysisEngine`] builds the prompt, makes exactly one call through a
//! [`CompletionClient`] and parses the reply into an [`AnalysisResult`].

pub mod client;
pub mod engine;
pub mod error;
pub mod prompt;
pub mod result;

pub use client::{ChatCompletionClient, Completion, CompletionClient, CompletionRequest};
pub use engine::{AnalysisEngine, EngineSettings};
pub use error::AnalysisError;
pub use prompt::AnalysisContext;
pub use result::{parse_analysis, AnalysisResult, Section, SectionMap};
