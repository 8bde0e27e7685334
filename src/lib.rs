//! GeneLink - LLM-assisted gene/disease correlation analysis
//!
//! Resolves a gene symbol and a disease name to canonical identifiers,
//! gathers evidence from public life-sciences providers concurrently and
//! asks an LLM for a structured correlation verdict. One call to
//! [`Pipeline::run`] produces one terminal [`AnalysisResult`].

pub mod analysis;
pub mod cli;
pub mod config;
pub mod error;
pub mod llm;
pub mod models;
pub mod pipeline;
pub mod report;
pub mod resolver;
pub mod retry;
pub mod sources;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{FetchError, LlmError, PipelineError};
pub use models::{AnalysisRequest, AnalysisResult, LlmVerdict, PipelineStatus, ProgressEvent};
pub use pipeline::{CancelHandle, Pipeline, ProgressSink};
