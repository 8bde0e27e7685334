//! Evidence collection and verdict synthesis.

pub mod aggregator;
pub mod correlation;
pub mod extract;

pub use aggregator::EvidenceAggregator;
pub use correlation::{parse_verdict, CorrelationAnalyzer};
