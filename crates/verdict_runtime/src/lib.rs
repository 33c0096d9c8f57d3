//! Verdict Runtime
//!
//! The prepared-plan cache and the evaluation orchestrator. Transports hand
//! an [`EvaluationRequest`](verdict_core::EvaluationRequest) to an
//! [`Evaluator`] and always get a well-formed response back.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cache;
pub mod evaluator;

pub use cache::{CacheStats, PlanCache};
pub use evaluator::Evaluator;
