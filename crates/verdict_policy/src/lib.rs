//! Verdict Policy Boundary
//!
//! The policy-evaluation engine sits behind [`PolicyEngine`]; the
//! production implementation is [`RegoEngine`]. Raw result sets are turned
//! into transport payloads by the [`ResultExtractor`].

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod engine;
pub mod extract;
pub mod rego;

pub use engine::{EngineError, PolicyEngine, ResultSet};
pub use extract::{Extracted, ResultExtractor};
pub use rego::{RegoEngine, RegoPlan};
