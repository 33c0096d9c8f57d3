//! Verdict Core Types
//!
//! Pure types shared by every layer of the service: the transport-agnostic
//! request/response envelope, the plan fingerprint, and the staged
//! evaluation error. No I/O happens here.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod fingerprint;
pub mod request;

// Re-exports
pub use error::{EvalError, EvalResult, Stage};
pub use fingerprint::Fingerprint;
pub use request::{EvaluationRequest, EvaluationResponse};
