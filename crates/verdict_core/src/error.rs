//! Staged evaluation errors.
//!
//! Every failure that can happen while serving a request is tagged with the
//! pipeline stage it came from. Transports never see these as faults: they
//! are folded into the response envelope.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Result type for the evaluation pipeline
pub type EvalResult<T> = Result<T, EvalError>;

/// Pipeline phase at which a request failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    /// Request validation and plan construction
    Compile,
    /// Decoding the input document
    ParseInput,
    /// Running the prepared plan
    Evaluate,
    /// Encoding or path-extracting the result set
    Extract,
}

impl Stage {
    /// Stable lowercase name
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Compile => "compile",
            Self::ParseInput => "parse-input",
            Self::Evaluate => "evaluate",
            Self::Extract => "extract",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Evaluation error
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EvalError {
    /// Request rejected before reaching the engine
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Plan construction failed (modules, data or query)
    #[error("unable to prepare query: {0}")]
    Compile(String),

    /// Input document is not valid JSON
    #[error("unable to parse input: {0}")]
    InputParse(String),

    /// Engine failed while evaluating the plan
    #[error("unable to evaluate query: {0}")]
    Evaluation(String),

    /// Result encoding or path extraction failed
    #[error("unable to extract result: {0}")]
    Extraction(String),
}

impl EvalError {
    /// Stage at which this error was raised
    #[must_use]
    pub const fn stage(&self) -> Stage {
        match self {
            Self::InvalidRequest(_) | Self::Compile(_) => Stage::Compile,
            Self::InputParse(_) => Stage::ParseInput,
            Self::Evaluation(_) => Stage::Evaluate,
            Self::Extraction(_) => Stage::Extract,
        }
    }

    /// The "query required" validation failure
    #[must_use]
    pub fn query_required() -> Self {
        Self::InvalidRequest("query required".to_string())
    }
}
