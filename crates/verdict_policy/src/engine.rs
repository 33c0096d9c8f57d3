//! Policy engine boundary.

use serde_json::Value;

/// Engine error
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    /// Inline data document rejected
    #[error("invalid data document: {0}")]
    InvalidData(String),

    /// Policy module failed to parse or compile
    #[error("invalid module {index}: {message}")]
    InvalidModule {
        /// Position of the module in the request
        index: usize,
        /// Engine message
        message: String,
    },

    /// Modules parsed but failed analysis
    #[error("invalid policy: {0}")]
    InvalidPolicy(String),

    /// Query rejected while preparing
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// Input document could not be handed to the engine
    #[error("invalid input document: {0}")]
    InvalidInput(String),

    /// Runtime failure inside the engine
    #[error("{0}")]
    Evaluation(String),
}

/// A policy-evaluation engine.
///
/// `prepare` is input-independent and may be expensive; its plan is cached
/// and shared across threads. `evaluate` runs a plan against one input.
pub trait PolicyEngine: Send + Sync + 'static {
    /// Prepared, repeatedly evaluable plan
    type Plan: Send + Sync + 'static;

    /// Compile a query together with its data document and modules
    ///
    /// # Errors
    ///
    /// Returns error if the data, any module, or the query is rejected
    fn prepare(
        &self,
        data: Option<&str>,
        modules: &[String],
        query: &str,
    ) -> Result<Self::Plan, EngineError>;

    /// Evaluate a prepared plan against an optional input document
    ///
    /// # Errors
    ///
    /// Returns error if evaluation fails
    fn evaluate(&self, plan: &Self::Plan, input: Option<&Value>) -> Result<ResultSet, EngineError>;
}

/// Ordered result rows produced by an engine.
///
/// Each row holds the engine's variable bindings for one solution of the
/// query, as a loosely-typed value (normally an object keyed by variable
/// name).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    rows: Vec<Value>,
}

impl ResultSet {
    /// Create an empty result set
    #[must_use]
    pub fn new() -> Self {
        Self { rows: Vec::new() }
    }

    /// Append a row of bindings
    pub fn push(&mut self, bindings: Value) {
        self.rows.push(bindings);
    }

    /// Rows in engine order
    #[must_use]
    pub fn rows(&self) -> &[Value] {
        &self.rows
    }

    /// Number of rows
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Check if the query had no solutions
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl FromIterator<Value> for ResultSet {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        Self {
            rows: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_result_set_order() {
        let set: ResultSet = vec![json!({"x": 1}), json!({"x": 2})].into_iter().collect();
        assert_eq!(set.len(), 2);
        assert_eq!(set.rows()[0], json!({"x": 1}));
        assert_eq!(set.rows()[1], json!({"x": 2}));
    }

    #[test]
    fn test_engine_error_display() {
        let err = EngineError::InvalidModule {
            index: 2,
            message: "unexpected token".to_string(),
        };
        assert_eq!(err.to_string(), "invalid module 2: unexpected token");
    }
}
