//! Transport-agnostic request and response envelopes.
//!
//! Both the gRPC and the REST adapter decode into [`EvaluationRequest`] and
//! encode from [`EvaluationResponse`]. Field names follow the JSON wire
//! shape (`packages`, `data`, `input`, `query`, `resultPath`, `isCache`).

use crate::error::{EvalError, EvalResult};
use serde::{Deserialize, Deserializer, Serialize};

/// A single evaluation request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EvaluationRequest {
    /// Policy module sources, order-significant
    pub packages: Vec<String>,
    /// Inline JSON data document (an object)
    #[serde(deserialize_with = "empty_as_none", skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    /// JSON input document supplied at evaluation time
    #[serde(deserialize_with = "empty_as_none", skip_serializing_if = "Option::is_none")]
    pub input: Option<String>,
    /// Query expression
    pub query: String,
    /// Path expression narrowing the result
    #[serde(deserialize_with = "empty_as_none", skip_serializing_if = "Option::is_none")]
    pub result_path: Option<String>,
    /// Reuse and store the prepared plan
    #[serde(rename = "isCache")]
    pub use_cache: bool,
}

impl EvaluationRequest {
    /// Create a request for a query with no data, modules or input
    #[must_use]
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Self::default()
        }
    }

    /// Build from wire fields, where empty strings mean "absent"
    #[must_use]
    pub fn from_wire(
        query: String,
        packages: Vec<String>,
        data: String,
        input: String,
        result_path: String,
        use_cache: bool,
    ) -> Self {
        Self {
            packages,
            data: non_empty(data),
            input: non_empty(input),
            query,
            result_path: non_empty(result_path),
            use_cache,
        }
    }

    /// Set the inline data document
    #[must_use]
    pub fn with_data(mut self, data: impl Into<String>) -> Self {
        self.data = Some(data.into());
        self
    }

    /// Append a policy module
    #[must_use]
    pub fn with_module(mut self, module: impl Into<String>) -> Self {
        self.packages.push(module.into());
        self
    }

    /// Set the input document
    #[must_use]
    pub fn with_input(mut self, input: impl Into<String>) -> Self {
        self.input = Some(input.into());
        self
    }

    /// Set the result path expression
    #[must_use]
    pub fn with_result_path(mut self, path: impl Into<String>) -> Self {
        self.result_path = Some(path.into());
        self
    }

    /// Opt in or out of plan caching
    #[must_use]
    pub fn with_cache(mut self, use_cache: bool) -> Self {
        self.use_cache = use_cache;
        self
    }

    /// Reject requests that must never reach the engine
    ///
    /// # Errors
    ///
    /// Returns [`EvalError::InvalidRequest`] if the query is empty
    pub fn validate(&self) -> EvalResult<()> {
        if self.query.trim().is_empty() {
            return Err(EvalError::query_required());
        }
        Ok(())
    }
}

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() { None } else { Some(s) }
}

fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.and_then(non_empty))
}

/// Response envelope returned for every request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationResponse {
    /// Whether evaluation succeeded
    pub success: bool,
    /// JSON array of bindings, or extracted text when a result path was given
    #[serde(default)]
    pub result: String,
    /// Failure message, empty on success
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error: String,
}

impl EvaluationResponse {
    /// Successful response
    #[must_use]
    pub fn ok(result: impl Into<String>) -> Self {
        Self {
            success: true,
            result: result.into(),
            error: String::new(),
        }
    }

    /// Failed response with a bare message
    #[must_use]
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            result: String::new(),
            error: message.into(),
        }
    }
}

impl From<EvalResult<String>> for EvaluationResponse {
    fn from(result: EvalResult<String>) -> Self {
        match result {
            Ok(text) => Self::ok(text),
            Err(err) => Self::failure(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_from_json() {
        let json = r#"{
            "packages": ["package a", "package b"],
            "data": "{\"k\": 1}",
            "input": "",
            "query": "x := 1",
            "resultPath": "{[0].x}",
            "isCache": true
        }"#;
        let req: EvaluationRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.packages.len(), 2);
        assert_eq!(req.data.as_deref(), Some("{\"k\": 1}"));
        assert_eq!(req.input, None);
        assert_eq!(req.result_path.as_deref(), Some("{[0].x}"));
        assert!(req.use_cache);
    }

    #[test]
    fn test_request_defaults() {
        let req: EvaluationRequest = serde_json::from_str(r#"{"query": "x := 1"}"#).unwrap();
        assert!(req.packages.is_empty());
        assert_eq!(req.data, None);
        assert!(!req.use_cache);
    }

    #[test]
    fn test_request_from_wire() {
        let req = EvaluationRequest::from_wire(
            "x := 1".to_string(),
            vec![],
            String::new(),
            "{}".to_string(),
            String::new(),
            false,
        );
        assert_eq!(req.data, None);
        assert_eq!(req.input.as_deref(), Some("{}"));
        assert_eq!(req.result_path, None);
    }

    #[test]
    fn test_request_validate() {
        assert!(EvaluationRequest::new("x := 1").validate().is_ok());
        assert_eq!(
            EvaluationRequest::new("").validate(),
            Err(EvalError::query_required())
        );
        assert!(EvaluationRequest::new("   ").validate().is_err());
    }

    #[test]
    fn test_response_json() {
        let ok = EvaluationResponse::ok("[]");
        assert_eq!(
            serde_json::to_string(&ok).unwrap(),
            r#"{"success":true,"result":"[]"}"#
        );

        let failed: EvaluationResponse = Err(EvalError::query_required()).into();
        assert!(!failed.success);
        assert_eq!(failed.error, "invalid request: query required");
    }
}
