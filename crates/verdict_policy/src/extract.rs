//! Result extraction.
//!
//! Converts an engine [`ResultSet`] into the array-of-objects payload and,
//! when a result path is given, narrows it with a JSONPath query rendered as
//! plain text.
//!
//! Paths may be written as RFC 9535 JSONPath (`$[0].x`), as bare paths
//! (`[0].x`, `.x`) or as kubectl-style templates (`{[0].x}`, `{.[0].x}`).

use crate::engine::ResultSet;
use serde_json::{Map, Value};
use serde_json_path::JsonPath;
use verdict_core::{EvalError, EvalResult};

/// Extracted payload
#[derive(Debug, Clone, PartialEq)]
pub enum Extracted {
    /// Full array of binding objects
    Document(Value),
    /// Text rendering of the values matched by a result path
    Text(String),
}

impl Extracted {
    /// Compact rendering used on the wire
    ///
    /// # Errors
    ///
    /// Returns error if the document cannot be encoded
    pub fn render(&self) -> EvalResult<String> {
        match self {
            Self::Document(doc) => {
                serde_json::to_string(doc).map_err(|e| EvalError::Extraction(e.to_string()))
            }
            Self::Text(text) => Ok(text.clone()),
        }
    }

    /// Indented rendering for terminals
    ///
    /// # Errors
    ///
    /// Returns error if the document cannot be encoded
    pub fn render_pretty(&self) -> EvalResult<String> {
        match self {
            Self::Document(doc) => serde_json::to_string_pretty(doc)
                .map_err(|e| EvalError::Extraction(e.to_string())),
            Self::Text(text) => Ok(text.clone()),
        }
    }
}

/// Result extractor
#[derive(Debug, Clone, Copy, Default)]
pub struct ResultExtractor;

impl ResultExtractor {
    /// Create a new extractor
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Extract a payload from a result set
    ///
    /// # Errors
    ///
    /// Returns [`EvalError::Extraction`] if a row is not an object or the
    /// result path does not parse
    pub fn extract(&self, results: &ResultSet, result_path: Option<&str>) -> EvalResult<Extracted> {
        let rows = Self::to_rows(results)?;
        let document = Value::Array(rows.into_iter().map(Value::Object).collect());

        match result_path.map(str::trim).filter(|p| !p.is_empty()) {
            None => Ok(Extracted::Document(document)),
            Some(path) => {
                let normalized = normalize_path(path);
                let compiled = JsonPath::parse(&normalized).map_err(|e| {
                    EvalError::Extraction(format!("invalid result path {path:?}: {e}"))
                })?;
                let matches = compiled.query(&document).all();
                Ok(Extracted::Text(render_matches(&matches)))
            }
        }
    }

    /// Convert each row of bindings into a string-keyed map
    fn to_rows(results: &ResultSet) -> EvalResult<Vec<Map<String, Value>>> {
        results
            .rows()
            .iter()
            .enumerate()
            .map(|(index, row)| match row {
                Value::Object(map) => Ok(map.clone()),
                Value::Null => Ok(Map::new()),
                other => Err(EvalError::Extraction(format!(
                    "result row {index} is not an object: {other}"
                ))),
            })
            .collect()
    }
}

/// Rewrite the accepted path dialects into `$`-rooted JSONPath
fn normalize_path(path: &str) -> String {
    let mut path = path.trim();
    if let Some(inner) = path.strip_prefix('{').and_then(|p| p.strip_suffix('}')) {
        path = inner.trim();
    }

    if path.is_empty() || path == "." {
        "$".to_string()
    } else if path.starts_with('$') {
        path.to_string()
    } else if let Some(rest) = path.strip_prefix(".[") {
        format!("$[{rest}")
    } else if path.starts_with('.') || path.starts_with('[') {
        format!("${path}")
    } else {
        format!("$.{path}")
    }
}

/// Strings verbatim, everything else as compact JSON, space separated
fn render_matches(matches: &[&Value]) -> String {
    matches
        .iter()
        .map(|value| match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn results(rows: Vec<Value>) -> ResultSet {
        rows.into_iter().collect()
    }

    #[test]
    fn test_extract_document() {
        let extracted = ResultExtractor::new()
            .extract(&results(vec![json!({"x": 1})]), None)
            .unwrap();
        assert_eq!(extracted, Extracted::Document(json!([{"x": 1}])));
        assert_eq!(extracted.render().unwrap(), r#"[{"x":1}]"#);
    }

    #[test]
    fn test_extract_empty() {
        let extractor = ResultExtractor::new();
        let extracted = extractor.extract(&ResultSet::new(), None).unwrap();
        assert_eq!(extracted.render().unwrap(), "[]");

        let extracted = extractor.extract(&ResultSet::new(), Some("{[0].x}")).unwrap();
        assert_eq!(extracted, Extracted::Text(String::new()));
    }

    #[test]
    fn test_extract_path_dialects() {
        let set = results(vec![json!({"x": 1})]);
        let extractor = ResultExtractor::new();
        for path in ["$[0].x", "[0].x", "{[0].x}", "{.[0].x}", "{ $[0].x }"] {
            let extracted = extractor.extract(&set, Some(path)).unwrap();
            assert_eq!(extracted.render().unwrap(), "1", "path {path}");
        }
    }

    #[test]
    fn test_extract_text_rendering() {
        let set = results(vec![
            json!({"name": "alice", "roles": ["admin"]}),
            json!({"name": "bob", "roles": []}),
        ]);
        let extractor = ResultExtractor::new();

        let names = extractor.extract(&set, Some("$[*].name")).unwrap();
        assert_eq!(names, Extracted::Text("alice bob".to_string()));

        let roles = extractor.extract(&set, Some("$[0].roles")).unwrap();
        assert_eq!(roles, Extracted::Text(r#"["admin"]"#.to_string()));
    }

    #[test]
    fn test_extract_invalid_path() {
        let err = ResultExtractor::new()
            .extract(&results(vec![json!({"x": 1})]), Some("$[?"))
            .unwrap_err();
        assert!(matches!(err, EvalError::Extraction(_)));
        assert!(err.to_string().contains("invalid result path"));
    }

    #[test]
    fn test_extract_rejects_scalar_rows() {
        let err = ResultExtractor::new()
            .extract(&results(vec![json!(true)]), None)
            .unwrap_err();
        assert_eq!(err.stage(), verdict_core::Stage::Extract);
    }

    #[test]
    fn test_render_pretty() {
        let extracted = Extracted::Document(json!([{"x": 1}]));
        assert_eq!(
            extracted.render_pretty().unwrap(),
            "[\n  {\n    \"x\": 1\n  }\n]"
        );
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path("{.}"), "$");
        assert_eq!(normalize_path("x"), "$.x");
        assert_eq!(normalize_path(".x"), "$.x");
        assert_eq!(normalize_path("{.[0].x}"), "$[0].x");
    }
}
