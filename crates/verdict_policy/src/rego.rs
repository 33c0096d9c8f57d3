//! Rego engine backed by `regorus`.
//!
//! A [`RegoPlan`] is an interpreter that already holds the parsed and
//! analyzed modules and the data document, plus a query that is known to
//! parse. Evaluation works on a clone so one plan can serve many concurrent
//! requests with different inputs.

use crate::engine::{EngineError, PolicyEngine, ResultSet};
use regorus::unstable::{Parser, Source};
use serde_json::Value;
use std::fmt::Display;
use std::sync::Mutex;

/// Source name reported in query parse errors
const QUERY_SOURCE: &str = "<query>";

/// Prepared Rego query
pub struct RegoPlan {
    /// Interpreter with modules and data loaded
    engine: Mutex<regorus::Engine>,
    /// Query evaluated against the interpreter
    query: String,
    /// Number of modules loaded
    modules: usize,
}

impl RegoPlan {
    fn interpreter(&self) -> Result<regorus::Engine, EngineError> {
        self.engine
            .lock()
            .map(|engine| engine.clone())
            .map_err(|_| EngineError::Evaluation("prepared plan lock poisoned".to_string()))
    }
}

impl std::fmt::Debug for RegoPlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegoPlan")
            .field("query", &self.query)
            .field("modules", &self.modules)
            .finish()
    }
}

/// Rego policy engine
#[derive(Debug, Clone, Default)]
pub struct RegoEngine;

impl RegoEngine {
    /// Create a new engine
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Module path under which the i-th request module is registered
    fn module_path(index: usize) -> String {
        format!("module_{index}.rego")
    }

    fn check_query(query: &str) -> Result<(), EngineError> {
        let source = Source::from_contents(QUERY_SOURCE.to_string(), query.to_string())
            .map_err(|e| EngineError::InvalidQuery(engine_message(e)))?;
        Parser::new(&source)
            .and_then(|mut parser| parser.parse_user_query())
            .map_err(|e| EngineError::InvalidQuery(engine_message(e)))?;
        Ok(())
    }
}

// regorus messages start with a line break before the rendered location
fn engine_message(err: impl Display) -> String {
    err.to_string().trim().to_string()
}

impl PolicyEngine for RegoEngine {
    type Plan = RegoPlan;

    fn prepare(
        &self,
        data: Option<&str>,
        modules: &[String],
        query: &str,
    ) -> Result<RegoPlan, EngineError> {
        Self::check_query(query)?;

        let mut engine = regorus::Engine::new();

        if let Some(data) = data {
            let document: Value = serde_json::from_str(data)
                .map_err(|e| EngineError::InvalidData(e.to_string()))?;
            if !document.is_object() {
                return Err(EngineError::InvalidData(
                    "data document must be a JSON object".to_string(),
                ));
            }
            let value = regorus::Value::from_json_str(data)
                .map_err(|e| EngineError::InvalidData(engine_message(e)))?;
            engine
                .add_data(value)
                .map_err(|e| EngineError::InvalidData(engine_message(e)))?;
        }

        for (index, module) in modules.iter().enumerate() {
            engine
                .add_policy(Self::module_path(index), module.clone())
                .map_err(|e| EngineError::InvalidModule {
                    index,
                    message: engine_message(e),
                })?;
        }

        // Run module analysis once so unsafe variables and similar errors
        // surface here, and every clone starts out prepared.
        if !modules.is_empty() {
            engine
                .eval_query("true".to_string(), false)
                .map_err(|e| EngineError::InvalidPolicy(engine_message(e)))?;
        }

        tracing::trace!(modules = modules.len(), "prepared rego plan");

        Ok(RegoPlan {
            engine: Mutex::new(engine),
            query: query.to_string(),
            modules: modules.len(),
        })
    }

    fn evaluate(&self, plan: &RegoPlan, input: Option<&Value>) -> Result<ResultSet, EngineError> {
        let mut engine = plan.interpreter()?;

        if let Some(input) = input {
            let value = regorus::Value::from_json_str(&input.to_string())
                .map_err(|e| EngineError::InvalidInput(engine_message(e)))?;
            engine.set_input(value);
        }

        let results = engine
            .eval_query(plan.query.clone(), false)
            .map_err(|e| EngineError::Evaluation(engine_message(e)))?;

        results
            .result
            .iter()
            .map(|row| {
                serde_json::to_value(&row.bindings)
                    .map_err(|e| EngineError::Evaluation(e.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()
            .map(ResultSet::from_iter)
    }
}
