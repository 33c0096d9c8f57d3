//! Evaluation orchestrator.
//!
//! Drives one request through validation, plan lookup or construction,
//! input decoding, evaluation and result extraction. Every stage failure
//! short-circuits and is reported as an [`EvalError`]; [`Evaluator::evaluate`]
//! folds it into the response envelope.

use crate::cache::PlanCache;
use serde_json::Value;
use verdict_core::{EvalError, EvalResult, EvaluationRequest, EvaluationResponse, Fingerprint};
use verdict_policy::{EngineError, Extracted, PolicyEngine, RegoEngine, ResultExtractor};

/// Evaluation orchestrator
pub struct Evaluator<E: PolicyEngine = RegoEngine> {
    engine: E,
    cache: PlanCache<E::Plan>,
    extractor: ResultExtractor,
}

impl Evaluator<RegoEngine> {
    /// Rego-backed evaluator with a plan cache of the given capacity
    /// (0 = unbounded)
    #[must_use]
    pub fn rego(cache_capacity: usize) -> Self {
        Self::with_cache(RegoEngine::new(), PlanCache::with_capacity(cache_capacity))
    }
}

impl<E: PolicyEngine> Evaluator<E> {
    /// Create an evaluator with an unbounded plan cache
    #[must_use]
    pub fn new(engine: E) -> Self {
        Self::with_cache(engine, PlanCache::new())
    }

    /// Create an evaluator around an existing cache
    #[must_use]
    pub fn with_cache(engine: E, cache: PlanCache<E::Plan>) -> Self {
        Self {
            engine,
            cache,
            extractor: ResultExtractor::new(),
        }
    }

    /// The shared plan cache
    #[must_use]
    pub fn cache(&self) -> &PlanCache<E::Plan> {
        &self.cache
    }

    /// The underlying engine
    #[must_use]
    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Evaluate a request into a response envelope. Never fails.
    pub fn evaluate(&self, request: &EvaluationRequest) -> EvaluationResponse {
        match self.run(request).and_then(|extracted| extracted.render()) {
            Ok(result) => EvaluationResponse::ok(result),
            Err(err) => {
                tracing::warn!(stage = %err.stage(), error = %err, "evaluation failed");
                EvaluationResponse::failure(err.to_string())
            }
        }
    }

    /// Evaluate a request, keeping the staged error
    ///
    /// # Errors
    ///
    /// Returns the first stage failure
    pub fn run(&self, request: &EvaluationRequest) -> EvalResult<Extracted> {
        request.validate()?;

        let fingerprint =
            Fingerprint::compute(request.data.as_deref(), &request.packages, &request.query);
        let span = tracing::debug_span!(
            "evaluate",
            fingerprint = %fingerprint.short(),
            cache = request.use_cache,
        );
        let _enter = span.enter();

        let plan = self
            .cache
            .get_or_create(fingerprint, request.use_cache, || {
                self.engine
                    .prepare(request.data.as_deref(), &request.packages, &request.query)
            })
            .map_err(|e| EvalError::Compile(e.to_string()))?;

        let input = request
            .input
            .as_deref()
            .map(serde_json::from_str::<Value>)
            .transpose()
            .map_err(|e| EvalError::InputParse(e.to_string()))?;

        let results = self
            .engine
            .evaluate(&plan, input.as_ref())
            .map_err(|e| match e {
                EngineError::InvalidInput(message) => EvalError::InputParse(message),
                other => EvalError::Evaluation(other.to_string()),
            })?;

        tracing::debug!(rows = results.len(), "evaluated");

        self.extractor
            .extract(&results, request.result_path.as_deref())
    }
}

impl<E: PolicyEngine + std::fmt::Debug> std::fmt::Debug for Evaluator<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Evaluator")
            .field("engine", &self.engine)
            .field("cache", &self.cache)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use verdict_core::Stage;
    use verdict_policy::ResultSet;

    /// Engine double that answers a few fixed queries and counts calls
    #[derive(Debug, Default)]
    struct FakeEngine {
        prepares: AtomicUsize,
        evaluations: AtomicUsize,
    }

    struct FakePlan {
        query: String,
        data: Option<Value>,
    }

    impl PolicyEngine for FakeEngine {
        type Plan = FakePlan;

        fn prepare(
            &self,
            data: Option<&str>,
            _modules: &[String],
            query: &str,
        ) -> Result<FakePlan, EngineError> {
            self.prepares.fetch_add(1, Ordering::SeqCst);
            if query.starts_with("syntax error") {
                return Err(EngineError::InvalidQuery(query.to_string()));
            }
            let data = data
                .map(serde_json::from_str)
                .transpose()
                .map_err(|e: serde_json::Error| EngineError::InvalidData(e.to_string()))?;
            Ok(FakePlan {
                query: query.to_string(),
                data,
            })
        }

        fn evaluate(&self, plan: &FakePlan, input: Option<&Value>) -> Result<ResultSet, EngineError> {
            self.evaluations.fetch_add(1, Ordering::SeqCst);
            match plan.query.as_str() {
                "x := 1" => Ok(vec![json!({"x": 1})].into_iter().collect()),
                "echo := input" => Ok(vec![json!({"echo": input})].into_iter().collect()),
                "d := data" => Ok(vec![json!({"d": plan.data})].into_iter().collect()),
                "undefined" => Ok(ResultSet::new()),
                _ => Err(EngineError::Evaluation("eval_conflict_error".to_string())),
            }
        }
    }

    fn evaluator() -> Evaluator<FakeEngine> {
        Evaluator::new(FakeEngine::default())
    }

    #[test]
    fn test_result_without_path() {
        let response = evaluator().evaluate(&EvaluationRequest::new("x := 1"));
        assert!(response.success);
        assert_eq!(response.result, r#"[{"x":1}]"#);
        assert!(response.error.is_empty());
    }

    #[test]
    fn test_result_with_path() {
        let request = EvaluationRequest::new("x := 1").with_result_path("{[0].x}");
        let response = evaluator().evaluate(&request);
        assert!(response.success);
        assert_eq!(response.result, "1");
    }

    #[test]
    fn test_empty_query_never_reaches_engine() {
        let evaluator = evaluator();
        let err = evaluator.run(&EvaluationRequest::new("")).unwrap_err();
        assert_eq!(err, EvalError::query_required());
        assert_eq!(err.stage(), Stage::Compile);
        assert_eq!(evaluator.engine().prepares.load(Ordering::SeqCst), 0);
        assert_eq!(evaluator.engine().evaluations.load(Ordering::SeqCst), 0);

        let response = evaluator.evaluate(&EvaluationRequest::new(""));
        assert!(!response.success);
        assert!(response.error.contains("query required"));
    }

    #[test]
    fn test_compile_failure() {
        let evaluator = evaluator();
        let request = EvaluationRequest::new("syntax error here").with_cache(true);
        let err = evaluator.run(&request).unwrap_err();
        assert_eq!(err.stage(), Stage::Compile);
        assert!(evaluator.cache().is_empty());

        let err = evaluator
            .run(&EvaluationRequest::new("d := data").with_data("{oops"))
            .unwrap_err();
        assert_eq!(err.stage(), Stage::Compile);
    }

    #[test]
    fn test_input_parse_failure_skips_evaluation() {
        let evaluator = evaluator();
        let request = EvaluationRequest::new("echo := input").with_input("{not json");
        let err = evaluator.run(&request).unwrap_err();
        assert_eq!(err.stage(), Stage::ParseInput);
        assert_eq!(evaluator.engine().evaluations.load(Ordering::SeqCst), 0);

        let response = evaluator.evaluate(&request);
        assert!(!response.success);
        assert!(response.error.starts_with("unable to parse input"));
    }

    #[test]
    fn test_evaluation_failure() {
        let err = evaluator().run(&EvaluationRequest::new("boom")).unwrap_err();
        assert_eq!(err.stage(), Stage::Evaluate);
        assert!(err.to_string().contains("eval_conflict_error"));
    }

    #[test]
    fn test_extraction_failure() {
        let request = EvaluationRequest::new("x := 1").with_result_path("$[?");
        let err = evaluator().run(&request).unwrap_err();
        assert_eq!(err.stage(), Stage::Extract);
    }

    #[test]
    fn test_input_and_data_reach_engine() {
        let evaluator = evaluator();
        let request = EvaluationRequest::new("echo := input").with_input(r#"{"user": "alice"}"#);
        let response = evaluator.evaluate(&request);
        assert_eq!(response.result, r#"[{"echo":{"user":"alice"}}]"#);

        let request = EvaluationRequest::new("d := data")
            .with_data(r#"{"k": 1}"#)
            .with_result_path("$[0].d.k");
        assert_eq!(evaluator.evaluate(&request).result, "1");
    }

    #[test]
    fn test_empty_result_set() {
        let response = evaluator().evaluate(&EvaluationRequest::new("undefined"));
        assert!(response.success);
        assert_eq!(response.result, "[]");
    }

    #[test]
    fn test_cached_requests_are_idempotent() {
        let evaluator = evaluator();
        let request = EvaluationRequest::new("x := 1").with_cache(true);

        let first = evaluator.evaluate(&request);
        let second = evaluator.evaluate(&request);

        assert_eq!(first, second);
        assert_eq!(evaluator.engine().prepares.load(Ordering::SeqCst), 1);
        assert_eq!(evaluator.engine().evaluations.load(Ordering::SeqCst), 2);
        assert_eq!(evaluator.cache().len(), 1);
    }

    #[test]
    fn test_input_excluded_from_cache_key() {
        let evaluator = evaluator();
        let a = EvaluationRequest::new("echo := input").with_input("1").with_cache(true);
        let b = EvaluationRequest::new("echo := input").with_input("2").with_cache(true);

        assert_eq!(evaluator.evaluate(&a).result, r#"[{"echo":1}]"#);
        assert_eq!(evaluator.evaluate(&b).result, r#"[{"echo":2}]"#);
        assert_eq!(evaluator.engine().prepares.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_uncached_requests_rebuild() {
        let evaluator = evaluator();
        let request = EvaluationRequest::new("x := 1");
        evaluator.evaluate(&request);
        evaluator.evaluate(&request);
        assert_eq!(evaluator.engine().prepares.load(Ordering::SeqCst), 2);
        assert!(evaluator.cache().is_empty());
    }

    #[test]
    fn test_rego_evaluator_end_to_end() {
        let evaluator = Evaluator::rego(0);

        let response = evaluator.evaluate(&EvaluationRequest::new("x := 1").with_cache(true));
        assert!(response.success, "{}", response.error);
        assert_eq!(response.result, r#"[{"x":1}]"#);

        let request = EvaluationRequest::new("x := 1")
            .with_result_path("{[0].x}")
            .with_cache(true);
        assert_eq!(evaluator.evaluate(&request).result, "1");
        assert_eq!(evaluator.cache().stats().hits, 1);
    }

    #[test]
    fn test_rego_malformed_query_fails_compile_uncached() {
        let evaluator = Evaluator::rego(0);
        let request = EvaluationRequest::new("x := := 1").with_cache(true);

        for _ in 0..2 {
            let err = evaluator.run(&request).unwrap_err();
            assert_eq!(err.stage(), Stage::Compile);
            assert!(err.to_string().starts_with("unable to prepare query: "));
            assert!(!err.to_string().contains(": \n"));
        }
        assert!(evaluator.cache().is_empty());
        assert_eq!(evaluator.cache().stats().hits, 0);
    }

    #[test]
    fn test_rego_unsafe_module_fails_compile_uncached() {
        let evaluator = Evaluator::rego(0);
        let request = EvaluationRequest::new("x := data.p.allow")
            .with_module("package p\nimport rego.v1\n\nallow if { y }\n")
            .with_cache(true);

        let err = evaluator.run(&request).unwrap_err();
        assert_eq!(err.stage(), Stage::Compile);
        assert!(evaluator.cache().is_empty());
    }
}

