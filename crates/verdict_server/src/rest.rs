//! REST adapter.
//!
//! `POST /execute` takes an [`EvaluationRequest`] as JSON and always answers
//! `200 OK` with the response envelope; callers inspect `success`.

use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::server::evaluate_blocking;
use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, State};
use axum::routing::post;
use axum::{Json, Router};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use verdict_core::{EvaluationRequest, EvaluationResponse};
use verdict_runtime::Evaluator;

/// Build the REST router
pub fn router(evaluator: Arc<Evaluator>, config: &ServerConfig) -> Router {
    Router::new()
        .route("/execute", post(execute))
        .layer(DefaultBodyLimit::max(config.max_message_size))
        .layer(TimeoutLayer::new(config.connection_timeout))
        .layer(TraceLayer::new_for_http())
        .with_state(evaluator)
}

async fn execute(
    State(evaluator): State<Arc<Evaluator>>,
    payload: Result<Json<EvaluationRequest>, JsonRejection>,
) -> Json<EvaluationResponse> {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            tracing::warn!(error = %rejection.body_text(), "undecodable request body");
            return Json(EvaluationResponse::failure(format!(
                "unable to decode request: {}",
                rejection.body_text()
            )));
        }
    };

    Json(evaluate_blocking(evaluator, request).await)
}

/// Serve the REST router on a bound listener
///
/// # Errors
///
/// Returns error if the accept loop fails
pub async fn serve(
    listener: TcpListener,
    evaluator: Arc<Evaluator>,
    config: &ServerConfig,
) -> Result<(), ServerError> {
    axum::serve(listener, router(evaluator, config))
        .await
        .map_err(|e| ServerError::Serve {
            listener: "rest",
            message: e.to_string(),
        })
}
