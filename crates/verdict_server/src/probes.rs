//! Health probes.

use crate::error::ServerError;
use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::net::TcpListener;

/// Readiness flag, set once the gRPC and REST listeners are bound
#[derive(Debug, Clone, Default)]
pub struct Readiness(Arc<AtomicBool>);

impl Readiness {
    /// Create a flag that starts not ready
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Report ready
    pub fn mark_ready(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Current state
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Build the probe router
pub fn router(readiness: Readiness) -> Router {
    Router::new()
        .route("/readiness", get(readiness_probe))
        .route("/liveness", get(liveness_probe))
        .route("/startup", get(startup_probe))
        .with_state(readiness)
}

async fn readiness_probe(State(readiness): State<Readiness>) -> (StatusCode, &'static str) {
    if readiness.is_ready() {
        (StatusCode::OK, "Ready!")
    } else {
        (StatusCode::BAD_REQUEST, "Not ready!")
    }
}

async fn liveness_probe() -> &'static str {
    "Alive!"
}

async fn startup_probe() -> &'static str {
    "Started!"
}

/// Serve the probes on a bound listener
///
/// # Errors
///
/// Returns error if the accept loop fails
pub async fn serve(listener: TcpListener, readiness: Readiness) -> Result<(), ServerError> {
    axum::serve(listener, router(readiness))
        .await
        .map_err(|e| ServerError::Serve {
            listener: "probes",
            message: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use tower::ServiceExt;

    async fn probe(readiness: &Readiness, path: &str) -> (StatusCode, String) {
        let request = Request::builder().uri(path).body(Body::empty()).unwrap();
        let response = router(readiness.clone()).oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), 1024).await.unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_readiness_flips() {
        let readiness = Readiness::new();
        assert_eq!(
            probe(&readiness, "/readiness").await,
            (StatusCode::BAD_REQUEST, "Not ready!".to_string())
        );

        readiness.mark_ready();
        assert_eq!(
            probe(&readiness, "/readiness").await,
            (StatusCode::OK, "Ready!".to_string())
        );
        assert!(readiness.is_ready());
    }

    #[tokio::test]
    async fn test_liveness_and_startup() {
        let readiness = Readiness::new();
        assert_eq!(
            probe(&readiness, "/liveness").await,
            (StatusCode::OK, "Alive!".to_string())
        );
        assert_eq!(
            probe(&readiness, "/startup").await,
            (StatusCode::OK, "Started!".to_string())
        );
    }
}
