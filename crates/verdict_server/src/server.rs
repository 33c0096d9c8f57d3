//! Listener supervisor.

use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::probes::Readiness;
use crate::{grpc, probes, rest};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use verdict_core::{EvaluationRequest, EvaluationResponse};
use verdict_runtime::Evaluator;

/// Run the orchestrator off the async reactor.
///
/// The engine call is synchronous and may be CPU heavy. A panicking or
/// cancelled evaluation task still produces a failure envelope.
pub async fn evaluate_blocking(
    evaluator: Arc<Evaluator>,
    request: EvaluationRequest,
) -> EvaluationResponse {
    match tokio::task::spawn_blocking(move || evaluator.evaluate(&request)).await {
        Ok(response) => response,
        Err(err) => {
            tracing::error!(error = %err, "evaluation task failed");
            EvaluationResponse::failure(format!("evaluation task failed: {err}"))
        }
    }
}

/// Bind a TCP listener, tagging failures with the listener name
pub(crate) async fn bind(listener: &'static str, addr: SocketAddr) -> Result<TcpListener, ServerError> {
    TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind {
            listener,
            addr,
            source,
        })
}

/// The gRPC, REST and probe listeners sharing one evaluator
pub struct Server {
    config: ServerConfig,
    evaluator: Arc<Evaluator>,
    readiness: Readiness,
}

impl Server {
    /// Create a server with a fresh Rego evaluator
    #[must_use]
    pub fn new(config: ServerConfig) -> Self {
        let evaluator = Arc::new(Evaluator::rego(config.cache_capacity));
        Self::with_evaluator(config, evaluator)
    }

    /// Create a server around an existing evaluator
    #[must_use]
    pub fn with_evaluator(config: ServerConfig, evaluator: Arc<Evaluator>) -> Self {
        Self {
            config,
            evaluator,
            readiness: Readiness::new(),
        }
    }

    /// Readiness flag reported by the probe listener
    #[must_use]
    pub fn readiness(&self) -> Readiness {
        self.readiness.clone()
    }

    /// Bind all listeners and serve until one of them fails
    ///
    /// # Errors
    ///
    /// Returns the first bind failure or listener fault
    pub async fn run(self) -> Result<(), ServerError> {
        let probes_listener = bind("probes", self.config.probes_addr()).await?;
        let grpc_listener = bind("grpc", self.config.grpc_addr()).await?;
        let rest_listener = bind("rest", self.config.rest_addr()).await?;

        tracing::info!(addr = %self.config.probes_addr(), "probes listening");
        tracing::info!(addr = %self.config.grpc_addr(), "grpc listening");
        tracing::info!(addr = %self.config.rest_addr(), "rest listening");
        tracing::info!(
            max_message_size = self.config.max_message_size,
            connection_timeout = ?self.config.connection_timeout,
            cache_capacity = self.config.cache_capacity,
            "server configured"
        );

        self.readiness.mark_ready();

        tokio::try_join!(
            probes::serve(probes_listener, self.readiness.clone()),
            grpc::serve(grpc_listener, Arc::clone(&self.evaluator), &self.config),
            rest::serve(rest_listener, Arc::clone(&self.evaluator), &self.config),
        )?;

        Ok(())
    }
}
