//! Verdict Server
//!
//! Thin transport adapters around the evaluation orchestrator: a gRPC
//! service, a REST endpoint and the health probes. Each listener runs its
//! own accept loop; the first listener fault stops the server.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod grpc;
pub mod probes;
pub mod rest;
pub mod server;

pub use config::{ConfigError, ServerConfig, parse_duration};
pub use error::ServerError;
pub use grpc::GrpcApi;
pub use probes::Readiness;
pub use server::{Server, evaluate_blocking};
