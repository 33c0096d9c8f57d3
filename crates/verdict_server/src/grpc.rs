//! gRPC adapter.
//!
//! Serves the unary `OPA.Api/Execute` method. Evaluation failures are
//! returned as `OK` with `success = false`; gRPC status codes are reserved
//! for transport faults.

use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::server::evaluate_blocking;
use pb::api_server::{Api, ApiServer};
use pb::{ApiRequest, ApiResult};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::{Request, Response, Status};
use verdict_core::{EvaluationRequest, EvaluationResponse};
use verdict_runtime::Evaluator;

/// Protobuf messages and service plumbing for package `OPA`.
///
/// ```proto
/// service Api {
///   rpc Execute (ApiRequest) returns (ApiResult) {}
/// }
/// ```
pub mod pb {
    /// Evaluation request
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct ApiRequest {
        /// Policy module sources
        #[prost(string, repeated, tag = "1")]
        pub packages: ::prost::alloc::vec::Vec<::prost::alloc::string::String>,
        /// Inline JSON data document
        #[prost(string, tag = "2")]
        pub data: ::prost::alloc::string::String,
        /// JSON input document
        #[prost(string, tag = "3")]
        pub input: ::prost::alloc::string::String,
        /// Query expression
        #[prost(string, tag = "4")]
        pub query: ::prost::alloc::string::String,
        /// Result path expression
        #[prost(string, tag = "5")]
        pub result_path: ::prost::alloc::string::String,
        /// Cache opt-in
        #[prost(bool, tag = "6")]
        pub is_cache: bool,
    }

    /// Evaluation response
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct ApiResult {
        /// Whether evaluation succeeded
        #[prost(bool, tag = "1")]
        pub success: bool,
        /// JSON result or extracted text
        #[prost(string, tag = "2")]
        pub result: ::prost::alloc::string::String,
        /// Failure message
        #[prost(string, tag = "3")]
        pub error: ::prost::alloc::string::String,
    }

    /// Server side of `OPA.Api`
    pub mod api_server {
        #![allow(missing_docs)]
        use tonic::codegen::*;

        #[async_trait]
        pub trait Api: std::marker::Send + std::marker::Sync + 'static {
            async fn execute(
                &self,
                request: tonic::Request<super::ApiRequest>,
            ) -> std::result::Result<tonic::Response<super::ApiResult>, tonic::Status>;
        }

        #[derive(Debug)]
        pub struct ApiServer<T> {
            inner: Arc<T>,
            accept_compression_encodings: EnabledCompressionEncodings,
            send_compression_encodings: EnabledCompressionEncodings,
            max_decoding_message_size: Option<usize>,
            max_encoding_message_size: Option<usize>,
        }

        impl<T> ApiServer<T> {
            pub fn new(inner: T) -> Self {
                Self::from_arc(Arc::new(inner))
            }

            pub fn from_arc(inner: Arc<T>) -> Self {
                Self {
                    inner,
                    accept_compression_encodings: Default::default(),
                    send_compression_encodings: Default::default(),
                    max_decoding_message_size: None,
                    max_encoding_message_size: None,
                }
            }

            #[must_use]
            pub fn max_decoding_message_size(mut self, limit: usize) -> Self {
                self.max_decoding_message_size = Some(limit);
                self
            }

            #[must_use]
            pub fn max_encoding_message_size(mut self, limit: usize) -> Self {
                self.max_encoding_message_size = Some(limit);
                self
            }
        }

        impl<T, B> tonic::codegen::Service<http::Request<B>> for ApiServer<T>
        where
            T: Api,
            B: Body + std::marker::Send + 'static,
            B::Error: Into<StdError> + std::marker::Send + 'static,
        {
            type Response = http::Response<tonic::body::BoxBody>;
            type Error = std::convert::Infallible;
            type Future = BoxFuture<Self::Response, Self::Error>;

            fn poll_ready(
                &mut self,
                _cx: &mut Context<'_>,
            ) -> Poll<std::result::Result<(), Self::Error>> {
                Poll::Ready(Ok(()))
            }

            fn call(&mut self, req: http::Request<B>) -> Self::Future {
                match req.uri().path() {
                    "/OPA.Api/Execute" => {
                        struct ExecuteSvc<T: Api>(pub Arc<T>);
                        impl<T: Api> tonic::server::UnaryService<super::ApiRequest> for ExecuteSvc<T> {
                            type Response = super::ApiResult;
                            type Future = BoxFuture<tonic::Response<Self::Response>, tonic::Status>;

                            fn call(
                                &mut self,
                                request: tonic::Request<super::ApiRequest>,
                            ) -> Self::Future {
                                let inner = Arc::clone(&self.0);
                                let fut = async move { <T as Api>::execute(&inner, request).await };
                                Box::pin(fut)
                            }
                        }

                        let accept_compression_encodings = self.accept_compression_encodings;
                        let send_compression_encodings = self.send_compression_encodings;
                        let max_decoding_message_size = self.max_decoding_message_size;
                        let max_encoding_message_size = self.max_encoding_message_size;
                        let inner = self.inner.clone();
                        let fut = async move {
                            let method = ExecuteSvc(inner);
                            let codec = tonic::codec::ProstCodec::default();
                            let mut grpc = tonic::server::Grpc::new(codec)
                                .apply_compression_config(
                                    accept_compression_encodings,
                                    send_compression_encodings,
                                )
                                .apply_max_message_size_config(
                                    max_decoding_message_size,
                                    max_encoding_message_size,
                                );
                            let res = grpc.unary(method, req).await;
                            Ok(res)
                        };
                        Box::pin(fut)
                    }
                    _ => Box::pin(async move {
                        let mut response = http::Response::new(empty_body());
                        let headers = response.headers_mut();
                        headers.insert(
                            tonic::Status::GRPC_STATUS,
                            (tonic::Code::Unimplemented as i32).into(),
                        );
                        headers.insert(
                            http::header::CONTENT_TYPE,
                            tonic::metadata::GRPC_CONTENT_TYPE,
                        );
                        Ok(response)
                    }),
                }
            }
        }

        impl<T> Clone for ApiServer<T> {
            fn clone(&self) -> Self {
                Self {
                    inner: self.inner.clone(),
                    accept_compression_encodings: self.accept_compression_encodings,
                    send_compression_encodings: self.send_compression_encodings,
                    max_decoding_message_size: self.max_decoding_message_size,
                    max_encoding_message_size: self.max_encoding_message_size,
                }
            }
        }

        pub const SERVICE_NAME: &str = "OPA.Api";

        impl<T> tonic::server::NamedService for ApiServer<T> {
            const NAME: &'static str = SERVICE_NAME;
        }
    }
}

impl From<ApiRequest> for EvaluationRequest {
    fn from(request: ApiRequest) -> Self {
        EvaluationRequest::from_wire(
            request.query,
            request.packages,
            request.data,
            request.input,
            request.result_path,
            request.is_cache,
        )
    }
}

impl From<EvaluationResponse> for ApiResult {
    fn from(response: EvaluationResponse) -> Self {
        ApiResult {
            success: response.success,
            result: response.result,
            error: response.error,
        }
    }
}

/// gRPC service backed by the shared evaluator
#[derive(Clone)]
pub struct GrpcApi {
    evaluator: Arc<Evaluator>,
}

impl GrpcApi {
    /// Create a service around an evaluator
    #[must_use]
    pub fn new(evaluator: Arc<Evaluator>) -> Self {
        Self { evaluator }
    }
}

#[async_trait::async_trait]
impl Api for GrpcApi {
    async fn execute(&self, request: Request<ApiRequest>) -> Result<Response<ApiResult>, Status> {
        let request = EvaluationRequest::from(request.into_inner());
        let response = evaluate_blocking(Arc::clone(&self.evaluator), request).await;
        Ok(Response::new(response.into()))
    }
}

/// Serve the gRPC service on a bound listener
///
/// # Errors
///
/// Returns error if the transport fails
pub async fn serve(
    listener: TcpListener,
    evaluator: Arc<Evaluator>,
    config: &ServerConfig,
) -> Result<(), ServerError> {
    let service = ApiServer::new(GrpcApi::new(evaluator))
        .max_decoding_message_size(config.max_message_size)
        .max_encoding_message_size(config.max_message_size);

    tonic::transport::Server::builder()
        .timeout(config.connection_timeout)
        .add_service(service)
        .serve_with_incoming(TcpListenerStream::new(listener))
        .await
        .map_err(|e| ServerError::Serve {
            listener: "grpc",
            message: e.to_string(),
        })
}
