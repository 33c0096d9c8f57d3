//! Listener faults.
//!
//! Evaluation failures never show up here; they travel inside the response
//! envelope. These errors end a listener.

use std::net::SocketAddr;

/// Server error
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Listener could not bind its address
    #[error("{listener}: failed to listen on {addr}: {source}")]
    Bind {
        /// Listener name
        listener: &'static str,
        /// Requested address
        addr: SocketAddr,
        /// Underlying socket error
        #[source]
        source: std::io::Error,
    },

    /// Listener stopped serving
    #[error("{listener}: failed to serve: {message}")]
    Serve {
        /// Listener name
        listener: &'static str,
        /// Transport message
        message: String,
    },
}
