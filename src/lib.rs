//! Timestamp Transport
//!
//! A pluggable, blocking HTTP transport used by timestamping and signing
//! service clients to ship encoded requests to a remote server and collect
//! the raw response bytes. The byte pump itself sits behind the
//! [`TransportEngine`] trait; a reqwest-backed engine is provided.
//!
//! # Features
//!
//! - **Request handles**: one [`RequestHandle`] per exchange, owning the
//!   request bytes, the per-call transfer context and the final status
//! - **Response accumulation**: overflow-checked assembly of bodies of unknown
//!   length from partial deliveries
//! - **Global environment**: reference-counted process-wide engine bootstrap
//!   shared by every client of the same engine kind
//! - **One result space**: HTTP status failures are reported as data, network
//!   and allocation failures as [`TransportError`]
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use integrations_timestamp_transport::NetworkClient;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut client = NetworkClient::builder()
//!         .agent_name("my-signer/1.0")
//!         .connect_timeout_secs(5)
//!         .read_timeout_secs(10)
//!         .build()?;
//!
//!     let handle = client.exchange("https://tsa.example.com/sign", Some(b"request".to_vec().into()))?;
//!
//!     match handle.http_status() {
//!         Some(status) => eprintln!("server answered with HTTP {}", status),
//!         None => println!("{} response bytes", handle.response().map_or(0, |r| r.len())),
//!     }
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]

pub mod client;
pub mod config;
pub mod errors;
pub mod global;
pub mod observability;
pub mod transport;

// Re-exports for convenience
pub use client::{NetworkClient, NetworkClientBuilder};
pub use config::{ClientConfig, ClientConfigBuilder};
pub use errors::{ErrorCode, TransportError, TransportResult};
pub use global::{EngineBootstrap, GlobalEnvironment, GlobalGuard, GlobalRegistry};
pub use observability::{LogFormat, LogLevel, LoggingConfig};
pub use transport::{
    ByteSink, EngineError, EngineErrorKind, HttpMethod, ReqwestBootstrap, ReqwestEngine,
    RequestHandle, RequestStatus, ResponseAccumulator, TransferOptions, TransportEngine,
    RECEIVE_CHUNK_SIZE,
};

/// Mock implementations for testing.
#[cfg(any(test, feature = "mocks"))]
pub mod mocks;
