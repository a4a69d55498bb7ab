//! Transport layer.
//!
//! Provides the byte-pump abstraction ([`TransportEngine`]), the reqwest
//! implementation, the per-request [`RequestHandle`] and the
//! [`ResponseAccumulator`] that assembles response bodies.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │  NetworkClient  │  - configuration, send/perform
//! └────────┬────────┘
//!          │ TransferOptions + byte sink
//!          ▼
//! ┌─────────────────┐
//! │ TransportEngine │  - blocking perform, response code
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │ reqwest         │  - actual HTTP implementation
//! └─────────────────┘
//! ```

mod accumulator;
mod engine;
mod handle;
mod http;

pub use accumulator::ResponseAccumulator;
pub use engine::{ByteSink, EngineError, EngineErrorKind, HttpMethod, TransferOptions, TransportEngine};
pub use handle::{RequestHandle, RequestStatus};
pub use http::{ReqwestBootstrap, ReqwestEngine, RECEIVE_CHUNK_SIZE};

pub(crate) use handle::TransferContext;
