//! Per-request state.

use bytes::Bytes;
use tracing::trace;

use super::accumulator::ResponseAccumulator;
use super::engine::TransferOptions;
use crate::errors::ErrorCode;

/// Outcome of a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestStatus {
    /// Prepared, not executed yet.
    Pending,
    /// Transfer completed; the response holds the body.
    Success,
    /// The server answered with an HTTP error status. Not a transport error.
    HttpStatus(u16),
    /// Transfer failed below the HTTP level.
    NetworkError(String),
    /// The response could not be accumulated.
    OutOfMemory,
}

impl RequestStatus {
    /// Returns true once the request has executed, successfully or not.
    pub fn is_complete(&self) -> bool {
        !matches!(self, RequestStatus::Pending)
    }

    /// Error code of the outcome. `HttpStatus` counts as `Ok`.
    pub fn code(&self) -> ErrorCode {
        match self {
            RequestStatus::Pending | RequestStatus::Success | RequestStatus::HttpStatus(_) => {
                ErrorCode::Ok
            }
            RequestStatus::NetworkError(_) => ErrorCode::NetworkError,
            RequestStatus::OutOfMemory => ErrorCode::OutOfMemory,
        }
    }
}

/// Working state of one transfer. Lives in the handle until execution takes
/// it; dropping it releases the URL copy and any partially received body.
#[derive(Debug)]
pub(crate) struct TransferContext {
    pub(crate) options: TransferOptions,
    pub(crate) accumulator: ResponseAccumulator,
}

impl TransferContext {
    pub(crate) fn new(options: TransferOptions, max_response_len: usize) -> Self {
        Self {
            options,
            accumulator: ResponseAccumulator::with_limit(max_response_len),
        }
    }
}

impl Drop for TransferContext {
    fn drop(&mut self) {
        trace!(
            url = %self.options.url,
            discarded = self.accumulator.len(),
            "Transfer context released"
        );
    }
}

/// State and result of one request/response exchange.
#[derive(Debug)]
pub struct RequestHandle {
    url: String,
    request: Option<Bytes>,
    context: Option<TransferContext>,
    response: Option<Vec<u8>>,
    status: RequestStatus,
}

impl RequestHandle {
    pub(crate) fn new(request: Option<Bytes>, context: TransferContext) -> Self {
        Self {
            url: context.options.url.clone(),
            request,
            context: Some(context),
            response: None,
            status: RequestStatus::Pending,
        }
    }

    /// Target URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Request bytes, `None` for a bodyless request.
    pub fn request(&self) -> Option<&[u8]> {
        self.request.as_deref()
    }

    /// Response bytes, available after a successful or HTTP-status outcome.
    pub fn response(&self) -> Option<&[u8]> {
        self.response.as_deref()
    }

    /// Moves the response out of the handle.
    pub fn take_response(&mut self) -> Option<Vec<u8>> {
        self.response.take()
    }

    /// HTTP status of an HTTP-level failure, `None` otherwise.
    pub fn http_status(&self) -> Option<u16> {
        match self.status {
            RequestStatus::HttpStatus(code) => Some(code),
            _ => None,
        }
    }

    /// Current status.
    pub fn status(&self) -> &RequestStatus {
        &self.status
    }

    /// Returns true once the request has executed.
    pub fn is_complete(&self) -> bool {
        self.status.is_complete()
    }

    /// Options the transfer runs with, `None` after execution.
    pub fn transfer_options(&self) -> Option<&TransferOptions> {
        self.context.as_ref().map(|ctx| &ctx.options)
    }

    pub(crate) fn take_context(&mut self) -> Option<TransferContext> {
        self.context.take()
    }

    pub(crate) fn complete(&mut self, status: RequestStatus, response: Option<Vec<u8>>) {
        self.status = status;
        self.response = response;
    }
}
