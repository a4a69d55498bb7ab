//! Transport engine abstraction.

use bytes::Bytes;
use std::time::Duration;

/// HTTP method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    /// GET request (no body).
    Get,
    /// POST request.
    Post,
}

/// Options applied to the engine for one transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferOptions {
    /// Target URL.
    pub url: String,
    /// HTTP method.
    pub method: HttpMethod,
    /// Request body, only for POST.
    pub body: Option<Bytes>,
    /// User agent header.
    pub user_agent: Option<String>,
    /// Never use signals for timeouts or name resolution. Engines without
    /// signal-based timeouts may ignore it.
    pub no_signal: bool,
    /// Never report progress. Engines without progress reporting may ignore
    /// it.
    pub no_progress: bool,
    /// Connect timeout, `None` for no limit.
    pub connect_timeout: Option<Duration>,
    /// Whole-transfer timeout, `None` for no limit.
    pub read_timeout: Option<Duration>,
    /// Treat HTTP status >= 400 as an HTTP-level failure.
    pub fail_on_http_error: bool,
}

impl TransferOptions {
    /// Creates options for a bodyless GET with no timeouts.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: HttpMethod::Get,
            body: None,
            user_agent: None,
            no_signal: true,
            no_progress: true,
            connect_timeout: None,
            read_timeout: None,
            fail_on_http_error: true,
        }
    }

    /// Turns the transfer into a POST carrying `body`.
    pub fn with_body(mut self, body: Bytes) -> Self {
        self.method = HttpMethod::Post;
        self.body = Some(body);
        self
    }

    /// Sets the user agent.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Sets the connect and read timeouts.
    pub fn with_timeouts(mut self, connect: Option<Duration>, read: Option<Duration>) -> Self {
        self.connect_timeout = connect;
        self.read_timeout = read;
        self
    }

    /// Length of the request body.
    pub fn body_len(&self) -> usize {
        self.body.as_ref().map_or(0, Bytes::len)
    }
}

/// Failure classes reported by an engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineErrorKind {
    /// The server answered with an HTTP error status.
    HttpReturnedError,
    /// The URL could not be parsed.
    UrlMalformed,
    /// Host name resolution failed.
    CouldNotResolveHost,
    /// The connection could not be established.
    CouldNotConnect,
    /// Connect or read timeout expired.
    OperationTimedOut,
    /// The byte sink refused a delivery.
    WriteAborted,
    /// TLS handshake or certificate failure.
    Tls,
    /// Anything else.
    Other,
}

/// Error reported by an engine when a transfer does not complete.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct EngineError {
    /// Failure class.
    pub kind: EngineErrorKind,
    /// Diagnostic text.
    pub message: String,
}

impl EngineError {
    /// Creates an engine error.
    pub fn new(kind: EngineErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Returns true if the server answered with an HTTP error status.
    pub fn is_http_error(&self) -> bool {
        self.kind == EngineErrorKind::HttpReturnedError
    }
}

impl From<reqwest::Error> for EngineError {
    fn from(err: reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            EngineErrorKind::OperationTimedOut
        } else if err.is_connect() {
            if is_resolution_failure(&error_chain(&err)) {
                EngineErrorKind::CouldNotResolveHost
            } else {
                EngineErrorKind::CouldNotConnect
            }
        } else if err.is_builder() {
            EngineErrorKind::UrlMalformed
        } else {
            EngineErrorKind::Other
        };
        EngineError::new(kind, error_chain(&err))
    }
}

fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

// hyper does not expose a typed resolver error, so look at the cause text.
fn is_resolution_failure(chain: &str) -> bool {
    let chain = chain.to_ascii_lowercase();
    chain.contains("dns error")
        || chain.contains("failed to lookup address")
        || chain.contains("name or service not known")
        || chain.contains("no such host")
}

/// Receives the response body of a transfer. Returns the number of bytes it
/// accepted; anything short of the delivered length aborts the transfer.
pub type ByteSink<'a> = dyn FnMut(&[u8]) -> usize + 'a;

/// A synchronous byte-pump.
///
/// Each engine value is owned by exactly one client and is never shared
/// between threads while a transfer runs.
pub trait TransportEngine: Send {
    /// Performs one blocking transfer, pushing body bytes into `sink` as they
    /// arrive.
    fn perform(&mut self, options: &TransferOptions, sink: &mut ByteSink<'_>)
        -> Result<(), EngineError>;

    /// Status code of the last response received, if any.
    fn response_code(&self) -> Option<u16>;
}
