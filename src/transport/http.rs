//! Transport engine implementation using reqwest.

use reqwest::blocking::Client;
use reqwest::header::USER_AGENT;
use std::io::{ErrorKind, Read};
use std::time::Duration;
use tracing::{debug, trace};
use url::Url;

use super::engine::{ByteSink, EngineError, EngineErrorKind, HttpMethod, TransferOptions, TransportEngine};
use crate::errors::TransportResult;
use crate::global::EngineBootstrap;

/// Size of the buffer handed to the byte sink per delivery.
pub const RECEIVE_CHUNK_SIZE: usize = 16 * 1024;

/// Blocking transport engine backed by `reqwest::blocking`.
///
/// The underlying client is built on first use and rebuilt whenever a
/// transfer asks for a different connect timeout. Redirects are not
/// followed.
#[derive(Default)]
pub struct ReqwestEngine {
    client: Option<(Option<Duration>, Client)>,
    response_code: Option<u16>,
}

impl ReqwestEngine {
    /// Creates a new engine.
    pub fn new() -> Self {
        Self::default()
    }

    fn client_for(&mut self, connect_timeout: Option<Duration>) -> Result<Client, EngineError> {
        if let Some((timeout, client)) = &self.client {
            if *timeout == connect_timeout {
                return Ok(client.clone());
            }
        }

        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(None::<Duration>)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| {
                EngineError::new(
                    EngineErrorKind::Other,
                    format!("Failed to create HTTP client: {}", e),
                )
            })?;

        self.client = Some((connect_timeout, client.clone()));
        Ok(client)
    }
}

impl TransportEngine for ReqwestEngine {
    fn perform(
        &mut self,
        options: &TransferOptions,
        sink: &mut ByteSink<'_>,
    ) -> Result<(), EngineError> {
        self.response_code = None;

        let url = Url::parse(&options.url).map_err(|e| {
            EngineError::new(
                EngineErrorKind::UrlMalformed,
                format!("URL using bad/illegal format: {}", e),
            )
        })?;

        let client = self.client_for(options.connect_timeout)?;

        let mut request = match options.method {
            HttpMethod::Get => client.get(url),
            HttpMethod::Post => client.post(url),
        };

        if let Some(agent) = &options.user_agent {
            request = request.header(USER_AGENT, agent.as_str());
        }

        if let Some(body) = &options.body {
            request = request.body(body.to_vec());
        }

        if let Some(timeout) = options.read_timeout {
            request = request.timeout(timeout);
        }

        let mut response = request.send().map_err(EngineError::from)?;

        let status = response.status();
        self.response_code = Some(status.as_u16());

        if options.fail_on_http_error && (status.is_client_error() || status.is_server_error()) {
            return Err(EngineError::new(
                EngineErrorKind::HttpReturnedError,
                format!("The requested URL returned error: {}", status),
            ));
        }

        let mut buf = vec![0u8; RECEIVE_CHUNK_SIZE];
        loop {
            let n = match response.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) if e.kind() == ErrorKind::TimedOut => {
                    return Err(EngineError::new(
                        EngineErrorKind::OperationTimedOut,
                        format!("Operation timed out: {}", e),
                    ))
                }
                Err(e) => {
                    return Err(EngineError::new(
                        EngineErrorKind::Other,
                        format!("Failure when receiving data from the peer: {}", e),
                    ))
                }
            };

            trace!(size = n, "Received data");
            if sink(&buf[..n]) != n {
                return Err(EngineError::new(
                    EngineErrorKind::WriteAborted,
                    "Failed writing received data",
                ));
            }
        }

        Ok(())
    }

    fn response_code(&self) -> Option<u16> {
        self.response_code
    }
}

impl std::fmt::Debug for ReqwestEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReqwestEngine")
            .field("connect_timeout", &self.client.as_ref().map(|(t, _)| t))
            .field("response_code", &self.response_code)
            .finish()
    }
}

/// Process bootstrap for [`ReqwestEngine`].
///
/// reqwest keeps no process-wide native state, so the bootstrap only
/// reports which TLS backend the engine was compiled with.
#[derive(Debug, Default, Clone, Copy)]
pub struct ReqwestBootstrap;

impl ReqwestBootstrap {
    /// Name of the TLS backend compiled in, if any.
    pub fn tls_backend() -> Option<&'static str> {
        if cfg!(feature = "rustls") {
            Some("rustls")
        } else if cfg!(feature = "native-tls") {
            Some("native-tls")
        } else {
            None
        }
    }
}

impl EngineBootstrap for ReqwestBootstrap {
    fn name(&self) -> &'static str {
        "reqwest"
    }

    fn bootstrap(&self) -> TransportResult<()> {
        match Self::tls_backend() {
            Some(backend) => debug!(tls = backend, "reqwest engine ready"),
            None => debug!("reqwest engine ready without TLS, https URLs will fail"),
        }
        Ok(())
    }

    fn release(&self) {
        debug!("reqwest engine released");
    }
}
