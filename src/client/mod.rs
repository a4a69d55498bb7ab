//! Network client.
//!
//! Owns one transport engine and the global environment acquisition that
//! engine needs, prepares [`RequestHandle`]s and executes them.

use bytes::Bytes;
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::config::{validate_url, ClientConfig, ClientConfigBuilder};
use crate::errors::{TransportError, TransportResult};
use crate::global::{EngineBootstrap, GlobalGuard, GlobalRegistry};
use crate::transport::{
    ReqwestBootstrap, ReqwestEngine, RequestHandle, RequestStatus, TransferContext,
    TransferOptions, TransportEngine,
};

/// Blocking HTTP client for signing and verification requests.
///
/// # Example
///
/// ```rust,no_run
/// use integrations_timestamp_transport::NetworkClient;
///
/// fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let mut client = NetworkClient::builder()
///         .agent_name("my-signer/1.0")
///         .build()?;
///
///     let mut handle = client.send("https://tsa.example.com/sign", Some(b"request".to_vec().into()))?;
///     client.perform(&mut handle)?;
///
///     if let Some(status) = handle.http_status() {
///         eprintln!("HTTP {}", status);
///     }
///     Ok(())
/// }
/// ```
pub struct NetworkClient {
    config: ClientConfig,
    engine: Box<dyn TransportEngine>,
    // Declared after `engine` so the engine is gone before the environment
    // is torn down.
    global: GlobalGuard,
}

impl NetworkClient {
    /// Creates a new client builder.
    pub fn builder() -> NetworkClientBuilder {
        NetworkClientBuilder::new()
    }

    /// Creates a reqwest-backed client from a configuration.
    pub fn new(config: ClientConfig) -> TransportResult<Self> {
        NetworkClientBuilder::from_config(config).build()
    }

    /// Creates a client from environment variables.
    ///
    /// See [`ClientConfig::from_env`].
    pub fn from_env() -> TransportResult<Self> {
        Self::new(ClientConfig::from_env()?)
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Name of the global environment this client holds.
    pub fn engine_name(&self) -> &str {
        self.global.name()
    }

    /// Replaces agent string and timeouts. Applies to handles prepared
    /// afterwards.
    pub fn configure(
        &mut self,
        agent_name: Option<&str>,
        connect_timeout_secs: u64,
        read_timeout_secs: u64,
    ) -> TransportResult<()> {
        if matches!(agent_name, Some(agent) if agent.is_empty()) {
            return Err(TransportError::invalid_argument("Agent name cannot be empty"));
        }

        self.config.agent_name = agent_name.map(str::to_string);
        self.config.connect_timeout_secs = connect_timeout_secs;
        self.config.read_timeout_secs = read_timeout_secs;
        Ok(())
    }

    /// Prepares a request to `url`. A present `request` is POSTed, otherwise
    /// the request is a bodyless GET. No I/O happens until
    /// [`perform`](Self::perform).
    pub fn send(&self, url: &str, request: Option<Bytes>) -> TransportResult<RequestHandle> {
        validate_url(url)?;

        let mut owned_url = String::new();
        owned_url.try_reserve_exact(url.len())?;
        owned_url.push_str(url);

        debug!(url = %owned_url, body_len = request.as_ref().map_or(0, Bytes::len), "Sending request");

        let mut options = TransferOptions::new(owned_url)
            .with_timeouts(self.config.connect_timeout(), self.config.read_timeout());
        options.fail_on_http_error = self.config.fail_on_http_error;
        if let Some(agent) = &self.config.agent_name {
            options = options.with_user_agent(agent.as_str());
        }
        if let Some(body) = &request {
            options = options.with_body(body.clone());
        }

        let context = TransferContext::new(options, self.config.max_response_len);
        Ok(RequestHandle::new(request, context))
    }

    /// Prepares a request to the configured default endpoint.
    pub fn send_default(&self, request: Option<Bytes>) -> TransportResult<RequestHandle> {
        let url = self
            .config
            .url_template
            .as_deref()
            .ok_or_else(|| TransportError::invalid_argument("No default URL configured"))?;
        self.send(url, request)
    }

    /// Executes a prepared request, blocking until it completes.
    ///
    /// An HTTP error status is recorded on the handle and returns `Ok`; every
    /// other engine failure is returned as [`TransportError::Network`]. A
    /// handle can be performed once.
    #[instrument(skip(self, handle), fields(url = %handle.url()))]
    pub fn perform(&mut self, handle: &mut RequestHandle) -> TransportResult<()> {
        let mut context = handle.take_context().ok_or_else(|| {
            TransportError::invalid_argument("Request handle has already been performed")
        })?;

        let mut accumulation_error: Option<TransportError> = None;
        let result = {
            let TransferContext {
                options,
                accumulator,
            } = &mut context;

            self.engine.perform(options, &mut |chunk: &[u8]| {
                debug!(size = chunk.len(), "Receive data");
                match accumulator.append(chunk) {
                    Ok(()) => chunk.len(),
                    Err(e) => {
                        accumulation_error = Some(e);
                        0
                    }
                }
            })
        };

        if let Some(e) = accumulation_error {
            handle.complete(RequestStatus::OutOfMemory, None);
            return Err(e);
        }

        match result {
            Ok(()) => {
                let response = context.accumulator.take();
                debug!(len = response.len(), "Transfer complete");
                handle.complete(RequestStatus::Success, Some(response));
                Ok(())
            }
            Err(e) => match self.engine.response_code().filter(|_| e.is_http_error()) {
                Some(status) => {
                    debug!(status, error = %e, "Received HTTP error code");
                    let response = context.accumulator.take();
                    handle.complete(RequestStatus::HttpStatus(status), Some(response));
                    Ok(())
                }
                None => {
                    debug!(kind = ?e.kind, error = %e, "Transfer failed");
                    handle.complete(RequestStatus::NetworkError(e.message.clone()), None);
                    Err(TransportError::network(e.message))
                }
            },
        }
    }

    /// Prepares and executes a request in one call.
    pub fn exchange(&mut self, url: &str, request: Option<Bytes>) -> TransportResult<RequestHandle> {
        let mut handle = self.send(url, request)?;
        self.perform(&mut handle)?;
        Ok(handle)
    }
}

impl std::fmt::Debug for NetworkClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetworkClient")
            .field("config", &self.config)
            .field("engine", &self.global.name())
            .finish()
    }
}

/// Builder for the network client.
pub struct NetworkClientBuilder {
    config_builder: ClientConfigBuilder,
    engine: Option<(Box<dyn TransportEngine>, Arc<dyn EngineBootstrap>)>,
    registry: Option<Arc<GlobalRegistry>>,
}

impl NetworkClientBuilder {
    /// Creates a new client builder.
    pub fn new() -> Self {
        Self {
            config_builder: ClientConfigBuilder::new(),
            engine: None,
            registry: None,
        }
    }

    /// Creates a builder from an existing configuration.
    pub fn from_config(config: ClientConfig) -> Self {
        let mut config_builder = ClientConfigBuilder::new()
            .connect_timeout_secs(config.connect_timeout_secs)
            .read_timeout_secs(config.read_timeout_secs)
            .fail_on_http_error(config.fail_on_http_error)
            .max_response_len(config.max_response_len);
        config_builder = match config.agent_name {
            Some(agent) => config_builder.agent_name(agent),
            None => config_builder.no_agent_name(),
        };
        if let Some(url) = config.url_template {
            config_builder = config_builder.url_template(url);
        }

        Self {
            config_builder,
            engine: None,
            registry: None,
        }
    }

    /// Sets the user agent.
    pub fn agent_name(mut self, agent_name: impl Into<String>) -> Self {
        self.config_builder = self.config_builder.agent_name(agent_name);
        self
    }

    /// Sends no user agent of our own.
    pub fn no_agent_name(mut self) -> Self {
        self.config_builder = self.config_builder.no_agent_name();
        self
    }

    /// Sets the connect timeout in seconds.
    pub fn connect_timeout_secs(mut self, secs: u64) -> Self {
        self.config_builder = self.config_builder.connect_timeout_secs(secs);
        self
    }

    /// Sets the read timeout in seconds.
    pub fn read_timeout_secs(mut self, secs: u64) -> Self {
        self.config_builder = self.config_builder.read_timeout_secs(secs);
        self
    }

    /// Sets the default endpoint.
    pub fn url_template(mut self, url: impl Into<String>) -> Self {
        self.config_builder = self.config_builder.url_template(url);
        self
    }

    /// Controls whether HTTP status >= 400 is reported as an HTTP failure.
    pub fn fail_on_http_error(mut self, enabled: bool) -> Self {
        self.config_builder = self.config_builder.fail_on_http_error(enabled);
        self
    }

    /// Sets the response size limit.
    pub fn max_response_len(mut self, len: usize) -> Self {
        self.config_builder = self.config_builder.max_response_len(len);
        self
    }

    /// Uses a custom engine together with its process bootstrap.
    pub fn engine(
        mut self,
        engine: impl TransportEngine + 'static,
        bootstrap: Arc<dyn EngineBootstrap>,
    ) -> Self {
        self.engine = Some((Box::new(engine), bootstrap));
        self
    }

    /// Uses a private global registry instead of the process one.
    pub fn registry(mut self, registry: Arc<GlobalRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Builds the client, acquiring the engine's global environment.
    pub fn build(self) -> TransportResult<NetworkClient> {
        let config = self.config_builder.build()?;

        let (engine, bootstrap) = match self.engine {
            Some(pair) => pair,
            None => (
                Box::new(ReqwestEngine::new()) as Box<dyn TransportEngine>,
                Arc::new(ReqwestBootstrap) as Arc<dyn EngineBootstrap>,
            ),
        };

        let registry = self.registry.unwrap_or_else(GlobalRegistry::process);
        let global = registry.acquire(bootstrap)?;

        Ok(NetworkClient {
            config,
            engine,
            global,
        })
    }
}

impl Default for NetworkClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorCode;
    use crate::mocks::{CountingBootstrap, ScriptedEngine, ScriptedTransfer};
    use crate::transport::{EngineErrorKind, HttpMethod};
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    fn scripted_client() -> (NetworkClient, ScriptedEngine, Arc<CountingBootstrap>) {
        let engine = ScriptedEngine::new();
        let bootstrap = Arc::new(CountingBootstrap::new("scripted"));
        let client = NetworkClient::builder()
            .agent_name("test-agent")
            .connect_timeout_secs(5)
            .read_timeout_secs(10)
            .engine(engine.clone(), bootstrap.clone())
            .registry(Arc::new(GlobalRegistry::new()))
            .build()
            .unwrap();
        (client, engine, bootstrap)
    }

    #[test]
    fn test_send_performs_no_io() {
        let (client, engine, _) = scripted_client();

        let handle = client.send("https://example/test", None).unwrap();

        assert_eq!(engine.transfer_count(), 0);
        assert!(!handle.is_complete());
        assert!(handle.response().is_none());
    }

    #[test]
    fn test_send_rejects_empty_url() {
        let (client, _, _) = scripted_client();

        let err = client.send("", None).unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidArgument);
    }

    #[test]
    fn test_bodyless_request_is_get() {
        let (mut client, engine, _) = scripted_client();
        engine.queue(ScriptedTransfer::ok(Vec::<Vec<u8>>::new()));

        client.exchange("https://example/test", None).unwrap();

        let options = engine.last_transfer().unwrap();
        assert_eq!(options.method, HttpMethod::Get);
        assert!(options.body.is_none());
    }

    #[test]
    fn test_transfer_options_follow_config() {
        let (mut client, engine, _) = scripted_client();
        engine.queue(ScriptedTransfer::ok(["ok"]));

        client
            .exchange("https://example/test", Some(Bytes::from_static(b"abc")))
            .unwrap();

        let options = engine.last_transfer().unwrap();
        assert_eq!(options.url, "https://example/test");
        assert_eq!(options.method, HttpMethod::Post);
        assert_eq!(options.body, Some(Bytes::from_static(b"abc")));
        assert_eq!(options.user_agent.as_deref(), Some("test-agent"));
        assert!(options.no_signal);
        assert!(options.no_progress);
        assert_eq!(options.connect_timeout, Some(Duration::from_secs(5)));
        assert_eq!(options.read_timeout, Some(Duration::from_secs(10)));
    }

    #[test]
    fn test_empty_response() {
        let (mut client, engine, _) = scripted_client();
        engine.queue(ScriptedTransfer::ok(Vec::<Vec<u8>>::new()));

        let handle = client.exchange("https://example/test", None).unwrap();

        assert_eq!(handle.response(), Some(&b""[..]));
        assert_eq!(handle.http_status(), None);
        assert_eq!(handle.status(), &RequestStatus::Success);
    }

    #[test]
    fn test_partial_deliveries_are_concatenated() {
        let (mut client, engine, _) = scripted_client();
        engine.queue(ScriptedTransfer::ok(["XY", "Z"]));

        let handle = client
            .exchange("https://example/test", Some(Bytes::from_static(b"abc")))
            .unwrap();

        assert_eq!(handle.response(), Some(&b"XYZ"[..]));
        assert_eq!(handle.request(), Some(&b"abc"[..]));
    }

    #[test]
    fn test_http_status_is_not_fatal() {
        let (mut client, engine, _) = scripted_client();
        engine.queue(ScriptedTransfer::http_error(503, "Service Unavailable"));

        let handle = client.exchange("https://example/test", None).unwrap();

        assert_eq!(handle.http_status(), Some(503));
        assert_eq!(handle.status().code(), ErrorCode::Ok);
    }

    #[test]
    fn test_http_error_keeps_delivered_bytes() {
        let (mut client, engine, _) = scripted_client();
        engine.queue(ScriptedTransfer::http_error(503, "Service Unavailable").with_chunks(["err"]));

        let handle = client.exchange("https://example/test", None).unwrap();

        assert_eq!(handle.http_status(), Some(503));
        assert_eq!(handle.response(), Some(&b"err"[..]));
    }

    #[test]
    fn test_http_error_without_status_is_fatal() {
        let (mut client, engine, _) = scripted_client();
        engine.queue(ScriptedTransfer::http_error(503, "Service Unavailable").with_status(None));

        let mut handle = client.send("https://example/test", None).unwrap();
        let err = client.perform(&mut handle).unwrap_err();

        assert_eq!(err.code(), ErrorCode::NetworkError);
        assert!(matches!(handle.status(), RequestStatus::NetworkError(_)));
    }

    #[test]
    fn test_connection_failure_is_network_error() {
        let (mut client, engine, _) = scripted_client();
        engine.queue(ScriptedTransfer::failure(
            EngineErrorKind::CouldNotResolveHost,
            "Could not resolve host: example",
        ));

        let mut handle = client.send("https://example/test", None).unwrap();
        let err = client.perform(&mut handle).unwrap_err();

        assert_eq!(err.code(), ErrorCode::NetworkError);
        assert_eq!(err.diagnostic(), Some("Could not resolve host: example"));
        assert!(handle.response().is_none());
        assert_eq!(handle.http_status(), None);
        assert_eq!(
            handle.status(),
            &RequestStatus::NetworkError("Could not resolve host: example".to_string())
        );
    }

    #[test]
    fn test_oversized_response_fails_cleanly() {
        let engine = ScriptedEngine::new();
        let mut client = NetworkClient::builder()
            .max_response_len(4)
            .engine(engine.clone(), Arc::new(CountingBootstrap::new("scripted")))
            .registry(Arc::new(GlobalRegistry::new()))
            .build()
            .unwrap();
        engine.queue(ScriptedTransfer::ok(["abc", "de"]));

        let mut handle = client.send("https://example/test", None).unwrap();
        let err = client.perform(&mut handle).unwrap_err();

        assert_eq!(err.code(), ErrorCode::OutOfMemory);
        assert_eq!(handle.status(), &RequestStatus::OutOfMemory);
        assert!(handle.response().is_none());
    }

    #[test]
    fn test_handle_cannot_be_performed_twice() {
        let (mut client, engine, _) = scripted_client();
        engine.queue(ScriptedTransfer::ok(["first"]));
        engine.queue(ScriptedTransfer::ok(["second"]));

        let mut handle = client.send("https://example/test", None).unwrap();
        client.perform(&mut handle).unwrap();

        let err = client.perform(&mut handle).unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidArgument);
        assert_eq!(handle.response(), Some(&b"first"[..]));
        assert_eq!(engine.transfer_count(), 1);
    }

    #[test]
    fn test_configure_applies_to_new_handles() {
        let (mut client, _, _) = scripted_client();

        client.configure(None, 0, 60).unwrap();
        let handle = client.send("https://example/test", None).unwrap();
        let options = handle.transfer_options().unwrap();

        assert_eq!(options.user_agent, None);
        assert_eq!(options.connect_timeout, None);
        assert_eq!(options.read_timeout, Some(Duration::from_secs(60)));
    }

    #[test]
    fn test_configure_rejects_empty_agent() {
        let (mut client, _, _) = scripted_client();

        assert!(client.configure(Some(""), 1, 1).is_err());
        assert_eq!(client.config().agent_name.as_deref(), Some("test-agent"));
    }

    #[test]
    fn test_send_default_uses_url_template() {
        let engine = ScriptedEngine::new();
        let client = NetworkClient::builder()
            .url_template("https://tsa.example.com/sign")
            .engine(engine, Arc::new(CountingBootstrap::new("scripted")))
            .registry(Arc::new(GlobalRegistry::new()))
            .build()
            .unwrap();

        let handle = client.send_default(None).unwrap();
        assert_eq!(handle.url(), "https://tsa.example.com/sign");
    }

    #[test]
    fn test_send_default_without_template() {
        let (client, _, _) = scripted_client();
        assert!(client.send_default(None).is_err());
    }

    #[test]
    fn test_clients_share_global_environment() {
        let registry = Arc::new(GlobalRegistry::new());
        let bootstrap = Arc::new(CountingBootstrap::new("scripted"));

        let build = || {
            NetworkClient::builder()
                .engine(ScriptedEngine::new(), bootstrap.clone())
                .registry(Arc::clone(&registry))
                .build()
                .unwrap()
        };

        let first = build();
        let second = build();
        assert_eq!(first.engine_name(), "scripted");
        assert_eq!(registry.ref_count("scripted"), 2);
        assert_eq!(bootstrap.bootstrap_count(), 1);

        drop(first);
        assert_eq!(bootstrap.release_count(), 0);
        drop(second);
        assert_eq!(bootstrap.release_count(), 1);
        assert_eq!(registry.ref_count("scripted"), 0);
    }

    #[test]
    fn test_failed_bootstrap_fails_build() {
        let registry = Arc::new(GlobalRegistry::new());
        let result = NetworkClient::builder()
            .engine(
                ScriptedEngine::new(),
                Arc::new(CountingBootstrap::failing("scripted")),
            )
            .registry(Arc::clone(&registry))
            .build();

        assert_eq!(result.unwrap_err().code(), ErrorCode::OutOfMemory);
        assert_eq!(registry.ref_count("scripted"), 0);
    }

    #[test]
    fn test_from_config_round_trips_settings() {
        let config = ClientConfig::builder()
            .no_agent_name()
            .connect_timeout_secs(2)
            .read_timeout_secs(3)
            .url_template("https://tsa.example.com/sign")
            .build()
            .unwrap();

        let client = NetworkClientBuilder::from_config(config.clone())
            .engine(ScriptedEngine::new(), Arc::new(CountingBootstrap::new("scripted")))
            .registry(Arc::new(GlobalRegistry::new()))
            .build()
            .unwrap();

        assert_eq!(client.config(), &config);
    }
}
