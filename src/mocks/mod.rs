//! Mock implementations for testing.
//!
//! Provides a scripted transport engine and bootstrap doubles for unit
//! testing without making real network calls.

use mockall::mock;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::errors::{TransportError, TransportResult};
use crate::global::EngineBootstrap;
use crate::transport::{ByteSink, EngineError, EngineErrorKind, TransferOptions, TransportEngine};

/// How a scripted transfer ends once its chunks are delivered.
#[derive(Debug, Clone)]
pub enum ScriptedOutcome {
    /// The transfer completes.
    Complete,
    /// The transfer fails with the given engine error.
    Fail(EngineError),
}

/// One scripted transfer.
#[derive(Debug, Clone)]
pub struct ScriptedTransfer {
    /// Response code reported after the transfer.
    pub status: Option<u16>,
    /// Body deliveries, in order.
    pub chunks: Vec<Vec<u8>>,
    /// How the transfer ends.
    pub outcome: ScriptedOutcome,
}

impl ScriptedTransfer {
    /// A successful 200 transfer delivering `chunks`.
    pub fn ok<I, C>(chunks: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: AsRef<[u8]>,
    {
        Self {
            status: Some(200),
            chunks: chunks.into_iter().map(|c| c.as_ref().to_vec()).collect(),
            outcome: ScriptedOutcome::Complete,
        }
    }

    /// An HTTP-level failure with a retrievable status.
    pub fn http_error(status: u16, reason: &str) -> Self {
        Self {
            status: Some(status),
            chunks: Vec::new(),
            outcome: ScriptedOutcome::Fail(EngineError::new(
                EngineErrorKind::HttpReturnedError,
                format!("The requested URL returned error: {} {}", status, reason),
            )),
        }
    }

    /// A transport failure with no response.
    pub fn failure(kind: EngineErrorKind, message: &str) -> Self {
        Self {
            status: None,
            chunks: Vec::new(),
            outcome: ScriptedOutcome::Fail(EngineError::new(kind, message)),
        }
    }

    /// Replaces the body deliveries made before the outcome.
    pub fn with_chunks<I, C>(mut self, chunks: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: AsRef<[u8]>,
    {
        self.chunks = chunks.into_iter().map(|c| c.as_ref().to_vec()).collect();
        self
    }

    /// Overrides the reported response code.
    pub fn with_status(mut self, status: Option<u16>) -> Self {
        self.status = status;
        self
    }
}

#[derive(Debug, Default)]
struct ScriptState {
    transfers: VecDeque<ScriptedTransfer>,
    recorded: Vec<TransferOptions>,
    response_code: Option<u16>,
}

/// Transport engine replaying queued transfers.
///
/// Clones share the script, so a test can keep one clone for inspection
/// after moving the other into a client.
#[derive(Debug, Clone, Default)]
pub struct ScriptedEngine {
    state: Arc<Mutex<ScriptState>>,
}

impl ScriptedEngine {
    /// Creates an engine with an empty script.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, ScriptState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queues a transfer.
    pub fn queue(&self, transfer: ScriptedTransfer) {
        self.lock().transfers.push_back(transfer);
    }

    /// Options of every transfer performed so far.
    pub fn recorded(&self) -> Vec<TransferOptions> {
        self.lock().recorded.clone()
    }

    /// Options of the last transfer performed.
    pub fn last_transfer(&self) -> Option<TransferOptions> {
        self.lock().recorded.last().cloned()
    }

    /// Number of transfers performed.
    pub fn transfer_count(&self) -> usize {
        self.lock().recorded.len()
    }
}

impl TransportEngine for ScriptedEngine {
    fn perform(
        &mut self,
        options: &TransferOptions,
        sink: &mut ByteSink<'_>,
    ) -> Result<(), EngineError> {
        let transfer = {
            let mut state = self.lock();
            state.recorded.push(options.clone());
            state.response_code = None;
            state.transfers.pop_front()
        };

        let transfer = transfer.ok_or_else(|| {
            EngineError::new(EngineErrorKind::Other, "No scripted transfer configured")
        })?;

        self.lock().response_code = transfer.status;

        for chunk in &transfer.chunks {
            if sink(chunk.as_slice()) != chunk.len() {
                return Err(EngineError::new(
                    EngineErrorKind::WriteAborted,
                    "Failed writing received data",
                ));
            }
        }

        match transfer.outcome {
            ScriptedOutcome::Complete => Ok(()),
            ScriptedOutcome::Fail(e) => Err(e),
        }
    }

    fn response_code(&self) -> Option<u16> {
        self.lock().response_code
    }
}

/// Bootstrap counting its invocations.
#[derive(Debug)]
pub struct CountingBootstrap {
    name: &'static str,
    fail: bool,
    bootstraps: AtomicUsize,
    releases: AtomicUsize,
}

impl CountingBootstrap {
    /// Creates a bootstrap that always succeeds.
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            fail: false,
            bootstraps: AtomicUsize::new(0),
            releases: AtomicUsize::new(0),
        }
    }

    /// Creates a bootstrap that always fails.
    pub fn failing(name: &'static str) -> Self {
        Self {
            fail: true,
            ..Self::new(name)
        }
    }

    /// Number of bootstrap calls.
    pub fn bootstrap_count(&self) -> usize {
        self.bootstraps.load(Ordering::SeqCst)
    }

    /// Number of release calls.
    pub fn release_count(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }
}

impl EngineBootstrap for CountingBootstrap {
    fn name(&self) -> &'static str {
        self.name
    }

    fn bootstrap(&self) -> TransportResult<()> {
        self.bootstraps.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            Err(TransportError::out_of_memory("Unable to init engine"))
        } else {
            Ok(())
        }
    }

    fn release(&self) {
        self.releases.fetch_add(1, Ordering::SeqCst);
    }
}

// Mockall-based mock for call expectations
mock! {
    pub EngineBootstrap {}

    impl EngineBootstrap for EngineBootstrap {
        fn name(&self) -> &'static str;
        fn bootstrap(&self) -> TransportResult<()>;
        fn release(&self);
    }
}
