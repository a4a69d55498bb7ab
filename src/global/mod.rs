//! Process-wide engine environment.
//!
//! Some byte-pump engines need a one-time process bootstrap before any
//! instance can be created, and a matching release once the last instance is
//! gone. [`GlobalEnvironment`] counts acquisitions for one engine kind;
//! [`GlobalRegistry`] owns the environments and is the single serialization
//! point for their transitions. Clients hold a [`GlobalGuard`] for their
//! whole lifetime, which pairs every initialize with exactly one teardown.

use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};

use crate::errors::{TransportError, TransportResult};

/// One-time process bootstrap of a transport engine kind.
pub trait EngineBootstrap: Send + Sync {
    /// Name under which the environment is registered. Bootstraps sharing a
    /// name share one reference count.
    fn name(&self) -> &'static str;

    /// Performs the process-wide initialization.
    fn bootstrap(&self) -> TransportResult<()>;

    /// Releases everything `bootstrap` acquired.
    fn release(&self);
}

/// Reference-counted process state of one engine kind.
///
/// Not synchronized; mutate it only through [`GlobalRegistry`] or another
/// owner that serializes access.
pub struct GlobalEnvironment {
    bootstrap: Arc<dyn EngineBootstrap>,
    ref_count: usize,
}

impl GlobalEnvironment {
    /// Creates an environment with no acquisitions.
    pub fn new(bootstrap: Arc<dyn EngineBootstrap>) -> Self {
        Self {
            bootstrap,
            ref_count: 0,
        }
    }

    /// Acquires the environment, bootstrapping on the 0 -> 1 transition.
    ///
    /// A failed bootstrap leaves the count untouched.
    pub fn initialize(&mut self) -> TransportResult<()> {
        let next = self.ref_count.checked_add(1).ok_or_else(|| {
            TransportError::invalid_argument("global environment reference count overflow")
        })?;

        if self.ref_count == 0 {
            if let Err(e) = self.bootstrap.bootstrap() {
                warn!(engine = self.bootstrap.name(), error = %e, "Engine bootstrap failed");
                return Err(e);
            }
            debug!(engine = self.bootstrap.name(), "Engine bootstrapped");
        }

        self.ref_count = next;
        Ok(())
    }

    /// Releases one acquisition, running the engine release on the 1 -> 0
    /// transition. Rejected when nothing is held.
    pub fn teardown(&mut self) -> TransportResult<()> {
        match self.ref_count {
            0 => {
                warn!(
                    engine = self.bootstrap.name(),
                    "Teardown without a matching initialize"
                );
                Err(TransportError::invalid_argument(format!(
                    "global environment '{}' is not initialized",
                    self.bootstrap.name()
                )))
            }
            1 => {
                self.ref_count = 0;
                self.bootstrap.release();
                debug!(engine = self.bootstrap.name(), "Engine released");
                Ok(())
            }
            _ => {
                self.ref_count -= 1;
                Ok(())
            }
        }
    }

    /// Number of outstanding acquisitions.
    pub fn ref_count(&self) -> usize {
        self.ref_count
    }

    /// Returns true while at least one acquisition is outstanding.
    pub fn is_initialized(&self) -> bool {
        self.ref_count > 0
    }

    /// Name of the engine kind.
    pub fn name(&self) -> &'static str {
        self.bootstrap.name()
    }
}

impl std::fmt::Debug for GlobalEnvironment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GlobalEnvironment")
            .field("name", &self.bootstrap.name())
            .field("ref_count", &self.ref_count)
            .finish()
    }
}

static PROCESS_REGISTRY: Lazy<Arc<GlobalRegistry>> = Lazy::new(|| Arc::new(GlobalRegistry::new()));

/// Registry of global environments keyed by engine name.
///
/// All lifecycle transitions happen under one mutex.
#[derive(Debug, Default)]
pub struct GlobalRegistry {
    environments: Mutex<HashMap<String, GlobalEnvironment>>,
}

impl GlobalRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the registry shared by every client of this process.
    pub fn process() -> Arc<GlobalRegistry> {
        Arc::clone(&PROCESS_REGISTRY)
    }

    // The environments are plain counters; a panic while holding the lock
    // cannot leave them half-updated.
    fn lock(&self) -> MutexGuard<'_, HashMap<String, GlobalEnvironment>> {
        self.environments
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Acquires the environment for `bootstrap`, registering it on first
    /// use. The returned guard tears the acquisition down when dropped.
    pub fn acquire(
        self: &Arc<Self>,
        bootstrap: Arc<dyn EngineBootstrap>,
    ) -> TransportResult<GlobalGuard> {
        let name = bootstrap.name().to_string();
        if name.is_empty() {
            return Err(TransportError::invalid_argument(
                "engine bootstrap name cannot be empty",
            ));
        }

        let mut environments = self.lock();
        let environment = environments
            .entry(name.clone())
            .or_insert_with(|| GlobalEnvironment::new(bootstrap));

        if let Err(e) = environment.initialize() {
            if !environment.is_initialized() {
                environments.remove(&name);
            }
            return Err(e);
        }

        Ok(GlobalGuard {
            registry: Arc::clone(self),
            name,
            released: false,
        })
    }

    /// Outstanding acquisitions of the named environment.
    pub fn ref_count(&self, name: &str) -> usize {
        self.lock().get(name).map_or(0, GlobalEnvironment::ref_count)
    }

    // Released environments leave the map.
    fn teardown(&self, name: &str) -> TransportResult<()> {
        let mut environments = self.lock();
        let environment = environments.get_mut(name).ok_or_else(|| {
            TransportError::invalid_argument(format!(
                "global environment '{}' is not registered",
                name
            ))
        })?;

        environment.teardown()?;
        if !environment.is_initialized() {
            environments.remove(name);
        }
        Ok(())
    }
}

/// One acquisition of a global environment.
#[derive(Debug)]
pub struct GlobalGuard {
    registry: Arc<GlobalRegistry>,
    name: String,
    released: bool,
}

impl GlobalGuard {
    /// Name of the acquired environment.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Releases the acquisition now instead of on drop.
    pub fn release(mut self) -> TransportResult<()> {
        self.released = true;
        self.registry.teardown(&self.name)
    }
}

impl Drop for GlobalGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        if let Err(e) = self.registry.teardown(&self.name) {
            warn!(engine = %self.name, error = %e, "Global environment teardown failed");
        }
    }
}
