//! Engine readiness: a single shared initialization future.
//!
//! Every caller awaits the same future, so initialization runs once no matter
//! how many renders are waiting on it. The observable state is kept next to
//! the future so it can be queried without polling.

use crate::{Error, Result};
use futures::future::{BoxFuture, FutureExt, Shared};
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

/// Lifecycle of the engine initialization
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadinessState {
    /// Initialization has been scheduled but nothing has polled it yet
    Uninitialized,
    /// The initialization future is running
    Initializing,
    /// The engine accepted initialization; renders may proceed
    Ready,
    /// Initialization failed; renders report this message
    Failed(String),
}

type InitFuture = Shared<BoxFuture<'static, std::result::Result<(), String>>>;

/// Cloneable handle on the shared initialization.
#[derive(Clone)]
pub struct Readiness {
    init: InitFuture,
    state: Arc<Mutex<ReadinessState>>,
}

impl Readiness {
    /// Wrap an engine's `initialize` future.
    ///
    /// The future is lazy: it starts on the first [`Readiness::wait`] (or
    /// when [`Readiness::spawn`] drives it in the background).
    pub fn begin<F>(initialize: F) -> Self
    where
        F: Future<Output = Result<()>> + Send + 'static,
    {
        let state = Arc::new(Mutex::new(ReadinessState::Uninitialized));
        let tracked = Arc::clone(&state);

        let init = async move {
            set_state(&tracked, ReadinessState::Initializing);
            log::debug!("engine initialization started");
            match initialize.await {
                Ok(()) => {
                    set_state(&tracked, ReadinessState::Ready);
                    log::info!("engine loaded");
                    Ok(())
                }
                Err(e) => {
                    let msg = match e {
                        Error::InitializationError(msg) => msg,
                        other => other.to_string(),
                    };
                    log::warn!("engine initialization failed: {}", msg);
                    set_state(&tracked, ReadinessState::Failed(msg.clone()));
                    Err(msg)
                }
            }
        }
        .boxed()
        .shared();

        Self { init, state }
    }

    /// Readiness that has already settled successfully.
    pub fn ready() -> Self {
        Self::begin(async { Ok(()) })
    }

    /// Drive the initialization on the current tokio runtime without
    /// waiting for it.
    pub fn spawn(&self) {
        let init = self.init.clone();
        tokio::spawn(async move {
            let _ = init.await;
        });
    }

    /// Current lifecycle state
    pub fn state(&self) -> ReadinessState {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_ready(&self) -> bool {
        self.state() == ReadinessState::Ready
    }

    /// Suspend until initialization settles.
    pub async fn wait(&self) -> Result<()> {
        self.init.clone().await.map_err(Error::InitializationError)
    }
}

impl std::fmt::Debug for Readiness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Readiness")
            .field("state", &self.state())
            .finish()
    }
}

fn set_state(state: &Mutex<ReadinessState>, next: ReadinessState) {
    *state.lock().unwrap_or_else(PoisonError::into_inner) = next;
}
