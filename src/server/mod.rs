//! Embedded servers
//!
//! [`EmbeddedServer`] is the lifecycle contract shared by both backends:
//! start before the test, stop after it, report the bound address in
//! between. The backends delegate everything HTTP to their underlying
//! libraries: [`axum`](crate::server::axum) for the full-featured backend,
//! raw [`hyper`](crate::server::hyper) for the minimal one.

pub mod axum;
pub mod hyper;

use crate::config::ServerConfig;
use crate::error::ServerResult;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Lifecycle hook, invoked by the server adapter around the server's
/// lifetime. Implementations must be thread safe; hooks are side-effecting
/// only and run in the order they were registered.
pub trait Hook: Send + Sync {
    /// Runs before the listener is bound.
    fn before_start(&self) {}

    /// Runs after the server has shut down.
    fn after_stop(&self) {}
}

/// Hook built from a pair of closures.
pub struct FnHook<B, A> {
    before: B,
    after: A,
}

impl<B, A> FnHook<B, A>
where
    B: Fn() + Send + Sync,
    A: Fn() + Send + Sync,
{
    pub fn new(before: B, after: A) -> Self {
        Self { before, after }
    }
}

impl<B, A> Hook for FnHook<B, A>
where
    B: Fn() + Send + Sync,
    A: Fn() + Send + Sync,
{
    fn before_start(&self) {
        (self.before)();
    }

    fn after_stop(&self) {
        (self.after)();
    }
}

/// An embedded server bound into the test lifecycle.
///
/// `start` on a started server and `stop` on a stopped server are no-ops, so
/// repeated lifecycle calls from fixtures and guards are always safe.
#[async_trait]
pub trait EmbeddedServer: Send + Sync {
    /// Start the server: apply environment variables, run `before_start`
    /// hooks, bind the listener and serve in a background task.
    async fn start(&self) -> ServerResult<()>;

    /// Stop the server and undo everything `start` did, in reverse order.
    async fn stop(&self) -> ServerResult<()>;

    /// Whether the server is currently running.
    fn is_started(&self) -> bool;

    /// Bound port while running, configured port otherwise.
    fn port(&self) -> u16;

    /// Context path the application is mounted under.
    fn path(&self) -> &str;

    /// Base URL of the running application, e.g. `http://127.0.0.1:49321/`.
    fn url(&self) -> String;
}

/// Runtime state of a started server.
pub(crate) struct Running {
    pub(crate) addr: SocketAddr,
    pub(crate) shutdown: CancellationToken,
    pub(crate) task: JoinHandle<()>,
    pub(crate) env: EnvScope,
}

/// State and behavior shared by the server backends: the common
/// configuration, the started/stopped state and the hook/environment
/// plumbing around it.
pub(crate) struct ServerCore {
    config: ServerConfig,
    // Serializes start/stop; the inner mutex is never held across an await.
    lifecycle: tokio::sync::Mutex<()>,
    state: Mutex<Option<Running>>,
}

impl ServerCore {
    pub(crate) fn new(config: ServerConfig) -> Self {
        Self {
            config,
            lifecycle: tokio::sync::Mutex::new(()),
            state: Mutex::new(None),
        }
    }

    pub(crate) fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub(crate) async fn lifecycle(&self) -> tokio::sync::MutexGuard<'_, ()> {
        self.lifecycle.lock().await
    }

    pub(crate) fn is_started(&self) -> bool {
        self.state.lock().expect("lock poisoned").is_some()
    }

    pub(crate) fn mark_started(&self, running: Running) {
        *self.state.lock().expect("lock poisoned") = Some(running);
    }

    pub(crate) fn take_running(&self) -> Option<Running> {
        self.state.lock().expect("lock poisoned").take()
    }

    pub(crate) fn port(&self) -> u16 {
        self.state
            .lock()
            .expect("lock poisoned")
            .as_ref()
            .map(|running| running.addr.port())
            .unwrap_or(self.config.port())
    }

    pub(crate) fn url(&self) -> String {
        let path = self.config.path();
        let suffix = if path == "/" { "/" } else { path };
        format!("http://127.0.0.1:{}{}", self.port(), suffix)
    }

    pub(crate) fn run_before_start(&self) {
        for hook in self.config.hooks() {
            hook.before_start();
        }
    }

    pub(crate) fn run_after_stop(&self) {
        for hook in self.config.hooks() {
            hook.after_stop();
        }
    }
}

/// Environment variables applied for a server's lifetime.
///
/// Captures the previous values on apply and puts them back on restore, so a
/// test run leaves the process environment the way it found it.
pub(crate) struct EnvScope {
    saved: Vec<(String, Option<String>)>,
}

impl EnvScope {
    pub(crate) fn apply(vars: &BTreeMap<String, String>) -> Self {
        let mut saved = Vec::with_capacity(vars.len());
        for (name, value) in vars {
            saved.push((name.clone(), std::env::var(name).ok()));
            debug!(name = %name, "setting environment variable");
            // SAFETY: env mutation is process-global; tests that configure
            // env vars are expected to run serially (see serial_test usage).
            unsafe { std::env::set_var(name, value) };
        }
        Self { saved }
    }

    pub(crate) fn restore(self) {
        for (name, previous) in self.saved {
            match previous {
                // SAFETY: same constraint as in `apply`.
                Some(value) => unsafe { std::env::set_var(&name, value) },
                None => unsafe { std::env::remove_var(&name) },
            }
        }
    }
}
