//! Test lifecycle glue
//!
//! Two styles, mirroring the two ways tests consume the crate:
//!
//! - [`ServerGuard`] is fixture-style: hold it for the duration of the test
//!   and the server stops when the guard goes away, including on panic.
//! - [`with_server`] / [`with_client`] are rule-style: run an async test
//!   body between start and an unconditional stop, so teardown happens even
//!   when the body fails.

use crate::client::{HttpClient, ReqwestClient};
use crate::error::Result;
use crate::server::EmbeddedServer;
use std::future::Future;
use std::sync::Arc;
use tracing::warn;

/// Starts a server on creation and stops it when dropped.
///
/// Dropping the guard stops the server best-effort on the current tokio
/// runtime; prefer the explicit [`stop`](ServerGuard::stop) when the test
/// can await a clean shutdown.
pub struct ServerGuard {
    server: Arc<dyn EmbeddedServer>,
}

impl ServerGuard {
    /// Start `server` and return a guard bound to it.
    pub async fn start<S: EmbeddedServer + 'static>(server: S) -> Result<Self> {
        let server: Arc<dyn EmbeddedServer> = Arc::new(server);
        server.start().await?;
        Ok(Self { server })
    }

    /// The running server.
    pub fn server(&self) -> &dyn EmbeddedServer {
        self.server.as_ref()
    }

    /// A shareable handle to the running server.
    pub fn handle(&self) -> Arc<dyn EmbeddedServer> {
        Arc::clone(&self.server)
    }

    /// Base URL of the running server.
    pub fn url(&self) -> String {
        self.server.url()
    }

    /// Bound port of the running server.
    pub fn port(&self) -> u16 {
        self.server.port()
    }

    /// A default client bound to the running server.
    pub fn client(&self) -> Result<ReqwestClient> {
        Ok(ReqwestClient::new(self.server.as_ref())?)
    }

    /// Stop the server explicitly and consume the guard.
    pub async fn stop(self) -> Result<()> {
        self.server.stop().await?;
        Ok(())
    }
}

impl Drop for ServerGuard {
    fn drop(&mut self) {
        if !self.server.is_started() {
            return;
        }

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let server = Arc::clone(&self.server);
                handle.spawn(async move {
                    if let Err(err) = server.stop().await {
                        warn!(error = %err, "server stop failed while dropping guard");
                    }
                });
            }
            Err(_) => {
                warn!("server guard dropped outside a runtime; server not stopped");
            }
        }
    }
}

/// Start `server`, run the test body, stop the server afterwards.
///
/// The stop runs whether or not the body succeeds; a stop failure is logged
/// rather than masking a body failure. Panics in the body are covered by the
/// internal guard's drop.
pub async fn with_server<S, F, Fut, T>(server: S, test: F) -> Result<T>
where
    S: EmbeddedServer + 'static,
    F: FnOnce(Arc<dyn EmbeddedServer>) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let guard = ServerGuard::start(server).await?;
    let outcome = test(guard.handle()).await;
    let teardown = guard.stop().await;

    match outcome {
        Ok(value) => {
            teardown?;
            Ok(value)
        }
        Err(err) => {
            if let Err(stop_err) = teardown {
                warn!(error = %stop_err, "server stop failed during teardown");
            }
            Err(err)
        }
    }
}

/// Like [`with_server`], additionally injecting a default client that is
/// destroyed after the body runs.
pub async fn with_client<S, F, Fut, T>(server: S, test: F) -> Result<T>
where
    S: EmbeddedServer + 'static,
    F: FnOnce(Arc<dyn EmbeddedServer>, ReqwestClient) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    with_server(server, |server| async move {
        let client = ReqwestClient::new(server.as_ref())?;
        let outcome = test(server, client.clone()).await;
        client.destroy();
        outcome
    })
    .await
}
