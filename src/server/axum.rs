//! axum-backed embedded server
//!
//! The full-featured backend: descriptor routes, static content served
//! across the configured roots, request tracing and a graceful stop bounded
//! by a configurable timeout.

use crate::client::HttpMethod;
use crate::config::descriptor::{resolve_descriptor, RouteDescriptor, RouteSpec};
use crate::config::{ServerConfig, ServerConfigBuilder};
use crate::error::{ConfigError, ConfigResult, ServerError, ServerResult};
use crate::server::{EmbeddedServer, EnvScope, Hook, Running, ServerCore};
use crate::util::find_available_port;
use async_trait::async_trait;
use axum::body::Body;
use axum::extract::Request;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{on, MethodFilter, MethodRouter};
use axum::Router;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower::util::ServiceExt;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

/// Default graceful stop timeout.
pub const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration for the axum backend.
///
/// Composes the common [`ServerConfig`] with the backend-specific settings:
/// the graceful stop timeout, whether a ctrl-c should stop the server, and
/// an optional base directory replacing the static root as the primary
/// content root.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AxumConfig {
    common: ServerConfig,
    stop_timeout: Duration,
    stop_at_shutdown: bool,
    base_dir: Option<PathBuf>,
}

impl AxumConfig {
    /// Get a configuration builder.
    pub fn builder() -> AxumConfigBuilder {
        AxumConfigBuilder::default()
    }

    /// Common server configuration.
    pub fn common(&self) -> &ServerConfig {
        &self.common
    }

    /// Graceful stop timeout; the serve task is aborted once it passes.
    pub fn stop_timeout(&self) -> Duration {
        self.stop_timeout
    }

    /// Whether a ctrl-c stops the server while it runs.
    pub fn stop_at_shutdown(&self) -> bool {
        self.stop_at_shutdown
    }

    /// Primary content root override.
    pub fn base_dir(&self) -> Option<&std::path::Path> {
        self.base_dir.as_deref()
    }
}

impl Default for AxumConfig {
    fn default() -> Self {
        Self {
            common: ServerConfig::default(),
            stop_timeout: DEFAULT_STOP_TIMEOUT,
            stop_at_shutdown: true,
            base_dir: None,
        }
    }
}

/// Builder for [`AxumConfig`] instances. Re-exposes the common setters so a
/// test configures everything in one chain.
#[derive(Default)]
pub struct AxumConfigBuilder {
    common: ServerConfigBuilder,
    stop_timeout: Option<Duration>,
    stop_at_shutdown: Option<bool>,
    base_dir: Option<PathBuf>,
}

impl AxumConfigBuilder {
    /// See [`ServerConfigBuilder::path`].
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.common = self.common.path(path);
        self
    }

    /// See [`ServerConfigBuilder::static_root`].
    pub fn static_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.common = self.common.static_root(root);
        self
    }

    /// See [`ServerConfigBuilder::overlay`].
    pub fn overlay(mut self, root: impl Into<PathBuf>) -> Self {
        self.common = self.common.overlay(root);
        self
    }

    /// See [`ServerConfigBuilder::port`].
    pub fn port(mut self, port: u16) -> Self {
        self.common = self.common.port(port);
        self
    }

    /// See [`ServerConfigBuilder::env`].
    pub fn env(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.common = self.common.env(name, value);
        self
    }

    /// See [`ServerConfigBuilder::hook`].
    pub fn hook(mut self, hook: impl Hook + 'static) -> Self {
        self.common = self.common.hook(hook);
        self
    }

    /// See [`ServerConfigBuilder::hook_arc`].
    pub fn hook_arc(mut self, hook: Arc<dyn Hook>) -> Self {
        self.common = self.common.hook_arc(hook);
        self
    }

    /// See [`ServerConfigBuilder::descriptor`].
    pub fn descriptor(mut self, path: impl Into<PathBuf>) -> Self {
        self.common = self.common.descriptor(path);
        self
    }

    /// Set the graceful stop timeout. Must be non-zero.
    pub fn stop_timeout(mut self, timeout: Duration) -> Self {
        self.stop_timeout = Some(timeout);
        self
    }

    /// Enable or disable stopping the server on ctrl-c.
    pub fn stop_at_shutdown(mut self, enabled: bool) -> Self {
        self.stop_at_shutdown = Some(enabled);
        self
    }

    /// Replace the static root as the primary content root.
    pub fn base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(dir.into());
        self
    }

    /// Validate the collected values and build the configuration.
    pub fn build(self) -> ConfigResult<AxumConfig> {
        let stop_timeout = self.stop_timeout.unwrap_or(DEFAULT_STOP_TIMEOUT);
        if stop_timeout.is_zero() {
            return Err(ConfigError::invalid("stop timeout must be positive"));
        }

        Ok(AxumConfig {
            common: self.common.build()?,
            stop_timeout,
            stop_at_shutdown: self.stop_at_shutdown.unwrap_or(true),
            base_dir: self.base_dir,
        })
    }
}

/// Embedded axum server.
pub struct EmbeddedAxum {
    config: AxumConfig,
    core: ServerCore,
}

impl EmbeddedAxum {
    /// Create a stopped server from its configuration.
    pub fn new(config: AxumConfig) -> Self {
        let core = ServerCore::new(config.common().clone());
        Self { config, core }
    }

    /// Create a stopped server with the default configuration.
    pub fn with_defaults() -> Self {
        Self::new(AxumConfig::default())
    }

    /// Backend configuration.
    pub fn config(&self) -> &AxumConfig {
        &self.config
    }

    fn content_roots(&self) -> Vec<PathBuf> {
        let primary = self
            .config
            .base_dir()
            .map(PathBuf::from)
            .unwrap_or_else(|| self.core.config().static_root().to_path_buf());
        let mut roots = vec![primary];
        roots.extend(self.core.config().overlays().iter().cloned());
        roots
    }

    fn build_router(&self, descriptor: Option<RouteDescriptor>) -> Router {
        let mut app = Router::new();

        if let Some(descriptor) = descriptor {
            for spec in descriptor.routes {
                let path = spec.path.clone();
                app = app.route(&path, canned_route(spec));
            }
        }

        let roots = Arc::new(self.content_roots());
        app = app.fallback(move |req: Request| {
            let roots = Arc::clone(&roots);
            async move { serve_from_roots(&roots, req).await }
        });

        let context = self.core.config().path();
        let app = if context == "/" {
            app
        } else {
            Router::new().nest(context.trim_end_matches('/'), app)
        };

        app.layer(TraceLayer::new_for_http())
    }
}

#[async_trait]
impl EmbeddedServer for EmbeddedAxum {
    async fn start(&self) -> ServerResult<()> {
        let _lifecycle = self.core.lifecycle().await;
        if self.core.is_started() {
            return Ok(());
        }

        let env = EnvScope::apply(self.core.config().env());
        self.core.run_before_start();

        let descriptor = match resolve_descriptor(self.core.config()) {
            Ok(descriptor) => descriptor,
            Err(err) => {
                env.restore();
                return Err(ServerError::Config(err));
            }
        };
        let router = self.build_router(descriptor);

        let listener = match bind_listener(self.core.config().port()).await {
            Ok(listener) => listener,
            Err(err) => {
                env.restore();
                return Err(err);
            }
        };
        let addr = listener.local_addr().map_err(ServerError::Io)?;

        let shutdown = CancellationToken::new();
        let serve = axum::serve(listener, router).with_graceful_shutdown({
            let shutdown = shutdown.clone();
            async move { shutdown.cancelled().await }
        });
        let task = tokio::spawn(async move {
            if let Err(err) = serve.await {
                error!(error = %err, "embedded axum server terminated abnormally");
            }
        });

        if self.config.stop_at_shutdown() {
            let shutdown = shutdown.clone();
            tokio::spawn(async move {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => shutdown.cancel(),
                    _ = shutdown.cancelled() => {}
                }
            });
        }

        self.core.mark_started(Running {
            addr,
            shutdown,
            task,
            env,
        });
        info!(addr = %addr, "embedded axum server started");
        Ok(())
    }

    async fn stop(&self) -> ServerResult<()> {
        let _lifecycle = self.core.lifecycle().await;
        let Some(running) = self.core.take_running() else {
            return Ok(());
        };

        running.shutdown.cancel();
        let Running { mut task, env, .. } = running;
        match tokio::time::timeout(self.config.stop_timeout(), &mut task).await {
            Ok(joined) => {
                if let Err(err) = joined {
                    if !err.is_cancelled() {
                        warn!(error = %err, "serve task ended abnormally during stop");
                    }
                }
            }
            Err(_) => {
                warn!("graceful stop timed out, aborting serve task");
                task.abort();
            }
        }

        self.core.run_after_stop();
        env.restore();
        info!("embedded axum server stopped");
        Ok(())
    }

    fn is_started(&self) -> bool {
        self.core.is_started()
    }

    fn port(&self) -> u16 {
        self.core.port()
    }

    fn path(&self) -> &str {
        self.core.config().path()
    }

    fn url(&self) -> String {
        self.core.url()
    }
}

async fn bind_listener(configured_port: u16) -> ServerResult<TcpListener> {
    let port = if configured_port == 0 {
        0
    } else {
        find_available_port("127.0.0.1", configured_port)
            .await
            .map_err(ServerError::Io)?
    };

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    TcpListener::bind(addr).await.map_err(|source| ServerError::Bind {
        addr: addr.to_string(),
        source,
    })
}

fn canned_route(spec: RouteSpec) -> MethodRouter {
    let filter = method_filter(spec.method);
    let spec = Arc::new(spec);
    on(filter, move || {
        let spec = Arc::clone(&spec);
        async move { canned_response(&spec) }
    })
}

fn method_filter(method: HttpMethod) -> MethodFilter {
    match method {
        HttpMethod::Get => MethodFilter::GET,
        HttpMethod::Post => MethodFilter::POST,
        HttpMethod::Put => MethodFilter::PUT,
        HttpMethod::Delete => MethodFilter::DELETE,
        HttpMethod::Patch => MethodFilter::PATCH,
        HttpMethod::Head => MethodFilter::HEAD,
    }
}

fn canned_response(spec: &RouteSpec) -> Response {
    let status = StatusCode::from_u16(spec.status).unwrap_or(StatusCode::OK);
    let mut builder = Response::builder().status(status);
    if let Some(content_type) = &spec.content_type {
        builder = builder.header(header::CONTENT_TYPE, content_type.as_str());
    }
    for (name, value) in &spec.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    builder
        .body(Body::from(spec.body.clone()))
        .unwrap_or_else(|err| {
            warn!(error = %err, path = %spec.path, "invalid canned response");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        })
}

/// Try each content root in order; first non-404 wins.
async fn serve_from_roots(roots: &[PathBuf], req: Request) -> Response {
    let (parts, _body) = req.into_parts();

    for root in roots {
        let attempt = Request::from_parts(parts.clone(), Body::empty());
        let served = match ServeDir::new(root).oneshot(attempt).await {
            Ok(response) => response,
            Err(err) => match err {},
        };
        if served.status() != StatusCode::NOT_FOUND {
            return served.map(Body::new);
        }
    }

    StatusCode::NOT_FOUND.into_response()
}
