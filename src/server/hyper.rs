//! hyper-backed embedded server
//!
//! The minimal backend: a raw accept loop serving descriptor routes and
//! static files, one `serve_connection` per accepted socket. Stop is
//! immediate (cancel and abort), there is no graceful-stop window.

use crate::config::descriptor::{resolve_descriptor, RouteSpec};
use crate::config::{ServerConfig, ServerConfigBuilder};
use crate::error::{ConfigResult, ServerError, ServerResult};
use crate::server::{EmbeddedServer, EnvScope, Hook, Running, ServerCore};
use crate::util::find_available_port;
use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Configuration for the hyper backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HyperConfig {
    common: ServerConfig,
    keep_alive: bool,
}

impl HyperConfig {
    /// Get a configuration builder.
    pub fn builder() -> HyperConfigBuilder {
        HyperConfigBuilder::default()
    }

    /// Common server configuration.
    pub fn common(&self) -> &ServerConfig {
        &self.common
    }

    /// Whether HTTP/1.1 keep-alive is honored.
    pub fn keep_alive(&self) -> bool {
        self.keep_alive
    }
}

impl Default for HyperConfig {
    fn default() -> Self {
        Self {
            common: ServerConfig::default(),
            keep_alive: true,
        }
    }
}

/// Builder for [`HyperConfig`] instances.
#[derive(Default)]
pub struct HyperConfigBuilder {
    common: ServerConfigBuilder,
    keep_alive: Option<bool>,
}

impl HyperConfigBuilder {
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

    /// See [`ServerConfigBuilder::descriptor`].
    pub fn descriptor(mut self, path: impl Into<PathBuf>) -> Self {
        self.common = self.common.descriptor(path);
        self
    }

    /// Enable or disable HTTP/1.1 keep-alive.
    pub fn keep_alive(mut self, keep_alive: bool) -> Self {
        self.keep_alive = Some(keep_alive);
        self
    }

    /// Validate the collected values and build the configuration.
    pub fn build(self) -> ConfigResult<HyperConfig> {
        Ok(HyperConfig {
            common: self.common.build()?,
            keep_alive: self.keep_alive.unwrap_or(true),
        })
    }
}

/// Request-handling state shared by all connections.
struct Shared {
    context: String,
    roots: Vec<PathBuf>,
    routes: Vec<RouteSpec>,
}

/// Embedded hyper server.
pub struct EmbeddedHyper {
    config: HyperConfig,
    core: ServerCore,
}

impl EmbeddedHyper {
    /// Create a stopped server from its configuration.
    pub fn new(config: HyperConfig) -> Self {
        let core = ServerCore::new(config.common().clone());
        Self { config, core }
    }

    /// Create a stopped server with the default configuration.
    pub fn with_defaults() -> Self {
        Self::new(HyperConfig::default())
    }

    /// Backend configuration.
    pub fn config(&self) -> &HyperConfig {
        &self.config
    }
}

#[async_trait]
impl EmbeddedServer for EmbeddedHyper {
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

        let config = self.core.config();
        let mut roots = vec![config.static_root().to_path_buf()];
        roots.extend(config.overlays().iter().cloned());
        let shared = Arc::new(Shared {
            context: config.path().to_string(),
            roots,
            routes: descriptor.map(|d| d.routes).unwrap_or_default(),
        });

        let configured_port = config.port();
        let port = if configured_port == 0 {
            0
        } else {
            match find_available_port("127.0.0.1", configured_port).await {
                Ok(port) => port,
                Err(err) => {
                    env.restore();
                    return Err(ServerError::Io(err));
                }
            }
        };
        let addr = SocketAddr::from(([127, 0, 0, 1], port));
        let listener = match TcpListener::bind(addr).await {
            Ok(listener) => listener,
            Err(source) => {
                env.restore();
                return Err(ServerError::Bind {
                    addr: addr.to_string(),
                    source,
                });
            }
        };
        let addr = listener.local_addr().map_err(ServerError::Io)?;

        let shutdown = CancellationToken::new();
        let keep_alive = self.config.keep_alive();
        let task = tokio::spawn({
            let shutdown = shutdown.clone();
            async move {
                loop {
                    let accepted = tokio::select! {
                        _ = shutdown.cancelled() => break,
                        accepted = listener.accept() => accepted,
                    };

                    let (stream, _peer) = match accepted {
                        Ok(accepted) => accepted,
                        Err(err) => {
                            warn!(error = %err, "failed to accept connection");
                            continue;
                        }
                    };

                    let shared = Arc::clone(&shared);
                    tokio::spawn(async move {
                        let service = service_fn(move |req: Request<Incoming>| {
                            let shared = Arc::clone(&shared);
                            async move {
                                Ok::<_, std::convert::Infallible>(handle(&shared, req).await)
                            }
                        });

                        if let Err(err) = http1::Builder::new()
                            .keep_alive(keep_alive)
                            .serve_connection(TokioIo::new(stream), service)
                            .await
                        {
                            debug!(error = %err, "connection ended with error");
                        }
                    });
                }
            }
        });

        self.core.mark_started(Running {
            addr,
            shutdown,
            task,
            env,
        });
        info!(addr = %addr, "embedded hyper server started");
        Ok(())
    }

    async fn stop(&self) -> ServerResult<()> {
        let _lifecycle = self.core.lifecycle().await;
        let Some(running) = self.core.take_running() else {
            return Ok(());
        };

        running.shutdown.cancel();
        let Running { task, env, .. } = running;
        if tokio::time::timeout(std::time::Duration::from_secs(1), task)
            .await
            .is_err()
        {
            warn!("accept loop did not exit in time");
        }

        self.core.run_after_stop();
        env.restore();
        info!("embedded hyper server stopped");
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

async fn handle(shared: &Shared, req: Request<Incoming>) -> Response<Full<Bytes>> {
    let path = req.uri().path().to_string();
    let method = req.method().as_str().to_string();

    // Canned routes win over static content.
    for spec in &shared.routes {
        let full = if shared.context == "/" {
            spec.path.clone()
        } else {
            format!("{}{}", shared.context.trim_end_matches('/'), spec.path)
        };
        if full == path && spec.method.verb() == method {
            return canned_response(spec);
        }
    }

    if method != "GET" && method != "HEAD" {
        return status_response(StatusCode::METHOD_NOT_ALLOWED);
    }

    let Some(relative) = strip_context(&shared.context, &path) else {
        return status_response(StatusCode::NOT_FOUND);
    };
    let Some(relative) = sanitize(&relative) else {
        return status_response(StatusCode::NOT_FOUND);
    };

    for root in &shared.roots {
        let candidate = root.join(&relative);
        match tokio::fs::read(&candidate).await {
            Ok(contents) => {
                return Response::builder()
                    .status(StatusCode::OK)
                    .header("Content-Type", content_type_for(&candidate))
                    .body(Full::new(Bytes::from(contents)))
                    .unwrap_or_else(|_| status_response(StatusCode::INTERNAL_SERVER_ERROR));
            }
            Err(_) => continue,
        }
    }

    status_response(StatusCode::NOT_FOUND)
}

fn canned_response(spec: &RouteSpec) -> Response<Full<Bytes>> {
    let status = StatusCode::from_u16(spec.status).unwrap_or(StatusCode::OK);
    let mut builder = Response::builder().status(status);
    if let Some(content_type) = &spec.content_type {
        builder = builder.header("Content-Type", content_type.as_str());
    }
    for (name, value) in &spec.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    builder
        .body(Full::new(Bytes::from(spec.body.clone())))
        .unwrap_or_else(|_| status_response(StatusCode::INTERNAL_SERVER_ERROR))
}

fn status_response(status: StatusCode) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::new()));
    *response.status_mut() = status;
    response
}

/// Strip the context path prefix; `None` when the request is outside it.
fn strip_context(context: &str, path: &str) -> Option<String> {
    let relative = if context == "/" {
        path.to_string()
    } else {
        let trimmed = context.trim_end_matches('/');
        match path.strip_prefix(trimmed) {
            Some(rest) if rest.is_empty() => "/".to_string(),
            Some(rest) if rest.starts_with('/') => rest.to_string(),
            _ => return None,
        }
    };

    let relative = relative.trim_start_matches('/');
    if relative.is_empty() || relative.ends_with('/') {
        Some(format!("{relative}index.html"))
    } else {
        Some(relative.to_string())
    }
}

/// Reject traversal outside the content roots.
fn sanitize(relative: &str) -> Option<PathBuf> {
    let path = Path::new(relative);
    if path
        .components()
        .all(|c| matches!(c, Component::Normal(_)))
    {
        Some(path.to_path_buf())
    } else {
        None
    }
}

fn content_type_for(path: &Path) -> &'static str {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("html") | Some("htm") => "text/html",
        Some("css") => "text/css",
        Some("js") => "application/javascript",
        Some("json") => "application/json",
        Some("xml") => "application/xml",
        Some("txt") => "text/plain",
        Some("svg") => "image/svg+xml",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("wasm") => "application/wasm",
        _ => "application/octet-stream",
    }
}
