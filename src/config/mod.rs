//! Server configuration
//!
//! [`ServerConfig`] is the immutable value object shared by every server
//! backend: context path, content roots, port, environment variables applied
//! around the server lifetime, lifecycle hooks and the optional route
//! descriptor override. Backend-specific settings live next to the backend
//! that consumes them (see [`crate::server::axum::AxumConfig`] and
//! [`crate::server::hyper::HyperConfig`]) and compose this type.

pub mod descriptor;

use crate::error::{ConfigError, ConfigResult};
use crate::server::Hook;
use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Default context path the application is mounted under.
pub const DEFAULT_PATH: &str = "/";

/// Default static content root, relative to the test working directory.
pub const DEFAULT_STATIC_ROOT: &str = "public";

/// Common configuration for an embedded server.
///
/// Built once per test via [`ServerConfig::builder`], immutable and cheap to
/// clone afterwards; the adapters that consume it never mutate it.
#[derive(Clone)]
pub struct ServerConfig {
    path: String,
    static_root: PathBuf,
    overlays: Vec<PathBuf>,
    port: u16,
    env: BTreeMap<String, String>,
    hooks: Vec<Arc<dyn Hook>>,
    descriptor: Option<PathBuf>,
}

impl ServerConfig {
    /// Get a configuration builder.
    pub fn builder() -> ServerConfigBuilder {
        ServerConfigBuilder::default()
    }

    /// Context path the application is mounted under (`"/"` by default).
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Primary static content root.
    pub fn static_root(&self) -> &Path {
        &self.static_root
    }

    /// Additional content roots consulted, in order, when a file is not
    /// found under the primary root.
    pub fn overlays(&self) -> &[PathBuf] {
        &self.overlays
    }

    /// Configured port; `0` means an OS-assigned ephemeral port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Environment variables set before the server starts and restored to
    /// their previous values after it stops.
    pub fn env(&self) -> &BTreeMap<String, String> {
        &self.env
    }

    /// Ordered lifecycle hooks.
    pub fn hooks(&self) -> &[Arc<dyn Hook>] {
        &self.hooks
    }

    /// Explicit route descriptor file, when one was configured.
    pub fn descriptor(&self) -> Option<&Path> {
        self.descriptor.as_deref()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            path: DEFAULT_PATH.to_string(),
            static_root: PathBuf::from(DEFAULT_STATIC_ROOT),
            overlays: Vec::new(),
            port: 0,
            env: BTreeMap::new(),
            hooks: Vec::new(),
            descriptor: None,
        }
    }
}

impl PartialEq for ServerConfig {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path
            && self.static_root == other.static_root
            && self.overlays == other.overlays
            && self.port == other.port
            && self.env == other.env
            && self.descriptor == other.descriptor
            && hooks_eq(&self.hooks, &other.hooks)
    }
}

impl Eq for ServerConfig {}

impl Hash for ServerConfig {
    // Hooks are compared by identity and deliberately left out of the hash:
    // equal configurations still hash equal.
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.path.hash(state);
        self.static_root.hash(state);
        self.overlays.hash(state);
        self.port.hash(state);
        self.env.hash(state);
        self.descriptor.hash(state);
    }
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("path", &self.path)
            .field("static_root", &self.static_root)
            .field("overlays", &self.overlays)
            .field("port", &self.port)
            .field("env", &self.env)
            .field("hooks", &self.hooks.len())
            .field("descriptor", &self.descriptor)
            .finish()
    }
}

/// Hooks are trait objects without a meaningful equality; two configurations
/// are only equal when they share the same hook instances.
fn hooks_eq(a: &[Arc<dyn Hook>], b: &[Arc<dyn Hook>]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| Arc::ptr_eq(x, y))
}

/// Builder for [`ServerConfig`] instances.
#[derive(Default)]
pub struct ServerConfigBuilder {
    path: Option<String>,
    static_root: Option<PathBuf>,
    overlays: Vec<PathBuf>,
    port: u16,
    env: BTreeMap<String, String>,
    hooks: Vec<Arc<dyn Hook>>,
    descriptor: Option<PathBuf>,
}

impl ServerConfigBuilder {
    /// Set the context path. Must be non-blank and start with `/`.
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Set the primary static content root.
    pub fn static_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.static_root = Some(root.into());
        self
    }

    /// Add an overlay content root, consulted after the primary root.
    pub fn overlay(mut self, root: impl Into<PathBuf>) -> Self {
        self.overlays.push(root.into());
        self
    }

    /// Set the port; `0` (the default) asks the OS for an ephemeral port.
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set an environment variable for the server's lifetime.
    pub fn env(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(name.into(), value.into());
        self
    }

    /// Append a lifecycle hook.
    pub fn hook(mut self, hook: impl Hook + 'static) -> Self {
        self.hooks.push(Arc::new(hook));
        self
    }

    /// Append an already shared lifecycle hook.
    pub fn hook_arc(mut self, hook: Arc<dyn Hook>) -> Self {
        self.hooks.push(hook);
        self
    }

    /// Override the route descriptor file.
    pub fn descriptor(mut self, path: impl Into<PathBuf>) -> Self {
        self.descriptor = Some(path.into());
        self
    }

    /// Validate the collected values and build the configuration.
    pub fn build(self) -> ConfigResult<ServerConfig> {
        let path = self.path.unwrap_or_else(|| DEFAULT_PATH.to_string());
        if path.trim().is_empty() {
            return Err(ConfigError::invalid("context path must not be blank"));
        }
        if !path.starts_with('/') {
            return Err(ConfigError::invalid(format!(
                "context path must start with '/', got: {path}"
            )));
        }

        for name in self.env.keys() {
            if name.trim().is_empty() {
                return Err(ConfigError::invalid(
                    "environment variable names must not be blank",
                ));
            }
        }

        Ok(ServerConfig {
            path,
            static_root: self
                .static_root
                .unwrap_or_else(|| PathBuf::from(DEFAULT_STATIC_ROOT)),
            overlays: self.overlays,
            port: self.port,
            env: self.env,
            hooks: self.hooks,
            descriptor: self.descriptor,
        })
    }
}
