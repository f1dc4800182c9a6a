//! Route descriptor
//!
//! Servers answer a set of canned routes before falling back to static
//! content. The routes come from a TOML descriptor, either the file named by
//! [`ServerConfig::descriptor`](crate::config::ServerConfig::descriptor) or
//! the default `routes.toml` under the static root:
//!
//! ```toml
//! [[route]]
//! path = "/api/health"
//! method = "GET"
//! status = 200
//! content_type = "application/json"
//! body = '{"status":"UP"}'
//! ```

use crate::client::HttpMethod;
use crate::config::ServerConfig;
use crate::error::{ConfigError, ConfigResult};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

/// File name looked up under the static root when no explicit descriptor
/// path is configured.
pub const DEFAULT_DESCRIPTOR_FILE: &str = "routes.toml";

/// A parsed route descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct RouteDescriptor {
    #[serde(default, rename = "route")]
    pub routes: Vec<RouteSpec>,
}

/// One canned route.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RouteSpec {
    /// Request path, relative to the context path. Must start with `/`.
    pub path: String,

    /// Request method answered by this route.
    #[serde(default = "default_method")]
    pub method: HttpMethod,

    /// Response status, default 200.
    #[serde(default = "default_status")]
    pub status: u16,

    /// Optional `Content-Type` response header.
    #[serde(default)]
    pub content_type: Option<String>,

    /// Response body.
    #[serde(default)]
    pub body: String,

    /// Additional response headers.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

fn default_method() -> HttpMethod {
    HttpMethod::Get
}

fn default_status() -> u16 {
    200
}

/// Parse a descriptor from a TOML string.
pub fn load_descriptor_from_str(toml_str: &str) -> ConfigResult<RouteDescriptor> {
    let descriptor: RouteDescriptor =
        toml::from_str(toml_str).map_err(|e| ConfigError::Descriptor(e.to_string()))?;
    validate(&descriptor)?;
    Ok(descriptor)
}

/// Load a descriptor from a file.
pub fn load_descriptor(path: &Path) -> ConfigResult<RouteDescriptor> {
    let raw = std::fs::read_to_string(path).map_err(|e| {
        ConfigError::Descriptor(format!("cannot read {}: {e}", path.display()))
    })?;
    load_descriptor_from_str(&raw)
}

/// Resolve the descriptor for a configuration.
///
/// An explicitly configured descriptor file must exist; without one the
/// default file under the static root is used when present, and the server
/// simply has no canned routes otherwise.
pub fn resolve_descriptor(config: &ServerConfig) -> ConfigResult<Option<RouteDescriptor>> {
    if let Some(path) = config.descriptor() {
        return load_descriptor(path).map(Some);
    }

    let default_path = config.static_root().join(DEFAULT_DESCRIPTOR_FILE);
    if default_path.is_file() {
        return load_descriptor(&default_path).map(Some);
    }

    Ok(None)
}

fn validate(descriptor: &RouteDescriptor) -> ConfigResult<()> {
    for spec in &descriptor.routes {
        if !spec.path.starts_with('/') {
            return Err(ConfigError::Descriptor(format!(
                "route path must start with '/', got: {}",
                spec.path
            )));
        }
        if !(100..=599).contains(&spec.status) {
            return Err(ConfigError::Descriptor(format!(
                "route {} has status {} outside 100..=599",
                spec.path, spec.status
            )));
        }
    }
    Ok(())
}
