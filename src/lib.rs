//! Embedded HTTP test servers
//!
//! Integration-test support: boot a real HTTP server inside the test
//! process, issue requests against it through a small fluent client
//! abstraction, and tear everything down automatically even when the test
//! body fails.
//!
//! ## Features
//!
//! - **Two server backends**: a full-featured axum server (static content,
//!   canned routes, graceful stop) and a minimal raw-hyper server
//! - **Two client adapters**: reqwest and plain hyper, behaviorally
//!   identical behind one fluent request contract
//! - **Lifecycle glue**: an RAII [`ServerGuard`] fixture and
//!   [`with_server`]/[`with_client`] run-wrappers with unconditional
//!   teardown
//! - **Canned routes** via a TOML descriptor, overridable per test
//!
//! ## Example
//!
//! ```no_run
//! use http_testbed::{AxumConfig, EmbeddedAxum, HttpClient, ServerGuard};
//!
//! # async fn example() -> http_testbed::Result<()> {
//! let config = AxumConfig::builder()
//!     .static_root("tests/fixtures/site")
//!     .build()?;
//! let guard = ServerGuard::start(EmbeddedAxum::new(config)).await?;
//!
//! let client = guard.client()?;
//! let response = client.get("/index.html").execute().await?;
//! assert_eq!(response.status(), 200);
//!
//! guard.stop().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Canned routes
//!
//! Place a `routes.toml` next to the static content (or point
//! `descriptor(..)` at any file):
//!
//! ```toml
//! [[route]]
//! path = "/api/health"
//! method = "GET"
//! content_type = "application/json"
//! body = '{"status":"UP"}'
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod harness;
pub mod server;
pub mod util;

// Re-export main types
pub use client::{
    Cookie, HttpClient, HttpHeader, HttpMethod, HttpParameter, HttpRequest, HttpResponse,
    HyperClient, ReqwestClient,
};
pub use config::descriptor::{RouteDescriptor, RouteSpec};
pub use config::{ServerConfig, ServerConfigBuilder};
pub use error::{ClientError, ConfigError, Result, ServerError, TestbedError};
pub use harness::{ServerGuard, with_client, with_server};
pub use server::axum::{AxumConfig, EmbeddedAxum};
pub use server::hyper::{EmbeddedHyper, HyperConfig};
pub use server::{EmbeddedServer, FnHook, Hook};
