//! reqwest-backed client adapter.

use crate::client::{
    collect_headers, Executor, HttpClient, HttpMethod, HttpRequest, RawResponse, RequestParts,
};
use crate::error::{ClientError, ClientResult};
use crate::server::EmbeddedServer;
use crate::util::join_url;
use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::debug;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Client adapter over [`reqwest`].
#[derive(Clone)]
pub struct ReqwestClient {
    inner: Arc<Inner>,
    base_url: String,
}

struct Inner {
    client: reqwest::Client,
    destroyed: AtomicBool,
}

impl ReqwestClient {
    /// Create a client with default settings, bound to `server`.
    pub fn new(server: &dyn EmbeddedServer) -> ClientResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .user_agent(concat!("http-testbed/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(ClientError::Request)?;
        Ok(Self::with_client(server, client))
    }

    /// Create a client wrapping a caller-provided [`reqwest::Client`].
    pub fn with_client(server: &dyn EmbeddedServer, client: reqwest::Client) -> Self {
        Self {
            inner: Arc::new(Inner {
                client,
                destroyed: AtomicBool::new(false),
            }),
            base_url: server.url(),
        }
    }
}

impl HttpClient for ReqwestClient {
    fn request(&self, method: HttpMethod, path: &str) -> HttpRequest {
        HttpRequest::new(
            method,
            join_url(&self.base_url, path),
            Arc::clone(&self.inner) as Arc<dyn Executor>,
        )
    }

    fn server_url(&self) -> String {
        self.base_url.clone()
    }

    fn destroy(&self) {
        if self
            .inner
            .destroyed
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            debug!("reqwest client destroyed");
        }
    }

    fn is_destroyed(&self) -> bool {
        self.inner.destroyed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Executor for Inner {
    async fn execute(&self, parts: &RequestParts) -> ClientResult<RawResponse> {
        if self.destroyed.load(Ordering::SeqCst) {
            return Err(ClientError::Destroyed);
        }

        let method = translate_method(parts.method);
        let mut request = self.client.request(method, parts.full_url());

        for header in &parts.headers {
            for value in header.values() {
                request = request.header(header.name(), value);
            }
        }

        if let Some(cookies) = parts.cookie_header() {
            request = request.header("Cookie", cookies);
        }

        if let Some(body) = &parts.body {
            request = request.body(body.clone());
        } else if !parts.form.is_empty() {
            let pairs: Vec<(&str, &str)> = parts
                .form
                .iter()
                .map(|p| (p.name(), p.value()))
                .collect();
            request = request.form(&pairs);
        }

        let response = request.send().await?;
        let status = response.status().as_u16();
        let headers = collect_headers(response.headers().iter().map(|(name, value)| {
            (
                name.as_str(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            )
        }));
        let body = response.bytes().await?;

        Ok(RawResponse {
            status,
            headers,
            body,
        })
    }
}

fn translate_method(method: HttpMethod) -> reqwest::Method {
    match method {
        HttpMethod::Get => reqwest::Method::GET,
        HttpMethod::Post => reqwest::Method::POST,
        HttpMethod::Put => reqwest::Method::PUT,
        HttpMethod::Delete => reqwest::Method::DELETE,
        HttpMethod::Patch => reqwest::Method::PATCH,
        HttpMethod::Head => reqwest::Method::HEAD,
    }
}
