//! hyper-backed client adapter.

use crate::client::{
    collect_headers, Executor, HttpClient, HttpMethod, HttpRequest, RawResponse, RequestParts,
};
use crate::client::types::{APPLICATION_FORM_URL_ENCODED, CONTENT_TYPE};
use crate::error::{ClientError, ClientResult};
use crate::server::EmbeddedServer;
use crate::util::join_url;
use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioExecutor;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

/// Client adapter over the plain [`hyper`] client.
#[derive(Clone)]
pub struct HyperClient {
    inner: Arc<Inner>,
    base_url: String,
}

struct Inner {
    client: Client<HttpConnector, Full<Bytes>>,
    destroyed: AtomicBool,
}

impl HyperClient {
    /// Create a client bound to `server`.
    pub fn new(server: &dyn EmbeddedServer) -> Self {
        let client = Client::builder(TokioExecutor::new()).build_http();
        Self {
            inner: Arc::new(Inner {
                client,
                destroyed: AtomicBool::new(false),
            }),
            base_url: server.url(),
        }
    }
}

impl HttpClient for HyperClient {
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
            debug!("hyper client destroyed");
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

        let url = parts.full_url();
        let uri: http::Uri = url.parse().map_err(|e| ClientError::InvalidUrl {
            url: url.clone(),
            reason: format!("{e}"),
        })?;

        let mut builder = http::Request::builder()
            .method(parts.method.verb())
            .uri(uri);

        for header in &parts.headers {
            for value in header.values() {
                builder = builder.header(header.name(), value);
            }
        }

        if let Some(cookies) = parts.cookie_header() {
            builder = builder.header("Cookie", cookies);
        }

        let payload = if let Some(body) = &parts.body {
            Bytes::from(body.clone())
        } else if !parts.form.is_empty() {
            let has_content_type = parts
                .headers
                .iter()
                .any(|h| h.name().eq_ignore_ascii_case(CONTENT_TYPE));
            if !has_content_type {
                builder = builder.header(CONTENT_TYPE, APPLICATION_FORM_URL_ENCODED);
            }
            Bytes::from(parts.form_encoded())
        } else {
            Bytes::new()
        };

        let request = builder
            .body(Full::new(payload))
            .map_err(|e| ClientError::Transport(format!("failed to build request: {e}")))?;

        let response = self
            .client
            .request(request)
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))?;

        let status = response.status().as_u16();
        let headers = collect_headers(response.headers().iter().map(|(name, value)| {
            (
                name.as_str(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            )
        }));

        let body = response
            .into_body()
            .collect()
            .await
            .map_err(|e| ClientError::Transport(format!("failed to read body: {e}")))?
            .to_bytes();

        Ok(RawResponse {
            status,
            headers,
            body,
        })
    }
}
