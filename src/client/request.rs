//! Fluent HTTP request builder
//!
//! [`HttpRequest`] is a mutable, single-call description of an HTTP
//! exchange. Clients hand one out with the target URL already resolved
//! against the running server; the test chains parameters, headers and a
//! body onto it and finishes with a terminal [`execute`](HttpRequest::execute).
//! The backend-specific translation lives behind the crate-private
//! [`Executor`] trait, one implementation per underlying client library.

use crate::client::types::{
    ACCEPT, APPLICATION_FORM_URL_ENCODED, APPLICATION_JSON, APPLICATION_XML, CONTENT_TYPE,
    Cookie, HttpHeader, HttpMethod, HttpParameter, HttpResponse, MULTIPART_FORM_DATA,
    XML_HTTP_REQUEST, X_REQUESTED_WITH,
};
use crate::error::ClientResult;
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// Response as produced by a backend, before timing is stamped on.
pub(crate) struct RawResponse {
    pub(crate) status: u16,
    pub(crate) headers: Vec<HttpHeader>,
    pub(crate) body: Bytes,
}

/// Backend translating a finished request description into a call on the
/// underlying client library.
#[async_trait]
pub(crate) trait Executor: Send + Sync {
    async fn execute(&self, parts: &RequestParts) -> ClientResult<RawResponse>;
}

/// The accumulated request description.
#[derive(Debug, Clone)]
pub(crate) struct RequestParts {
    pub(crate) method: HttpMethod,
    pub(crate) url: String,
    pub(crate) query: Vec<HttpParameter>,
    pub(crate) form: Vec<HttpParameter>,
    pub(crate) headers: Vec<HttpHeader>,
    pub(crate) cookies: Vec<Cookie>,
    pub(crate) body: Option<String>,
}

impl RequestParts {
    /// Full URL including the encoded query string.
    pub(crate) fn full_url(&self) -> String {
        if self.query.is_empty() {
            return self.url.clone();
        }

        let query = self
            .query
            .iter()
            .map(|p| {
                format!(
                    "{}={}",
                    urlencoding::encode(p.name()),
                    urlencoding::encode(p.value())
                )
            })
            .collect::<Vec<_>>()
            .join("&");
        format!("{}?{}", self.url, query)
    }

    /// Form parameters rendered as an `application/x-www-form-urlencoded`
    /// body.
    pub(crate) fn form_encoded(&self) -> String {
        self.form
            .iter()
            .map(|p| {
                format!(
                    "{}={}",
                    urlencoding::encode(p.name()),
                    urlencoding::encode(p.value())
                )
            })
            .collect::<Vec<_>>()
            .join("&")
    }

    /// Value of the `Cookie` request header, when any cookies are attached.
    pub(crate) fn cookie_header(&self) -> Option<String> {
        if self.cookies.is_empty() {
            return None;
        }
        Some(
            self.cookies
                .iter()
                .map(Cookie::pair)
                .collect::<Vec<_>>()
                .join("; "),
        )
    }
}

/// A single HTTP request under construction.
///
/// Every mutator returns the request for chaining; `execute` is terminal and
/// produces an immutable [`HttpResponse`].
pub struct HttpRequest {
    parts: RequestParts,
    executor: Arc<dyn Executor>,
}

impl HttpRequest {
    pub(crate) fn new(method: HttpMethod, url: String, executor: Arc<dyn Executor>) -> Self {
        Self {
            parts: RequestParts {
                method,
                url,
                query: Vec::new(),
                form: Vec::new(),
                headers: Vec::new(),
                cookies: Vec::new(),
                body: None,
            },
            executor,
        }
    }

    /// Request method.
    pub fn method(&self) -> HttpMethod {
        self.parts.method
    }

    /// Target URL, without the query string.
    pub fn url(&self) -> &str {
        &self.parts.url
    }

    /// Add a query parameter.
    ///
    /// # Panics
    ///
    /// Panics if `name` is blank.
    pub fn query_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parts.query.push(HttpParameter::param(name, value));
        self
    }

    /// Add a collection of query parameters.
    pub fn query_params(mut self, params: impl IntoIterator<Item = HttpParameter>) -> Self {
        self.parts.query.extend(params);
        self
    }

    /// Add a form parameter.
    ///
    /// # Panics
    ///
    /// Panics if `name` is blank, or if the request method does not allow a
    /// body (only `POST`, `PUT` and `PATCH` do).
    pub fn form_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.assert_body_allowed("form parameters");
        self.parts.form.push(HttpParameter::param(name, value));
        self
    }

    /// Add a collection of form parameters.
    ///
    /// # Panics
    ///
    /// Panics if the request method does not allow a body.
    pub fn form_params(mut self, params: impl IntoIterator<Item = HttpParameter>) -> Self {
        self.assert_body_allowed("form parameters");
        self.parts.form.extend(params);
        self
    }

    /// Add a header; a repeated name appends to the existing values.
    ///
    /// # Panics
    ///
    /// Panics if `name` is blank.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        let value = value.into();
        match self
            .parts
            .headers
            .iter_mut()
            .find(|h| h.name().eq_ignore_ascii_case(&name))
        {
            Some(existing) => existing.push_value(value),
            None => self.parts.headers.push(HttpHeader::header(name, value)),
        }
        self
    }

    /// Attach a cookie, sent in the `Cookie` request header.
    pub fn cookie(mut self, cookie: Cookie) -> Self {
        self.parts.cookies.push(cookie);
        self
    }

    /// Set the raw request body.
    ///
    /// # Panics
    ///
    /// Panics if the request method does not allow a body.
    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.assert_body_allowed("a request body");
        self.parts.body = Some(body.into());
        self
    }

    /// Add the `X-Requested-With: XMLHttpRequest` header most JS libraries
    /// send, to simulate an AJAX call.
    pub fn as_xml_http_request(self) -> Self {
        self.header(X_REQUESTED_WITH, XML_HTTP_REQUEST)
    }

    /// Set the content type to `application/x-www-form-urlencoded`.
    pub fn as_form_url_encoded(self) -> Self {
        self.header(CONTENT_TYPE, APPLICATION_FORM_URL_ENCODED)
    }

    /// Set the content type to `multipart/form-data`.
    pub fn as_multipart_form_data(self) -> Self {
        self.header(CONTENT_TYPE, MULTIPART_FORM_DATA)
    }

    /// Set the content type to `application/json`.
    pub fn as_json(self) -> Self {
        self.header(CONTENT_TYPE, APPLICATION_JSON)
    }

    /// Set the content type to `application/xml`.
    pub fn as_xml(self) -> Self {
        self.header(CONTENT_TYPE, APPLICATION_XML)
    }

    /// Set the accept type to `application/json`.
    pub fn accept_json(self) -> Self {
        self.header(ACCEPT, APPLICATION_JSON)
    }

    /// Set the accept type to `application/xml`.
    pub fn accept_xml(self) -> Self {
        self.header(ACCEPT, APPLICATION_XML)
    }

    /// Execute the request and wait for the response.
    ///
    /// Elapsed time is measured around the underlying call and exposed via
    /// [`HttpResponse::duration`].
    pub async fn execute(self) -> ClientResult<HttpResponse> {
        debug!(method = %self.parts.method, url = %self.parts.url, "executing request");
        let started = Instant::now();
        let raw = self.executor.execute(&self.parts).await?;
        Ok(HttpResponse::new(
            raw.status,
            raw.headers,
            raw.body,
            started.elapsed(),
        ))
    }

    /// Execute with JSON content and accept headers applied first.
    pub async fn execute_json(self) -> ClientResult<HttpResponse> {
        self.as_json().accept_json().execute().await
    }

    /// Execute with XML content and accept headers applied first.
    pub async fn execute_xml(self) -> ClientResult<HttpResponse> {
        self.as_xml().accept_xml().execute().await
    }

    fn assert_body_allowed(&self, what: &str) {
        assert!(
            self.parts.method.allows_body(),
            "{what} not allowed for {} requests (requires POST, PUT or PATCH)",
            self.parts.method
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ClientError;

    struct NoopExecutor;

    #[async_trait]
    impl Executor for NoopExecutor {
        async fn execute(&self, _parts: &RequestParts) -> ClientResult<RawResponse> {
            Err(ClientError::Transport("noop".into()))
        }
    }

    fn request(method: HttpMethod) -> HttpRequest {
        HttpRequest::new(
            method,
            "http://127.0.0.1:1/api".to_string(),
            Arc::new(NoopExecutor),
        )
    }

    #[test]
    fn test_full_url_encodes_query() {
        let req = request(HttpMethod::Get)
            .query_param("q", "a b")
            .query_param("lang", "en");
        assert_eq!(
            req.parts.full_url(),
            "http://127.0.0.1:1/api?q=a%20b&lang=en"
        );
    }

    #[test]
    fn test_full_url_without_query() {
        let req = request(HttpMethod::Get);
        assert_eq!(req.parts.full_url(), "http://127.0.0.1:1/api");
    }

    #[test]
    fn test_form_encoding() {
        let req = request(HttpMethod::Post)
            .form_param("name", "Jöhn")
            .form_param("age", "42");
        assert_eq!(req.parts.form_encoded(), "name=J%C3%B6hn&age=42");
    }

    #[test]
    fn test_header_appends_repeated_names() {
        let req = request(HttpMethod::Get)
            .header("Accept", "text/html")
            .header("accept", "text/plain");
        assert_eq!(req.parts.headers.len(), 1);
        assert_eq!(
            req.parts.headers[0].serialize_values(),
            "text/html, text/plain"
        );
    }

    #[test]
    fn test_cookie_header() {
        let req = request(HttpMethod::Get)
            .cookie(Cookie::new("a", "1"))
            .cookie(Cookie::new("b", "2"));
        assert_eq!(req.parts.cookie_header().as_deref(), Some("a=1; b=2"));
        assert!(request(HttpMethod::Get).parts.cookie_header().is_none());
    }

    #[test]
    fn test_content_type_shortcuts() {
        let req = request(HttpMethod::Post).as_json().accept_xml();
        assert_eq!(req.parts.headers[0].first_value(), Some(APPLICATION_JSON));
        assert_eq!(req.parts.headers[1].first_value(), Some(APPLICATION_XML));
    }

    #[test]
    #[should_panic(expected = "form parameters not allowed for GET requests")]
    fn test_form_param_rejected_on_get() {
        request(HttpMethod::Get).form_param("a", "1");
    }

    #[test]
    #[should_panic(expected = "a request body not allowed for DELETE requests")]
    fn test_body_rejected_on_delete() {
        request(HttpMethod::Delete).body("{}");
    }
}
