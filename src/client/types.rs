//! Client value types: methods, parameters, headers, cookies, responses.

use crate::error::{ClientError, ClientResult};
use bytes::Bytes;
use serde::Deserialize;
use std::time::Duration;

/// Media type for JSON payloads.
pub const APPLICATION_JSON: &str = "application/json";
/// Media type for XML payloads.
pub const APPLICATION_XML: &str = "application/xml";
/// Media type for HTML-form encoded payloads.
pub const APPLICATION_FORM_URL_ENCODED: &str = "application/x-www-form-urlencoded";
/// Media type for multipart form payloads.
pub const MULTIPART_FORM_DATA: &str = "multipart/form-data";

/// `Content-Type` header name.
pub const CONTENT_TYPE: &str = "Content-Type";
/// `Accept` header name.
pub const ACCEPT: &str = "Accept";
/// Header most JS libraries add to AJAX calls.
pub const X_REQUESTED_WITH: &str = "X-Requested-With";
/// Value of [`X_REQUESTED_WITH`] for simulated AJAX calls.
pub const XML_HTTP_REQUEST: &str = "XMLHttpRequest";

/// HTTP request method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Head,
}

impl HttpMethod {
    /// The wire verb, e.g. `"GET"`.
    pub fn verb(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Head => "HEAD",
        }
    }

    /// Whether a request body (or form parameters) may be attached.
    pub fn allows_body(&self) -> bool {
        matches!(
            self,
            HttpMethod::Post | HttpMethod::Put | HttpMethod::Patch
        )
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.verb())
    }
}

/// Parameter sent in an HTTP request, either as a query parameter
/// (following the `?` in the URL) or as a form parameter
/// (`application/x-www-form-urlencoded` body).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HttpParameter {
    name: String,
    value: String,
}

impl HttpParameter {
    /// Create a new parameter.
    ///
    /// # Panics
    ///
    /// Panics if `name` is empty or blank. Values may be empty.
    pub fn param(name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        assert!(
            !name.trim().is_empty(),
            "parameter name must not be blank"
        );
        Self {
            name,
            value: value.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &str {
        &self.value
    }
}

/// Header with an ordered list of values.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HttpHeader {
    name: String,
    values: Vec<String>,
}

impl HttpHeader {
    /// Create a single-valued header.
    ///
    /// # Panics
    ///
    /// Panics if `name` is empty or blank.
    pub fn header(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::of(name, vec![value.into()])
    }

    /// Create a header with multiple values.
    ///
    /// # Panics
    ///
    /// Panics if `name` is empty or blank.
    pub fn of(name: impl Into<String>, values: Vec<String>) -> Self {
        let name = name.into();
        assert!(!name.trim().is_empty(), "header name must not be blank");
        Self { name, values }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn values(&self) -> &[String] {
        &self.values
    }

    /// First value, for the common single-valued case.
    pub fn first_value(&self) -> Option<&str> {
        self.values.first().map(String::as_str)
    }

    /// All values joined for the wire, separated by `", "`.
    pub fn serialize_values(&self) -> String {
        self.values.join(", ")
    }

    pub(crate) fn push_value(&mut self, value: String) {
        self.values.push(value);
    }
}

/// Cookie attached to an outgoing request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Cookie {
    name: String,
    value: String,
    domain: Option<String>,
    path: Option<String>,
    secure: bool,
    http_only: bool,
    max_age: Option<i64>,
    expires: Option<i64>,
}

impl Cookie {
    /// Create a cookie with just a name and a value.
    ///
    /// # Panics
    ///
    /// Panics if `name` is empty or blank.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        assert!(!name.trim().is_empty(), "cookie name must not be blank");
        Self {
            name,
            value: value.into(),
            ..Self::default()
        }
    }

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    pub fn http_only(mut self, http_only: bool) -> Self {
        self.http_only = http_only;
        self
    }

    pub fn with_max_age(mut self, max_age: i64) -> Self {
        self.max_age = Some(max_age);
        self
    }

    pub fn with_expires(mut self, expires_millis: i64) -> Self {
        self.expires = Some(expires_millis);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn domain(&self) -> Option<&str> {
        self.domain.as_deref()
    }

    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    pub fn is_secure(&self) -> bool {
        self.secure
    }

    pub fn is_http_only(&self) -> bool {
        self.http_only
    }

    pub fn max_age(&self) -> Option<i64> {
        self.max_age
    }

    pub fn expires(&self) -> Option<i64> {
        self.expires
    }

    /// Effective max-age: Max-Age wins, then `expires - now`, then `0`.
    pub fn max_age_or_default(&self, now_millis: i64) -> i64 {
        match (self.max_age, self.expires) {
            (Some(max_age), _) => max_age,
            (None, Some(expires)) => expires - now_millis,
            (None, None) => 0,
        }
    }

    /// The `name=value` pair sent in the `Cookie` request header.
    pub fn pair(&self) -> String {
        format!("{}={}", self.name, self.value)
    }
}

/// Immutable response to an executed request.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    status: u16,
    headers: Vec<HttpHeader>,
    body: Bytes,
    duration: Duration,
}

impl HttpResponse {
    pub(crate) fn new(
        status: u16,
        headers: Vec<HttpHeader>,
        body: Bytes,
        duration: Duration,
    ) -> Self {
        Self {
            status,
            headers,
            body,
            duration,
        }
    }

    /// Response status code.
    pub fn status(&self) -> u16 {
        self.status
    }

    /// Whether the status is in the 2xx range.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// All response headers, in arrival order.
    pub fn headers(&self) -> &[HttpHeader] {
        &self.headers
    }

    /// Response header by case-insensitive name.
    pub fn header(&self, name: &str) -> Option<&HttpHeader> {
        self.headers
            .iter()
            .find(|h| h.name().eq_ignore_ascii_case(name))
    }

    /// First value of a response header by case-insensitive name.
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.header(name).and_then(HttpHeader::first_value)
    }

    /// Raw response body.
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Response body decoded as UTF-8, lossily.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Response body decoded as JSON.
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> ClientResult<T> {
        serde_json::from_slice(&self.body)
            .map_err(|e| ClientError::InvalidResponse(format!("failed to parse JSON body: {e}")))
    }

    /// Time the exchange took, measured around the underlying call.
    pub fn duration(&self) -> Duration {
        self.duration
    }
}
