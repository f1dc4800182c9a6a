//! HTTP client abstraction
//!
//! A small fluent contract over the underlying client libraries: a client
//! bound to a running [`EmbeddedServer`](crate::server::EmbeddedServer)
//! hands out [`HttpRequest`]s with the target URL already resolved, and each
//! adapter translates the finished description into its library's API. All
//! adapters are behaviorally identical at this contract level.

mod request;
mod types;

pub mod hyper;
pub mod reqwest;

pub use request::HttpRequest;
pub use types::{
    ACCEPT, APPLICATION_FORM_URL_ENCODED, APPLICATION_JSON, APPLICATION_XML, CONTENT_TYPE,
    Cookie, HttpHeader, HttpMethod, HttpParameter, HttpResponse, MULTIPART_FORM_DATA,
    XML_HTTP_REQUEST, X_REQUESTED_WITH,
};

pub use self::hyper::HyperClient;
pub use self::reqwest::ReqwestClient;

pub(crate) use request::{Executor, RawResponse, RequestParts};

/// HTTP client bound to an embedded server.
///
/// `destroy` is idempotent and safe under concurrent callers (a shutdown
/// path racing explicit teardown); once destroyed, executing any request
/// built by the client fails with
/// [`ClientError::Destroyed`](crate::error::ClientError::Destroyed).
pub trait HttpClient: Send + Sync {
    /// Build a request for `path`, resolved against the server's base URL.
    fn request(&self, method: HttpMethod, path: &str) -> HttpRequest;

    /// Base URL of the server this client is bound to.
    fn server_url(&self) -> String;

    /// Release the client. Calling it twice has the same observable effect
    /// as calling it once.
    fn destroy(&self);

    /// Whether [`destroy`](HttpClient::destroy) has been called.
    fn is_destroyed(&self) -> bool;

    /// `GET` request for `path`.
    fn get(&self, path: &str) -> HttpRequest {
        self.request(HttpMethod::Get, path)
    }

    /// `POST` request for `path`.
    fn post(&self, path: &str) -> HttpRequest {
        self.request(HttpMethod::Post, path)
    }

    /// `PUT` request for `path`.
    fn put(&self, path: &str) -> HttpRequest {
        self.request(HttpMethod::Put, path)
    }

    /// `DELETE` request for `path`.
    fn delete(&self, path: &str) -> HttpRequest {
        self.request(HttpMethod::Delete, path)
    }

    /// `PATCH` request for `path`.
    fn patch(&self, path: &str) -> HttpRequest {
        self.request(HttpMethod::Patch, path)
    }

    /// `HEAD` request for `path`.
    fn head(&self, path: &str) -> HttpRequest {
        self.request(HttpMethod::Head, path)
    }
}

/// Group raw `(name, value)` pairs into ordered multi-value headers,
/// preserving arrival order of names.
pub(crate) fn collect_headers<'a>(
    pairs: impl Iterator<Item = (&'a str, String)>,
) -> Vec<HttpHeader> {
    let mut headers: Vec<HttpHeader> = Vec::new();
    for (name, value) in pairs {
        match headers
            .iter_mut()
            .find(|h| h.name().eq_ignore_ascii_case(name))
        {
            Some(existing) => existing.push_value(value),
            None => headers.push(HttpHeader::header(name.to_string(), value)),
        }
    }
    headers
}
