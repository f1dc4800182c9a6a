//! Utility functions shared across the crate.

use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::warn;

/// Find an available port, starting from the preferred port.
///
/// Strategy:
/// 1. Try the preferred port first.
/// 2. If unavailable, probe the next 8 consecutive ports.
/// 3. Fall back to an OS-assigned port.
///
/// A preferred port of `0` skips straight to the OS-assigned step. Fallback
/// substitutions are logged at `warn` level so a test run that silently moved
/// off its configured port leaves a trace.
pub async fn find_available_port(host: &str, preferred: u16) -> std::io::Result<u16> {
    if preferred != 0 {
        if probe(host, preferred).await? {
            return Ok(preferred);
        }

        for offset in 1..=8u16 {
            let candidate = preferred.saturating_add(offset);
            if probe(host, candidate).await? {
                warn!(
                    preferred,
                    actual = candidate,
                    "preferred port unavailable, using alternate"
                );
                return Ok(candidate);
            }
        }
    }

    let addr: SocketAddr = format!("{host}:0")
        .parse()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;
    let listener = TcpListener::bind(addr).await?;
    let port = listener.local_addr()?.port();
    drop(listener);
    if preferred != 0 {
        warn!(preferred, actual = port, "using OS-assigned port");
    }
    Ok(port)
}

/// Bind the port briefly to see whether it is free.
///
/// Returns `Err` only when the host itself does not parse; a port in use is
/// reported as `Ok(false)`.
async fn probe(host: &str, port: u16) -> std::io::Result<bool> {
    let addr: SocketAddr = format!("{host}:{port}")
        .parse()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;
    Ok(TcpListener::bind(addr).await.is_ok())
}

/// Join a base URL and a path suffix without doubling slashes.
///
/// ```
/// use http_testbed::util::join_url;
///
/// assert_eq!(join_url("http://127.0.0.1:8080/", "/api"), "http://127.0.0.1:8080/api");
/// assert_eq!(join_url("http://127.0.0.1:8080", "api"), "http://127.0.0.1:8080/api");
/// assert_eq!(join_url("http://127.0.0.1:8080/app", ""), "http://127.0.0.1:8080/app/");
/// ```
pub fn join_url(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    if path.is_empty() {
        format!("{base}/")
    } else {
        format!("{base}/{path}")
    }
}
