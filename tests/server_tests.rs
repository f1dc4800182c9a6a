//! Embedded server lifecycle and content tests, for both backends.

use http_testbed::{
    AxumConfig, EmbeddedAxum, EmbeddedHyper, EmbeddedServer, FnHook, HttpClient, HyperConfig,
    ReqwestClient,
};
use serial_test::serial;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tokio_test::assert_ok;

fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn site(files: &[(&str, &str)]) -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    for (name, contents) in files {
        let path = dir.path().join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, contents).unwrap();
    }
    dir
}

#[tokio::test]
async fn test_axum_lifecycle_transitions() {
    init_tracing();
    let server = EmbeddedAxum::with_defaults();
    assert!(!server.is_started());

    assert_ok!(server.start().await);
    assert!(server.is_started());
    assert!(server.port() > 0);
    assert_eq!(server.url(), format!("http://127.0.0.1:{}/", server.port()));

    assert_ok!(server.stop().await);
    assert!(!server.is_started());
}

#[tokio::test]
async fn test_axum_start_and_stop_are_idempotent() {
    let server = EmbeddedAxum::with_defaults();

    assert_ok!(server.start().await);
    let port = server.port();
    assert_ok!(server.start().await);
    assert_eq!(server.port(), port);

    assert_ok!(server.stop().await);
    assert_ok!(server.stop().await);
    assert!(!server.is_started());
}

#[tokio::test]
async fn test_axum_serves_static_content() {
    let dir = site(&[
        ("index.html", "<h1>home</h1>"),
        ("css/app.css", "body {}"),
    ]);
    let config = AxumConfig::builder()
        .static_root(dir.path())
        .build()
        .unwrap();
    let server = EmbeddedAxum::new(config);
    server.start().await.unwrap();

    let client = ReqwestClient::new(&server).unwrap();

    let response = client.get("/index.html").execute().await.unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(response.text(), "<h1>home</h1>");

    let response = client.get("/css/app.css").execute().await.unwrap();
    assert_eq!(response.status(), 200);

    let response = client.get("/missing.html").execute().await.unwrap();
    assert_eq!(response.status(), 404);

    server.stop().await.unwrap();
}

#[tokio::test]
async fn test_axum_overlay_roots_are_consulted_in_order() {
    let primary = site(&[("shared.txt", "from-primary")]);
    let overlay = site(&[("shared.txt", "from-overlay"), ("only.txt", "overlay-only")]);

    let config = AxumConfig::builder()
        .static_root(primary.path())
        .overlay(overlay.path())
        .build()
        .unwrap();
    let server = EmbeddedAxum::new(config);
    server.start().await.unwrap();

    let client = ReqwestClient::new(&server).unwrap();

    // Primary root wins for files present in both.
    let response = client.get("/shared.txt").execute().await.unwrap();
    assert_eq!(response.text(), "from-primary");

    // Overlay answers for files only it has.
    let response = client.get("/only.txt").execute().await.unwrap();
    assert_eq!(response.text(), "overlay-only");

    server.stop().await.unwrap();
}

#[tokio::test]
async fn test_axum_base_dir_replaces_static_root() {
    let ignored = site(&[("a.txt", "ignored")]);
    let base = site(&[("a.txt", "from-base")]);

    let config = AxumConfig::builder()
        .static_root(ignored.path())
        .base_dir(base.path())
        .build()
        .unwrap();
    let server = EmbeddedAxum::new(config);
    server.start().await.unwrap();

    let client = ReqwestClient::new(&server).unwrap();
    let response = client.get("/a.txt").execute().await.unwrap();
    assert_eq!(response.text(), "from-base");

    server.stop().await.unwrap();
}

#[tokio::test]
async fn test_axum_answers_descriptor_routes() {
    let dir = site(&[(
        "routes.toml",
        r#"
[[route]]
path = "/api/health"
content_type = "application/json"
body = '{"status":"UP"}'

[[route]]
path = "/api/users"
method = "POST"
status = 201
body = "created"

[route.headers]
x-request-id = "fixed"
"#,
    )]);

    let config = AxumConfig::builder()
        .static_root(dir.path())
        .build()
        .unwrap();
    let server = EmbeddedAxum::new(config);
    server.start().await.unwrap();

    let client = ReqwestClient::new(&server).unwrap();

    let response = client.get("/api/health").execute().await.unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(response.header_value("content-type"), Some("application/json"));
    assert_eq!(response.text(), r#"{"status":"UP"}"#);

    let response = client.post("/api/users").execute().await.unwrap();
    assert_eq!(response.status(), 201);
    assert_eq!(response.text(), "created");
    assert_eq!(response.header_value("x-request-id"), Some("fixed"));

    // Method mismatch does not hit the canned route.
    let response = client.get("/api/users").execute().await.unwrap();
    assert_ne!(response.status(), 201);

    server.stop().await.unwrap();
}

#[tokio::test]
async fn test_axum_explicit_descriptor_override() {
    let dir = site(&[("descriptors/custom.toml", "[[route]]\npath = \"/pong\"\nbody = \"pong\"\n")]);

    let config = AxumConfig::builder()
        .static_root(dir.path())
        .descriptor(dir.path().join("descriptors/custom.toml"))
        .build()
        .unwrap();
    let server = EmbeddedAxum::new(config);
    server.start().await.unwrap();

    let client = ReqwestClient::new(&server).unwrap();
    let response = client.get("/pong").execute().await.unwrap();
    assert_eq!(response.text(), "pong");

    server.stop().await.unwrap();
}

#[tokio::test]
async fn test_axum_context_path() {
    let dir = site(&[("hello.txt", "hi")]);
    let config = AxumConfig::builder()
        .path("/app")
        .static_root(dir.path())
        .build()
        .unwrap();
    let server = EmbeddedAxum::new(config);
    server.start().await.unwrap();

    assert!(server.url().ends_with("/app"));

    // The client resolves paths against the base URL, context included.
    let client = ReqwestClient::new(&server).unwrap();
    let response = client.get("/hello.txt").execute().await.unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(response.text(), "hi");

    server.stop().await.unwrap();
}

#[tokio::test]
#[serial]
async fn test_env_vars_applied_and_restored() {
    // SAFETY: serialized via #[serial]
    unsafe { std::env::remove_var("TESTBED_IT_FLAG") };

    let config = AxumConfig::builder()
        .env("TESTBED_IT_FLAG", "on")
        .build()
        .unwrap();
    let server = EmbeddedAxum::new(config);

    server.start().await.unwrap();
    assert_eq!(std::env::var("TESTBED_IT_FLAG").unwrap(), "on");

    server.stop().await.unwrap();
    assert!(std::env::var("TESTBED_IT_FLAG").is_err());
}

#[tokio::test]
async fn test_hooks_run_in_order() {
    let sequence = Arc::new(Mutex::new(Vec::new()));
    let record = |events: &Arc<Mutex<Vec<&'static str>>>, label: &'static str| {
        let events = Arc::clone(events);
        move || events.lock().unwrap().push(label)
    };

    let config = AxumConfig::builder()
        .hook(FnHook::new(
            record(&sequence, "first-before"),
            record(&sequence, "first-after"),
        ))
        .hook(FnHook::new(
            record(&sequence, "second-before"),
            record(&sequence, "second-after"),
        ))
        .build()
        .unwrap();
    let server = EmbeddedAxum::new(config);

    server.start().await.unwrap();
    assert_eq!(
        *sequence.lock().unwrap(),
        vec!["first-before", "second-before"]
    );

    server.stop().await.unwrap();
    assert_eq!(
        *sequence.lock().unwrap(),
        vec!["first-before", "second-before", "first-after", "second-after"]
    );
}

#[tokio::test]
async fn test_hook_counters_across_restarts() {
    let starts = Arc::new(AtomicUsize::new(0));
    let stops = Arc::new(AtomicUsize::new(0));

    let hook = {
        let starts = Arc::clone(&starts);
        let stops = Arc::clone(&stops);
        FnHook::new(
            move || {
                starts.fetch_add(1, Ordering::SeqCst);
            },
            move || {
                stops.fetch_add(1, Ordering::SeqCst);
            },
        )
    };

    let config = AxumConfig::builder().hook(hook).build().unwrap();
    let server = EmbeddedAxum::new(config);

    server.start().await.unwrap();
    server.stop().await.unwrap();
    server.start().await.unwrap();
    server.stop().await.unwrap();

    assert_eq!(starts.load(Ordering::SeqCst), 2);
    assert_eq!(stops.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_hyper_lifecycle_transitions() {
    init_tracing();
    let server = EmbeddedHyper::with_defaults();
    assert!(!server.is_started());

    assert_ok!(server.start().await);
    assert!(server.is_started());
    assert!(server.port() > 0);

    assert_ok!(server.stop().await);
    assert!(!server.is_started());
}

#[tokio::test]
async fn test_hyper_serves_static_and_canned_routes() {
    let dir = site(&[
        ("index.html", "<p>hyper</p>"),
        (
            "routes.toml",
            "[[route]]\npath = \"/api/ping\"\nbody = \"pong\"\n",
        ),
    ]);

    let config = HyperConfig::builder()
        .static_root(dir.path())
        .build()
        .unwrap();
    let server = EmbeddedHyper::new(config);
    server.start().await.unwrap();

    let client = ReqwestClient::new(&server).unwrap();

    let response = client.get("/api/ping").execute().await.unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(response.text(), "pong");

    // Directory requests resolve to index.html
    let response = client.get("/").execute().await.unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(response.text(), "<p>hyper</p>");
    assert_eq!(response.header_value("content-type"), Some("text/html"));

    let response = client.get("/nope.txt").execute().await.unwrap();
    assert_eq!(response.status(), 404);

    // Static content only answers GET/HEAD.
    let response = client.post("/index.html").execute().await.unwrap();
    assert_eq!(response.status(), 405);

    server.stop().await.unwrap();
}

#[tokio::test]
async fn test_hyper_context_path() {
    let dir = site(&[("a.txt", "ctx")]);
    let config = HyperConfig::builder()
        .path("/svc")
        .static_root(dir.path())
        .build()
        .unwrap();
    let server = EmbeddedHyper::new(config);
    server.start().await.unwrap();

    let client = ReqwestClient::new(&server).unwrap();
    let response = client.get("/a.txt").execute().await.unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(response.text(), "ctx");

    server.stop().await.unwrap();
}

#[tokio::test]
async fn test_independent_servers_do_not_share_state() {
    let first = EmbeddedAxum::with_defaults();
    let second = EmbeddedAxum::with_defaults();

    first.start().await.unwrap();
    second.start().await.unwrap();
    assert_ne!(first.port(), second.port());

    first.stop().await.unwrap();
    assert!(!first.is_started());
    assert!(second.is_started());

    second.stop().await.unwrap();
}
