//! Integration tests for the urlstash binary
//!
//! Each test spawns the real binary against its own mock HTTP server and
//! scratch directories. Environment variables are set on the spawned
//! process only; the test process itself never mutates its environment.

use assert_cmd::Command;
use mockito::{Server, ServerGuard};
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

use urlstash::config;

const LISTING_BODY: &str = r#"<!DOCTYPE HTML PUBLIC "-//W3C//DTD HTML 3.2 Final//EN">
<html><body><h1>Index of /products</h1>
<a href="?C=N;O=D">Name</a>
<a href="sub/">sub/</a>
<a href="granule.hdf">granule.hdf</a>
</body></html>
"#;

struct CliContext {
    server: ServerGuard,
    dir: TempDir,
}

impl CliContext {
    fn setup() -> Self {
        Self {
            server: Server::new(),
            dir: TempDir::new().expect("scratch dir"),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.server.url(), path)
    }

    /// Command for the binary with a scrubbed environment.
    fn cmd(&self) -> Command {
        let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("urlstash"));
        cmd.env_remove(config::CACHE_ENV_VAR)
            .env_remove(config::USERNAME_ENV_VAR)
            .env_remove(config::PASSWORD_ENV_VAR)
            .env_remove("RUST_LOG");
        cmd
    }

    fn mock_listing(&mut self) -> mockito::Mock {
        self.server
            .mock("GET", "/products")
            .with_status(200)
            .with_header("content-type", "text/html")
            .with_body(LISTING_BODY)
            .expect(1)
            .create()
    }
}

/// Test that the binary exists and shows its subcommands
#[test]
fn test_help_lists_subcommands() {
    let ctx = CliContext::setup();
    ctx.cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("get"))
        .stdout(predicate::str::contains("links"))
        .stdout(predicate::str::contains("clear"));
}

/// Test: get writes the body to stdout
#[test]
fn test_get_writes_body_to_stdout() {
    let mut ctx = CliContext::setup();
    let mock = ctx
        .server
        .mock("GET", "/hello.txt")
        .with_status(200)
        .with_body("hello stash")
        .expect(1)
        .create();

    ctx.cmd()
        .arg("get")
        .arg(ctx.url("/hello.txt"))
        .assert()
        .success()
        .stdout("hello stash");

    mock.assert();
}

/// Test: the shared cache root variable feeds the cache across runs
#[test]
fn test_get_uses_shared_cache_root() {
    let mut ctx = CliContext::setup();
    let mock = ctx
        .server
        .mock("GET", "/data/file.txt")
        .with_status(200)
        .with_body("payload")
        .expect(1)
        .create();

    ctx.cmd()
        .env(config::CACHE_ENV_VAR, ctx.dir.path())
        .arg("get")
        .arg(ctx.url("/data/file.txt"))
        .arg("--cache")
        .assert()
        .success()
        .stdout("payload");

    let entry = ctx.dir.path().join("data/file.txt");
    assert_eq!(fs::read_to_string(&entry).expect("cached entry"), "payload");

    // The second run is served from the cache: still one request total.
    ctx.cmd()
        .env(config::CACHE_ENV_VAR, ctx.dir.path())
        .arg("get")
        .arg(ctx.url("/data/file.txt"))
        .arg("--cache")
        .assert()
        .success()
        .stdout("payload");

    mock.assert();
}

/// Test: get -o saves to the named file and prints nothing
#[test]
fn test_get_output_file() {
    let mut ctx = CliContext::setup();
    let mock = ctx
        .server
        .mock("GET", "/hello.txt")
        .with_status(200)
        .with_body("file payload")
        .expect(1)
        .create();

    let out = ctx.dir.path().join("out.bin");
    ctx.cmd()
        .arg("get")
        .arg(ctx.url("/hello.txt"))
        .arg("-o")
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::is_empty());

    mock.assert();
    assert_eq!(fs::read_to_string(&out).expect("output file"), "file payload");
}

/// Test: links prints one discovered URL per line, in document order
#[test]
fn test_links_lists_discovered_urls() {
    let mut ctx = CliContext::setup();
    let mock = ctx.mock_listing();

    let expected = format!(
        "{0}/products/sub\n{0}/products/granule.hdf\n",
        ctx.server.url()
    );
    ctx.cmd()
        .arg("links")
        .arg(ctx.url("/products"))
        .assert()
        .success()
        .stdout(expected);

    mock.assert();
}

/// Test: links --json emits a JSON array of the discovered URLs
#[test]
fn test_links_json_output() {
    let mut ctx = CliContext::setup();
    let mock = ctx.mock_listing();

    let assert = ctx
        .cmd()
        .arg("links")
        .arg(ctx.url("/products"))
        .arg("--json")
        .assert()
        .success();
    mock.assert();

    let stdout = String::from_utf8(assert.get_output().stdout.clone()).expect("utf8 stdout");
    let urls: Vec<String> = serde_json::from_str(&stdout).expect("json array");
    assert_eq!(
        urls,
        vec![
            format!("{}/products/sub", ctx.server.url()),
            format!("{}/products/granule.hdf", ctx.server.url()),
        ]
    );
}

/// Test: clear removes the entry a previous get cached
#[test]
fn test_clear_removes_cached_entry() {
    let mut ctx = CliContext::setup();
    let mock = ctx
        .server
        .mock("GET", "/data/file.txt")
        .with_status(200)
        .with_body("payload")
        .expect(1)
        .create();

    ctx.cmd()
        .arg("get")
        .arg(ctx.url("/data/file.txt"))
        .arg("--cache")
        .arg("--cache-dir")
        .arg(ctx.dir.path())
        .assert()
        .success();
    mock.assert();

    let entry = ctx.dir.path().join("data/file.txt");
    assert!(entry.exists());

    ctx.cmd()
        .arg("clear")
        .arg(ctx.url("/data/file.txt"))
        .arg("--cache")
        .arg("--cache-dir")
        .arg(ctx.dir.path())
        .assert()
        .success();

    assert!(!entry.exists());
}

/// Test: a refused fetch exits non-zero with the status in the message
#[test]
fn test_get_failure_exit_code() {
    let mut ctx = CliContext::setup();
    let mock = ctx
        .server
        .mock("GET", "/missing.txt")
        .with_status(404)
        .expect(1)
        .create();

    ctx.cmd()
        .arg("get")
        .arg(ctx.url("/missing.txt"))
        .arg("--auth")
        .arg("none")
        .assert()
        .failure()
        .stderr(predicate::str::contains("404"));

    mock.assert();
}

/// Test: --log appends diagnostics to the named file instead of stderr
#[test]
fn test_log_file_receives_diagnostics() {
    let mut ctx = CliContext::setup();
    let mock = ctx
        .server
        .mock("GET", "/hello.txt")
        .with_status(200)
        .with_body("hello stash")
        .expect(1)
        .create();

    let log = ctx.dir.path().join("run.log");
    ctx.cmd()
        .arg("get")
        .arg(ctx.url("/hello.txt"))
        .arg("--verbose")
        .arg("--log")
        .arg(&log)
        .assert()
        .success()
        .stdout("hello stash")
        .stderr(predicate::str::is_empty());

    mock.assert();
    let diagnostics = fs::read_to_string(&log).expect("log file");
    assert!(diagnostics.contains("retrieved"));
}
