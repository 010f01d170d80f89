//! End-to-end tests of the `wayfarer` binary.

use assert_cmd::Command;
use camino::Utf8PathBuf;
use predicates::prelude::*;
use serde_json::{Value, json};
use std::fs;
use std::net::SocketAddr;
use std::sync::Arc;
use tempfile::TempDir;
use wayfarer::{DataPaths, Pipeline, ReferenceGenerator};
use wayfarer_server::api::{AppState, router};

const OVERRIDE_VARS: &[&str] = &[
    "WAYFARER_PORT",
    "WAYFARER_GENERATOR_PORT",
    "WAYFARER_DATA_DIR",
    "WAYFARER_GENERATOR_MODE",
    "WAYFARER_GENERATOR_URL",
    "WAYFARER_API_URL",
    "WAYFARER_HOME",
    "RUST_LOG",
];

/// Binary run inside `dir`, which is marked as a repository root so
/// config discovery stops there.
fn wayfarer(dir: &TempDir) -> Command {
    fs::create_dir_all(dir.path().join(".git")).unwrap();
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_wayfarer"));
    cmd.current_dir(dir.path());
    for var in OVERRIDE_VARS {
        cmd.env_remove(var);
    }
    cmd
}

/// Retrieval API on its own runtime thread, reference generator, data
/// under `dir/data`.
fn spawn_api(dir: &TempDir) -> SocketAddr {
    let paths = DataPaths::in_dir(Utf8PathBuf::from_path_buf(dir.path().join("data")).unwrap());
    paths.ensure().unwrap();
    let pipeline = Arc::new(Pipeline::new(paths, Arc::new(ReferenceGenerator::new()), 900));

    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.set_nonblocking(true).unwrap();
    let addr = listener.local_addr().unwrap();
    std::thread::spawn(move || {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async move {
            let listener = tokio::net::TcpListener::from_std(listener).unwrap();
            axum::serve(listener, router(AppState::new(pipeline))).await.unwrap();
        });
    });
    addr
}

fn closed_port() -> SocketAddr {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap()
}

#[test]
fn generate_filters_ndjson() {
    let dir = TempDir::new().unwrap();
    let input = concat!(
        "{\"from\":\"NYC\",\"to\":\"Paris\",\"start_date\":\"2025-06-01\",\"end_date\":\"2025-06-10\",\"people\":\"2\"}\n",
        "{\"error\":\"Invalid JSON on line 2\",\"raw\":\"<html>\"}\n",
    );

    let output = wayfarer(&dir)
        .arg("generate")
        .write_stdin(input)
        .output()
        .unwrap();

    assert!(output.status.success());
    let lines: Vec<Value> = String::from_utf8(output.stdout)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0]["Flights"].as_str().unwrap().starts_with("Depart from NYC to PAR"));
    assert_eq!(lines[1], json!({"error": "Invalid JSON on line 2", "key": 1}));
}

#[test]
fn generate_refine_reads_one_document() {
    let dir = TempDir::new().unwrap();
    let doc = json!({"itinerary": {"to": "Paris"}, "message": "late checkout", "key": 0});

    wayfarer(&dir)
        .args(["generate", "--refine"])
        .write_stdin(doc.to_string())
        .assert()
        .success()
        .stdout(predicate::str::contains("\"refinements\":[\"late checkout\"]"));
}

#[test]
fn config_shows_sources() {
    let dir = TempDir::new().unwrap();
    fs::create_dir_all(dir.path().join(".wayfarer")).unwrap();
    fs::write(
        dir.path().join(".wayfarer/config.toml"),
        "[server]\nport = 4000\n",
    )
    .unwrap();

    wayfarer(&dir)
        .args(["config", "--api-url", "http://api.test:3000"])
        .env("WAYFARER_GENERATOR_MODE", "http")
        .assert()
        .success()
        .stdout(predicate::str::contains("server.port = 4000  [config file"))
        .stdout(predicate::str::contains("client.base_url = http://api.test:3000  [cli]"))
        .stdout(predicate::str::contains(
            "generator.mode = http  [env (WAYFARER_GENERATOR_MODE)]",
        ))
        .stdout(predicate::str::contains("generator.timeout_secs = 120  [defaults]"));
}

#[test]
fn invalid_configuration_exits_2() {
    let dir = TempDir::new().unwrap();

    wayfarer(&dir)
        .args(["config", "--generator-mode", "shell"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("generator.mode"));
}

#[test]
fn show_without_a_plan_is_a_usage_error() {
    let dir = TempDir::new().unwrap();

    wayfarer(&dir)
        .args(["show", "--api-url", &format!("http://{}", closed_port())])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("wayfarer plan"));
}

#[test]
fn unreachable_api_exits_75() {
    let dir = TempDir::new().unwrap();

    wayfarer(&dir)
        .args(["plan", "--to", "Paris", "--api-url", &format!("http://{}", closed_port())])
        .assert()
        .code(75)
        .stderr(predicate::str::contains("wayfarer serve"));
    assert!(!dir.path().join(".wayfarer/session.json").exists());
}

#[test]
fn plan_show_refine_against_live_api() {
    let dir = TempDir::new().unwrap();
    let api = format!("http://{}", spawn_api(&dir));

    wayfarer(&dir)
        .args([
            "plan",
            "--from",
            "NYC",
            "--to",
            "Paris",
            "--start-date",
            "2025-06-01",
            "--end-date",
            "2025-06-10",
            "--people",
            "2",
            "--api-url",
            &api,
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Data saved successfully (key 0)"))
        .stdout(predicate::str::contains("[0]\n  Flights: Depart from NYC to PAR"))
        .stdout(predicate::str::contains("[1]\n  (no itinerary yet)"));

    wayfarer(&dir)
        .args(["show", "0", "--api-url", &api])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"to\": \"Paris\""));

    let session: Value =
        serde_json::from_str(&fs::read_to_string(dir.path().join(".wayfarer/session.json")).unwrap())
            .unwrap();
    assert_eq!(session["active_key"], json!(0));
    assert_eq!(session["preview_keys"], json!([0, 1, 2]));

    wayfarer(&dir)
        .args(["refine", "stay near the Louvre", "--api-url", &api])
        .assert()
        .success()
        .stdout(predicate::str::contains("stay near the Louvre"));

    wayfarer(&dir)
        .args(["show", "5", "--api-url", &api])
        .assert()
        .success()
        .stdout(predicate::str::contains("No itinerary at key 5 yet."));

    wayfarer(&dir)
        .args(["status", "--api-url", &api])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"requests\": 1"));
}
