//! Integration tests for the `machdesk` CLI binary.
//!
//! Argument parsing, help output, completions, and the offline route
//! guard run without any backend. The end-to-end tests point the binary
//! at a wiremock server standing in for both the identity provider and
//! the resource API.
#![allow(clippy::unwrap_used)]

use assert_cmd::cargo::cargo_bin_cmd;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use predicates::prelude::*;
use serde_json::json;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TOKEN_PATH: &str = "/realms/machine_management/protocol/openid-connect/token";

// ── Helpers ─────────────────────────────────────────────────────────

/// Build a [`Command`] for the `machdesk` binary with env isolation.
///
/// Clears all `MACHDESK_*` env vars and points config directories at a
/// nonexistent path so tests never touch the user's real configuration.
fn machdesk_cmd() -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("machdesk");
    cmd.env("HOME", "/tmp/machdesk-cli-test-nonexistent")
        .env("XDG_CONFIG_HOME", "/tmp/machdesk-cli-test-nonexistent")
        .env_remove("RUST_LOG");
    for var in [
        "MACHDESK_PROFILE",
        "MACHDESK_PROVIDER_URL",
        "MACHDESK_API_URL",
        "MACHDESK_USERNAME",
        "MACHDESK_PASSWORD",
        "MACHDESK_REFRESH_TOKEN",
        "MACHDESK_OUTPUT",
        "MACHDESK_INSECURE",
        "MACHDESK_TIMEOUT",
    ] {
        cmd.env_remove(var);
    }
    cmd
}

/// Concatenate stdout + stderr from a command output for flexible matching.
fn combined_output(output: &std::process::Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("{stdout}{stderr}")
}

fn jwt(claims: &serde_json::Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256"}"#);
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{header}.{payload}.signature")
}

fn access_token(user: &str) -> String {
    jwt(&json!({ "sub": format!("id-{user}"), "preferred_username": user }))
}

/// A binary wired to `server` with a remembered session, so the silent
/// check signs in without the keyring.
fn remembered_cmd(server: &MockServer) -> assert_cmd::Command {
    let mut cmd = machdesk_cmd();
    cmd.env("MACHDESK_PROVIDER_URL", server.uri())
        .env("MACHDESK_API_URL", server.uri())
        .env("MACHDESK_REFRESH_TOKEN", "remembered")
        .env("MACHDESK_PASSWORD", "unused");
    cmd
}

async fn mount_refresh_grant(server: &MockServer, user: &str) {
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(body_string_contains("grant_type=refresh_token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": access_token(user),
            "expires_in": 300,
            "refresh_token": "rotated",
            "token_type": "Bearer"
        })))
        .mount(server)
        .await;
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_no_args_shows_help() {
    let output = machdesk_cmd().output().unwrap();
    assert_eq!(output.status.code(), Some(2), "Expected exit code 2");
    let text = combined_output(&output);
    assert!(text.contains("Usage"), "Expected 'Usage' in output:\n{text}");
}

#[test]
fn test_help_flag() {
    machdesk_cmd().arg("--help").assert().success().stdout(
        predicate::str::contains("machines")
            .and(predicate::str::contains("session"))
            .and(predicate::str::contains("routes")),
    );
}

#[test]
fn test_version_flag() {
    machdesk_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("machdesk"));
}

#[test]
fn test_invalid_subcommand() {
    let output = machdesk_cmd().arg("foobar").output().unwrap();
    assert!(!output.status.success());
    let text = combined_output(&output);
    assert!(
        text.contains("unrecognized") || text.contains("foobar"),
        "Expected error mentioning invalid subcommand:\n{text}"
    );
}

#[test]
fn test_invalid_output_format() {
    let output = machdesk_cmd()
        .args(["--output", "invalid", "routes", "list"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(combined_output(&output).contains("possible values"));
}

// ── Shell completions ───────────────────────────────────────────────

#[test]
fn test_completions_bash() {
    machdesk_cmd()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty().not());
}

#[test]
fn test_completions_zsh() {
    machdesk_cmd()
        .args(["completions", "zsh"])
        .assert()
        .success()
        .stdout(predicate::str::contains("#compdef"));
}

// ── Routes (offline) ────────────────────────────────────────────────

#[test]
fn test_routes_list() {
    machdesk_cmd()
        .args(["routes", "list"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("/dashboard")
                .and(predicate::str::contains("/maintenance-history"))
                .and(predicate::str::contains("login")),
        );
}

#[test]
fn test_routes_list_plain() {
    machdesk_cmd()
        .args(["-o", "plain", "routes", "list"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("/\n/dashboard\n"));
}

#[test]
fn test_anonymous_protected_route_redirects_to_login() {
    machdesk_cmd()
        .args(["-o", "plain", "routes", "check", "/machines", "--as", "anonymous"])
        .assert()
        .success()
        .stdout("/\n");
}

#[test]
fn test_authenticated_login_route_redirects_to_dashboard() {
    machdesk_cmd()
        .args(["-o", "plain", "routes", "check", "/", "--as", "authenticated"])
        .assert()
        .success()
        .stdout("/dashboard\n");
}

#[test]
fn test_unknown_route_reports_reason() {
    machdesk_cmd()
        .args([
            "-o",
            "json-compact",
            "routes",
            "check",
            "/nowhere",
            "--as",
            "anonymous",
        ])
        .assert()
        .success()
        .stdout(
            predicate::str::contains(r#""requested":"/nowhere""#)
                .and(predicate::str::contains(r#""reason":"unknown_route""#)),
        );
}

// ── Config ──────────────────────────────────────────────────────────

#[test]
fn test_config_show_without_file() {
    machdesk_cmd()
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("default_profile"));
}

#[test]
fn test_config_path() {
    machdesk_cmd()
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("config.toml"));
}

#[test]
fn test_unknown_profile_fails() {
    let output = machdesk_cmd()
        .args(["--profile", "missing", "machines", "list"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(4));
    assert!(combined_output(&output).contains("missing"));
}

#[test]
fn test_subcommands_exist() {
    machdesk_cmd()
        .args(["machines", "--help"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("list")
                .and(predicate::str::contains("get"))
                .and(predicate::str::contains("watch")),
        );
    machdesk_cmd()
        .args(["session", "--help"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("status")
                .and(predicate::str::contains("login"))
                .and(predicate::str::contains("logout")),
        );
}

// ── End to end ──────────────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread")]
async fn test_machines_list_with_remembered_session() {
    let server = MockServer::start().await;
    mount_refresh_grant(&server, "carol").await;
    let bearer = format!("Bearer {}", access_token("carol"));
    Mock::given(method("GET"))
        .and(path("/machines"))
        .and(header("authorization", bearer.as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "machines": [
                { "id": 1, "name": "Lathe", "category": "turning" },
                { "id": 2, "name": "Mill", "category": "milling" }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    remembered_cmd(&server)
        .args(["-o", "plain", "machines", "list"])
        .assert()
        .success()
        .stdout("1\n2\n");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_machines_list_filters_by_category() {
    let server = MockServer::start().await;
    mount_refresh_grant(&server, "carol").await;
    Mock::given(method("GET"))
        .and(path("/machines"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "machines": [
                { "id": 1, "name": "Lathe", "category": "turning" },
                { "id": 2, "name": "Mill", "category": "milling" }
            ]
        })))
        .mount(&server)
        .await;

    remembered_cmd(&server)
        .args(["-o", "plain", "machines", "list", "--category", "milling"])
        .assert()
        .success()
        .stdout("2\n");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_machines_get_matches_string_id() {
    let server = MockServer::start().await;
    mount_refresh_grant(&server, "carol").await;
    Mock::given(method("GET"))
        .and(path("/machines"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "machines": [{ "id": "42", "name": "Bandsaw", "category": "cutting" }]
        })))
        .mount(&server)
        .await;

    remembered_cmd(&server)
        .args(["-o", "plain", "machines", "get", "42"])
        .assert()
        .success()
        .stdout("42\n");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_session_status_reports_user() {
    let server = MockServer::start().await;
    mount_refresh_grant(&server, "carol").await;

    remembered_cmd(&server)
        .args(["-o", "json", "session", "status"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains(r#""state": "authenticated""#)
                .and(predicate::str::contains(r#""username": "carol""#)),
        );
}

#[tokio::test(flavor = "multi_thread")]
async fn test_resource_rejection_exits_with_auth_code() {
    let server = MockServer::start().await;
    mount_refresh_grant(&server, "carol").await;
    Mock::given(method("GET"))
        .and(path("/machines"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({ "error": "expired" })))
        .mount(&server)
        .await;

    let output = remembered_cmd(&server)
        .args(["machines", "list"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(3));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_provider_outage_exits_with_connection_code() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .mount(&server)
        .await;

    let output = remembered_cmd(&server)
        .args(["routes", "check", "/dashboard"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(7));
    assert!(combined_output(&output).contains("initialized"));
}
