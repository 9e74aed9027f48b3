//! Integration tests for the login, status, logout and document commands.

use std::fs;
use std::path::Path;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use serde_json::json;
use tempfile::tempdir;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn write_session(home: &Path, session: &serde_json::Value) {
    fs::write(home.join("session.json"), session.to_string()).unwrap();
}

fn read_session(home: &Path) -> serde_json::Value {
    serde_json::from_str(&fs::read_to_string(home.join("session.json")).unwrap()).unwrap()
}

#[test]
fn test_status_when_nothing_linked() {
    let home = tempdir().unwrap();

    cargo_bin_cmd!("docgen")
        .env("DOCGEN_HOME", home.path())
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("GitHub:     not linked"))
        .stdout(predicate::str::contains("Confluence: not linked"));
}

#[test]
fn test_status_masks_tokens() {
    let home = tempdir().unwrap();
    write_session(
        home.path(),
        &json!({
            "accessToken": "gho_abcdefghijklmnopqrstuvwxyz",
            "confluenceAccessToken": "short",
            "confluenceCloudId": "cloud-1"
        }),
    );

    cargo_bin_cmd!("docgen")
        .env("DOCGEN_HOME", home.path())
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("gho_abcdefgh..."))
        .stdout(predicate::str::contains("cloud id: cloud-1"))
        .stdout(predicate::str::contains("gho_abcdefghijklmnopqrstuvwxyz").not());
}

#[test]
fn test_logout_when_not_logged_in() {
    let home = tempdir().unwrap();

    cargo_bin_cmd!("docgen")
        .env("DOCGEN_HOME", home.path())
        .arg("logout")
        .assert()
        .success()
        .stdout(predicate::str::contains("Not logged in"));
}

#[test]
fn test_logout_removes_session_file() {
    let home = tempdir().unwrap();
    write_session(home.path(), &json!({"accessToken": "gho_token"}));

    cargo_bin_cmd!("docgen")
        .env("DOCGEN_HOME", home.path())
        .arg("logout")
        .assert()
        .success()
        .stdout(predicate::str::contains("Logged out"));

    assert!(!home.path().join("session.json").exists());
}

#[test]
fn test_login_without_client_id_fails() {
    let home = tempdir().unwrap();

    cargo_bin_cmd!("docgen")
        .env("DOCGEN_HOME", home.path())
        .env("DOCGEN_NO_BROWSER", "1")
        .env_remove("DOCGEN_GITHUB_CLIENT_ID")
        .arg("login")
        .assert()
        .failure()
        .stderr(predicate::str::contains("DOCGEN_GITHUB_CLIENT_ID"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_login_with_pasted_redirect_stores_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/get_access_token"))
        .and(query_param("code", "gh-code"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access_token": "gho_pasted"})))
        .expect(1)
        .mount(&server)
        .await;
    let home = tempdir().unwrap();

    cargo_bin_cmd!("docgen")
        .env("DOCGEN_HOME", home.path())
        .env("DOCGEN_NO_BROWSER", "1")
        .env("DOCGEN_GITHUB_CLIENT_ID", "client-123")
        .env("DOCGEN_BACKEND_URL", server.uri())
        .arg("login")
        .write_stdin("http://localhost:3000/?code=gh-code\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("client_id=client-123"))
        .stdout(predicate::str::contains("Linked GitHub account"));

    assert_eq!(read_session(home.path())["accessToken"], "gho_pasted");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_confluence_callback_stores_token_and_cloud_id() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/get_confluence_token"))
        .and(query_param("code", "atl-code"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"access_token": "atl_token", "cloud_id": "cloud-9"})),
        )
        .expect(1)
        .mount(&server)
        .await;
    let home = tempdir().unwrap();
    write_session(home.path(), &json!({"accessToken": "gho_existing"}));

    cargo_bin_cmd!("docgen")
        .env("DOCGEN_HOME", home.path())
        .args(["--backend-url", &server.uri()])
        .args(["callback", "atl-code", "--confluence"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Linked Confluence account"));

    let session = read_session(home.path());
    assert_eq!(session["accessToken"], "gho_existing");
    assert_eq!(session["confluenceAccessToken"], "atl_token");
    assert_eq!(session["confluenceCloudId"], "cloud-9");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_failed_exchange_exits_nonzero() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/get_access_token"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({"error": "bad code"})))
        .mount(&server)
        .await;
    let home = tempdir().unwrap();

    cargo_bin_cmd!("docgen")
        .env("DOCGEN_HOME", home.path())
        .args(["--backend-url", &server.uri()])
        .args(["callback", "?code=nope"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("GitHub login did not complete"));

    assert!(!home.path().join("session.json").exists());
}

#[test]
fn test_fetch_requires_login() {
    let home = tempdir().unwrap();

    cargo_bin_cmd!("docgen")
        .env("DOCGEN_HOME", home.path())
        .args(["fetch", "octocat/Hello-World"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Log in with GitHub first"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_fetch_writes_document_and_pushes() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/get_doc"))
        .and(header("authorization", "Bearer gho_token"))
        .and(body_json(json!({"repo_url": "octocat/Hello-World"})))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"doc_content": "# Hello", "commit_hash": "abc123"})),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/create_confluence"))
        .and(body_json(json!({
            "repo_url": "octocat/Hello-World",
            "cloud_id": "cloud-1",
            "confluence_access_code": "atl_token",
            "commit_hash": "abc123"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;
    let home = tempdir().unwrap();
    write_session(
        home.path(),
        &json!({
            "accessToken": "gho_token",
            "confluenceAccessToken": "atl_token",
            "confluenceCloudId": "cloud-1"
        }),
    );
    let output = home.path().join("README.generated.md");

    cargo_bin_cmd!("docgen")
        .env("DOCGEN_HOME", home.path())
        .args(["--backend-url", &server.uri()])
        .args(["fetch", "octocat/Hello-World", "--push", "-o"])
        .arg(&output)
        .assert()
        .success()
        .stderr(predicate::str::contains("Fetch successful!"))
        .stderr(predicate::str::contains("Push successful!"));

    assert_eq!(fs::read_to_string(&output).unwrap(), "# Hello");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_fetch_prints_document_to_stdout() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/get_doc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"doc_content": "# Docs"})))
        .mount(&server)
        .await;
    let home = tempdir().unwrap();
    write_session(home.path(), &json!({"accessToken": "gho_token"}));

    cargo_bin_cmd!("docgen")
        .env("DOCGEN_HOME", home.path())
        .args(["--backend-url", &server.uri()])
        .args(["fetch", "octocat/Hello-World"])
        .assert()
        .success()
        .stdout(predicate::str::contains("# Docs"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_fetch_reports_backend_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/get_doc"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({"error": "Repository not found"})))
        .mount(&server)
        .await;
    let home = tempdir().unwrap();
    write_session(home.path(), &json!({"accessToken": "gho_token"}));

    cargo_bin_cmd!("docgen")
        .env("DOCGEN_HOME", home.path())
        .args(["--backend-url", &server.uri()])
        .args(["fetch", "octocat/missing"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Repository not found"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_webhook_already_exists_is_not_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/setup-webhook"))
        .and(header("authorization", "Bearer gho_token"))
        .respond_with(
            ResponseTemplate::new(422)
                .set_body_json(json!({"error": "Hook already exists on this repository"})),
        )
        .mount(&server)
        .await;
    let home = tempdir().unwrap();
    write_session(home.path(), &json!({"accessToken": "gho_token"}));

    cargo_bin_cmd!("docgen")
        .env("DOCGEN_HOME", home.path())
        .args(["--backend-url", &server.uri()])
        .args(["webhook", "octocat/Hello-World"])
        .assert()
        .success()
        .stderr(predicate::str::contains("Webhook already exists on this repository"));
}

#[test]
fn test_push_requires_confluence_link() {
    let home = tempdir().unwrap();
    write_session(home.path(), &json!({"accessToken": "gho_token"}));

    cargo_bin_cmd!("docgen")
        .env("DOCGEN_HOME", home.path())
        .args(["push", "octocat/Hello-World", "--commit", "abc123"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Link your Confluence account first"));
}
