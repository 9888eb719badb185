//! Session wiring: persisted credentials, refresh through the backend,
//! and logout.

mod support;

use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use tempfile::TempDir;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use waprov::auth::{CredentialPersistence, FileCredentialPersistence, LogoutReason};
use waprov::config::ClientConfig;
use waprov::session::Session;

use support::{credentials, CountingLogoutHandler};

fn temp_config(dir: &TempDir, backend: &str) -> ClientConfig {
    ClientConfig::default()
        .with_backend_url(backend)
        .with_credentials_dir(dir.path())
        .with_logout_delay(Duration::ZERO)
}

#[tokio::test]
async fn credentials_survive_a_restart() {
    let dir = TempDir::new().expect("tempdir");
    let config = temp_config(&dir, "http://localhost:1/api");

    let first = Session::from_config(&config).unwrap();
    assert!(first.credentials().is_none());
    first.sign_in(credentials("a1", Some("r1"))).unwrap();

    let second = Session::from_config(&config).unwrap();
    let restored = second.credentials().expect("restored credentials");
    assert_eq!(restored.access_token, "a1");
    assert_eq!(restored.refresh_token.as_deref(), Some("r1"));
}

#[tokio::test]
async fn refresh_rotates_persisted_credentials() {
    let dir = TempDir::new().expect("tempdir");
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/me"))
        .and(header("Authorization", "Bearer a1"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/me"))
        .and(header("Authorization", "Bearer a2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 7})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/auth/refresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "a2",
            "refresh_token": "r2",
            "expires_in": 900
        })))
        .expect(1)
        .mount(&server)
        .await;

    let config = temp_config(&dir, &format!("{}/api", server.uri()));
    let session = Session::from_config(&config).unwrap();
    session.sign_in(credentials("a1", Some("r1"))).unwrap();

    let me: Value = session.client().get_json("me").await.unwrap();
    assert_eq!(me["id"], 7);

    let persisted = FileCredentialPersistence::new(dir.path())
        .load()
        .unwrap()
        .expect("persisted credentials");
    assert_eq!(persisted.access_token, "a2");
    assert_eq!(persisted.refresh_token.as_deref(), Some("r2"));
}

#[tokio::test]
async fn logout_clears_file_and_notifies_handler() {
    let dir = TempDir::new().expect("tempdir");
    let config = temp_config(&dir, "http://localhost:1/api");
    let handler = Arc::new(CountingLogoutHandler::default());
    let session = Session::with_logout_handler(&config, handler.clone()).unwrap();
    session.sign_in(credentials("a1", Some("r1"))).unwrap();
    let file = FileCredentialPersistence::new(dir.path());
    assert!(file.path().exists());

    session.logout().unwrap();
    session.logout().unwrap();

    assert!(session.credentials().is_none());
    assert!(!file.path().exists());
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(handler.reasons(), vec![LogoutReason::Requested]);
}

#[test]
fn config_reads_environment_lookup() {
    let config = ClientConfig::from_lookup(|key| match key {
        "WAPROV_BACKEND_URL" => Some("https://admin.example/api".to_string()),
        "WAPROV_INSTANCES_PATH" => Some("/v2/instances/".to_string()),
        "WAPROV_REFRESH_TIMEOUT_SECS" => Some("4".to_string()),
        _ => None,
    })
    .unwrap();
    assert_eq!(config.instances_path(), "/v2/instances/");
    assert_eq!(config.refresh_timeout(), Duration::from_secs(4));
    assert_eq!(config.refresh_url(), "https://admin.example/api/auth/refresh");
}
