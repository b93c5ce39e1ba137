//! Integration tests for the public liveness endpoints

use bloodwave::configuration::get_configuration;
use bloodwave::startup::{run, AppState};
use serde_json::Value;
use std::net::TcpListener;

fn spawn_app() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();

    let mut configuration = get_configuration().expect("Failed to read configuration.");
    configuration.password.bcrypt_cost = 4;
    let state = AppState::in_memory(&configuration).expect("Failed to build state");
    let server = run(listener, state).expect("Failed to create server");

    let _ = tokio::spawn(server);

    format!("http://127.0.0.1:{}", port)
}

#[tokio::test]
async fn health_check_works() {
    let addr = spawn_app();

    let response = reqwest::Client::new()
        .get(&format!("{}/health_check", addr))
        .send()
        .await
        .expect("Failed to execute request");

    assert!(response.status().is_success());
    assert_eq!(Some(0), response.content_length());
}

#[tokio::test]
async fn ping_reports_alive() {
    let addr = spawn_app();

    let response = reqwest::Client::new()
        .get(&format!("{}/api/test/ping", addr))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(200, response.status().as_u16());
    assert!(response.headers().contains_key("x-request-id"));

    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["ok"], true);
    assert_eq!(body["message"], "Bloodwave API is alive");
    assert!(body["utc"].is_string());
}
