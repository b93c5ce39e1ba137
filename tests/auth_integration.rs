use bloodwave::configuration::get_configuration;
use bloodwave::startup::{run, AppState};
use serde_json::{json, Value};
use std::net::TcpListener;

pub struct TestApp {
    pub address: String,
    pub client: reqwest::Client,
}

impl TestApp {
    async fn post(&self, path: &str, body: &Value) -> reqwest::Response {
        self.client
            .post(&format!("{}{}", self.address, path))
            .json(body)
            .send()
            .await
            .expect("Failed to execute request.")
    }

    async fn register(&self, username: &str, password: &str, email: &str) -> reqwest::Response {
        self.post(
            "/api/auth/register",
            &json!({ "username": username, "password": password, "email": email }),
        )
        .await
    }

    async fn login(&self, username: &str, password: &str) -> reqwest::Response {
        self.post(
            "/api/auth/login",
            &json!({ "username": username, "password": password }),
        )
        .await
    }

    async fn refresh(&self, refresh_token: &str) -> reqwest::Response {
        self.post("/api/auth/refresh", &json!({ "refreshToken": refresh_token }))
            .await
    }
}

fn spawn_app() -> TestApp {
    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    let mut configuration = get_configuration().expect("Failed to read configuration.");
    configuration.password.bcrypt_cost = 4;
    let state = AppState::in_memory(&configuration).expect("Failed to build state");
    let server = run(listener, state).expect("Failed to bind address");
    let _ = tokio::spawn(server);

    TestApp {
        address,
        client: reqwest::Client::new(),
    }
}

async fn body(response: reqwest::Response) -> Value {
    response.json().await.expect("Failed to parse response")
}

// --- Registration Tests ---

#[tokio::test]
async fn register_returns_200_with_token_pair() {
    let app = spawn_app();

    let response = app.register("alice", "pw123!", "a@x.com").await;
    assert_eq!(200, response.status().as_u16());

    let body = body(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "User registered successfully");
    assert!(body["token"].is_string());
    assert!(body["refreshToken"].is_string());
    assert!(body["expiresAt"].is_string());
    assert_eq!(body["user"]["username"], "alice");
    assert_eq!(body["user"]["email"], "a@x.com");
    assert!(body["user"].get("passwordHash").is_none());
}

#[tokio::test]
async fn register_returns_409_for_duplicates() {
    let app = spawn_app();
    app.register("alice", "pw123!", "a@x.com").await;

    let same_name = app.register("alice", "other", "b@x.com").await;
    assert_eq!(409, same_name.status().as_u16());
    let same_name = body(same_name).await;
    assert_eq!(same_name["success"], false);
    assert_eq!(same_name["message"], "Username already exists");

    let same_email = app.register("bob", "pw123!", "a@x.com").await;
    assert_eq!(409, same_email.status().as_u16());
    assert_eq!(body(same_email).await["message"], "Email already registered");
}

#[tokio::test]
async fn register_returns_400_for_invalid_data() {
    let app = spawn_app();
    let test_cases = vec![
        (json!({ "username": "", "password": "pw", "email": "a@x.com" }), "empty username"),
        (json!({ "username": "alice", "password": "   ", "email": "a@x.com" }), "blank password"),
        (json!({ "username": "alice", "password": "pw", "email": "not-an-email" }), "bad email"),
        (json!({ "username": "a".repeat(51), "password": "pw", "email": "a@x.com" }), "long username"),
    ];

    for (payload, description) in test_cases {
        let response = app.post("/api/auth/register", &payload).await;
        assert_eq!(
            400,
            response.status().as_u16(),
            "The API did not fail with 400 Bad Request for {}.",
            description
        );
        assert_eq!(body(response).await["success"], false);
    }
}

// --- Login Tests ---

#[tokio::test]
async fn login_failures_are_indistinguishable() {
    let app = spawn_app();
    app.register("alice", "pw123!", "a@x.com").await;

    let wrong_password = app.login("alice", "wrong").await;
    let unknown_user = app.login("mallory", "pw123!").await;

    assert_eq!(401, wrong_password.status().as_u16());
    assert_eq!(401, unknown_user.status().as_u16());
    assert_eq!(body(wrong_password).await, body(unknown_user).await);
}

#[tokio::test]
async fn login_with_blank_fields_is_a_credentials_failure() {
    let app = spawn_app();
    app.register("alice", "pw123!", "a@x.com").await;

    let reference = body(app.login("alice", "wrong").await).await;
    for (username, password) in [("", "pw123!"), ("alice", "")] {
        let response = app.login(username, password).await;
        assert_eq!(401, response.status().as_u16());
        assert_eq!(body(response).await, reference);
    }
}

// --- Full session flow ---

#[tokio::test]
async fn refresh_rotates_and_rejects_replay() {
    let app = spawn_app();
    let registered = body(app.register("alice", "pw123!", "a@x.com").await).await;

    let login = app.login("alice", "pw123!").await;
    assert_eq!(200, login.status().as_u16());
    let login = body(login).await;
    assert_eq!(login["message"], "Login successful");
    assert_ne!(login["refreshToken"], registered["refreshToken"]);

    let old_token = login["refreshToken"].as_str().unwrap();
    let refreshed = app.refresh(old_token).await;
    assert_eq!(200, refreshed.status().as_u16());
    let refreshed = body(refreshed).await;
    assert_eq!(refreshed["message"], "Token refreshed successfully");
    assert_ne!(refreshed["refreshToken"], login["refreshToken"]);

    let replay = app.refresh(old_token).await;
    assert_eq!(401, replay.status().as_u16());
    assert_eq!(body(replay).await["message"], "Invalid or expired refresh token");
}

#[tokio::test]
async fn concurrent_refresh_has_single_winner() {
    let app = spawn_app();
    let registered = body(app.register("alice", "pw123!", "a@x.com").await).await;
    let token = registered["refreshToken"].as_str().unwrap();

    let (a, b) = tokio::join!(app.refresh(token), app.refresh(token));

    let mut statuses = vec![a.status().as_u16(), b.status().as_u16()];
    statuses.sort();
    assert_eq!(statuses, vec![200, 401]);
}

#[tokio::test]
async fn logout_requires_bearer_token() {
    let app = spawn_app();

    let response = app.post("/api/auth/logout", &json!({})).await;
    assert_eq!(401, response.status().as_u16());

    let response = app
        .client
        .post(&format!("{}/api/auth/logout", app.address))
        .bearer_auth("not-a-jwt")
        .send()
        .await
        .expect("Failed to execute request.");
    assert_eq!(401, response.status().as_u16());
    assert_eq!(body(response).await["success"], false);
}

#[tokio::test]
async fn logout_revokes_refresh_tokens() {
    let app = spawn_app();
    let registered = body(app.register("alice", "pw123!", "a@x.com").await).await;
    let access_token = registered["token"].as_str().unwrap();

    let response = app
        .client
        .post(&format!("{}/api/auth/logout", app.address))
        .bearer_auth(access_token)
        .send()
        .await
        .expect("Failed to execute request.");
    assert_eq!(200, response.status().as_u16());
    assert_eq!(body(response).await["message"], "Logged out successfully");

    let refresh = app
        .refresh(registered["refreshToken"].as_str().unwrap())
        .await;
    assert_eq!(401, refresh.status().as_u16());
}
