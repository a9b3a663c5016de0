//! End-to-end tests for signup, login, rotation, logout and the auth gate

use serde_json::{json, Value};
use std::net::TcpListener;
use std::sync::Arc;
use studyroom::auth::{SessionManager, TokenCodec};
use studyroom::configuration::{ApplicationSettings, JwtSettings, RateLimitSettings};
use studyroom::startup::run;
use studyroom::store::InMemoryCredentialStore;

pub struct TestApp {
    pub address: String,
    pub client: reqwest::Client,
}

fn jwt_settings() -> JwtSettings {
    JwtSettings {
        access_secret: "flow-access-secret-at-least-32-bytes!!".to_string(),
        refresh_secret: "flow-refresh-secret-at-least-32-bytes!".to_string(),
        access_token_expiry: 3600,
        refresh_token_expiry: 604800,
        issuer: "studyroom-test".to_string(),
    }
}

fn spawn_app_with(jwt: JwtSettings, rate_limit: RateLimitSettings) -> TestApp {
    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();

    let codec = TokenCodec::new(&jwt).expect("Failed to build token codec");
    let sessions = SessionManager::new(codec, Arc::new(InMemoryCredentialStore::new()));

    let server = run(listener, sessions, ApplicationSettings::default(), rate_limit)
        .expect("Failed to bind address");
    let _ = tokio::spawn(server);

    TestApp {
        address: format!("http://127.0.0.1:{}", port),
        client: reqwest::Client::new(),
    }
}

fn spawn_app() -> TestApp {
    spawn_app_with(
        jwt_settings(),
        RateLimitSettings {
            enabled: false,
            requests_per_minute: 30,
            ..RateLimitSettings::default()
        },
    )
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

    async fn signup(&self, name: &str, email: &str, password: &str) -> reqwest::Response {
        self.post(
            "/users/signup",
            &json!({ "name": name, "email": email, "password": password }),
        )
        .await
    }

    async fn login(&self, email: &str, password: &str) -> reqwest::Response {
        self.post("/users/login", &json!({ "email": email, "password": password }))
            .await
    }

    async fn rotate(&self, refresh_token: &str) -> reqwest::Response {
        self.post("/token", &json!({ "token": refresh_token })).await
    }

    async fn logout(&self, refresh_token: &str) -> reqwest::Response {
        self.post("/logout", &json!({ "token": refresh_token })).await
    }

    async fn list_users(&self, bearer: Option<&str>) -> reqwest::Response {
        let mut request = self.client.get(&format!("{}/users", self.address));
        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        }
        request.send().await.expect("Failed to execute request.")
    }
}

async fn body_of(response: reqwest::Response) -> Value {
    response.json().await.expect("Failed to parse response")
}

// --- Signup ---

#[tokio::test]
async fn signup_returns_201_with_user_and_tokens() {
    let app = spawn_app();

    let response = app.signup("A", "a@x.com", "p").await;
    assert_eq!(201, response.status().as_u16());

    let body = body_of(response).await;
    assert_eq!(body["message"], "Signup successful");
    assert_eq!(body["user"]["name"], "A");
    assert_eq!(body["user"]["email"], "a@x.com");
    assert!(body["user"]["id"].is_string());
    assert!(body["user"].get("password").is_none());
    assert!(body["token"].is_string());
    assert!(body["refreshToken"].is_string());
}

#[tokio::test]
async fn signup_returns_409_for_duplicate_email() {
    let app = spawn_app();

    assert_eq!(201, app.signup("A", "a@x.com", "p").await.status().as_u16());

    let response = app.signup("B", "a@x.com", "q").await;
    assert_eq!(409, response.status().as_u16());
    assert_eq!(body_of(response).await["code"], "DUPLICATE_ACCOUNT");
}

#[tokio::test]
async fn signup_returns_400_when_data_is_missing() {
    let app = spawn_app();
    let test_cases = vec![
        (json!({ "email": "a@x.com", "password": "p" }), "missing the name"),
        (json!({ "name": "A", "password": "p" }), "missing the email"),
        (json!({ "name": "A", "email": "a@x.com" }), "missing the password"),
        (json!({ "name": "", "email": "a@x.com", "password": "p" }), "empty name"),
        (json!({}), "missing everything"),
    ];

    for (invalid_body, error_message) in test_cases {
        let response = app.post("/users/signup", &invalid_body).await;

        assert_eq!(
            400,
            response.status().as_u16(),
            "The API did not fail with 400 Bad Request when the payload was {}.",
            error_message
        );
        assert_eq!(body_of(response).await["code"], "VALIDATION_ERROR");
    }
}

#[tokio::test]
async fn signup_rejects_malformed_json() {
    let app = spawn_app();

    let response = app
        .client
        .post(&format!("{}/users/signup", app.address))
        .header("Content-Type", "application/json")
        .body("{not json")
        .send()
        .await
        .expect("Failed to execute request.");

    assert_eq!(400, response.status().as_u16());
    assert_eq!(body_of(response).await["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn get_signup_returns_usage_hint() {
    let app = spawn_app();

    let response = app
        .client
        .get(&format!("{}/users/signup", app.address))
        .send()
        .await
        .expect("Failed to execute request.");

    assert_eq!(200, response.status().as_u16());
    assert!(body_of(response).await["message"].is_string());
}

// --- Login ---

#[tokio::test]
async fn login_returns_a_fresh_token_pair() {
    let app = spawn_app();
    let signup = body_of(app.signup("A", "a@x.com", "p").await).await;

    let response = app.login("a@x.com", "p").await;
    assert_eq!(200, response.status().as_u16());

    let body = body_of(response).await;
    assert_eq!(body["message"], "Login successful");
    assert_ne!(body["token"], signup["token"]);
    assert_ne!(body["refreshToken"], signup["refreshToken"]);
}

#[tokio::test]
async fn login_returns_401_for_invalid_credentials() {
    let app = spawn_app();
    app.signup("A", "a@x.com", "p").await;

    for (email, password) in [("a@x.com", "wrong"), ("nobody@x.com", "p")] {
        let response = app.login(email, password).await;
        assert_eq!(401, response.status().as_u16());

        let body = body_of(response).await;
        assert_eq!(body["code"], "INVALID_CREDENTIALS");
        assert_eq!(body["error"], "Invalid credentials");
    }
}

#[tokio::test]
async fn login_returns_400_when_data_is_missing() {
    let app = spawn_app();

    let response = app.post("/users/login", &json!({ "email": "a@x.com" })).await;
    assert_eq!(400, response.status().as_u16());
}

#[tokio::test]
async fn login_supersedes_the_previous_refresh_token() {
    let app = spawn_app();
    let signup = body_of(app.signup("A", "a@x.com", "p").await).await;
    let old_refresh = signup["refreshToken"].as_str().unwrap().to_string();

    assert_eq!(200, app.login("a@x.com", "p").await.status().as_u16());

    let response = app.rotate(&old_refresh).await;
    assert_eq!(401, response.status().as_u16());
}

// --- Rotation and logout ---

#[tokio::test]
async fn full_session_lifecycle() {
    let app = spawn_app();

    assert_eq!(201, app.signup("A", "a@x.com", "p").await.status().as_u16());

    let login = body_of(app.login("a@x.com", "p").await).await;
    let r1 = login["refreshToken"].as_str().unwrap().to_string();

    // Rotate: a new, different pair
    let response = app.rotate(&r1).await;
    assert_eq!(200, response.status().as_u16());
    let rotated = body_of(response).await;
    let a2 = rotated["accessToken"].as_str().unwrap().to_string();
    let r2 = rotated["refreshToken"].as_str().unwrap().to_string();
    assert_ne!(r1, r2);

    // The consumed token is dead
    let response = app.rotate(&r1).await;
    assert_eq!(401, response.status().as_u16());
    assert_eq!(body_of(response).await["code"], "INVALID_REFRESH_TOKEN");

    // Access token still works for the gate
    assert_eq!(200, app.list_users(Some(&a2)).await.status().as_u16());

    // Replaying r1 already revoked r2; logout still answers the same way
    let response = app.logout(&r2).await;
    assert_eq!(200, response.status().as_u16());
    assert_eq!(body_of(response).await["message"], "Logged out");

    let response = app.rotate(&r2).await;
    assert_eq!(401, response.status().as_u16());
}

#[tokio::test]
async fn reusing_a_superseded_refresh_token_revokes_the_session() {
    let app = spawn_app();
    let signup = body_of(app.signup("A", "a@x.com", "p").await).await;
    let r1 = signup["refreshToken"].as_str().unwrap().to_string();

    let rotated = body_of(app.rotate(&r1).await).await;
    let r2 = rotated["refreshToken"].as_str().unwrap().to_string();

    // Replaying r1 kills r2 as well
    assert_eq!(401, app.rotate(&r1).await.status().as_u16());
    assert_eq!(401, app.rotate(&r2).await.status().as_u16());
}

#[tokio::test]
async fn access_token_cannot_be_used_as_refresh_token() {
    let app = spawn_app();
    let signup = body_of(app.signup("A", "a@x.com", "p").await).await;
    let access = signup["token"].as_str().unwrap();

    let response = app.rotate(access).await;
    assert_eq!(401, response.status().as_u16());
}

#[tokio::test]
async fn rotate_returns_400_when_token_is_missing() {
    let app = spawn_app();

    let response = app.post("/token", &json!({})).await;
    assert_eq!(400, response.status().as_u16());
    assert_eq!(body_of(response).await["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn logout_is_idempotent_and_always_succeeds() {
    let app = spawn_app();
    let signup = body_of(app.signup("A", "a@x.com", "p").await).await;
    let refresh = signup["refreshToken"].as_str().unwrap().to_string();

    for token in [refresh.as_str(), refresh.as_str(), "garbage"] {
        let response = app.logout(token).await;
        assert_eq!(200, response.status().as_u16());
        assert_eq!(body_of(response).await["message"], "Logged out");
    }
}

#[tokio::test]
async fn logout_succeeds_for_oversized_token() {
    let app = spawn_app();
    let signup = body_of(app.signup("A", "a@x.com", "p").await).await;
    let refresh = signup["refreshToken"].as_str().unwrap().to_string();

    let response = app.logout(&"a".repeat(5000)).await;
    assert_eq!(200, response.status().as_u16());
    assert_eq!(body_of(response).await["message"], "Logged out");

    // The live session was not touched
    assert_eq!(200, app.rotate(&refresh).await.status().as_u16());
}

#[tokio::test]
async fn logout_returns_400_when_token_is_missing() {
    let app = spawn_app();

    let response = app.post("/logout", &json!({})).await;
    assert_eq!(400, response.status().as_u16());
}

#[tokio::test]
async fn expired_refresh_token_is_rejected() {
    let mut jwt = jwt_settings();
    jwt.refresh_token_expiry = -10;
    let app = spawn_app_with(
        jwt,
        RateLimitSettings {
            enabled: false,
            requests_per_minute: 30,
            ..RateLimitSettings::default()
        },
    );

    let signup = body_of(app.signup("A", "a@x.com", "p").await).await;
    let refresh = signup["refreshToken"].as_str().unwrap();

    let response = app.rotate(refresh).await;
    assert_eq!(401, response.status().as_u16());
}

// --- Auth gate ---

#[tokio::test]
async fn list_users_requires_a_valid_access_token() {
    let app = spawn_app();
    let signup = body_of(app.signup("A", "a@x.com", "p").await).await;
    let access = signup["token"].as_str().unwrap();
    let refresh = signup["refreshToken"].as_str().unwrap();

    let response = app.list_users(None).await;
    assert_eq!(401, response.status().as_u16());
    assert_eq!(body_of(response).await["code"], "UNAUTHORIZED");

    assert_eq!(401, app.list_users(Some("not-a-token")).await.status().as_u16());
    assert_eq!(401, app.list_users(Some(refresh)).await.status().as_u16());

    let response = app.list_users(Some(access)).await;
    assert_eq!(200, response.status().as_u16());

    let users = body_of(response).await;
    let users = users.as_array().expect("Expected a JSON array");
    assert_eq!(users.len(), 1);
    assert_eq!(users[0]["email"], "a@x.com");
    assert!(users[0].get("password_hash").is_none());
}

#[tokio::test]
async fn access_token_outlives_logout() {
    let app = spawn_app();
    let signup = body_of(app.signup("A", "a@x.com", "p").await).await;
    let access = signup["token"].as_str().unwrap();
    let refresh = signup["refreshToken"].as_str().unwrap();

    app.logout(refresh).await;

    assert_eq!(200, app.list_users(Some(access)).await.status().as_u16());
}

// --- Rate limiting ---

#[tokio::test]
async fn login_is_rate_limited_per_client() {
    let app = spawn_app_with(
        jwt_settings(),
        RateLimitSettings {
            enabled: true,
            requests_per_minute: 2,
            ..RateLimitSettings::default()
        },
    );

    assert_eq!(401, app.login("a@x.com", "p").await.status().as_u16());
    assert_eq!(401, app.login("a@x.com", "p").await.status().as_u16());

    let response = app.login("a@x.com", "p").await;
    assert_eq!(429, response.status().as_u16());
    assert_eq!(body_of(response).await["code"], "TOO_MANY_REQUESTS");
}

#[tokio::test]
async fn forwarded_headers_do_not_bypass_rate_limit() {
    let app = spawn_app_with(
        jwt_settings(),
        RateLimitSettings {
            enabled: true,
            requests_per_minute: 1,
            ..RateLimitSettings::default()
        },
    );

    let mut allowed = 0;
    for i in 0..10 {
        let response = app
            .client
            .post(&format!("{}/users/login", app.address))
            .header("X-Forwarded-For", format!("203.0.113.{}", i))
            .header("Forwarded", format!("for=198.51.100.{}", i))
            .json(&json!({ "email": "a@x.com", "password": "p" }))
            .send()
            .await
            .expect("Failed to execute request.");

        if response.status().as_u16() != 429 {
            allowed += 1;
        }
    }

    assert_eq!(allowed, 1);
}
