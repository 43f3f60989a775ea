//! Shared helpers for the HTTP integration tests.
//! Every test gets its own server on a random port, backed by the
//! in-memory store.

#![allow(dead_code)]

use serde_json::{json, Value};
use std::net::TcpListener;
use std::time::Duration;
use tillpoint::configuration::{
    ApplicationSettings, DatabaseSettings, JwtSettings, SessionSettings, Settings, StoreBackend,
};
use tillpoint::startup::{run, AppState};
use tillpoint::store::Stores;

pub const PASSWORD: &str = "S3cret!pass";

pub struct TestApp {
    pub address: String,
}

pub fn test_settings() -> Settings {
    Settings {
        database: DatabaseSettings {
            username: "postgres".to_string(),
            password: "password".to_string(),
            port: 5432,
            host: "localhost".to_string(),
            database_name: "tillpoint".to_string(),
        },
        application: ApplicationSettings {
            host: "127.0.0.1".to_string(),
            port: 0,
            store: StoreBackend::Memory,
            store_timeout_seconds: 5,
            password_cost: 4,
        },
        jwt: JwtSettings {
            secret: "integration-test-secret-at-least-32-bytes".to_string(),
            access_token_expiry: 86_400,
            issuer: "tillpoint-test".to_string(),
        },
        session: SessionSettings {
            cookie_name: "tillpoint_session".to_string(),
            // reqwest only sends Secure cookies over https
            cookie_secure: false,
            cleanup_interval_seconds: 3600,
        },
    }
}

pub async fn spawn_app() -> TestApp {
    let settings = test_settings();
    let stores = Stores::in_memory(Duration::from_secs(settings.application.store_timeout_seconds));
    spawn_app_with(stores).await
}

/// Same server, wired to the given stores
pub async fn spawn_app_with(stores: Stores) -> TestApp {
    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();

    let settings = test_settings();
    let state = AppState::new(stores, &settings).expect("Failed to build application state");
    let server = run(listener, state).expect("Failed to bind address");
    let _ = tokio::spawn(server);

    TestApp {
        address: format!("http://127.0.0.1:{}", port),
    }
}

/// A client with its own cookie jar, i.e. its own browser session
pub fn browser() -> reqwest::Client {
    reqwest::Client::builder()
        .cookie_store(true)
        .build()
        .expect("Failed to build client")
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    pub async fn register(&self, client: &reqwest::Client, first_name: &str, email: &str) -> Value {
        let response = client
            .post(self.url("/user"))
            .json(&json!({
                "first_name": first_name,
                "last_name": "Tester",
                "email": email,
                "password": PASSWORD,
                "location": "Lisbon"
            }))
            .send()
            .await
            .expect("Failed to execute request.");
        assert_eq!(201, response.status().as_u16());
        response.json().await.expect("Failed to parse response")
    }

    pub async fn login(&self, client: &reqwest::Client, email: &str, password: &str) -> reqwest::Response {
        client
            .post(self.url("/login"))
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await
            .expect("Failed to execute request.")
    }

    /// Logs in and returns the bearer token; the session cookie stays in
    /// `client`'s jar
    pub async fn login_token(&self, client: &reqwest::Client, email: &str) -> String {
        let response = self.login(client, email, PASSWORD).await;
        assert_eq!(200, response.status().as_u16());
        let body: Value = response.json().await.expect("Failed to parse response");
        body["token"].as_str().expect("token missing").to_string()
    }

    pub async fn get(&self, client: &reqwest::Client, path: &str, token: &str) -> reqwest::Response {
        client
            .get(self.url(path))
            .bearer_auth(token)
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub async fn post(&self, client: &reqwest::Client, path: &str, token: &str, body: Value) -> reqwest::Response {
        client
            .post(self.url(path))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub async fn delete(&self, client: &reqwest::Client, path: &str, token: &str) -> reqwest::Response {
        client
            .delete(self.url(path))
            .bearer_auth(token)
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub async fn put(&self, client: &reqwest::Client, path: &str, token: &str, body: Value) -> reqwest::Response {
        client
            .put(self.url(path))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .expect("Failed to execute request.")
    }
}

/// Status plus the `code` field of an error body
pub async fn status_and_code(response: reqwest::Response) -> (u16, String) {
    let status = response.status().as_u16();
    let body: Value = response.json().await.expect("Failed to parse error body");
    (status, body["code"].as_str().unwrap_or_default().to_string())
}
