//! Integration tests for the tillpoint server

mod common;

use common::{browser, spawn_app};

#[tokio::test]
async fn health_check_works() {
    let app = spawn_app().await;

    let response = reqwest::Client::new()
        .get(app.url("/health_check"))
        .send()
        .await
        .expect("Failed to execute request");

    assert!(response.status().is_success());
    assert_eq!(Some(0), response.content_length());
}

#[tokio::test]
async fn protected_routes_need_a_session() {
    let app = spawn_app().await;

    for path in ["/user/current", "/items"] {
        let response = browser()
            .get(app.url(path))
            .send()
            .await
            .expect("Failed to execute request");
        assert_eq!(401, response.status().as_u16(), "path: {}", path);
    }
}
