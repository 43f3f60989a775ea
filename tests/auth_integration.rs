mod common;

use common::{browser, spawn_app, status_and_code, PASSWORD};
use serde_json::{json, Value};

// --- Login / Logout ---

#[tokio::test]
async fn login_then_logout_revokes_the_token() {
    let app = spawn_app().await;
    let client = browser();
    let alice = app.register(&client, "Alice", "alice@example.com").await;

    let response = app.login(&client, "alice@example.com", PASSWORD).await;
    assert_eq!(200, response.status().as_u16());

    let cookie = response
        .headers()
        .get("set-cookie")
        .expect("session cookie missing")
        .to_str()
        .unwrap()
        .to_string();
    assert!(cookie.starts_with("tillpoint_session="));
    assert!(cookie.contains("HttpOnly"));

    let body: Value = response.json().await.expect("Failed to parse response");
    let token = body["token"].as_str().unwrap().to_string();
    assert!(body["expires_at"].is_string());
    assert!(body["refresh_token"].is_string());

    let me = app.get(&client, "/user/current", &token).await;
    assert_eq!(200, me.status().as_u16());
    let me: Value = me.json().await.unwrap();
    assert_eq!(me["email"], "alice@example.com");
    assert_eq!(me["id"], alice["id"]);
    assert!(me.get("password_hash").is_none());

    let logout = client.post(app.url("/logout")).send().await.unwrap();
    assert_eq!(200, logout.status().as_u16());
    let logout: Value = logout.json().await.unwrap();
    assert_eq!(logout["message"], "Logout successful");

    // Same, still unexpired, token
    let after = app.get(&client, "/user/current", &token).await;
    assert_eq!(status_and_code(after).await, (401, "NOT_LOGGED_IN".to_string()));
}

#[tokio::test]
async fn wrong_password_and_unknown_email_look_the_same() {
    let app = spawn_app().await;
    let client = browser();
    app.register(&client, "Alice", "alice@example.com").await;

    let wrong_password: Value = app
        .login(&client, "alice@example.com", "Wr0ngPassword")
        .await
        .json()
        .await
        .unwrap();
    let unknown_email: Value = app
        .login(&client, "nobody@example.com", PASSWORD)
        .await
        .json()
        .await
        .unwrap();

    for body in [&wrong_password, &unknown_email] {
        assert_eq!(body["status"], 401);
        assert_eq!(body["code"], "INVALID_CREDENTIALS");
        assert_eq!(body["message"], "Invalid email or password");
    }
}

#[tokio::test]
async fn login_compares_every_byte_of_a_long_password() {
    let app = spawn_app().await;
    let client = browser();
    // Exactly 72 bytes, the longest password registration accepts
    let password = format!("Aa1{}", "x".repeat(69));

    let registered = client
        .post(app.url("/user"))
        .json(&json!({
            "first_name": "Long",
            "last_name": "Tester",
            "email": "long@example.com",
            "password": password,
            "location": "Lisbon"
        }))
        .send()
        .await
        .expect("Failed to execute request.");
    assert_eq!(201, registered.status().as_u16());

    let extended = format!("{}TOTALLY-DIFFERENT-SUFFIX", password);
    let response = app.login(&client, "long@example.com", &extended).await;
    assert_eq!(
        status_and_code(response).await,
        (401, "INVALID_CREDENTIALS".to_string())
    );

    let response = app.login(&client, "long@example.com", &password).await;
    assert_eq!(200, response.status().as_u16());
}

#[tokio::test]
async fn login_rejects_malformed_bodies() {
    let app = spawn_app().await;
    let client = browser();

    let not_json = client
        .post(app.url("/login"))
        .header("Content-Type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(status_and_code(not_json).await, (400, "VALIDATION_ERROR".to_string()));

    let empty_password = client
        .post(app.url("/login"))
        .json(&json!({ "email": "alice@example.com", "password": "" }))
        .send()
        .await
        .unwrap();
    assert_eq!(status_and_code(empty_password).await, (400, "VALIDATION_ERROR".to_string()));

    let missing_field = client
        .post(app.url("/login"))
        .json(&json!({ "email": "alice@example.com" }))
        .send()
        .await
        .unwrap();
    assert_eq!(status_and_code(missing_field).await, (400, "VALIDATION_ERROR".to_string()));
}

#[tokio::test]
async fn login_email_is_case_insensitive() {
    let app = spawn_app().await;
    let client = browser();
    app.register(&client, "Alice", "Alice@Example.com").await;

    let response = app.login(&client, "  alice@EXAMPLE.com ", PASSWORD).await;
    assert_eq!(200, response.status().as_u16());
}

#[tokio::test]
async fn logout_without_session_still_succeeds() {
    let app = spawn_app().await;

    let response = browser().post(app.url("/logout")).send().await.unwrap();
    assert_eq!(200, response.status().as_u16());
}

// --- Authorization middleware ---

#[tokio::test]
async fn missing_authorization_header_is_rejected() {
    let app = spawn_app().await;
    let client = browser();
    app.register(&client, "Alice", "alice@example.com").await;
    app.login_token(&client, "alice@example.com").await;

    let response = client.get(app.url("/user/current")).send().await.unwrap();
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], 401);
    assert_eq!(body["code"], "MISSING_TOKEN");
    assert_eq!(body["message"], "Missing Authorization Header");
}

#[tokio::test]
async fn token_without_session_is_rejected() {
    let app = spawn_app().await;
    let client = browser();
    app.register(&client, "Alice", "alice@example.com").await;
    let token = app.login_token(&client, "alice@example.com").await;

    // A fresh cookie jar has no session
    let response = app.get(&browser(), "/user/current", &token).await;
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["code"], "NOT_LOGGED_IN");
    assert_eq!(body["message"], "User is not logged in");
}

#[tokio::test]
async fn garbage_token_is_rejected() {
    let app = spawn_app().await;
    let client = browser();
    app.register(&client, "Alice", "alice@example.com").await;
    app.login_token(&client, "alice@example.com").await;

    let response = app.get(&client, "/user/current", "invalid.token.here").await;
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["code"], "TOKEN_INVALID");
    assert_eq!(body["message"], "Invalid Token");
}

#[tokio::test]
async fn token_of_another_user_is_rejected() {
    let app = spawn_app().await;
    let alice_browser = browser();
    let bob_browser = browser();
    app.register(&alice_browser, "Alice", "alice@example.com").await;
    app.register(&bob_browser, "Bob", "bob@example.com").await;
    app.login_token(&alice_browser, "alice@example.com").await;
    let bob_token = app.login_token(&bob_browser, "bob@example.com").await;

    let response = app.get(&alice_browser, "/user/current", &bob_token).await;
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], 401);
    assert_eq!(body["code"], "TOKEN_USER_MISMATCH");
    assert_eq!(body["message"], "Token is not for current user");
}

#[tokio::test]
async fn each_login_is_its_own_session() {
    let app = spawn_app().await;
    let laptop = browser();
    let phone = browser();
    app.register(&laptop, "Alice", "alice@example.com").await;
    let laptop_token = app.login_token(&laptop, "alice@example.com").await;
    let phone_token = app.login_token(&phone, "alice@example.com").await;

    laptop.post(app.url("/logout")).send().await.unwrap();

    let phone_me = app.get(&phone, "/user/current", &phone_token).await;
    assert_eq!(200, phone_me.status().as_u16());
    let laptop_me = app.get(&laptop, "/user/current", &laptop_token).await;
    assert_eq!(401, laptop_me.status().as_u16());
}

// --- Users ---

#[tokio::test]
async fn registration_validates_input() {
    let app = spawn_app().await;
    let client = browser();

    let cases = vec![
        json!({"first_name": "A", "last_name": "B", "email": "notanemail", "password": PASSWORD, "location": "X"}),
        json!({"first_name": "A", "last_name": "B", "email": "a@example.com", "password": "weak", "location": "X"}),
        json!({"first_name": "A", "last_name": "B", "email": "a@example.com", "password": "nouppercase1", "location": "X"}),
        json!({"first_name": "", "last_name": "B", "email": "a@example.com", "password": PASSWORD, "location": "X"}),
        json!({"first_name": "A", "last_name": "B", "email": "a@example.com", "password": PASSWORD, "location": " "}),
    ];

    for body in cases {
        let response = client.post(app.url("/user")).json(&body).send().await.unwrap();
        assert_eq!(400, response.status().as_u16(), "body: {}", body);
    }
}

#[tokio::test]
async fn duplicate_email_is_a_conflict() {
    let app = spawn_app().await;
    let client = browser();
    app.register(&client, "Alice", "alice@example.com").await;

    let response = client
        .post(app.url("/user"))
        .json(&json!({
            "first_name": "Other",
            "last_name": "Alice",
            "email": "ALICE@example.com",
            "password": PASSWORD,
            "location": "Porto"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(status_and_code(response).await, (409, "DUPLICATE_ENTRY".to_string()));
}

#[tokio::test]
async fn users_can_only_update_themselves() {
    let app = spawn_app().await;
    let client = browser();
    let alice = app.register(&client, "Alice", "alice@example.com").await;
    let bob = app.register(&client, "Bob", "bob@example.com").await;
    let token = app.login_token(&client, "alice@example.com").await;

    let own = app
        .put(
            &client,
            &format!("/user/{}", alice["id"].as_str().unwrap()),
            &token,
            json!({ "location": "Madrid" }),
        )
        .await;
    assert_eq!(200, own.status().as_u16());
    let own: Value = own.json().await.unwrap();
    assert_eq!(own["location"], "Madrid");

    let other = app
        .put(
            &client,
            &format!("/user/{}", bob["id"].as_str().unwrap()),
            &token,
            json!({ "location": "Madrid" }),
        )
        .await;
    assert_eq!(status_and_code(other).await, (403, "FORBIDDEN".to_string()));
}

#[tokio::test]
async fn password_change_takes_effect_on_next_login() {
    let app = spawn_app().await;
    let client = browser();
    let alice = app.register(&client, "Alice", "alice@example.com").await;
    let token = app.login_token(&client, "alice@example.com").await;

    let response = app
        .put(
            &client,
            &format!("/user/{}", alice["id"].as_str().unwrap()),
            &token,
            json!({ "password": "N3wPassword" }),
        )
        .await;
    assert_eq!(200, response.status().as_u16());

    let old = app.login(&browser(), "alice@example.com", PASSWORD).await;
    assert_eq!(401, old.status().as_u16());
    let new = app.login(&browser(), "alice@example.com", "N3wPassword").await;
    assert_eq!(200, new.status().as_u16());
}

#[tokio::test]
async fn get_user_by_id() {
    let app = spawn_app().await;
    let client = browser();
    let bob = app.register(&client, "Bob", "bob@example.com").await;
    app.register(&client, "Alice", "alice@example.com").await;
    let token = app.login_token(&client, "alice@example.com").await;

    let found = app
        .get(&client, &format!("/user/{}", bob["id"].as_str().unwrap()), &token)
        .await;
    assert_eq!(200, found.status().as_u16());

    let missing = app
        .get(&client, &format!("/user/{}", uuid::Uuid::new_v4()), &token)
        .await;
    assert_eq!(404, missing.status().as_u16());

    let malformed = app.get(&client, "/user/not-a-uuid", &token).await;
    assert_eq!(400, malformed.status().as_u16());
}
