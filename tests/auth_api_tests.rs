//! HTTP tests for signup, login, password management and the self-service
//! user endpoints.

mod api_harness;

use api_harness::*;
use axum::http::StatusCode;
use serde_json::{Value, json};

fn signup_body(email: &str) -> Value {
    json!({
        "name": "Jonas Schmedtmann",
        "email": email,
        "password": PASSWORD,
        "passwordConfirm": PASSWORD,
        "role": "admin"
    })
}

/// Plain reset token from the link in the last mail sent
fn reset_token_from_mail(app: &TestApp) -> String {
    let mail = app.mailer.last().expect("a reset mail");
    let (_, rest) = mail
        .text
        .split_once("/resetPassword/")
        .expect("reset link in mail");
    rest.split_whitespace().next().unwrap().to_string()
}

#[tokio::test]
async fn test_signup_issues_token_and_welcome_mail() {
    let app = spawn_app();

    let response = app
        .server
        .post("/api/v1/users/signup")
        .json(&signup_body("Jonas@Example.com"))
        .await;
    response.assert_status(StatusCode::CREATED);

    let body: Value = response.json();
    assert_eq!(body["status"], "success");
    assert!(body["token"].as_str().is_some_and(|t| !t.is_empty()));
    let user = &body["data"]["user"];
    assert_eq!(user["email"], "jonas@example.com");
    assert_eq!(user["role"], "user");
    assert!(user.get("password").is_none());

    let cookie = response.header("set-cookie");
    assert!(cookie.to_str().unwrap().starts_with("jwt="));

    let mail = app.mailer.last().expect("welcome mail");
    assert_eq!(mail.to, "jonas@example.com");
    assert!(mail.text.starts_with("Hi Jonas,"));
}

#[tokio::test]
async fn test_signup_validation() {
    let app = spawn_app();

    let mut body = signup_body("jonas@example.com");
    body["passwordConfirm"] = json!("something-else");
    let response = app.server.post("/api/v1/users/signup").json(&body).await;
    response.assert_status(StatusCode::BAD_REQUEST);
    assert!(response.text().contains("Passwords are not the same!"));

    let response = app
        .server
        .post("/api/v1/users/signup")
        .json(&signup_body("not-an-email"))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);

    app.server
        .post("/api/v1/users/signup")
        .json(&signup_body("jonas@example.com"))
        .await
        .assert_status(StatusCode::CREATED);
    let response = app
        .server
        .post("/api/v1/users/signup")
        .json(&signup_body("jonas@example.com"))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    assert!(response.text().contains("Duplicate field value"));
}

#[tokio::test]
async fn test_login() {
    let app = spawn_app();
    app.customer("laura@example.com").await;

    let response = app
        .server
        .post("/api/v1/users/login")
        .json(&json!({ "email": "laura@example.com", "password": PASSWORD }))
        .await;
    response.assert_status_ok();
    let token = response.json::<Value>()["token"].as_str().unwrap().to_string();

    app.server
        .get("/api/v1/users/me")
        .authorization_bearer(&token)
        .await
        .assert_status_ok();

    let response = app
        .server
        .post("/api/v1/users/login")
        .json(&json!({ "email": "laura@example.com", "password": "wrong-password" }))
        .await;
    response.assert_status(StatusCode::UNAUTHORIZED);
    assert_eq!(
        response.json::<Value>()["message"],
        "Incorrect email or password"
    );

    let response = app
        .server
        .post("/api/v1/users/login")
        .json(&json!({ "email": "laura@example.com" }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(
        response.json::<Value>()["message"],
        "Please provide email and password!"
    );
}

#[tokio::test]
async fn test_session_cookie_authenticates() {
    let app = spawn_app();
    let (user, token) = app.customer("laura@example.com").await;

    let response = app
        .server
        .get("/api/v1/users/me")
        .add_header("cookie", format!("jwt={}", token))
        .await;
    response.assert_status_ok();
    assert_eq!(data(&response.json())["id"], user.id.to_string());
}

#[tokio::test]
async fn test_protect_rejects_missing_and_bad_tokens() {
    let app = spawn_app();

    let response = app.server.get("/api/v1/users/me").await;
    response.assert_status(StatusCode::UNAUTHORIZED);

    app.server
        .get("/api/v1/users/me")
        .authorization_bearer("not.a.token")
        .await
        .assert_status(StatusCode::UNAUTHORIZED);

    // a logged out cookie is not a session
    app.server
        .get("/api/v1/users/me")
        .add_header("cookie", "jwt=loggedout")
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_logout_replaces_cookie() {
    let app = spawn_app();

    let response = app.server.get("/api/v1/users/logout").await;
    response.assert_status_ok();
    let cookie = response.header("set-cookie");
    assert!(cookie.to_str().unwrap().starts_with("jwt=loggedout"));
}

#[tokio::test]
async fn test_forgot_and_reset_password() {
    let app = spawn_app();
    app.customer("laura@example.com").await;

    let response = app
        .server
        .post("/api/v1/users/forgotPassword")
        .json(&json!({ "email": "laura@example.com" }))
        .await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["message"], "Token sent to email!");

    let token = reset_token_from_mail(&app);
    let new_password = json!({ "password": "newpass123", "passwordConfirm": "newpass123" });

    let response = app
        .server
        .patch(&format!("/api/v1/users/resetPassword/{}", token))
        .json(&new_password)
        .await;
    response.assert_status_ok();
    assert!(response.json::<Value>()["token"].is_string());

    // the token is single use
    let response = app
        .server
        .patch(&format!("/api/v1/users/resetPassword/{}", token))
        .json(&new_password)
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(
        response.json::<Value>()["message"],
        "Token is invalid or has expired"
    );

    app.server
        .post("/api/v1/users/login")
        .json(&json!({ "email": "laura@example.com", "password": "newpass123" }))
        .await
        .assert_status_ok();
}

#[tokio::test]
async fn test_forgot_password_unknown_email() {
    let app = spawn_app();

    let response = app
        .server
        .post("/api/v1/users/forgotPassword")
        .json(&json!({ "email": "nobody@example.com" }))
        .await;
    response.assert_status(StatusCode::NOT_FOUND);
    assert!(app.mailer.sent().is_empty());
}

#[tokio::test]
async fn test_failed_reset_mail_clears_token() {
    let app = spawn_app();
    let (user, _) = app.customer("laura@example.com").await;
    app.mailer.fail_deliveries(true);

    let response = app
        .server
        .post("/api/v1/users/forgotPassword")
        .json(&json!({ "email": "laura@example.com" }))
        .await;
    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        response.json::<Value>()["message"],
        "There was an error sending the email. Try again later!"
    );

    let stored = app.state.storage.users.find_by_id(&user.id).await.unwrap().unwrap();
    assert!(stored.password_reset_token.is_none());
}

#[tokio::test]
async fn test_update_my_password() {
    let app = spawn_app();
    let (_, token) = app.customer("laura@example.com").await;

    let response = app
        .server
        .patch("/api/v1/users/updateMyPassword")
        .authorization_bearer(&token)
        .json(&json!({
            "passwordCurrent": "wrong-password",
            "password": "newpass123",
            "passwordConfirm": "newpass123"
        }))
        .await;
    response.assert_status(StatusCode::UNAUTHORIZED);
    assert_eq!(
        response.json::<Value>()["message"],
        "Your current password is wrong."
    );

    let response = app
        .server
        .patch("/api/v1/users/updateMyPassword")
        .authorization_bearer(&token)
        .json(&json!({
            "passwordCurrent": PASSWORD,
            "password": "newpass123",
            "passwordConfirm": "newpass123"
        }))
        .await;
    response.assert_status_ok();
    let fresh = response.json::<Value>()["token"].as_str().unwrap().to_string();

    app.server
        .get("/api/v1/users/me")
        .authorization_bearer(&fresh)
        .await
        .assert_status_ok();
}

#[tokio::test]
async fn test_update_me() {
    let app = spawn_app();
    let (user, token) = app.customer("laura@example.com").await;

    let response = app
        .server
        .patch("/api/v1/users/updateMe")
        .authorization_bearer(&token)
        .json(&json!({ "password": "newpass123" }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(
        response.json::<Value>()["message"],
        "This route is not for password updates. Please use /updateMyPassword."
    );

    let response = app
        .server
        .patch("/api/v1/users/updateMe")
        .authorization_bearer(&token)
        .json(&json!({ "name": "Laura Smith", "role": "admin" }))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["data"]["user"]["name"], "Laura Smith");
    assert_eq!(body["data"]["user"]["role"], "user");

    let stored = app.state.storage.users.find_by_id(&user.id).await.unwrap().unwrap();
    assert_eq!(stored.name, "Laura Smith");
}

#[tokio::test]
async fn test_delete_me_deactivates() {
    let app = spawn_app();
    let (user, token) = app.customer("laura@example.com").await;

    app.server
        .delete("/api/v1/users/deleteMe")
        .authorization_bearer(&token)
        .await
        .assert_status(StatusCode::NO_CONTENT);

    assert!(app.state.storage.users.find_by_id(&user.id).await.unwrap().is_none());

    app.server
        .post("/api/v1/users/login")
        .json(&json!({ "email": "laura@example.com", "password": PASSWORD }))
        .await
        .assert_status(StatusCode::UNAUTHORIZED);

    app.server
        .get("/api/v1/users/me")
        .authorization_bearer(&token)
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_user_admin_routes() {
    let app = spawn_app();
    let (customer, customer_token) = app.customer("laura@example.com").await;
    let (_, admin_token) = app.admin().await;

    app.server
        .get("/api/v1/users")
        .authorization_bearer(&customer_token)
        .await
        .assert_status(StatusCode::FORBIDDEN);

    let response = app
        .server
        .get("/api/v1/users?role=user")
        .authorization_bearer(&admin_token)
        .await;
    response.assert_status_ok();
    assert_eq!(names(&response.json()), vec!["Laura Wilson"]);

    let url = format!("/api/v1/users/{}", customer.id);
    let response = app
        .server
        .patch(&url)
        .authorization_bearer(&admin_token)
        .json(&json!({ "role": "guide" }))
        .await;
    response.assert_status_ok();
    assert_eq!(data(&response.json())["role"], "guide");

    app.server
        .delete(&url)
        .authorization_bearer(&admin_token)
        .await
        .assert_status(StatusCode::NO_CONTENT);
    app.server
        .get(&url)
        .authorization_bearer(&admin_token)
        .await
        .assert_status(StatusCode::NOT_FOUND);
}
