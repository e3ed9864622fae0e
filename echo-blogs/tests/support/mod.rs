#![allow(dead_code)]

use axum::body::Body;
use axum::http::{header, Request};
use axum::response::Response;
use axum::Router;
use echo_blogs::{build, BlogApp};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

pub const PUBLIC_HOST: &str = "localhost:8000";

pub async fn app() -> BlogApp {
    let mut config = echo_blogs::config::defaults();
    config.set("auth.bcrypt_cost", "4");
    config.set("auth.jwt.secret", "test-secret");
    let app = build(config.snapshot()).unwrap();
    app.setup_public_tenant().await.unwrap();
    app
}

pub async fn send(router: &Router, req: Request<Body>) -> Response {
    router.clone().oneshot(req).await.unwrap()
}

pub fn get(uri: &str, host: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .header(header::HOST, host)
        .body(Body::empty())
        .unwrap()
}

pub fn json_req(method: &str, uri: &str, host: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::HOST, host)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn form_req(uri: &str, host: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::HOST, host)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn with_bearer(mut req: Request<Body>, token: &str) -> Request<Body> {
    req.headers_mut().insert(
        header::AUTHORIZATION,
        format!("Bearer {token}").parse().unwrap(),
    );
    req
}

pub fn with_cookie(mut req: Request<Body>, cookie: &str) -> Request<Body> {
    req.headers_mut()
        .insert(header::COOKIE, cookie.parse().unwrap());
    req
}

/// `name=value` of the session cookie set by `res`.
pub fn session_cookie(res: &Response) -> Option<String> {
    res.headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(|v| v.trim().to_string())
}

pub fn location(res: &Response) -> Option<String> {
    res.headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

pub async fn json_body(res: Response) -> Value {
    let bytes = res.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

pub async fn text_body(res: Response) -> String {
    let bytes = res.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// Register through the API and return the response body.
pub async fn register(router: &Router, username: &str) -> Value {
    let res = send(
        router,
        json_req(
            "POST",
            "/api/auth/register/",
            PUBLIC_HOST,
            json!({
                "username": username,
                "email": format!("{}@example.com", username.to_lowercase()),
                "password": "pass-1234",
            }),
        ),
    )
    .await;
    assert_eq!(res.status().as_u16(), 201, "registering {username}");
    json_body(res).await
}

pub fn access_token(registered: &Value) -> String {
    registered["tokens"]["access"].as_str().unwrap().to_string()
}
