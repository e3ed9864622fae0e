use std::sync::Arc;

use axum::body::Body;
use axum::extract::{FromRef, State};
use axum::http::{HeaderValue, Request, StatusCode};
use axum::routing::get;
use axum::{Json, Router};
use chrono::NaiveDate;
use echo_auth::{AuthOptions, AuthenticationService};
use echo_axum::{
    ActiveTenant, AuthState, AxumApp, CurrentUser, EchoAxumError, SessionOptions, TenantResolver,
};
use echo_core::models::{NewClient, NewUser, Provisioning};
use echo_core::store::MemoryStore;
use echo_core::{Directory, EchoError, SchemaName, User};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

#[derive(Clone)]
struct TestState {
    auth: Arc<AuthenticationService>,
}

impl FromRef<TestState> for AuthState {
    fn from_ref(state: &TestState) -> Self {
        AuthState(state.auth.clone())
    }
}

async fn whoami(
    ActiveTenant(tenant): ActiveTenant,
    CurrentUser(user): CurrentUser,
) -> Json<Value> {
    Json(json!({
        "schema": tenant.schema.as_str(),
        "domain": tenant.domain,
        "user": user.map(|p| p.username),
    }))
}

async fn forbidden(State(_): State<TestState>) -> Result<Json<Value>, EchoAxumError> {
    Err(EchoError::forbidden("You do not have permission to perform this action.").into())
}

async fn boom() -> Result<Json<Value>, EchoAxumError> {
    Err(anyhow::anyhow!("database password is hunter2").into())
}

async fn setup() -> (Router, User, Arc<AuthenticationService>) {
    let store = Arc::new(MemoryStore::new());
    let mut options = AuthOptions::default();
    options.local.bcrypt_cost = 4;
    options.jwt.secret = "test-secret".into();
    let auth = Arc::new(AuthenticationService::new(options, store.clone()));

    let out = store
        .provision(Provisioning {
            user: NewUser {
                username: "alice".into(),
                email: "alice@example.com".into(),
                password_hash: auth.hash_password("pw").unwrap(),
            },
            client: NewClient {
                schema_name: SchemaName::for_username("alice").unwrap(),
                name: "alice".into(),
                paid_until: NaiveDate::from_ymd_opt(2030, 1, 1).unwrap(),
                on_trial: true,
            },
            domain: "alice.localhost".into(),
        })
        .await
        .unwrap();

    let state = TestState { auth: auth.clone() };
    let routes = Router::new()
        .route("/whoami", get(whoami))
        .route("/forbidden", get(forbidden))
        .route("/boom", get(boom))
        .with_state(state);

    let router = AxumApp::new(routes)
        .with_tenants(TenantResolver::new(store))
        .merge(Router::new().route("/health", get(|| async { "ok" })))
        .with_sessions(&SessionOptions::default())
        .unwrap()
        .with_request_tracing()
        .into_router();

    (router, out.user, auth)
}

fn get_req(uri: &str, host: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header("host", host)
        .body(Body::empty())
        .unwrap()
}

async fn json_body(res: axum::response::Response) -> Value {
    let bytes = res.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn host_selects_the_tenant() {
    let (router, _, _) = setup().await;
    let res = router
        .oneshot(get_req("/whoami", "Alice.localhost:8000"))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert!(res.headers().get("x-request-id").is_some());
    let body = json_body(res).await;
    assert_eq!(body["schema"], "alice");
    assert_eq!(body["domain"], "alice.localhost");
    assert_eq!(body["user"], Value::Null);
}

#[tokio::test]
async fn unknown_host_is_not_found() {
    let (router, _, _) = setup().await;
    let res = router
        .oneshot(get_req("/whoami", "mallory.localhost"))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert!(res.headers().get("x-request-id").is_some());
    let body = json_body(res).await;
    assert_eq!(body["message"], "No tenant for hostname 'mallory.localhost'");
    assert_eq!(body["className"], "not-found");
}

#[tokio::test]
async fn health_needs_no_tenant() {
    let (router, _, _) = setup().await;
    let res = router.oneshot(get_req("/health", "nowhere")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn request_id_is_preserved_when_provided() {
    let (router, _, _) = setup().await;
    let mut req = get_req("/whoami", "alice.localhost");
    req.headers_mut()
        .insert("x-request-id", HeaderValue::from_static("req-test-123"));
    let res = router.oneshot(req).await.unwrap();
    assert_eq!(res.headers().get("x-request-id").unwrap(), "req-test-123");
}

#[tokio::test]
async fn bearer_tokens_identify_the_caller() {
    let (router, alice, auth) = setup().await;
    let pair = auth.issue_tokens(&alice).unwrap();

    let mut req = get_req("/whoami", "alice.localhost");
    req.headers_mut().insert(
        "authorization",
        HeaderValue::from_str(&format!("Bearer {}", pair.access)).unwrap(),
    );
    let body = json_body(router.clone().oneshot(req).await.unwrap()).await;
    assert_eq!(body["user"], "alice");

    let mut req = get_req("/whoami", "alice.localhost");
    req.headers_mut()
        .insert("authorization", HeaderValue::from_static("Bearer not-a-token"));
    let res = router.oneshot(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn errors_render_as_json_without_internals() {
    let (router, _, _) = setup().await;

    let res = router
        .clone()
        .oneshot(get_req("/forbidden", "alice.localhost"))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    let body = json_body(res).await;
    assert_eq!(body["name"], "Forbidden");
    assert_eq!(body["code"], 403);

    let res = router.oneshot(get_req("/boom", "alice.localhost")).await.unwrap();
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = json_body(res).await;
    assert_eq!(body["name"], "GeneralError");
    assert!(!body.to_string().contains("hunter2"));
}
