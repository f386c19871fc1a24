mod common;

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use serde_json::json;
use tower::ServiceExt;

use common::*;
use parish_giving::build_router;
use parish_giving::middleware::auth::{issue_session, CSRF_HEADER};

fn initiate_body() -> String {
    json!({"amount": 500, "paybill_id": PAYBILL_ID, "phone_number": "0712345678"}).to_string()
}

#[tokio::test]
async fn initiate_without_session_is_unauthorized() {
    let repository = Arc::new(MemoryRepository::new());
    let gateway = Arc::new(FakeGateway::new(GatewayMode::Accept));
    let app = build_router(app_state(repository.clone(), Some(gateway.clone())));

    let request = Request::builder()
        .method("POST")
        .uri("/api/giving/mpesa/initiate")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(initiate_body()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(response).await["error"], "unauthorized");
    assert!(gateway.pushes().is_empty());
}

#[tokio::test]
async fn initiate_with_wrong_csrf_is_forbidden() {
    let repository = Arc::new(MemoryRepository::new());
    let gateway = Arc::new(FakeGateway::new(GatewayMode::Accept));
    let app = build_router(app_state(repository.clone(), Some(gateway.clone())));

    let session = issue_session(JWT_SECRET, MEMBER_ID, PARISH_ID, 1).unwrap();
    let request = Request::builder()
        .method("POST")
        .uri("/api/giving/mpesa/initiate")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::COOKIE, format!("session={}", session.token))
        .header(CSRF_HEADER, "stolen-page-token")
        .body(Body::from(initiate_body()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(json_body(response).await["error"], "forbidden");
    assert!(gateway.pushes().is_empty());
    assert!(repository.givings().is_empty());
}

#[tokio::test]
async fn status_requires_csrf_header() {
    let repository = Arc::new(MemoryRepository::new());
    repository.insert_giving(MEMBER_ID, "ws_CO_1", 100);
    let app = build_router(app_state(repository, None));

    let session = issue_session(JWT_SECRET, MEMBER_ID, PARISH_ID, 1).unwrap();
    let request = Request::builder()
        .uri("/api/giving/mpesa/status/ws_CO_1")
        .header(header::AUTHORIZATION, format!("Bearer {}", session.token))
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn logout_expires_the_cookie() {
    let app = build_router(app_state(Arc::new(MemoryRepository::new()), None));

    let request = Request::builder()
        .method("POST")
        .uri("/api/auth/logout")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .unwrap()
        .to_string();
    assert!(cookie.starts_with("session=;"));
    assert!(cookie.contains("Max-Age=0"));
}

#[tokio::test]
async fn health_reports_giving_availability() {
    let app = build_router(app_state(
        Arc::new(MemoryRepository::new()),
        Some(Arc::new(FakeGateway::new(GatewayMode::Accept))),
    ));

    let response = app
        .oneshot(Request::builder().uri("/api/giving/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["service"], "giving");
}

fn preflight(origin: &str) -> Request<Body> {
    Request::builder()
        .method("OPTIONS")
        .uri("/api/giving/mpesa/initiate")
        .header(header::ORIGIN, origin)
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "content-type,x-csrf-token")
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn configured_origins_may_send_the_session_cookie() {
    let mut state = app_state(Arc::new(MemoryRepository::new()), None);
    state.cors_origins = Arc::from(vec!["https://stmarys.example".to_string()]);
    let app = build_router(state);

    let response = app.clone().oneshot(preflight("https://stmarys.example")).await.unwrap();
    let headers = response.headers();
    assert_eq!(
        headers.get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
        "https://stmarys.example"
    );
    assert_eq!(headers.get(header::ACCESS_CONTROL_ALLOW_CREDENTIALS).unwrap(), "true");

    let response = app.oneshot(preflight("https://elsewhere.example")).await.unwrap();
    assert!(response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
}

#[tokio::test]
async fn without_configured_origins_cookies_stay_same_origin() {
    let app = build_router(app_state(Arc::new(MemoryRepository::new()), None));

    let response = app.oneshot(preflight("https://elsewhere.example")).await.unwrap();
    let headers = response.headers();
    assert_eq!(headers.get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(), "*");
    assert!(headers.get(header::ACCESS_CONTROL_ALLOW_CREDENTIALS).is_none());
}
