mod common;

use axum::http::{Method, StatusCode};
use common::*;

#[tokio::test]
async fn liveness_is_always_up() {
    let app = TestApp::new().await;
    let (status, body) = app.request(Method::GET, "/api/v1/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "up");
}

#[tokio::test]
async fn status_reports_database_and_collaborators() {
    let app = TestApp::new().await;
    let (status, body) = app.request(Method::GET, "/api/v1/status", None).await;

    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["status"], "up");
    assert_eq!(body["service"], "uni-naturals-api");
    assert_eq!(body["environment"], "test");
    assert_eq!(body["details"]["database"]["status"], "up");
    assert_eq!(body["details"]["shipping"]["status"], "up");
    assert_eq!(body["details"]["email"]["status"], "up");
}

#[tokio::test]
async fn openapi_document_is_served() {
    let app = TestApp::new().await;
    let (status, body) = app.request(Method::GET, "/api-docs/openapi.json", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["info"]["title"], "U&I Naturals API");
    assert!(body["paths"].get("/api/v1/coupons/validate").is_some());
}

#[tokio::test]
async fn unknown_routes_are_not_found() {
    let app = TestApp::new().await;
    let (status, _) = app.request(Method::GET, "/api/v1/wishlist", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
