mod common;

use axum::http::{Method, StatusCode};
use common::*;
use sea_orm::{EntityTrait, PaginatorTrait};
use serde_json::{json, Value};
use uni_naturals_api::{entities::order, services::payments::razorpay_signature};

fn verify_body(app: &TestApp, signature: &str) -> Value {
    json!({
        "razorpay_order_id": "order_NK3x9Qv1",
        "razorpay_payment_id": "pay_NK3xa8Lm",
        "razorpay_signature": signature,
        "order": {
            "user_id": ASHA,
            "address_id": app.default_address_id,
            "total_amount": 400,
            "payment_method": "razorpay"
        },
        "order_items": [
            { "product_id": FACE_WASH, "variant_id": FACE_WASH_200ML, "quantity": 1, "price": 400 }
        ]
    })
}

#[tokio::test]
async fn verified_payment_creates_a_paid_order() {
    let app = TestApp::new().await;
    let signature =
        razorpay_signature("order_NK3x9Qv1", "pay_NK3xa8Lm", RAZORPAY_SECRET).unwrap();

    let (status, body) = app
        .request(Method::POST, "/api/v1/payments/verify", Some(verify_body(&app, &signature)))
        .await;

    assert_eq!(status, StatusCode::CREATED, "{body}");
    let placed = &body["order"];
    assert_eq!(placed["payment_status"], "paid");
    assert_eq!(placed["payment_reference"], "pay_NK3xa8Lm");
    assert_eq!(body["order_items"].as_array().unwrap().len(), 1);
    assert_eq!(body["fulfillment"]["shipping"]["status"], "succeeded");
    assert_eq!(app.shipper.registered()[0].payment_method, "Prepaid");
}

#[tokio::test]
async fn signature_is_case_insensitive() {
    let app = TestApp::new().await;
    let signature = razorpay_signature("order_NK3x9Qv1", "pay_NK3xa8Lm", RAZORPAY_SECRET)
        .unwrap()
        .to_uppercase();

    let (status, _) = app
        .request(Method::POST, "/api/v1/payments/verify", Some(verify_body(&app, &signature)))
        .await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn tampered_signature_creates_nothing() {
    let app = TestApp::new().await;
    let signature = razorpay_signature("order_NK3x9Qv1", "pay_other", RAZORPAY_SECRET).unwrap();

    let (status, body) = app
        .request(Method::POST, "/api/v1/payments/verify", Some(verify_body(&app, &signature)))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Payment verification failed");
    assert_eq!(order::Entity::find().count(&*app.state.db).await.unwrap(), 0);
    assert!(app.shipper.registered().is_empty());
    assert!(app.mailer.sent().is_empty());
}
