mod common;

use assert_matches::assert_matches;
use axum::http::{Method, StatusCode};
use chrono::{Duration, Utc};
use common::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{ActiveModelTrait, EntityTrait, PaginatorTrait, Set};
use serde_json::json;
use std::sync::Arc;
use uni_naturals_api::{
    entities::{cart_item, coupon, order, order_item, CheckoutSource},
    errors::ServiceError,
    services::{cart::AddCartItem, orders::OrderDetails},
};

async fn fill_cart(app: &TestApp, user_id: i32) {
    for (product_id, variant_id, quantity) in
        [(FACE_WASH, FACE_WASH_100ML, 2), (ALOE_GEL, ALOE_GEL_150G, 1)]
    {
        app.state
            .services
            .cart
            .add_item(AddCartItem {
                user_id,
                product_id,
                variant_id,
                quantity,
                source_collection_id: None,
            })
            .await
            .expect("cart line");
    }
}

async fn cart_size(app: &TestApp) -> u64 {
    cart_item::Entity::find().count(&*app.state.db).await.unwrap()
}

async fn usage_count(app: &TestApp, coupon_id: i32) -> i32 {
    coupon::Entity::find_by_id(coupon_id)
        .one(&*app.state.db)
        .await
        .unwrap()
        .unwrap()
        .usage_count
}

async fn place_with_coupon(app: &TestApp, coupon_id: i32) -> Result<OrderDetails, ServiceError> {
    let mut new_order = order_for(ASHA, app.default_address_id, dec!(200));
    new_order.coupon_id = Some(coupon_id);
    new_order.coupon_discount = dec!(50);
    app.state
        .services
        .orders
        .create_order_with_items(new_order, vec![item(FACE_WASH, FACE_WASH_100ML, 1, dec!(250))])
        .await
}

#[tokio::test]
async fn cart_checkout_commits_order_redeems_coupon_and_empties_cart() {
    let app = TestApp::new().await;
    fill_cart(&app, ASHA).await;
    let mut input = coupon_input("SAVE100");
    input.discount_value = dec!(100);
    let coupon_id = app.create_coupon(input).await;

    let mut new_order = order_for(ASHA, app.default_address_id, dec!(700));
    new_order.coupon_id = Some(coupon_id);
    new_order.coupon_discount = dec!(100);

    let details = app
        .state
        .services
        .orders
        .create_order_with_items(
            new_order,
            vec![
                item(FACE_WASH, FACE_WASH_100ML, 2, dec!(250)),
                item(ALOE_GEL, ALOE_GEL_150G, 1, dec!(300)),
            ],
        )
        .await
        .expect("order created");

    let order = &details.order.order;
    assert!(order.order_number.starts_with("UNI-"));
    assert_eq!(order.subtotal, dec!(800));
    assert_eq!(order.total_amount, dec!(700));
    assert_eq!(order.coupon_code.as_deref(), Some("SAVE100"));
    assert_eq!(order.coupon_type.as_deref(), Some("sales"));
    assert_eq!(order.checkout_source, CheckoutSource::Cart);
    assert_eq!(order.payment_status, "pending");

    assert_eq!(details.order_items.len(), 2);
    assert_eq!(details.order_items[0].item.sub_total, dec!(500));
    assert_eq!(details.order_items[0].item.coupon_discount, dec!(62.5));
    assert_eq!(details.order_items[1].item.coupon_discount, dec!(37.5));
    assert_eq!(details.order_items[0].product_name.as_deref(), Some("Neem Face Wash"));
    assert_eq!(details.order_items[0].sku.as_deref(), Some("NFW-100"));

    let address = details.order.shipping_address.as_ref().expect("address joined");
    assert_eq!(address.pincode, "560038");
    let customer = details.order.customer.as_ref().expect("customer joined");
    assert_eq!(customer.email, "asha@example.com");

    assert_eq!(usage_count(&app, coupon_id).await, 1);
    assert_eq!(cart_size(&app).await, 0);
}

#[tokio::test]
async fn routine_checkout_keeps_the_cart() {
    let app = TestApp::new().await;
    fill_cart(&app, ASHA).await;

    let mut new_order = order_for(ASHA, app.default_address_id, dec!(400));
    new_order.checkout_source = "routine".to_string();
    new_order.source_collection_id = Some(12);

    let details = app
        .state
        .services
        .orders
        .create_order_with_items(new_order, vec![item(FACE_WASH, FACE_WASH_200ML, 1, dec!(400))])
        .await
        .expect("order created");

    assert_eq!(details.order.order.checkout_source, CheckoutSource::Routine);
    assert_eq!(details.order.order.source_collection_id, Some(12));
    assert_eq!(cart_size(&app).await, 2);
}

#[tokio::test]
async fn failed_item_insert_rolls_everything_back() {
    let app = TestApp::new().await;
    fill_cart(&app, ASHA).await;
    let coupon_id = app.create_coupon(coupon_input("ROLLBACK")).await;

    let mut new_order = order_for(ASHA, app.default_address_id, dec!(450));
    new_order.coupon_id = Some(coupon_id);
    new_order.coupon_discount = dec!(50);

    let result = app
        .state
        .services
        .orders
        .create_order_with_items(
            new_order,
            vec![
                item(FACE_WASH, FACE_WASH_100ML, 1, dec!(250)),
                item(FACE_WASH, 9_999, 1, dec!(250)),
            ],
        )
        .await;
    assert_matches!(result, Err(ServiceError::DatabaseError(_)));

    assert_eq!(order::Entity::find().count(&*app.state.db).await.unwrap(), 0);
    assert_eq!(order_item::Entity::find().count(&*app.state.db).await.unwrap(), 0);
    assert_eq!(usage_count(&app, coupon_id).await, 0);
    assert_eq!(cart_size(&app).await, 2);
}

#[tokio::test]
async fn exhausted_coupon_blocks_checkout() {
    let app = TestApp::new().await;
    let mut input = coupon_input("ONLYONE");
    input.total_usage_limit = 1;
    let coupon_id = app.create_coupon(input).await;

    let with_coupon = |user_id| {
        let mut new_order = order_for(user_id, app.default_address_id, dec!(200));
        new_order.coupon_id = Some(coupon_id);
        new_order.coupon_discount = dec!(50);
        new_order
    };

    app.state
        .services
        .orders
        .create_order_with_items(with_coupon(ASHA), vec![item(FACE_WASH, FACE_WASH_100ML, 1, dec!(250))])
        .await
        .expect("first redemption");

    let second = app
        .state
        .services
        .orders
        .create_order_with_items(with_coupon(RAVI), vec![item(FACE_WASH, FACE_WASH_100ML, 1, dec!(250))])
        .await;
    assert_matches!(second, Err(ServiceError::Conflict(msg)) if msg == "Coupon usage limit reached");
    assert_eq!(usage_count(&app, coupon_id).await, 1);
    assert_eq!(order::Entity::find().count(&*app.state.db).await.unwrap(), 1);
}

#[tokio::test]
async fn per_user_limit_is_rechecked_at_checkout() {
    let app = TestApp::new().await;
    let mut input = coupon_input("FIRSTBUY");
    input.per_user_limit = 1;
    let coupon_id = app.create_coupon(input).await;

    place_with_coupon(&app, coupon_id).await.expect("first use");
    assert_matches!(
        place_with_coupon(&app, coupon_id).await,
        Err(ServiceError::Conflict(_))
    );
    assert_eq!(usage_count(&app, coupon_id).await, 1);
}

#[tokio::test]
async fn order_needs_items_and_a_known_checkout_source() {
    let app = TestApp::new().await;
    let orders = &app.state.services.orders;

    let empty = orders
        .create_order_with_items(order_for(ASHA, app.default_address_id, dec!(0)), vec![])
        .await;
    assert_matches!(empty, Err(ServiceError::ValidationError(_)));

    let mut odd_source = order_for(ASHA, app.default_address_id, dec!(250));
    odd_source.checkout_source = "wishlist".to_string();
    let result = orders
        .create_order_with_items(odd_source, vec![item(FACE_WASH, FACE_WASH_100ML, 1, dec!(250))])
        .await;
    assert_matches!(result, Err(ServiceError::ValidationError(_)));
}

#[tokio::test]
async fn http_checkout_reports_side_effects_and_stores_the_shipment() {
    let app = TestApp::new().await;
    fill_cart(&app, ASHA).await;

    let (status, body) = app
        .request(
            Method::POST,
            "/api/v1/orders/create",
            Some(json!({
                "order": {
                    "user_id": ASHA,
                    "address_id": app.default_address_id,
                    "total_amount": 800,
                    "payment_method": "COD"
                },
                "order_items": [
                    { "product_id": FACE_WASH, "variant_id": FACE_WASH_100ML, "quantity": 2, "price": 250 },
                    { "product_id": ALOE_GEL, "variant_id": ALOE_GEL_150G, "quantity": 1, "price": 300 }
                ]
            })),
        )
        .await;

    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert!(body.get("data").is_none(), "order body is not wrapped: {body}");
    assert_eq!(body["fulfillment"]["shipping"]["status"], "succeeded");
    assert_eq!(body["fulfillment"]["email"]["status"], "succeeded");
    assert_eq!(body["order_items"].as_array().unwrap().len(), 2);
    let order_id = body["order"]["order_id"].as_i64().unwrap();

    let payloads = app.shipper.registered();
    assert_eq!(payloads.len(), 1);
    assert_eq!(payloads[0].payment_method, "COD");
    assert_eq!(payloads[0].billing_pincode, "560038");

    let sent = app.mailer.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to_email, "asha@example.com");
    assert!(sent[0].html_body.contains("Neem Face Wash"));

    let (status, body) = app
        .request(Method::GET, &format!("/api/v1/orders/{order_id}"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["order"]["shipment_order_id"], "SR-5001");
    assert_eq!(body["data"]["order"]["shipment_id"], "SH-9001");

    let (status, body) = app
        .request(Method::GET, &format!("/api/v1/orders/user/{ASHA}"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn collaborator_failures_never_fail_the_order() {
    let app = TestApp::with_collaborators(
        Arc::new(RecordingShipper::failing()),
        Arc::new(RecordingMailer::failing()),
    )
    .await;

    let (status, body) = app
        .request(
            Method::POST,
            "/api/v1/orders/create",
            Some(json!({
                "order": {
                    "user_id": ASHA,
                    "address_id": app.default_address_id,
                    "total_amount": 250,
                    "payment_method": "razorpay",
                    "checkout_source": "routine"
                },
                "order_items": [
                    { "product_id": FACE_WASH, "variant_id": FACE_WASH_100ML, "quantity": 1, "price": 250 }
                ]
            })),
        )
        .await;

    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["fulfillment"]["shipping"]["status"], "failed");
    assert_eq!(body["fulfillment"]["email"]["status"], "failed");
    assert_eq!(app.shipper.registered()[0].payment_method, "Prepaid");
    assert_eq!(order::Entity::find().count(&*app.state.db).await.unwrap(), 1);

    let stored = order::Entity::find().one(&*app.state.db).await.unwrap().unwrap();
    assert_eq!(stored.shipment_order_id, None);
}

#[tokio::test]
async fn http_checkout_maps_exhausted_coupon_to_conflict() {
    let app = TestApp::new().await;
    let mut input = coupon_input("GONEFAST");
    input.total_usage_limit = 1;
    let coupon_id = app.create_coupon(input).await;

    let model = coupon::Entity::find_by_id(coupon_id)
        .one(&*app.state.db)
        .await
        .unwrap()
        .unwrap();
    let mut active: coupon::ActiveModel = model.into();
    active.usage_count = Set(1);
    active.update(&*app.state.db).await.unwrap();

    let (status, body) = app
        .request(
            Method::POST,
            "/api/v1/orders/create",
            Some(json!({
                "order": {
                    "user_id": ASHA,
                    "address_id": app.default_address_id,
                    "total_amount": 200,
                    "payment_method": "COD",
                    "coupon_id": coupon_id,
                    "coupon_discount": 50
                },
                "order_items": [
                    { "product_id": FACE_WASH, "variant_id": FACE_WASH_100ML, "quantity": 1, "price": 250 }
                ]
            })),
        )
        .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["message"], "Conflict: Coupon usage limit reached");
    assert!(app.shipper.registered().is_empty());
}

#[tokio::test]
async fn expired_or_disabled_coupon_is_not_redeemed() {
    let app = TestApp::new().await;
    let expired_id = app.create_coupon(coupon_input("MONSOONOVER")).await;
    let disabled_id = app.create_coupon(coupon_input("PAUSED")).await;

    let expired = coupon::Entity::find_by_id(expired_id)
        .one(&*app.state.db)
        .await
        .unwrap()
        .unwrap();
    let mut active: coupon::ActiveModel = expired.into();
    active.end_date = Set(Utc::now() - Duration::hours(1));
    active.update(&*app.state.db).await.unwrap();

    let disabled = coupon::Entity::find_by_id(disabled_id)
        .one(&*app.state.db)
        .await
        .unwrap()
        .unwrap();
    let mut active: coupon::ActiveModel = disabled.into();
    active.is_active = Set(false);
    active.update(&*app.state.db).await.unwrap();

    assert_matches!(
        place_with_coupon(&app, expired_id).await,
        Err(ServiceError::Conflict(msg)) if msg == "This coupon has expired"
    );
    assert_matches!(
        place_with_coupon(&app, disabled_id).await,
        Err(ServiceError::Conflict(msg)) if msg == "This coupon is no longer active"
    );
    assert_eq!(usage_count(&app, expired_id).await, 0);
    assert_eq!(usage_count(&app, disabled_id).await, 0);
    assert_eq!(order::Entity::find().count(&*app.state.db).await.unwrap(), 0);
}

#[tokio::test]
async fn concurrent_checkouts_respect_the_per_user_limit() {
    let app = TestApp::new().await;
    let mut input = coupon_input("WELCOME1");
    input.per_user_limit = 1;
    let coupon_id = app.create_coupon(input).await;

    let (first, second) = tokio::join!(
        place_with_coupon(&app, coupon_id),
        place_with_coupon(&app, coupon_id)
    );

    let outcomes = [first, second];
    assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(outcomes
        .iter()
        .any(|r| matches!(r, Err(ServiceError::Conflict(_)))));
    assert_eq!(usage_count(&app, coupon_id).await, 1);
    assert_eq!(order::Entity::find().count(&*app.state.db).await.unwrap(), 1);
}

#[tokio::test]
async fn oversized_amounts_are_rejected_before_any_write() {
    let app = TestApp::new().await;
    let orders = &app.state.services.orders;

    let huge_price = orders
        .create_order_with_items(
            order_for(ASHA, app.default_address_id, dec!(250)),
            vec![item(FACE_WASH, FACE_WASH_100ML, 1, Decimal::MAX)],
        )
        .await;
    assert_matches!(huge_price, Err(ServiceError::ValidationError(msg)) if msg.contains("price"));

    let huge_quantity = orders
        .create_order_with_items(
            order_for(ASHA, app.default_address_id, dec!(250)),
            vec![item(FACE_WASH, FACE_WASH_100ML, 2_000_000_000, dec!(250))],
        )
        .await;
    assert_matches!(huge_quantity, Err(ServiceError::ValidationError(msg)) if msg.contains("quantity"));

    let (status, body) = app
        .request(
            Method::POST,
            "/api/v1/orders/create",
            Some(json!({
                "order": {
                    "user_id": ASHA,
                    "address_id": app.default_address_id,
                    "total_amount": 7e28,
                    "payment_method": "COD"
                },
                "order_items": [
                    { "product_id": FACE_WASH, "variant_id": FACE_WASH_100ML, "quantity": 1, "price": 250 }
                ]
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
    assert_eq!(order::Entity::find().count(&*app.state.db).await.unwrap(), 0);
}
