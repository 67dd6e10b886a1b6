//! Fixtures shared by the service unit tests.

use crate::entities::{order, order_item};
use crate::services::orders::{
    Customer, OrderDetails, OrderItemDetails, OrderView, ShippingAddress,
};
use chrono::{TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Two-line order: 2 x 300 with a recorded 0.25 kg weight, 1 x 300 without.
pub fn sample_details(payment_method: &str) -> OrderDetails {
    let created = Utc.with_ymd_and_hms(2024, 6, 1, 9, 30, 0).unwrap();
    let order = order::Model {
        order_id: 11,
        order_number: "UNI-1717234200000-42".into(),
        user_id: 3,
        address_id: 5,
        subtotal: dec!(900),
        total_amount: dec!(850),
        payment_method: payment_method.into(),
        payment_status: "paid".into(),
        payment_reference: None,
        order_status: "placed".into(),
        coupon_id: None,
        coupon_code: None,
        coupon_type: None,
        coupon_discount: dec!(50),
        source_collection_id: None,
        shipping_amount: Decimal::ZERO,
        checkout_source: order::CheckoutSource::Cart,
        shipment_order_id: None,
        shipment_id: None,
        created_at: created,
        updated_at: created,
    };
    let line = |id: i32, qty: i32, price: Decimal, weight: Option<Decimal>| OrderItemDetails {
        item: order_item::Model {
            order_item_id: id,
            order_id: 11,
            product_id: id,
            variant_id: id * 10,
            quantity: qty,
            price,
            sub_total: price * Decimal::from(qty),
            coupon_discount: Decimal::ZERO,
            source_collection_id: None,
            created_at: created,
        },
        product_name: Some("Neem Face Wash".into()),
        variant_name: Some("100ml".into()),
        sku: Some(format!("NFW-{}", id)),
        mrp: None,
        weight,
        image_url: None,
    };
    OrderDetails {
        order: OrderView {
            order,
            shipping_address: Some(ShippingAddress {
                address_id: 5,
                full_name: "Asha Rao".into(),
                phone: "9876543210".into(),
                address_line1: "12 Lake Road".into(),
                address_line2: None,
                city: "Bengaluru".into(),
                state: "Karnataka".into(),
                pincode: "560001".into(),
                country: "India".into(),
            }),
            customer: Some(Customer {
                user_id: 3,
                name: "Asha  Devi Rao".into(),
                email: "asha@example.com".into(),
                phone: None,
            }),
        },
        order_items: vec![
            line(1, 2, dec!(300), Some(dec!(0.25))),
            line(2, 1, dec!(300), None),
        ],
    }
}
