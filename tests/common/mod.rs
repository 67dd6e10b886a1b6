#![allow(dead_code)]

use std::str::FromStr;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
    Router,
};
use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{ActiveModelTrait, Set};
use serde_json::Value;
use tempfile::TempDir;
use tokio::sync::mpsc;
use tower::ServiceExt;
use uni_naturals_api::{
    config::AppConfig,
    db,
    entities::{address, coupon::CouponType, coupon::DiscountType, product, product_variant, user},
    errors::CollaboratorError,
    events::{self, EventSender},
    handlers::AppServices,
    services::{
        coupons::CouponInput,
        mailer::{OrderEmail, OrderMailer},
        orders::{NewOrder, NewOrderItem},
        shipping::{ShipmentPayload, ShipmentRef, ShippingNotifier},
    },
    AppState,
};

pub const ASHA: i32 = 1;
pub const RAVI: i32 = 2;

pub const FACE_WASH: i32 = 1;
pub const FACE_WASH_100ML: i32 = 10;
pub const FACE_WASH_200ML: i32 = 11;
pub const ALOE_GEL: i32 = 2;
pub const ALOE_GEL_150G: i32 = 20;
pub const RETIRED_SOAP: i32 = 3;
pub const RETIRED_SOAP_BAR: i32 = 30;

pub const RAZORPAY_SECRET: &str = "rzp_test_secret";

/// Records registrations; answers with a fixed carrier reference or fails.
#[derive(Default)]
pub struct RecordingShipper {
    pub payloads: Mutex<Vec<ShipmentPayload>>,
    pub fail: bool,
}

impl RecordingShipper {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn registered(&self) -> Vec<ShipmentPayload> {
        self.payloads.lock().unwrap().clone()
    }
}

#[async_trait]
impl ShippingNotifier for RecordingShipper {
    async fn register_shipment(
        &self,
        payload: &ShipmentPayload,
    ) -> Result<ShipmentRef, CollaboratorError> {
        self.payloads.lock().unwrap().push(payload.clone());
        if self.fail {
            return Err(CollaboratorError::Rejected {
                service: "shiprocket",
                status: 422,
                body: "pickup location not found".into(),
            });
        }
        Ok(ShipmentRef {
            shipment_order_id: "SR-5001".into(),
            shipment_id: Some("SH-9001".into()),
        })
    }
}

#[derive(Default)]
pub struct RecordingMailer {
    pub sent: Mutex<Vec<OrderEmail>>,
    pub fail: bool,
}

impl RecordingMailer {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn sent(&self) -> Vec<OrderEmail> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl OrderMailer for RecordingMailer {
    async fn send(&self, email: &OrderEmail) -> Result<(), CollaboratorError> {
        if self.fail {
            return Err(CollaboratorError::Delivery("connection refused".into()));
        }
        self.sent.lock().unwrap().push(email.clone());
        Ok(())
    }
}

/// Application wired to a throwaway SQLite file with a small seeded catalog.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub shipper: Arc<RecordingShipper>,
    pub mailer: Arc<RecordingMailer>,
    pub default_address_id: i32,
    _event_task: tokio::task::JoinHandle<()>,
    _dir: TempDir,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_collaborators(
            Arc::new(RecordingShipper::default()),
            Arc::new(RecordingMailer::default()),
        )
        .await
    }

    pub async fn with_collaborators(
        shipper: Arc<RecordingShipper>,
        mailer: Arc<RecordingMailer>,
    ) -> Self {
        let dir = tempfile::tempdir().expect("temp dir");
        let db_path = dir.path().join("uni_naturals_test.db");

        let mut cfg = AppConfig::new(
            format!("sqlite://{}?mode=rwc", db_path.display()),
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;
        cfg.razorpay_key_secret = Some(RAZORPAY_SECRET.to_string());

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let db_arc = Arc::new(pool);
        let (event_tx, event_rx) = mpsc::channel(256);
        let event_sender = Arc::new(EventSender::new(event_tx));
        let event_task = tokio::spawn(events::process_events(event_rx));

        let services = AppServices::with_collaborators(
            db_arc.clone(),
            event_sender.clone(),
            &cfg,
            Some(shipper.clone() as Arc<dyn ShippingNotifier>),
            Some(mailer.clone() as Arc<dyn OrderMailer>),
        );
        let state = AppState {
            db: db_arc,
            config: cfg,
            event_sender,
            services,
        };

        let default_address_id = seed_catalog(&state).await;
        let router = uni_naturals_api::build_router(state.clone());

        Self {
            router,
            state,
            shipper,
            mailer,
            default_address_id,
            _event_task: event_task,
            _dir: dir,
        }
    }

    pub async fn request(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(json) => {
                builder = builder.header("content-type", "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };

        let response = self
            .router
            .clone()
            .oneshot(builder.body(body).expect("request"))
            .await
            .expect("router response");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("response body");
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }

    pub async fn create_coupon(&self, input: CouponInput) -> i32 {
        self.state
            .services
            .coupons
            .create_coupon(input)
            .await
            .expect("coupon created")
            .coupon
            .coupon_id
    }
}

async fn seed_catalog(state: &AppState) -> i32 {
    let db = &*state.db;
    let now = Utc::now();

    for (user_id, name, email) in [
        (ASHA, "Asha Rao", "asha@example.com"),
        (RAVI, "Ravi Kumar", "ravi@example.com"),
    ] {
        user::ActiveModel {
            user_id: Set(user_id),
            name: Set(name.to_string()),
            email: Set(email.to_string()),
            phone: Set(Some("9876543210".to_string())),
            created_at: Set(now),
        }
        .insert(db)
        .await
        .expect("seed user");
    }

    for (product_id, name, is_active) in [
        (FACE_WASH, "Neem Face Wash", true),
        (ALOE_GEL, "Aloe Vera Gel", true),
        (RETIRED_SOAP, "Sandal Soap", false),
    ] {
        product::ActiveModel {
            product_id: Set(product_id),
            name: Set(name.to_string()),
            image_url: Set(Some(format!("https://cdn.example.com/{}.jpg", product_id))),
            is_active: Set(is_active),
            created_at: Set(now),
        }
        .insert(db)
        .await
        .expect("seed product");
    }

    for (variant_id, product_id, sku, name, price, weight) in [
        (FACE_WASH_100ML, FACE_WASH, "NFW-100", "100ml", dec!(250), Some(dec!(0.25))),
        (FACE_WASH_200ML, FACE_WASH, "NFW-200", "200ml", dec!(400), Some(dec!(0.5))),
        (ALOE_GEL_150G, ALOE_GEL, "AVG-150", "150g", dec!(300), None),
        (RETIRED_SOAP_BAR, RETIRED_SOAP, "SS-75", "75g", dec!(90), None),
    ] {
        product_variant::ActiveModel {
            variant_id: Set(variant_id),
            product_id: Set(product_id),
            sku: Set(sku.to_string()),
            name: Set(name.to_string()),
            price: Set(price),
            mrp: Set(Some(price + dec!(50))),
            weight: Set(weight),
            created_at: Set(now),
        }
        .insert(db)
        .await
        .expect("seed variant");
    }

    address::ActiveModel {
        user_id: Set(ASHA),
        full_name: Set("Asha Rao".to_string()),
        phone: Set("9876543210".to_string()),
        address_line1: Set("12 Lake Road".to_string()),
        address_line2: Set(Some("Indiranagar".to_string())),
        city: Set("Bengaluru".to_string()),
        state: Set("Karnataka".to_string()),
        pincode: Set("560038".to_string()),
        country: Set("India".to_string()),
        is_default: Set(true),
        is_active: Set(true),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("seed address")
    .address_id
}

/// Store-wide flat coupon, live from yesterday for a month.
pub fn coupon_input(code: &str) -> CouponInput {
    let now = Utc::now();
    CouponInput {
        coupon_code: code.to_string(),
        description: None,
        coupon_type: CouponType::Sales,
        discount_type: DiscountType::Flat,
        discount_value: dec!(50),
        max_discount_amount: None,
        min_order_amount: Decimal::ZERO,
        start_date: now - Duration::days(1),
        end_date: now + Duration::days(30),
        is_active: true,
        total_usage_limit: 0,
        per_user_limit: 0,
        collection_ids: Vec::new(),
    }
}

pub fn order_for(user_id: i32, address_id: i32, total: Decimal) -> NewOrder {
    NewOrder {
        user_id,
        address_id,
        total_amount: total,
        subtotal: None,
        payment_method: "COD".to_string(),
        payment_status: "pending".to_string(),
        payment_reference: None,
        order_status: "placed".to_string(),
        coupon_id: None,
        coupon_code: None,
        coupon_type: None,
        coupon_discount: Decimal::ZERO,
        source_collection_id: None,
        shipping_amount: Decimal::ZERO,
        checkout_source: "cart".to_string(),
    }
}

pub fn item(product_id: i32, variant_id: i32, quantity: i32, price: Decimal) -> NewOrderItem {
    NewOrderItem {
        product_id,
        variant_id,
        quantity,
        price,
        sub_total: None,
        coupon_discount: None,
        source_collection_id: None,
    }
}

/// Reads a money field whether it was serialized as a string or a number.
pub fn money(value: &Value) -> Decimal {
    match value {
        Value::String(s) => Decimal::from_str(s).expect("decimal string"),
        Value::Number(n) => Decimal::from_str(&n.to_string()).expect("decimal number"),
        other => panic!("expected a money value, got {other}"),
    }
}
