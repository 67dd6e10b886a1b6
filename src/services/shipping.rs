//! Carrier registration for committed orders.

use crate::{
    errors::CollaboratorError,
    services::orders::OrderDetails,
};
use async_trait::async_trait;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

const SERVICE: &str = "shiprocket";

/// Package defaults applied to every shipment.
#[derive(Debug, Clone)]
pub struct PackageSettings {
    pub pickup_location: String,
    pub length_cm: f64,
    pub breadth_cm: f64,
    pub height_cm: f64,
    /// Used for variants without a recorded weight
    pub default_item_weight_kg: Decimal,
}

impl Default for PackageSettings {
    fn default() -> Self {
        Self {
            pickup_location: "Primary".to_string(),
            length_cm: 15.0,
            breadth_cm: 10.0,
            height_cm: 10.0,
            default_item_weight_kg: Decimal::new(5, 1),
        }
    }
}

impl From<&crate::config::AppConfig> for PackageSettings {
    fn from(cfg: &crate::config::AppConfig) -> Self {
        Self {
            pickup_location: cfg.shiprocket_pickup_location.clone(),
            length_cm: cfg.package_length_cm,
            breadth_cm: cfg.package_breadth_cm,
            height_cm: cfg.package_height_cm,
            default_item_weight_kg: Decimal::try_from(cfg.default_item_weight_kg)
                .unwrap_or_else(|_| Decimal::new(5, 1)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShipmentItem {
    pub name: String,
    pub sku: String,
    pub units: i32,
    #[serde(with = "rust_decimal::serde::float")]
    pub selling_price: Decimal,
}

/// Body of the carrier's ad-hoc order creation call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShipmentPayload {
    pub order_id: String,
    pub order_date: String,
    pub pickup_location: String,
    pub billing_customer_name: String,
    pub billing_last_name: String,
    pub billing_address: String,
    pub billing_address_2: String,
    pub billing_city: String,
    pub billing_pincode: String,
    pub billing_state: String,
    pub billing_country: String,
    pub billing_email: String,
    pub billing_phone: String,
    pub shipping_is_billing: bool,
    pub order_items: Vec<ShipmentItem>,
    pub payment_method: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub sub_total: Decimal,
    pub length: f64,
    pub breadth: f64,
    pub height: f64,
    /// Kilograms
    #[serde(with = "rust_decimal::serde::float")]
    pub weight: Decimal,
}

/// Carrier-side identifiers for a registered shipment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShipmentRef {
    pub shipment_order_id: String,
    pub shipment_id: Option<String>,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ShippingNotifier: Send + Sync {
    async fn register_shipment(
        &self,
        payload: &ShipmentPayload,
    ) -> Result<ShipmentRef, CollaboratorError>;
}

/// Splits a full name on the first run of whitespace.
pub fn split_name(full_name: &str) -> (String, String) {
    let trimmed = full_name.trim();
    match trimmed.split_once(char::is_whitespace) {
        Some((first, rest)) => (first.to_string(), rest.trim().to_string()),
        None => (trimmed.to_string(), String::new()),
    }
}

/// Total parcel weight in kilograms, rounded to grams.
pub fn shipment_weight(details: &OrderDetails, default_item_weight_kg: Decimal) -> Decimal {
    details
        .order_items
        .iter()
        .map(|line| line.weight.unwrap_or(default_item_weight_kg) * Decimal::from(line.item.quantity))
        .sum::<Decimal>()
        .round_dp_with_strategy(3, RoundingStrategy::MidpointAwayFromZero)
}

pub fn build_shipment_payload(
    details: &OrderDetails,
    settings: &PackageSettings,
) -> Result<ShipmentPayload, CollaboratorError> {
    let order = &details.order.order;
    let address = details.order.shipping_address.as_ref().ok_or_else(|| {
        CollaboratorError::InvalidMessage(format!(
            "order {} has no shipping address",
            order.order_number
        ))
    })?;

    let full_name = details
        .order
        .customer
        .as_ref()
        .map(|c| c.name.as_str())
        .filter(|name| !name.trim().is_empty())
        .unwrap_or(address.full_name.as_str());
    let (first_name, last_name) = split_name(full_name);
    let email = details
        .order
        .customer
        .as_ref()
        .map(|c| c.email.clone())
        .unwrap_or_default();

    let order_items = details
        .order_items
        .iter()
        .map(|line| ShipmentItem {
            name: match (&line.product_name, &line.variant_name) {
                (Some(product), Some(variant)) => format!("{} - {}", product, variant),
                (Some(product), None) => product.clone(),
                (None, Some(variant)) => variant.clone(),
                (None, None) => format!("Item {}", line.item.variant_id),
            },
            sku: line
                .sku
                .clone()
                .unwrap_or_else(|| format!("VAR-{}", line.item.variant_id)),
            units: line.item.quantity,
            selling_price: line.item.price,
        })
        .collect();

    let payment_method = if order.payment_method.eq_ignore_ascii_case("cod") {
        "COD"
    } else {
        "Prepaid"
    };

    Ok(ShipmentPayload {
        order_id: order.order_number.clone(),
        order_date: order.created_at.format("%Y-%m-%d %H:%M").to_string(),
        pickup_location: settings.pickup_location.clone(),
        billing_customer_name: first_name,
        billing_last_name: last_name,
        billing_address: address.address_line1.clone(),
        billing_address_2: address.address_line2.clone().unwrap_or_default(),
        billing_city: address.city.clone(),
        billing_pincode: address.pincode.clone(),
        billing_state: address.state.clone(),
        billing_country: address.country.clone(),
        billing_email: email,
        billing_phone: address.phone.clone(),
        shipping_is_billing: true,
        order_items,
        payment_method: payment_method.to_string(),
        sub_total: order.total_amount,
        length: settings.length_cm,
        breadth: settings.breadth_cm,
        height: settings.height_cm,
        weight: shipment_weight(details, settings.default_item_weight_kg),
    })
}

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

/// Shiprocket REST client. Logs in for a bearer token on every
/// registration.
#[derive(Clone)]
pub struct ShiprocketClient {
    client: reqwest::Client,
    base_url: String,
    email: String,
    password: String,
}

impl ShiprocketClient {
    pub fn new(
        base_url: impl Into<String>,
        email: impl Into<String>,
        password: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, CollaboratorError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|source| CollaboratorError::Transport {
                service: SERVICE,
                source,
            })?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            email: email.into(),
            password: password.into(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn post_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
        token: Option<&str>,
    ) -> Result<Value, CollaboratorError> {
        let mut request = self.client.post(self.url(path)).json(body);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|source| CollaboratorError::Transport {
                service: SERVICE,
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CollaboratorError::Rejected {
                service: SERVICE,
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| CollaboratorError::UnexpectedResponse {
                service: SERVICE,
                detail: e.to_string(),
            })
    }

    async fn login(&self) -> Result<String, CollaboratorError> {
        let body = self
            .post_json(
                "/v1/external/auth/login",
                &LoginRequest {
                    email: &self.email,
                    password: &self.password,
                },
                None,
            )
            .await?;

        body.get("token")
            .and_then(Value::as_str)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .ok_or_else(|| CollaboratorError::UnexpectedResponse {
                service: SERVICE,
                detail: "login response has no token".to_string(),
            })
    }
}

fn id_field(body: &Value, key: &str) -> Option<String> {
    match body.get(key)? {
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        _ => None,
    }
}

#[async_trait]
impl ShippingNotifier for ShiprocketClient {
    #[instrument(skip(self, payload), fields(order_number = %payload.order_id))]
    async fn register_shipment(
        &self,
        payload: &ShipmentPayload,
    ) -> Result<ShipmentRef, CollaboratorError> {
        let token = self.login().await?;
        debug!("carrier login succeeded");

        let body = self
            .post_json("/v1/external/orders/create/adhoc", payload, Some(&token))
            .await?;

        let Some(shipment_order_id) = id_field(&body, "order_id") else {
            warn!(response = %body, "carrier response has no order_id");
            return Err(CollaboratorError::UnexpectedResponse {
                service: SERVICE,
                detail: "order creation response has no order_id".to_string(),
            });
        };
        let shipment_id = id_field(&body, "shipment_id");

        info!(shipment_order_id = %shipment_order_id, "shipment registered");
        Ok(ShipmentRef {
            shipment_order_id,
            shipment_id,
        })
    }
}
