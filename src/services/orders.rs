use crate::{
    entities::{
        address, cart_item, coupon_collection,
        coupon::{self, CouponType},
        order::{self, CheckoutSource, Model as OrderModel},
        order_item::{self, Model as OrderItemModel},
        product, product_variant, user,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::{
        coupon_rules::{self, CartLine, CouponRejection, DiscountScope},
        coupons::prior_redemptions,
        shipping::ShipmentRef,
    },
};
use chrono::Utc;
use rand::Rng;
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait,
    DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;
use validator::Validate;

fn default_payment_status() -> String {
    "pending".to_string()
}

fn default_order_status() -> String {
    "placed".to_string()
}

fn default_checkout_source() -> String {
    "cart".to_string()
}

/// Order header as sent by the checkout.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct NewOrder {
    pub user_id: i32,
    pub address_id: i32,
    #[schema(value_type = f64)]
    pub total_amount: Decimal,
    /// Derived from the items when absent
    #[serde(default)]
    #[schema(value_type = Option<f64>)]
    pub subtotal: Option<Decimal>,
    #[validate(length(min = 1, message = "payment_method is required"))]
    pub payment_method: String,
    #[serde(default = "default_payment_status")]
    pub payment_status: String,
    #[serde(default)]
    pub payment_reference: Option<String>,
    #[serde(default = "default_order_status")]
    pub order_status: String,
    #[serde(default)]
    pub coupon_id: Option<i32>,
    #[serde(default)]
    pub coupon_code: Option<String>,
    #[serde(default)]
    pub coupon_type: Option<String>,
    #[serde(default)]
    #[schema(value_type = f64)]
    pub coupon_discount: Decimal,
    #[serde(default)]
    pub source_collection_id: Option<i32>,
    #[serde(default)]
    #[schema(value_type = f64)]
    pub shipping_amount: Decimal,
    /// `cart` or `routine`
    #[serde(default = "default_checkout_source")]
    pub checkout_source: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct NewOrderItem {
    pub product_id: i32,
    pub variant_id: i32,
    #[validate(range(min = 1, message = "quantity must be at least 1"))]
    pub quantity: i32,
    #[schema(value_type = f64)]
    pub price: Decimal,
    #[serde(default)]
    #[schema(value_type = Option<f64>)]
    pub sub_total: Option<Decimal>,
    /// Apportioned from the order discount when absent
    #[serde(default)]
    #[schema(value_type = Option<f64>)]
    pub coupon_discount: Option<Decimal>,
    #[serde(default)]
    pub source_collection_id: Option<i32>,
}

impl NewOrderItem {
    fn as_cart_line(&self) -> CartLine {
        CartLine {
            product_id: self.product_id,
            variant_id: self.variant_id,
            quantity: self.quantity,
            price: self.price,
            source_collection_id: self.source_collection_id,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ShippingAddress {
    pub address_id: i32,
    pub full_name: String,
    pub phone: String,
    pub address_line1: String,
    pub address_line2: Option<String>,
    pub city: String,
    pub state: String,
    pub pincode: String,
    pub country: String,
}

impl From<address::Model> for ShippingAddress {
    fn from(a: address::Model) -> Self {
        Self {
            address_id: a.address_id,
            full_name: a.full_name,
            phone: a.phone,
            address_line1: a.address_line1,
            address_line2: a.address_line2,
            city: a.city,
            state: a.state,
            pincode: a.pincode,
            country: a.country,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Customer {
    pub user_id: i32,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
}

/// Order header joined with its address and customer.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct OrderView {
    #[serde(flatten)]
    pub order: OrderModel,
    pub shipping_address: Option<ShippingAddress>,
    pub customer: Option<Customer>,
}

/// Order line joined with product and variant data.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct OrderItemDetails {
    #[serde(flatten)]
    pub item: OrderItemModel,
    pub product_name: Option<String>,
    pub variant_name: Option<String>,
    pub sku: Option<String>,
    #[schema(value_type = Option<f64>)]
    pub mrp: Option<Decimal>,
    /// Kilograms
    #[schema(value_type = Option<f64>)]
    pub weight: Option<Decimal>,
    pub image_url: Option<String>,
}

/// Fully denormalised order, as returned after checkout.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct OrderDetails {
    pub order: OrderView,
    pub order_items: Vec<OrderItemDetails>,
}

pub fn parse_checkout_source(raw: &str) -> Result<CheckoutSource, ServiceError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "cart" => Ok(CheckoutSource::Cart),
        "routine" => Ok(CheckoutSource::Routine),
        other => Err(ServiceError::ValidationError(format!(
            "checkout_source must be 'cart' or 'routine', got '{}'",
            other
        ))),
    }
}

fn check_order_amounts(new_order: &NewOrder) -> Result<(), ServiceError> {
    coupon_rules::check_amount("total_amount", new_order.total_amount)?;
    coupon_rules::check_amount("coupon_discount", new_order.coupon_discount)?;
    coupon_rules::check_amount("shipping_amount", new_order.shipping_amount)?;
    if let Some(subtotal) = new_order.subtotal {
        coupon_rules::check_amount("subtotal", subtotal)?;
    }
    Ok(())
}

fn check_item_amounts(item: &NewOrderItem) -> Result<(), ServiceError> {
    coupon_rules::check_amount("price", item.price)?;
    coupon_rules::check_quantity(item.quantity)?;
    if let Some(sub_total) = item.sub_total {
        coupon_rules::check_amount("sub_total", sub_total)?;
    }
    if let Some(coupon_discount) = item.coupon_discount {
        coupon_rules::check_amount("coupon_discount", coupon_discount)?;
    }
    Ok(())
}

/// `UNI-<epoch millis>-<0..999>`
pub fn generate_order_number() -> String {
    let suffix: u16 = rand::thread_rng().gen_range(0..1000);
    format!("UNI-{}-{}", Utc::now().timestamp_millis(), suffix)
}

/// Order persistence and read-back.
#[derive(Clone)]
pub struct OrderService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

impl OrderService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// Creates the order and its items in one transaction.
    ///
    /// A coupon on the order is redeemed inside the same transaction. The
    /// coupon row is locked first; the window and the per-user limit are
    /// re-checked under that lock before the usage counter is bumped with a
    /// guarded update. Two checkouts racing for the last redemption cannot
    /// both commit. Cart checkouts also empty the user's cart. Any
    /// failure rolls the whole thing back.
    #[instrument(skip(self, new_order, items), fields(user_id = new_order.user_id, items = items.len()))]
    pub async fn create_order_with_items(
        &self,
        new_order: NewOrder,
        items: Vec<NewOrderItem>,
    ) -> Result<OrderDetails, ServiceError> {
        if items.is_empty() {
            return Err(ServiceError::ValidationError(
                "Order must contain at least one item".to_string(),
            ));
        }
        new_order.validate()?;
        check_order_amounts(&new_order)?;
        for item in &items {
            item.validate()?;
            check_item_amounts(item)?;
        }
        let checkout_source = parse_checkout_source(&new_order.checkout_source)?;

        let order_number = generate_order_number();
        let now = Utc::now();

        let txn = self.db.begin().await?;

        let mut coupon_code = new_order.coupon_code.clone();
        let mut coupon_type = new_order.coupon_type.clone();
        let mut mapped_collections = Vec::new();
        let mut is_collection_coupon = false;

        if let Some(coupon_id) = new_order.coupon_id {
            // Locking read comes first so the per-user count below sees every
            // order a competing checkout of this coupon has committed.
            let coupon = coupon::Entity::find_by_id(coupon_id)
                .lock_exclusive()
                .one(&txn)
                .await?
                .ok_or_else(|| ServiceError::NotFound(format!("Coupon {} not found", coupon_id)))?;

            if let Err(rejection) = coupon_rules::check_window(&coupon, now) {
                warn!(coupon_id, ?rejection, "coupon no longer redeemable at checkout");
                return Err(ServiceError::Conflict(match rejection {
                    CouponRejection::UsageExhausted => "Coupon usage limit reached".to_string(),
                    other => other.message(""),
                }));
            }

            if coupon.per_user_limit > 0 {
                let used = prior_redemptions(&txn, new_order.user_id, coupon_id).await?;
                if coupon_rules::check_per_user(&coupon, used).is_err() {
                    warn!(coupon_id, user_id = new_order.user_id, "per-user coupon limit hit at checkout");
                    return Err(ServiceError::Conflict(
                        "Coupon usage limit reached for this user".to_string(),
                    ));
                }
            }

            let redeemed = coupon::Entity::update_many()
                .col_expr(
                    coupon::Column::UsageCount,
                    Expr::col(coupon::Column::UsageCount).add(1),
                )
                .col_expr(coupon::Column::UpdatedAt, Expr::value(now))
                .filter(coupon::Column::CouponId.eq(coupon_id))
                .filter(
                    Condition::any()
                        .add(coupon::Column::TotalUsageLimit.eq(0))
                        .add(
                            Expr::col(coupon::Column::UsageCount)
                                .lt(Expr::col(coupon::Column::TotalUsageLimit)),
                        ),
                )
                .exec(&txn)
                .await?;
            if redeemed.rows_affected == 0 {
                warn!(coupon_id, "coupon exhausted at checkout");
                return Err(ServiceError::Conflict("Coupon usage limit reached".to_string()));
            }

            coupon_code = coupon_code.or_else(|| Some(coupon.coupon_code.clone()));
            coupon_type = coupon_type.or_else(|| Some(coupon.coupon_type.as_str().to_string()));
            if coupon.coupon_type == CouponType::Collection {
                is_collection_coupon = true;
                mapped_collections = coupon_collection::Entity::find()
                    .filter(coupon_collection::Column::CouponId.eq(coupon_id))
                    .all(&txn)
                    .await?
                    .into_iter()
                    .map(|m| m.collection_id)
                    .collect();
            }
        }

        let line_discounts = self.line_discounts(
            &new_order,
            &items,
            is_collection_coupon,
            &mapped_collections,
        );
        let line_totals: Vec<Decimal> = items
            .iter()
            .map(|item| {
                item.sub_total
                    .unwrap_or_else(|| coupon_rules::round_money(item.as_cart_line().line_total()))
            })
            .collect();
        let subtotal = new_order
            .subtotal
            .unwrap_or_else(|| line_totals.iter().copied().sum());

        let order_model = order::ActiveModel {
            order_number: Set(order_number.clone()),
            user_id: Set(new_order.user_id),
            address_id: Set(new_order.address_id),
            subtotal: Set(subtotal),
            total_amount: Set(new_order.total_amount),
            payment_method: Set(new_order.payment_method.clone()),
            payment_status: Set(new_order.payment_status.clone()),
            payment_reference: Set(new_order.payment_reference.clone()),
            order_status: Set(new_order.order_status.clone()),
            coupon_id: Set(new_order.coupon_id),
            coupon_code: Set(coupon_code),
            coupon_type: Set(coupon_type),
            coupon_discount: Set(new_order.coupon_discount),
            source_collection_id: Set(new_order.source_collection_id),
            shipping_amount: Set(new_order.shipping_amount),
            checkout_source: Set(checkout_source),
            shipment_order_id: Set(None),
            shipment_id: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&txn)
        .await
        .map_err(|e| {
            error!(error = %e, order_number = %order_number, "failed to insert order");
            ServiceError::from_write(e, format!("Order number {} already exists", order_number))
        })?;

        for ((item, sub_total), coupon_discount) in
            items.iter().zip(line_totals).zip(line_discounts)
        {
            order_item::ActiveModel {
                order_id: Set(order_model.order_id),
                product_id: Set(item.product_id),
                variant_id: Set(item.variant_id),
                quantity: Set(item.quantity),
                price: Set(item.price),
                sub_total: Set(sub_total),
                coupon_discount: Set(coupon_discount),
                source_collection_id: Set(item.source_collection_id),
                created_at: Set(now),
                ..Default::default()
            }
            .insert(&txn)
            .await
            .map_err(|e| {
                error!(error = %e, order_number = %order_number, variant_id = item.variant_id, "failed to insert order item");
                ServiceError::DatabaseError(e)
            })?;
        }

        let mut cleared = None;
        if checkout_source == CheckoutSource::Cart {
            let result = cart_item::Entity::delete_many()
                .filter(cart_item::Column::UserId.eq(new_order.user_id))
                .exec(&txn)
                .await?;
            cleared = Some(result.rows_affected);
        }

        txn.commit().await?;

        info!(
            order_id = order_model.order_id,
            order_number = %order_number,
            "order committed"
        );

        self.event_sender
            .send_or_log(Event::OrderPlaced {
                order_id: order_model.order_id,
                order_number: order_number.clone(),
                user_id: new_order.user_id,
                total_amount: new_order.total_amount,
            })
            .await;
        if let Some(coupon_id) = new_order.coupon_id {
            self.event_sender
                .send_or_log(Event::CouponRedeemed {
                    coupon_id,
                    order_id: order_model.order_id,
                    discount: new_order.coupon_discount,
                })
                .await;
        }
        if let Some(removed_items) = cleared {
            self.event_sender
                .send_or_log(Event::CartCleared {
                    user_id: new_order.user_id,
                    removed_items,
                })
                .await;
        }

        self.get_order_details(order_model.order_id).await
    }

    fn line_discounts(
        &self,
        new_order: &NewOrder,
        items: &[NewOrderItem],
        is_collection_coupon: bool,
        mapped_collections: &[i32],
    ) -> Vec<Decimal> {
        if items.iter().all(|item| item.coupon_discount.is_some()) {
            return items
                .iter()
                .map(|item| item.coupon_discount.unwrap_or_default())
                .collect();
        }

        let lines: Vec<CartLine> = items.iter().map(NewOrderItem::as_cart_line).collect();
        let scope = if is_collection_coupon {
            DiscountScope::Collections {
                mapped: mapped_collections,
                fallback: new_order.source_collection_id,
            }
        } else {
            DiscountScope::AllLines
        };
        let apportioned = coupon_rules::apportion_discount(&lines, new_order.coupon_discount, scope);

        items
            .iter()
            .zip(apportioned)
            .map(|(item, share)| item.coupon_discount.unwrap_or(share))
            .collect()
    }

    /// Order header, address, customer and enriched items.
    #[instrument(skip(self))]
    pub async fn get_order_details(&self, order_id: i32) -> Result<OrderDetails, ServiceError> {
        load_order_details(&*self.db, order_id).await
    }

    /// Newest first.
    #[instrument(skip(self))]
    pub async fn list_orders_for_user(&self, user_id: i32) -> Result<Vec<OrderModel>, ServiceError> {
        Ok(order::Entity::find()
            .filter(order::Column::UserId.eq(user_id))
            .order_by_desc(order::Column::CreatedAt)
            .order_by_desc(order::Column::OrderId)
            .all(&*self.db)
            .await?)
    }

    /// Stores the carrier references on a committed order.
    #[instrument(skip(self, shipment))]
    pub async fn record_shipment(
        &self,
        order_id: i32,
        shipment: &ShipmentRef,
    ) -> Result<(), ServiceError> {
        let result = order::Entity::update_many()
            .col_expr(
                order::Column::ShipmentOrderId,
                Expr::value(Some(shipment.shipment_order_id.clone())),
            )
            .col_expr(
                order::Column::ShipmentId,
                Expr::value(shipment.shipment_id.clone()),
            )
            .col_expr(order::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(order::Column::OrderId.eq(order_id))
            .exec(&*self.db)
            .await?;
        if result.rows_affected == 0 {
            return Err(ServiceError::NotFound(format!("Order {} not found", order_id)));
        }
        Ok(())
    }
}

async fn load_order_details<C: ConnectionTrait>(
    conn: &C,
    order_id: i32,
) -> Result<OrderDetails, ServiceError> {
    let order = order::Entity::find_by_id(order_id)
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

    let shipping_address = address::Entity::find_by_id(order.address_id)
        .one(conn)
        .await?
        .map(ShippingAddress::from);
    let customer = user::Entity::find_by_id(order.user_id)
        .one(conn)
        .await?
        .map(|u| Customer {
            user_id: u.user_id,
            name: u.name,
            email: u.email,
            phone: u.phone,
        });

    let items = order_item::Entity::find()
        .filter(order_item::Column::OrderId.eq(order_id))
        .order_by_asc(order_item::Column::OrderItemId)
        .all(conn)
        .await?;

    let variant_ids: Vec<i32> = items.iter().map(|i| i.variant_id).collect();
    let product_ids: Vec<i32> = items.iter().map(|i| i.product_id).collect();
    let variants: HashMap<i32, product_variant::Model> = product_variant::Entity::find()
        .filter(product_variant::Column::VariantId.is_in(variant_ids))
        .all(conn)
        .await?
        .into_iter()
        .map(|v| (v.variant_id, v))
        .collect();
    let products: HashMap<i32, product::Model> = product::Entity::find()
        .filter(product::Column::ProductId.is_in(product_ids))
        .all(conn)
        .await?
        .into_iter()
        .map(|p| (p.product_id, p))
        .collect();

    let order_items = items
        .into_iter()
        .map(|item| {
            let variant = variants.get(&item.variant_id);
            let product = products.get(&item.product_id);
            OrderItemDetails {
                product_name: product.map(|p| p.name.clone()),
                variant_name: variant.map(|v| v.name.clone()),
                sku: variant.map(|v| v.sku.clone()),
                mrp: variant.and_then(|v| v.mrp),
                weight: variant.and_then(|v| v.weight),
                image_url: product.and_then(|p| p.image_url.clone()),
                item,
            }
        })
        .collect();

    Ok(OrderDetails {
        order: OrderView {
            order,
            shipping_address,
            customer,
        },
        order_items,
    })
}
