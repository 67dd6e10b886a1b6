use crate::{
    entities::{cart_item, product, product_variant},
    errors::ServiceError,
    events::{Event, EventSender},
    services::coupon_rules::{round_money, CartLine},
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct AddCartItem {
    pub user_id: i32,
    pub product_id: i32,
    pub variant_id: i32,
    #[validate(range(min = 1, max = 100, message = "quantity must be between 1 and 100"))]
    pub quantity: i32,
    #[serde(default)]
    pub source_collection_id: Option<i32>,
}

/// A cart line joined with its catalog names.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CartItemView {
    #[serde(flatten)]
    pub item: cart_item::Model,
    pub product_name: Option<String>,
    pub variant_name: Option<String>,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CartView {
    pub items: Vec<CartItemView>,
    pub item_count: i64,
    pub subtotal: Decimal,
}

impl CartView {
    /// Lines in the shape the coupon engine expects.
    pub fn lines(&self) -> Vec<CartLine> {
        self.items
            .iter()
            .map(|line| CartLine {
                product_id: line.item.product_id,
                variant_id: line.item.variant_id,
                quantity: line.item.quantity,
                price: line.item.price,
                source_collection_id: line.item.source_collection_id,
            })
            .collect()
    }
}

fn line_total(price: Decimal, quantity: i32) -> Decimal {
    round_money(price * Decimal::from(quantity))
}

#[derive(Clone)]
pub struct CartService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

impl CartService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    #[instrument(skip(self))]
    pub async fn list_cart(&self, user_id: i32) -> Result<CartView, ServiceError> {
        let rows = cart_item::Entity::find()
            .filter(cart_item::Column::UserId.eq(user_id))
            .order_by_asc(cart_item::Column::CreatedAt)
            .order_by_asc(cart_item::Column::CartItemId)
            .find_also_related(product_variant::Entity)
            .all(&*self.db)
            .await?;

        let product_ids: Vec<i32> = rows.iter().map(|(item, _)| item.product_id).collect();
        let products: HashMap<i32, product::Model> = if product_ids.is_empty() {
            HashMap::new()
        } else {
            product::Entity::find()
                .filter(product::Column::ProductId.is_in(product_ids))
                .all(&*self.db)
                .await?
                .into_iter()
                .map(|p| (p.product_id, p))
                .collect()
        };

        let mut subtotal = Decimal::ZERO;
        let mut item_count = 0i64;
        let items = rows
            .into_iter()
            .map(|(item, variant)| {
                subtotal += item.sub_total;
                item_count += i64::from(item.quantity);
                let product = products.get(&item.product_id);
                CartItemView {
                    product_name: product.map(|p| p.name.clone()),
                    image_url: product.and_then(|p| p.image_url.clone()),
                    variant_name: variant.map(|v| v.name),
                    item,
                }
            })
            .collect();

        Ok(CartView {
            items,
            item_count,
            subtotal: round_money(subtotal),
        })
    }

    /// Prices the line from the variant. Adding a product/variant/collection
    /// that is already in the cart increases its quantity.
    #[instrument(skip(self, input), fields(user_id = input.user_id, variant_id = input.variant_id))]
    pub async fn add_item(&self, input: AddCartItem) -> Result<cart_item::Model, ServiceError> {
        input.validate()?;

        let (variant, product) = product_variant::Entity::find_by_id(input.variant_id)
            .find_also_related(product::Entity)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Variant {} not found", input.variant_id)))?;
        if variant.product_id != input.product_id {
            return Err(ServiceError::BadRequest(format!(
                "Variant {} does not belong to product {}",
                input.variant_id, input.product_id
            )));
        }
        if !product.map(|p| p.is_active).unwrap_or(false) {
            return Err(ServiceError::BadRequest(
                "Product is not available".to_string(),
            ));
        }

        let mut existing = cart_item::Entity::find()
            .filter(cart_item::Column::UserId.eq(input.user_id))
            .filter(cart_item::Column::ProductId.eq(input.product_id))
            .filter(cart_item::Column::VariantId.eq(input.variant_id));
        existing = match input.source_collection_id {
            Some(id) => existing.filter(cart_item::Column::SourceCollectionId.eq(id)),
            None => existing.filter(cart_item::Column::SourceCollectionId.is_null()),
        };

        let now = Utc::now();
        let model = match existing.one(&*self.db).await? {
            Some(line) => {
                let quantity = line.quantity + input.quantity;
                let mut active: cart_item::ActiveModel = line.into();
                active.quantity = Set(quantity);
                active.price = Set(variant.price);
                active.sub_total = Set(line_total(variant.price, quantity));
                active.updated_at = Set(now);
                active.update(&*self.db).await?
            }
            None => {
                cart_item::ActiveModel {
                    user_id: Set(input.user_id),
                    product_id: Set(input.product_id),
                    variant_id: Set(input.variant_id),
                    quantity: Set(input.quantity),
                    price: Set(variant.price),
                    sub_total: Set(line_total(variant.price, input.quantity)),
                    source_collection_id: Set(input.source_collection_id),
                    created_at: Set(now),
                    updated_at: Set(now),
                    ..Default::default()
                }
                .insert(&*self.db)
                .await?
            }
        };

        info!(cart_item_id = model.cart_item_id, quantity = model.quantity, "cart line saved");
        Ok(model)
    }

    /// Returns `None` when a zero quantity removed the line.
    #[instrument(skip(self))]
    pub async fn update_quantity(
        &self,
        cart_item_id: i32,
        user_id: i32,
        quantity: i32,
    ) -> Result<Option<cart_item::Model>, ServiceError> {
        if !(0..=100).contains(&quantity) {
            return Err(ServiceError::ValidationError(
                "quantity must be between 0 and 100".to_string(),
            ));
        }
        let line = self.load_owned(cart_item_id, user_id).await?;
        if quantity == 0 {
            cart_item::Entity::delete_by_id(line.cart_item_id)
                .exec(&*self.db)
                .await?;
            return Ok(None);
        }

        let price = line.price;
        let mut active: cart_item::ActiveModel = line.into();
        active.quantity = Set(quantity);
        active.sub_total = Set(line_total(price, quantity));
        active.updated_at = Set(Utc::now());
        Ok(Some(active.update(&*self.db).await?))
    }

    #[instrument(skip(self))]
    pub async fn remove_item(&self, cart_item_id: i32, user_id: i32) -> Result<(), ServiceError> {
        let line = self.load_owned(cart_item_id, user_id).await?;
        cart_item::Entity::delete_by_id(line.cart_item_id)
            .exec(&*self.db)
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn clear_cart(&self, user_id: i32) -> Result<u64, ServiceError> {
        let removed = cart_item::Entity::delete_many()
            .filter(cart_item::Column::UserId.eq(user_id))
            .exec(&*self.db)
            .await?
            .rows_affected;
        self.event_sender
            .send_or_log(Event::CartCleared {
                user_id,
                removed_items: removed,
            })
            .await;
        Ok(removed)
    }

    async fn load_owned(
        &self,
        cart_item_id: i32,
        user_id: i32,
    ) -> Result<cart_item::Model, ServiceError> {
        let line = cart_item::Entity::find_by_id(cart_item_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Cart item {} not found", cart_item_id)))?;
        if line.user_id != user_id {
            return Err(ServiceError::Forbidden(
                "Cart item does not belong to this user".to_string(),
            ));
        }
        Ok(line)
    }
}
