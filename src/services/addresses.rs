use crate::{
    entities::address::{self, Model as AddressModel},
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection,
    EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use validator::Validate;

static PHONE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\+?[0-9]{10,15}$").unwrap());
static PINCODE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[1-9][0-9]{5}$").unwrap());

fn default_country() -> String {
    "India".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct AddressInput {
    pub user_id: i32,
    #[validate(length(min = 1, max = 255, message = "full_name is required"))]
    pub full_name: String,
    #[validate(regex(path = "PHONE_RE", message = "phone must be 10 to 15 digits"))]
    pub phone: String,
    #[validate(length(min = 1, max = 255, message = "address_line1 is required"))]
    pub address_line1: String,
    #[serde(default)]
    pub address_line2: Option<String>,
    #[validate(length(min = 1, max = 100, message = "city is required"))]
    pub city: String,
    #[validate(length(min = 1, max = 100, message = "state is required"))]
    pub state: String,
    #[validate(regex(path = "PINCODE_RE", message = "pincode must be a 6 digit PIN"))]
    pub pincode: String,
    #[serde(default = "default_country")]
    pub country: String,
    #[serde(default)]
    pub is_default: bool,
}

/// Address book with soft delete and a single default per user.
#[derive(Clone)]
pub struct AddressService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

async fn load_owned<C: ConnectionTrait>(
    conn: &C,
    address_id: i32,
    user_id: i32,
) -> Result<AddressModel, ServiceError> {
    let found = address::Entity::find_by_id(address_id)
        .one(conn)
        .await?
        .filter(|a| a.is_active)
        .ok_or_else(|| ServiceError::NotFound(format!("Address {} not found", address_id)))?;
    if found.user_id != user_id {
        return Err(ServiceError::Forbidden(
            "Address does not belong to this user".to_string(),
        ));
    }
    Ok(found)
}

async fn clear_default<C: ConnectionTrait>(conn: &C, user_id: i32) -> Result<(), ServiceError> {
    address::Entity::update_many()
        .col_expr(address::Column::IsDefault, Expr::value(false))
        .filter(address::Column::UserId.eq(user_id))
        .filter(address::Column::IsDefault.eq(true))
        .exec(conn)
        .await?;
    Ok(())
}

impl AddressService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// Active addresses, default first.
    #[instrument(skip(self))]
    pub async fn list_addresses(&self, user_id: i32) -> Result<Vec<AddressModel>, ServiceError> {
        Ok(address::Entity::find()
            .filter(address::Column::UserId.eq(user_id))
            .filter(address::Column::IsActive.eq(true))
            .order_by_desc(address::Column::IsDefault)
            .order_by_desc(address::Column::CreatedAt)
            .order_by_desc(address::Column::AddressId)
            .all(&*self.db)
            .await?)
    }

    /// The user's first address always becomes the default.
    #[instrument(skip(self, input), fields(user_id = input.user_id))]
    pub async fn create_address(&self, input: AddressInput) -> Result<AddressModel, ServiceError> {
        input.validate()?;
        let now = Utc::now();

        let txn = self.db.begin().await?;

        let existing = address::Entity::find()
            .filter(address::Column::UserId.eq(input.user_id))
            .filter(address::Column::IsActive.eq(true))
            .count(&txn)
            .await?;
        let make_default = input.is_default || existing == 0;
        if make_default && existing > 0 {
            clear_default(&txn, input.user_id).await?;
        }

        let model = address::ActiveModel {
            user_id: Set(input.user_id),
            full_name: Set(input.full_name.trim().to_string()),
            phone: Set(input.phone),
            address_line1: Set(input.address_line1),
            address_line2: Set(input.address_line2),
            city: Set(input.city),
            state: Set(input.state),
            pincode: Set(input.pincode),
            country: Set(input.country),
            is_default: Set(make_default),
            is_active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        txn.commit().await?;

        info!(address_id = model.address_id, is_default = make_default, "address created");
        if make_default {
            self.default_changed(&model).await;
        }
        Ok(model)
    }

    #[instrument(skip(self, input), fields(user_id = input.user_id))]
    pub async fn update_address(
        &self,
        address_id: i32,
        input: AddressInput,
    ) -> Result<AddressModel, ServiceError> {
        input.validate()?;

        let txn = self.db.begin().await?;
        let existing = load_owned(&txn, address_id, input.user_id).await?;
        let becomes_default = input.is_default && !existing.is_default;
        if becomes_default {
            clear_default(&txn, input.user_id).await?;
        }

        let mut active: address::ActiveModel = existing.into();
        active.full_name = Set(input.full_name.trim().to_string());
        active.phone = Set(input.phone);
        active.address_line1 = Set(input.address_line1);
        active.address_line2 = Set(input.address_line2);
        active.city = Set(input.city);
        active.state = Set(input.state);
        active.pincode = Set(input.pincode);
        active.country = Set(input.country);
        if becomes_default {
            active.is_default = Set(true);
        }
        active.updated_at = Set(Utc::now());
        let model = active.update(&txn).await?;

        txn.commit().await?;

        if becomes_default {
            self.default_changed(&model).await;
        }
        Ok(model)
    }

    /// Soft delete. When the default goes away the most recently created
    /// remaining address takes over.
    #[instrument(skip(self))]
    pub async fn delete_address(&self, address_id: i32, user_id: i32) -> Result<(), ServiceError> {
        let txn = self.db.begin().await?;
        let existing = load_owned(&txn, address_id, user_id).await?;
        let was_default = existing.is_default;

        let mut active: address::ActiveModel = existing.into();
        active.is_active = Set(false);
        active.is_default = Set(false);
        active.updated_at = Set(Utc::now());
        active.update(&txn).await?;

        let mut promoted = None;
        if was_default {
            let next = address::Entity::find()
                .filter(address::Column::UserId.eq(user_id))
                .filter(address::Column::IsActive.eq(true))
                .order_by_desc(address::Column::CreatedAt)
                .order_by_desc(address::Column::AddressId)
                .one(&txn)
                .await?;
            if let Some(next) = next {
                let mut next: address::ActiveModel = next.into();
                next.is_default = Set(true);
                next.updated_at = Set(Utc::now());
                promoted = Some(next.update(&txn).await?);
            }
        }

        txn.commit().await?;

        info!(address_id, "address deactivated");
        if let Some(model) = promoted {
            self.default_changed(&model).await;
        }
        Ok(())
    }

    /// Unset-then-set inside one transaction.
    #[instrument(skip(self))]
    pub async fn set_default_address(
        &self,
        address_id: i32,
        user_id: i32,
    ) -> Result<AddressModel, ServiceError> {
        let txn = self.db.begin().await?;
        let existing = load_owned(&txn, address_id, user_id).await?;

        clear_default(&txn, user_id).await?;
        let mut active: address::ActiveModel = existing.into();
        active.is_default = Set(true);
        active.updated_at = Set(Utc::now());
        let model = active.update(&txn).await?;

        txn.commit().await?;

        self.default_changed(&model).await;
        Ok(model)
    }

    async fn default_changed(&self, model: &AddressModel) {
        self.event_sender
            .send_or_log(Event::DefaultAddressChanged {
                user_id: model.user_id,
                address_id: model.address_id,
            })
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input() -> AddressInput {
        AddressInput {
            user_id: 1,
            full_name: "Asha Rao".into(),
            phone: "9876543210".into(),
            address_line1: "12 Lake Road".into(),
            address_line2: None,
            city: "Bengaluru".into(),
            state: "Karnataka".into(),
            pincode: "560001".into(),
            country: default_country(),
            is_default: false,
        }
    }

    #[test]
    fn accepts_indian_address() {
        assert!(input().validate().is_ok());
    }

    #[test]
    fn rejects_bad_pincode_and_phone() {
        let mut bad = input();
        bad.pincode = "06001".into();
        assert!(bad.validate().is_err());

        let mut bad = input();
        bad.phone = "98765".into();
        let errors = bad.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("phone"));
    }

    #[test]
    fn requires_name_and_street() {
        let mut bad = input();
        bad.full_name = String::new();
        bad.address_line1 = String::new();
        let errors = bad.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("full_name"));
        assert!(errors.field_errors().contains_key("address_line1"));
    }
}
