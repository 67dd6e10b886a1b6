use crate::{
    entities::{
        coupon::{self, CouponType, DiscountType, Model as CouponModel},
        coupon_collection, order,
    },
    errors::ServiceError,
    services::coupon_rules::{self, CartLine, CouponRejection, DiscountBreakdown, DiscountRequest},
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, instrument};
use utoipa::ToSchema;
use validator::Validate;

fn default_true() -> bool {
    true
}

/// Body for creating or replacing a coupon.
#[derive(Debug, Clone, Deserialize, Serialize, Validate, ToSchema)]
pub struct CouponInput {
    #[validate(length(min = 1, max = 64, message = "coupon_code is required"))]
    pub coupon_code: String,
    pub description: Option<String>,
    pub coupon_type: CouponType,
    pub discount_type: DiscountType,
    #[schema(value_type = f64)]
    pub discount_value: Decimal,
    #[schema(value_type = Option<f64>)]
    pub max_discount_amount: Option<Decimal>,
    #[serde(default)]
    #[schema(value_type = f64)]
    pub min_order_amount: Decimal,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    /// 0 means unlimited
    #[serde(default)]
    #[validate(range(min = 0))]
    pub total_usage_limit: i32,
    /// 0 means unlimited
    #[serde(default)]
    #[validate(range(min = 0))]
    pub per_user_limit: i32,
    /// Required for collection coupons, ignored otherwise
    #[serde(default)]
    pub collection_ids: Vec<i32>,
}

impl CouponInput {
    /// Cross-field rules the derive cannot express.
    pub fn check_rules(&self) -> Result<(), ServiceError> {
        self.validate()?;

        if self.discount_value <= Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "discount_value must be greater than 0".into(),
            ));
        }
        coupon_rules::check_amount("discount_value", self.discount_value)?;
        coupon_rules::check_amount("min_order_amount", self.min_order_amount)?;
        if let Some(cap) = self.max_discount_amount {
            coupon_rules::check_amount("max_discount_amount", cap)?;
        }
        if self.end_date <= self.start_date {
            return Err(ServiceError::ValidationError(
                "end_date must be after start_date".into(),
            ));
        }

        match self.discount_type {
            DiscountType::Percentage => {
                if self.discount_value > Decimal::ONE_HUNDRED {
                    return Err(ServiceError::ValidationError(
                        "Percentage discount cannot exceed 100".into(),
                    ));
                }
                match self.max_discount_amount {
                    Some(cap) if cap > Decimal::ZERO => {}
                    _ => {
                        return Err(ServiceError::ValidationError(
                            "max_discount_amount is required for percentage coupons".into(),
                        ))
                    }
                }
            }
            DiscountType::Flat => {
                if self.max_discount_amount.is_some() {
                    return Err(ServiceError::ValidationError(
                        "max_discount_amount is only allowed for percentage coupons".into(),
                    ));
                }
            }
        }

        if self.coupon_type == CouponType::Collection && self.collection_ids.is_empty() {
            return Err(ServiceError::ValidationError(
                "collection_ids are required for collection coupons".into(),
            ));
        }

        Ok(())
    }

    fn mapped_collections(&self) -> Vec<i32> {
        if self.coupon_type != CouponType::Collection {
            return Vec::new();
        }
        let mut ids = self.collection_ids.clone();
        ids.sort_unstable();
        ids.dedup();
        ids
    }
}

/// Coupon together with its collection mappings.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CouponDetails {
    #[serde(flatten)]
    pub coupon: CouponModel,
    pub collection_ids: Vec<i32>,
}

/// Outcome of the validation chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct CouponValidation {
    pub valid: bool,
    pub message: String,
}

/// What the validation chain runs against.
#[derive(Debug, Clone, Copy)]
pub struct CouponCheck<'a> {
    pub coupon: &'a CouponModel,
    pub lines: &'a [CartLine],
    pub subtotal: Decimal,
    pub user_id: Option<i32>,
    pub source_collection_id: Option<i32>,
}

#[derive(Debug, Clone)]
pub enum CouponApplication {
    Applied {
        coupon: CouponModel,
        breakdown: DiscountBreakdown,
    },
    Rejected {
        message: String,
    },
}

pub fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

/// Number of the user's orders that already carry this coupon.
pub async fn prior_redemptions<C: ConnectionTrait>(
    conn: &C,
    user_id: i32,
    coupon_id: i32,
) -> Result<u64, DbErr> {
    order::Entity::find()
        .filter(order::Column::UserId.eq(user_id))
        .filter(order::Column::CouponId.eq(coupon_id))
        .count(conn)
        .await
}

async fn collection_ids_in<C: ConnectionTrait>(conn: &C, coupon_id: i32) -> Result<Vec<i32>, DbErr> {
    let rows = coupon_collection::Entity::find()
        .filter(coupon_collection::Column::CouponId.eq(coupon_id))
        .order_by_asc(coupon_collection::Column::CollectionId)
        .all(conn)
        .await?;
    Ok(rows.into_iter().map(|r| r.collection_id).collect())
}

async fn insert_mappings<C: ConnectionTrait>(
    conn: &C,
    coupon_id: i32,
    collection_ids: &[i32],
) -> Result<(), DbErr> {
    if collection_ids.is_empty() {
        return Ok(());
    }
    let rows = collection_ids.iter().map(|&collection_id| coupon_collection::ActiveModel {
        coupon_id: Set(coupon_id),
        collection_id: Set(collection_id),
        ..Default::default()
    });
    coupon_collection::Entity::insert_many(rows).exec(conn).await?;
    Ok(())
}

/// Coupon storage, validation and discount lookup.
#[derive(Clone)]
pub struct CouponService {
    db: Arc<DatabaseConnection>,
    currency_symbol: String,
}

impl CouponService {
    pub fn new(db: Arc<DatabaseConnection>, currency_symbol: impl Into<String>) -> Self {
        Self {
            db,
            currency_symbol: currency_symbol.into(),
        }
    }

    pub fn currency_symbol(&self) -> &str {
        &self.currency_symbol
    }

    /// Inserts the coupon and its collection mappings in one transaction.
    #[instrument(skip(self, input), fields(coupon_code = %input.coupon_code))]
    pub async fn create_coupon(&self, input: CouponInput) -> Result<CouponDetails, ServiceError> {
        input.check_rules()?;
        let code = normalize_code(&input.coupon_code);
        let mapped = input.mapped_collections();
        let now = Utc::now();

        let txn = self.db.begin().await?;

        let existing = coupon::Entity::find()
            .filter(coupon::Column::CouponCode.eq(code.clone()))
            .one(&txn)
            .await?;
        if existing.is_some() {
            return Err(ServiceError::Conflict(format!(
                "Coupon code {} already exists",
                code
            )));
        }

        let model = coupon::ActiveModel {
            coupon_code: Set(code.clone()),
            description: Set(input.description),
            coupon_type: Set(input.coupon_type),
            discount_type: Set(input.discount_type),
            discount_value: Set(input.discount_value),
            max_discount_amount: Set(input.max_discount_amount),
            min_order_amount: Set(input.min_order_amount),
            start_date: Set(input.start_date),
            end_date: Set(input.end_date),
            is_active: Set(input.is_active),
            total_usage_limit: Set(input.total_usage_limit),
            usage_count: Set(0),
            per_user_limit: Set(input.per_user_limit),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&txn)
        .await
        .map_err(|e| ServiceError::from_write(e, format!("Coupon code {} already exists", code)))?;

        insert_mappings(&txn, model.coupon_id, &mapped).await?;
        txn.commit().await?;

        info!(coupon_id = model.coupon_id, "coupon created");
        Ok(CouponDetails {
            coupon: model,
            collection_ids: mapped,
        })
    }

    /// Replaces every editable field and the collection mappings.
    #[instrument(skip(self, input))]
    pub async fn update_coupon(
        &self,
        coupon_id: i32,
        input: CouponInput,
    ) -> Result<CouponDetails, ServiceError> {
        input.check_rules()?;
        let code = normalize_code(&input.coupon_code);
        let mapped = input.mapped_collections();

        let txn = self.db.begin().await?;

        let existing = coupon::Entity::find_by_id(coupon_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Coupon {} not found", coupon_id)))?;

        if existing.coupon_code != code {
            let clash = coupon::Entity::find()
                .filter(coupon::Column::CouponCode.eq(code.clone()))
                .one(&txn)
                .await?;
            if clash.is_some() {
                return Err(ServiceError::Conflict(format!(
                    "Coupon code {} already exists",
                    code
                )));
            }
        }

        let mut active: coupon::ActiveModel = existing.into();
        active.coupon_code = Set(code.clone());
        active.description = Set(input.description);
        active.coupon_type = Set(input.coupon_type);
        active.discount_type = Set(input.discount_type);
        active.discount_value = Set(input.discount_value);
        active.max_discount_amount = Set(input.max_discount_amount);
        active.min_order_amount = Set(input.min_order_amount);
        active.start_date = Set(input.start_date);
        active.end_date = Set(input.end_date);
        active.is_active = Set(input.is_active);
        active.total_usage_limit = Set(input.total_usage_limit);
        active.per_user_limit = Set(input.per_user_limit);
        active.updated_at = Set(Utc::now());
        let model = active
            .update(&txn)
            .await
            .map_err(|e| ServiceError::from_write(e, format!("Coupon code {} already exists", code)))?;

        coupon_collection::Entity::delete_many()
            .filter(coupon_collection::Column::CouponId.eq(coupon_id))
            .exec(&txn)
            .await?;
        insert_mappings(&txn, coupon_id, &mapped).await?;

        txn.commit().await?;

        info!(coupon_id, "coupon updated");
        Ok(CouponDetails {
            coupon: model,
            collection_ids: mapped,
        })
    }

    /// Hard delete. Orders keep their coupon snapshot columns.
    #[instrument(skip(self))]
    pub async fn delete_coupon(&self, coupon_id: i32) -> Result<(), ServiceError> {
        let txn = self.db.begin().await?;

        if coupon::Entity::find_by_id(coupon_id).one(&txn).await?.is_none() {
            return Err(ServiceError::NotFound(format!(
                "Coupon {} not found",
                coupon_id
            )));
        }

        coupon_collection::Entity::delete_many()
            .filter(coupon_collection::Column::CouponId.eq(coupon_id))
            .exec(&txn)
            .await?;
        coupon::Entity::delete_by_id(coupon_id).exec(&txn).await?;

        txn.commit().await?;
        info!(coupon_id, "coupon deleted");
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn get_coupon(&self, coupon_id: i32) -> Result<CouponDetails, ServiceError> {
        let coupon = coupon::Entity::find_by_id(coupon_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Coupon {} not found", coupon_id)))?;
        let collection_ids = collection_ids_in(&*self.db, coupon_id).await?;
        Ok(CouponDetails {
            coupon,
            collection_ids,
        })
    }

    pub async fn find_by_code(&self, code: &str) -> Result<Option<CouponModel>, ServiceError> {
        Ok(coupon::Entity::find()
            .filter(coupon::Column::CouponCode.eq(normalize_code(code)))
            .one(&*self.db)
            .await?)
    }

    pub async fn list_coupons(&self) -> Result<Vec<CouponModel>, ServiceError> {
        Ok(coupon::Entity::find()
            .order_by_desc(coupon::Column::CreatedAt)
            .order_by_desc(coupon::Column::CouponId)
            .all(&*self.db)
            .await?)
    }

    pub async fn collection_ids_for(&self, coupon_id: i32) -> Result<Vec<i32>, ServiceError> {
        Ok(collection_ids_in(&*self.db, coupon_id).await?)
    }

    /// Coupons a shopper can apply right now.
    ///
    /// Sales coupons always qualify, user coupons only with a `user_id`, and
    /// collection coupons only when mapped to `source_collection_id`.
    #[instrument(skip(self))]
    pub async fn available_coupons(
        &self,
        user_id: Option<i32>,
        source_collection_id: Option<i32>,
    ) -> Result<Vec<CouponModel>, ServiceError> {
        let now = Utc::now();
        let candidates = coupon::Entity::find()
            .filter(coupon::Column::IsActive.eq(true))
            .order_by_asc(coupon::Column::EndDate)
            .order_by_asc(coupon::Column::CouponId)
            .all(&*self.db)
            .await?;

        let collection_coupons: HashSet<i32> = match source_collection_id {
            Some(collection_id) => coupon_collection::Entity::find()
                .filter(coupon_collection::Column::CollectionId.eq(collection_id))
                .all(&*self.db)
                .await?
                .into_iter()
                .map(|m| m.coupon_id)
                .collect(),
            None => HashSet::new(),
        };

        let mut seen = HashSet::new();
        let mut available = Vec::new();
        for coupon in candidates {
            let in_scope = match coupon.coupon_type {
                CouponType::Sales => true,
                CouponType::User => user_id.is_some(),
                CouponType::Collection => collection_coupons.contains(&coupon.coupon_id),
            };
            if !in_scope || coupon_rules::check_window(&coupon, now).is_err() {
                continue;
            }
            if let Some(user_id) = user_id {
                if coupon.per_user_limit > 0 {
                    let used = prior_redemptions(&*self.db, user_id, coupon.coupon_id).await?;
                    if coupon_rules::check_per_user(&coupon, used).is_err() {
                        continue;
                    }
                }
            }
            if seen.insert(coupon.coupon_id) {
                available.push(coupon);
            }
        }

        debug!(count = available.len(), "available coupons resolved");
        Ok(available)
    }

    /// Runs the eligibility chain, stopping at the first failed check.
    /// On success returns the coupon's mapped collections.
    async fn evaluate(
        &self,
        check: &CouponCheck<'_>,
    ) -> Result<Result<Vec<i32>, CouponRejection>, ServiceError> {
        let coupon = check.coupon;

        if let Err(rejection) = coupon_rules::check_window(coupon, Utc::now()) {
            return Ok(Err(rejection));
        }
        if let Err(rejection) = coupon_rules::check_minimum(coupon, check.subtotal) {
            return Ok(Err(rejection));
        }
        if let Some(user_id) = check.user_id {
            if coupon.per_user_limit > 0 {
                let used = prior_redemptions(&*self.db, user_id, coupon.coupon_id).await?;
                if let Err(rejection) = coupon_rules::check_per_user(coupon, used) {
                    return Ok(Err(rejection));
                }
            }
        }

        let mut mapped = Vec::new();
        if coupon.coupon_type == CouponType::Collection {
            mapped = collection_ids_in(&*self.db, coupon.coupon_id).await?;
            if let Err(rejection) = coupon_rules::check_collection_eligibility(
                coupon,
                check.lines,
                &mapped,
                check.source_collection_id,
            ) {
                return Ok(Err(rejection));
            }
        }

        if let Err(rejection) = coupon_rules::check_user_requirement(coupon, check.user_id) {
            return Ok(Err(rejection));
        }

        Ok(Ok(mapped))
    }

    #[instrument(skip(self, check), fields(coupon_id = check.coupon.coupon_id))]
    pub async fn validate_coupon(
        &self,
        check: &CouponCheck<'_>,
    ) -> Result<CouponValidation, ServiceError> {
        Ok(match self.evaluate(check).await? {
            Ok(_) => CouponValidation {
                valid: true,
                message: "Coupon is valid".to_string(),
            },
            Err(rejection) => CouponValidation {
                valid: false,
                message: rejection.message(&self.currency_symbol),
            },
        })
    }

    /// Looks the code up, validates it and computes the discount.
    #[instrument(skip(self, lines))]
    pub async fn apply_coupon(
        &self,
        code: &str,
        lines: &[CartLine],
        subtotal: Decimal,
        user_id: Option<i32>,
        source_collection_id: Option<i32>,
    ) -> Result<CouponApplication, ServiceError> {
        coupon_rules::check_amount("subtotal", subtotal)?;
        coupon_rules::check_lines(lines)?;

        let coupon = self
            .find_by_code(code)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Invalid coupon code".to_string()))?;

        let check = CouponCheck {
            coupon: &coupon,
            lines,
            subtotal,
            user_id,
            source_collection_id,
        };
        let mapped = match self.evaluate(&check).await? {
            Ok(mapped) => mapped,
            Err(rejection) => {
                debug!(?rejection, "coupon rejected");
                return Ok(CouponApplication::Rejected {
                    message: rejection.message(&self.currency_symbol),
                });
            }
        };

        let breakdown = coupon_rules::calculate_discount(&DiscountRequest {
            coupon: &coupon,
            lines,
            subtotal,
            mapped_collections: &mapped,
            fallback_collection: source_collection_id,
            currency: &self.currency_symbol,
        });

        Ok(CouponApplication::Applied { coupon, breakdown })
    }
}
