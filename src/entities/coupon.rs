use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Coupon definition.
///
/// `total_usage_limit` and `per_user_limit` use 0 for "unlimited".
/// Percentage coupons always carry `max_discount_amount`.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[sea_orm(table_name = "coupons")]
#[schema(as = Coupon)]
pub struct Model {
    #[sea_orm(primary_key)]
    pub coupon_id: i32,
    #[sea_orm(unique)]
    pub coupon_code: String,
    pub description: Option<String>,
    pub coupon_type: CouponType,
    pub discount_type: DiscountType,
    #[sea_orm(column_type = "Decimal(Some((10, 2)))")]
    pub discount_value: Decimal,
    #[sea_orm(column_type = "Decimal(Some((10, 2)))", nullable)]
    pub max_discount_amount: Option<Decimal>,
    #[sea_orm(column_type = "Decimal(Some((10, 2)))")]
    pub min_order_amount: Decimal,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub is_active: bool,
    pub total_usage_limit: i32,
    pub usage_count: i32,
    pub per_user_limit: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Eligibility scope of a coupon
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "snake_case")]
pub enum CouponType {
    /// Store-wide sale coupon
    #[sea_orm(string_value = "sales")]
    Sales,
    /// Requires a signed-in user
    #[sea_orm(string_value = "user")]
    User,
    /// Applies only to lines added from mapped collections
    #[sea_orm(string_value = "collection")]
    Collection,
}

impl CouponType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CouponType::Sales => "sales",
            CouponType::User => "user",
            CouponType::Collection => "collection",
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "snake_case")]
pub enum DiscountType {
    #[sea_orm(string_value = "percentage")]
    Percentage,
    #[sea_orm(string_value = "flat")]
    Flat,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::coupon_collection::Entity")]
    CouponCollection,
}

impl Related<super::coupon_collection::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CouponCollection.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
