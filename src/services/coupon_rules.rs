//! Coupon eligibility checks and discount arithmetic.
//!
//! Everything here is pure: callers load the coupon, its collection mappings
//! and the user's prior redemptions, then run the checks in order.

use crate::{
    entities::coupon::{CouponType, DiscountType, Model as CouponModel},
    errors::ServiceError,
};
use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Largest money amount accepted from a request (10^12).
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(0xD4A5_1000, 0xE8, 0, false, 0);

/// Largest quantity accepted on a single line.
pub const MAX_LINE_QUANTITY: i32 = 10_000;

/// Rejects negative amounts and amounts above [`MAX_AMOUNT`].
pub fn check_amount(field: &str, amount: Decimal) -> Result<(), ServiceError> {
    if amount < Decimal::ZERO {
        return Err(ServiceError::ValidationError(format!(
            "{} cannot be negative",
            field
        )));
    }
    if amount > MAX_AMOUNT {
        return Err(ServiceError::ValidationError(format!(
            "{} cannot exceed {}",
            field, MAX_AMOUNT
        )));
    }
    Ok(())
}

pub fn check_quantity(quantity: i32) -> Result<(), ServiceError> {
    if !(1..=MAX_LINE_QUANTITY).contains(&quantity) {
        return Err(ServiceError::ValidationError(format!(
            "quantity must be between 1 and {}",
            MAX_LINE_QUANTITY
        )));
    }
    Ok(())
}

/// Bounds every line so the discount arithmetic stays within `Decimal`.
pub fn check_lines(lines: &[CartLine]) -> Result<(), ServiceError> {
    for line in lines {
        check_amount("price", line.price)?;
        check_quantity(line.quantity)?;
    }
    Ok(())
}

/// A cart or order line as seen by the coupon engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CartLine {
    pub product_id: i32,
    pub variant_id: i32,
    pub quantity: i32,
    #[schema(value_type = f64)]
    pub price: Decimal,
    #[serde(default)]
    pub source_collection_id: Option<i32>,
}

impl CartLine {
    pub fn line_total(&self) -> Decimal {
        self.price * Decimal::from(self.quantity)
    }
}

/// Reason a coupon cannot be applied. Not an error: the caller reports it
/// back as `valid = false`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CouponRejection {
    NotYetActive,
    Expired,
    Inactive,
    UsageExhausted,
    BelowMinimum { shortfall: Decimal },
    PerUserLimitReached,
    NoMappedCollections,
    NoEligibleItems,
    EligibleBelowMinimum { shortfall: Decimal },
    LoginRequired,
}

impl CouponRejection {
    pub fn message(&self, currency: &str) -> String {
        match self {
            Self::NotYetActive => "This coupon is not active yet".to_string(),
            Self::Expired => "This coupon has expired".to_string(),
            Self::Inactive => "This coupon is no longer active".to_string(),
            Self::UsageExhausted => "This coupon has reached its usage limit".to_string(),
            Self::BelowMinimum { shortfall } => format!(
                "Add {}{} more to apply this coupon",
                currency,
                format_amount(*shortfall)
            ),
            Self::PerUserLimitReached => {
                "You have already used this coupon the maximum number of times".to_string()
            }
            Self::NoMappedCollections => "This coupon is not linked to any collection".to_string(),
            Self::NoEligibleItems => {
                "This coupon does not apply to any item in your cart".to_string()
            }
            Self::EligibleBelowMinimum { shortfall } => format!(
                "Add {}{} more from eligible collections to apply this coupon",
                currency,
                format_amount(*shortfall)
            ),
            Self::LoginRequired => "Please log in to use this coupon".to_string(),
        }
    }
}

/// Which lines a discount is computed over.
#[derive(Debug, Clone, Copy)]
pub enum DiscountScope<'a> {
    AllLines,
    /// Lines whose collection (own tag, else the request-level fallback) is
    /// one of `mapped`.
    Collections {
        mapped: &'a [i32],
        fallback: Option<i32>,
    },
}

impl<'a> DiscountScope<'a> {
    pub fn for_coupon(coupon: &CouponModel, mapped: &'a [i32], fallback: Option<i32>) -> Self {
        match coupon.coupon_type {
            CouponType::Collection => DiscountScope::Collections { mapped, fallback },
            _ => DiscountScope::AllLines,
        }
    }

    pub fn includes(&self, line: &CartLine) -> bool {
        match self {
            DiscountScope::AllLines => true,
            DiscountScope::Collections { mapped, fallback } => line
                .source_collection_id
                .or(*fallback)
                .map(|collection| mapped.contains(&collection))
                .unwrap_or(false),
        }
    }
}

/// Input to [`calculate_discount`].
#[derive(Debug, Clone, Copy)]
pub struct DiscountRequest<'a> {
    pub coupon: &'a CouponModel,
    pub lines: &'a [CartLine],
    pub subtotal: Decimal,
    pub mapped_collections: &'a [i32],
    pub fallback_collection: Option<i32>,
    pub currency: &'a str,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct DiscountBreakdown {
    #[schema(value_type = f64)]
    pub discount_amount: Decimal,
    #[schema(value_type = f64)]
    pub final_total: Decimal,
    pub message: String,
}

/// Rounds a money amount to paise, halves away from zero.
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Rounded amount without trailing zeros, e.g. `50`, `49.5`.
pub fn format_amount(amount: Decimal) -> String {
    round_money(amount).normalize().to_string()
}

/// Date window, activation flag and total usage cap, in that order.
pub fn check_window(coupon: &CouponModel, now: DateTime<Utc>) -> Result<(), CouponRejection> {
    if now < coupon.start_date {
        return Err(CouponRejection::NotYetActive);
    }
    if now > coupon.end_date {
        return Err(CouponRejection::Expired);
    }
    if !coupon.is_active {
        return Err(CouponRejection::Inactive);
    }
    if coupon.total_usage_limit > 0 && coupon.usage_count >= coupon.total_usage_limit {
        return Err(CouponRejection::UsageExhausted);
    }
    Ok(())
}

/// Minimum order value against the full cart subtotal.
pub fn check_minimum(coupon: &CouponModel, subtotal: Decimal) -> Result<(), CouponRejection> {
    if subtotal < coupon.min_order_amount {
        return Err(CouponRejection::BelowMinimum {
            shortfall: coupon.min_order_amount - subtotal,
        });
    }
    Ok(())
}

pub fn check_per_user(coupon: &CouponModel, prior_uses: u64) -> Result<(), CouponRejection> {
    if coupon.per_user_limit > 0 && prior_uses >= coupon.per_user_limit as u64 {
        return Err(CouponRejection::PerUserLimitReached);
    }
    Ok(())
}

/// Collection coupons only. Needs at least one eligible line, and the
/// eligible lines alone must meet the minimum. Returns the eligible subtotal.
pub fn check_collection_eligibility(
    coupon: &CouponModel,
    lines: &[CartLine],
    mapped: &[i32],
    fallback: Option<i32>,
) -> Result<Decimal, CouponRejection> {
    if mapped.is_empty() {
        return Err(CouponRejection::NoMappedCollections);
    }
    let scope = DiscountScope::Collections { mapped, fallback };
    let eligible: Vec<&CartLine> = lines.iter().filter(|l| scope.includes(l)).collect();
    if eligible.is_empty() {
        return Err(CouponRejection::NoEligibleItems);
    }
    let eligible_subtotal: Decimal = eligible.iter().map(|l| l.line_total()).sum();
    if eligible_subtotal < coupon.min_order_amount {
        return Err(CouponRejection::EligibleBelowMinimum {
            shortfall: coupon.min_order_amount - eligible_subtotal,
        });
    }
    Ok(eligible_subtotal)
}

pub fn check_user_requirement(
    coupon: &CouponModel,
    user_id: Option<i32>,
) -> Result<(), CouponRejection> {
    if coupon.coupon_type == CouponType::User && user_id.is_none() {
        return Err(CouponRejection::LoginRequired);
    }
    Ok(())
}

pub fn eligible_subtotal(lines: &[CartLine], scope: DiscountScope<'_>) -> Decimal {
    lines
        .iter()
        .filter(|l| scope.includes(l))
        .map(CartLine::line_total)
        .sum()
}

/// Computes the discount for an already validated coupon.
///
/// Collection coupons use the eligible lines as the base; the final total is
/// always taken from the full subtotal and never drops below zero.
pub fn calculate_discount(request: &DiscountRequest<'_>) -> DiscountBreakdown {
    let coupon = request.coupon;
    let base = match coupon.coupon_type {
        CouponType::Collection => eligible_subtotal(
            request.lines,
            DiscountScope::Collections {
                mapped: request.mapped_collections,
                fallback: request.fallback_collection,
            },
        ),
        _ => request.subtotal,
    }
    .max(Decimal::ZERO);

    let raw = match coupon.discount_type {
        DiscountType::Percentage => {
            let discount = base * coupon.discount_value / Decimal::ONE_HUNDRED;
            match coupon.max_discount_amount {
                Some(cap) => discount.min(cap),
                None => discount,
            }
        }
        DiscountType::Flat => coupon.discount_value.min(base),
    };

    let discount_amount = round_money(raw.max(Decimal::ZERO));
    let final_total = round_money((request.subtotal - discount_amount).max(Decimal::ZERO));

    DiscountBreakdown {
        discount_amount,
        final_total,
        message: format!(
            "Coupon applied! You save {}{}",
            request.currency,
            format_amount(discount_amount)
        ),
    }
}

/// Splits `discount` over the lines in `scope` in proportion to their value.
///
/// Lines outside the scope get zero. Each share is rounded to paise and the
/// rounding remainder lands on the last eligible line, so the shares always
/// add up to the rounded discount.
pub fn apportion_discount(
    lines: &[CartLine],
    discount: Decimal,
    scope: DiscountScope<'_>,
) -> Vec<Decimal> {
    let mut shares = vec![Decimal::ZERO; lines.len()];
    let discount = round_money(discount);
    let eligible: Vec<usize> = lines
        .iter()
        .enumerate()
        .filter(|(_, l)| scope.includes(l))
        .map(|(i, _)| i)
        .collect();

    let base: Decimal = eligible.iter().map(|&i| lines[i].line_total()).sum();
    if discount <= Decimal::ZERO || base <= Decimal::ZERO {
        return shares;
    }

    let Some((&last, rest)) = eligible.split_last() else {
        return shares;
    };

    let mut allocated = Decimal::ZERO;
    for &i in rest {
        // ratio first: discount * line_total can exceed Decimal::MAX
        let share = round_money(discount * (lines[i].line_total() / base));
        shares[i] = share;
        allocated += share;
    }
    shares[last] = discount - allocated;
    shares
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    fn coupon(discount_type: DiscountType, value: Decimal) -> CouponModel {
        let now = Utc::now();
        CouponModel {
            coupon_id: 1,
            coupon_code: "GLOW10".into(),
            description: None,
            coupon_type: CouponType::Sales,
            discount_type,
            discount_value: value,
            max_discount_amount: None,
            min_order_amount: Decimal::ZERO,
            start_date: now - Duration::days(1),
            end_date: now + Duration::days(1),
            is_active: true,
            total_usage_limit: 0,
            usage_count: 0,
            per_user_limit: 0,
            created_at: now,
            updated_at: now,
        }
    }

    fn line(price: Decimal, quantity: i32, collection: Option<i32>) -> CartLine {
        CartLine {
            product_id: 1,
            variant_id: 1,
            quantity,
            price,
            source_collection_id: collection,
        }
    }

    fn request<'a>(
        coupon: &'a CouponModel,
        lines: &'a [CartLine],
        subtotal: Decimal,
        mapped: &'a [i32],
    ) -> DiscountRequest<'a> {
        DiscountRequest {
            coupon,
            lines,
            subtotal,
            mapped_collections: mapped,
            fallback_collection: None,
            currency: "₹",
        }
    }

    #[test]
    fn percentage_discount_is_capped() {
        let mut c = coupon(DiscountType::Percentage, dec!(10));
        c.max_discount_amount = Some(dec!(50));
        c.min_order_amount = dec!(200);
        let lines = [line(dec!(600), 1, None)];

        assert_eq!(check_minimum(&c, dec!(600)), Ok(()));
        let result = calculate_discount(&request(&c, &lines, dec!(600), &[]));
        assert_eq!(result.discount_amount, dec!(50));
        assert_eq!(result.final_total, dec!(550));
        assert_eq!(result.message, "Coupon applied! You save ₹50");
    }

    #[test]
    fn flat_discount_never_exceeds_subtotal() {
        let c = coupon(DiscountType::Flat, dec!(300));
        let lines = [line(dec!(120), 2, None)];
        let result = calculate_discount(&request(&c, &lines, dec!(240), &[]));
        assert_eq!(result.discount_amount, dec!(240));
        assert_eq!(result.final_total, Decimal::ZERO);
    }

    #[test]
    fn shortfall_message_names_missing_amount() {
        let mut c = coupon(DiscountType::Flat, dec!(100));
        c.min_order_amount = dec!(300);
        let rejection = check_minimum(&c, dec!(250)).unwrap_err();
        assert_eq!(
            rejection,
            CouponRejection::BelowMinimum {
                shortfall: dec!(50)
            }
        );
        assert_eq!(rejection.message("₹"), "Add ₹50 more to apply this coupon");
    }

    #[rstest]
    #[case(1, 2, Err(CouponRejection::NotYetActive))]
    #[case(-3, -1, Err(CouponRejection::Expired))]
    #[case(-1, 1, Ok(()))]
    #[case(0, 0, Ok(()))]
    fn window_bounds(
        #[case] start_offset_days: i64,
        #[case] end_offset_days: i64,
        #[case] expected: Result<(), CouponRejection>,
    ) {
        let now = Utc::now();
        let mut c = coupon(DiscountType::Flat, dec!(10));
        c.start_date = now + Duration::days(start_offset_days);
        c.end_date = now + Duration::days(end_offset_days);
        assert_eq!(check_window(&c, now), expected);
    }

    #[test]
    fn window_checks_run_before_activation_and_usage() {
        let now = Utc::now();
        let mut c = coupon(DiscountType::Flat, dec!(10));
        c.end_date = now - Duration::hours(1);
        c.is_active = false;
        c.total_usage_limit = 1;
        c.usage_count = 1;
        assert_eq!(check_window(&c, now), Err(CouponRejection::Expired));

        c.end_date = now + Duration::hours(1);
        assert_eq!(check_window(&c, now), Err(CouponRejection::Inactive));

        c.is_active = true;
        assert_eq!(check_window(&c, now), Err(CouponRejection::UsageExhausted));

        c.total_usage_limit = 0;
        assert_eq!(check_window(&c, now), Ok(()));
    }

    #[test]
    fn per_user_limit_zero_means_unlimited() {
        let mut c = coupon(DiscountType::Flat, dec!(10));
        assert_eq!(check_per_user(&c, 40), Ok(()));
        c.per_user_limit = 1;
        assert_eq!(check_per_user(&c, 0), Ok(()));
        assert_eq!(
            check_per_user(&c, 1),
            Err(CouponRejection::PerUserLimitReached)
        );
    }

    #[test]
    fn collection_coupon_requires_mapped_eligible_lines() {
        let mut c = coupon(DiscountType::Percentage, dec!(20));
        c.coupon_type = CouponType::Collection;
        c.max_discount_amount = Some(dec!(500));
        let lines = [line(dec!(100), 1, Some(9)), line(dec!(50), 2, Some(3))];

        assert_eq!(
            check_collection_eligibility(&c, &lines, &[], None),
            Err(CouponRejection::NoMappedCollections)
        );
        assert_eq!(
            check_collection_eligibility(&c, &lines, &[4], None),
            Err(CouponRejection::NoEligibleItems)
        );
        assert_eq!(
            check_collection_eligibility(&c, &lines, &[3], None),
            Ok(dec!(100))
        );
    }

    #[test]
    fn collection_minimum_uses_eligible_lines_only() {
        let mut c = coupon(DiscountType::Flat, dec!(40));
        c.coupon_type = CouponType::Collection;
        c.min_order_amount = dec!(150);
        let lines = [line(dec!(200), 1, Some(1)), line(dec!(100), 1, Some(2))];

        assert_eq!(check_minimum(&c, dec!(300)), Ok(()));
        let rejection = check_collection_eligibility(&c, &lines, &[2], None).unwrap_err();
        assert_eq!(
            rejection.message("₹"),
            "Add ₹50 more from eligible collections to apply this coupon"
        );
    }

    #[test]
    fn untagged_lines_fall_back_to_request_collection() {
        let scope = DiscountScope::Collections {
            mapped: &[5],
            fallback: Some(5),
        };
        assert!(scope.includes(&line(dec!(10), 1, None)));
        assert!(!scope.includes(&line(dec!(10), 1, Some(6))));
    }

    #[test]
    fn collection_discount_base_is_eligible_subtotal() {
        let mut c = coupon(DiscountType::Percentage, dec!(10));
        c.coupon_type = CouponType::Collection;
        c.max_discount_amount = Some(dec!(1000));
        let lines = [line(dec!(400), 1, Some(7)), line(dec!(600), 1, Some(8))];
        let result = calculate_discount(&request(&c, &lines, dec!(1000), &[7]));
        assert_eq!(result.discount_amount, dec!(40));
        assert_eq!(result.final_total, dec!(960));
    }

    #[test]
    fn user_coupon_needs_login() {
        let mut c = coupon(DiscountType::Flat, dec!(10));
        c.coupon_type = CouponType::User;
        assert_eq!(
            check_user_requirement(&c, None),
            Err(CouponRejection::LoginRequired)
        );
        assert_eq!(check_user_requirement(&c, Some(4)), Ok(()));
    }

    #[test]
    fn apportioned_shares_sum_to_discount() {
        let lines = [
            line(dec!(100), 1, None),
            line(dec!(100), 1, None),
            line(dec!(100), 1, None),
        ];
        let shares = apportion_discount(&lines, dec!(100), DiscountScope::AllLines);
        assert_eq!(shares, vec![dec!(33.33), dec!(33.33), dec!(33.34)]);
        assert_eq!(shares.iter().copied().sum::<Decimal>(), dec!(100));
    }

    #[test]
    fn apportion_skips_ineligible_lines() {
        let lines = [line(dec!(300), 1, Some(1)), line(dec!(100), 1, Some(2))];
        let shares = apportion_discount(
            &lines,
            dec!(30),
            DiscountScope::Collections {
                mapped: &[1],
                fallback: None,
            },
        );
        assert_eq!(shares, vec![dec!(30), Decimal::ZERO]);
    }

    #[test]
    fn amounts_are_bounded() {
        assert_eq!(MAX_AMOUNT, dec!(1000000000000));
        assert!(check_amount("subtotal", MAX_AMOUNT).is_ok());
        assert!(matches!(
            check_amount("subtotal", MAX_AMOUNT + Decimal::ONE),
            Err(ServiceError::ValidationError(msg)) if msg.contains("subtotal")
        ));
        assert!(check_amount("price", dec!(-0.01)).is_err());
        assert!(check_lines(&[line(dec!(250), MAX_LINE_QUANTITY + 1, None)]).is_err());
        assert!(check_lines(&[line(dec!(250), 0, None)]).is_err());
    }

    #[test]
    fn largest_accepted_lines_do_not_overflow() {
        let lines = [
            line(MAX_AMOUNT, MAX_LINE_QUANTITY, None),
            line(MAX_AMOUNT, MAX_LINE_QUANTITY, None),
        ];
        assert!(check_lines(&lines).is_ok());

        let shares = apportion_discount(&lines, MAX_AMOUNT, DiscountScope::AllLines);
        assert_eq!(shares.iter().copied().sum::<Decimal>(), MAX_AMOUNT);

        let mut c = coupon(DiscountType::Percentage, dec!(100));
        c.max_discount_amount = Some(MAX_AMOUNT);
        let subtotal = eligible_subtotal(&lines, DiscountScope::AllLines);
        let breakdown = calculate_discount(&request(&c, &lines, subtotal, &[]));
        assert_eq!(breakdown.discount_amount, MAX_AMOUNT);
    }

    #[test]
    fn format_amount_trims_trailing_zeros() {
        assert_eq!(format_amount(dec!(50.00)), "50");
        assert_eq!(format_amount(dec!(49.5)), "49.5");
        assert_eq!(format_amount(dec!(10.005)), "10.01");
    }
}
