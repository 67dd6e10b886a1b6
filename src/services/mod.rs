// Checkout
pub mod cart;
pub mod coupon_rules;
pub mod coupons;
pub mod orders;
pub mod payments;

// Customer data
pub mod addresses;

// Post-order side effects
pub mod fulfillment;
pub mod mailer;
pub mod receipt;
pub mod shipping;

#[cfg(test)]
pub(crate) mod test_support;
