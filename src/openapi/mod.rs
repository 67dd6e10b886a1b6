use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "U&I Naturals API",
        version = "0.3.0",
        description = r#"
# U&I Naturals commerce API

Backend for the U&I Naturals storefront.

## Features

- **Coupons**: sales, user and collection coupons with ordered eligibility checks
- **Checkout**: transactional order creation that redeems the coupon and empties the cart
- **Payments**: Razorpay signature verification before a paid order is created
- **Addresses**: address book with soft delete and a single default per user
- **Cart**: server-side cart priced from the catalog

After an order commits, the shipment is registered with Shiprocket and a
receipt is emailed. Both steps are best-effort: their outcome is reported in
the `fulfillment` field of the order response and never fails the request.

## Error Handling

Errors share one body shape:

```json
{
  "error": "Conflict",
  "message": "Conflict: Coupon usage limit reached",
  "request_id": "9b1d...",
  "timestamp": "2024-06-01T09:30:00Z"
}
```
        "#,
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    tags(
        (name = "coupons", description = "Coupon management and validation"),
        (name = "orders", description = "Checkout and order history"),
        (name = "payments", description = "Payment verification"),
        (name = "addresses", description = "Customer address book"),
        (name = "cart", description = "Shopping cart"),
        (name = "system", description = "Health and status")
    ),
    paths(
        // Coupons
        crate::handlers::coupons::validate_coupon,
        crate::handlers::coupons::available_coupons,
        crate::handlers::coupons::create_coupon,
        crate::handlers::coupons::list_coupons,
        crate::handlers::coupons::get_coupon,
        crate::handlers::coupons::update_coupon,
        crate::handlers::coupons::delete_coupon,

        // Orders
        crate::handlers::orders::create_order,
        crate::handlers::orders::get_order,
        crate::handlers::orders::list_user_orders,

        // Payments
        crate::handlers::payments::verify_payment,

        // Addresses
        crate::handlers::addresses::list_addresses,
        crate::handlers::addresses::create_address,
        crate::handlers::addresses::update_address,
        crate::handlers::addresses::delete_address,
        crate::handlers::addresses::set_default_address,

        // Cart
        crate::handlers::cart::get_cart,
        crate::handlers::cart::add_to_cart,
        crate::handlers::cart::update_cart_item,
        crate::handlers::cart::remove_cart_item,
        crate::handlers::cart::clear_cart,

        // System
        crate::handlers::health::liveness_check,
        crate::handlers::health::status_check,
    ),
    components(
        schemas(
            // Coupon types
            crate::entities::coupon::Model,
            crate::entities::CouponType,
            crate::entities::DiscountType,
            crate::services::coupons::CouponInput,
            crate::services::coupons::CouponDetails,
            crate::services::coupon_rules::CartLine,
            crate::handlers::coupons::ValidateCouponRequest,
            crate::handlers::coupons::ValidateCouponResponse,
            crate::handlers::coupons::AvailableCouponsRequest,

            // Order types
            crate::entities::order::Model,
            crate::entities::order_item::Model,
            crate::entities::CheckoutSource,
            crate::services::orders::NewOrder,
            crate::services::orders::NewOrderItem,
            crate::services::orders::OrderDetails,
            crate::services::orders::OrderView,
            crate::services::orders::OrderItemDetails,
            crate::services::orders::ShippingAddress,
            crate::services::orders::Customer,
            crate::services::fulfillment::FulfillmentReport,
            crate::services::fulfillment::SideEffectOutcome,
            crate::handlers::orders::CreateOrderRequest,
            crate::handlers::orders::OrderPlacedResponse,
            crate::handlers::payments::VerifyPaymentRequest,

            // Address and cart types
            crate::entities::address::Model,
            crate::services::addresses::AddressInput,
            crate::handlers::addresses::SetDefaultRequest,
            crate::entities::cart_item::Model,
            crate::services::cart::AddCartItem,
            crate::services::cart::CartView,
            crate::services::cart::CartItemView,
            crate::handlers::cart::UpdateQuantityRequest,
            crate::handlers::cart::CartCleared,

            // System
            crate::handlers::health::StatusResponse,
            crate::handlers::health::ComponentStatus,

            // Error types
            crate::errors::ErrorResponse
        )
    )
)]
pub struct ApiDocV1;

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDocV1::openapi())
        .config(utoipa_swagger_ui::Config::from("/api-docs/openapi.json").try_it_out_enabled(true))
}
