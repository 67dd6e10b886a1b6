pub mod address;
pub mod cart_item;
pub mod coupon;
pub mod coupon_collection;
pub mod order;
pub mod order_item;
pub mod product;
pub mod product_variant;
pub mod user;

// Re-export entities
pub use address::{Entity as Address, Model as AddressModel};
pub use cart_item::{Entity as CartItem, Model as CartItemModel};
pub use coupon::{CouponType, DiscountType, Entity as Coupon, Model as CouponModel};
pub use coupon_collection::{Entity as CouponCollection, Model as CouponCollectionModel};
pub use order::{CheckoutSource, Entity as Order, Model as OrderModel};
pub use order_item::{Entity as OrderItem, Model as OrderItemModel};
pub use product::{Entity as Product, Model as ProductModel};
pub use product_variant::{Entity as ProductVariant, Model as ProductVariantModel};
pub use user::{Entity as User, Model as UserModel};
