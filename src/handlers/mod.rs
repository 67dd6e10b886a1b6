pub mod addresses;
pub mod cart;
pub mod common;
pub mod coupons;
pub mod health;
pub mod orders;
pub mod payments;

use crate::{
    config::AppConfig,
    db::DbPool,
    events::EventSender,
    services::{
        addresses::AddressService,
        cart::CartService,
        coupons::CouponService,
        fulfillment::OrderFulfillment,
        mailer::{OrderMailer, SmtpMailer, SmtpSettings},
        orders::OrderService,
        shipping::{PackageSettings, ShippingNotifier, ShiprocketClient},
    },
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub coupons: Arc<CouponService>,
    pub orders: Arc<OrderService>,
    pub addresses: Arc<AddressService>,
    pub cart: Arc<CartService>,
    pub fulfillment: Arc<OrderFulfillment>,
    pub shipping_configured: bool,
    pub mail_configured: bool,
}

impl AppServices {
    /// Builds the services, wiring Shiprocket and SMTP only when they are
    /// enabled and fully configured. A collaborator that fails to build is
    /// logged and left out.
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>, config: &AppConfig) -> Self {
        let shipping: Option<Arc<dyn ShippingNotifier>> =
            config.shiprocket_credentials().and_then(|(email, password)| {
                match ShiprocketClient::new(
                    config.shiprocket_base_url.clone(),
                    email,
                    password,
                    Duration::from_secs(config.shipping_timeout_secs),
                ) {
                    Ok(client) => Some(Arc::new(client) as Arc<dyn ShippingNotifier>),
                    Err(e) => {
                        warn!(error = %e, "shipping client unavailable, shipments will be skipped");
                        None
                    }
                }
            });

        let mailer: Option<Arc<dyn OrderMailer>> =
            SmtpSettings::from_config(config).and_then(|settings| match SmtpMailer::new(settings) {
                Ok(mailer) => Some(Arc::new(mailer) as Arc<dyn OrderMailer>),
                Err(e) => {
                    warn!(error = %e, "mailer unavailable, receipts will be skipped");
                    None
                }
            });

        info!(
            shipping = shipping.is_some(),
            mail = mailer.is_some(),
            "order side effects configured"
        );
        Self::with_collaborators(db_pool, event_sender, config, shipping, mailer)
    }

    /// Same as [`AppServices::new`] with explicit collaborators.
    pub fn with_collaborators(
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
        config: &AppConfig,
        shipping: Option<Arc<dyn ShippingNotifier>>,
        mailer: Option<Arc<dyn OrderMailer>>,
    ) -> Self {
        let orders = Arc::new(OrderService::new(db_pool.clone(), event_sender.clone()));
        let shipping_configured = shipping.is_some();
        let mail_configured = mailer.is_some();

        let fulfillment = Arc::new(OrderFulfillment::new(
            orders.clone(),
            shipping,
            mailer,
            event_sender.clone(),
            PackageSettings::from(config),
            config.store_name.clone(),
            config.currency_symbol.clone(),
        ));

        Self {
            coupons: Arc::new(CouponService::new(
                db_pool.clone(),
                config.currency_symbol.clone(),
            )),
            orders,
            addresses: Arc::new(AddressService::new(db_pool.clone(), event_sender.clone())),
            cart: Arc::new(CartService::new(db_pool, event_sender)),
            fulfillment,
            shipping_configured,
            mail_configured,
        }
    }
}
