use crate::{
    events::{Event, EventSender},
    services::{
        mailer::{OrderEmail, OrderMailer},
        orders::{OrderDetails, OrderService},
        receipt::{self, OrderSummary},
        shipping::{self, PackageSettings, ShippingNotifier},
    },
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;

/// Result of one best-effort step after checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum SideEffectOutcome {
    Succeeded,
    Failed(String),
    /// Collaborator switched off in config
    Skipped,
}

impl SideEffectOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, SideEffectOutcome::Failed(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct FulfillmentReport {
    pub shipping: SideEffectOutcome,
    pub email: SideEffectOutcome,
}

/// Runs shipment registration and the receipt email after an order has
/// committed. Neither step can fail the order.
#[derive(Clone)]
pub struct OrderFulfillment {
    orders: Arc<OrderService>,
    shipping: Option<Arc<dyn ShippingNotifier>>,
    mailer: Option<Arc<dyn OrderMailer>>,
    event_sender: Arc<EventSender>,
    package: PackageSettings,
    store_name: String,
    currency_symbol: String,
}

impl OrderFulfillment {
    pub fn new(
        orders: Arc<OrderService>,
        shipping: Option<Arc<dyn ShippingNotifier>>,
        mailer: Option<Arc<dyn OrderMailer>>,
        event_sender: Arc<EventSender>,
        package: PackageSettings,
        store_name: impl Into<String>,
        currency_symbol: impl Into<String>,
    ) -> Self {
        Self {
            orders,
            shipping,
            mailer,
            event_sender,
            package,
            store_name: store_name.into(),
            currency_symbol: currency_symbol.into(),
        }
    }

    /// Shipping first, then email.
    #[instrument(skip(self, details), fields(order_number = %details.order.order.order_number))]
    pub async fn run(&self, details: &OrderDetails) -> FulfillmentReport {
        let shipping = self.register_shipment(details).await;
        let email = self.send_receipt(details).await;
        FulfillmentReport { shipping, email }
    }

    async fn register_shipment(&self, details: &OrderDetails) -> SideEffectOutcome {
        let Some(notifier) = &self.shipping else {
            return SideEffectOutcome::Skipped;
        };
        let order = &details.order.order;

        let result = match shipping::build_shipment_payload(details, &self.package) {
            Ok(payload) => notifier.register_shipment(&payload).await,
            Err(e) => Err(e),
        };

        let shipment = match result {
            Ok(shipment) => shipment,
            Err(e) => {
                warn!(order_number = %order.order_number, error = %e, "shipment registration failed");
                return SideEffectOutcome::Failed(e.to_string());
            }
        };

        if let Err(e) = self.orders.record_shipment(order.order_id, &shipment).await {
            error!(
                order_number = %order.order_number,
                shipment_order_id = %shipment.shipment_order_id,
                error = %e,
                "shipment registered but reference not stored"
            );
        }

        self.event_sender
            .send_or_log(Event::ShipmentRegistered {
                order_id: order.order_id,
                shipment_order_id: shipment.shipment_order_id,
            })
            .await;
        SideEffectOutcome::Succeeded
    }

    async fn send_receipt(&self, details: &OrderDetails) -> SideEffectOutcome {
        let Some(mailer) = &self.mailer else {
            return SideEffectOutcome::Skipped;
        };
        let order = &details.order.order;

        let Some(customer) = details.order.customer.as_ref() else {
            warn!(order_number = %order.order_number, "no customer on order, receipt not sent");
            return SideEffectOutcome::Failed("order has no customer email".to_string());
        };

        let summary = OrderSummary::from_details(details);
        let email = OrderEmail {
            to_name: Some(customer.name.clone()),
            to_email: customer.email.clone(),
            subject: receipt::receipt_subject(details, &self.store_name),
            html_body: receipt::render_receipt_html(
                details,
                &summary,
                &self.store_name,
                &self.currency_symbol,
            ),
        };

        match mailer.send(&email).await {
            Ok(()) => {
                info!(order_number = %order.order_number, "receipt sent");
                self.event_sender
                    .send_or_log(Event::OrderEmailSent {
                        order_id: order.order_id,
                        recipient: email.to_email,
                    })
                    .await;
                SideEffectOutcome::Succeeded
            }
            Err(e) => {
                warn!(order_number = %order.order_number, error = %e, "receipt email failed");
                SideEffectOutcome::Failed(e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::CollaboratorError;
    use crate::services::mailer::MockOrderMailer;
    use crate::services::shipping::{MockShippingNotifier, ShipmentRef};
    use crate::services::test_support::sample_details;
    use sea_orm::DatabaseConnection;
    use tokio::sync::mpsc;

    fn fulfillment(
        shipping: Option<Arc<dyn ShippingNotifier>>,
        mailer: Option<Arc<dyn OrderMailer>>,
    ) -> (OrderFulfillment, mpsc::Receiver<Event>) {
        let (tx, rx) = mpsc::channel(16);
        let events = Arc::new(EventSender::new(tx));
        let orders = Arc::new(OrderService::new(
            Arc::new(DatabaseConnection::default()),
            events.clone(),
        ));
        (
            OrderFulfillment::new(
                orders,
                shipping,
                mailer,
                events,
                PackageSettings::default(),
                "U&I Naturals",
                "₹",
            ),
            rx,
        )
    }

    #[tokio::test]
    async fn disabled_collaborators_are_skipped() {
        let (fulfillment, _rx) = fulfillment(None, None);
        let report = fulfillment.run(&sample_details("cod")).await;
        assert_eq!(report.shipping, SideEffectOutcome::Skipped);
        assert_eq!(report.email, SideEffectOutcome::Skipped);
    }

    #[tokio::test]
    async fn shipping_failure_does_not_stop_email() {
        let mut shipping = MockShippingNotifier::new();
        shipping.expect_register_shipment().times(1).returning(|_| {
            Err(CollaboratorError::Rejected {
                service: "shiprocket",
                status: 422,
                body: "invalid pincode".into(),
            })
        });
        let mut mailer = MockOrderMailer::new();
        mailer
            .expect_send()
            .times(1)
            .withf(|email| email.to_email == "asha@example.com" && email.html_body.contains("UNI-"))
            .returning(|_| Ok(()));

        let (fulfillment, mut rx) = fulfillment(Some(Arc::new(shipping)), Some(Arc::new(mailer)));
        let report = fulfillment.run(&sample_details("cod")).await;

        assert!(report.shipping.is_failed());
        assert_eq!(report.email, SideEffectOutcome::Succeeded);
        assert_eq!(rx.recv().await.map(|e| e.name()), Some("order_email_sent"));
    }

    #[tokio::test]
    async fn registered_shipment_is_reported_even_if_reference_write_fails() {
        let mut shipping = MockShippingNotifier::new();
        shipping
            .expect_register_shipment()
            .withf(|payload| payload.order_id == "UNI-1717234200000-42" && payload.payment_method == "Prepaid")
            .returning(|_| {
                Ok(ShipmentRef {
                    shipment_order_id: "SR-1".into(),
                    shipment_id: Some("77".into()),
                })
            });

        let (fulfillment, mut rx) = fulfillment(Some(Arc::new(shipping)), None);
        let report = fulfillment.run(&sample_details("razorpay")).await;

        assert_eq!(report.shipping, SideEffectOutcome::Succeeded);
        assert_eq!(report.email, SideEffectOutcome::Skipped);
        assert_eq!(rx.recv().await.map(|e| e.name()), Some("shipment_registered"));
    }

    #[tokio::test]
    async fn email_failure_is_recorded() {
        let mut mailer = MockOrderMailer::new();
        mailer
            .expect_send()
            .returning(|_| Err(CollaboratorError::Delivery("primary: x; fallback: y".into())));

        let (fulfillment, _rx) = fulfillment(None, Some(Arc::new(mailer)));
        let report = fulfillment.run(&sample_details("cod")).await;
        assert_eq!(
            report.email,
            SideEffectOutcome::Failed("mail delivery failed: primary: x; fallback: y".into())
        );
    }

    #[tokio::test]
    async fn missing_customer_fails_email_step() {
        let mailer = MockOrderMailer::new();
        let mut details = sample_details("cod");
        details.order.customer = None;

        let (fulfillment, _rx) = fulfillment(None, Some(Arc::new(mailer)));
        let report = fulfillment.run(&details).await;
        assert!(report.email.is_failed());
    }

    #[test]
    fn outcome_serializes_with_reason() {
        let json = serde_json::to_value(SideEffectOutcome::Failed("timeout".into())).unwrap();
        assert_eq!(json, serde_json::json!({"status": "failed", "reason": "timeout"}));
        let json = serde_json::to_value(SideEffectOutcome::Skipped).unwrap();
        assert_eq!(json, serde_json::json!({"status": "skipped"}));
    }
}
