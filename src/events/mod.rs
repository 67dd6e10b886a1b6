use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Sends an event, logging instead of failing when the channel is closed.
    pub async fn send_or_log(&self, event: Event) {
        let name = event.name();
        if let Err(e) = self.send(event).await {
            warn!(event = name, "{}", e);
        }
    }
}

/// Domain events raised by the order and coupon flows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    OrderPlaced {
        order_id: i32,
        order_number: String,
        user_id: i32,
        total_amount: Decimal,
    },
    CouponRedeemed {
        coupon_id: i32,
        order_id: i32,
        discount: Decimal,
    },
    CartCleared {
        user_id: i32,
        removed_items: u64,
    },
    ShipmentRegistered {
        order_id: i32,
        shipment_order_id: String,
    },
    OrderEmailSent {
        order_id: i32,
        recipient: String,
    },
    DefaultAddressChanged {
        user_id: i32,
        address_id: i32,
    },
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::OrderPlaced { .. } => "order_placed",
            Event::CouponRedeemed { .. } => "coupon_redeemed",
            Event::CartCleared { .. } => "cart_cleared",
            Event::ShipmentRegistered { .. } => "shipment_registered",
            Event::OrderEmailSent { .. } => "order_email_sent",
            Event::DefaultAddressChanged { .. } => "default_address_changed",
        }
    }
}

/// Drains the event channel until every sender is dropped.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        match &event {
            Event::OrderPlaced {
                order_id,
                order_number,
                user_id,
                total_amount,
            } => info!(
                order_id,
                order_number = %order_number,
                user_id,
                total_amount = %total_amount,
                "order placed"
            ),
            Event::CouponRedeemed {
                coupon_id,
                order_id,
                discount,
            } => info!(coupon_id, order_id, discount = %discount, "coupon redeemed"),
            Event::CartCleared {
                user_id,
                removed_items,
            } => info!(user_id, removed_items, "cart cleared"),
            Event::ShipmentRegistered {
                order_id,
                shipment_order_id,
            } => info!(order_id, shipment_order_id = %shipment_order_id, "shipment registered"),
            Event::OrderEmailSent {
                order_id,
                recipient,
            } => info!(order_id, recipient = %recipient, "order email sent"),
            Event::DefaultAddressChanged {
                user_id,
                address_id,
            } => info!(user_id, address_id, "default address changed"),
        }
    }

    info!("Event processing loop stopped");
}
