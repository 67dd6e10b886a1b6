//! Order receipt totals and HTML rendering.

use crate::services::{coupon_rules::round_money, orders::OrderDetails};
use rust_decimal::Decimal;
use serde::Serialize;

/// Totals printed on the receipt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderSummary {
    /// Σ mrp × qty, using the selling price when a variant has no MRP
    pub total_mrp: Decimal,
    /// Σ price × qty
    pub items_total: Decimal,
    pub discount_on_mrp: Decimal,
    pub coupon_discount: Decimal,
    pub delivery_charge: Decimal,
    /// items_total + delivery_charge
    pub total_price: Decimal,
    pub amount_paid: Decimal,
}

impl OrderSummary {
    pub fn from_details(details: &OrderDetails) -> Self {
        let order = &details.order.order;
        let mut total_mrp = Decimal::ZERO;
        let mut items_total = Decimal::ZERO;
        for line in &details.order_items {
            let qty = Decimal::from(line.item.quantity);
            total_mrp += line.mrp.unwrap_or(line.item.price) * qty;
            items_total += line.item.price * qty;
        }

        let delivery_charge = order.shipping_amount;
        Self {
            total_mrp: round_money(total_mrp),
            items_total: round_money(items_total),
            discount_on_mrp: round_money((total_mrp - items_total).max(Decimal::ZERO)),
            coupon_discount: round_money(order.coupon_discount),
            delivery_charge: round_money(delivery_charge),
            total_price: round_money(items_total + delivery_charge),
            amount_paid: round_money(order.total_amount),
        }
    }
}

pub fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

pub fn receipt_subject(details: &OrderDetails, store_name: &str) -> String {
    format!(
        "{} - Order {} confirmed",
        store_name, details.order.order.order_number
    )
}

fn money(currency: &str, amount: Decimal) -> String {
    format!("{}{:.2}", escape_html(currency), round_money(amount))
}

fn summary_row(label: &str, value: &str) -> String {
    format!(
        "<tr><td style=\"padding:4px 0\">{}</td><td style=\"padding:4px 0;text-align:right\">{}</td></tr>",
        label, value
    )
}

/// Renders the customer receipt. Every value that came from a user or the
/// catalog is escaped.
pub fn render_receipt_html(
    details: &OrderDetails,
    summary: &OrderSummary,
    store_name: &str,
    currency: &str,
) -> String {
    let order = &details.order.order;
    let store = escape_html(store_name);
    let customer_name = details
        .order
        .customer
        .as_ref()
        .map(|c| escape_html(&c.name))
        .unwrap_or_else(|| "there".to_string());

    let mut html = String::new();
    html.push_str("<!DOCTYPE html><html><body style=\"font-family:Arial,sans-serif;color:#222\">");
    html.push_str(&format!("<h2>{}</h2>", store));
    html.push_str(&format!(
        "<p>Hi {}, thank you for your order!</p><p>Order number: <strong>{}</strong><br>Placed on: {}<br>Payment: {} ({})</p>",
        customer_name,
        escape_html(&order.order_number),
        order.created_at.format("%d %b %Y, %H:%M UTC"),
        escape_html(&order.payment_method),
        escape_html(&order.payment_status),
    ));

    html.push_str("<table style=\"width:100%;border-collapse:collapse\"><thead><tr>");
    html.push_str("<th align=\"left\">Item</th><th align=\"right\">Qty</th><th align=\"right\">Price</th><th align=\"right\">Total</th>");
    html.push_str("</tr></thead><tbody>");
    for line in &details.order_items {
        let name = match (&line.product_name, &line.variant_name) {
            (Some(product), Some(variant)) => {
                format!("{} ({})", escape_html(product), escape_html(variant))
            }
            (Some(product), None) => escape_html(product),
            (None, Some(variant)) => escape_html(variant),
            (None, None) => format!("Item #{}", line.item.variant_id),
        };
        let qty = Decimal::from(line.item.quantity);
        html.push_str(&format!(
            "<tr><td>{}</td><td align=\"right\">{}</td><td align=\"right\">{}</td><td align=\"right\">{}</td></tr>",
            name,
            line.item.quantity,
            money(currency, line.item.price),
            money(currency, line.item.price * qty),
        ));
    }
    html.push_str("</tbody></table>");

    html.push_str("<table style=\"width:100%;margin-top:16px\">");
    html.push_str(&summary_row("Total MRP", &money(currency, summary.total_mrp)));
    html.push_str(&summary_row(
        "Discount on MRP",
        &format!("-{}", money(currency, summary.discount_on_mrp)),
    ));
    if summary.coupon_discount > Decimal::ZERO {
        let label = match &order.coupon_code {
            Some(code) => format!("Coupon ({})", escape_html(code)),
            None => "Coupon".to_string(),
        };
        html.push_str(&summary_row(
            &label,
            &format!("-{}", money(currency, summary.coupon_discount)),
        ));
    }
    html.push_str(&summary_row(
        "Delivery",
        &if summary.delivery_charge > Decimal::ZERO {
            money(currency, summary.delivery_charge)
        } else {
            "FREE".to_string()
        },
    ));
    html.push_str(&summary_row("Total price", &money(currency, summary.total_price)));
    html.push_str(&summary_row(
        "<strong>Amount paid</strong>",
        &format!("<strong>{}</strong>", money(currency, summary.amount_paid)),
    ));
    html.push_str("</table>");

    if let Some(address) = &details.order.shipping_address {
        html.push_str("<h3>Shipping to</h3><p>");
        html.push_str(&escape_html(&address.full_name));
        html.push_str("<br>");
        html.push_str(&escape_html(&address.address_line1));
        if let Some(line2) = address.address_line2.as_deref().filter(|l| !l.is_empty()) {
            html.push_str("<br>");
            html.push_str(&escape_html(line2));
        }
        html.push_str(&format!(
            "<br>{}, {} {}<br>{}<br>Phone: {}</p>",
            escape_html(&address.city),
            escape_html(&address.state),
            escape_html(&address.pincode),
            escape_html(&address.country),
            escape_html(&address.phone),
        ));
    }

    html.push_str(&format!(
        "<p style=\"color:#666;font-size:12px\">You are receiving this email because you placed an order with {}.</p>",
        store
    ));
    html.push_str("</body></html>");
    html
}
