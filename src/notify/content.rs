use serde_json::{json, Value};

use crate::models::event::OrderEvent;
use crate::models::order::{Language, LocalizedText, Order, OrderStatus};

#[derive(Debug, Clone, PartialEq)]
pub struct NotificationContent {
    pub title: String,
    pub body: String,
    pub payload: Value,
}

/// Builds the customer-facing message for an order event in `language`.
pub fn notification_for(event: &OrderEvent, language: Language) -> NotificationContent {
    let order = event.order();
    let (title, body) = match event {
        OrderEvent::Created { .. } => placed_text(order),
        OrderEvent::StatusChanged { .. } => status_text(order),
    };

    NotificationContent {
        title: title.get(language).to_string(),
        body: body.get(language).to_string(),
        payload: json!({
            "type": "order_update",
            "orderId": order.id,
            "orderNumber": order.order_number,
            "status": order.status,
        }),
    }
}

fn placed_text(order: &Order) -> (LocalizedText, LocalizedText) {
    let number = &order.order_number;
    (
        LocalizedText::new("🛍️ Order placed", "🛍️ تم تقديم الطلب"),
        LocalizedText::new(
            format!("Your order {number} has been placed successfully"),
            format!("تم تقديم طلبك {number} بنجاح"),
        ),
    )
}

fn status_text(order: &Order) -> (LocalizedText, LocalizedText) {
    let number = &order.order_number;
    match order.status {
        OrderStatus::Pending => (
            LocalizedText::new("⏳ Order pending", "⏳ الطلب قيد الانتظار"),
            LocalizedText::new(
                format!("Your order {number} is awaiting confirmation"),
                format!("طلبك {number} بانتظار التأكيد"),
            ),
        ),
        OrderStatus::Processing => (
            LocalizedText::new("📦 Order processing", "📦 جاري تجهيز الطلب"),
            LocalizedText::new(
                format!("Your order {number} is being prepared"),
                format!("جاري تجهيز طلبك {number}"),
            ),
        ),
        OrderStatus::Shipped => (
            LocalizedText::new("🚚 Order shipped", "🚚 تم شحن الطلب"),
            LocalizedText::new(
                format!("Your order {number} has been shipped"),
                format!("تم شحن طلبك {number}"),
            ),
        ),
        OrderStatus::OutForDelivery => (
            LocalizedText::new("🛵 Out for delivery", "🛵 الطلب في الطريق"),
            LocalizedText::new(
                format!("Your order {number} is out for delivery"),
                format!("طلبك {number} في الطريق إليك"),
            ),
        ),
        OrderStatus::Delivered => (
            LocalizedText::new("✅ Order delivered", "✅ تم توصيل الطلب"),
            LocalizedText::new(
                format!("Your order {number} has been delivered"),
                format!("تم توصيل طلبك {number}"),
            ),
        ),
        OrderStatus::Cancelled => (
            LocalizedText::new("❌ Order cancelled", "❌ تم إلغاء الطلب"),
            LocalizedText::new(
                format!("Your order {number} has been cancelled"),
                format!("تم إلغاء طلبك {number}"),
            ),
        ),
    }
}
