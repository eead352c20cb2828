use crate::models::order::{LocalizedText, OrderStatus};

/// History caption recorded when an order enters `status`.
pub fn status_description(status: OrderStatus) -> LocalizedText {
    match status {
        OrderStatus::Pending => LocalizedText::new(
            "Order placed and awaiting confirmation",
            "تم استلام الطلب وهو بانتظار التأكيد",
        ),
        OrderStatus::Processing => {
            LocalizedText::new("Order is being prepared", "جاري تجهيز الطلب")
        }
        OrderStatus::Shipped => LocalizedText::new("Order has been shipped", "تم شحن الطلب"),
        OrderStatus::OutForDelivery => {
            LocalizedText::new("Order is out for delivery", "الطلب في الطريق إليك")
        }
        OrderStatus::Delivered => LocalizedText::new("Order has been delivered", "تم توصيل الطلب"),
        OrderStatus::Cancelled => LocalizedText::new("Order has been cancelled", "تم إلغاء الطلب"),
    }
}
