//! Order domain types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::FromRow;

use marvo_core::{
    OrderId, OrderItemId, OrderNumber, OrderStatus, PaymentMethod, Price, PriceError, ProductId,
    UserId,
};

/// A placed order.
#[derive(Debug, Clone, FromRow)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub order_number: OrderNumber,
    /// Item subtotal, excluding any donation.
    pub total_amount: Price,
    pub donation_amount: Option<Price>,
    pub payment_method: PaymentMethod,
    pub status: OrderStatus,
    pub shipping_address: String,
    pub phone: String,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub shipped_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
}

impl Order {
    /// Amount due on delivery: item subtotal plus donation.
    ///
    /// Both parts are capped at `Price::MAX`, so the sum cannot overflow.
    #[must_use]
    pub fn grand_total(&self) -> Decimal {
        self.total_amount.amount() + self.donation_amount.map_or(Decimal::ZERO, |d| d.amount())
    }
}

/// A line of a placed order with its frozen price.
#[derive(Debug, Clone, FromRow)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub order_id: OrderId,
    /// `None` once the product has been deleted.
    pub product_id: Option<ProductId>,
    pub product_name: String,
    pub quantity: i64,
    pub price: Price,
    pub size: Option<String>,
    pub color: Option<String>,
}

impl OrderItem {
    /// # Errors
    ///
    /// Returns `PriceError::Overflow` if the total does not fit in a `Decimal`.
    pub fn line_total(&self) -> Result<Decimal, PriceError> {
        self.price.times(self.quantity)
    }
}

/// An order together with its lines.
#[derive(Debug, Clone)]
pub struct OrderDetail {
    pub order: Order,
    pub items: Vec<OrderItem>,
}

#[derive(Debug, Clone)]
pub struct NewOrder {
    pub user_id: UserId,
    pub order_number: OrderNumber,
    pub total_amount: Price,
    pub donation_amount: Option<Price>,
    pub shipping_address: String,
    pub phone: String,
    pub notes: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewOrderItem {
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: i64,
    pub price: Price,
    pub size: Option<String>,
    pub color: Option<String>,
}
